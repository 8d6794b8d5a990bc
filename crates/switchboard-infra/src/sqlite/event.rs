//! SQLite event store.
//!
//! Implements `EventStore` from `switchboard-core`. Rows are keyed by event
//! id; saving an id that already exists replaces the row.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use switchboard_core::event::EventStore;
use switchboard_types::error::RepositoryError;
use switchboard_types::event::{Event, EventFilter, EventKind};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `EventStore`.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: DatabasePool,
}

impl SqliteEventStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Delete every stored event. Returns the number of rows removed.
    pub async fn purge(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM events")
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Private row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct EventRow {
    event_id: String,
    timestamp: String,
    event_type: String,
    flow_id: Option<String>,
    agent_name: Option<String>,
    team_name: Option<String>,
    data: String,
}

impl EventRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            event_id: row.try_get("event_id")?,
            timestamp: row.try_get("timestamp")?,
            event_type: row.try_get("event_type")?,
            flow_id: row.try_get("flow_id")?,
            agent_name: row.try_get("agent_name")?,
            team_name: row.try_get("team_name")?,
            data: row.try_get("data")?,
        })
    }

    fn into_event(self) -> Result<Event, RepositoryError> {
        let event_id = parse_uuid(&self.event_id, "event_id")?;
        let flow_id = self
            .flow_id
            .as_deref()
            .map(|s| parse_uuid(s, "flow_id"))
            .transpose()?;
        let kind: EventKind = self
            .event_type
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid event_type: {e}")))?;
        let payload = match serde_json::from_str::<Value>(&self.data)
            .map_err(|e| RepositoryError::Query(format!("invalid JSON data: {e}")))?
        {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        Ok(Event::from_parts(
            event_id,
            parse_datetime(&self.timestamp)?,
            kind,
            flow_id,
            self.team_name,
            self.agent_name,
            payload,
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_uuid(s: &str, field: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {field}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    // Fixed-width UTC so lexical order matches time order.
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// EventStore implementation
// ---------------------------------------------------------------------------

impl EventStore for SqliteEventStore {
    async fn save(&self, event: &Event) -> Result<(), RepositoryError> {
        let data = serde_json::to_string(event.payload())
            .map_err(|e| RepositoryError::Query(format!("failed to serialize payload: {e}")))?;

        sqlx::query(
            r#"INSERT INTO events (event_id, timestamp, event_type, flow_id, agent_name, team_name, data)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(event_id) DO UPDATE SET
                   timestamp = excluded.timestamp,
                   event_type = excluded.event_type,
                   flow_id = excluded.flow_id,
                   agent_name = excluded.agent_name,
                   team_name = excluded.team_name,
                   data = excluded.data"#,
        )
        .bind(event.event_id().to_string())
        .bind(format_datetime(&event.timestamp()))
        .bind(event.kind().to_string())
        .bind(event.flow_id().map(|id| id.to_string()))
        .bind(event.agent_name())
        .bind(event.team_name())
        .bind(data)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn load(&self, filter: &EventFilter) -> Result<Vec<Event>, RepositoryError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT event_id, timestamp, event_type, flow_id, agent_name, team_name, data FROM events WHERE 1 = 1",
        );
        if let Some(kind) = &filter.event_type {
            qb.push(" AND event_type = ").push_bind(kind.to_string());
        }
        if let Some(flow_id) = filter.flow_id {
            qb.push(" AND flow_id = ").push_bind(flow_id.to_string());
        }
        if let Some(agent) = &filter.agent_name {
            qb.push(" AND agent_name = ").push_bind(agent.clone());
        }
        if let Some(team) = &filter.team_name {
            qb.push(" AND team_name = ").push_bind(team.clone());
        }

        // Newest-first for the limit, flipped back to oldest-first below.
        // event_id is a v7 uuid, so it breaks timestamp ties in creation order.
        qb.push(" ORDER BY timestamp DESC, event_id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut events = rows
            .iter()
            .map(|row| {
                EventRow::from_row(row)
                    .map_err(query_error)
                    .and_then(EventRow::into_event)
            })
            .collect::<Result<Vec<_>, _>>()?;
        events.reverse();
        Ok(events)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM events")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        let count: i64 = row.try_get("count").map_err(query_error)?;
        Ok(count as u64)
    }
}
