//! Wiring an `EventLogger` from configuration.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use switchboard_core::event::{BoxEventStore, EventBus, EventLogger};
use switchboard_types::config::SwitchboardConfig;

use crate::sqlite::pool::database_url_for;
use crate::sqlite::{DatabasePool, SqliteEventStore};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to create data directory: {0}")]
    DataDir(#[from] std::io::Error),

    #[error("failed to open event database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Build the logger described by `config`.
///
/// With persistence enabled the logger writes every event to SQLite at
/// `persistence.database_url`, or `{data_dir}/events.db` when unset.
pub async fn build_logger(
    config: &SwitchboardConfig,
    data_dir: &Path,
) -> Result<EventLogger, BootstrapError> {
    let bus = EventBus::new(&config.bus);

    if !config.persistence.enabled {
        return Ok(EventLogger::new(bus));
    }

    let url = match &config.persistence.database_url {
        Some(url) => url.clone(),
        None => {
            tokio::fs::create_dir_all(data_dir).await?;
            database_url_for(data_dir)
        }
    };
    let pool = DatabasePool::new(&url).await?;
    info!(database_url = %url, "Event persistence enabled");

    Ok(EventLogger::with_store(
        bus,
        BoxEventStore::new(SqliteEventStore::new(pool)),
    ))
}

/// Load `{data_dir}/config.toml` and build the logger it describes.
pub async fn logger_from_data_dir(data_dir: &Path) -> anyhow::Result<(SwitchboardConfig, EventLogger)> {
    let config = crate::config::load_config(data_dir).await;
    let logger = build_logger(&config, data_dir).await?;
    Ok((config, logger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_types::event::{Event, EventFilter, EventKind};

    #[tokio::test]
    async fn test_without_persistence_has_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let logger = build_logger(&SwitchboardConfig::default(), dir.path())
            .await
            .unwrap();
        assert!(!logger.has_store());
        assert!(!dir.path().join("events.db").exists());
    }

    #[tokio::test]
    async fn test_persisted_events_survive_clear() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let mut config = SwitchboardConfig::default();
        config.persistence.enabled = true;

        let logger = build_logger(&config, &data_dir).await.unwrap();
        assert!(logger.has_store());

        let flow_id = uuid::Uuid::now_v7();
        for kind in [EventKind::FlowStarted, EventKind::FlowCompleted] {
            logger.log_event(Event::new(kind).with_flow(Some(flow_id))).await;
        }
        logger.clear();
        assert!(logger.is_empty());

        let persisted = logger
            .load_persisted(&EventFilter::new().flow(flow_id))
            .await
            .unwrap();
        let kinds: Vec<String> = persisted.iter().map(|e| e.kind().to_string()).collect();
        assert_eq!(kinds, vec!["flow_started", "flow_completed"]);
        assert!(data_dir.join("events.db").exists());
    }

    #[tokio::test]
    async fn test_logger_from_data_dir_reads_config() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            "[persistence]\nenabled = true\n",
        )
        .await
        .unwrap();

        let (config, logger) = logger_from_data_dir(dir.path()).await.unwrap();
        assert!(config.persistence.enabled);
        assert!(logger.has_store());
    }
}
