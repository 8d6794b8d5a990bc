//! JSON-lines file sink.
//!
//! Each event is appended as one line of JSON. The file and its parent
//! directories are created on first write.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use switchboard_core::event::Subscriber;
use switchboard_types::error::SubscriberError;
use switchboard_types::event::Event;

/// Appends every event to a `.jsonl` file.
pub struct JsonLinesSubscriber {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSubscriber {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(event: &Event) -> Result<Vec<u8>, SubscriberError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        Ok(line)
    }
}

impl Subscriber for JsonLinesSubscriber {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn handle_event(&self, event: &Event) -> Result<(), SubscriberError> {
        let line = Self::encode(event)?;
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn supports_sync(&self) -> bool {
        true
    }

    /// Single `write_all` on an append-mode handle, so lines never interleave.
    fn handle_event_sync(&self, event: &Event) -> Result<(), SubscriberError> {
        let line = Self::encode(event)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::event::EventBus;
    use switchboard_types::config::BusConfig;
    use switchboard_types::event::EventKind;

    fn read_lines(path: &Path) -> Vec<Event> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let sink = JsonLinesSubscriber::new(&path);

        let first = Event::new(EventKind::FlowStarted);
        let second = Event::new(EventKind::FlowCompleted).with_field("steps", 2);
        sink.handle_event(&first).await.unwrap();
        sink.handle_event_sync(&second).unwrap();

        let events = read_lines(&path);
        assert_eq!(events, vec![first, second]);
    }

    #[tokio::test]
    async fn test_queued_bus_delivery_reaches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.jsonl");
        let bus = EventBus::new(&BusConfig::default());
        bus.add_subscriber(JsonLinesSubscriber::new(&path));

        for i in 0..3 {
            bus.emit_event(Event::new(EventKind::AgentStarted).with_field("i", i))
                .await;
        }
        bus.flush().await;

        let events = read_lines(&path);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].payload_u64("i"), Some(2));
    }
}
