use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ReminderConfig;
use crate::triggers::Triggers;

/// Background task running the tomorrow-reminder sweep on an interval
pub struct ReminderTask {
    config: ReminderConfig,
    triggers: Arc<Triggers>,
    shutdown: broadcast::Receiver<()>,
}

impl ReminderTask {
    pub fn new(
        config: ReminderConfig,
        triggers: Arc<Triggers>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            triggers,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        if !self.config.enabled {
            tracing::info!("Reminder task disabled");
            return;
        }

        let interval = Duration::from_secs(self.config.interval_seconds.max(1));
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            interval_secs = self.config.interval_seconds,
            utc_offset_minutes = self.config.utc_offset_minutes,
            "Reminder task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Reminder task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    // Errors are logged and counted by the trigger layer
                    let _ = self.triggers.send_tomorrow_reminders().await;
                }
            }
        }

        tracing::info!("Reminder task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    use crate::identity::UnconfiguredLinkProvider;
    use crate::notification::{DispatchConfig, NotificationPipeline};
    use crate::push::NoopProvider;
    use crate::store::{MemoryStore, Stores};

    fn triggers() -> Arc<Triggers> {
        let stores = Stores::memory(Arc::new(MemoryStore::new()));
        let pipeline = NotificationPipeline::from_stores(
            &stores,
            Arc::new(NoopProvider::new()),
            DispatchConfig::default(),
            4,
        );
        Arc::new(Triggers::new(
            Arc::new(pipeline),
            stores,
            Arc::new(UnconfiguredLinkProvider),
            FixedOffset::east_opt(3 * 3600).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_disabled_task_returns_immediately() {
        let (_tx, rx) = broadcast::channel(1);
        let config = ReminderConfig {
            enabled: false,
            ..ReminderConfig::default()
        };

        tokio::time::timeout(
            Duration::from_secs(1),
            ReminderTask::new(config, triggers(), rx).run(),
        )
        .await
        .expect("disabled task should not block");
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (tx, rx) = broadcast::channel(1);
        let config = ReminderConfig {
            interval_seconds: 3600,
            ..ReminderConfig::default()
        };

        let handle = tokio::spawn(ReminderTask::new(config, triggers(), rx).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop on shutdown")
            .unwrap();
    }
}
