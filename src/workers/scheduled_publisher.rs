//! Scheduled post publication worker
//!
//! The only periodic job in the system. Each tick flips every due,
//! not-yet-published post in a single UPDATE, so the job is idempotent and
//! safe to run concurrently with itself: a second invocation matches zero
//! rows. Errors are logged and never propagated out of the loop.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::database::post_repository::PostRepository;

#[derive(Debug, Clone)]
pub struct ScheduledPublisherConfig {
    pub poll_interval: Duration,
}

impl Default for ScheduledPublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl ScheduledPublisherConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.poll_interval = Duration::from_secs(
            std::env::var("PUBLISHER_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.poll_interval.as_secs()),
        );
        cfg
    }
}

type Housekeeping = Box<dyn Fn() + Send + Sync>;

pub struct ScheduledPublisherWorker {
    repo: PostRepository,
    config: ScheduledPublisherConfig,
    housekeeping: Option<Housekeeping>,
}

impl ScheduledPublisherWorker {
    pub fn new(repo: PostRepository, config: ScheduledPublisherConfig) -> Self {
        Self {
            repo,
            config,
            housekeeping: None,
        }
    }

    /// Attach an injected maintenance hook, run once per tick
    ///
    /// Components that need a periodic cleanup trigger (cache purges) hook
    /// in here instead of starting their own timers.
    pub fn with_housekeeping(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.housekeeping = Some(Box::new(hook));
        self
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval);
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Scheduled post publisher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.repo.publish_due().await {
                        Ok(published) => {
                            if !published.is_empty() {
                                info!(count = published.len(), "Published due posts");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to publish due posts");
                        }
                    }

                    if let Some(hook) = &self.housekeeping {
                        hook();
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduled post publisher shutting down");
                        break;
                    }
                }
            }
        }
    }
}
