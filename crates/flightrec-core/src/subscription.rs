//! Subscription retry: activates pending channels as they become available.
//!
//! A background task polls [`ChannelDiscovery`] with a bounded exponential
//! backoff until every configured channel is active. [`Readiness`] resolves
//! once at least one channel is active, which is what startup waits on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::recorder::Recorder;

/// Attempts between "still subscribing" debug lines.
const STILL_SUBSCRIBING_EVERY: u64 = 50;

/// Reports which message type a channel carries, once it exists.
pub trait ChannelDiscovery: Send + Sync {
    /// `None` while the channel is not available yet.
    fn message_type(&self, channel: &str) -> Option<String>;
}

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(5), 2.0)
    }
}

impl Backoff {
    /// `multiplier` below 1 is treated as 1; `max` below `initial` is raised to it.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        Self {
            initial,
            max: max.max(initial),
            multiplier,
        }
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay to use after `current`, capped at `max`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max))
    }
}

/// One pass over pending channels. Returns how many became active.
pub fn subscribe_pending(recorder: &Recorder, discovery: &dyn ChannelDiscovery) -> usize {
    let mut activated = 0;
    for channel in recorder.channels().iter().filter(|c| !c.is_active()) {
        if let Some(message_type) = discovery.message_type(channel.name()) {
            if recorder.activate(channel.name(), &message_type) {
                activated += 1;
            }
        }
    }
    activated
}

/// Resolves once at least one channel is active.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<bool>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for readiness.
    ///
    /// Returns `false` if the subscriber finished without ever becoming
    /// ready (no channels configured).
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|ready| *ready).await.is_ok()
    }
}

/// Spawn the retry loop on the current tokio runtime.
pub fn spawn_subscriber(
    recorder: Arc<Recorder>,
    discovery: Arc<dyn ChannelDiscovery>,
    backoff: Backoff,
) -> (JoinHandle<()>, Readiness) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(run_subscriber(recorder, discovery, backoff, tx));
    (handle, Readiness { rx })
}

async fn run_subscriber(
    recorder: Arc<Recorder>,
    discovery: Arc<dyn ChannelDiscovery>,
    backoff: Backoff,
    ready: watch::Sender<bool>,
) {
    let mut delay = backoff.initial();
    let mut attempts: u64 = 0;

    loop {
        let activated = subscribe_pending(&recorder, discovery.as_ref());
        attempts += 1;

        if recorder.active_count() > 0 && !*ready.borrow() {
            ready.send_replace(true);
            info!(
                active = recorder.active_count(),
                pending = ?recorder.pending_channels(),
                "recorder ready"
            );
        }

        let pending = recorder.pending_channels();
        if pending.is_empty() {
            info!(attempts, "all channels subscribed");
            return;
        }

        delay = if activated > 0 {
            backoff.initial()
        } else {
            backoff.next_delay(delay)
        };
        if attempts % STILL_SUBSCRIBING_EVERY == 0 {
            debug!(attempts, pending = ?pending, "still subscribing");
        }
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::fakes::{MemorySinkFactory, StaticDiscovery};
    use crate::retention::RetentionWindow;

    fn recorder(names: &[&str]) -> Arc<Recorder> {
        let channels = names
            .iter()
            .map(|n| ChannelConfig {
                name: n.to_string(),
                retention: RetentionWindow::new(Duration::from_secs(10)),
            })
            .collect();
        Arc::new(Recorder::new(
            channels,
            "/tmp/flightrec-test",
            Arc::new(MemorySinkFactory::new()),
        ))
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let b = Backoff::default();
        let mut d = b.initial();
        let mut seen = vec![d];
        for _ in 0..8 {
            d = b.next_delay(d);
            seen.push(d);
        }
        assert_eq!(seen[1], Duration::from_millis(200));
        assert_eq!(seen[2], Duration::from_millis(400));
        assert_eq!(*seen.last().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn backoff_sanitizes_inputs() {
        let b = Backoff::new(Duration::from_secs(2), Duration::from_secs(1), 0.5);
        assert_eq!(b.max(), Duration::from_secs(2));
        assert_eq!(b.next_delay(b.initial()), Duration::from_secs(2));

        let huge = Backoff::new(Duration::from_secs(1), Duration::from_secs(5), 1e300);
        assert_eq!(huge.next_delay(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn subscribe_pending_activates_available_channels_once() {
        let rec = recorder(&["/a", "/b"]);
        let discovery = StaticDiscovery::new();
        assert_eq!(subscribe_pending(&rec, &discovery), 0);

        discovery.publish("/a", "nav/Odometry");
        assert_eq!(subscribe_pending(&rec, &discovery), 1);
        assert_eq!(subscribe_pending(&rec, &discovery), 0);
        assert_eq!(rec.pending_channels(), vec!["/b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_fires_after_first_activation() {
        let rec = recorder(&["/a", "/b"]);
        let discovery = Arc::new(StaticDiscovery::new());
        let (handle, mut readiness) =
            spawn_subscriber(rec.clone(), discovery.clone(), Backoff::default());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!readiness.is_ready());

        discovery.publish("/b", "sensor/Imu");
        assert!(readiness.wait().await);
        assert_eq!(rec.pending_channels(), vec!["/a"]);
        assert!(!handle.is_finished());

        discovery.publish("/a", "nav/Odometry");
        handle.await.unwrap();
        assert!(rec.pending_channels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_channels_never_becomes_ready() {
        let rec = recorder(&[]);
        let (handle, mut readiness) = spawn_subscriber(
            rec,
            Arc::new(StaticDiscovery::new()),
            Backoff::default(),
        );
        handle.await.unwrap();
        assert!(!readiness.wait().await);
    }
}
