use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::{ChannelRegistry, Delivery};

pub const PING: &str = "ping";

/// Pushes one `ping` to `target`, or to every registered identity when there is no target.
/// Returns how many connections received it.
pub fn tick_once(registry: &ChannelRegistry, target: Option<&str>) -> usize {
    let delivered = match target {
        Some(identity) => usize::from(registry.push(identity, PING) == Delivery::Delivered),
        None => registry
            .identities()
            .iter()
            .filter(|identity| registry.push(identity, PING) == Delivery::Delivered)
            .count(),
    };
    debug!(delivered, target = target.unwrap_or("<all>"), "tick");
    delivered
}

/// Runs [`tick_once`] every `period`, starting one period from now.
pub fn spawn_ticker(registry: ChannelRegistry, period: Duration, target: Option<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tick_once(&registry, target.as_deref());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[test]
    fn targeted_tick_only_reaches_the_target() {
        let reg = ChannelRegistry::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        reg.register("Teddy Bear", a_tx);
        reg.register("other", b_tx);

        assert_eq!(tick_once(&reg, Some("Teddy Bear")), 1);
        assert_eq!(a_rx.try_recv().unwrap(), PING);
        assert!(b_rx.try_recv().is_err());
        assert_eq!(tick_once(&reg, Some("missing")), 0);
    }

    #[test]
    fn untargeted_tick_reaches_everyone() {
        let reg = ChannelRegistry::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        reg.register("a", a_tx);
        reg.register("b", b_tx);
        drop(b_rx);

        assert_eq!(tick_once(&reg, None), 1);
        assert_eq!(a_rx.try_recv().unwrap(), PING);
        assert!(!reg.is_registered("b"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn offline_target_does_not_warn_every_tick() {
        let reg = ChannelRegistry::new();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..5 {
                assert_eq!(tick_once(&reg, Some("Teddy Bear")), 0);
            }
            assert_eq!(reg.send("Teddy Bear", "up"), Delivery::Dropped);
        });
        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("no live channel").count(), 1, "{text}");
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_on_the_interval() {
        let reg = ChannelRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.register("bot", tx);
        let handle = spawn_ticker(reg.clone(), Duration::from_secs(10), None);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(rx.recv().await.as_deref(), Some(PING));
        assert_eq!(rx.recv().await.as_deref(), Some(PING));
        assert!(rx.try_recv().is_err());
        handle.abort();
    }
}
