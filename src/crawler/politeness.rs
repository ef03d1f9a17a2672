use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Per-host minimum-interval gate.
///
/// Mirrors the fast-path-read/slow-path-write map shape the fetcher uses for
/// its domain rate limiters, but the critical section here spans the whole
/// read-wait-write sequence so that two callers for the same host can never
/// both observe a stale `last_dispatch` and race past the gate.
#[derive(Clone, Default)]
pub struct PolitenessScheduler {
    hosts: Arc<Mutex<HashMap<String, Instant>>>,
}

impl PolitenessScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until at least `delay` has elapsed since the last dispatch to
    /// `host`, then record now as the new last-dispatch time. The first call
    /// for a host never waits.
    pub async fn wait_for_host(&self, host: &str, delay: Duration) {
        // A single map-wide mutex serializes the whole read/compute/record
        // section; distinct hosts still only contend for the map lookup,
        // not for each other's sleeps, since we drop the guard before
        // sleeping and only briefly re-acquire it to update the slot below.
        let wait = {
            let mut hosts = self.hosts.lock().await;
            let now = Instant::now();
            let earliest = hosts.get(host).map(|&last| last + delay);
            let wait = earliest
                .map(|earliest| earliest.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);
            hosts.insert(host.to_string(), now + wait);
            wait
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_does_not_wait() {
        let sched = PolitenessScheduler::new();
        let start = Instant::now();
        sched.wait_for_host("a", Duration::from_millis(200)).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn second_call_waits_for_the_window() {
        let sched = PolitenessScheduler::new();
        sched.wait_for_host("a", Duration::from_millis(150)).await;
        let start = Instant::now();
        sched.wait_for_host("a", Duration::from_millis(150)).await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn distinct_hosts_do_not_block_each_other() {
        let sched = PolitenessScheduler::new();
        sched.wait_for_host("a", Duration::from_millis(500)).await;
        let start = Instant::now();
        sched.wait_for_host("b", Duration::from_millis(500)).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn concurrent_callers_serialize_on_same_host() {
        let sched = PolitenessScheduler::new();
        let delay = Duration::from_millis(100);
        sched.wait_for_host("a", delay).await;

        let s1 = sched.clone();
        let s2 = sched.clone();
        let (t1, t2) = tokio::join!(
            tokio::spawn(async move {
                s1.wait_for_host("a", delay).await;
                Instant::now()
            }),
            tokio::spawn(async move {
                s2.wait_for_host("a", delay).await;
                Instant::now()
            }),
        );
        let t1 = t1.unwrap();
        let t2 = t2.unwrap();
        let gap = if t1 > t2 {
            t1.duration_since(t2)
        } else {
            t2.duration_since(t1)
        };
        assert!(gap >= Duration::from_millis(80));
    }
}
