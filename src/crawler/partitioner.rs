use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::crawler::canonical::canonicalize;

/// Deterministic shard assignment across `total_workers` cooperating
/// crawlers (spec §4.9). `worker_id` is the configured id string for this
/// worker, e.g. `"worker-3"`; its numeric suffix is its shard index.
pub struct Partitioner {
    worker_index: usize,
    total_workers: usize,
}

impl Partitioner {
    pub fn new(worker_id: String, total_workers: usize) -> Self {
        let worker_index = worker_index_of(&worker_id, total_workers);
        Partitioner {
            worker_index,
            total_workers,
        }
    }

    /// `true` iff this worker should process `url`. Always `true` when
    /// `total_workers == 1` (partitioner disabled).
    pub fn should_process(&self, url: &str) -> bool {
        if self.total_workers <= 1 {
            return true;
        }
        let canonical = match canonicalize(url, None) {
            Some(c) => c,
            None => return false,
        };
        stable_hash(canonical.as_str()) as usize % self.total_workers == self.worker_index
    }
}

fn worker_index_of(worker_id: &str, total_workers: usize) -> usize {
    worker_id
        .rsplit('-')
        .next()
        .and_then(|tail| tail.parse::<usize>().ok())
        .unwrap_or(0)
        % total_workers.max(1)
}

/// Stable, non-cryptographic hash over the canonical URL string.
/// `DefaultHasher` (stdlib SipHash) is stable within one binary run, which is
/// all the partitioner's contract requires (per-run determinism, not
/// cross-run/cross-process stability).
fn stable_hash(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_when_single_worker() {
        let p = Partitioner::new("worker-0".to_string(), 1);
        assert!(p.should_process("http://example.com/anything"));
    }

    #[test]
    fn partition_is_sound_and_exclusive() {
        let urls: Vec<String> = (0..200)
            .map(|i| format!("http://example.com/page-{i}"))
            .collect();

        let n = 4;
        let partitioners: Vec<Partitioner> = (0..n)
            .map(|i| Partitioner::new(format!("worker-{i}"), n))
            .collect();

        for url in &urls {
            let accepted: Vec<bool> = partitioners.iter().map(|p| p.should_process(url)).collect();
            let count = accepted.iter().filter(|&&b| b).count();
            assert_eq!(count, 1, "url {url} accepted by {count} partitions");
        }
    }

    #[test]
    fn same_url_stable_across_calls() {
        let p = Partitioner::new("worker-2".to_string(), 5);
        let first = p.should_process("http://example.com/x");
        let second = p.should_process("http://example.com/x");
        assert_eq!(first, second);
    }
}
