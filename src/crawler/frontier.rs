use std::collections::{HashSet, VecDeque};

use regex::Regex;
use url::Url;

use crate::crawler::canonical::{canonicalize_and_hash, matches_domain_list};
use crate::crawler::partitioner::Partitioner;
use crate::models::{CrawlOptions, QueueItem, Strategy};

/// Compiled, run-scoped admission filters derived from [`CrawlOptions`] once
/// at orchestrator start-up (spec §4.8, §9 open question 1: the seed host is
/// captured explicitly here rather than inferred from frontier contents).
pub struct AdmissionFilters {
    pub seed_host: String,
    pub stay_in_domain: bool,
    pub max_depth: u32,
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub url_patterns: Vec<Regex>,
    pub exclude_patterns: Vec<Regex>,
    pub partitioner: Partitioner,
}

impl AdmissionFilters {
    pub fn new(options: &CrawlOptions, seed_host: String) -> Result<Self, regex::Error> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, regex::Error> {
            patterns.iter().map(|p| Regex::new(p)).collect()
        };
        Ok(AdmissionFilters {
            seed_host,
            stay_in_domain: options.stay_in_domain,
            max_depth: options.max_depth,
            allowed_domains: options.allowed_domains.clone(),
            blocked_domains: options.blocked_domains.clone(),
            url_patterns: compile(&options.url_patterns)?,
            exclude_patterns: compile(&options.exclude_patterns)?,
            partitioner: Partitioner::new(options.worker_id.clone(), options.total_workers),
        })
    }

    /// Evaluate admission rules 3-8 of spec §4.8 against an already
    /// canonicalized URL. Rules 1-2 (visited / already-in-frontier) are the
    /// frontier's own job since they need its internal state.
    fn passes(&self, canonical: &Url) -> bool {
        if self.stay_in_domain {
            match canonical.host_str() {
                Some(host) if host.eq_ignore_ascii_case(&self.seed_host) => {}
                _ => return false,
            }
        }
        if !self.allowed_domains.is_empty()
            && !matches_domain_list(canonical, &self.allowed_domains)
        {
            return false;
        }
        if !self.blocked_domains.is_empty() && matches_domain_list(canonical, &self.blocked_domains)
        {
            return false;
        }
        if !self.url_patterns.is_empty()
            && !self.url_patterns.iter().any(|re| re.is_match(canonical.as_str()))
        {
            return false;
        }
        if self
            .exclude_patterns
            .iter()
            .any(|re| re.is_match(canonical.as_str()))
        {
            return false;
        }
        if !self.partitioner.should_process(canonical.as_str()) {
            return false;
        }
        true
    }
}

/// Deduplicated, strategy-ordered work queue (spec §4.8).
///
/// `VecDeque` gives O(1) push/pop at both ends: BFS pops the head, DFS pops
/// the tail, and admission order is preserved by always pushing at the tail,
/// matching the tie-break rule ("ties broken by admission order").
pub struct Frontier {
    strategy: Strategy,
    queue: VecDeque<QueueItem>,
    in_frontier: HashSet<String>,
}

impl Frontier {
    pub fn new(strategy: Strategy) -> Self {
        Frontier {
            strategy,
            queue: VecDeque::new(),
            in_frontier: HashSet::new(),
        }
    }

    /// Rebuild a frontier from a checkpoint's saved items (resume path).
    /// Items are trusted as already having passed admission in a prior run.
    pub fn restore(strategy: Strategy, items: Vec<QueueItem>) -> Self {
        let in_frontier = items.iter().map(|i| i.hash.clone()).collect();
        Frontier {
            strategy,
            queue: items.into(),
            in_frontier,
        }
    }

    /// Attempt to admit `raw_url` at `depth`, resolving against `base` if
    /// relative. Returns the admitted item's canonical `Url` on success.
    /// Side-effect-free on rejection.
    #[allow(clippy::too_many_arguments)]
    pub fn try_push(
        &mut self,
        raw_url: &str,
        base: Option<&Url>,
        depth: u32,
        from_url: Option<String>,
        visited: &HashSet<String>,
        filters: &AdmissionFilters,
    ) -> Option<Url> {
        if depth > filters.max_depth {
            return None;
        }

        let (canonical, hash) = canonicalize_and_hash(raw_url, base)?;

        if visited.contains(&hash) {
            return None;
        }
        if self.in_frontier.contains(&hash) {
            return None;
        }
        if !filters.passes(&canonical) {
            return None;
        }

        self.in_frontier.insert(hash.clone());
        self.queue.push_back(QueueItem {
            url: canonical.to_string(),
            depth,
            from_url,
            hash,
        });
        Some(canonical)
    }

    /// Pop the next item per strategy: BFS from the head, DFS from the tail.
    pub fn pop(&mut self) -> Option<QueueItem> {
        let item = match self.strategy {
            Strategy::Bfs => self.queue.pop_front(),
            Strategy::Dfs => self.queue.pop_back(),
        };
        if let Some(ref item) = item {
            self.in_frontier.remove(&item.hash);
        }
        item
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of pending items, for checkpointing.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.queue.iter().cloned().collect()
    }
}
