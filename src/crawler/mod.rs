pub mod canonical;
pub mod checkpoint;
pub mod extractor;
pub mod fetcher;
pub mod forms;
pub mod frontier;
pub mod mime_filter;
pub mod partitioner;
pub mod politeness;
pub mod robots;
pub mod sitemap;

pub use checkpoint::CheckpointStore;
pub use fetcher::Fetcher;
pub use frontier::{AdmissionFilters, Frontier};
pub use partitioner::Partitioner;
pub use politeness::PolitenessScheduler;
pub use robots::RobotsChecker;
