pub mod classify;
pub mod core;
pub mod crawler;
pub mod extract;
pub mod fetcher;
pub mod mcp;
pub mod scheduler;
pub mod search;
pub mod store;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::{Core, CrawlError};

pub use crawler::CrawlConfig;
pub use scheduler::{JobSpec, Scheduler, SchedulerConfig};
pub use store::Store;
