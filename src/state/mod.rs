//! State module for tracking crawl progress
//!
//! This module provides the per-forum state owned by a single crawl task.
//!
//! # Components
//!
//! - `CrawlState`: the task's position in its `Idle → Fetching → Delivering` cycle
//! - `Cursor`: the pagination marker handed back and forth with the paginator

mod crawl_state;
mod cursor;

// Re-export main types
pub use crawl_state::CrawlState;
pub use cursor::Cursor;
