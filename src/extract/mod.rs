//! HTML extraction for news listing pages.
//!
//! Extraction runs in two levels:
//!
//! 1. [`cascade`]: locate the news container, then the item nodes inside it
//! 2. [`item`]: pull title, time, source and description out of each node
//!
//! Both levels use ordered pattern tables so a layout change on the upstream
//! site only requires adding a row, not restructuring control flow.

pub mod cascade;
pub mod item;

pub use cascade::{CONTAINER_PATTERNS, locate_container, locate_items};
pub use item::{Extracted, ItemExtractor};
