//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is alive.
//!
//! # Tasks
//! - Sweeper: Removes expired entries a namespace's timers missed

mod sweeper;

pub use sweeper::spawn_sweeper;
