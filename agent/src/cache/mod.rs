//! In-memory caches

pub mod tasks;
