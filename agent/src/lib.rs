//! Deploy Agent Library
//!
//! Accepts web application deployment requests and drives each one through
//! clone, install, start and verify stages on the local host, reporting the
//! outcome through a push notifier with AI-assisted diagnostics on failure.

pub mod advisor;
pub mod app;
pub mod cache;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod notify;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
