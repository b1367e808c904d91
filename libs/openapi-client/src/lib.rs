//! Wire models for the advisor and notifier transports

pub mod models;
