//! Wire models for the deploy agent HTTP API

pub mod models;
