//! Deployment module

pub mod classifier;
pub mod commands;
pub mod executor;
pub mod fsm;
pub mod git;
pub mod launcher;
pub mod pipeline;
pub mod probe;
