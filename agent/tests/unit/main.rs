//! Integration tests for the deploy agent

mod common;
mod test_pipeline;
mod test_server;
