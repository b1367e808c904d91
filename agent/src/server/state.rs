//! Server state

use std::sync::Arc;

use crate::cache::tasks::TaskRegistry;
use crate::storage::settings::Settings;
use crate::workers::deployer::Deployer;

/// Server state shared across handlers
pub struct ServerState {
    pub settings: Arc<Settings>,
    pub registry: Arc<TaskRegistry>,
    pub deployer: Arc<Deployer>,
}

impl ServerState {
    pub fn new(settings: Arc<Settings>, registry: Arc<TaskRegistry>, deployer: Arc<Deployer>) -> Self {
        Self {
            settings,
            registry,
            deployer,
        }
    }
}
