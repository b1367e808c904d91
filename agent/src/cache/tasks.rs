//! Deployment task registry

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::models::deployment::DeploymentTask;

/// In-memory map of task id to the latest published task snapshot.
///
/// Only the pipeline run owning a task publishes its snapshots. When full,
/// the oldest terminal task is evicted; in-flight tasks are never evicted.
pub struct TaskRegistry {
    entries: RwLock<HashMap<String, DeploymentTask>>,
    capacity: usize,
}

impl TaskRegistry {
    /// Create a new task registry
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a newly accepted task. Fails if the id is already taken.
    pub fn insert(&self, task: DeploymentTask) -> Result<(), AgentError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        if entries.contains_key(&task.task_id) {
            return Err(AgentError::Internal(format!(
                "task id {} already registered",
                task.task_id
            )));
        }

        // Evict oldest terminal tasks until there is room
        while entries.len() >= self.capacity {
            let oldest = entries
                .values()
                .filter(|t| t.is_terminal())
                .min_by_key(|t| t.created_at)
                .map(|t| t.task_id.clone());
            match oldest {
                Some(id) => {
                    debug!(task_id = %id, "evicting finished task");
                    entries.remove(&id);
                }
                None => {
                    warn!(
                        capacity = self.capacity,
                        size = entries.len(),
                        "task registry full of in-flight tasks"
                    );
                    break;
                }
            }
        }

        entries.insert(task.task_id.clone(), task);
        Ok(())
    }

    /// Replace the stored snapshot of a task
    pub fn publish(&self, task: &DeploymentTask) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(task.task_id.clone(), task.clone());
    }

    /// Get a task snapshot
    pub fn get(&self, task_id: &str) -> Option<DeploymentTask> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(task_id).cloned()
    }

    /// All task snapshots, oldest first
    pub fn list(&self) -> Vec<DeploymentTask> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut tasks: Vec<DeploymentTask> = entries.values().cloned().collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    /// Get registry size
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
