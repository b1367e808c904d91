//! Stage failure classification
//!
//! A [`ClassificationPolicy`] holds an ordered list of [`FailurePredicate`]s
//! per stage. A stage with no predicates always passes, so by default only
//! the Cloning stage can be classified as failed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::deploy::git::CLONE_FAILURE_KEYWORDS;
use crate::models::deployment::Stage;

/// True iff `output` contains one of the clone failure keywords (case-sensitive)
pub fn is_failure(output: &str) -> bool {
    CLONE_FAILURE_KEYWORDS.iter().any(|k| output.contains(k))
}

/// Pluggable matcher deciding whether stage output marks a failure
pub trait FailurePredicate: Send + Sync + fmt::Debug {
    fn matches(&self, output: &str) -> bool;

    /// Short description used in failure reasons
    fn describe(&self) -> String;
}

/// Case-sensitive substring match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainsKeyword(pub String);

impl FailurePredicate for ContainsKeyword {
    fn matches(&self, output: &str) -> bool {
        output.contains(self.0.as_str())
    }

    fn describe(&self) -> String {
        format!("output contains {:?}", self.0)
    }
}

/// Per-stage failure predicates
#[derive(Debug, Clone, Default)]
pub struct ClassificationPolicy {
    predicates: HashMap<Stage, Vec<Arc<dyn FailurePredicate>>>,
}

impl ClassificationPolicy {
    /// Policy with no predicates: every stage passes
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy classifying only the Cloning stage, by keyword
    pub fn clone_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keywords
            .into_iter()
            .fold(Self::new(), |policy, k| {
                policy.with(Stage::Cloning, ContainsKeyword(k.into()))
            })
    }

    /// Append a predicate for a stage
    pub fn with(mut self, stage: Stage, predicate: impl FailurePredicate + 'static) -> Self {
        self.predicates
            .entry(stage)
            .or_default()
            .push(Arc::new(predicate));
        self
    }

    /// Whether the stage has any predicates configured
    pub fn is_classified(&self, stage: Stage) -> bool {
        self.predicates.get(&stage).is_some_and(|p| !p.is_empty())
    }

    /// First predicate matching `output`, described. `None` means the stage passed.
    pub fn classify(&self, stage: Stage, output: &str) -> Option<String> {
        self.predicates
            .get(&stage)?
            .iter()
            .find(|p| p.matches(output))
            .map(|p| p.describe())
    }
}
