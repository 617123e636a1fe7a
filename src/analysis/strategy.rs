//! Ordered primary/fallback strategies for one metric.

use crate::tool::{ExternalTool, ToolError};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("File not found")]
    InputNotFound,

    #[error("Could not parse {0} from tool output")]
    ParseFailure(&'static str),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl AnalysisError {
    /// Whether the tool itself is unusable, as opposed to a file it could
    /// not make sense of.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            AnalysisError::Tool(ToolError::Spawn { .. }) | AnalysisError::Tool(ToolError::Io(_))
        )
    }
}

/// One way of measuring a metric.
///
/// `Ok(None)` means the strategy ran but has nothing to report.
#[async_trait]
pub trait MetricStrategy<T: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn measure(&self, tool: &dyn ExternalTool, path: &Path)
        -> Result<Option<T>, AnalysisError>;
}

/// What a [`StrategyCascade`] run ended with.
#[derive(Debug)]
pub struct CascadeOutcome<T> {
    pub value: Option<T>,
    /// Index of the strategy that produced `value`.
    pub produced_by: Option<usize>,
    pub errors: Vec<AnalysisError>,
}

impl<T> CascadeOutcome<T> {
    pub fn from_primary(&self) -> bool {
        self.produced_by == Some(0)
    }

    pub fn first_hard_error(&self) -> Option<&AnalysisError> {
        self.errors.iter().find(|e| e.is_hard())
    }
}

/// Strategies tried in order until one yields a value.
pub struct StrategyCascade<T> {
    metric: &'static str,
    strategies: Vec<Box<dyn MetricStrategy<T>>>,
}

impl<T: Send> StrategyCascade<T> {
    pub fn new(metric: &'static str) -> Self {
        Self {
            metric,
            strategies: Vec::new(),
        }
    }

    pub fn then<S: MetricStrategy<T> + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn metric(&self) -> &'static str {
        self.metric
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, tool: &dyn ExternalTool, path: &Path) -> CascadeOutcome<T> {
        let mut errors = Vec::new();

        for (index, strategy) in self.strategies.iter().enumerate() {
            if index > 0 {
                warn!(
                    "{}: falling back to {} for {:?}",
                    self.metric,
                    strategy.name(),
                    path
                );
            }
            match strategy.measure(tool, path).await {
                Ok(Some(value)) => {
                    debug!("{}: {} produced a value", self.metric, strategy.name());
                    return CascadeOutcome {
                        value: Some(value),
                        produced_by: Some(index),
                        errors,
                    };
                }
                Ok(None) => {
                    debug!("{}: {} had nothing to report", self.metric, strategy.name());
                }
                Err(e) => {
                    debug!("{}: {} failed: {}", self.metric, strategy.name(), e);
                    errors.push(e);
                }
            }
        }

        CascadeOutcome {
            value: None,
            produced_by: None,
            errors,
        }
    }
}
