use super::AudioAnalyzer;
use crate::track_store::{AnalysisUpdate, RecordType, TrackStore};
use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Gave up before analysing, without touching the store.
    Aborted,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Analysis of one record's file, detached from the request that asked
/// for it. The outcome only reaches the caller through the store.
#[derive(Debug)]
pub struct BackgroundAnalysisTask {
    pub path: PathBuf,
    pub record_id: String,
    pub record_type: String,
    status: TaskStatus,
}

impl BackgroundAnalysisTask {
    pub fn new(path: PathBuf, record_id: String, record_type: String) -> Self {
        Self {
            path,
            record_id,
            record_type,
            status: TaskStatus::Pending,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    fn transition(&mut self, status: TaskStatus) {
        debug!(
            "Background analysis {}:{} {} -> {}",
            self.record_type, self.record_id, self.status, status
        );
        self.status = status;
    }

    pub async fn run(mut self, analyzer: &AudioAnalyzer, store: &dyn TrackStore) -> TaskStatus {
        let record_type: RecordType = match self.record_type.parse() {
            Ok(record_type) => record_type,
            Err(e) => {
                warn!("Skipping background analysis of {:?}: {}", self.path, e);
                self.transition(TaskStatus::Aborted);
                return self.status;
            }
        };

        self.transition(TaskStatus::Running);
        let result = analyzer.analyze(&self.path).await;
        let update = AnalysisUpdate::from_result(&result, Utc::now());

        match store.update_metadata(record_type, &self.record_id, &update) {
            Ok(()) => {
                info!(
                    "Background analysis complete for {}:{} (method={})",
                    record_type, self.record_id, result.method
                );
                self.transition(TaskStatus::Completed);
            }
            Err(e) => {
                error!(
                    "Background analysis failed for {}:{}: {:#}",
                    record_type, self.record_id, e
                );
                self.transition(TaskStatus::Failed);
            }
        }
        self.status
    }
}

/// Spawn a [`BackgroundAnalysisTask`] on the current runtime.
pub fn spawn_background_analysis(
    analyzer: AudioAnalyzer,
    task: BackgroundAnalysisTask,
    store: Arc<dyn TrackStore>,
) -> tokio::task::JoinHandle<TaskStatus> {
    tokio::spawn(async move { task.run(&analyzer, store.as_ref()).await })
}
