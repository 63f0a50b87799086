//! Multi-layer job orchestration.

use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::info;

use super::layer::{LayerAutomation, LayerReport};
use crate::error::Result;
use crate::job::JobScan;

/// Progress notification from a running job.
#[derive(Debug, Clone)]
pub enum JobProgress {
    LayerStarted { layer: u32, total: u32 },
    LayerCompleted { layer: u32, total: u32, poll_attempts: u32 },
    Completed { layers: u32, timestamp: DateTime<Local> },
    Failed { layer: u32, error: String },
}

/// Result of a multi-layer run.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub layer_count: u32,
    pub layers: Vec<LayerReport>,
    pub started_at: DateTime<Local>,
    pub duration_secs: f64,
}

impl JobReport {
    /// Get summary message.
    pub fn summary(&self) -> String {
        let polls: u32 = self.layers.iter().map(|l| l.poll_attempts).sum();
        format!(
            "Marked {}/{} layers, {} status polls (started {}, took {:.1}s)",
            self.layers.len(),
            self.layer_count,
            polls,
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.duration_secs
        )
    }
}

/// Mark every layer of a scanned job, in order, stopping at the first failure.
///
/// # Errors
/// `AppError::FileFormat` when the scan found no first-layer file, otherwise
/// the error of the failing layer.
pub async fn run_job<F>(automation: &mut LayerAutomation, scan: &JobScan, mut on_progress: F) -> Result<JobReport>
where
    F: FnMut(JobProgress),
{
    let base = scan.require_first_layer()?;
    let total = scan.layer_count;
    let started_at = Local::now();
    let start = Instant::now();

    info!("Starting job from {} ({total} layers)", base.display());

    let mut layers = Vec::with_capacity(total as usize);
    for layer in 1..=total {
        on_progress(JobProgress::LayerStarted { layer, total });

        match automation.run_layer(base, layer).await {
            Ok(report) => {
                on_progress(JobProgress::LayerCompleted {
                    layer,
                    total,
                    poll_attempts: report.poll_attempts,
                });
                layers.push(report);
            }
            Err(e) => {
                on_progress(JobProgress::Failed {
                    layer,
                    error: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    on_progress(JobProgress::Completed {
        layers: total,
        timestamp: Local::now(),
    });

    let report = JobReport {
        layer_count: total,
        layers,
        started_at,
        duration_secs: start.elapsed().as_secs_f64(),
    };
    info!("Job complete: {}", report.summary());
    Ok(report)
}
