//! Sequential batch driver over a subject catalog.
//!
//! A recording that cannot be found, loaded or analysed is recorded in the
//! report and the batch moves on.
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

use crate::catalog::SubjectCatalog;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::io::RecordingSource;
use crate::{find_artifacts, RecordingReport};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubjectOutcome {
    Done { report: RecordingReport },
    NotFound,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectResult {
    pub category: String,
    pub subject: String,
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub outcome: SubjectOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CohortReport {
    pub subjects: Vec<SubjectResult>,
}

impl CohortReport {
    pub fn n_done(&self) -> usize {
        self.count(|o| matches!(o, SubjectOutcome::Done { .. }))
    }

    pub fn n_not_found(&self) -> usize {
        self.count(|o| matches!(o, SubjectOutcome::NotFound))
    }

    pub fn n_failed(&self) -> usize {
        self.count(|o| matches!(o, SubjectOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SubjectOutcome) -> bool) -> usize {
        self.subjects.iter().filter(|s| pred(&s.outcome)).count()
    }
}

/// Run [`find_artifacts`] for every subject of every category.
///
/// Only a failure to list a category's subjects aborts the run.
pub fn run_cohort(
    catalog: &impl SubjectCatalog,
    source: &impl RecordingSource,
    categories: &[String],
    cfg: &PipelineConfig,
) -> Result<CohortReport> {
    let mut work = Vec::new();
    for category in categories {
        for subject in catalog.list_subjects(category)? {
            work.push((category.clone(), subject));
        }
    }

    let n = work.len();
    let mut report = CohortReport::default();
    for (i, (category, subject)) in work.into_iter().enumerate() {
        info!("[{}/{n}] {subject} ({category})", i + 1);
        let (path, outcome) = match catalog.resolve_recording_path(&subject) {
            Ok(Some(path)) => {
                let outcome = match source.load(&path).and_then(|buf| find_artifacts(buf, cfg)) {
                    Ok(report) => {
                        info!("{subject}: exclude {:?}", report.exclude.indices());
                        SubjectOutcome::Done { report }
                    }
                    Err(e) => {
                        warn!("{subject}: {e}");
                        SubjectOutcome::Failed { error: e.to_string() }
                    }
                };
                (Some(path), outcome)
            }
            Ok(None) => {
                warn!("{subject}: no recording found");
                (None, SubjectOutcome::NotFound)
            }
            Err(e) => {
                warn!("{subject}: {e}");
                (None, SubjectOutcome::Failed { error: e.to_string() })
            }
        };
        report.subjects.push(SubjectResult { category, subject, path, outcome });
    }

    info!(
        "cohort done: {} analysed, {} not found, {} failed",
        report.n_done(),
        report.n_not_found(),
        report.n_failed()
    );
    Ok(report)
}
