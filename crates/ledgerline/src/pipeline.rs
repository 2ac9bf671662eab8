//! Sequential orchestration of the reconstruction stages.
//!
//! Stages run strictly in dependency order; a fatal error in any stage
//! marks the job failed with the failing stage's details and propagates.
//! Scoring runs after the results are persisted and is deliberately
//! non-fatal.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::jobs::{FailureDetails, JobBackend, JobRecord, JobRequest, JobStatus, JobStore, JobUpdate};
use crate::metrics::MetricsSink;
use crate::output::{self, SavedOutputs};
use crate::score::{self, ScoreResult};
use crate::source::PageSource;
use crate::spill::SpillDir;
use crate::stages::{
    StageContext, build_rows, clean_data, column_groups, column_range, format_clean,
    header_extract, header_recognize, merge_rows,
};
use crate::store::ObjectStore;

/// What a completed pipeline run hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Job the run belonged to.
    pub job_id: String,
    /// Persisted outputs and their summary.
    pub outputs: SavedOutputs,
    /// Balance-consistency score, when scoring succeeded.
    pub score: Option<ScoreResult>,
}

/// Derive a stable job id for anonymous requests.
fn effective_job_id(request: &JobRequest) -> String {
    match &request.job_id {
        Some(id) => id.clone(),
        None => {
            let stem = request
                .filename
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&request.filename);
            let sanitized: String = stem
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect();
            format!("anon-{sanitized}")
        }
    }
}

/// Run the full pipeline for one job.
///
/// The job record is created if absent, moved to `processing`, and finally
/// to `success` or `failed`. All spill files live under a job-scoped temp
/// directory that is removed on exit, including failures.
pub fn run_job<S: PageSource>(
    source: &S,
    request: &JobRequest,
    config: &Config,
    store: &dyn ObjectStore,
    jobs: &JobBackend,
    metrics: &dyn MetricsSink,
) -> Result<PipelineReport> {
    let job_id = effective_job_id(request);
    tracing::info!(
        job_id = job_id.as_str(),
        filename = request.filename.as_str(),
        mode = ?request.mode,
        pages = request.pages,
        "pipeline starting"
    );

    if jobs.get_job(&job_id)?.is_none() {
        jobs.add_job(JobRecord::new(
            &job_id,
            request.user_id.as_deref(),
            &request.source_key,
        ))?;
    }
    jobs.update_job_status(&job_id, JobStatus::Processing, JobUpdate::default())?;

    let spill = SpillDir::for_job(&job_id)?;
    let ctx = StageContext {
        job_id: &job_id,
        user_id: request.user_id.as_deref(),
        spill_prefix: config.spill_prefix(request.is_logged_in()),
        spill: &spill,
        store,
    };

    let max_pages = request.pages;
    let mut current_stage = header_extract::STAGE;
    let staged: Result<SavedOutputs> = (|| {
        let detected = header_extract::run(source, max_pages, &ctx)?;

        current_stage = header_recognize::STAGE;
        let headers = header_recognize::run(&detected, &ctx)?;

        current_stage = clean_data::STAGE;
        clean_data::run(source, max_pages, &headers, &ctx)?;

        current_stage = column_range::STAGE;
        column_range::run(source, &headers, &ctx)?;

        current_stage = column_groups::STAGE;
        column_groups::run(&headers, &ctx)?;

        current_stage = build_rows::STAGE;
        build_rows::run(source, &ctx)?;

        current_stage = merge_rows::STAGE;
        merge_rows::run(&ctx)?;

        current_stage = format_clean::STAGE;
        format_clean::run(config.country.as_deref(), &ctx)?;

        current_stage = "save";
        output::run(&request.source_key, &ctx)
    })();

    let outputs = match staged {
        Ok(outputs) => outputs,
        Err(error) => {
            tracing::error!(
                job_id = job_id.as_str(),
                stage = current_stage,
                %error,
                "pipeline failed"
            );
            let failure = FailureDetails {
                failed_stage: current_stage.to_string(),
                error_type: error.error_type().to_string(),
                message: error.to_string(),
            };
            // Best effort: the failure itself must surface even when the
            // status write also fails.
            let _ = jobs.update_job_status(
                &job_id,
                JobStatus::Failed,
                JobUpdate {
                    failure: Some(failure),
                    ..JobUpdate::default()
                },
            );
            return Err(error);
        }
    };

    jobs.update_job_status(
        &job_id,
        JobStatus::Success,
        JobUpdate {
            result_path: Some(outputs.result_path.clone()),
            downloads: Some(outputs.downloads.clone()),
            num_pages: Some(outputs.num_pages),
            ..JobUpdate::default()
        },
    )?;

    // Scoring is non-fatal: the result is already persisted.
    let score = match score::run(&ctx, jobs, metrics) {
        Ok(score) => Some(score),
        Err(error) => {
            tracing::warn!(job_id = job_id.as_str(), %error, "result scoring failed");
            None
        }
    };

    tracing::info!(job_id = job_id.as_str(), "pipeline completed");
    Ok(PipelineReport {
        job_id,
        outputs,
        score,
    })
}

/// Convenience wrapper: process a request against filesystem-backed stores
/// derived from the configuration.
pub fn process_request<S: PageSource>(
    source: &S,
    request: &JobRequest,
    config: &Config,
) -> Result<PipelineReport> {
    let store = crate::store::FsObjectStore::new(&config.storage_root)?;
    let jobs = JobBackend::for_user(&config.storage_root, request.is_logged_in())?;
    let metrics = crate::metrics::LogMetricsSink;
    run_job(source, request, config, &store, &jobs, &metrics)
}
