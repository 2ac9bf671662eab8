//! The eight streaming stages of the reconstruction pipeline.
//!
//! Stages communicate only through named JSONL streams spilled under the
//! job's temp directory and uploaded to the object store at stage
//! boundaries. Execution is strictly sequential; within a stage, processing
//! is page-by-page.

pub mod build_rows;
pub mod clean_data;
pub mod column_groups;
pub mod column_range;
pub mod format_clean;
pub mod header_extract;
pub mod header_recognize;
pub mod merge_rows;

use std::path::PathBuf;

use crate::error::Result;
use crate::spill::SpillDir;
use crate::store::{ObjectStore, stage_key};

/// Everything a stage needs to read its inputs and persist its output.
pub struct StageContext<'a> {
    /// Job this run belongs to.
    pub job_id: &'a str,
    /// Owner of the job, when logged in.
    pub user_id: Option<&'a str>,
    /// Spill key prefix for this job's streams.
    pub spill_prefix: &'a str,
    /// Job-scoped spill directory.
    pub spill: &'a SpillDir,
    /// Object store receiving stage outputs.
    pub store: &'a dyn ObjectStore,
}

impl StageContext<'_> {
    /// Local path of a stage's stream.
    pub fn stream_path(&self, stage: &str) -> PathBuf {
        self.spill.stream_path(stage)
    }

    /// Upload a completed stage stream to the object store and return its key.
    pub fn upload_stream(&self, stage: &str) -> Result<String> {
        let key = stage_key(self.spill_prefix, self.user_id, self.job_id, stage);
        self.store.put_file(&key, &self.stream_path(stage))?;
        tracing::debug!(stage, key = key.as_str(), "stage stream uploaded");
        Ok(key)
    }
}
