//! Job intake and job-state persistence.
//!
//! Two interchangeable key/value backends hold job state: logged-in users'
//! jobs go to a relational-style table, anonymous jobs to a wide-column
//! style document store whose type system has no floats (scores are stored
//! as decimal strings there). The backends differ in nothing else, so a
//! tagged [`JobBackend`] picks one at construction; no trait objects are
//! involved.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};

/// Processing mode requested for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Full geometric reconstruction pipeline.
    #[default]
    Generic,
    /// Reduced pipeline for simple single-table statements.
    Simple,
}

fn default_pages() -> usize {
    10
}

/// Message that kicks off a parsing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub filename: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub job_id: Option<String>,
    pub source_key: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_pages")]
    pub pages: usize,
}

impl JobRequest {
    /// A job belongs to a logged-in user when it carries a job id.
    pub fn is_logged_in(&self) -> bool {
        self.job_id.is_some()
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

/// Details recorded when a stage kills a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetails {
    pub failed_stage: String,
    pub error_type: String,
    pub message: String,
}

/// Persistent state of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub user_id: Option<String>,
    pub source_key: String,
    pub status: JobStatus,
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub downloads: BTreeMap<String, String>,
    #[serde(default)]
    pub num_pages: Option<usize>,
    #[serde(default)]
    pub result_score: Option<f64>,
    #[serde(default)]
    pub failure: Option<FailureDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A fresh pending job.
    pub fn new(job_id: &str, user_id: Option<&str>, source_key: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            user_id: user_id.map(str::to_string),
            source_key: source_key.to_string(),
            status: JobStatus::Pending,
            result_path: None,
            downloads: BTreeMap::new(),
            num_pages: None,
            result_score: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Optional fields applied alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub result_path: Option<String>,
    pub downloads: Option<BTreeMap<String, String>>,
    pub num_pages: Option<usize>,
    pub result_score: Option<f64>,
    pub failure: Option<FailureDetails>,
}

/// Operations every job backend must provide.
pub trait JobStore {
    /// Persist a new job.
    fn add_job(&self, job: JobRecord) -> Result<()>;

    /// Fetch a job by id.
    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>>;

    /// Transition a job's status, merging in `update`'s populated fields.
    fn update_job_status(&self, job_id: &str, status: JobStatus, update: JobUpdate) -> Result<()>;

    /// List a user's jobs, newest first, optionally filtered by status.
    fn get_user_jobs(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobRecord>>;
}

fn apply_update(job: &mut JobRecord, status: JobStatus, update: JobUpdate) {
    job.status = status;
    if let Some(path) = update.result_path {
        job.result_path = Some(path);
    }
    if let Some(downloads) = update.downloads {
        job.downloads = downloads;
    }
    if let Some(num_pages) = update.num_pages {
        job.num_pages = Some(num_pages);
    }
    if let Some(score) = update.result_score {
        job.result_score = Some(score);
    }
    if let Some(failure) = update.failure {
        job.failure = Some(failure);
    }
    job.updated_at = Utc::now();
}

/// Relational-style backend: a single JSON table of job rows.
#[derive(Debug, Clone)]
pub struct RelationalJobStore {
    table_path: PathBuf,
}

impl RelationalJobStore {
    /// Open or create the table under `root`.
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| ParseError::Storage(e.to_string()))?;
        Ok(Self {
            table_path: root.join("jobs.json"),
        })
    }

    fn read_table(&self) -> Result<Vec<JobRecord>> {
        if !self.table_path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.table_path).map_err(|e| ParseError::Storage(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ParseError::Storage(e.to_string()))
    }

    fn write_table(&self, jobs: &[JobRecord]) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(jobs).map_err(|e| ParseError::Storage(e.to_string()))?;
        fs::write(&self.table_path, bytes).map_err(|e| ParseError::Storage(e.to_string()))
    }
}

impl JobStore for RelationalJobStore {
    fn add_job(&self, job: JobRecord) -> Result<()> {
        let mut jobs = self.read_table()?;
        jobs.push(job);
        self.write_table(&jobs)
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.read_table()?.into_iter().find(|j| j.job_id == job_id))
    }

    fn update_job_status(&self, job_id: &str, status: JobStatus, update: JobUpdate) -> Result<()> {
        let mut jobs = self.read_table()?;
        let job = jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or_else(|| ParseError::Storage(format!("job not found: {job_id}")))?;
        apply_update(job, status, update);
        self.write_table(&jobs)
    }

    fn get_user_jobs(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = self
            .read_table()?
            .into_iter()
            .filter(|j| j.user_id.as_deref() == Some(user_id))
            .filter(|j| status.is_none_or(|s| j.status == s))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }
}

/// Wide-column-style backend: one JSON document per job.
///
/// This backend's type system carries no floats, so `result_score` is
/// stored as a decimal string and parsed back on read.
#[derive(Debug, Clone)]
pub struct WideColumnJobStore {
    root: PathBuf,
}

/// On-disk shape of a job in the wide-column backend.
#[derive(Debug, Serialize, Deserialize)]
struct WideColumnRow {
    #[serde(flatten)]
    job: JobRecord,
    #[serde(default)]
    result_score_decimal: Option<String>,
}

impl WideColumnJobStore {
    /// Open or create the document root.
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| ParseError::Storage(e.to_string()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn doc_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }

    fn write_doc(&self, job: JobRecord) -> Result<()> {
        let path = self.doc_path(&job.job_id);
        let mut row = WideColumnRow {
            result_score_decimal: job.result_score.map(|s| s.to_string()),
            job,
        };
        // The float never hits the wire; only its decimal rendering does.
        row.job.result_score = None;
        let bytes =
            serde_json::to_vec_pretty(&row).map_err(|e| ParseError::Storage(e.to_string()))?;
        fs::write(&path, bytes).map_err(|e| ParseError::Storage(e.to_string()))
    }

    fn read_doc(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let path = self.doc_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| ParseError::Storage(e.to_string()))?;
        let row: WideColumnRow =
            serde_json::from_slice(&bytes).map_err(|e| ParseError::Storage(e.to_string()))?;
        let mut job = row.job;
        job.result_score = row
            .result_score_decimal
            .as_deref()
            .and_then(|s| s.parse().ok());
        Ok(Some(job))
    }
}

impl JobStore for WideColumnJobStore {
    fn add_job(&self, job: JobRecord) -> Result<()> {
        self.write_doc(job)
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.read_doc(job_id)
    }

    fn update_job_status(&self, job_id: &str, status: JobStatus, update: JobUpdate) -> Result<()> {
        let mut job = self
            .read_doc(job_id)?
            .ok_or_else(|| ParseError::Storage(format!("job not found: {job_id}")))?;
        apply_update(&mut job, status, update);
        self.write_doc(job)
    }

    fn get_user_jobs(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| ParseError::Storage(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| ParseError::Storage(e.to_string()))?;
            let Some(job_id) = entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
            else {
                continue;
            };
            if let Some(job) = self.read_doc(&job_id)? {
                if job.user_id.as_deref() == Some(user_id)
                    && status.is_none_or(|s| job.status == s)
                {
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }
}

/// Tagged selection of a job backend by login state.
#[derive(Debug, Clone)]
pub enum JobBackend {
    /// Relational table for logged-in users.
    Relational(RelationalJobStore),
    /// Wide-column documents for anonymous users.
    WideColumn(WideColumnJobStore),
}

impl JobBackend {
    /// Pick the backend for a user: relational when logged in, wide-column
    /// otherwise.
    pub fn for_user(root: &Path, is_logged_in: bool) -> Result<Self> {
        if is_logged_in {
            Ok(JobBackend::Relational(RelationalJobStore::new(
                &root.join("jobs"),
            )?))
        } else {
            Ok(JobBackend::WideColumn(WideColumnJobStore::new(
                &root.join("jobs-anon"),
            )?))
        }
    }
}

impl JobStore for JobBackend {
    fn add_job(&self, job: JobRecord) -> Result<()> {
        match self {
            JobBackend::Relational(s) => s.add_job(job),
            JobBackend::WideColumn(s) => s.add_job(job),
        }
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        match self {
            JobBackend::Relational(s) => s.get_job(job_id),
            JobBackend::WideColumn(s) => s.get_job(job_id),
        }
    }

    fn update_job_status(&self, job_id: &str, status: JobStatus, update: JobUpdate) -> Result<()> {
        match self {
            JobBackend::Relational(s) => s.update_job_status(job_id, status, update),
            JobBackend::WideColumn(s) => s.update_job_status(job_id, status, update),
        }
    }

    fn get_user_jobs(
        &self,
        user_id: &str,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobRecord>> {
        match self {
            JobBackend::Relational(s) => s.get_user_jobs(user_id, status, limit, offset),
            JobBackend::WideColumn(s) => s.get_user_jobs(user_id, status, limit, offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_round_trip(store: &dyn JobStore) {
        store
            .add_job(JobRecord::new("j1", Some("u1"), "bank-statements/u1/j1/in.pdf"))
            .unwrap();

        let job = store.get_job("j1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        store
            .update_job_status(
                "j1",
                JobStatus::Success,
                JobUpdate {
                    result_score: Some(0.85),
                    num_pages: Some(3),
                    ..JobUpdate::default()
                },
            )
            .unwrap();

        let job = store.get_job("j1").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.result_score, Some(0.85));
        assert_eq!(job.num_pages, Some(3));

        let jobs = store
            .get_user_jobs("u1", Some(JobStatus::Success), 10, 0)
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(store.get_user_jobs("u2", None, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn relational_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalJobStore::new(dir.path()).unwrap();
        check_round_trip(&store);
    }

    #[test]
    fn wide_column_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = WideColumnJobStore::new(dir.path()).unwrap();
        check_round_trip(&store);
    }

    #[test]
    fn wide_column_stores_scores_as_decimal_strings() {
        let dir = tempfile::tempdir().unwrap();
        let store = WideColumnJobStore::new(dir.path()).unwrap();
        store.add_job(JobRecord::new("j9", None, "in.pdf")).unwrap();
        store
            .update_job_status(
                "j9",
                JobStatus::Success,
                JobUpdate {
                    result_score: Some(0.73),
                    ..JobUpdate::default()
                },
            )
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("j9.json")).unwrap();
        assert!(raw.contains("\"result_score_decimal\": \"0.73\""));
        assert!(!raw.contains("\"result_score\": 0.73"));

        let job = store.get_job("j9").unwrap().unwrap();
        assert_eq!(job.result_score, Some(0.73));
    }

    #[test]
    fn backend_selection_by_login() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            JobBackend::for_user(dir.path(), true).unwrap(),
            JobBackend::Relational(_)
        ));
        assert!(matches!(
            JobBackend::for_user(dir.path(), false).unwrap(),
            JobBackend::WideColumn(_)
        ));
    }

    #[test]
    fn update_missing_job_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalJobStore::new(dir.path()).unwrap();
        let err = store
            .update_job_status("ghost", JobStatus::Failed, JobUpdate::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::Storage(_)));
    }

    #[test]
    fn job_request_defaults() {
        let request: JobRequest = serde_json::from_str(
            r#"{"filename":"statement.pdf","source_key":"bank-statements/x/statement.pdf"}"#,
        )
        .unwrap();
        assert_eq!(request.mode, Mode::Generic);
        assert_eq!(request.pages, 10);
        assert!(!request.is_logged_in());
    }

    #[test]
    fn get_user_jobs_pagination() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalJobStore::new(dir.path()).unwrap();
        for i in 0..5 {
            store
                .add_job(JobRecord::new(&format!("j{i}"), Some("u1"), "in.pdf"))
                .unwrap();
        }
        let page = store.get_user_jobs("u1", None, 2, 2).unwrap();
        assert_eq!(page.len(), 2);
    }
}
