//! Balance-consistency scoring of the final transaction stream.
//!
//! Statements disagree on whether the balance column reflects the state
//! before or after the row's transaction. Both hypotheses are checked over
//! every consecutive pair of rows; the better one names the document's
//! mode and the match ratio becomes the quality score. Scoring runs after
//! the results are persisted and never fails the job.

use chrono::{NaiveDate, Utc};
use ledgerline_core::amounts::loose_amount;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::jobs::{JobStatus, JobStore, JobUpdate};
use crate::metrics::{MetricUnit, MetricsSink, PIPELINE_DIMENSION, RESULT_SCORE_METRIC};
use crate::records::Transaction;
use crate::spill::JsonlReader;
use crate::stages::{StageContext, format_clean};

/// Float tolerance for the balance arithmetic.
const BALANCE_TOLERANCE: f64 = 0.01;

/// Which balance convention the document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// `balance[i] = balance[i-1] + credit[i] - debit[i]`.
    Post,
    /// `balance[i-1] = balance[i] - credit[i] + debit[i]`.
    Pre,
}

/// Outcome of scoring a parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Consistency score in `[0.0, 10.0]`.
    pub score: f64,
    /// Winning balance convention.
    pub mode: ScoreMode,
}

fn standard_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '.' | '/'))
        .collect::<String>()
        .to_lowercase()
}

fn extra_amount(transaction: &Transaction, keys: &[&str]) -> Option<f64> {
    transaction
        .extra
        .iter()
        .find(|(k, _)| keys.contains(&standard_key(k).as_str()))
        .and_then(|(_, v)| loose_amount(v))
}

fn extra_type(transaction: &Transaction) -> Option<&'static str> {
    const TYPE_KEYS: [&str; 5] = ["type", "txntype", "drcr", "crdr", "transactiontype"];
    let value = transaction
        .extra
        .iter()
        .find(|(k, _)| TYPE_KEYS.contains(&standard_key(k).as_str()))
        .map(|(_, v)| v)?;
    let upper = value.to_uppercase().replace('.', "");
    let upper = upper.trim();
    if upper.contains("CREDIT") || upper == "CR" {
        Some("CR")
    } else if upper.contains("DEBIT") || upper == "DR" {
        Some("DR")
    } else {
        None
    }
}

/// Resolve a row's `(credit, debit)` pair, synthesizing from an amount
/// column (optionally typed CR/DR) when explicit columns are absent.
fn credit_debit(transaction: &Transaction) -> (f64, f64) {
    const CREDIT_KEYS: [&str; 3] = ["credit", "cramount", "cr"];
    const DEBIT_KEYS: [&str; 3] = ["debit", "dramount", "dr"];
    const AMOUNT_KEYS: [&str; 4] = ["amount", "amt", "transactionamount", "txnamount"];

    let credit = transaction
        .credit
        .or_else(|| extra_amount(transaction, &CREDIT_KEYS));
    let debit = transaction
        .debit
        .or_else(|| extra_amount(transaction, &DEBIT_KEYS));
    if credit.is_some() || debit.is_some() {
        return (credit.unwrap_or(0.0), debit.unwrap_or(0.0));
    }

    let amount = transaction
        .amount
        .or_else(|| extra_amount(transaction, &AMOUNT_KEYS));
    match (amount, extra_type(transaction)) {
        (Some(amount), Some("CR")) => (amount, 0.0),
        (Some(amount), Some(_)) => (0.0, amount.abs()),
        (Some(amount), None) if amount >= 0.0 => (amount, 0.0),
        (Some(amount), None) => (0.0, amount.abs()),
        (None, _) => (0.0, 0.0),
    }
}

fn is_sorted_ascending(dates: &[NaiveDate]) -> bool {
    dates.windows(2).all(|w| w[0] <= w[1])
}

fn is_sorted_descending(dates: &[NaiveDate]) -> bool {
    dates.windows(2).all(|w| w[0] >= w[1])
}

/// Order rows for the consistency check.
///
/// A monotonic date sequence is trusted (descending documents are simply
/// reversed); mixed order falls back to sorting by `(date, original index)`.
fn order_rows(rows: &[Transaction]) -> Vec<&Transaction> {
    let valid_dates: Vec<NaiveDate> = rows.iter().filter_map(|r| r.date).collect();
    if valid_dates.len() < 2 {
        return rows.iter().collect();
    }

    if is_sorted_ascending(&valid_dates) {
        rows.iter().collect()
    } else if is_sorted_descending(&valid_dates) {
        rows.iter().rev().collect()
    } else {
        let mut indexed: Vec<(usize, &Transaction)> = rows.iter().enumerate().collect();
        indexed.sort_by_key(|(i, r)| (r.date.unwrap_or(NaiveDate::MIN), *i));
        indexed.into_iter().map(|(_, r)| r).collect()
    }
}

fn mode_ratio(rows: &[&Transaction], post: bool) -> f64 {
    let mut matches = 0usize;
    let mut checks = 0usize;
    for i in 1..rows.len() {
        let (Some(previous), Some(current)) = (rows[i - 1].balance, rows[i].balance) else {
            continue;
        };
        checks += 1;
        let (credit, debit) = credit_debit(rows[i]);
        let (expected, actual) = if post {
            (previous + credit - debit, current)
        } else {
            (current - credit + debit, previous)
        };
        if (expected - actual).abs() < BALANCE_TOLERANCE {
            matches += 1;
        }
    }
    if checks == 0 {
        0.0
    } else {
        matches as f64 / checks as f64
    }
}

/// Score a parsed document's internal arithmetic consistency.
pub fn score_transactions(rows: &[Transaction]) -> ScoreResult {
    if rows.is_empty() {
        return ScoreResult {
            score: 0.0,
            mode: ScoreMode::Post,
        };
    }

    let ordered = order_rows(rows);
    let post = mode_ratio(&ordered, true);
    let pre = mode_ratio(&ordered, false);
    let mode = if post >= pre {
        ScoreMode::Post
    } else {
        ScoreMode::Pre
    };
    ScoreResult {
        score: (10.0 * post.max(pre) * 100.0).round() / 100.0,
        mode,
    }
}

/// Trailer stage: score the persisted transactions, publish the gauge, and
/// record the normalized score on the job.
///
/// Callers treat failures here as non-fatal; the main result is already
/// persisted by the time scoring runs.
pub fn run(
    ctx: &StageContext<'_>,
    jobs: &impl JobStore,
    metrics: &dyn MetricsSink,
) -> Result<ScoreResult> {
    let reader: JsonlReader<Transaction> =
        JsonlReader::open(&ctx.stream_path(format_clean::STAGE))?;
    let rows: Vec<Transaction> = reader.collect::<Result<_>>()?;

    let result = score_transactions(&rows);
    let normalized = (result.score / 10.0).clamp(0.0, 1.0);
    tracing::info!(
        score = result.score,
        normalized,
        mode = ?result.mode,
        "result score calculated"
    );

    metrics.put_metric(
        RESULT_SCORE_METRIC,
        normalized * 100.0,
        MetricUnit::Percent,
        &[PIPELINE_DIMENSION],
        Utc::now(),
    );

    jobs.update_job_status(
        ctx.job_id,
        JobStatus::Success,
        JobUpdate {
            result_score: Some(normalized),
            ..JobUpdate::default()
        },
    )?;

    Ok(result)
}
