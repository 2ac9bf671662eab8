//! Final output writers: CSV, JSON, XLSX, and JSONL.
//!
//! The typed transaction stream is materialized into the four download
//! formats with a fixed column order, uploaded next to the source PDF key,
//! and summarized (totals plus distinct pages seen). Geometry and page
//! bookkeeping never reach the downloads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};
use crate::records::Transaction;
use crate::spill::JsonlReader;
use crate::stages::{StageContext, format_clean};
use crate::store::result_key;

/// Download formats produced for every job.
pub const FORMATS: [&str; 4] = ["csv", "json", "xlsx", "jsonl"];

/// Canonical columns always ordered first.
const PREFERRED_ORDER: [&str; 6] = ["date", "particulars", "check_no", "debit", "credit", "balance"];

/// Totals accumulated over the emitted transactions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputSummary {
    pub total_debits: f64,
    pub total_credits: f64,
    pub total_transactions: usize,
}

/// Everything the save step hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedOutputs {
    /// Download format to object-store key.
    pub downloads: BTreeMap<String, String>,
    /// Object-store key of the primary (JSONL) result.
    pub result_path: String,
    /// Totals over the emitted transactions.
    pub summary: OutputSummary,
    /// Distinct page numbers that produced transactions.
    pub num_pages: usize,
}

/// A cell in the tabular outputs.
enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }

    fn as_json(&self) -> serde_json::Value {
        match self {
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Number(n) => serde_json::json!(n),
            Cell::Empty => serde_json::Value::Null,
        }
    }
}

fn cell(transaction: &Transaction, column: &str) -> Cell {
    match column {
        "date" => transaction
            .date
            .map(|d| Cell::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Cell::Empty),
        "particulars" => transaction
            .particulars
            .clone()
            .map(Cell::Text)
            .unwrap_or(Cell::Empty),
        "debit" => transaction.debit.map(Cell::Number).unwrap_or(Cell::Empty),
        "credit" => transaction.credit.map(Cell::Number).unwrap_or(Cell::Empty),
        "balance" => transaction.balance.map(Cell::Number).unwrap_or(Cell::Empty),
        "amount" => transaction.amount.map(Cell::Number).unwrap_or(Cell::Empty),
        other => transaction
            .extra
            .get(other)
            .cloned()
            .map(Cell::Text)
            .unwrap_or(Cell::Empty),
    }
}

fn columns_of(transaction: &Transaction) -> Vec<String> {
    let mut columns = Vec::new();
    if transaction.date.is_some() {
        columns.push("date".to_string());
    }
    if transaction.particulars.is_some() {
        columns.push("particulars".to_string());
    }
    if transaction.debit.is_some() {
        columns.push("debit".to_string());
    }
    if transaction.credit.is_some() {
        columns.push("credit".to_string());
    }
    if transaction.balance.is_some() {
        columns.push("balance".to_string());
    }
    if transaction.amount.is_some() {
        columns.push("amount".to_string());
    }
    columns.extend(transaction.extra.keys().cloned());
    columns
}

/// Fixed column ordering: the preferred columns that exist, then the rest
/// alphabetically.
fn column_order(all_columns: &BTreeSet<String>) -> Vec<String> {
    let mut order: Vec<String> = PREFERRED_ORDER
        .iter()
        .filter(|c| all_columns.contains(**c))
        .map(|c| c.to_string())
        .collect();
    let mut remaining: Vec<String> = all_columns
        .iter()
        .filter(|c| !order.contains(c))
        .cloned()
        .collect();
    remaining.sort();
    order.extend(remaining);
    order
}

/// Write all download formats and upload them next to the source key.
pub fn run(source_key: &str, ctx: &StageContext<'_>) -> Result<SavedOutputs> {
    let reader: JsonlReader<Transaction> =
        JsonlReader::open(&ctx.stream_path(format_clean::STAGE))?;

    let mut rows: Vec<Transaction> = Vec::new();
    let mut pages_seen: BTreeSet<usize> = BTreeSet::new();
    let mut all_columns: BTreeSet<String> = BTreeSet::new();
    for item in reader {
        let item = item?;
        pages_seen.insert(item.page_number);
        all_columns.extend(columns_of(&item));
        rows.push(item);
    }
    let order = column_order(&all_columns);

    let mut summary = OutputSummary::default();
    for row in &rows {
        summary.total_transactions += 1;
        summary.total_debits += row.debit.unwrap_or(0.0);
        summary.total_credits += row.credit.unwrap_or(0.0);
    }

    write_csv(&rows, &order, ctx)?;
    write_json(&rows, &order, ctx)?;
    write_xlsx(&rows, &order, ctx)?;
    write_jsonl(&rows, &order, ctx)?;

    let mut downloads = BTreeMap::new();
    for format in FORMATS {
        let key = result_key(source_key, format).ok_or_else(|| {
            ParseError::stage("save", format!("source key is not a pdf: {source_key}"))
        })?;
        ctx.store
            .put_file(&key, &ctx.spill.file_path(&format!("output.{format}")))?;
        downloads.insert(format.to_string(), key);
    }
    let result_path = downloads["jsonl"].clone();
    tracing::info!(
        transactions = summary.total_transactions,
        num_pages = pages_seen.len(),
        "results uploaded"
    );

    Ok(SavedOutputs {
        downloads,
        result_path,
        summary,
        num_pages: pages_seen.len(),
    })
}

fn write_csv(rows: &[Transaction], order: &[String], ctx: &StageContext<'_>) -> Result<()> {
    let path = ctx.spill.file_path("output.csv");
    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| ParseError::stage("save", e.to_string()))?;
    writer
        .write_record(order)
        .map_err(|e| ParseError::stage("save", e.to_string()))?;
    for row in rows {
        let record: Vec<String> = order.iter().map(|c| cell(row, c).as_text()).collect();
        writer
            .write_record(&record)
            .map_err(|e| ParseError::stage("save", e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ParseError::stage("save", e.to_string()))?;
    Ok(())
}

fn row_object(row: &Transaction, order: &[String]) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for column in order {
        match cell(row, column) {
            Cell::Empty => {}
            value => {
                object.insert(column.clone(), value.as_json());
            }
        }
    }
    serde_json::Value::Object(object)
}

fn write_json(rows: &[Transaction], order: &[String], ctx: &StageContext<'_>) -> Result<()> {
    let values: Vec<serde_json::Value> = rows.iter().map(|r| row_object(r, order)).collect();
    let bytes = serde_json::to_vec_pretty(&values)?;
    std::fs::write(ctx.spill.file_path("output.json"), bytes)?;
    Ok(())
}

fn write_jsonl(rows: &[Transaction], order: &[String], ctx: &StageContext<'_>) -> Result<()> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(&row_object(row, order))?);
        out.push('\n');
    }
    std::fs::write(ctx.spill.file_path("output.jsonl"), out)?;
    Ok(())
}

fn write_xlsx(rows: &[Transaction], order: &[String], ctx: &StageContext<'_>) -> Result<()> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, name) in order.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, name)
            .map_err(|e| ParseError::stage("save", e.to_string()))?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, name) in order.iter().enumerate() {
            let (row_idx, col) = (row_idx as u32 + 1, col as u16);
            match cell(row, name) {
                Cell::Text(s) => worksheet
                    .write_string(row_idx, col, &s)
                    .map(|_| ())
                    .map_err(|e| ParseError::stage("save", e.to_string()))?,
                Cell::Number(n) => worksheet
                    .write_number(row_idx, col, n)
                    .map(|_| ())
                    .map_err(|e| ParseError::stage("save", e.to_string()))?,
                Cell::Empty => {}
            }
        }
    }
    workbook
        .save(ctx.spill.file_path("output.xlsx"))
        .map_err(|e| ParseError::stage("save", e.to_string()))?;
    Ok(())
}
