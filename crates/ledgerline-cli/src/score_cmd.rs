use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ledgerline::{Transaction, score_transactions};

pub fn run(file: &Path) -> Result<(), i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }

    let reader = BufReader::new(File::open(file).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?);

    let mut rows: Vec<Transaction> = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| {
            eprintln!("Error: {e}");
            1
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(row) => rows.push(row),
            Err(e) => eprintln!("Warning: skipping invalid line: {e}"),
        }
    }

    let result = score_transactions(&rows);
    match serde_json::to_string(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            return Err(1);
        }
    }
    Ok(())
}
