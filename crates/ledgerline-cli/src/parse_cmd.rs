use std::path::Path;

use ledgerline::{Config, JobRequest, Mode, process_request};

use crate::shared::open_document;

pub fn run(
    file: &Path,
    output_dir: &Path,
    source_key: Option<&str>,
    job_id: Option<&str>,
    user_id: Option<&str>,
    country: Option<&str>,
    pages: Option<usize>,
    config_path: Option<&Path>,
) -> Result<(), i32> {
    let document = open_document(file)?;

    let mut config = match config_path {
        Some(path) => Config::load(path).map_err(|e| {
            eprintln!("Error: failed to load config: {e}");
            1
        })?,
        None => Config::default(),
    };
    config.storage_root = output_dir.to_path_buf();
    if country.is_some() {
        config.country = country.map(str::to_string);
    }

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("statement");
    let request = JobRequest {
        filename: format!("{stem}.pdf"),
        mode: Mode::Generic,
        job_id: job_id.map(str::to_string),
        source_key: source_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{stem}.pdf")),
        user_id: user_id.map(str::to_string),
        pages: pages.unwrap_or(config.max_pages),
    };

    let report = process_request(&document, &request, &config).map_err(|e| {
        eprintln!("Error: {}", e.user_message());
        1
    })?;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: failed to render report: {e}");
            return Err(1);
        }
    }
    Ok(())
}
