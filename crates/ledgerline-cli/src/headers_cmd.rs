use std::path::Path;

use ledgerline::spill::SpillDir;
use ledgerline::stages::{StageContext, header_extract, header_recognize};
use ledgerline::store::FsObjectStore;

use crate::cli::OutputFormat;
use crate::shared::open_document;

pub fn run(file: &Path, format: &OutputFormat, pages: usize) -> Result<(), i32> {
    let document = open_document(file)?;

    // Header inspection reuses the pipeline stages against a throwaway
    // spill directory and store.
    let spill = SpillDir::for_job(&format!("inspect-{}", std::process::id())).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;
    let store = FsObjectStore::new(spill.file_path("store")).map_err(|e| {
        eprintln!("Error: {e}");
        1
    })?;
    let ctx = StageContext {
        job_id: "inspect",
        user_id: None,
        spill_prefix: "inspect",
        spill: &spill,
        store: &store,
    };

    let detected = header_extract::run(&document, pages, &ctx)
        .and_then(|set| header_recognize::run(&set, &ctx))
        .map_err(|e| {
            eprintln!("Error: {}", e.user_message());
            1
        })?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&detected).map_err(|e| {
                eprintln!("Error: {e}");
                1
            })?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("source_page\t{}", detected.source_page);
            println!("label\toriginal\tx0\tx1");
            for header in &detected.headers {
                println!(
                    "{}\t{}\t{:.2}\t{:.2}",
                    header.text,
                    header.original_text.as_deref().unwrap_or(""),
                    header.bbox.x0,
                    header.bbox.x1,
                );
            }
        }
    }
    Ok(())
}
