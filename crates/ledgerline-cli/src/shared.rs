use std::path::Path;

use ledgerline::JsonDocument;

/// Open an extractor dump with user-friendly error messages.
///
/// Returns `Err(1)` with a message printed to stderr if the file is not
/// found or cannot be parsed as a document dump.
pub fn open_document(file: &Path) -> Result<JsonDocument, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(1);
    }

    JsonDocument::open(file).map_err(|e| {
        eprintln!("Error: {}", e.user_message());
        1
    })
}
