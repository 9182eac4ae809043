//! Ingestion payload decoding.
//!
//! The recorder uploads each window as CSV text with a header row, e.g.
//!
//! ```text
//! timestamp_ms,ax,ay,az
//! 1700000000000,0.01,-0.02,0.99
//! ```
//!
//! This module only turns bytes into a `RawWindow`. It does not look at
//! column names or cell values; that is the normalizer's job.

use crate::error::IngestError;
use crate::types::RawWindow;

/// Decode a CSV payload into a raw window.
///
/// Header names and cells are trimmed. Rows may be ragged; missing cells
/// are simply absent. Fails with `MalformedPayload` on invalid UTF-8, CSV
/// syntax errors, or a payload without a header row.
pub fn parse_csv(payload: &[u8]) -> Result<RawWindow, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(payload);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::MalformedPayload(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(IngestError::MalformedPayload(
            "payload has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawWindow::new(headers, rows))
}
