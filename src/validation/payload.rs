//! Validation of an encoded export payload before it reaches the sink.
//!
//! The payload is parsed back with the `csv` crate, which catches:
//! - UTF-8 encoding errors
//! - Missing or unexpected headers
//! - Inconsistent column counts
//! - Quoting errors

use std::io::Cursor;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Result of payload validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadValidation {
    /// Whether the payload passed validation (no errors).
    pub ok: bool,
    /// List of validation errors found.
    pub errors: Vec<PayloadValidationError>,
    /// Statistics about the payload.
    pub stats: PayloadStats,
}

/// Statistics collected during validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadStats {
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Headers found in the payload.
    pub headers: Vec<String>,
    /// Number of data records (header excluded).
    pub record_count: u64,
}

/// Validation errors that make a payload unfit for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadValidationError {
    /// Payload is not valid UTF-8.
    NotUtf8,
    /// Payload is empty (0 bytes).
    EmptyPayload,
    /// Header line differs from the one the export declared.
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    /// Record has a different number of columns than the header.
    InconsistentColumns {
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns found.
        found: usize,
        /// 1-based line number of the record, header included.
        row: u64,
    },
    /// CSV parsing error.
    CsvParseError {
        /// Error message.
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Parses `payload` and checks it against the headers the export declared.
///
/// Every problem found is reported in `PayloadValidation.errors`; the
/// function itself never fails.
pub fn validate_payload(payload: &[u8], expected_headers: &[&str]) -> PayloadValidation {
    let mut errors = Vec::new();
    let mut stats = PayloadStats {
        size_bytes: payload.len() as u64,
        ..PayloadStats::default()
    };

    if payload.is_empty() {
        return finish(vec![PayloadValidationError::EmptyPayload], stats);
    }

    if std::str::from_utf8(payload).is_err() {
        return finish(vec![PayloadValidationError::NotUtf8], stats);
    }

    // Flexible so that short or long rows are reported with their width
    // instead of aborting the parse.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(payload));

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(String::from).collect(),
        Err(e) => {
            errors.push(PayloadValidationError::CsvParseError {
                message: e.to_string(),
            });
            return finish(errors, stats);
        }
    };

    if headers.iter().map(String::as_str).ne(expected_headers.iter().copied()) {
        errors.push(PayloadValidationError::HeaderMismatch {
            expected: expected_headers.iter().map(|h| h.to_string()).collect(),
            found: headers.clone(),
        });
    }
    stats.headers = headers;

    let expected = expected_headers.len();
    for result in reader.records() {
        match result {
            Ok(record) => {
                stats.record_count += 1;
                if record.len() != expected {
                    errors.push(PayloadValidationError::InconsistentColumns {
                        expected,
                        found: record.len(),
                        row: stats.record_count + 1,
                    });
                }
            }
            Err(e) => {
                errors.push(PayloadValidationError::CsvParseError {
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    finish(errors, stats)
}

fn finish(errors: Vec<PayloadValidationError>, stats: PayloadStats) -> PayloadValidation {
    PayloadValidation {
        ok: errors.is_empty(),
        errors,
        stats,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
