//! Line-delimited JSON decoding
//!
//! Turns a transcript file into typed records for one schema family,
//! tolerating anything a half-written or hand-edited log can contain:
//!
//! - **Blank lines** are skipped silently.
//! - **Invalid JSON** is skipped and reported as a [`ParseWarning`] naming the
//!   file and 1-based line number.
//! - **Valid JSON of the wrong shape** (not an object, or not deserializable
//!   into the family's record type) is counted as unrecognized.
//!
//! Only failing to open the file is an error.

use crate::error::{Error, Result};
use crate::types::{ParseWarning, SchemaFamily};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One decoded line with its 1-based position in the file.
#[derive(Debug)]
pub struct Decoded<R> {
    pub line: usize,
    pub record: R,
}

/// Everything decoded from one file.
#[derive(Debug)]
pub struct DecodedFile<R> {
    pub records: Vec<Decoded<R>>,
    pub warnings: Vec<ParseWarning>,
    /// Valid JSON lines whose shape matched no record type
    pub unrecognized: usize,
    /// Non-blank lines seen
    pub lines_read: usize,
}

impl<R> Default for DecodedFile<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
            unrecognized: 0,
            lines_read: 0,
        }
    }
}

/// Decode every line of `path` as a record of type `R`.
pub fn decode_file<R: DeserializeOwned>(path: &Path, family: SchemaFamily) -> Result<DecodedFile<R>> {
    let file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;

    let decoded = decode_lines(BufReader::new(file), path, family);

    tracing::debug!(
        path = %path.display(),
        family = %family,
        records = decoded.records.len(),
        warnings = decoded.warnings.len(),
        unrecognized = decoded.unrecognized,
        "Decoded transcript"
    );

    Ok(decoded)
}

/// Decode records from any buffered reader; `path` is used for diagnostics.
pub fn decode_lines<R: DeserializeOwned, B: BufRead>(
    reader: B,
    path: &Path,
    family: SchemaFamily,
) -> DecodedFile<R> {
    let mut result = DecodedFile::default();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;

        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                push_warning(&mut result, path, line_number, format!("read error: {}", e));
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        result.lines_read += 1;

        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                push_warning(
                    &mut result,
                    path,
                    line_number,
                    format!("JSON parse error: {}", e),
                );
                continue;
            }
        };

        if !value.is_object() {
            tracing::debug!(path = %path.display(), line = line_number, "Skipping non-object record");
            result.unrecognized += 1;
            continue;
        }

        match serde_json::from_value::<R>(value) {
            Ok(record) => result.records.push(Decoded {
                line: line_number,
                record,
            }),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    line = line_number,
                    family = %family,
                    error = %e,
                    "Unrecognized record shape"
                );
                result.unrecognized += 1;
            }
        }
    }

    result
}

fn push_warning<R>(result: &mut DecodedFile<R>, path: &Path, line: usize, message: String) {
    tracing::warn!(path = %path.display(), line, "{}", message);
    result.warnings.push(ParseWarning {
        path: path.to_path_buf(),
        line: Some(line),
        message,
    });
}
