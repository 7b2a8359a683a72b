use std::path::Path;

use anyhow::{bail, Context};
use encoding_rs::Encoding;

/// A decoded delimited source: trimmed text fields, row-major.
#[derive(Debug)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
    /// Canonical name of the encoding that won the fallback chain.
    pub encoding: &'static str,
}

/// Read one source file, trying each configured encoding in order until one
/// decodes without errors and parses as a delimited table. First success
/// wins; the rest are never attempted.
///
/// Returns `Ok(None)` when the file is missing or holds no rows — the
/// caller treats that source as an empty record set.
pub fn read_table(
    path: &Path,
    encodings: &[String],
    delimiter: u8,
) -> anyhow::Result<Option<RawTable>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read source file {}", path.display()))?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let mut attempts: Vec<String> = Vec::new();
    for label in encodings {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            attempts.push(format!("{label}: unknown encoding label"));
            continue;
        };
        let (text, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            attempts.push(format!("{}: replacement characters in decode", encoding.name()));
            continue;
        }
        match parse_rows(&text, delimiter) {
            Ok(rows) => {
                if rows.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(RawTable {
                    rows,
                    encoding: encoding.name(),
                }));
            }
            Err(err) => {
                attempts.push(format!("{}: {err}", encoding.name()));
            }
        }
    }

    bail!(
        "no configured encoding could read {}; attempts: {}",
        path.display(),
        attempts.join("; ")
    )
}

fn parse_rows(text: &str, delimiter: u8) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }
    Ok(rows)
}
