use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Self-describing wrapper around every persisted artifact. `sourceFiles`
/// names only the inputs that actually contributed, so consumers can infer
/// coverage gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub schema_version: String,
    pub generated_at: String,
    pub source_files: Vec<String>,
    pub data: T,
}

/// UTC at second precision, the dashboard's expected format.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Serialize the full envelope in memory, then write the file in one shot;
/// a failed run leaves no partial artifact behind.
pub fn write_snapshot<T: Serialize>(
    path: &Path,
    data: &T,
    sources: &[String],
    generated_at: &str,
) -> anyhow::Result<()> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION.to_string(),
        generated_at: generated_at.to_string(),
        source_files: sources.to_vec(),
        data,
    };
    let json = serde_json::to_string_pretty(&envelope)
        .with_context(|| format!("failed to serialize snapshot {}", path.display()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write snapshot {}", path.display()))
}

pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Envelope<T>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid snapshot envelope in {}", path.display()))
}
