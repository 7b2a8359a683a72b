use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// One source column worth keeping: position in the row, the label the
/// source uses for it, and the canonical field it maps to.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub column: usize,
    pub label: String,
    pub field: String,
}

impl ColumnSpec {
    fn new(column: usize, label: &str, field: &str) -> Self {
        Self {
            column,
            label: label.to_string(),
            field: field.to_string(),
        }
    }
}

/// Column mapping and row-hygiene rules for one source file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    pub min_fields: usize,
    /// Canonical field used for header detection and identity cleaning.
    pub key_field: String,
    #[serde(default)]
    pub header_sentinels: Vec<String>,
    pub columns: Vec<ColumnSpec>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl SourceConfig {
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// Look up the value mapped to a canonical field, trimmed. `None` when
    /// the mapping has no such field; empty string when the row is too
    /// short for an optional trailing column.
    pub fn field_value<'a>(&self, row: &'a [String], field: &str) -> Option<&'a str> {
        let spec = self.columns.iter().find(|c| c.field == field)?;
        Some(row.get(spec.column).map(|v| v.trim()).unwrap_or(""))
    }

    pub fn is_header_value(&self, key_value: &str) -> bool {
        self.header_sentinels.iter().any(|s| s == key_value)
    }
}

/// Keyword classification of movement destinations into status/location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationRules {
    pub site_keywords: Vec<String>,
    pub vendor_keywords: Vec<String>,
    pub site_location: String,
    pub vendor_location: String,
    pub default_location: String,
}

impl Default for LocationRules {
    fn default() -> Self {
        Self {
            site_keywords: vec!["site".to_string(), "field".to_string()],
            vendor_keywords: vec!["vendor".to_string(), "repair shop".to_string()],
            site_location: "site".to_string(),
            vendor_location: "repair vendor".to_string(),
            default_location: "head-office warehouse".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Encoding labels tried in order; first one that decodes cleanly wins.
    pub encodings: Vec<String>,
    /// "Not applicable" markers treated as a blank identity.
    pub na_sentinels: Vec<String>,
    pub locations: LocationRules,
    pub equipment: SourceConfig,
    pub repairs: SourceConfig,
    pub calibrations: SourceConfig,
    pub movements: SourceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            encodings: vec!["utf-8".to_string(), "euc-kr".to_string()],
            na_sentinels: vec![
                "-".to_string(),
                "N/A".to_string(),
                "n/a".to_string(),
                "nan".to_string(),
            ],
            locations: LocationRules::default(),
            equipment: default_equipment_source(),
            repairs: default_repairs_source(),
            calibrations: default_calibrations_source(),
            movements: default_movements_source(),
        }
    }
}

fn default_equipment_source() -> SourceConfig {
    SourceConfig {
        file: "equipment_registry.csv".to_string(),
        delimiter: ",".to_string(),
        min_fields: 3,
        key_field: "serial".to_string(),
        header_sentinels: vec!["serial".to_string(), "serial number".to_string()],
        columns: vec![
            ColumnSpec::new(1, "product line", "category"),
            ColumnSpec::new(2, "serial number", "serial"),
        ],
    }
}

fn default_repairs_source() -> SourceConfig {
    SourceConfig {
        file: "repair_log.csv".to_string(),
        delimiter: ",".to_string(),
        min_fields: 9,
        key_field: "serial".to_string(),
        header_sentinels: vec![
            "serial".to_string(),
            "serial number".to_string(),
            "spec".to_string(),
            "Unnamed: 8".to_string(),
        ],
        columns: vec![
            ColumnSpec::new(0, "date-no.", "date"),
            ColumnSpec::new(2, "repair company", "repair_company"),
            ColumnSpec::new(4, "manager", "manager"),
            ColumnSpec::new(5, "product line", "product_series"),
            ColumnSpec::new(6, "cost", "cost"),
            ColumnSpec::new(7, "repair class", "repair_type"),
            ColumnSpec::new(8, "serial number", "serial"),
            ColumnSpec::new(9, "sequence", "sequence"),
        ],
    }
}

fn default_calibrations_source() -> SourceConfig {
    SourceConfig {
        file: "calibration_log.csv".to_string(),
        delimiter: ",".to_string(),
        min_fields: 6,
        key_field: "serial_number".to_string(),
        header_sentinels: vec!["serial".to_string(), "serial number".to_string()],
        columns: vec![
            ColumnSpec::new(3, "serial number", "serial_number"),
            ColumnSpec::new(4, "inspection date", "latest_calibration_date"),
            ColumnSpec::new(5, "valid until", "next_calibration_date"),
        ],
    }
}

fn default_movements_source() -> SourceConfig {
    SourceConfig {
        file: "movement_log.csv".to_string(),
        delimiter: ",".to_string(),
        min_fields: 6,
        key_field: "serial".to_string(),
        header_sentinels: vec![
            "serial".to_string(),
            "serial number".to_string(),
            "spec".to_string(),
        ],
        columns: vec![
            ColumnSpec::new(0, "date-no.", "date"),
            ColumnSpec::new(1, "from warehouse", "from_location"),
            ColumnSpec::new(2, "to warehouse", "to_location"),
            ColumnSpec::new(3, "item name", "item_name"),
            ColumnSpec::new(4, "serial number", "serial"),
            ColumnSpec::new(5, "quantity", "quantity"),
            ColumnSpec::new(7, "note", "note"),
        ],
    }
}

impl PipelineConfig {
    /// Defaults, optionally overridden by a TOML file. Partial files are
    /// fine: any omitted table falls back to the coded default.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                let config: PipelineConfig = toml::from_str(&text)
                    .with_context(|| format!("invalid config file {}", p.display()))?;
                Ok(config)
            }
        }
    }

    /// Identity sentinels for one source: header labels plus NA markers.
    pub fn identity_sentinels(&self, source: &SourceConfig) -> Vec<String> {
        let mut sentinels = source.header_sentinels.clone();
        sentinels.extend(self.na_sentinels.iter().cloned());
        sentinels
    }
}
