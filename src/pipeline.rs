use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::clean;
use crate::config::{PipelineConfig, SourceConfig};
use crate::dashboard;
use crate::index::{self, JoinIndex, SerialAudit};
use crate::ingest;
use crate::models::{CalibrationRecord, EquipmentRecord, MovementRecord, RepairRecord};
use crate::normalize::{self, RowSkip};
use crate::snapshot;
use crate::stats;
use crate::visibility;

pub const DB_DIR: &str = "db";
pub const STATS_DIR: &str = "stats";

pub const EQUIPMENT_DB: &str = "equipment_db.json";
pub const REPAIRS_DB: &str = "repairs_db.json";
pub const QC_LOGS_DB: &str = "qc_logs_db.json";
pub const MOVEMENTS_DB: &str = "movements_db.json";

/// Per-source hygiene counters, printed after every load so skipped rows
/// are never silently lost.
#[derive(Debug, Default)]
pub struct SourceReport {
    pub file: String,
    pub available: bool,
    pub encoding: Option<&'static str>,
    pub rows_read: usize,
    pub header_rows: usize,
    pub malformed_rows: usize,
    pub sentinel_dropped: usize,
    pub records: usize,
}

impl std::fmt::Display for SourceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.available {
            return write!(f, "{}: unavailable, treated as empty", self.file);
        }
        write!(
            f,
            "{}: {} records from {} rows ({}, {} header, {} malformed, {} sentinel)",
            self.file,
            self.records,
            self.rows_read,
            self.encoding.unwrap_or("?"),
            self.header_rows,
            self.malformed_rows,
            self.sentinel_dropped
        )
    }
}

/// Everything the build phase produces, ready for snapshotting.
pub struct NormalizedData {
    pub equipment: Vec<EquipmentRecord>,
    pub repairs: Vec<RepairRecord>,
    pub calibrations: Vec<CalibrationRecord>,
    pub movements: Vec<MovementRecord>,
    pub audit: SerialAudit,
    pub placeholders_added: usize,
    pub movements_folded: usize,
    pub reports: Vec<SourceReport>,
    /// Raw input files that were present and non-empty.
    pub sources: Vec<String>,
}

fn load_source<T, B, K>(
    data_dir: &Path,
    config: &PipelineConfig,
    source: &SourceConfig,
    build: B,
    key: K,
) -> (Vec<T>, SourceReport)
where
    B: Fn(&[String], &SourceConfig) -> Result<T, RowSkip>,
    K: Fn(&T) -> &str,
{
    let mut report = SourceReport {
        file: source.file.clone(),
        ..SourceReport::default()
    };
    let path = data_dir.join(&source.file);
    let table = match ingest::read_table(&path, &config.encodings, source.delimiter_byte()) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("warning: {err:#}");
            None
        }
    };
    let Some(table) = table else {
        return (Vec::new(), report);
    };

    report.available = true;
    report.encoding = Some(table.encoding);
    report.rows_read = table.rows.len();

    let mut records = Vec::new();
    for row in &table.rows {
        match build(row, source) {
            Ok(record) => records.push(record),
            Err(RowSkip::Header) => report.header_rows += 1,
            Err(RowSkip::TooFewFields) | Err(RowSkip::MissingField(_)) => {
                report.malformed_rows += 1
            }
        }
    }

    let sentinels = config.identity_sentinels(source);
    let before = records.len();
    let records = clean::retain_valid(records, &sentinels, |r| key(r));
    report.sentinel_dropped = before - records.len();
    report.records = records.len();
    (records, report)
}

/// Build phase: load every source, normalize, clean, audit orphan serials,
/// synthesize placeholders, fold movements into the registry and enrich
/// repairs through the join index.
pub fn build_database(
    data_dir: &Path,
    config: &PipelineConfig,
    run_stamp: &str,
) -> Result<NormalizedData> {
    let (equipment, equipment_report) = load_source(
        data_dir,
        config,
        &config.equipment,
        |row, cfg| normalize::equipment_from_row(row, cfg, &config.locations.default_location),
        |record: &EquipmentRecord| record.serial.as_str(),
    );
    let mut equipment = clean::dedup_by_key_last(equipment, |record| record.serial.clone());

    let (mut repairs, repairs_report) = load_source(
        data_dir,
        config,
        &config.repairs,
        normalize::repair_from_row,
        |record: &RepairRecord| record.serial.as_str(),
    );

    let (mut calibrations, calibrations_report) = load_source(
        data_dir,
        config,
        &config.calibrations,
        normalize::calibration_from_row,
        |record: &CalibrationRecord| record.serial_number.as_str(),
    );
    for (i, record) in calibrations.iter_mut().enumerate() {
        record.id = format!("qc_{:04}", i + 1);
        record.created_at = run_stamp.to_string();
    }

    let (movements, movements_report) = load_source(
        data_dir,
        config,
        &config.movements,
        normalize::movement_from_row,
        |record: &MovementRecord| record.serial.as_str(),
    );

    let movements_folded =
        index::apply_latest_movements(&mut equipment, &movements, &config.locations);

    // Orphan audit over both transaction logs, then placeholder synthesis so
    // every joined pass resolves.
    let preliminary = JoinIndex::build(&equipment);
    let referenced = repairs
        .iter()
        .map(|r| r.serial.as_str())
        .chain(movements.iter().map(|m| m.serial.as_str()));
    let audit = index::audit_serials(&preliminary, referenced);

    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    for repair in &repairs {
        if !repair.product_series.trim().is_empty() {
            labels
                .entry(repair.serial.trim().to_string())
                .or_insert_with(|| repair.product_series.trim().to_string());
        }
    }
    for movement in &movements {
        if !movement.item_name.trim().is_empty() {
            labels
                .entry(movement.serial.trim().to_string())
                .or_insert_with(|| movement.item_name.trim().to_string());
        }
    }
    let placeholders =
        index::synthesize_missing(&audit, &labels, &config.locations.default_location);
    let placeholders_added = placeholders.len();
    equipment.extend(placeholders);

    let join_index = JoinIndex::build(&equipment);
    index::enrich_repairs(&mut repairs, &join_index);

    let reports = vec![
        equipment_report,
        repairs_report,
        calibrations_report,
        movements_report,
    ];
    let sources = reports
        .iter()
        .filter(|r| r.available)
        .map(|r| r.file.clone())
        .collect();

    Ok(NormalizedData {
        equipment,
        repairs,
        calibrations,
        movements,
        audit,
        placeholders_added,
        movements_folded,
        reports,
        sources,
    })
}

/// Persist the four database snapshots. Each artifact is written
/// independently; a failure on one does not undo the others.
pub fn write_database(
    data_dir: &Path,
    data: &NormalizedData,
    run_stamp: &str,
) -> Result<Vec<PathBuf>> {
    let db_dir = data_dir.join(DB_DIR);
    let mut written = Vec::new();

    let path = db_dir.join(EQUIPMENT_DB);
    snapshot::write_snapshot(&path, &data.equipment, &data.sources, run_stamp)?;
    written.push(path);

    let path = db_dir.join(REPAIRS_DB);
    snapshot::write_snapshot(&path, &data.repairs, &data.sources, run_stamp)?;
    written.push(path);

    let path = db_dir.join(QC_LOGS_DB);
    snapshot::write_snapshot(&path, &data.calibrations, &data.sources, run_stamp)?;
    written.push(path);

    let path = db_dir.join(MOVEMENTS_DB);
    snapshot::write_snapshot(&path, &data.movements, &data.sources, run_stamp)?;
    written.push(path);

    Ok(written)
}

/// The stats phase's view of the database snapshots. Missing snapshots
/// degrade to empty record sets and drop out of the provenance list.
pub struct DatabaseSnapshot {
    pub equipment: Vec<EquipmentRecord>,
    pub repairs: Vec<RepairRecord>,
    pub calibrations: Vec<CalibrationRecord>,
    pub movements: Vec<MovementRecord>,
    pub sources: Vec<String>,
}

fn load_db_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    match snapshot::read_snapshot::<Vec<T>>(path) {
        Ok(envelope) => envelope.data,
        Err(err) => {
            eprintln!("warning: {err:#}");
            Vec::new()
        }
    }
}

pub fn load_database(data_dir: &Path) -> DatabaseSnapshot {
    let db_dir = data_dir.join(DB_DIR);
    let equipment: Vec<EquipmentRecord> = load_db_array(&db_dir.join(EQUIPMENT_DB));
    let repairs: Vec<RepairRecord> = load_db_array(&db_dir.join(REPAIRS_DB));
    let calibrations: Vec<CalibrationRecord> = load_db_array(&db_dir.join(QC_LOGS_DB));
    let movements: Vec<MovementRecord> = load_db_array(&db_dir.join(MOVEMENTS_DB));

    let mut sources = Vec::new();
    if !equipment.is_empty() {
        sources.push(EQUIPMENT_DB.to_string());
    }
    if !repairs.is_empty() {
        sources.push(REPAIRS_DB.to_string());
    }
    if !calibrations.is_empty() {
        sources.push(QC_LOGS_DB.to_string());
    }
    if !movements.is_empty() {
        sources.push(MOVEMENTS_DB.to_string());
    }

    DatabaseSnapshot {
        equipment,
        repairs,
        calibrations,
        movements,
        sources,
    }
}

/// Stats phase: every aggregation pass reads the shared join index and its
/// own record slice, then writes one artifact. Passes are independent; a
/// failure writing one leaves the already-written artifacts in place.
pub fn write_stats(
    data_dir: &Path,
    db: &DatabaseSnapshot,
    run_stamp: &str,
) -> Result<Vec<PathBuf>> {
    let stats_dir = data_dir.join(STATS_DIR);
    let join_index = JoinIndex::build(&db.equipment);
    let sources = &db.sources;
    let mut written = Vec::new();

    let uptime = stats::uptime_by_category(&db.movements, &join_index);
    let path = stats_dir.join("stats_uptime_by_category.json");
    snapshot::write_snapshot(&path, &uptime, sources, run_stamp)?;
    written.push(path);

    let cost_monthly = stats::repair_cost_monthly(&db.repairs);
    let path = stats_dir.join("stats_repair_cost_monthly.json");
    snapshot::write_snapshot(&path, &cost_monthly, sources, run_stamp)?;
    written.push(path);

    let monthly = stats::repairs_monthly(&db.repairs);
    let path = stats_dir.join("stats_repairs_monthly.json");
    snapshot::write_snapshot(&path, &monthly, sources, run_stamp)?;
    written.push(path);

    let qc_due = stats::qc_next_due_monthly(&db.calibrations);
    let path = stats_dir.join("stats_qc_next_due.json");
    snapshot::write_snapshot(&path, &qc_due, sources, run_stamp)?;
    written.push(path);

    let vis = visibility::repairs_visibility(&db.repairs, &join_index);

    let path = stats_dir.join("stats_repairs_overview.json");
    snapshot::write_snapshot(&path, &vis.overview, sources, run_stamp)?;
    written.push(path);

    let path = stats_dir.join("stats_repairs_by_category.json");
    snapshot::write_snapshot(&path, &vis.by_category, sources, run_stamp)?;
    written.push(path);

    let path = stats_dir.join("stats_repairs_by_company.json");
    snapshot::write_snapshot(&path, &vis.by_company, sources, run_stamp)?;
    written.push(path);

    let path = stats_dir.join("stats_repairs_by_type.json");
    snapshot::write_snapshot(&path, &vis.by_type, sources, run_stamp)?;
    written.push(path);

    let path = stats_dir.join("stats_repairs_by_serial.json");
    snapshot::write_snapshot(&path, &vis.by_serial, sources, run_stamp)?;
    written.push(path);

    let path = stats_dir.join("stats_repairs_topk.json");
    snapshot::write_snapshot(&path, &vis.topk, sources, run_stamp)?;
    written.push(path);

    let summary = dashboard::dashboard_summary(&db.equipment, &db.repairs, &db.movements);
    let path = stats_dir.join("dashboard_summary.json");
    snapshot::write_snapshot(&path, &summary, sources, run_stamp)?;
    written.push(path);

    Ok(written)
}
