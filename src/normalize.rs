use crate::config::SourceConfig;
use crate::models::{
    CalibrationRecord, EquipmentRecord, EquipmentStatus, MovementRecord, RepairRecord,
};

/// Why a raw row produced no record. Callers count these; nothing here is
/// fatal to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSkip {
    /// Key field matched one of the configured header labels.
    Header,
    TooFewFields,
    /// A field the record cannot exist without was blank.
    MissingField(&'static str),
}

/// Split a combined "(measurement item) product series" label. Labels
/// without the parenthesized prefix keep the whole string as the series.
pub fn split_category_label(label: &str) -> (String, String) {
    let trimmed = label.trim();
    if let Some(rest) = trimmed.strip_prefix('(') {
        if let Some(close) = rest.find(')') {
            let item = rest[..close].trim().to_string();
            let series = rest[close + 1..].trim().to_string();
            return (item, series);
        }
    }
    ("unknown".to_string(), trimmed.to_string())
}

/// Normalize slash dates as they appear in the repair and movement logs:
/// `YY/MM/DD-seq` becomes `20YY-MM-DD` (the century is always the 2000s),
/// `YYYY/MM/DD[-seq]` becomes `YYYY-MM-DD`. Month and day are zero-padded;
/// nothing else is validated, and unrecognized shapes pass through as-is.
pub fn normalize_slash_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let date_part = trimmed.split('-').next().unwrap_or("").trim();
    let parts: Vec<&str> = date_part.split('/').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return trimmed.to_string();
    }
    let year = match parts[0].len() {
        2 => format!("20{}", parts[0]),
        4 => parts[0].to_string(),
        _ => return trimmed.to_string(),
    };
    format!("{}-{:0>2}-{:0>2}", year, parts[1], parts[2])
}

/// Normalize dot dates from the calibration log: `YYYY.MM.DD` becomes
/// `YYYY-MM-DD` by substitution, with no range check on month or day.
pub fn normalize_dotted_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return trimmed.to_string();
    }
    format!("{}-{:0>2}-{:0>2}", parts[0], parts[1], parts[2])
}

/// A fresh registry entry with the defaults every new piece of equipment
/// starts with. Also used for placeholders synthesized for orphan serials.
pub fn new_equipment(serial: &str, raw_label: &str, default_location: &str) -> EquipmentRecord {
    let (measurement_item, product_series) = split_category_label(raw_label);
    EquipmentRecord {
        serial: serial.to_string(),
        measurement_item,
        product_series,
        category: raw_label.trim().to_string(),
        current_location: default_location.to_string(),
        status: EquipmentStatus::Awaiting,
        last_movement: String::new(),
        uptime_estimate_pct: 0,
        repair_count: 0,
        total_repair_cost: 0,
    }
}

fn structural_check(row: &[String], cfg: &SourceConfig) -> Result<(), RowSkip> {
    if row.len() < cfg.min_fields {
        return Err(RowSkip::TooFewFields);
    }
    let key = cfg.field_value(row, &cfg.key_field).unwrap_or("");
    if cfg.is_header_value(key) {
        return Err(RowSkip::Header);
    }
    Ok(())
}

pub fn equipment_from_row(
    row: &[String],
    cfg: &SourceConfig,
    default_location: &str,
) -> Result<EquipmentRecord, RowSkip> {
    structural_check(row, cfg)?;
    let serial = cfg.field_value(row, "serial").unwrap_or("");
    if serial.is_empty() {
        return Err(RowSkip::MissingField("serial"));
    }
    let label = cfg.field_value(row, "category").unwrap_or("");
    Ok(new_equipment(serial, label, default_location))
}

/// Repairs keep blank serials: they still count, in the "unknown" bucket.
/// Equipment enrichment fields stay empty until the join pass fills them.
pub fn repair_from_row(row: &[String], cfg: &SourceConfig) -> Result<RepairRecord, RowSkip> {
    structural_check(row, cfg)?;
    let raw_date = cfg.field_value(row, "date").unwrap_or("");
    Ok(RepairRecord {
        id: raw_date.to_string(),
        serial: cfg.field_value(row, "serial").unwrap_or("").to_string(),
        repair_date: normalize_slash_date(raw_date),
        repair_company: cfg.field_value(row, "repair_company").unwrap_or("").to_string(),
        manager: cfg.field_value(row, "manager").unwrap_or("").to_string(),
        product_series: cfg.field_value(row, "product_series").unwrap_or("").to_string(),
        cost: cfg.field_value(row, "cost").unwrap_or("").to_string(),
        repair_type: cfg.field_value(row, "repair_type").unwrap_or("").to_string(),
        sequence: cfg.field_value(row, "sequence").unwrap_or("").to_string(),
        measurement_item: String::new(),
        equipment_category: String::new(),
        equipment_status: String::new(),
    })
}

/// `id` and `createdAt` are run-scoped and assigned by the pipeline after
/// cleaning, so the sequence has no holes.
pub fn calibration_from_row(
    row: &[String],
    cfg: &SourceConfig,
) -> Result<CalibrationRecord, RowSkip> {
    structural_check(row, cfg)?;
    let serial = cfg.field_value(row, "serial_number").unwrap_or("");
    if serial.is_empty() {
        return Err(RowSkip::MissingField("serial_number"));
    }
    Ok(CalibrationRecord {
        id: String::new(),
        serial_number: serial.to_string(),
        latest_calibration_date: normalize_dotted_date(
            cfg.field_value(row, "latest_calibration_date").unwrap_or(""),
        ),
        next_calibration_date: normalize_dotted_date(
            cfg.field_value(row, "next_calibration_date").unwrap_or(""),
        ),
        created_at: String::new(),
    })
}

pub fn movement_from_row(row: &[String], cfg: &SourceConfig) -> Result<MovementRecord, RowSkip> {
    structural_check(row, cfg)?;
    let serial = cfg.field_value(row, "serial").unwrap_or("");
    if serial.is_empty() {
        return Err(RowSkip::MissingField("serial"));
    }
    let raw_date = cfg.field_value(row, "date").unwrap_or("");
    if raw_date.is_empty() {
        return Err(RowSkip::MissingField("date"));
    }
    Ok(MovementRecord {
        date: normalize_slash_date(raw_date),
        serial: serial.to_string(),
        from_location: cfg.field_value(row, "from_location").unwrap_or("").to_string(),
        to_location: cfg.field_value(row, "to_location").unwrap_or("").to_string(),
        item_name: cfg.field_value(row, "item_name").unwrap_or("").to_string(),
        quantity: cfg.field_value(row, "quantity").unwrap_or("").to_string(),
        note: cfg.field_value(row, "note").unwrap_or("").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn splits_parenthesized_labels() {
        let (item, series) = split_category_label("(SO2) Serinus50i");
        assert_eq!(item, "SO2");
        assert_eq!(series, "Serinus50i");
    }

    #[test]
    fn unlabelled_series_falls_back_to_unknown() {
        let (item, series) = split_category_label("Serinus50i");
        assert_eq!(item, "unknown");
        assert_eq!(series, "Serinus50i");
    }

    #[test]
    fn slash_dates_normalize_with_assumed_century() {
        assert_eq!(normalize_slash_date("24/01/10-1"), "2024-01-10");
        assert_eq!(normalize_slash_date("2024/07/18 -1"), "2024-07-18");
        assert_eq!(normalize_slash_date("2024/7/8"), "2024-07-08");
    }

    #[test]
    fn unrecognized_slash_dates_pass_through() {
        assert_eq!(normalize_slash_date("pending"), "pending");
        assert_eq!(normalize_slash_date(""), "");
        // Already-normalized dates are left alone.
        assert_eq!(normalize_slash_date("2024-07-18"), "2024-07-18");
    }

    #[test]
    fn dot_dates_normalize_without_validation() {
        assert_eq!(normalize_dotted_date("2024.03.05"), "2024-03-05");
        assert_eq!(normalize_dotted_date("2024.3.5"), "2024-03-05");
        // Out-of-range values pass through untouched by design.
        assert_eq!(normalize_dotted_date("2024.13.99"), "2024-13-99");
        assert_eq!(normalize_dotted_date("2024-03-05"), "2024-03-05");
    }

    #[test]
    fn equipment_rows_build_with_defaults() {
        let config = PipelineConfig::default();
        let record = equipment_from_row(
            &row(&["1", "(PM-2.5) PMS-204", "1501478"]),
            &config.equipment,
            &config.locations.default_location,
        )
        .unwrap();
        assert_eq!(record.serial, "1501478");
        assert_eq!(record.measurement_item, "PM-2.5");
        assert_eq!(record.product_series, "PMS-204");
        assert_eq!(record.status, EquipmentStatus::Awaiting);
        assert_eq!(record.current_location, "head-office warehouse");
        assert_eq!(record.repair_count, 0);
    }

    #[test]
    fn header_rows_are_discarded() {
        let config = PipelineConfig::default();
        let result = equipment_from_row(
            &row(&["no.", "product line", "serial number"]),
            &config.equipment,
            &config.locations.default_location,
        );
        assert_eq!(result.unwrap_err(), RowSkip::Header);
    }

    #[test]
    fn short_rows_are_malformed() {
        let config = PipelineConfig::default();
        let result = repair_from_row(&row(&["23/01/10-1", "x"]), &config.repairs);
        assert_eq!(result.unwrap_err(), RowSkip::TooFewFields);
    }

    #[test]
    fn repair_rows_keep_raw_cost_and_id() {
        let config = PipelineConfig::default();
        let record = repair_from_row(
            &row(&[
                "23/01/10-1",
                "",
                "Acme Repair",
                "",
                "Kim",
                "(SO2) Serinus50i",
                "1,200,000",
                "overhaul",
                "17-1733",
                "1",
            ]),
            &config.repairs,
        )
        .unwrap();
        assert_eq!(record.id, "23/01/10-1");
        assert_eq!(record.repair_date, "2023-01-10");
        assert_eq!(record.cost, "1,200,000");
        assert_eq!(record.sequence, "1");
        assert!(record.measurement_item.is_empty());
    }

    #[test]
    fn movement_rows_require_serial_and_date() {
        let config = PipelineConfig::default();
        let missing_serial = movement_from_row(
            &row(&["2024/07/18 -1", "head office", "site", "PMS-204", "", "1"]),
            &config.movements,
        );
        assert_eq!(missing_serial.unwrap_err(), RowSkip::MissingField("serial"));

        let ok = movement_from_row(
            &row(&["2024/07/18 -1", "head office", "site", "PMS-204", "1501478", "1"]),
            &config.movements,
        )
        .unwrap();
        assert_eq!(ok.date, "2024-07-18");
        assert_eq!(ok.note, "");
    }

    #[test]
    fn calibration_rows_normalize_both_dates() {
        let config = PipelineConfig::default();
        let record = calibration_from_row(
            &row(&["SO2", "Serinus50i", "B-3", "17-1733", "2024.03.05", "2025.03.04"]),
            &config.calibrations,
        )
        .unwrap();
        assert_eq!(record.latest_calibration_date, "2024-03-05");
        assert_eq!(record.next_calibration_date, "2025-03-04");
        assert!(record.id.is_empty());
    }
}
