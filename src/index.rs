use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::config::LocationRules;
use crate::models::{EquipmentRecord, EquipmentStatus, MovementRecord, RepairRecord};
use crate::normalize;

/// Immutable serial → equipment mapping, built once per run and shared by
/// reference with every aggregation pass.
pub struct JoinIndex {
    by_serial: HashMap<String, EquipmentRecord>,
}

impl JoinIndex {
    /// One pass over the registry. Duplicate serials resolve to the last
    /// record, matching the dedup policy of the cleaning stage.
    pub fn build(equipment: &[EquipmentRecord]) -> Self {
        let mut by_serial = HashMap::with_capacity(equipment.len());
        for record in equipment {
            by_serial.insert(record.serial.clone(), record.clone());
        }
        Self { by_serial }
    }

    pub fn lookup(&self, serial: &str) -> Option<&EquipmentRecord> {
        self.by_serial.get(serial)
    }

    pub fn category_for(&self, serial: &str) -> Option<&str> {
        self.lookup(serial).map(|e| e.category.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }
}

/// Result of cross-checking transaction-log serials against the registry.
#[derive(Debug)]
pub struct SerialAudit {
    pub referenced: BTreeSet<String>,
    pub present: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

pub fn audit_serials<'a, I>(index: &JoinIndex, referenced: I) -> SerialAudit
where
    I: IntoIterator<Item = &'a str>,
{
    let referenced: BTreeSet<String> = referenced
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    let (present, missing) = referenced
        .iter()
        .cloned()
        .partition(|s| index.lookup(s).is_some());
    SerialAudit {
        referenced,
        present,
        missing,
    }
}

/// Placeholder registry entries for orphan serials, so joined passes never
/// see an unresolved reference. `labels` carries the product label observed
/// next to each serial in the transaction logs, when any.
pub fn synthesize_missing(
    audit: &SerialAudit,
    labels: &BTreeMap<String, String>,
    default_location: &str,
) -> Vec<EquipmentRecord> {
    audit
        .missing
        .iter()
        .map(|serial| {
            let label = labels.get(serial).map(String::as_str).unwrap_or("");
            normalize::new_equipment(serial, label, default_location)
        })
        .collect()
}

/// Copy equipment metadata onto each repair: a point-in-time snapshot, not
/// a live reference. Unresolved serials degrade to the "unknown" bucket.
pub fn enrich_repairs(repairs: &mut [RepairRecord], index: &JoinIndex) {
    for repair in repairs.iter_mut() {
        match index.lookup(&repair.serial) {
            Some(equipment) => {
                repair.measurement_item = equipment.measurement_item.clone();
                repair.equipment_category = equipment.category.clone();
                repair.equipment_status = equipment.status.as_str().to_string();
            }
            None => {
                repair.measurement_item = "unknown".to_string();
                repair.equipment_category = repair.product_series.clone();
                repair.equipment_status = "unknown".to_string();
            }
        }
    }
}

pub fn classify_destination(to_location: &str, rules: &LocationRules) -> (EquipmentStatus, String) {
    let contains_any = |keywords: &[String]| {
        keywords
            .iter()
            .any(|k| !k.is_empty() && to_location.contains(k.as_str()))
    };
    if contains_any(&rules.site_keywords) {
        (EquipmentStatus::Active, rules.site_location.clone())
    } else if contains_any(&rules.vendor_keywords) {
        (EquipmentStatus::UnderRepair, rules.vendor_location.clone())
    } else {
        (EquipmentStatus::Awaiting, rules.default_location.clone())
    }
}

/// Fold the movement event stream into the registry, last write wins: the
/// movement with the greatest parseable date per serial decides status,
/// location and the lastMovement description. Ties keep the first-seen
/// movement; unparseable dates are ignored. Returns how many registry
/// entries changed.
pub fn apply_latest_movements(
    equipment: &mut [EquipmentRecord],
    movements: &[MovementRecord],
    rules: &LocationRules,
) -> usize {
    let mut latest: HashMap<&str, (NaiveDate, &MovementRecord)> = HashMap::new();
    for movement in movements {
        let Ok(date) = NaiveDate::parse_from_str(&movement.date, "%Y-%m-%d") else {
            continue;
        };
        match latest.get(movement.serial.as_str()) {
            Some((existing, _)) if date <= *existing => {}
            _ => {
                latest.insert(movement.serial.as_str(), (date, movement));
            }
        }
    }

    let mut updated = 0;
    for record in equipment.iter_mut() {
        let Some((date, movement)) = latest.get(record.serial.as_str()) else {
            continue;
        };
        let to_location = movement.to_location.trim();
        if to_location.is_empty() {
            continue;
        }
        let (status, location) = classify_destination(to_location, rules);
        record.status = status;
        record.current_location = location;
        record.last_movement = format!(
            "{} - {} -> {}",
            date.format("%Y-%m-%d"),
            movement.from_location.trim(),
            to_location
        );
        updated += 1;
    }
    updated
}
