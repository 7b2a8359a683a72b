use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::index::JoinIndex;
use crate::models::{parse_cost, prefix, CalibrationRecord, MovementRecord, RepairRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUptime {
    pub category: String,
    pub uptime_estimate_pct: u8,
}

/// Activity ratio per category, averaged over observed days. Per (day,
/// category) the ratio is 1.0 whenever at least one serial moved — which
/// makes this a day-had-activity indicator rather than true utilization.
/// That is the metric the dashboard has always shown; keep it.
pub fn uptime_by_category(movements: &[MovementRecord], index: &JoinIndex) -> Vec<CategoryUptime> {
    let mut moved: BTreeMap<(String, String), BTreeSet<&str>> = BTreeMap::new();
    for movement in movements {
        let date = movement.date.trim();
        let serial = movement.serial.trim();
        if date.is_empty() || serial.is_empty() {
            continue;
        }
        let day = prefix(date, 10).to_string();
        let category = index.category_for(serial).unwrap_or("UNKNOWN").to_string();
        moved.entry((day, category)).or_default().insert(serial);
    }

    let mut ratios: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for ((_, category), serials) in &moved {
        let ratio = if serials.is_empty() { 0.0 } else { 1.0 };
        ratios.entry(category.clone()).or_default().push(ratio);
    }

    ratios
        .into_iter()
        .map(|(category, values)| {
            let pct = if values.is_empty() {
                0
            } else {
                (values.iter().sum::<f64>() / values.len() as f64 * 100.0).round() as u8
            };
            CategoryUptime {
                category,
                uptime_estimate_pct: pct,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCost {
    pub month: String,
    pub total_repair_cost: i64,
}

/// Legacy month → cost-sum artifact. Records with a blank date or a
/// non-numeric cost are skipped outright, never zero-filled.
pub fn repair_cost_monthly(repairs: &[RepairRecord]) -> Vec<MonthlyCost> {
    let mut monthly: BTreeMap<String, i64> = BTreeMap::new();
    for repair in repairs {
        let date = repair.repair_date.trim();
        if date.is_empty() {
            continue;
        }
        let Some(cost) = parse_cost(&repair.cost) else {
            continue;
        };
        *monthly.entry(prefix(date, 7).to_string()).or_insert(0) += cost;
    }
    monthly
        .into_iter()
        .map(|(month, total_repair_cost)| MonthlyCost {
            month,
            total_repair_cost,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRepairs {
    pub month: String,
    pub count: u32,
    pub total_cost: i64,
}

/// Month → repair count and cost sum, same skip policy as the legacy
/// cost-only artifact.
pub fn repairs_monthly(repairs: &[RepairRecord]) -> Vec<MonthlyRepairs> {
    let mut monthly: BTreeMap<String, (u32, i64)> = BTreeMap::new();
    for repair in repairs {
        let date = repair.repair_date.trim();
        if date.is_empty() {
            continue;
        }
        let Some(cost) = parse_cost(&repair.cost) else {
            continue;
        };
        let entry = monthly.entry(prefix(date, 7).to_string()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += cost;
    }
    monthly
        .into_iter()
        .map(|(month, (count, total_cost))| MonthlyRepairs {
            month,
            count,
            total_cost,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub month: String,
    pub scheduled_calibrations: u32,
}

/// Calibrations coming due, counted per month of nextCalibrationDate. The
/// month key must be exactly `YYYY-MM`; anything else is dropped.
pub fn qc_next_due_monthly(calibrations: &[CalibrationRecord]) -> Vec<MonthlySchedule> {
    let mut monthly: BTreeMap<String, u32> = BTreeMap::new();
    for record in calibrations {
        let next = record.next_calibration_date.trim();
        if next.is_empty() {
            continue;
        }
        let month = prefix(next, 7);
        if month.len() != 7 || month.as_bytes()[4] != b'-' {
            continue;
        }
        *monthly.entry(month.to_string()).or_insert(0) += 1;
    }
    monthly
        .into_iter()
        .map(|(month, scheduled_calibrations)| MonthlySchedule {
            month,
            scheduled_calibrations,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EquipmentStatus, MovementRecord};
    use crate::normalize;

    fn repair(serial: &str, cost: &str, date: &str) -> RepairRecord {
        RepairRecord {
            id: date.to_string(),
            serial: serial.to_string(),
            repair_date: date.to_string(),
            repair_company: "Acme".to_string(),
            manager: String::new(),
            product_series: String::new(),
            cost: cost.to_string(),
            repair_type: "parts".to_string(),
            sequence: String::new(),
            measurement_item: String::new(),
            equipment_category: String::new(),
            equipment_status: EquipmentStatus::Awaiting.as_str().to_string(),
        }
    }

    fn movement(serial: &str, date: &str) -> MovementRecord {
        MovementRecord {
            date: date.to_string(),
            serial: serial.to_string(),
            from_location: "head office".to_string(),
            to_location: "site".to_string(),
            item_name: String::new(),
            quantity: "1".to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn monthly_cost_skips_malformed_records() {
        let repairs = vec![
            repair("A", "1,000", "2024-01-05"),
            repair("A", "abc", "2024-01-20"),
            repair("B", "250", ""),
        ];
        let monthly = repair_cost_monthly(&repairs);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].month, "2024-01");
        assert_eq!(monthly[0].total_repair_cost, 1000);
    }

    #[test]
    fn monthly_counts_follow_the_same_skip_policy() {
        let repairs = vec![
            repair("A", "1,000", "2024-01-05"),
            repair("A", "abc", "2024-01-20"),
            repair("B", "500", "2024-02-01"),
        ];
        let monthly = repairs_monthly(&repairs);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].month, "2024-01");
        assert_eq!(monthly[0].count, 1);
        assert_eq!(monthly[0].total_cost, 1000);
        assert_eq!(monthly[1].month, "2024-02");
        assert_eq!(monthly[1].count, 1);
    }

    #[test]
    fn months_emit_in_ascending_order() {
        let repairs = vec![
            repair("A", "10", "2024-03-01"),
            repair("A", "10", "2023-12-01"),
            repair("A", "10", "2024-01-01"),
        ];
        let months: Vec<String> = repair_cost_monthly(&repairs)
            .into_iter()
            .map(|m| m.month)
            .collect();
        assert_eq!(months, vec!["2023-12", "2024-01", "2024-03"]);
    }

    #[test]
    fn qc_due_requires_well_formed_month() {
        let mut records = Vec::new();
        for next in ["2025-03-04", "2025-03-18", "2025-04-01", "202503", "", "2025/03/04"] {
            records.push(CalibrationRecord {
                id: String::new(),
                serial_number: "17-1733".to_string(),
                latest_calibration_date: String::new(),
                next_calibration_date: next.to_string(),
                created_at: String::new(),
            });
        }
        let monthly = qc_next_due_monthly(&records);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].month, "2025-03");
        assert_eq!(monthly[0].scheduled_calibrations, 2);
        assert_eq!(monthly[1].month, "2025-04");
        assert_eq!(monthly[1].scheduled_calibrations, 1);
    }

    #[test]
    fn uptime_groups_by_category_with_unknown_fallback() {
        let registry = vec![normalize::new_equipment(
            "1501478",
            "(PM-2.5) PMS-204",
            "head-office warehouse",
        )];
        let index = JoinIndex::build(&registry);
        let movements = vec![
            movement("1501478", "2024-01-05"),
            movement("1501478", "2024-01-06"),
            movement("stray", "2024-01-05"),
        ];
        let uptime = uptime_by_category(&movements, &index);
        assert_eq!(uptime.len(), 2);
        // Ascending category order; every observed category reports 100.
        assert_eq!(uptime[0].category, "(PM-2.5) PMS-204");
        assert_eq!(uptime[0].uptime_estimate_pct, 100);
        assert_eq!(uptime[1].category, "UNKNOWN");
        assert_eq!(uptime[1].uptime_estimate_pct, 100);
    }
}
