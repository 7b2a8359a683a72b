use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{parse_cost, EquipmentRecord, MovementRecord, RepairRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSummary {
    pub total_equipment: u32,
    pub by_measurement_item: BTreeMap<String, u32>,
    pub by_status: BTreeMap<String, u32>,
    pub by_location: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: i64,
    pub average_cost: i64,
    pub min_cost: i64,
    pub max_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairsSummary {
    pub total_repairs: u32,
    /// Percent of repairs whose serial resolved to a registry entry, one
    /// decimal place.
    pub equipment_match_rate: f64,
    pub by_company: BTreeMap<String, u32>,
    pub by_repair_type: BTreeMap<String, u32>,
    pub cost_summary: CostSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsSummary {
    pub total_movements: u32,
    pub recent_movements: Vec<MovementRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairedSerial {
    pub serial: String,
    pub repair_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemExamples {
    pub count: u32,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopEquipment {
    pub most_repaired: Vec<RepairedSerial>,
    pub by_measurement_item: BTreeMap<String, ItemExamples>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub last_repairs: Vec<RepairRecord>,
    pub last_movements: Vec<MovementRecord>,
    pub system_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub equipment_summary: EquipmentSummary,
    pub repairs_summary: RepairsSummary,
    pub movements_summary: MovementsSummary,
    pub top_equipment: TopEquipment,
    pub recent_activity: RecentActivity,
}

fn bucket(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

fn last_n<T: Clone>(records: &[T], n: usize) -> Vec<T> {
    records[records.len().saturating_sub(n)..].to_vec()
}

/// One combined artifact for the dashboard landing view.
pub fn dashboard_summary(
    equipment: &[EquipmentRecord],
    repairs: &[RepairRecord],
    movements: &[MovementRecord],
) -> DashboardSummary {
    let mut by_measurement_item: BTreeMap<String, u32> = BTreeMap::new();
    let mut by_status: BTreeMap<String, u32> = BTreeMap::new();
    let mut by_location: BTreeMap<String, u32> = BTreeMap::new();
    for record in equipment {
        *by_measurement_item
            .entry(bucket(&record.measurement_item))
            .or_insert(0) += 1;
        *by_status.entry(record.status.as_str().to_string()).or_insert(0) += 1;
        *by_location.entry(bucket(&record.current_location)).or_insert(0) += 1;
    }

    let mut by_company: BTreeMap<String, u32> = BTreeMap::new();
    let mut by_repair_type: BTreeMap<String, u32> = BTreeMap::new();
    let mut total_cost: i64 = 0;
    let mut min_cost: i64 = 0;
    let mut max_cost: i64 = 0;
    let mut matched: u32 = 0;
    let mut serial_counts: BTreeMap<String, u32> = BTreeMap::new();
    for repair in repairs {
        *by_company.entry(bucket(&repair.repair_company)).or_insert(0) += 1;
        *by_repair_type.entry(bucket(&repair.repair_type)).or_insert(0) += 1;
        if let Some(cost) = parse_cost(&repair.cost) {
            total_cost += cost;
            if cost > 0 && (min_cost == 0 || cost < min_cost) {
                min_cost = cost;
            }
            if cost > max_cost {
                max_cost = cost;
            }
        }
        if repair.measurement_item != "unknown" {
            matched += 1;
        }
        let serial = repair.serial.trim();
        if !serial.is_empty() {
            *serial_counts.entry(serial.to_string()).or_insert(0) += 1;
        }
    }

    let total_repairs = repairs.len() as u32;
    let average_cost = if total_repairs > 0 {
        total_cost.div_euclid(total_repairs as i64)
    } else {
        0
    };
    let equipment_match_rate = if total_repairs > 0 {
        (matched as f64 / total_repairs as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let mut most_repaired: Vec<RepairedSerial> = serial_counts
        .into_iter()
        .map(|(serial, repair_count)| RepairedSerial {
            serial,
            repair_count,
        })
        .collect();
    most_repaired.sort_by(|a, b| {
        b.repair_count
            .cmp(&a.repair_count)
            .then_with(|| a.serial.cmp(&b.serial))
    });
    most_repaired.truncate(10);

    let mut item_examples: BTreeMap<String, ItemExamples> = BTreeMap::new();
    for (item, count) in &by_measurement_item {
        let examples: Vec<String> = equipment
            .iter()
            .filter(|e| bucket(&e.measurement_item) == *item)
            .take(3)
            .map(|e| e.serial.clone())
            .collect();
        item_examples.insert(
            item.clone(),
            ItemExamples {
                count: *count,
                examples,
            },
        );
    }

    DashboardSummary {
        equipment_summary: EquipmentSummary {
            total_equipment: equipment.len() as u32,
            by_measurement_item,
            by_status,
            by_location,
        },
        repairs_summary: RepairsSummary {
            total_repairs,
            equipment_match_rate,
            by_company,
            by_repair_type,
            cost_summary: CostSummary {
                total_cost,
                average_cost,
                min_cost,
                max_cost,
            },
        },
        movements_summary: MovementsSummary {
            total_movements: movements.len() as u32,
            recent_movements: last_n(movements, 5),
        },
        top_equipment: TopEquipment {
            most_repaired,
            by_measurement_item: item_examples,
        },
        recent_activity: RecentActivity {
            last_repairs: last_n(repairs, 5),
            last_movements: last_n(movements, 5),
            system_status: "normal".to_string(),
        },
    }
}
