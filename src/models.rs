use serde::{Deserialize, Serialize};

/// Lifecycle state of a piece of equipment, folded from the movement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentStatus {
    Awaiting,
    Active,
    UnderRepair,
    Unknown,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Awaiting => "awaiting",
            EquipmentStatus::Active => "active",
            EquipmentStatus::UnderRepair => "under-repair",
            EquipmentStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRecord {
    pub serial: String,
    pub measurement_item: String,
    pub product_series: String,
    /// Raw combined "(measurement item) product series" label.
    pub category: String,
    pub current_location: String,
    pub status: EquipmentStatus,
    pub last_movement: String,
    pub uptime_estimate_pct: u8,
    pub repair_count: u32,
    pub total_repair_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRecord {
    /// Raw date+sequence label from the source. Display only; repairs on the
    /// same day with the same sequence share it.
    pub id: String,
    pub serial: String,
    pub repair_date: String,
    pub repair_company: String,
    pub manager: String,
    pub product_series: String,
    /// Numeric string as found in the source; may be malformed.
    pub cost: String,
    pub repair_type: String,
    pub sequence: String,
    pub measurement_item: String,
    pub equipment_category: String,
    pub equipment_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    pub id: String,
    pub serial_number: String,
    pub latest_calibration_date: String,
    pub next_calibration_date: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRecord {
    pub date: String,
    pub serial: String,
    pub from_location: String,
    pub to_location: String,
    pub item_name: String,
    pub quantity: String,
    pub note: String,
}

/// Parse a cost field: commas are thousands separators, surrounding
/// whitespace is noise. Returns None when the remainder is not an integer.
pub fn parse_cost(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// First `n` bytes of `s` as a prefix, or the whole string when shorter.
/// Grouping keys (YYYY-MM, YYYY-MM-DD) are ASCII after normalization.
pub fn prefix(s: &str, n: usize) -> &str {
    s.get(..n).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cost_strips_thousands_separators() {
        assert_eq!(parse_cost("1,000"), Some(1000));
        assert_eq!(parse_cost(" 250000 "), Some(250_000));
        assert_eq!(parse_cost("0"), Some(0));
    }

    #[test]
    fn parse_cost_rejects_non_numeric() {
        assert_eq!(parse_cost("abc"), None);
        assert_eq!(parse_cost(""), None);
        assert_eq!(parse_cost("  "), None);
        assert_eq!(parse_cost("12.5"), None);
    }

    #[test]
    fn prefix_is_total() {
        assert_eq!(prefix("2024-01-05", 7), "2024-01");
        assert_eq!(prefix("2024", 7), "2024");
        assert_eq!(prefix("", 10), "");
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&EquipmentStatus::UnderRepair).unwrap();
        assert_eq!(json, "\"under-repair\"");
        assert_eq!(EquipmentStatus::Awaiting.as_str(), "awaiting");
    }
}
