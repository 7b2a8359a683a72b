use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::index::JoinIndex;
use crate::models::{parse_cost, prefix, RepairRecord};

const TOP_K: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairsOverview {
    pub total_repairs: u32,
    pub total_repair_cost: i64,
    pub avg_repair_cost: i64,
    pub period: Period,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyCount {
    pub company: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    pub count: u32,
    pub total_cost: i64,
    pub avg_cost: i64,
    pub min_cost: i64,
    pub max_cost: i64,
    pub unique_serials: Vec<String>,
    pub companies: Vec<CompanyCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyBreakdown {
    pub company: String,
    pub count: u32,
    pub total_cost: i64,
    pub avg_cost: i64,
    pub min_cost: i64,
    pub max_cost: i64,
    pub categories: Vec<CategoryCount>,
    pub unique_serials: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeBreakdown {
    pub repair_type: String,
    pub count: u32,
    pub total_cost: i64,
    pub avg_cost: i64,
    pub min_cost: i64,
    pub max_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialBreakdown {
    pub serial: String,
    pub category: String,
    pub count: u32,
    pub total_cost: i64,
    pub avg_cost: i64,
    pub min_cost: i64,
    pub max_cost: i64,
    pub first_repair_date: String,
    pub last_repair_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairsTopK {
    pub top_categories_by_cost: Vec<CategoryBreakdown>,
    pub top_companies_by_cost: Vec<CompanyBreakdown>,
    pub top_types_by_cost: Vec<TypeBreakdown>,
    pub top_serials_by_cost: Vec<SerialBreakdown>,
}

/// All five visibility artifacts from one pass over the repair set.
#[derive(Debug, Clone)]
pub struct RepairsVisibility {
    pub overview: RepairsOverview,
    pub by_category: Vec<CategoryBreakdown>,
    pub by_company: Vec<CompanyBreakdown>,
    pub by_type: Vec<TypeBreakdown>,
    pub by_serial: Vec<SerialBreakdown>,
    pub topk: RepairsTopK,
}

#[derive(Default)]
struct CostAcc {
    count: u32,
    total: i64,
    min: Option<i64>,
    max: Option<i64>,
}

impl CostAcc {
    fn add(&mut self, cost: i64) {
        self.count += 1;
        self.total += cost;
        self.min = Some(self.min.map_or(cost, |m| m.min(cost)));
        self.max = Some(self.max.map_or(cost, |m| m.max(cost)));
    }

    fn avg(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            (self.total as f64 / self.count as f64).round() as i64
        }
    }
}

#[derive(Default)]
struct CategoryAcc {
    costs: CostAcc,
    serials: BTreeSet<String>,
    companies: HashMap<String, u32>,
}

#[derive(Default)]
struct CompanyAcc {
    costs: CostAcc,
    serials: BTreeSet<String>,
    categories: HashMap<String, u32>,
}

#[derive(Default)]
struct SerialAcc {
    category: String,
    costs: CostAcc,
    first_date: Option<String>,
    last_date: Option<String>,
}

fn or_unknown(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Count-desc, label-asc ordering shared by the nested rollups.
fn sorted_counts(counts: HashMap<String, u32>) -> Vec<(String, u32)> {
    let mut items: Vec<(String, u32)> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}

/// Single pass over all repairs: global overview plus per-category,
/// per-company, per-type and per-serial rollups. Unparsable costs count as
/// zero but never drop the record; blank grouping labels fall into the
/// "unknown" bucket and unresolved categories into "UNKNOWN".
pub fn repairs_visibility(repairs: &[RepairRecord], index: &JoinIndex) -> RepairsVisibility {
    let mut total = CostAcc::default();
    let mut first_date: Option<String> = None;
    let mut last_date: Option<String> = None;

    let mut by_category: HashMap<String, CategoryAcc> = HashMap::new();
    let mut by_company: HashMap<String, CompanyAcc> = HashMap::new();
    let mut by_type: HashMap<String, CostAcc> = HashMap::new();
    let mut by_serial: HashMap<String, SerialAcc> = HashMap::new();

    for repair in repairs {
        let date = prefix(repair.repair_date.trim(), 10).to_string();
        let cost = parse_cost(&repair.cost).unwrap_or(0);
        let serial = repair.serial.trim().to_string();
        let company = or_unknown(&repair.repair_company);
        let repair_type = or_unknown(&repair.repair_type);
        let category = {
            let denormalized = repair.equipment_category.trim();
            if !denormalized.is_empty() {
                denormalized.to_string()
            } else {
                match index.category_for(&serial).map(str::trim) {
                    Some(c) if !c.is_empty() => c.to_string(),
                    _ => "UNKNOWN".to_string(),
                }
            }
        };

        total.add(cost);
        if !date.is_empty() {
            update_bounds(&mut first_date, &mut last_date, &date);
        }

        let cat = by_category.entry(category.clone()).or_default();
        cat.costs.add(cost);
        if !serial.is_empty() {
            cat.serials.insert(serial.clone());
        }
        *cat.companies.entry(company.clone()).or_insert(0) += 1;

        let com = by_company.entry(company.clone()).or_default();
        com.costs.add(cost);
        if !serial.is_empty() {
            com.serials.insert(serial.clone());
        }
        *com.categories.entry(category.clone()).or_insert(0) += 1;

        by_type.entry(repair_type).or_default().add(cost);

        let serial_key = if serial.is_empty() {
            "unknown".to_string()
        } else {
            serial.clone()
        };
        let ser = by_serial.entry(serial_key).or_default();
        if ser.costs.count == 0 {
            ser.category = category.clone();
        }
        ser.costs.add(cost);
        if !date.is_empty() {
            update_bounds(&mut ser.first_date, &mut ser.last_date, &date);
        }
    }

    let overview = RepairsOverview {
        total_repairs: total.count,
        total_repair_cost: total.total,
        avg_repair_cost: total.avg(),
        period: Period {
            from: first_date.unwrap_or_default(),
            to: last_date.unwrap_or_default(),
        },
    };

    let mut by_category: Vec<CategoryBreakdown> = by_category
        .into_iter()
        .map(|(category, acc)| CategoryBreakdown {
            category,
            count: acc.costs.count,
            total_cost: acc.costs.total,
            avg_cost: acc.costs.avg(),
            min_cost: acc.costs.min.unwrap_or(0),
            max_cost: acc.costs.max.unwrap_or(0),
            unique_serials: acc.serials.into_iter().collect(),
            companies: sorted_counts(acc.companies)
                .into_iter()
                .map(|(company, count)| CompanyCount { company, count })
                .collect(),
        })
        .collect();
    by_category.sort_by(|a, b| {
        b.total_cost
            .cmp(&a.total_cost)
            .then_with(|| a.category.cmp(&b.category))
    });

    let mut by_company: Vec<CompanyBreakdown> = by_company
        .into_iter()
        .map(|(company, acc)| CompanyBreakdown {
            company,
            count: acc.costs.count,
            total_cost: acc.costs.total,
            avg_cost: acc.costs.avg(),
            min_cost: acc.costs.min.unwrap_or(0),
            max_cost: acc.costs.max.unwrap_or(0),
            categories: sorted_counts(acc.categories)
                .into_iter()
                .map(|(category, count)| CategoryCount { category, count })
                .collect(),
            unique_serials: acc.serials.into_iter().collect(),
        })
        .collect();
    by_company.sort_by(|a, b| {
        b.total_cost
            .cmp(&a.total_cost)
            .then_with(|| a.company.cmp(&b.company))
    });

    let mut by_type: Vec<TypeBreakdown> = by_type
        .into_iter()
        .map(|(repair_type, acc)| TypeBreakdown {
            repair_type,
            count: acc.count,
            total_cost: acc.total,
            avg_cost: acc.avg(),
            min_cost: acc.min.unwrap_or(0),
            max_cost: acc.max.unwrap_or(0),
        })
        .collect();
    by_type.sort_by(|a, b| {
        b.total_cost
            .cmp(&a.total_cost)
            .then_with(|| a.repair_type.cmp(&b.repair_type))
    });

    let mut by_serial: Vec<SerialBreakdown> = by_serial
        .into_iter()
        .map(|(serial, acc)| SerialBreakdown {
            serial,
            category: acc.category,
            count: acc.costs.count,
            total_cost: acc.costs.total,
            avg_cost: acc.costs.avg(),
            min_cost: acc.costs.min.unwrap_or(0),
            max_cost: acc.costs.max.unwrap_or(0),
            first_repair_date: acc.first_date.unwrap_or_default(),
            last_repair_date: acc.last_date.unwrap_or_default(),
        })
        .collect();
    by_serial.sort_by(|a, b| {
        b.total_cost
            .cmp(&a.total_cost)
            .then_with(|| a.serial.cmp(&b.serial))
    });

    let topk = RepairsTopK {
        top_categories_by_cost: by_category.iter().take(TOP_K).cloned().collect(),
        top_companies_by_cost: by_company.iter().take(TOP_K).cloned().collect(),
        top_types_by_cost: by_type.iter().take(TOP_K).cloned().collect(),
        top_serials_by_cost: by_serial.iter().take(TOP_K).cloned().collect(),
    };

    RepairsVisibility {
        overview,
        by_category,
        by_company,
        by_type,
        by_serial,
        topk,
    }
}

fn update_bounds(first: &mut Option<String>, last: &mut Option<String>, date: &str) {
    if first.as_deref().map_or(true, |f| date < f) {
        *first = Some(date.to_string());
    }
    if last.as_deref().map_or(true, |l| date > l) {
        *last = Some(date.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;

    fn repair(serial: &str, company: &str, rtype: &str, cost: &str, date: &str) -> RepairRecord {
        RepairRecord {
            id: date.to_string(),
            serial: serial.to_string(),
            repair_date: date.to_string(),
            repair_company: company.to_string(),
            manager: String::new(),
            product_series: String::new(),
            cost: cost.to_string(),
            repair_type: rtype.to_string(),
            sequence: String::new(),
            measurement_item: String::new(),
            equipment_category: String::new(),
            equipment_status: String::new(),
        }
    }

    fn empty_index() -> JoinIndex {
        JoinIndex::build(&[])
    }

    #[test]
    fn unparsable_cost_counts_as_zero_but_keeps_record() {
        let repairs = vec![
            repair("A", "Acme", "parts", "1,000", "2024-01-05"),
            repair("A", "Acme", "parts", "abc", "2024-01-20"),
        ];
        let visibility = repairs_visibility(&repairs, &empty_index());
        let serial = &visibility.by_serial[0];
        assert_eq!(serial.serial, "A");
        assert_eq!(serial.count, 2);
        assert_eq!(serial.total_cost, 1000);
        assert_eq!(serial.min_cost, 0);
        assert_eq!(serial.max_cost, 1000);
        assert_eq!(serial.first_repair_date, "2024-01-05");
        assert_eq!(serial.last_repair_date, "2024-01-20");
        assert_eq!(visibility.overview.total_repairs, 2);
        assert_eq!(visibility.overview.total_repair_cost, 1000);
        assert_eq!(visibility.overview.avg_repair_cost, 500);
    }

    #[test]
    fn breakdowns_sort_by_cost_desc_then_label_asc() {
        let repairs = vec![
            repair("A", "Zeta Service", "parts", "100", "2024-01-01"),
            repair("B", "Alpha Service", "parts", "100", "2024-01-02"),
            repair("C", "Mid Service", "parts", "500", "2024-01-03"),
        ];
        let visibility = repairs_visibility(&repairs, &empty_index());
        let companies: Vec<&str> = visibility
            .by_company
            .iter()
            .map(|c| c.company.as_str())
            .collect();
        assert_eq!(companies, vec!["Mid Service", "Alpha Service", "Zeta Service"]);
    }

    #[test]
    fn blank_labels_fall_into_unknown_buckets() {
        let repairs = vec![repair("", "", "", "250", "2024-01-01")];
        let visibility = repairs_visibility(&repairs, &empty_index());
        assert_eq!(visibility.by_company[0].company, "unknown");
        assert_eq!(visibility.by_type[0].repair_type, "unknown");
        assert_eq!(visibility.by_serial[0].serial, "unknown");
        assert_eq!(visibility.by_category[0].category, "UNKNOWN");
    }

    #[test]
    fn category_resolves_from_denormalized_field_then_index() {
        let registry = vec![normalize::new_equipment(
            "17-1733",
            "(SO2) Serinus50i",
            "head-office warehouse",
        )];
        let index = JoinIndex::build(&registry);
        let mut denormalized = repair("17-1733", "Acme", "parts", "100", "2024-01-01");
        denormalized.equipment_category = "(SO2) Serinus50i".to_string();
        let via_index = repair("17-1733", "Acme", "parts", "200", "2024-01-02");
        let visibility = repairs_visibility(&[denormalized, via_index], &index);
        assert_eq!(visibility.by_category.len(), 1);
        assert_eq!(visibility.by_category[0].category, "(SO2) Serinus50i");
        assert_eq!(visibility.by_category[0].count, 2);
        assert_eq!(
            visibility.by_category[0].unique_serials,
            vec!["17-1733".to_string()]
        );
    }

    #[test]
    fn nested_counts_sort_desc_then_label() {
        let repairs = vec![
            repair("A", "Beta", "parts", "10", "2024-01-01"),
            repair("A", "Beta", "parts", "10", "2024-01-02"),
            repair("A", "Alpha", "parts", "10", "2024-01-03"),
            repair("A", "Gamma", "parts", "10", "2024-01-04"),
        ];
        let visibility = repairs_visibility(&repairs, &empty_index());
        let companies: Vec<(&str, u32)> = visibility.by_category[0]
            .companies
            .iter()
            .map(|c| (c.company.as_str(), c.count))
            .collect();
        assert_eq!(companies, vec![("Beta", 2), ("Alpha", 1), ("Gamma", 1)]);
    }

    #[test]
    fn topk_is_a_slice_of_the_sorted_breakdowns() {
        let mut repairs = Vec::new();
        for i in 0..15 {
            repairs.push(repair(
                &format!("S{i:02}"),
                &format!("Company {i:02}"),
                "parts",
                &format!("{}", (15 - i) * 100),
                "2024-01-01",
            ));
        }
        let visibility = repairs_visibility(&repairs, &empty_index());
        assert_eq!(visibility.by_company.len(), 15);
        assert_eq!(visibility.topk.top_companies_by_cost.len(), 10);
        assert_eq!(
            visibility.topk.top_companies_by_cost[0].company,
            visibility.by_company[0].company
        );
        assert_eq!(visibility.topk.top_serials_by_cost.len(), 10);
    }
}
