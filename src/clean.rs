use std::collections::HashMap;
use std::hash::Hash;

/// Keep only records whose identity value is non-blank and not one of the
/// sentinel markers (header labels, "not applicable" values). Stateless,
/// so running it twice is the same as running it once.
pub fn retain_valid<T, F>(records: Vec<T>, sentinels: &[String], key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    records
        .into_iter()
        .filter(|record| {
            let id = key(record).trim();
            !id.is_empty() && !sentinels.iter().any(|s| s == id)
        })
        .collect()
}

/// Collapse duplicate keys, keeping each key at its first position but with
/// the payload of its last occurrence — the same record the join index
/// would resolve to.
pub fn dedup_by_key_last<T, K, F>(records: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<Option<T>> = Vec::new();
    for record in records {
        let k = key(&record);
        match slots.get(&k) {
            Some(&i) => out[i] = Some(record),
            None => {
                slots.insert(k, out.len());
                out.push(Some(record));
            }
        }
    }
    out.into_iter().flatten().collect()
}
