use std::collections::HashSet;

pub fn parse_status_set(value: &str) -> Result<HashSet<u16>, String> {
    Ok(parse_status_list(value)?.into_iter().collect())
}

/// Like [`parse_status_set`] but keeps the order the codes were written in,
/// which matters for the fuzzy-status baselines reported to expressions.
pub fn parse_status_list(value: &str) -> Result<Vec<u16>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("status list is empty".to_string());
    }
    let mut out: Vec<u16> = Vec::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let code: u16 = item
            .parse()
            .map_err(|_| format!("invalid status code '{item}'"))?;
        if !out.contains(&code) {
            out.push(code);
        }
    }
    if out.is_empty() {
        return Err("status list is empty".to_string());
    }
    Ok(out)
}

pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
