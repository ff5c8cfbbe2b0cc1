//! Ordered token rewriters applied between the word source and dispatch.
//! A token that comes out empty is skipped entirely.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    Lower,
    Upper,
    Reverse,
    Prefix(String),
    Suffix(String),
    Replace(String, String),
    /// Drop tokens containing the needle (rewrites them to empty).
    Skip(String),
}

impl Transform {
    pub fn apply(&self, token: String) -> String {
        match self {
            Transform::Lower => token.to_ascii_lowercase(),
            Transform::Upper => token.to_ascii_uppercase(),
            Transform::Reverse => token.chars().rev().collect(),
            Transform::Prefix(p) => format!("{p}{token}"),
            Transform::Suffix(s) => format!("{token}{s}"),
            Transform::Replace(from, to) => token.replace(from.as_str(), to),
            Transform::Skip(needle) => {
                if token.contains(needle.as_str()) {
                    String::new()
                } else {
                    token
                }
            }
        }
    }
}

/// Applies every transform in order. Returns `None` once the token is empty;
/// callers treat that as "do not dispatch".
pub fn apply_all(transforms: &[Transform], token: String) -> Option<String> {
    let mut token = token;
    for t in transforms {
        token = t.apply(token);
        if token.is_empty() {
            return None;
        }
    }
    Some(token)
}

/// Parses a comma list like `lower,prefix=api_,suffix=.php,replace=a:b`.
pub fn parse_transforms(value: &str) -> Result<Vec<Transform>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let mut out: Vec<Transform> = Vec::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let (key, val) = match item.split_once('=') {
            Some((k, v)) => (k.trim().to_ascii_lowercase(), Some(v)),
            None => (item.to_ascii_lowercase(), None),
        };
        let transform = match key.as_str() {
            "lower" => Transform::Lower,
            "upper" => Transform::Upper,
            "reverse" | "rev" => Transform::Reverse,
            "prefix" => {
                let v = val.ok_or_else(|| "prefix requires prefix=<STR>".to_string())?;
                Transform::Prefix(v.to_string())
            }
            "suffix" => {
                let v = val.ok_or_else(|| "suffix requires suffix=<STR>".to_string())?;
                Transform::Suffix(v.to_string())
            }
            "replace" => {
                let v = val.ok_or_else(|| "replace requires replace=<FROM:TO>".to_string())?;
                let (from, to) = v
                    .split_once(':')
                    .ok_or_else(|| "replace expects FROM:TO".to_string())?;
                if from.is_empty() {
                    return Err("replace FROM cannot be empty".to_string());
                }
                Transform::Replace(from.to_string(), to.to_string())
            }
            "skip" => {
                let v = val.ok_or_else(|| "skip requires skip=<STR>".to_string())?;
                Transform::Skip(v.to_string())
            }
            other => return Err(format!("unknown transformation '{other}'")),
        };
        out.push(transform);
    }
    Ok(out)
}
