use colored::Colorize;
use serde::Serialize;

use crate::baseline::Baseline;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Clone, Debug, Serialize)]
pub struct OutputRecord {
    pub url: String,
    pub host: String,
    pub status: u16,
    pub body_len: usize,
    pub title: String,
    pub redirect_target: String,
    pub frameworks: Vec<String>,
    pub valid: bool,
    pub fuzzy: bool,
    pub reason: Option<String>,
    pub err_string: String,
}

pub fn record_from(bl: &Baseline) -> OutputRecord {
    OutputRecord {
        url: bl.url.clone(),
        host: bl.host.clone(),
        status: bl.status,
        body_len: bl.body_len,
        title: bl.title.clone(),
        redirect_target: bl.redirect_target.clone(),
        frameworks: bl.frameworks.iter().map(|f| f.name.clone()).collect(),
        valid: bl.is_valid,
        fuzzy: bl.is_fuzzy,
        reason: bl.reason.map(|r| r.to_string()),
        err_string: bl.err_string.clone(),
    }
}

/// One colored terminal line per classified response.
pub fn format_line(bl: &Baseline) -> String {
    let status = format!("[{}]", bl.status);
    let status = if bl.is_fuzzy {
        status.yellow()
    } else if bl.is_valid {
        status.green().bold()
    } else {
        status.dimmed()
    };

    let mut line = format!("{} {} [{}]", status, bl.url.bold(), bl.body_len);
    if !bl.title.is_empty() {
        line.push_str(&format!(" {}", bl.title.white()));
    }
    if !bl.redirect_target.is_empty() {
        line.push_str(&format!(" -> {}", bl.redirect_target.blue()));
    }
    if !bl.frameworks.is_empty() {
        let names: Vec<&str> = bl.frameworks.iter().map(|f| f.name.as_str()).collect();
        line.push_str(&format!(" [{}]", names.join(",").cyan()));
    }
    if let Some(reason) = bl.reason {
        line.push_str(&format!(" ({})", reason.to_string().dimmed()));
    }
    line
}

pub fn render_text(records: &[OutputRecord]) -> Vec<u8> {
    let mut out = String::new();
    for r in records {
        out.push_str(&format!("{} {} [{}]", r.status, r.url, r.body_len));
        if let Some(reason) = r.reason.as_deref() {
            out.push_str(&format!(" ({reason})"));
        }
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(records: &[OutputRecord]) -> Vec<u8> {
    serde_json::to_vec_pretty(records).unwrap_or_else(|_| b"[]\n".to_vec())
}
