pub mod simhash;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::fingerprint::{self, Framework, ResponseView};
use crate::scanner::types::Reason;
use crate::utils::truncate_chars;

static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<title>\s*(.*?)\s*</title>").expect("title regex"));

/// Strict comparison tolerates this much body-length drift before two
/// same-status responses stop counting as "near".
const BODY_LEN_TOLERANCE: usize = 16;

/// Body bytes read per response. Anything longer is truncated and still
/// treated as a successful fetch.
pub const MAX_BODY_READ: usize = 1 << 20;

/// How much of the body is retained for fingerprinting and fuzzy hashing.
const BODY_SAMPLE_CHARS: usize = 32768;

/// Immutable snapshot of one response, used both as a learned reference and
/// as the classification subject. `status == 0` marks a failed request.
#[derive(Clone, Debug)]
pub struct Baseline {
    pub url: String,
    pub host: String,
    pub status: u16,
    pub body_len: usize,
    pub body_hash: String,
    pub fuzzy_hash: u64,
    pub title: String,
    pub content_type: String,
    pub server: String,
    pub set_cookie: String,
    pub redirect_target: String,
    pub frameworks: Vec<Framework>,
    pub err_string: String,
    pub is_valid: bool,
    pub is_fuzzy: bool,
    pub reason: Option<Reason>,
    body_sample: String,
    collected: bool,
}

/// The classification header subset, already stringified. Keeps the
/// constructors independent of any HTTP client type.
#[derive(Clone, Debug, Default)]
pub struct HeaderSubset {
    pub content_type: String,
    pub server: String,
    pub location: String,
    pub set_cookie: String,
}

impl HeaderSubset {
    pub fn from_reqwest(headers: &reqwest::header::HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            content_type: get("content-type"),
            server: get("server"),
            location: get("location"),
            set_cookie: get("set-cookie"),
        }
    }
}

impl Baseline {
    /// Builds a baseline from already-read response parts. `declared_len`
    /// is the Content-Length header when present; the actual body length
    /// wins when they disagree (truncated reads report what arrived).
    pub fn from_content(
        url: impl Into<String>,
        host: impl Into<String>,
        status: u16,
        headers: HeaderSubset,
        body: &[u8],
        declared_len: Option<usize>,
    ) -> Self {
        let body_len = match declared_len {
            Some(len) if body.len() < MAX_BODY_READ => len.max(body.len()),
            _ => body.len(),
        };
        let body_sample = truncate_chars(&String::from_utf8_lossy(body), BODY_SAMPLE_CHARS);
        let title = TITLE_REGEX
            .captures(&body_sample)
            .map(|cap| cap[1].to_string())
            .unwrap_or_default();
        Self {
            url: url.into(),
            host: host.into(),
            status,
            body_len,
            body_hash: sha256_hex(body),
            fuzzy_hash: simhash::simhash64(&body_sample),
            title,
            content_type: headers.content_type,
            server: headers.server,
            redirect_target: headers.location,
            set_cookie: headers.set_cookie,
            frameworks: Vec::new(),
            err_string: String::new(),
            is_valid: true,
            is_fuzzy: false,
            reason: None,
            body_sample,
            collected: false,
        }
    }

    /// Reads the body (bounded) and builds a full baseline. A mid-body read
    /// error counts as a truncated success, not a failed request.
    pub async fn from_response(
        url: impl Into<String>,
        host: impl Into<String>,
        mut resp: reqwest::Response,
    ) -> Self {
        let status = resp.status().as_u16();
        let headers = HeaderSubset::from_reqwest(resp.headers());
        let declared_len = resp.content_length().map(|l| l as usize);
        let mut body: Vec<u8> = Vec::new();
        while let Ok(Some(chunk)) = resp.chunk().await {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_BODY_READ {
                body.truncate(MAX_BODY_READ);
                break;
            }
        }
        Self::from_content(url, host, status, headers, &body, declared_len)
    }

    /// Cheap rejection record: status and headers only, no body work.
    pub fn invalid(
        url: impl Into<String>,
        host: impl Into<String>,
        status: u16,
        headers: HeaderSubset,
        reason: Reason,
    ) -> Self {
        Self {
            status,
            content_type: headers.content_type,
            server: headers.server,
            redirect_target: headers.location,
            set_cookie: headers.set_cookie,
            is_valid: false,
            reason: Some(reason),
            ..Self::named(url, host)
        }
    }

    /// Synthetic record for a transport failure.
    pub fn failed(
        url: impl Into<String>,
        host: impl Into<String>,
        err_string: impl Into<String>,
    ) -> Self {
        Self {
            err_string: err_string.into(),
            is_valid: false,
            reason: Some(Reason::RequestFailed),
            ..Self::named(url, host)
        }
    }

    /// The all-zero baseline bound to absent `bl<status>` expression keys.
    pub fn empty() -> Self {
        Self::named("", "")
    }

    fn named(url: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            host: host.into(),
            status: 0,
            body_len: 0,
            body_hash: String::new(),
            fuzzy_hash: 0,
            title: String::new(),
            content_type: String::new(),
            server: String::new(),
            set_cookie: String::new(),
            redirect_target: String::new(),
            frameworks: Vec::new(),
            err_string: String::new(),
            is_valid: true,
            is_fuzzy: false,
            reason: None,
            body_sample: String::new(),
            collected: false,
        }
    }

    pub fn body_sample(&self) -> &str {
        &self.body_sample
    }

    /// Populates `frameworks` from the passive signature engine. Safe to
    /// call more than once; only the first call does work.
    pub fn collect(&mut self) {
        if self.collected {
            return;
        }
        self.frameworks = fingerprint::detect(&ResponseView {
            status: self.status,
            server: &self.server,
            set_cookie: &self.set_cookie,
            body: &self.body_sample,
        });
        self.collected = true;
    }

    pub fn has_waf_framework(&self) -> bool {
        self.frameworks
            .iter()
            .any(|f| f.tag == fingerprint::WAF_CDN_TAG)
    }

    /// Strict comparison ordinal against another baseline:
    /// `1` same page, `0` near (worth a fuzzy pass), `-1` clearly different.
    pub fn compare(&self, other: &Baseline) -> i8 {
        // redirects to different places are different pages even when the
        // (usually empty) bodies hash identically
        if (!self.redirect_target.is_empty() || !other.redirect_target.is_empty())
            && self.redirect_target != other.redirect_target
        {
            return -1;
        }
        if self.body_hash == other.body_hash {
            return 1;
        }
        if self.status != other.status {
            return -1;
        }
        let drift = self.body_len.abs_diff(other.body_len);
        if drift <= BODY_LEN_TOLERANCE
            || (!self.content_type.is_empty() && self.content_type == other.content_type)
        {
            0
        } else {
            -1
        }
    }

    /// Near-duplicate check over the locality-sensitive body hashes.
    pub fn fuzzy_compare(&self, other: &Baseline) -> bool {
        simhash::hamming(self.fuzzy_hash, other.fuzzy_hash) <= simhash::HAMMING_THRESHOLD
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.err_string.is_empty() {
            return write!(f, "{} request failed: {}", self.url, self.err_string);
        }
        write!(f, "[{}] {} [{}]", self.status, self.url, self.body_len)?;
        if !self.title.is_empty() {
            write!(f, " {}", self.title)?;
        }
        if !self.redirect_target.is_empty() {
            write!(f, " -> {}", self.redirect_target)?;
        }
        if !self.frameworks.is_empty() {
            let names: Vec<&str> = self.frameworks.iter().map(|fw| fw.name.as_str()).collect();
            write!(f, " [{}]", names.join(","))?;
        }
        Ok(())
    }
}

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
