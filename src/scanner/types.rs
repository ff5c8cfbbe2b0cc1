use std::fmt;

/// Why a response was dispatched. Routing in the pool is keyed on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Random-token probe for the soft-404 baseline.
    InitRandom,
    /// Probe of `/` for the index baseline.
    InitIndex,
    /// Periodic health probe.
    Check,
    /// Candidate token from the word source.
    Word,
    /// Reserved for follow-redirect expansion; never dispatched today.
    #[allow(dead_code)]
    Redirect,
}

#[derive(Clone, Debug)]
pub struct Unit {
    pub token: String,
    pub source: Source,
}

impl Unit {
    pub fn new(token: impl Into<String>, source: Source) -> Self {
        Self {
            token: token.into(),
            source,
        }
    }
}

/// Classification verdicts surfaced on invalid baselines. The string forms
/// are stable: downstream consumers and the JSON output key on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    RequestFailed,
    BadStatus,
    SameStatus,
    Waf,
    Redirect,
    CompareFailed,
    FuzzyCompareFailed,
    CustomCompareFailed,
    CustomFilter,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::RequestFailed => "request failed",
            Reason::BadStatus => "bad status",
            Reason::SameStatus => "same status",
            Reason::Waf => "maybe banned by waf",
            Reason::Redirect => "duplicate redirect url",
            Reason::CompareFailed => "compare failed",
            Reason::FuzzyCompareFailed => "fuzzy compare failed",
            Reason::CustomCompareFailed => "custom compare failed",
            Reason::CustomFilter => "custom filtered",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
