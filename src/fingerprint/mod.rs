//! Passive framework fingerprinting from a single response.
//!
//! Each signature is a set of weighted checks against the classification
//! header subset and a body sample. A signature matches once enough weight
//! accumulates; matches carry a tag so the classifier can recognise
//! WAF/CDN interception pages (`waf/cdn`) without knowing vendor names.

pub const WAF_CDN_TAG: &str = "waf/cdn";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Framework {
    pub name: String,
    pub tag: &'static str,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The response fields the signature engine looks at. Callers build this
/// from whatever representation they hold; the engine never touches I/O.
#[derive(Clone, Debug, Default)]
pub struct ResponseView<'a> {
    pub status: u16,
    pub server: &'a str,
    pub set_cookie: &'a str,
    pub body: &'a str,
}

#[derive(Clone, Copy, Debug)]
enum Check {
    ServerContains { needle: &'static str, weight: u8 },
    CookieContains { needle: &'static str, weight: u8 },
    BodyContains { needle: &'static str, weight: u8 },
    StatusIs { status: u16, weight: u8 },
}

struct Signature {
    name: &'static str,
    tag: &'static str,
    min_weight: u8,
    checks: &'static [Check],
}

static SIGNATURES: &[Signature] = &[
    Signature {
        name: "cloudflare",
        tag: WAF_CDN_TAG,
        min_weight: 4,
        checks: &[
            Check::ServerContains { needle: "cloudflare", weight: 5 },
            Check::CookieContains { needle: "cf_clearance=", weight: 5 },
            Check::CookieContains { needle: "__cfduid=", weight: 4 },
            Check::BodyContains { needle: "attention required! | cloudflare", weight: 5 },
            Check::StatusIs { status: 1020, weight: 3 },
        ],
    },
    Signature {
        name: "akamai",
        tag: WAF_CDN_TAG,
        min_weight: 4,
        checks: &[
            Check::ServerContains { needle: "akamai", weight: 5 },
            Check::ServerContains { needle: "ghost", weight: 4 },
            Check::BodyContains { needle: "reference&#32;&#35;", weight: 4 },
        ],
    },
    Signature {
        name: "cloudfront",
        tag: WAF_CDN_TAG,
        min_weight: 4,
        checks: &[
            Check::ServerContains { needle: "cloudfront", weight: 5 },
            Check::BodyContains { needle: "generated by cloudfront", weight: 4 },
            Check::BodyContains { needle: "the request could not be satisfied", weight: 4 },
        ],
    },
    Signature {
        name: "imperva",
        tag: WAF_CDN_TAG,
        min_weight: 4,
        checks: &[
            Check::CookieContains { needle: "incap_ses_", weight: 5 },
            Check::CookieContains { needle: "visid_incap_", weight: 5 },
            Check::BodyContains { needle: "incapsula incident", weight: 5 },
        ],
    },
    Signature {
        name: "sucuri",
        tag: WAF_CDN_TAG,
        min_weight: 4,
        checks: &[
            Check::ServerContains { needle: "sucuri", weight: 5 },
            Check::BodyContains { needle: "sucuri website firewall", weight: 5 },
        ],
    },
    Signature {
        name: "f5-bigip",
        tag: WAF_CDN_TAG,
        min_weight: 4,
        checks: &[
            Check::CookieContains { needle: "bigipserver", weight: 5 },
            Check::BodyContains { needle: "the requested url was rejected", weight: 5 },
        ],
    },
    Signature {
        name: "nginx",
        tag: "server",
        min_weight: 4,
        checks: &[Check::ServerContains { needle: "nginx", weight: 5 }],
    },
    Signature {
        name: "apache",
        tag: "server",
        min_weight: 4,
        checks: &[Check::ServerContains { needle: "apache", weight: 5 }],
    },
    Signature {
        name: "iis",
        tag: "server",
        min_weight: 4,
        checks: &[Check::ServerContains { needle: "microsoft-iis", weight: 5 }],
    },
    Signature {
        name: "php",
        tag: "app",
        min_weight: 4,
        checks: &[
            Check::CookieContains { needle: "phpsessid=", weight: 5 },
            Check::BodyContains { needle: "x-powered-by: php", weight: 3 },
        ],
    },
    Signature {
        name: "java",
        tag: "app",
        min_weight: 4,
        checks: &[Check::CookieContains { needle: "jsessionid=", weight: 5 }],
    },
    Signature {
        name: "asp.net",
        tag: "app",
        min_weight: 4,
        checks: &[
            Check::CookieContains { needle: "asp.net_sessionid=", weight: 5 },
            Check::CookieContains { needle: ".aspxauth=", weight: 5 },
        ],
    },
    Signature {
        name: "wordpress",
        tag: "app",
        min_weight: 4,
        checks: &[
            Check::BodyContains { needle: "wp-content/", weight: 4 },
            Check::BodyContains { needle: "wp-includes/", weight: 4 },
        ],
    },
];

fn check_hit(check: &Check, view: &LowerView) -> Option<u8> {
    match check {
        Check::ServerContains { needle, weight } => {
            (!view.server.is_empty() && view.server.contains(needle)).then_some(*weight)
        }
        Check::CookieContains { needle, weight } => {
            view.set_cookie.contains(needle).then_some(*weight)
        }
        Check::BodyContains { needle, weight } => view.body.contains(needle).then_some(*weight),
        Check::StatusIs { status, weight } => (view.status == *status).then_some(*weight),
    }
}

struct LowerView {
    status: u16,
    server: String,
    set_cookie: String,
    body: String,
}

/// Runs every signature against the response. Pure and idempotent: the same
/// view always yields the same framework list, so callers may invoke it
/// repeatedly.
pub fn detect(view: &ResponseView<'_>) -> Vec<Framework> {
    let lower = LowerView {
        status: view.status,
        server: view.server.to_lowercase(),
        set_cookie: view.set_cookie.to_lowercase(),
        body: view.body.to_lowercase(),
    };

    let mut out: Vec<Framework> = Vec::new();
    for sig in SIGNATURES {
        let weight: u32 = sig
            .checks
            .iter()
            .filter_map(|c| check_hit(c, &lower))
            .map(u32::from)
            .sum();
        if weight >= u32::from(sig.min_weight) {
            out.push(Framework {
                name: sig.name.to_string(),
                tag: sig.tag,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudflare_block_page_gets_waf_tag() {
        let view = ResponseView {
            status: 403,
            server: "cloudflare",
            set_cookie: "",
            body: "Attention Required! | Cloudflare",
        };
        let frameworks = detect(&view);
        assert!(frameworks
            .iter()
            .any(|f| f.name == "cloudflare" && f.tag == WAF_CDN_TAG));
    }

    #[test]
    fn nginx_server_header_is_not_a_waf() {
        let view = ResponseView {
            status: 200,
            server: "nginx/1.24.0",
            set_cookie: "",
            body: "<html>hello</html>",
        };
        let frameworks = detect(&view);
        assert!(frameworks.iter().any(|f| f.name == "nginx"));
        assert!(frameworks.iter().all(|f| f.tag != WAF_CDN_TAG));
    }

    #[test]
    fn weak_single_evidence_does_not_match() {
        // status 1020 alone is below cloudflare's weight floor
        let view = ResponseView {
            status: 1020,
            server: "",
            set_cookie: "",
            body: "",
        };
        assert!(detect(&view).is_empty());
    }

    #[test]
    fn detect_is_idempotent() {
        let view = ResponseView {
            status: 200,
            server: "Apache/2.4.57",
            set_cookie: "PHPSESSID=abc123;",
            body: "",
        };
        assert_eq!(detect(&view), detect(&view));
    }
}
