use rand::distributions::Alphanumeric;
use rand::Rng;

/// What a token means: a path under the base URL, or a virtual-host label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Path,
    Host,
}

impl Mode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "path" => Some(Self::Path),
            "host" | "vhost" => Some(Self::Host),
            _ => None,
        }
    }
}

/// Pure request construction for both spray modes. Holds the normalized
/// base URL and apex host; never performs I/O itself.
#[derive(Clone, Debug)]
pub struct RequestShape {
    mode: Mode,
    base_url: String,
    apex: String,
}

impl RequestShape {
    pub fn new(base_url: &str, mode: Mode) -> Result<Self, String> {
        let parsed =
            reqwest::Url::parse(base_url).map_err(|e| format!("invalid URL '{base_url}': {e}"))?;
        let apex = parsed
            .host_str()
            .ok_or_else(|| format!("URL '{base_url}' has no host"))?
            .to_string();
        let mut base_url = base_url.to_string();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            mode,
            base_url,
            apex,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn apex(&self) -> &str {
        &self.apex
    }

    /// The URL a given token resolves to. In host mode every request hits
    /// the base URL; the token only changes the Host header.
    pub fn target_url(&self, token: &str) -> String {
        match self.mode {
            Mode::Path => {
                if token.starts_with('/') {
                    format!("{}{}", self.base_url, token)
                } else {
                    format!("{}/{}", self.base_url, token)
                }
            }
            Mode::Host => self.base_url.clone(),
        }
    }

    /// The effective Host for a token. Bare host-mode tokens are treated as
    /// labels under the apex; tokens containing a dot are taken verbatim.
    pub fn target_host(&self, token: &str) -> String {
        match self.mode {
            Mode::Path => self.apex.clone(),
            Mode::Host => {
                if token.contains('.') {
                    token.to_string()
                } else {
                    format!("{}.{}", token, self.apex)
                }
            }
        }
    }

    pub fn build(&self, client: &reqwest::Client, token: &str) -> Result<reqwest::Request, String> {
        let url = self.target_url(token);
        let mut builder = client.get(&url);
        if self.mode == Mode::Host {
            builder = builder.header(reqwest::header::HOST, self.target_host(token));
        }
        builder
            .build()
            .map_err(|e| format!("failed to build request for '{url}': {e}"))
    }

    /// A probe token fitting this shape's mode.
    pub fn probe_token(&self) -> String {
        match self.mode {
            Mode::Path => rand_path(),
            Mode::Host => rand_host(),
        }
    }
}

/// Random path that almost certainly does not exist on the target.
pub fn rand_path() -> String {
    format!("/{}", rand_token(12))
}

/// Random host label for virtual-host probing.
pub fn rand_host() -> String {
    rand_token(12).to_lowercase()
}

fn rand_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_mode_appends_token_to_base() {
        let shape = RequestShape::new("http://target.example/", Mode::Path).unwrap();
        assert_eq!(shape.target_url("/admin"), "http://target.example/admin");
        assert_eq!(shape.target_url("admin"), "http://target.example/admin");
        assert_eq!(shape.target_host("/admin"), "target.example");
    }

    #[test]
    fn host_mode_keeps_url_and_expands_label() {
        let shape = RequestShape::new("http://target.example", Mode::Host).unwrap();
        assert_eq!(shape.target_url("dev"), "http://target.example");
        assert_eq!(shape.target_host("dev"), "dev.target.example");
        assert_eq!(shape.target_host("dev.other.example"), "dev.other.example");
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(RequestShape::new("not a url", Mode::Path).is_err());
    }

    #[test]
    fn probe_tokens_have_entropy() {
        assert_ne!(rand_path(), rand_path());
        assert!(rand_path().starts_with('/'));
        assert_eq!(rand_host().len(), 12);
    }
}
