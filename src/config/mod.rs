use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    pub path: Option<String>,
    #[serde(alias = "mod")]
    pub mode: Option<String>,
    pub thread: Option<usize>,
    pub rate: Option<u32>,
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub fns: Option<String>,
    #[serde(alias = "match")]
    pub match_expr: Option<String>,
    #[serde(alias = "filter")]
    pub filter_expr: Option<String>,
    pub white_status: Option<String>,
    pub black_status: Option<String>,
    pub waf_status: Option<String>,
    pub fuzzy_status: Option<String>,
    pub check_period: Option<usize>,
    pub err_period: Option<usize>,
    pub break_threshold: Option<usize>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub fuzzy: Option<bool>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".pathspray").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# Pathspray config
#
# Location (default):
#   ~/.pathspray/config.yml

# Target
# url: https://example.com
# wordlist: ./wordlists/common.txt
# Alternatively, spray a single token:
# path: admin

# Scan
mode: path
thread: 50
rate: 4000
timeout: 10
# offset: 0
# limit: 0
# fns: "lower,suffix=.php"

# Classification status sets
white_status: "200"
black_status: "400,410"
waf_status: "418,429,493"
fuzzy_status: "403,404,500"

# Health monitoring
check_period: 100
err_period: 10
break_threshold: 20

# Expressions
# match: "current.status == 200 && current.body_len > 0"
# filter: "current.title contains 'error'"

# Output
# output: ./results.json
# output_format: json
fuzzy: false
no_color: false

# HTTP
# proxy: http://127.0.0.1:8080
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_yaml_parses() {
        let cfg: ConfigFile = serde_yaml::from_str(&default_config_yaml()).unwrap();
        assert_eq!(cfg.mode.as_deref(), Some("path"));
        assert_eq!(cfg.thread, Some(50));
        assert_eq!(cfg.fuzzy_status.as_deref(), Some("403,404,500"));
    }

    #[test]
    fn aliases_are_accepted() {
        let cfg: ConfigFile =
            serde_yaml::from_str("mod: host\nmatch: \"current.status == 200\"\n").unwrap();
        assert_eq!(cfg.mode.as_deref(), Some("host"));
        assert!(cfg.match_expr.is_some());
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
