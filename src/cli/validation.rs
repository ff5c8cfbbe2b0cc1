use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(url) = args.url.as_deref() {
        reqwest::Url::parse(url).map_err(|e| format!("invalid URL '{url}': {e}"))?;
    }
    if args.wordlist.is_some() && args.path.is_some() {
        return Err("use either --wordlist or --path, not both".to_string());
    }
    if let Some(thread) = args.thread {
        if thread == 0 {
            return Err("thread count must be at least 1".to_string());
        }
    }
    if let Some(rate) = args.rate {
        if rate == 0 {
            return Err("rate must be at least 1".to_string());
        }
    }
    if let (Some(offset), Some(limit)) = (args.offset, args.limit) {
        if limit != 0 && offset >= limit {
            return Err("offset must be below limit".to_string());
        }
    }
    if let Some(mode) = args.mode.as_deref() {
        if crate::request::Mode::parse(mode).is_none() {
            return Err(format!("invalid mode '{mode}', expected path or host"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn rejects_wordlist_and_path_together() {
        let args = CliArgs::parse_from([
            "pathspray",
            "-u",
            "http://example.com/",
            "-w",
            "words.txt",
            "-p",
            "admin",
        ]);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn rejects_inverted_window() {
        let args = CliArgs::parse_from([
            "pathspray",
            "-u",
            "http://example.com/",
            "--offset",
            "10",
            "--limit",
            "5",
        ]);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn accepts_minimal_invocation() {
        let args = CliArgs::parse_from(["pathspray", "-u", "http://example.com/", "-w", "w.txt"]);
        assert!(validate(&args).is_ok());
    }
}
