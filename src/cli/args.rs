use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pathspray",
    version,
    about = "concurrent directory and virtual-host spraying engine",
    long_about = "Pathspray brute-forces paths or virtual hosts against a target, learns what\nits not-found pages look like, and only reports responses that genuinely\ndiffer from the learned baselines. Health probes detect rate limiters and\nsoft bans and stop the scan with a resumable breakpoint.\n\nExamples:\n  pathspray -u https://target.tld -w wordlist.txt\n  pathspray -u https://target.tld -w subs.txt -m host -t 100\n  pathspray -u https://target.tld -w wordlist.txt --match 'current.status == 200'"
)]
pub struct CliArgs {
    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Target base URL."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Wordlist file (one token per line)."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'p',
        long = "path",
        value_name = "TOKEN",
        help_heading = "Input",
        help = "Spray a single token instead of a wordlist."
    )]
    pub path: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.pathspray/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'm',
        long = "mod",
        visible_alias = "mode",
        value_name = "MODE",
        help_heading = "Scan",
        help = "Spray mode: path or host."
    )]
    pub mode: Option<String>,

    #[arg(
        short = 't',
        long = "thread",
        value_name = "N",
        help_heading = "Performance",
        help = "Worker concurrency."
    )]
    pub thread: Option<usize>,

    #[arg(
        short = 'r',
        long = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Request rate limit (requests per second)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "timeout",
        value_name = "SECS",
        help_heading = "Performance",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'x',
        long = "proxy",
        value_name = "URL",
        help_heading = "Performance",
        help = "Route requests through an HTTP proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "offset",
        value_name = "N",
        help_heading = "Scan",
        help = "Skip the first N wordlist entries (resume from a breakpoint)."
    )]
    pub offset: Option<usize>,

    #[arg(
        long = "limit",
        value_name = "N",
        help_heading = "Scan",
        help = "Stop after wordlist entry N (0 = unbounded)."
    )]
    pub limit: Option<usize>,

    #[arg(
        long = "fns",
        value_name = "LIST",
        help_heading = "Scan",
        help = "Token transformations applied in order (e.g. lower,suffix=.php)."
    )]
    pub fns: Option<String>,

    #[arg(
        long = "match",
        value_name = "EXPR",
        help_heading = "Filters",
        help = "Replace the default validity check (e.g. 'current.status == 200')."
    )]
    pub match_expr: Option<String>,

    #[arg(
        long = "filter",
        value_name = "EXPR",
        help_heading = "Filters",
        help = "Reject matched responses where this expression is true."
    )]
    pub filter_expr: Option<String>,

    #[arg(
        long = "white-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Always-keep status codes (comma-separated)."
    )]
    pub white_status: Option<String>,

    #[arg(
        long = "black-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Always-drop status codes (comma-separated)."
    )]
    pub black_status: Option<String>,

    #[arg(
        long = "waf-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Status codes treated as WAF interception (comma-separated)."
    )]
    pub waf_status: Option<String>,

    #[arg(
        long = "fuzzy-status",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Status codes that learn their own baselines (comma-separated)."
    )]
    pub fuzzy_status: Option<String>,

    #[arg(
        long = "check-period",
        value_name = "N",
        help_heading = "Health",
        help = "Issue a health probe every N requests."
    )]
    pub check_period: Option<usize>,

    #[arg(
        long = "err-period",
        value_name = "N",
        help_heading = "Health",
        help = "Issue a health probe every N failures."
    )]
    pub err_period: Option<usize>,

    #[arg(
        long = "break-threshold",
        value_name = "K",
        help_heading = "Health",
        help = "Abort after K consecutive suspicious probes."
    )]
    pub break_threshold: Option<usize>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write classified results to a file."
    )]
    pub output: Option<String>,

    #[arg(
        long = "output-format",
        value_name = "FMT",
        help_heading = "Output",
        help = "Output file format: text or json (inferred from extension otherwise)."
    )]
    pub output_format: Option<String>,

    #[arg(
        long = "fuzzy",
        help_heading = "Output",
        help = "Also print near-duplicate (fuzzy) results."
    )]
    pub fuzzy: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v prints rejected responses with reasons)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,
}
