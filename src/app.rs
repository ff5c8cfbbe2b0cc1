use std::time::Duration;

use clap::Parser;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tokio::task;
use tokio::time::Instant;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::expr;
use crate::output::{self, OutputRecord};
use crate::request::Mode;
use crate::scanner::{Pool, ScanConfig};
use crate::utils;
use crate::words::{transform, WordSource};

fn print_banner() {
    const BANNER: &str = r#"
                 __  __
    ____  ____ _/ /_/ /_  _________  _________ ___  __
   / __ \/ __ `/ __/ __ \/ ___/ __ \/ ___/ __ `/ / / /
  / /_/ / /_/ / /_/ / / (__  ) /_/ / /  / /_/ / /_/ /
 / .___/\__,_/\__/_/ /_/____/ .___/_/   \__,_/\__, /
/_/                        /_/               /____/
       v0.3.1 - baseline-aware content discovery
    "#;
    println!("{}", BANNER);
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

#[derive(Clone, Debug)]
struct RunOptions {
    wordlist: Option<String>,
    single_token: Option<String>,
    offset: usize,
    limit: usize,
    output: Option<String>,
    output_format: Option<String>,
    show_fuzzy: bool,
    verbose: u8,
    no_color: bool,
}

fn build_scan_config(args: CliArgs, cfg: ConfigFile) -> Result<(ScanConfig, RunOptions), String> {
    validation::validate(&args)?;

    let url = args
        .url
        .or(cfg.url)
        .ok_or_else(|| "target URL is required (--url)".to_string())?;

    let mode_raw = args.mode.or(cfg.mode).unwrap_or_else(|| "path".to_string());
    let mode = Mode::parse(&mode_raw)
        .ok_or_else(|| format!("invalid mode '{mode_raw}', expected path or host"))?;

    let mut scan = ScanConfig::new(url, mode);
    if let Some(thread) = args.thread.or(cfg.thread) {
        scan.thread = thread.max(1);
    }
    if let Some(rate) = args.rate.or(cfg.rate) {
        scan.rate = rate;
    }
    if let Some(timeout) = args.timeout.or(cfg.timeout) {
        scan.timeout = timeout;
    }
    scan.proxy = args.proxy.or(cfg.proxy).unwrap_or_default();
    if let Some(period) = args.check_period.or(cfg.check_period) {
        scan.check_period = period.max(1);
    }
    if let Some(period) = args.err_period.or(cfg.err_period) {
        scan.err_period = period.max(1);
    }
    if let Some(threshold) = args.break_threshold.or(cfg.break_threshold) {
        scan.break_threshold = threshold.max(1);
    }

    if let Some(raw) = args.white_status.or(cfg.white_status) {
        scan.white_status =
            utils::parse_status_set(&raw).map_err(|e| format!("invalid --white-status: {e}"))?;
    }
    if let Some(raw) = args.black_status.or(cfg.black_status) {
        scan.black_status =
            utils::parse_status_set(&raw).map_err(|e| format!("invalid --black-status: {e}"))?;
    }
    if let Some(raw) = args.waf_status.or(cfg.waf_status) {
        scan.waf_status =
            utils::parse_status_set(&raw).map_err(|e| format!("invalid --waf-status: {e}"))?;
    }
    if let Some(raw) = args.fuzzy_status.or(cfg.fuzzy_status) {
        scan.fuzzy_status =
            utils::parse_status_list(&raw).map_err(|e| format!("invalid --fuzzy-status: {e}"))?;
    }

    if let Some(raw) = args.match_expr.or(cfg.match_expr) {
        scan.match_expr =
            Some(expr::compile(&raw).map_err(|e| format!("invalid --match expression: {e}"))?);
    }
    if let Some(raw) = args.filter_expr.or(cfg.filter_expr) {
        scan.filter_expr =
            Some(expr::compile(&raw).map_err(|e| format!("invalid --filter expression: {e}"))?);
    }
    if let Some(raw) = args.fns.or(cfg.fns) {
        scan.transforms =
            transform::parse_transforms(&raw).map_err(|e| format!("invalid --fns: {e}"))?;
    }

    let wordlist = args
        .wordlist
        .or(cfg.wordlist)
        .map(|p| config::expand_tilde_string(&p));
    let single_token = args.path.or(cfg.path);
    if wordlist.is_none() && single_token.is_none() {
        return Err("a word source is required (--wordlist or --path)".to_string());
    }

    let opts = RunOptions {
        wordlist,
        single_token,
        offset: args.offset.or(cfg.offset).unwrap_or(0),
        limit: args.limit.or(cfg.limit).unwrap_or(0),
        output: args
            .output
            .or(cfg.output)
            .map(|p| config::expand_tilde_string(&p)),
        output_format: args.output_format.or(cfg.output_format),
        show_fuzzy: args.fuzzy || cfg.fuzzy.unwrap_or(false),
        verbose: args.verbose,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
    };

    Ok((scan, opts))
}

async fn run_async(scan: ScanConfig, opts: RunOptions) -> Result<(), String> {
    if opts.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    format_kv_line("Target", &scan.base_url);
    format_kv_line(
        "Scan",
        &format!(
            "mode={:?} threads={} rate={} offset={} limit={}",
            scan.mode, scan.thread, scan.rate, opts.offset, opts.limit
        ),
    );
    format_kv_line(
        "Health",
        &format!(
            "check-period={} err-period={} break-threshold={}",
            scan.check_period, scan.err_period, scan.break_threshold
        ),
    );
    println!();

    let words = match (&opts.wordlist, &opts.single_token) {
        (Some(path), _) => WordSource::from_file(path).await?,
        (None, Some(token)) => WordSource::from_vec(vec![token.clone()]),
        (None, None) => return Err("no word source".to_string()),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );

    let now = Instant::now();
    let (pool, streams) = Pool::new(scan, pb.clone())?;

    let handle = pool.handle();
    let ctrlc_pb = pb.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            ctrlc_pb.println("received Ctrl+C, draining in-flight requests...");
            handle.cancel();
        }
    });

    pool.init().await?;

    let consumers = FuturesUnordered::new();
    {
        let pb = pb.clone();
        let verbose = opts.verbose;
        let mut rx = streams.output;
        consumers.push(task::spawn(async move {
            let mut records: Vec<OutputRecord> = Vec::new();
            while let Some(bl) = rx.recv().await {
                if bl.is_valid || verbose > 0 {
                    pb.println(output::format_line(&bl));
                    records.push(output::record_from(&bl));
                }
            }
            records
        }));
    }
    {
        let pb = pb.clone();
        let show_fuzzy = opts.show_fuzzy;
        let mut rx = streams.fuzzy;
        consumers.push(task::spawn(async move {
            let mut records: Vec<OutputRecord> = Vec::new();
            while let Some(bl) = rx.recv().await {
                if show_fuzzy {
                    pb.println(output::format_line(&bl));
                    records.push(output::record_from(&bl));
                }
            }
            records
        }));
    }

    let outcome = pool.run(words, opts.offset, opts.limit).await;

    let mut records: Vec<OutputRecord> = Vec::new();
    let mut consumers = consumers;
    while let Some(batch) = consumers.next().await {
        records.extend(batch.unwrap_or_default());
    }
    pb.finish_and_clear();

    if let Some(outfile_path) = opts.output.as_ref() {
        let format = opts
            .output_format
            .as_deref()
            .and_then(output::OutputFormat::parse)
            .or_else(|| output::infer_format_from_path(outfile_path))
            .unwrap_or(output::OutputFormat::Text);
        let rendered = match format {
            output::OutputFormat::Text => output::render_text(&records),
            output::OutputFormat::Json => output::render_json(&records),
        };
        let mut outfile = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(outfile_path)
            .await
            .map_err(|e| format!("failed to open output file: {e}"))?;
        outfile
            .write_all(&rendered)
            .await
            .map_err(|_| "failed to write output file".to_string())?;
    }

    println!();
    if outcome.aborted {
        println!(
            ":: Aborted :: breakpoint at request {} :: resume with --offset {} ::",
            outcome.breakpoint, outcome.breakpoint
        );
    }
    println!(
        ":: Completed :: {} words dispatched in {}s ::",
        outcome.dispatched,
        now.elapsed().as_secs()
    );

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = CliArgs::parse();

    let cfg = match args.config.as_ref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => {
                let _ = config::ensure_default_config_file(&path);
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let (scan, opts) = build_scan_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;
    rt.block_on(run_async(scan, opts))
}
