pub mod classify;
pub mod health;
pub mod registry;
pub mod types;

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use governor::{Quota, RateLimiter};
use indicatif::ProgressBar;
use once_cell::sync::OnceCell;
use reqwest::{redirect, Proxy};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use crate::baseline::{Baseline, HeaderSubset};
use crate::expr::Predicate;
use crate::request::{Mode, RequestShape};
use crate::words::transform::{self, Transform};
use crate::words::WordSource;

use health::HealthMonitor;
use registry::Registry;
use types::{Source, Unit};

/// Scan parameters, immutable once the pool is built.
pub struct ScanConfig {
    pub base_url: String,
    pub mode: Mode,
    pub thread: usize,
    pub timeout: u64,
    pub proxy: String,
    pub rate: u32,
    pub check_period: usize,
    pub err_period: usize,
    pub break_threshold: usize,
    pub white_status: HashSet<u16>,
    pub black_status: HashSet<u16>,
    pub waf_status: HashSet<u16>,
    pub fuzzy_status: Vec<u16>,
    pub match_expr: Option<Predicate>,
    pub filter_expr: Option<Predicate>,
    pub transforms: Vec<Transform>,
}

impl ScanConfig {
    pub fn new(base_url: impl Into<String>, mode: Mode) -> Self {
        Self {
            base_url: base_url.into(),
            mode,
            thread: 50,
            timeout: 10,
            proxy: String::new(),
            rate: 4000,
            check_period: 100,
            err_period: 10,
            break_threshold: 20,
            white_status: HashSet::from([200]),
            black_status: HashSet::from([400, 410]),
            waf_status: HashSet::from([418, 429, 493]),
            fuzzy_status: vec![403, 404, 500],
            match_expr: None,
            filter_expr: None,
            transforms: Vec::new(),
        }
    }
}

/// Shared scan-scope state: learned baselines, health counters, the
/// redirect dedup policy captured at init, and the cancellation flag.
pub(crate) struct ScanState {
    pub config: ScanConfig,
    pub registry: Registry,
    pub health: HealthMonitor,
    pub redirect_target: OnceCell<String>,
    cancel_tx: watch::Sender<bool>,
}

impl ScanState {
    pub(crate) fn new(config: ScanConfig) -> Self {
        let registry = Registry::new(config.fuzzy_status.clone());
        let health = HealthMonitor::new(
            config.check_period,
            config.err_period,
            config.break_threshold,
        );
        let (cancel_tx, _) = watch::channel(false);
        Self {
            config,
            registry,
            health,
            redirect_target: OnceCell::new(),
            cancel_tx,
        }
    }

    /// Flips the scan into cancelled state. Returns true only for the call
    /// that actually performed the transition.
    pub fn cancel(&self) -> bool {
        self.cancel_tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }
}

/// Cancellation handle usable from outside the pool (Ctrl+C handler).
#[derive(Clone)]
pub struct ScanHandle {
    state: Arc<ScanState>,
}

impl ScanHandle {
    pub fn cancel(&self) {
        self.state.cancel();
    }
}

/// The classified result streams exposed to downstream consumers.
pub struct ScanStreams {
    pub output: mpsc::Receiver<Baseline>,
    pub fuzzy: mpsc::Receiver<Baseline>,
}

pub struct ScanOutcome {
    /// True when the scan stopped early (health break or external cancel).
    pub aborted: bool,
    /// Request index to resume from via `--offset`.
    pub breakpoint: usize,
    /// Word tasks actually dispatched.
    pub dispatched: usize,
}

/// Everything a spawned task needs, cheap to clone. The `tracker` sender is
/// the completion latch: when every clone is dropped the driver knows all
/// in-flight tasks, health probes included, have finished.
#[derive(Clone)]
struct WorkerCtx {
    state: Arc<ScanState>,
    client: reqwest::Client,
    shape: Arc<RequestShape>,
    semaphore: Arc<Semaphore>,
    temp_tx: mpsc::Sender<Baseline>,
    pb: ProgressBar,
    tracker: mpsc::Sender<()>,
}

/// Bounded-concurrency scan engine: `thread` worker slots, a single
/// classifier consumer, and a background health monitor sharing the slots.
pub struct Pool {
    state: Arc<ScanState>,
    client: reqwest::Client,
    shape: Arc<RequestShape>,
    semaphore: Arc<Semaphore>,
    temp_tx: mpsc::Sender<Baseline>,
    classifier: JoinHandle<()>,
    pb: ProgressBar,
}

impl Pool {
    pub fn new(config: ScanConfig, pb: ProgressBar) -> Result<(Self, ScanStreams), String> {
        let shape = Arc::new(RequestShape::new(&config.base_url, config.mode)?);
        let client = build_client(config.timeout, &config.proxy)?;
        let thread = config.thread.max(1);

        let (temp_tx, temp_rx) = mpsc::channel::<Baseline>(thread);
        let (output_tx, output_rx) = mpsc::channel::<Baseline>(thread * 2);
        let (fuzzy_tx, fuzzy_rx) = mpsc::channel::<Baseline>(thread);

        let state = Arc::new(ScanState::new(config));
        let classifier = tokio::spawn(classify::run_classifier(
            temp_rx,
            Arc::clone(&state),
            output_tx,
            fuzzy_tx,
        ));

        Ok((
            Self {
                state,
                client,
                shape,
                semaphore: Arc::new(Semaphore::new(thread)),
                temp_tx,
                classifier,
                pb,
            },
            ScanStreams {
                output: output_rx,
                fuzzy: fuzzy_rx,
            },
        ))
    }

    pub fn handle(&self) -> ScanHandle {
        ScanHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Learns the random and index baselines. Both land in the registry
    /// before this returns, so no word task ever races the references.
    /// A transport failure on either probe is fatal.
    pub async fn init(&self) -> Result<(), String> {
        let random_unit = Unit::new(self.shape.probe_token(), Source::InitRandom);
        let index_unit = Unit::new(index_token(&self.shape), Source::InitIndex);

        let (mut base, mut index) = tokio::join!(
            fetch_unit(&self.client, &self.shape, &self.state, &random_unit),
            fetch_unit(&self.client, &self.shape, &self.state, &index_unit),
        );

        if !base.err_string.is_empty() {
            return Err(format!("random baseline probe failed: {}", base.err_string));
        }
        if !index.err_string.is_empty() {
            return Err(format!("index baseline probe failed: {}", index.err_string));
        }

        base.collect();
        index.collect();
        self.pb
            .println(format!("{} {}", "[baseline.random]".cyan().bold(), base));
        self.pb
            .println(format!("{} {}", "[baseline.index]".cyan().bold(), index));

        if !base.redirect_target.is_empty() {
            let _ = self.state.redirect_target.set(base.redirect_target.clone());
        }

        let base = Arc::new(base);
        self.state.registry.init_base(Arc::clone(&base));
        self.state.registry.try_add_per_status(&base);
        self.state.registry.init_index(Arc::new(index));
        Ok(())
    }

    /// Drives the word source through the pool within `[offset, limit]`
    /// (1-based, `limit == 0` meaning unbounded), then drains everything:
    /// workers, health probes, and finally the classifier.
    pub async fn run(self, mut words: WordSource, offset: usize, limit: usize) -> ScanOutcome {
        let Pool {
            state,
            client,
            shape,
            semaphore,
            temp_tx,
            classifier,
            pb,
        } = self;

        let limiter = RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(state.config.rate.max(1)).unwrap(),
        ));
        let (tracker_tx, mut tracker_rx) = mpsc::channel::<()>(1);
        let ctx = WorkerCtx {
            state: Arc::clone(&state),
            client,
            shape,
            semaphore: Arc::clone(&semaphore),
            temp_tx: temp_tx.clone(),
            pb: pb.clone(),
            tracker: tracker_tx.clone(),
        };

        let mut cancel_rx = state.subscribe();
        let mut index: usize = 0;
        let mut dispatched: usize = 0;

        loop {
            let token = tokio::select! {
                token = words.next() => match token {
                    Some(token) => token,
                    None => break,
                },
                _ = cancel_rx.wait_for(|c| *c) => break,
            };

            index += 1;
            match window_decision(index, offset, limit) {
                Window::Skip => continue,
                Window::Stop => break,
                Window::Submit => {}
            }

            let Some(token) = transform::apply_all(&state.config.transforms, token) else {
                continue;
            };

            limiter.until_ready().await;
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancel_rx.wait_for(|c| *c) => break,
            };

            dispatched += 1;
            let ctx = ctx.clone();
            let unit = Unit::new(token, Source::Word);
            tokio::spawn(async move {
                let _permit = permit;
                run_word_unit(ctx, unit).await;
            });

            if limit != 0 && index >= limit {
                break;
            }
        }

        // every spawned task holds a tracker clone; recv yields None once
        // the last one is gone
        drop(ctx);
        drop(tracker_tx);
        let _ = tracker_rx.recv().await;

        drop(temp_tx);
        let _ = classifier.await;

        ScanOutcome {
            aborted: state.is_cancelled(),
            breakpoint: state.health.request_index(),
            dispatched,
        }
    }
}

pub(crate) enum Window {
    Skip,
    Submit,
    Stop,
}

pub(crate) fn window_decision(index: usize, offset: usize, limit: usize) -> Window {
    if limit != 0 && index > limit {
        Window::Stop
    } else if index <= offset {
        Window::Skip
    } else {
        Window::Submit
    }
}

fn index_token(shape: &RequestShape) -> String {
    match shape.mode() {
        Mode::Path => "/".to_string(),
        // the apex itself is the natural "index" in host mode
        Mode::Host => shape.apex().to_string(),
    }
}

fn build_client(timeout: u64, proxy: &str) -> Result<reqwest::Client, String> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0",
        ),
    );
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_secs(timeout))
        .danger_accept_invalid_hostnames(true)
        .danger_accept_invalid_certs(true);
    if !proxy.is_empty() {
        let proxy = Proxy::all(proxy).map_err(|e| format!("could not setup proxy: {e}"))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| format!("failed to build http client: {e}"))
}

async fn fetch_unit(
    client: &reqwest::Client,
    shape: &RequestShape,
    state: &ScanState,
    unit: &Unit,
) -> Baseline {
    let url = shape.target_url(&unit.token);
    let host = shape.target_host(&unit.token);

    let req = match shape.build(client, &unit.token) {
        Ok(req) => req,
        Err(e) => return Baseline::failed(url, host, e),
    };

    match client.execute(req).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let headers = HeaderSubset::from_reqwest(resp.headers());
            if unit.source == Source::Word && state.config.match_expr.is_none() {
                if let Err(reason) = classify::pre_compare(state, status, &headers.location) {
                    return Baseline::invalid(url, host, status, headers, reason);
                }
            }
            Baseline::from_response(url, host, resp).await
        }
        Err(e) => {
            state.health.on_request_failed();
            Baseline::failed(url, host, e.to_string())
        }
    }
}

async fn run_word_unit(ctx: WorkerCtx, unit: Unit) {
    let bl = fetch_unit(&ctx.client, &ctx.shape, &ctx.state, &unit).await;
    if ctx.temp_tx.send(bl).await.is_err() {
        return;
    }
    ctx.pb.inc(1);
    if ctx.state.health.after_word() {
        spawn_check(ctx.clone());
    }
}

fn spawn_check(ctx: WorkerCtx) {
    tokio::spawn(async move {
        if ctx.state.is_cancelled() {
            return;
        }
        let Ok(_permit) = ctx.semaphore.clone().acquire_owned().await else {
            return;
        };
        let unit = Unit::new(ctx.shape.probe_token(), Source::Check);
        let bl = fetch_unit(&ctx.client, &ctx.shape, &ctx.state, &unit).await;
        evaluate_probe(&ctx.state, bl, &ctx.pb);
        if ctx.state.health.should_break() && ctx.state.cancel() {
            recover(&ctx.state, &ctx.pb);
        }
    });
}

/// Judges a finished health probe against the learned soft-404. A probe
/// that matches it means the target still behaves normally; anything else
/// counts toward the break threshold.
pub(crate) fn evaluate_probe(state: &ScanState, bl: Baseline, pb: &ProgressBar) {
    let Some(base) = state.registry.base() else {
        return;
    };
    if !bl.err_string.is_empty() {
        // transport failure already bumped the counter in fetch_unit
        pb.println(format!(
            "{} probe failed ({}/{}): {}",
            "[check.error]".yellow().bold(),
            state.health.failure_count(),
            state.health.break_threshold(),
            bl.err_string,
        ));
        state.registry.push_failed(bl);
    } else if base.compare(&bl) < 1 {
        let drift = health::drift_summary(base, &bl);
        pb.println(format!(
            "{} maybe trigger risk control: {}",
            "[check.failed]".yellow().bold(),
            drift,
        ));
        state.health.on_probe_suspicious();
        state.registry.push_failed(bl);
    } else {
        state.health.on_probe_passed();
        state.registry.clear_failed();
    }
}

fn recover(state: &ScanState, pb: &ProgressBar) {
    pb.println(format!(
        "{} failed probes exceed the break threshold, stopping. Breakpoint {}",
        "[abort]".red().bold(),
        state.health.request_index(),
    ));
    for (i, summary) in state.registry.failed_summaries().iter().enumerate() {
        pb.println(format!("{} {}", format!("[failed.{i}]").red(), summary));
    }
}
