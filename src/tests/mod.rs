//! Cross-module scenarios: the classifier pipeline, health evaluation and
//! stream routing, driven over the real channels without any HTTP.

use std::collections::HashSet;
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::mpsc;

use crate::baseline::{Baseline, HeaderSubset};
use crate::expr;
use crate::request::Mode;
use crate::scanner::classify::{self, run_classifier};
use crate::scanner::types::Reason;
use crate::scanner::{evaluate_probe, ScanConfig, ScanState};

fn page(url: &str, status: u16, content_type: &str, body: &str) -> Baseline {
    Baseline::from_content(
        format!("http://target.example{url}"),
        "target.example",
        status,
        HeaderSubset {
            content_type: content_type.to_string(),
            ..Default::default()
        },
        body.as_bytes(),
        None,
    )
}

fn redirect(url: &str, location: &str) -> Baseline {
    Baseline::from_content(
        format!("http://target.example{url}"),
        "target.example",
        302,
        HeaderSubset {
            location: location.to_string(),
            ..Default::default()
        },
        b"",
        None,
    )
}

fn state_with_base(base: Baseline) -> Arc<ScanState> {
    let state = Arc::new(ScanState::new(ScanConfig::new(
        "http://target.example",
        Mode::Path,
    )));
    state.registry.init_base(Arc::new(base));
    state
}

/// Pushes baselines through the classifier consumer and returns the drained
/// (output, fuzzy) streams.
async fn classify_all(state: Arc<ScanState>, inputs: Vec<Baseline>) -> (Vec<Baseline>, Vec<Baseline>) {
    let (temp_tx, temp_rx) = mpsc::channel(16);
    let (output_tx, mut output_rx) = mpsc::channel(16);
    let (fuzzy_tx, mut fuzzy_rx) = mpsc::channel(16);
    let consumer = tokio::spawn(run_classifier(temp_rx, state, output_tx, fuzzy_tx));

    for bl in inputs {
        temp_tx.send(bl).await.unwrap();
    }
    drop(temp_tx);
    consumer.await.unwrap();

    let mut output = Vec::new();
    while let Ok(bl) = output_rx.try_recv() {
        output.push(bl);
    }
    let mut fuzzy = Vec::new();
    while let Ok(bl) = fuzzy_rx.try_recv() {
        fuzzy.push(bl);
    }
    (output, fuzzy)
}

#[tokio::test]
async fn soft_404_suppression() {
    let soft404 = "<html><title>oops</title>this page was not found</html>";
    let state = state_with_base(page("/jfxkq2ma91zz", 200, "text/html", soft404));

    let (output, fuzzy) = classify_all(
        Arc::clone(&state),
        vec![page("/admin", 200, "text/html", soft404)],
    )
    .await;

    assert!(fuzzy.is_empty());
    assert_eq!(output.len(), 1);
    assert!(!output[0].is_valid);
    assert_eq!(output[0].reason, Some(Reason::CompareFailed));
}

#[tokio::test]
async fn genuine_hit_is_emitted_valid() {
    let state = state_with_base(page(
        "/jfxkq2ma91zz",
        200,
        "text/html",
        "<html>this page was not found</html>",
    ));

    let (output, fuzzy) = classify_all(
        Arc::clone(&state),
        vec![page(
            "/robots.txt",
            200,
            "text/plain",
            "User-agent: *\nDisallow: /admin\nDisallow: /backup\nDisallow: /internal-api\n",
        )],
    )
    .await;

    assert!(fuzzy.is_empty());
    assert_eq!(output.len(), 1);
    assert!(output[0].is_valid);
    assert_eq!(output[0].reason, None);
}

#[tokio::test]
async fn near_duplicate_is_diverted_to_fuzzy() {
    let filler: String = (0..200)
        .map(|i| format!("row{i} value{i} column{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    let state = state_with_base(page(
        "/jfxkq2ma91zz",
        200,
        "text/html",
        &format!("{filler} request-id 8f2c"),
    ));

    let (output, fuzzy) = classify_all(
        Arc::clone(&state),
        vec![page("/admin", 200, "text/html", &format!("{filler} request-id 91aa"))],
    )
    .await;

    assert!(output.is_empty());
    assert_eq!(fuzzy.len(), 1);
    assert!(fuzzy[0].is_fuzzy);
    assert!(!fuzzy[0].is_valid);
    assert_eq!(fuzzy[0].reason, Some(Reason::FuzzyCompareFailed));
}

#[tokio::test]
async fn redirect_dedup_drops_known_target_only() {
    let base = redirect("/jfxkq2ma91zz", "/login");
    let state = Arc::new(ScanState::new(ScanConfig::new(
        "http://target.example",
        Mode::Path,
    )));
    state
        .redirect_target
        .set(base.redirect_target.clone())
        .unwrap();
    state.registry.init_base(Arc::new(base));

    // worker-side precompare: the known redirect target is rejected
    assert_eq!(
        classify::pre_compare(&state, 302, "/login"),
        Err(Reason::Redirect)
    );
    // a redirect somewhere new passes
    assert_eq!(classify::pre_compare(&state, 302, "/api/v1"), Ok(()));

    let (output, fuzzy) = classify_all(Arc::clone(&state), vec![redirect("/api", "/api/v1")]).await;
    assert!(fuzzy.is_empty());
    assert_eq!(output.len(), 1);
    assert!(output[0].is_valid);
}

#[tokio::test]
async fn deny_lists_outrank_redirect_dedup() {
    let mut config = ScanConfig::new("http://target.example", Mode::Path);
    config.waf_status = HashSet::from([302]);
    config.black_status = HashSet::from([307]);
    let state = Arc::new(ScanState::new(config));
    state.redirect_target.set("/login".to_string()).unwrap();
    state
        .registry
        .init_base(Arc::new(redirect("/jfxkq2ma91zz", "/login")));

    // a waf-listed redirect is rejected as waf wherever it points, even
    // when its target matches the armed redirect policy
    assert_eq!(classify::pre_compare(&state, 302, "/captcha"), Err(Reason::Waf));
    assert_eq!(classify::pre_compare(&state, 302, "/login"), Err(Reason::Waf));
    // black-listed statuses likewise keep their own reason code
    assert_eq!(
        classify::pre_compare(&state, 307, "/elsewhere"),
        Err(Reason::BadStatus)
    );
    assert_eq!(
        classify::pre_compare(&state, 307, "/login"),
        Err(Reason::BadStatus)
    );
}

#[tokio::test]
async fn precompare_status_sets() {
    let state = state_with_base(page("/jfxkq2ma91zz", 403, "text/html", "forbidden"));

    // white list always passes
    assert_eq!(classify::pre_compare(&state, 200, ""), Ok(()));
    // matches the non-200 base status
    assert_eq!(
        classify::pre_compare(&state, 403, ""),
        Err(Reason::SameStatus)
    );
    // black and waf sets
    assert_eq!(
        classify::pre_compare(&state, 400, ""),
        Err(Reason::BadStatus)
    );
    assert_eq!(classify::pre_compare(&state, 493, ""), Err(Reason::Waf));
    // novel status survives precompare
    assert_eq!(classify::pre_compare(&state, 301, ""), Ok(()));
}

#[tokio::test]
async fn first_fuzzy_status_sighting_becomes_reference() {
    let state = state_with_base(page("/jfxkq2ma91zz", 200, "text/html", "not found"));

    let first = page("/secret", 404, "text/html", "custom 404 page body here");
    let (output, _) = classify_all(Arc::clone(&state), vec![first]).await;

    // the sighting seeds bl404 and is suppressed against itself
    assert!(!output[0].is_valid);
    assert_eq!(output[0].reason, Some(Reason::CompareFailed));
    assert!(state.registry.get(404).is_some());
}

#[tokio::test]
async fn every_input_is_emitted_exactly_once() {
    let soft404 = "this page was not found";
    let state = state_with_base(page("/jfxkq2ma91zz", 200, "text/html", soft404));

    let inputs = vec![
        page("/a", 200, "text/html", soft404),
        page(
            "/b",
            200,
            "text/plain",
            "completely different and much longer body with real content in it",
        ),
        Baseline::failed("http://target.example/c", "target.example", "timeout"),
        page("/d", 503, "text/html", "service temporarily unavailable"),
    ];
    let n = inputs.len();

    let (output, fuzzy) = classify_all(Arc::clone(&state), inputs).await;
    assert_eq!(output.len() + fuzzy.len(), n);
}

#[tokio::test]
async fn match_expression_replaces_default_pipeline() {
    let soft404 = "this page was not found";
    let mut config = ScanConfig::new("http://target.example", Mode::Path);
    config.match_expr = Some(expr::compile("current.status == 200").unwrap());
    let state = Arc::new(ScanState::new(config));
    state
        .registry
        .init_base(Arc::new(page("/jfxkq2ma91zz", 200, "text/html", soft404)));

    // identical to the soft-404 baseline, but the user match only looks at
    // the status code, so it survives
    let (output, _) = classify_all(
        Arc::clone(&state),
        vec![
            page("/a", 200, "text/html", soft404),
            page("/b", 404, "text/html", "x"),
        ],
    )
    .await;

    assert_eq!(output.len(), 2);
    assert!(output[0].is_valid);
    assert!(!output[1].is_valid);
    assert_eq!(output[1].reason, Some(Reason::CustomCompareFailed));
}

#[tokio::test]
async fn filter_expression_rejects_after_match() {
    let mut config = ScanConfig::new("http://target.example", Mode::Path);
    config.filter_expr = Some(expr::compile("current.title contains 'error'").unwrap());
    let state = Arc::new(ScanState::new(config));
    state
        .registry
        .init_base(Arc::new(page("/jfxkq2ma91zz", 200, "text/html", "not found")));

    let (output, _) = classify_all(
        Arc::clone(&state),
        vec![page(
            "/broken",
            200,
            "text/plain",
            "<title>internal error</title> completely different and long enough body",
        )],
    )
    .await;

    assert_eq!(output.len(), 1);
    assert!(!output[0].is_valid);
    assert_eq!(output[0].reason, Some(Reason::CustomFilter));
}

#[tokio::test]
async fn suspicious_probes_trip_the_break_threshold() {
    let mut config = ScanConfig::new("http://target.example", Mode::Path);
    config.break_threshold = 3;
    let state = Arc::new(ScanState::new(config));
    let soft404 = "this page was not found";
    state
        .registry
        .init_base(Arc::new(page("/jfxkq2ma91zz", 200, "text/html", soft404)));

    let pb = ProgressBar::hidden();
    let block_page = "<html>access denied, your request has been blocked by policy</html>";

    for _ in 0..3 {
        evaluate_probe(
            &state,
            page("/probe", 200, "text/html", block_page),
            &pb,
        );
    }
    assert!(state.health.should_break());
    assert_eq!(state.registry.failed_count(), 3);

    // a probe matching the learned soft-404 recovers the scan
    evaluate_probe(&state, page("/probe", 200, "text/html", soft404), &pb);
    assert!(!state.health.should_break());
    assert_eq!(state.health.failure_count(), 1);
    assert_eq!(state.registry.failed_count(), 0);
}

#[tokio::test]
async fn transport_error_probe_counts_and_records() {
    let mut config = ScanConfig::new("http://target.example", Mode::Path);
    config.break_threshold = 2;
    let state = Arc::new(ScanState::new(config));
    state
        .registry
        .init_base(Arc::new(page("/jfxkq2ma91zz", 200, "text/html", "not found")));

    let pb = ProgressBar::hidden();
    // transport failures bump the counter at fetch time; simulate that
    state.health.on_request_failed();
    evaluate_probe(
        &state,
        Baseline::failed("http://target.example/p", "target.example", "connection reset"),
        &pb,
    );
    assert_eq!(state.registry.failed_count(), 1);
    assert_eq!(state.health.failure_count(), 2);
}
