use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::baseline::Baseline;
use crate::expr::ExprEnv;

use super::types::Reason;
use super::ScanState;

/// Fast rejection run inline in the worker, before the response body is
/// read. Bypassed entirely when a match expression is configured so user
/// logic sees every response.
pub(crate) fn pre_compare(state: &ScanState, status: u16, location: &str) -> Result<(), Reason> {
    let config = &state.config;
    if config.white_status.contains(&status) {
        return Ok(());
    }
    // once the redirect policy is armed, redirecting responses are judged
    // by where they point rather than by matching the base status; the
    // black/waf deny-lists still apply to them
    let known_redirect = state
        .redirect_target
        .get()
        .filter(|_| !location.is_empty());
    if known_redirect.is_none() {
        if let Some(base) = state.registry.base() {
            if base.status != 200 && base.status == status {
                return Err(Reason::SameStatus);
            }
        }
    }
    if config.black_status.contains(&status) {
        return Err(Reason::BadStatus);
    }
    if config.waf_status.contains(&status) {
        return Err(Reason::Waf);
    }
    if let Some(known) = known_redirect {
        if location == known {
            return Err(Reason::Redirect);
        }
    }
    Ok(())
}

/// Deep comparison against the learned references. Returns whether the
/// baseline survives; rejected baselines carry their reason and fuzzy
/// near-duplicates are additionally flagged for the fuzzy stream.
pub(crate) fn base_compare(state: &ScanState, bl: &mut Baseline) -> bool {
    if !bl.is_valid {
        return false;
    }

    // first sighting of a fuzzy-set status becomes the reference for that
    // status, and is therefore suppressed itself
    if state.registry.get(bl.status).is_none()
        && state.registry.fuzzy_status().contains(&bl.status)
    {
        bl.collect();
        state.registry.try_add_per_status(&Arc::new(bl.clone()));
    }

    let reference = state
        .registry
        .get(bl.status)
        .or_else(|| {
            state
                .registry
                .base()
                .filter(|base| base.status == bl.status)
                .cloned()
        })
        .or_else(|| {
            state
                .registry
                .index()
                .filter(|index| index.status == bl.status)
                .cloned()
        });

    let mut ordinal: Option<i8> = None;
    if let Some(reference) = reference.as_ref() {
        let o = reference.compare(bl);
        ordinal = Some(o);
        if o == 1 {
            bl.reason = Some(Reason::CompareFailed);
            return false;
        }
    }

    bl.collect();
    if bl.has_waf_framework() {
        bl.reason = Some(Reason::Waf);
        return false;
    }

    if ordinal == Some(0) {
        if let Some(reference) = reference.as_ref() {
            if reference.fuzzy_compare(bl) {
                bl.reason = Some(Reason::FuzzyCompareFailed);
                bl.is_fuzzy = true;
                return false;
            }
        }
    }

    true
}

pub(crate) fn expr_env(state: &ScanState, current: Arc<Baseline>) -> ExprEnv {
    let empty = Arc::new(Baseline::empty());
    let mut status_baselines = HashMap::new();
    for &status in state.registry.fuzzy_status() {
        status_baselines.insert(
            status,
            state
                .registry
                .get(status)
                .unwrap_or_else(|| Arc::clone(&empty)),
        );
    }
    ExprEnv {
        index: state
            .registry
            .index()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&empty)),
        base: state
            .registry
            .base()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&empty)),
        current,
        status_baselines,
    }
}

/// The single consumer of the word-result queue. Sequential on purpose:
/// it owns per-status learning and keeps emission ordering deterministic.
/// Every received baseline leaves through exactly one of the two streams.
pub(crate) async fn run_classifier(
    mut rx: mpsc::Receiver<Baseline>,
    state: Arc<ScanState>,
    output_tx: mpsc::Sender<Baseline>,
    fuzzy_tx: mpsc::Sender<Baseline>,
) {
    while let Some(mut bl) = rx.recv().await {
        let mut valid = match state.config.match_expr.as_ref() {
            Some(matcher) => {
                let env = expr_env(&state, Arc::new(bl.clone()));
                if matcher(&env) {
                    true
                } else {
                    bl.reason = Some(Reason::CustomCompareFailed);
                    false
                }
            }
            None => base_compare(&state, &mut bl),
        };

        if valid {
            if let Some(filter) = state.config.filter_expr.as_ref() {
                let env = expr_env(&state, Arc::new(bl.clone()));
                if filter(&env) {
                    bl.reason = Some(Reason::CustomFilter);
                    valid = false;
                }
            }
        }

        if !valid {
            bl.is_valid = false;
        }

        if bl.is_fuzzy {
            if fuzzy_tx.send(bl).await.is_err() {
                break;
            }
        } else if output_tx.send(bl).await.is_err() {
            break;
        }
    }
}
