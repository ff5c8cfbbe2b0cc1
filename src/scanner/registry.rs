use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::OnceCell;

use crate::baseline::Baseline;

/// Process-local store of learned baselines. `base` and `index` are set
/// exactly once during init; `per_status` grows insertion-once from the
/// classifier; `failed` collects the probes behind a pending health break.
pub struct Registry {
    base: OnceCell<Arc<Baseline>>,
    index: OnceCell<Arc<Baseline>>,
    per_status: RwLock<HashMap<u16, Arc<Baseline>>>,
    failed: Mutex<Vec<Baseline>>,
    fuzzy_status: Vec<u16>,
}

impl Registry {
    pub fn new(fuzzy_status: Vec<u16>) -> Self {
        Self {
            base: OnceCell::new(),
            index: OnceCell::new(),
            per_status: RwLock::new(HashMap::new()),
            failed: Mutex::new(Vec::new()),
            fuzzy_status,
        }
    }

    pub fn init_base(&self, bl: Arc<Baseline>) {
        let _ = self.base.set(bl);
    }

    pub fn init_index(&self, bl: Arc<Baseline>) {
        let _ = self.index.set(bl);
    }

    pub fn base(&self) -> Option<&Arc<Baseline>> {
        self.base.get()
    }

    pub fn index(&self) -> Option<&Arc<Baseline>> {
        self.index.get()
    }

    pub fn fuzzy_status(&self) -> &[u16] {
        &self.fuzzy_status
    }

    /// Registers a learned baseline for its status code. No-op unless the
    /// status is in the fuzzy set and still unseen. Returns whether the
    /// entry was inserted now.
    pub fn try_add_per_status(&self, bl: &Arc<Baseline>) -> bool {
        if !self.fuzzy_status.contains(&bl.status) {
            return false;
        }
        let mut map = match self.per_status.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        if map.contains_key(&bl.status) {
            return false;
        }
        map.insert(bl.status, Arc::clone(bl));
        true
    }

    pub fn get(&self, status: u16) -> Option<Arc<Baseline>> {
        let map = match self.per_status.read() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(&status).cloned()
    }

    pub fn push_failed(&self, bl: Baseline) {
        if let Ok(mut failed) = self.failed.lock() {
            failed.push(bl);
        }
    }

    pub fn clear_failed(&self) {
        if let Ok(mut failed) = self.failed.lock() {
            failed.clear();
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn failed_summaries(&self) -> Vec<String> {
        self.failed
            .lock()
            .map(|f| f.iter().map(|bl| bl.to_string()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::HeaderSubset;

    fn bl(status: u16, body: &str) -> Arc<Baseline> {
        Arc::new(Baseline::from_content(
            "http://t.example/x",
            "t.example",
            status,
            HeaderSubset::default(),
            body.as_bytes(),
            None,
        ))
    }

    #[test]
    fn per_status_inserts_once() {
        let registry = Registry::new(vec![403, 404, 500]);
        let first = bl(404, "first not found page");
        let second = bl(404, "second not found page");

        assert!(registry.try_add_per_status(&first));
        assert!(!registry.try_add_per_status(&second));
        let stored = registry.get(404).unwrap();
        assert_eq!(stored.body_hash, first.body_hash);
    }

    #[test]
    fn statuses_outside_fuzzy_set_are_ignored() {
        let registry = Registry::new(vec![403]);
        assert!(!registry.try_add_per_status(&bl(200, "ok")));
        assert!(registry.get(200).is_none());
    }

    #[test]
    fn base_and_index_set_once() {
        let registry = Registry::new(vec![]);
        let a = bl(200, "a");
        let b = bl(200, "b");
        registry.init_base(Arc::clone(&a));
        registry.init_base(Arc::clone(&b));
        assert_eq!(registry.base().unwrap().body_hash, a.body_hash);
    }

    #[test]
    fn failed_list_clears() {
        let registry = Registry::new(vec![]);
        registry.push_failed(Baseline::failed("http://t.example/p", "t.example", "timeout"));
        assert_eq!(registry.failed_count(), 1);
        registry.clear_failed();
        assert_eq!(registry.failed_count(), 0);
    }
}
