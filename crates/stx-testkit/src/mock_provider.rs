//! Scripted [`HistoricalProvider`] for orchestrator scenarios.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use stx_cache::Bar;
use stx_md::{FetchRequest, HistoricalProvider, ProviderError};

/// Serves its bars filtered to each request window and records the requests.
/// While failing, every fetch returns [`ProviderError::Transport`].
pub struct MockProvider {
    source_name: String,
    bars: Vec<Bar>,
    failing: AtomicBool,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockProvider {
    pub fn new(source_name: &str, bars: Vec<Bar>) -> Self {
        Self {
            source_name: source_name.to_string(),
            bars,
            failing: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Requests seen so far, failed ones included.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait::async_trait]
impl HistoricalProvider for MockProvider {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn fetch_bars(&self, req: &FetchRequest) -> Result<Vec<Bar>> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(req.clone());
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("scripted failure".to_string()).into());
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| req.contains(&b.ts))
            .cloned()
            .collect())
    }
}
