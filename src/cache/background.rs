//! # Background Warm-up
//!
//! Cancellation, frame-chunked warm jobs and tokio helpers for filling cache
//! buckets off the request path.

use crate::cache::GenerationCache;
use crate::generation::GenerationWarning;
use crate::settings::PrewarmEntry;
use crate::ForgeResult;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cooperative cancellation flag shared between a warm job and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Jobs stop before their next item.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of a warm operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmReport {
    /// Templates asked for
    pub requested: usize,
    /// Templates actually pushed
    pub produced: usize,
    /// Whether the operation stopped early
    pub cancelled: bool,
    /// Warnings raised by the generated templates
    pub warnings: Vec<GenerationWarning>,
}

impl WarmReport {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: WarmReport) {
        self.requested += other.requested;
        self.produced += other.produced;
        self.cancelled |= other.cancelled;
        self.warnings.extend(other.warnings);
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.produced == self.requested
    }
}

/// A warm plan executed a few items at a time.
///
/// Frame-based hosts call [`WarmJob::step`] once per tick with a small budget
/// so warm-up never stalls a frame.
///
/// # Examples
///
/// ```
/// use item_forge::{ItemEngine, ItemKind, PrewarmEntry, Rarity, WarmJob};
///
/// let engine = ItemEngine::with_seed(7).unwrap();
/// let mut job = WarmJob::new(vec![PrewarmEntry::new(ItemKind::Weapon, Rarity::COMMON, 10)]);
///
/// while !job.step(engine.cache(), 4).unwrap() {}
/// assert_eq!(job.report().produced, 10);
/// ```
#[derive(Debug)]
pub struct WarmJob {
    remaining: VecDeque<PrewarmEntry>,
    token: CancelToken,
    report: WarmReport,
}

impl WarmJob {
    pub fn new(plan: Vec<PrewarmEntry>) -> Self {
        Self::with_token(plan, CancelToken::new())
    }

    pub fn with_token(plan: Vec<PrewarmEntry>, token: CancelToken) -> Self {
        let requested = plan.iter().map(|e| e.count).sum();
        Self {
            remaining: plan.into_iter().filter(|e| e.count > 0).collect(),
            token,
            report: WarmReport::new(requested),
        }
    }

    /// Generates at most `budget` templates. Returns `true` once the plan is
    /// exhausted or cancelled.
    pub fn step(&mut self, cache: &GenerationCache, budget: usize) -> ForgeResult<bool> {
        let mut left = budget;
        while left > 0 {
            if self.token.is_cancelled() {
                self.report.cancelled = true;
                self.remaining.clear();
                break;
            }
            let Some(entry) = self.remaining.front_mut() else {
                break;
            };

            let chunk = entry.count.min(left);
            let mut partial = WarmReport::new(chunk);
            let outcome = cache.warm_into(entry.kind, entry.rarity, chunk, &self.token, &mut partial);
            self.report.produced += partial.produced;
            self.report.warnings.extend(partial.warnings);
            left -= partial.produced;
            entry.count -= partial.produced;
            if entry.count == 0 {
                self.remaining.pop_front();
            }
            outcome?;

            if partial.cancelled {
                self.report.cancelled = true;
                self.remaining.clear();
                break;
            }
        }
        Ok(self.is_done())
    }

    pub fn is_done(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn report(&self) -> &WarmReport {
        &self.report
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

/// Runs a warm plan on tokio's blocking pool.
pub fn spawn_warm(
    cache: Arc<GenerationCache>,
    plan: Vec<PrewarmEntry>,
    token: CancelToken,
) -> JoinHandle<ForgeResult<WarmReport>> {
    tokio::task::spawn_blocking(move || -> ForgeResult<WarmReport> {
        let report = cache.warm_all(&plan, &token)?;
        info!(
            "Background warm finished: {}/{} templates",
            report.produced, report.requested
        );
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        Ok(report)
    })
}

/// Pumps deferred refills every `period` until cancelled.
///
/// Resolves to the total number of templates produced.
pub fn spawn_refill_worker(
    cache: Arc<GenerationCache>,
    period: Duration,
    budget: usize,
    token: CancelToken,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        let mut total = 0;
        loop {
            ticker.tick().await;
            if token.is_cancelled() {
                break;
            }
            total += cache.pump_refills(budget);
        }
        info!("Refill worker stopped after {} refills", total);
        total
    })
}
