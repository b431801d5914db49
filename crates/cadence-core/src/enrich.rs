//! Bounded fan-out of per-item detail lookups.
//!
//! Every item of a caller-owned slice gets one worker future holding the
//! only `&mut` borrow of that slot, so the slice itself needs no lock.
//! A semaphore caps how many workers are inside a lookup at once.
//!
//! Failures never fail the batch: the slot gets a local fallback and the
//! error becomes a [`Warning`]. A later successful lookup of the same slot
//! resolves that warning.

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::traits::DetailFetcher;
use crate::warnings::{Warning, WarningCollector, WarningKind};

pub const MIN_PARALLELISM: usize = 1;
pub const MAX_PARALLELISM: usize = 10;
pub const DEFAULT_PARALLELISM: usize = 5;

/// Clamp a requested worker count into `[1, 10]`; `0` means "unset".
pub fn clamp_parallelism(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_PARALLELISM
    } else {
        requested.clamp(MIN_PARALLELISM, MAX_PARALLELISM)
    }
}

/// Outcome counts of one enrichment call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichReport {
    /// Slots updated from fetched detail.
    pub succeeded: usize,
    /// Slots filled by the local fallback.
    pub fell_back: usize,
    /// Slots left untouched because the call was cancelled.
    pub skipped: usize,
}

impl EnrichReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.fell_back + self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotOutcome {
    Enriched,
    FellBack,
    Skipped,
}

/// Runs a [`DetailFetcher`] over a slice with a concurrency cap.
pub struct ConcurrentEnricher<F> {
    fetcher: F,
    warnings: WarningCollector,
    warning_kind: WarningKind,
}

impl<F: DetailFetcher> ConcurrentEnricher<F> {
    pub fn new(fetcher: F, warnings: WarningCollector) -> Self {
        Self {
            fetcher,
            warnings,
            warning_kind: WarningKind::ReleaseLookupFailed,
        }
    }

    /// Kind attached to warnings for failed slots.
    pub fn with_warning_kind(mut self, kind: WarningKind) -> Self {
        self.warning_kind = kind;
        self
    }

    /// Enrich every slot of `items` in place and wait for all workers.
    pub async fn enrich(
        &self,
        cancel: &CancellationToken,
        items: &mut [F::Item],
        parallelism: usize,
    ) -> EnrichReport {
        let limit = clamp_parallelism(parallelism);
        let semaphore = Semaphore::new(limit);
        tracing::debug!(items = items.len(), parallelism = limit, "Enriching");

        let workers = items
            .iter_mut()
            .enumerate()
            .map(|(index, slot)| self.enrich_slot(index, slot, &semaphore, cancel));
        let outcomes = join_all(workers).await;

        let mut report = EnrichReport::default();
        for outcome in outcomes {
            match outcome {
                SlotOutcome::Enriched => report.succeeded += 1,
                SlotOutcome::FellBack => report.fell_back += 1,
                SlotOutcome::Skipped => report.skipped += 1,
            }
        }

        tracing::info!(
            succeeded = report.succeeded,
            fell_back = report.fell_back,
            skipped = report.skipped,
            "Enrichment finished"
        );
        report
    }

    async fn enrich_slot(
        &self,
        index: usize,
        slot: &mut F::Item,
        semaphore: &Semaphore,
        cancel: &CancellationToken,
    ) -> SlotOutcome {
        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return SlotOutcome::Skipped,
            permit = semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return SlotOutcome::Skipped,
            },
        };

        match self.fetcher.fetch(slot, cancel).await {
            Ok(detail) => {
                self.warnings
                    .resolve(self.warning_kind, &self.fetcher.describe(slot));
                self.fetcher.apply(slot, detail);
                SlotOutcome::Enriched
            }
            Err(AppError::Cancelled) => SlotOutcome::Skipped,
            Err(e) => {
                let context = self.fetcher.describe(slot);
                tracing::warn!(
                    index,
                    %context,
                    error = %e,
                    rate_limited = e.is_rate_limit(),
                    "Detail lookup failed, using fallback"
                );
                self.fetcher.fallback(slot);
                self.warnings
                    .record(Warning::new(self.warning_kind, context, e.to_string()));
                SlotOutcome::FellBack
            }
        }
    }
}
