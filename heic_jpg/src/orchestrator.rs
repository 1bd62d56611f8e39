//! Sequential batch conversion.
//!
//! One run converts its items strictly in submission order, one backend call
//! at a time. Batch state sits behind a mutex that is never held across an
//! `.await`, so `remove_items`, `reset` and `snapshot` stay callable while a
//! run is waiting on the backend. Every change is published as a
//! [`BatchSnapshot`] on a watch channel.
//!
//! Each run is tagged with a generation. `reset` (and removing the last item)
//! bumps it; a run whose generation is no longer current stops at its next
//! step and never writes into the new state.

use crate::backend::{Capability, ConversionBackend};
use crate::config::PipelineConfig;
use crate::errors::{BatchRejected, ClassifiedError};
use crate::item::{
    BatchPhase, BatchProgress, BatchSnapshot, ConversionItem, ItemId, ItemStatus,
};
use crate::telemetry::{BatchType, TelemetryEvent, TelemetrySink};
use crate::thumbnail::PreviewGenerator;
use shared_utils::format_duration;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

struct BatchState {
    items: Vec<ConversionItem>,
    phase: BatchPhase,
    generation: u64,
}

impl BatchState {
    fn item_mut(&mut self, id: ItemId) -> Option<&mut ConversionItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    fn all_terminal(&self) -> bool {
        self.items.iter().all(|item| item.status().is_terminal())
    }

    /// Drop every item and invalidate the active run.
    fn clear(&mut self) {
        self.items.clear();
        self.phase = BatchPhase::Idle;
        self.generation += 1;
    }
}

/// What a single item's conversion produced, if it is still wanted.
enum Outcome {
    Converted(Vec<u8>),
    Failed(ClassifiedError),
    /// The run was reset or the item removed; nothing to record.
    Abandoned,
}

pub struct Orchestrator {
    backend: Arc<dyn ConversionBackend>,
    previews: Arc<dyn PreviewGenerator>,
    telemetry: Arc<dyn TelemetrySink>,
    config: PipelineConfig,
    capability: Capability,
    state: Mutex<BatchState>,
    updates: watch::Sender<BatchSnapshot>,
    /// Wakes sleeping runs when their generation is invalidated.
    interrupt: Notify,
    /// Held by the active run so two runs never call the backend at once.
    run_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Wire the collaborators and probe the backend once.
    pub fn new(
        backend: Arc<dyn ConversionBackend>,
        previews: Arc<dyn PreviewGenerator>,
        telemetry: Arc<dyn TelemetrySink>,
        config: PipelineConfig,
    ) -> Self {
        let capability = backend.check_capability();
        match &capability {
            Capability::Supported => info!(backend = backend.name(), "Conversion backend ready"),
            Capability::Unsupported { reason } => {
                warn!(backend = backend.name(), %reason, "Conversion backend unsupported")
            }
        }

        let state = BatchState {
            items: Vec::new(),
            phase: BatchPhase::Idle,
            generation: 0,
        };
        let (updates, _) = watch::channel(Self::build_snapshot(&state, &capability));

        Self {
            backend,
            previews,
            telemetry,
            config,
            capability,
            state: Mutex::new(state),
            updates,
            interrupt: Notify::new(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        Self::build_snapshot(&self.state(), &self.capability)
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress::from_items(&self.state().items)
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.updates.subscribe()
    }

    /// Replace the item list with `items` and convert them in order.
    ///
    /// Returns once the run has finished (or been reset). Conversion failures
    /// are recorded on the items, never returned here.
    pub async fn submit_batch(&self, items: Vec<ConversionItem>) -> Result<(), BatchRejected> {
        if items.is_empty() {
            debug!("Empty batch submitted, nothing to do");
            return Ok(());
        }
        if let Capability::Unsupported { reason } = &self.capability {
            return Err(BatchRejected::Unsupported(reason.clone()));
        }

        let (ids, generation) = {
            let mut state = self.state();
            if state.phase == BatchPhase::Running {
                return Err(BatchRejected::AlreadyRunning);
            }
            if let Some(item) = items.iter().find(|i| i.status() != ItemStatus::Waiting) {
                return Err(BatchRejected::NotWaiting(item.id()));
            }

            let ids: Vec<ItemId> = items.iter().map(|i| i.id()).collect();
            state.items = items;
            state.phase = BatchPhase::Running;
            state.generation += 1;
            self.publish(&state);
            (ids, state.generation)
        };

        info!(items = ids.len(), "Batch submitted");
        self.run(ids, generation).await;
        Ok(())
    }

    /// Re-run the `Failed` items among `ids`. Other items are untouched.
    pub async fn retry_items(&self, ids: &HashSet<ItemId>) -> Result<(), BatchRejected> {
        let (matched, generation) = {
            let mut state = self.state();
            if state.phase == BatchPhase::Running {
                return Err(BatchRejected::AlreadyRunning);
            }

            let matched: Vec<ItemId> = state
                .items
                .iter()
                .filter(|i| i.status() == ItemStatus::Failed && ids.contains(&i.id()))
                .map(|i| i.id())
                .collect();
            if matched.is_empty() {
                debug!(requested = ids.len(), "No failed items to retry");
                return Ok(());
            }

            for item in state.items.iter_mut() {
                if matched.contains(&item.id()) {
                    if let Err(e) = item.requeue() {
                        warn!(error = %e, "Could not requeue item");
                    }
                }
            }
            state.phase = BatchPhase::Running;
            state.generation += 1;
            self.publish(&state);
            (matched, state.generation)
        };

        info!(items = matched.len(), "Retrying failed items");
        self.run(matched, generation).await;
        Ok(())
    }

    /// Retry every item that is currently `Failed`.
    pub async fn retry_failed(&self) -> Result<(), BatchRejected> {
        let failed: HashSet<ItemId> = self
            .state()
            .items
            .iter()
            .filter(|i| i.status() == ItemStatus::Failed)
            .map(|i| i.id())
            .collect();
        self.retry_items(&failed).await
    }

    /// Remove items by id, whatever their status. Unknown ids are ignored.
    /// Returns how many items were removed.
    pub fn remove_items(&self, ids: &HashSet<ItemId>) -> usize {
        let mut state = self.state();
        let before = state.items.len();
        state.items.retain(|item| !ids.contains(&item.id()));
        let removed = before - state.items.len();
        if removed == 0 {
            return 0;
        }

        if state.items.is_empty() {
            state.clear();
            self.interrupt.notify_waiters();
        } else if state.all_terminal() {
            state.phase = BatchPhase::Completed;
        }
        debug!(removed, remaining = state.items.len(), phase = %state.phase, "Items removed");
        self.publish(&state);
        removed
    }

    /// Drop all items and return to `Idle`. An active run stops at its next
    /// step.
    pub fn reset(&self) {
        let mut state = self.state();
        let dropped = state.items.len();
        state.clear();
        self.interrupt.notify_waiters();
        self.publish(&state);
        info!(dropped, "Batch reset");
    }

    fn state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state().generation == generation
    }

    fn build_snapshot(state: &BatchState, capability: &Capability) -> BatchSnapshot {
        BatchSnapshot {
            phase: state.phase,
            items: state.items.clone(),
            progress: BatchProgress::from_items(&state.items),
            unsupported_reason: capability.reason().map(str::to_string),
        }
    }

    /// Called with the state lock held so snapshots go out in order.
    fn publish(&self, state: &BatchState) {
        self.updates
            .send_replace(Self::build_snapshot(state, &self.capability));
    }

    /// Sleep unless the run is invalidated first. Returns whether the run is
    /// still current.
    async fn pause(&self, delay: Duration, generation: u64) -> bool {
        if delay.is_zero() {
            return self.is_current(generation);
        }

        // Register before checking so a reset in between still wakes us.
        let interrupted = self.interrupt.notified();
        tokio::pin!(interrupted);
        interrupted.as_mut().enable();
        if !self.is_current(generation) {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = interrupted => {}
        }
        self.is_current(generation)
    }

    async fn run(&self, ids: Vec<ItemId>, generation: u64) {
        let _guard = self.run_lock.lock().await;
        let batch_type = BatchType::for_run_size(ids.len());

        for (index, &id) in ids.iter().enumerate() {
            let source = {
                let mut state = self.state();
                if state.generation != generation {
                    debug!(generation, "Run superseded, stopping");
                    return;
                }
                let Some(item) = state.item_mut(id) else {
                    debug!(%id, "Item removed before conversion, skipping");
                    continue;
                };
                if let Err(e) = item.start_converting() {
                    warn!(error = %e, "Skipping item");
                    continue;
                }
                let source = item.source().clone();
                debug!(%id, name = item.display_name(), "Converting");
                self.publish(&state);
                source
            };

            let outcome = self.convert_with_retry(id, source, generation).await;
            self.settle(id, outcome, batch_type, generation).await;
            self.backend.release();

            if index + 1 < ids.len() && !self.pause(self.config.inter_item_delay, generation).await {
                debug!(generation, "Run superseded during pause, stopping");
                return;
            }
        }

        let mut state = self.state();
        if state.generation == generation {
            state.phase = BatchPhase::Completed;
            let progress = BatchProgress::from_items(&state.items);
            self.publish(&state);
            info!(
                total = progress.total,
                completed = progress.completed,
                failed = progress.failed,
                "Batch completed"
            );
        }
    }

    async fn call_backend(&self, source: Arc<[u8]>) -> Result<Vec<u8>, ClassifiedError> {
        let convert = self.backend.convert(source, self.config.quality);
        match self.config.conversion_timeout {
            None => convert.await,
            Some(limit) => match tokio::time::timeout(limit, convert).await {
                Ok(result) => result,
                Err(_) => Err(ClassifiedError::conversion_failed(format!(
                    "Conversion failed: timed out after {}",
                    format_duration(limit)
                ))),
            },
        }
    }

    async fn convert_with_retry(&self, id: ItemId, source: Arc<[u8]>, generation: u64) -> Outcome {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            {
                let mut state = self.state();
                if state.generation != generation {
                    return Outcome::Abandoned;
                }
                match state.item_mut(id) {
                    Some(item) => item.record_attempt(),
                    None => return Outcome::Abandoned,
                }
            }
            attempt += 1;

            match self.call_backend(source.clone()).await {
                Ok(jpeg) => return Outcome::Converted(jpeg),
                Err(err) if err.is_retryable() && attempt <= policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        %id,
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Conversion failed, retrying"
                    );
                    if !self.pause(delay, generation).await {
                        return Outcome::Abandoned;
                    }
                }
                Err(err) => return Outcome::Failed(err),
            }
        }
    }

    async fn settle(&self, id: ItemId, outcome: Outcome, batch_type: BatchType, generation: u64) {
        match outcome {
            Outcome::Abandoned => {
                debug!(%id, "Conversion result discarded");
            }
            Outcome::Converted(jpeg) => {
                let jpeg: Arc<[u8]> = Arc::from(jpeg);
                let preview = match self
                    .previews
                    .make_preview(jpeg.clone(), self.config.preview_max_dimension)
                    .await
                {
                    Ok(bytes) => Some(Arc::from(bytes)),
                    Err(e) => {
                        warn!(%id, error = %e, "Preview generation failed");
                        None
                    }
                };

                let mut state = self.state();
                if state.generation != generation {
                    return;
                }
                let Some(item) = state.item_mut(id) else {
                    debug!(%id, "Item removed during conversion, result discarded");
                    return;
                };
                if let Err(e) = item.complete(jpeg, preview) {
                    warn!(error = %e, "Could not record conversion result");
                    return;
                }
                info!(%id, name = item.display_name(), attempts = item.attempts(), "Converted");
                self.publish(&state);
                self.telemetry.record(TelemetryEvent::ConversionSuccess {
                    count: 1,
                    batch_type,
                });
            }
            Outcome::Failed(err) => {
                let mut state = self.state();
                if state.generation != generation {
                    return;
                }
                let Some(item) = state.item_mut(id) else {
                    debug!(%id, "Item removed during conversion, failure discarded");
                    return;
                };
                warn!(
                    %id,
                    name = item.display_name(),
                    kind = %err.kind,
                    error = %err,
                    "Conversion failed"
                );
                let event = TelemetryEvent::ConversionError {
                    error_class: err.kind.as_str().to_string(),
                    message: err.message.clone(),
                };
                if let Err(e) = item.fail(err) {
                    warn!(error = %e, "Could not record conversion failure");
                    return;
                }
                self.publish(&state);
                self.telemetry.record(event);
            }
        }
    }
}
