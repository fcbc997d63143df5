use super::pager::ListingPager;
use super::processor::ProcessFile;
use super::types::{FileDescriptor, FileOutcome, OwnerContext, RunSummary};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Run-scoped counters and queue, owned by the scheduling loop only
#[derive(Debug, Default)]
struct PipelineState {
    pending: VecDeque<FileDescriptor>,
    active_workers: usize,
    completed: u64,
    failed: u64,
    peak_active: usize,
}

impl PipelineState {
    fn finish(&mut self, outcome: &FileOutcome) {
        self.active_workers -= 1;
        if outcome.is_completed() {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }
}

struct DeadlineReached;

async fn before<F: Future>(deadline: Option<Instant>, fut: F) -> Result<F::Output, DeadlineReached> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| DeadlineReached),
        None => Ok(fut.await),
    }
}

/// Bounded-concurrency dispatcher for one folder run.
///
/// A single loop owns the queue and the counters: it tops up the in-flight set to
/// `max_concurrent`, refills the queue from the pager only when it is empty, then
/// waits for one completion before dispatching again. The run ends when the queue
/// is empty, the listing is exhausted and nothing is in flight.
pub struct Scheduler {
    pager: ListingPager,
    processor: Arc<dyn ProcessFile>,
    max_concurrent: usize,
    run_timeout: Option<Duration>,
}

impl Scheduler {
    pub fn new(pager: ListingPager, processor: Arc<dyn ProcessFile>, max_concurrent: usize) -> Self {
        Self {
            pager,
            processor,
            max_concurrent: max_concurrent.max(1),
            run_timeout: None,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub async fn run(mut self, owner: OwnerContext) -> RunSummary {
        let owner = Arc::new(owner);
        let deadline = self.run_timeout.map(|t| Instant::now() + t);
        let mut state = PipelineState::default();
        let mut workers: JoinSet<FileOutcome> = JoinSet::new();
        let mut listing_error = None;
        let mut timed_out = false;

        loop {
            if self
                .dispatch(&mut state, &mut workers, &owner, deadline, &mut listing_error)
                .await
                .is_err()
            {
                timed_out = true;
                break;
            }

            if state.active_workers == 0 {
                break;
            }

            let joined = match before(deadline, workers.join_next()).await {
                Ok(joined) => joined,
                Err(DeadlineReached) => {
                    timed_out = true;
                    break;
                }
            };

            match joined {
                Some(Ok(outcome)) => state.finish(&outcome),
                Some(Err(e)) => {
                    error!("❌ File processor task aborted: {}", e);
                    state.active_workers -= 1;
                    state.failed += 1;
                }
                None => break,
            }
        }

        if timed_out {
            warn!(
                "⏱️ Run deadline reached for folder {}: abandoning {} in-flight and {} queued files",
                self.pager.folder_id(),
                state.active_workers,
                state.pending.len()
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
            state.failed += state.active_workers as u64;
            state.active_workers = 0;
        }

        let summary = RunSummary {
            completed: state.completed,
            failed: state.failed,
            listing_error,
            timed_out,
            peak_active: state.peak_active,
        };

        info!(
            "🏁 Folder {} done: {} completed, {} failed ({} pages)",
            self.pager.folder_id(),
            summary.completed,
            summary.failed,
            self.pager.pages_fetched()
        );
        summary
    }

    /// Starts processors until the bound is reached or there is nothing left to start.
    /// A no-op when already at the bound.
    async fn dispatch(
        &mut self,
        state: &mut PipelineState,
        workers: &mut JoinSet<FileOutcome>,
        owner: &Arc<OwnerContext>,
        deadline: Option<Instant>,
        listing_error: &mut Option<String>,
    ) -> Result<(), DeadlineReached> {
        while state.active_workers < self.max_concurrent {
            if let Some(descriptor) = state.pending.pop_front() {
                let processor = Arc::clone(&self.processor);
                let owner = Arc::clone(owner);
                workers.spawn(async move { processor.process(descriptor, &owner).await });

                state.active_workers += 1;
                state.peak_active = state.peak_active.max(state.active_workers);
                continue;
            }

            if !self.pager.has_more() {
                break;
            }

            match before(deadline, self.pager.fetch_next_page()).await? {
                Ok(files) => state.pending.extend(files),
                Err(e) => {
                    error!(
                        "❌ Listing folder {} failed, no further pages: {}",
                        self.pager.folder_id(),
                        e
                    );
                    *listing_error = Some(e.to_string());
                }
            }
        }
        Ok(())
    }
}
