use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::runtime::Builder;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserResult};

use super::model::ScrapeRequest;
use super::pipeline::{ReviewPipeline, RunReport};
use super::progress::{ProgressEvent, ProgressReporter};

/// Caller's end of a run executing on its own worker thread.
#[derive(Debug)]
pub struct ScrapeHandle {
    events: UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    worker: JoinHandle<RunReport>,
}

impl ScrapeHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next event, or `None` once the worker is gone and the queue drained.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<ProgressEvent> {
        self.events.try_recv().ok()
    }

    pub fn blocking_next_event(&mut self) -> Option<ProgressEvent> {
        self.events.blocking_recv()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn join(self) -> BrowserResult<RunReport> {
        self.worker
            .join()
            .map_err(|_| BrowserError::Unexpected("scrape worker panicked".to_string()))
    }
}

pub struct ScrapeRunner;

impl ScrapeRunner {
    /// Starts `request` on a dedicated thread with a single-threaded runtime.
    pub fn spawn(
        pipeline: Arc<ReviewPipeline>,
        request: ScrapeRequest,
    ) -> BrowserResult<ScrapeHandle> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (reporter, events) = ProgressReporter::channel();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        info!(url = %request.url, ratings = request.limits.len(), "spawning scrape worker");
        let worker = thread::Builder::new()
            .name("reviewscope-worker".to_string())
            .spawn(move || {
                let report = runtime.block_on(pipeline.run(&request, reporter, worker_cancel));
                debug!(state = %report.state, "scrape worker exiting");
                report
            })?;
        Ok(ScrapeHandle {
            events,
            cancel,
            worker,
        })
    }
}
