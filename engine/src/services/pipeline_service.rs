// Async driver: runs fetches on tokio tasks and feeds completions back to the orchestrator
use shared::models::{Candle, TimeFrame};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::orchestrator::{FetchOutcome, FetchTicket, IndicatorOrchestrator};
use crate::data::MarketDataSource;
use crate::error::EngineError;
use crate::render::RenderSurface;

struct Completion {
    ticket: FetchTicket,
    result: Result<Vec<Candle>, EngineError>,
}

/// Owns the orchestrator and is the only place completions are applied, so
/// all state changes happen on the caller's task.
pub struct PipelineService<S: RenderSurface> {
    orchestrator: IndicatorOrchestrator<S>,
    source: Arc<dyn MarketDataSource>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<S: RenderSurface> PipelineService<S> {
    pub fn new(orchestrator: IndicatorOrchestrator<S>, source: Arc<dyn MarketDataSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            source,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Starts a fetch for `timeframe` in the background. Earlier fetches keep
    /// running but their results will be discarded.
    pub fn select_timeframe(&mut self, timeframe: TimeFrame) -> FetchTicket {
        let ticket = self.orchestrator.select_timeframe(timeframe);
        let timeout = self.orchestrator.settings().fetch_timeout();
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let task_ticket = ticket.clone();

        // The fetch runs on its own task so a panicking source still yields
        // a completion; otherwise `in_flight` would never drop back to zero.
        let request = ticket.request.clone();
        let mut fetch = tokio::spawn(async move { source.fetch_candles(&request).await });

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, &mut fetch).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => {
                    tracing::error!(error = %join_err, "Fetch task did not complete");
                    Err(EngineError::FetchAborted(join_err.to_string()))
                }
                Err(_) => {
                    fetch.abort();
                    Err(EngineError::FetchTimeout(timeout.as_secs()))
                }
            };
            if tx.send(Completion { ticket: task_ticket, result }).is_err() {
                tracing::debug!("Pipeline dropped before fetch completed");
            }
        });
        self.in_flight += 1;
        ticket
    }

    /// Waits for the next fetch to finish and applies it. `None` when
    /// nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(self.orchestrator.complete_fetch(&completion.ticket, completion.result))
    }

    /// Applies every outstanding completion, oldest first.
    pub async fn drain(&mut self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(self.in_flight);
        while let Some(outcome) = self.next_outcome().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn orchestrator(&self) -> &IndicatorOrchestrator<S> {
        &self.orchestrator
    }

    pub fn into_orchestrator(self) -> IndicatorOrchestrator<S> {
        self.orchestrator
    }
}
