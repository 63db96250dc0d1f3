//! Owns the handles of running series

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mafia_core::SeriesStatus;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::context::EngineContext;
use crate::error::{OrchestratorError, Result};
use crate::series::{SeriesOrchestrator, SeriesOutcome};

/// Cooperative cancellation flag, polled at phase and game boundaries.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct SeriesHandle {
    stop: StopSignal,
    /// Taken by the caller of [`SeriesSupervisor::wait`].
    task: Option<JoinHandle<Result<SeriesOutcome>>>,
}

/// Runs each series as its own task and keeps its stop flag.
pub struct SeriesSupervisor {
    ctx: EngineContext,
    running: Mutex<HashMap<Uuid, SeriesHandle>>,
}

impl SeriesSupervisor {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a pending series in the background.
    pub async fn start(&self, series_id: Uuid) -> Result<StopSignal> {
        let mut running = self.running.lock().await;
        if running.contains_key(&series_id) {
            return Err(OrchestratorError::AlreadyRunning(series_id));
        }

        let series = self
            .ctx
            .store
            .get_series(series_id)
            .await?
            .ok_or(OrchestratorError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::Pending {
            return Err(OrchestratorError::invalid_transition(
                "series status",
                series.status,
                SeriesStatus::InProgress,
            ));
        }
        if !self
            .ctx
            .store
            .compare_and_set_series_status(series_id, SeriesStatus::Pending, SeriesStatus::InProgress)
            .await?
        {
            return Err(OrchestratorError::AlreadyRunning(series_id));
        }

        let stop = StopSignal::new();
        let orchestrator = SeriesOrchestrator::new(self.ctx.clone());
        let task_stop = stop.clone();
        let task =
            tokio::spawn(async move { orchestrator.run_series(series_id, task_stop).await });

        info!(series_id = %series_id, name = series.name.as_str(), "Series started");
        running.insert(
            series_id,
            SeriesHandle {
                stop: stop.clone(),
                task: Some(task),
            },
        );
        Ok(stop)
    }

    /// Records the stop request and raises the running task's flag.
    pub async fn request_stop(&self, series_id: Uuid) -> Result<()> {
        let series = self
            .ctx
            .store
            .get_series(series_id)
            .await?
            .ok_or(OrchestratorError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::InProgress {
            return Err(OrchestratorError::NotRunning(series_id));
        }
        // The series task may finish between the read and this write.
        if !self
            .ctx
            .store
            .compare_and_set_series_status(
                series_id,
                SeriesStatus::InProgress,
                SeriesStatus::StopRequested,
            )
            .await?
        {
            return Err(OrchestratorError::NotRunning(series_id));
        }

        if let Some(handle) = self.running.lock().await.get(&series_id) {
            handle.stop.request();
        }
        info!(series_id = %series_id, "Series stop requested");
        Ok(())
    }

    /// Waits for a started series to finish and forgets its handle.
    ///
    /// The stop flag stays reachable through [`Self::request_stop`] while
    /// waiting.
    pub async fn wait(&self, series_id: Uuid) -> Result<SeriesOutcome> {
        let task = self
            .running
            .lock()
            .await
            .get_mut(&series_id)
            .and_then(|handle| handle.task.take())
            .ok_or(OrchestratorError::NotRunning(series_id))?;
        let joined = task.await;
        self.running.lock().await.remove(&series_id);
        joined.map_err(|e| OrchestratorError::TaskFailed(e.to_string()))?
    }

    pub async fn is_running(&self, series_id: Uuid) -> bool {
        self.running
            .lock()
            .await
            .get(&series_id)
            .is_some_and(|handle| handle.task.as_ref().map_or(true, |task| !task.is_finished()))
    }
}
