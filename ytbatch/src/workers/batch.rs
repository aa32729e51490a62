use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::engine::{EngineOutcome, MediaEngine};
use crate::models::{LinkList, QualityMode};
use crate::planner::{self, UnitPlan};
use crate::presentation::Presentation;
use crate::progress::{ProgressAggregator, ProgressEvent, ProgressSink, ProgressSnapshot};

const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    NoOp,
    AlreadyRunning,
    PlanningFailed(String),
    Completed,
    CompletedWithErrors(Vec<String>)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    NoOp,
    AlreadyRunning,
    Started { run_id: String }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub mode: QualityMode,
    pub links: usize,
    pub planned_units: Option<u64>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub outcome: Option<RunOutcome>
}

/// Puts the orchestrator back to idle when a run ends, however it ends.
struct RunGuard {
    running: Arc<AtomicBool>,
    presentation: Arc<dyn Presentation>
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.presentation.set_trigger_enabled(true);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one batch at a time against the media engine.
pub struct BatchOrchestrator<E: MediaEngine> {
    engine: Arc<E>,
    presentation: Arc<dyn Presentation>,
    refresh_interval: Duration,
    running: Arc<AtomicBool>,
    current: Mutex<Option<Arc<ProgressAggregator>>>,
    last_run: Mutex<Option<RunRecord>>
}

impl<E: MediaEngine> BatchOrchestrator<E> {
    pub fn new(engine: Arc<E>, presentation: Arc<dyn Presentation>, refresh_interval: Duration) -> Self {
        Self {
            engine,
            presentation,
            refresh_interval: refresh_interval.max(MIN_REFRESH_INTERVAL),
            running: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
            last_run: Mutex::new(None)
        }
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Progress of the current run, or of the last one once it has ended.
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        lock(&self.current).as_ref().map(|aggregator| aggregator.snapshot())
    }

    /// Current unit as `(downloaded, total, fraction)`, read from the live aggregator.
    pub fn unit_progress(&self) -> Option<(u64, Option<u64>, f64)> {
        lock(&self.current).as_ref().map(|aggregator| {
            let (downloaded, total) = aggregator.unit_bytes();
            (downloaded, total, aggregator.per_unit_fraction())
        })
    }

    pub fn last_run(&self) -> Option<RunRecord> {
        lock(&self.last_run).clone()
    }

    /// Runs a batch to completion on the caller's task.
    pub async fn run(
        &self,
        links: LinkList,
        mode: QualityMode,
        sink: Arc<dyn ProgressSink>
    ) -> RunOutcome {
        if links.is_empty() {
            tracing::debug!("No links given, nothing to run");
            return RunOutcome::NoOp;
        }
        let Some(guard) = self.begin() else {
            tracing::info!("Batch already running, ignoring trigger");
            return RunOutcome::AlreadyRunning;
        };
        let run_id = uuid7::uuid7().to_string();
        self.execute(guard, &run_id, links, mode, sink).await
    }

    /// Starts a batch on a background task and returns without waiting for it.
    pub fn launch(
        self: &Arc<Self>,
        links: LinkList,
        mode: QualityMode,
        sink: Arc<dyn ProgressSink>
    ) -> Launch {
        if links.is_empty() {
            tracing::debug!("No links given, nothing to launch");
            return Launch::NoOp;
        }
        let Some(guard) = self.begin() else {
            tracing::info!("Batch already running, ignoring trigger");
            return Launch::AlreadyRunning;
        };

        let run_id = uuid7::uuid7().to_string();
        let orchestrator = Arc::clone(self);
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            orchestrator
                .execute(guard, &task_run_id, links, mode, sink)
                .await;
        });

        Launch::Started { run_id }
    }

    fn begin(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.presentation.set_trigger_enabled(false);
        Some(RunGuard {
            running: Arc::clone(&self.running),
            presentation: Arc::clone(&self.presentation)
        })
    }

    async fn execute(
        &self,
        guard: RunGuard,
        run_id: &str,
        links: LinkList,
        mode: QualityMode,
        sink: Arc<dyn ProgressSink>
    ) -> RunOutcome {
        tracing::info!("Starting batch {} with {} link(s) ({})", run_id, links.len(), mode);
        *lock(&self.last_run) = Some(RunRecord {
            run_id: run_id.to_string(),
            mode,
            links: links.len(),
            planned_units: None,
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
            outcome: None
        });

        let outcome = match planner::plan(self.engine.as_ref(), &links, mode).await {
            Ok(plan) => self.download(run_id, &links, mode, &plan, &sink).await,
            Err(e) => {
                tracing::error!("Batch {} planning failed: {}", run_id, e);
                RunOutcome::PlanningFailed(e.to_string())
            }
        };

        if let Some(record) = lock(&self.last_run).as_mut() {
            record.finished_at = Some(chrono::Utc::now().to_rfc3339());
            record.outcome = Some(outcome.clone());
        }
        drop(guard);

        tracing::info!("Batch {} finished: {:?}", run_id, outcome);
        outcome
    }

    async fn download(
        &self,
        run_id: &str,
        links: &LinkList,
        mode: QualityMode,
        plan: &UnitPlan,
        sink: &Arc<dyn ProgressSink>
    ) -> RunOutcome {
        for entry in &plan.links {
            tracing::debug!(
                "Batch {}: {} -> {} unit(s){}",
                run_id,
                entry.link,
                entry.units,
                if entry.playlist { " (playlist)" } else { "" }
            );
        }
        tracing::info!(
            "Batch {} planned {} unit(s){}",
            run_id,
            plan.total,
            if plan.dual_stream { ", video and audio fetched separately" } else { "" }
        );
        if let Some(record) = lock(&self.last_run).as_mut() {
            record.planned_units = Some(plan.total);
        }

        let aggregator = Arc::new(ProgressAggregator::new(plan.total));
        *lock(&self.current) = Some(Arc::clone(&aggregator));
        aggregator.snapshot().push_to(sink.as_ref());

        let (stop_tx, stop_rx) = oneshot::channel();
        let refresher = tokio::spawn(refresh_sink(
            Arc::clone(&aggregator),
            Arc::clone(sink),
            self.refresh_interval,
            stop_rx
        ));

        let on_event = {
            let aggregator = Arc::clone(&aggregator);
            move |event: ProgressEvent| aggregator.on_event(event)
        };
        let engine_outcome = self
            .engine
            .download(links.as_slice(), &mode.format_selector(), &on_event)
            .await;

        let _ = stop_tx.send(());
        if let Err(e) = refresher.await {
            tracing::warn!("Progress refresher for batch {} failed: {}", run_id, e);
        }
        aggregator.snapshot().push_to(sink.as_ref());

        let finished = aggregator.finished_events();
        if finished != aggregator.planned_total() {
            tracing::info!(
                "Batch {} finished {} of {} planned unit(s), showing {}",
                run_id,
                finished,
                aggregator.planned_total(),
                aggregator.completed_units()
            );
        }

        match engine_outcome {
            EngineOutcome::Success => RunOutcome::Completed,
            EngineOutcome::PartialFailure(errors) => {
                tracing::warn!("Batch {} completed with {} error(s)", run_id, errors.len());
                RunOutcome::CompletedWithErrors(errors)
            }
            EngineOutcome::FatalFailure(reason) => {
                tracing::warn!("Batch {} aborted by engine: {}", run_id, reason);
                RunOutcome::CompletedWithErrors(vec![reason])
            }
        }
    }
}

async fn refresh_sink(
    aggregator: Arc<ProgressAggregator>,
    sink: Arc<dyn ProgressSink>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let snapshot = aggregator.snapshot();
                tracing::trace!(
                    fraction = snapshot.unit_fraction,
                    completed = snapshot.completed_units,
                    "progress refresh"
                );
                snapshot.push_to(sink.as_ref());
            }
        }
    }
}
