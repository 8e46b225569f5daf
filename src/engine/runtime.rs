// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::evaluate::{Engine, Job};
use crate::engine::evaluators::Evaluator;
use crate::engine::{Accumulator, Event};
use crate::errors::Result;
use crate::types::JobId;

/// Events flowing into the runtime from push subscriptions, pollers, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Evaluate one job's graph against an event.
    Evaluate { job_id: JobId, event: Event },
    /// Stop accepting events and wait for in-flight evaluations.
    Shutdown,
}

/// A job the runtime can evaluate, with its registration table.
#[derive(Clone)]
pub struct RegisteredJob {
    pub job: Job,
    pub evaluator: Arc<dyn Evaluator>,
}

/// Completed evaluation as reported by [`JobRuntime::run`].
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub job_id: JobId,
    pub event_type: String,
    pub result: Result<Accumulator>,
}

/// Async shell feeding events into [`Engine::evaluate`].
///
/// Every event runs on its own Tokio task, so events for the same job may
/// be evaluated concurrently; the store's compare-and-set keeps that safe.
pub struct JobRuntime {
    engine: Arc<Engine>,
    jobs: HashMap<JobId, RegisteredJob>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for JobRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRuntime")
            .field("engine", &self.engine)
            .field("jobs", &self.jobs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl JobRuntime {
    pub fn new(engine: Arc<Engine>, event_rx: mpsc::Receiver<RuntimeEvent>) -> Self {
        Self {
            engine,
            jobs: HashMap::new(),
            event_rx,
        }
    }

    pub fn register(&mut self, job: Job, evaluator: Arc<dyn Evaluator>) {
        self.jobs
            .insert(job.id.clone(), RegisteredJob { job, evaluator });
    }

    /// Main event loop.
    ///
    /// Returns every finished evaluation once the channel closes or a
    /// [`RuntimeEvent::Shutdown`] arrives and in-flight work has drained.
    pub async fn run(mut self) -> Vec<EvaluationOutcome> {
        info!(jobs = self.jobs.len(), "job runtime started");

        let mut in_flight: JoinSet<EvaluationOutcome> = JoinSet::new();
        let mut finished = Vec::new();

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(RuntimeEvent::Evaluate { job_id, event }) => {
                            self.spawn_evaluation(&mut in_flight, job_id, event);
                        }
                        Some(RuntimeEvent::Shutdown) => {
                            info!("shutdown requested; draining in-flight evaluations");
                            break;
                        }
                        None => {
                            info!("runtime event channel closed; draining");
                            break;
                        }
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    collect(joined, &mut finished);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            collect(joined, &mut finished);
        }

        info!(evaluations = finished.len(), "job runtime exiting");
        finished
    }

    fn spawn_evaluation(
        &self,
        in_flight: &mut JoinSet<EvaluationOutcome>,
        job_id: JobId,
        event: Event,
    ) {
        let Some(registered) = self.jobs.get(&job_id).cloned() else {
            warn!(job_id = %job_id, event_type = %event.event_type, "event for unknown job ignored");
            return;
        };

        debug!(job_id = %job_id, event_type = %event.event_type, "spawning evaluation");
        let engine = Arc::clone(&self.engine);
        in_flight.spawn(async move {
            let result = engine
                .evaluate(&registered.job, &event, registered.evaluator.as_ref())
                .await;
            EvaluationOutcome {
                job_id,
                event_type: event.event_type,
                result,
            }
        });
    }
}

fn collect(
    joined: std::result::Result<EvaluationOutcome, tokio::task::JoinError>,
    finished: &mut Vec<EvaluationOutcome>,
) {
    match joined {
        Ok(outcome) => {
            if let Err(e) = &outcome.result {
                error!(job_id = %outcome.job_id, error = %e, "evaluation failed");
            }
            finished.push(outcome);
        }
        Err(e) => error!(error = %e, "evaluation task panicked or was cancelled"),
    }
}
