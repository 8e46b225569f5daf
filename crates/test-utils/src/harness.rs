use std::sync::Arc;

use trygraph::config::EngineSection;
use trygraph::engine::{Accumulator, Engine, Event, Job};
use trygraph::errors::Result;
use trygraph::graph::{Task, TaskGraph};
use trygraph::services::{BuildService, InMemoryIsolateCache, Services};
use trygraph::store::{InMemoryTaskStore, TaskStore};
use trygraph::tasks::{self, JobReport};

use crate::builders;
use crate::fakes::{FakeBuildService, FakeTestService};

/// One job wired to an in-memory store and fake services.
pub struct Harness {
    pub job: Job,
    pub store: Arc<InMemoryTaskStore>,
    pub engine: Engine,
    pub builds: Arc<FakeBuildService>,
    pub tests: Arc<FakeTestService>,
    pub isolates: Arc<InMemoryIsolateCache>,
    pub services: Services,
}

/// Default limits with a short call timeout.
fn test_engine_section() -> EngineSection {
    EngineSection {
        call_timeout_secs: 2,
        ..EngineSection::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(test_engine_section())
    }

    /// Harness whose engine and services follow a job file's `[engine]`
    /// section.
    pub fn with_engine(section: EngineSection) -> Self {
        let builds = Arc::new(FakeBuildService::new());
        Self::with_builds(builds.clone(), builds, section)
    }

    /// Harness whose build calls go to `service`; `builds` still records
    /// nothing in that case.
    pub fn with_build_service(service: Arc<dyn BuildService>) -> Self {
        Self::with_builds(
            Arc::new(FakeBuildService::new()),
            service,
            test_engine_section(),
        )
    }

    fn with_builds(
        builds: Arc<FakeBuildService>,
        service: Arc<dyn BuildService>,
        section: EngineSection,
    ) -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let tests = Arc::new(FakeTestService::new());
        let isolates = Arc::new(InMemoryIsolateCache::new());
        let services = section.apply(Services::new(service, tests.clone(), isolates.clone()));

        Self {
            job: builders::job(),
            engine: section.engine(store.clone()),
            store,
            builds,
            tests,
            isolates,
            services,
        }
    }

    pub async fn populate(&self, graph: TaskGraph) -> Result<()> {
        self.store.populate(&self.job.id, graph).await?;
        Ok(())
    }

    pub async fn evaluate(&self, event: Event) -> Result<Accumulator> {
        let evaluator = tasks::job_evaluator(&self.job, &self.services);
        self.engine.evaluate(&self.job, &event, &evaluator).await
    }

    pub async fn task(&self, task_id: &str) -> Task {
        self.store
            .load_task(&self.job.id, task_id)
            .await
            .expect("task should exist")
    }

    pub async fn report(&self) -> Result<JobReport> {
        tasks::job_report(&self.engine, &self.job).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
