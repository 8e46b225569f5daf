use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trygraph::services::{
    BuildHandle, BuildRequest, BuildService, BuildState, BuildStatus, RunHandle, RunRequest,
    RunResult, RunState, ServiceError, TestService,
};
use trygraph::types::BoxFuture;

/// Build service with scripted poll results that records every call.
///
/// Scheduling hands out `build-1`, `build-2`, ... unless a response was
/// pushed with [`FakeBuildService::push_schedule`]. Polling pops the next
/// scripted status and reports a started build once the script runs out.
#[derive(Debug, Default)]
pub struct FakeBuildService {
    schedule_script: Mutex<VecDeque<Result<BuildHandle, ServiceError>>>,
    poll_script: Mutex<VecDeque<Result<BuildStatus, ServiceError>>>,
    scheduled: Mutex<Vec<BuildRequest>>,
    polled: Mutex<Vec<BuildHandle>>,
}

impl FakeBuildService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_schedule(&self, response: Result<BuildHandle, ServiceError>) {
        self.schedule_script.lock().unwrap().push_back(response);
    }

    pub fn push_poll(&self, response: Result<BuildStatus, ServiceError>) {
        self.poll_script.lock().unwrap().push_back(response);
    }

    pub fn scheduled(&self) -> Vec<BuildRequest> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<BuildHandle> {
        self.polled.lock().unwrap().clone()
    }
}

impl BuildService for FakeBuildService {
    fn schedule_build<'a>(
        &'a self,
        request: &'a BuildRequest,
    ) -> BoxFuture<'a, Result<BuildHandle, ServiceError>> {
        Box::pin(async move {
            let n = {
                let mut scheduled = self.scheduled.lock().unwrap();
                scheduled.push(request.clone());
                scheduled.len()
            };
            self.schedule_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(BuildHandle {
                        id: format!("build-{n}"),
                        url: Some(format!("https://ci.example/b/build-{n}")),
                    })
                })
        })
    }

    fn poll_build<'a>(
        &'a self,
        handle: &'a BuildHandle,
    ) -> BoxFuture<'a, Result<BuildStatus, ServiceError>> {
        Box::pin(async move {
            self.polled.lock().unwrap().push(handle.clone());
            self.poll_script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(BuildStatus {
                    id: Some(handle.id.clone()),
                    status: BuildState::Started,
                    result: None,
                    result_details_json: None,
                    url: handle.url.clone(),
                })
            })
        })
    }
}

/// Build service that takes `delay` to answer a schedule request and then
/// delegates to a [`FakeBuildService`].
#[derive(Debug)]
pub struct SlowBuildService {
    inner: Arc<FakeBuildService>,
    delay: Duration,
}

impl SlowBuildService {
    pub fn new(inner: Arc<FakeBuildService>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl BuildService for SlowBuildService {
    fn schedule_build<'a>(
        &'a self,
        request: &'a BuildRequest,
    ) -> BoxFuture<'a, Result<BuildHandle, ServiceError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.schedule_build(request).await
        })
    }

    fn poll_build<'a>(
        &'a self,
        handle: &'a BuildHandle,
    ) -> BoxFuture<'a, Result<BuildStatus, ServiceError>> {
        self.inner.poll_build(handle)
    }
}

/// Build service whose every call fails with a request error.
#[derive(Debug, Default)]
pub struct FailingBuildService;

impl BuildService for FailingBuildService {
    fn schedule_build<'a>(
        &'a self,
        _request: &'a BuildRequest,
    ) -> BoxFuture<'a, Result<BuildHandle, ServiceError>> {
        Box::pin(async {
            Err(ServiceError::Request {
                service: "build",
                message: "connection refused".to_string(),
            })
        })
    }

    fn poll_build<'a>(
        &'a self,
        _handle: &'a BuildHandle,
    ) -> BoxFuture<'a, Result<BuildStatus, ServiceError>> {
        Box::pin(async {
            Err(ServiceError::Request {
                service: "build",
                message: "connection refused".to_string(),
            })
        })
    }
}

/// Test-execution service with scripted poll results that records every
/// call. An exhausted poll script reports the run as still pending.
#[derive(Debug, Default)]
pub struct FakeTestService {
    poll_script: Mutex<VecDeque<Result<RunResult, ServiceError>>>,
    scheduled: Mutex<Vec<(String, RunRequest)>>,
    polled: Mutex<Vec<RunHandle>>,
}

impl FakeTestService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_poll(&self, response: Result<RunResult, ServiceError>) {
        self.poll_script.lock().unwrap().push_back(response);
    }

    pub fn scheduled(&self) -> Vec<(String, RunRequest)> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<RunHandle> {
        self.polled.lock().unwrap().clone()
    }
}

impl TestService for FakeTestService {
    fn schedule_run<'a>(
        &'a self,
        server: &'a str,
        request: &'a RunRequest,
    ) -> BoxFuture<'a, Result<RunHandle, ServiceError>> {
        Box::pin(async move {
            let mut scheduled = self.scheduled.lock().unwrap();
            scheduled.push((server.to_string(), request.clone()));
            Ok(RunHandle {
                server: server.to_string(),
                task_id: format!("swarm-{}", scheduled.len()),
            })
        })
    }

    fn poll_run<'a>(&'a self, handle: &'a RunHandle) -> BoxFuture<'a, Result<RunResult, ServiceError>> {
        Box::pin(async move {
            self.polled.lock().unwrap().push(handle.clone());
            self.poll_script.lock().unwrap().pop_front().unwrap_or(Ok(RunResult {
                state: RunState::Pending,
                bot_id: None,
                failure: false,
                outputs_ref: None,
                cas_output_root: None,
            }))
        })
    }
}
