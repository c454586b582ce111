//! Submission and polling controller.
//!
//! Owns the lifecycle of a single job:
//! select → submit → (completed | processing → poll → completed | error)
//!
//! At most one polling timer exists. It belongs to the Pending Job Handle and is
//! stopped whenever that handle is dropped: on completion, on server failure, on
//! a superseding submission and on reset.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::client::{SelectedInput, StatusResponse, SubmitResponse, SummaryApi, SummaryClient};
use super::status::{JobResult, JobStatus, RuntimeStatus, Summary};
use crate::config::Config;
use crate::validation::{validate, validate_url, AudioFile, ValidationError, ValidationRules};

/// Reasons a submission is refused before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("No valid input selected")]
    NothingSelected,
    #[error("A submission is already in progress")]
    Busy,
}

/// Status-query address of the asynchronous job currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJob {
    pub status_uri: String,
    /// Submission that produced this handle.
    pub generation: u64,
}

struct Pending {
    job: PendingJob,
    _timer: PollTimer,
}

/// Live polling task. Dropping it aborts the task and releases its lease.
struct PollTimer {
    task: JoinHandle<()>,
    _lease: PollLease,
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct PollLease(Arc<AtomicUsize>);

impl PollLease {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for PollLease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ControllerState {
    result: JobResult,
    selected: Option<SelectedInput>,
    input_error: Option<String>,
    generation: u64,
    pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollStep {
    Continue,
    Stop,
}

struct Shared {
    api: Arc<dyn SummaryApi>,
    rules: ValidationRules,
    poll_interval: Duration,
    state: Mutex<ControllerState>,
    updates: watch::Sender<JobResult>,
    active_polls: Arc<AtomicUsize>,
}

impl Shared {
    fn publish(&self, state: &mut ControllerState, result: JobResult) {
        if state.result.status != result.status {
            info!(
                "Job status: {} -> {}",
                state.result.status.as_str(),
                result.status.as_str()
            );
        }
        state.result = result.clone();
        self.updates.send_replace(result);
    }

    /// Drop the Pending Job Handle (stopping its timer) and publish a terminal result.
    fn finish(&self, state: &mut ControllerState, result: JobResult) {
        state.pending = None;
        self.publish(state, result);
    }

    async fn apply_status(&self, job: &PendingJob, response: StatusResponse) -> PollStep {
        let mut state = self.state.lock().await;

        let current = state.pending.as_ref().map(|p| &p.job);
        if current != Some(job) {
            debug!("Ignoring status for superseded job {}", job.status_uri);
            return PollStep::Stop;
        }

        match &response.runtime_status {
            RuntimeStatus::Completed => {
                let summary = Summary::from_output(response.output.as_ref());
                info!(
                    "Job completed: {} chars of summary, {} action item(s)",
                    summary.summary.len(),
                    summary.action_items.len()
                );
                self.finish(&mut state, JobResult::completed(summary));
                PollStep::Stop
            }
            failure if failure.is_failure() => {
                let message = match response.failure_detail() {
                    Some(detail) => format!(
                        "Job failed on server (runtime status: {failure}): {detail}"
                    ),
                    None => format!("Job failed on server (runtime status: {failure})"),
                };
                error!("{}", message);
                self.finish(&mut state, JobResult::failed(message));
                PollStep::Stop
            }
            other => {
                debug!("Job {} is {}", job.status_uri, other);
                PollStep::Continue
            }
        }
    }

    async fn is_current(&self, job: &PendingJob) -> bool {
        let state = self.state.lock().await;
        state.pending.as_ref().map(|p| &p.job) == Some(job)
    }
}

/// Query the job's status address every `period` until a terminal run-state,
/// until the job is superseded, or until the controller goes away.
async fn poll_job(shared: Weak<Shared>, job: PendingJob, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(shared) = shared.upgrade() else {
            break;
        };

        let step = match shared.api.query_status(&job.status_uri).await {
            Ok(response) => shared.apply_status(&job, response).await,
            Err(err) => {
                warn!("Status query for {} failed: {}", job.status_uri, err);
                if shared.is_current(&job).await {
                    PollStep::Continue
                } else {
                    PollStep::Stop
                }
            }
        };

        if step == PollStep::Stop {
            break;
        }
    }
}

/// Shortest period a polling timer may run with.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Drives one job at a time against a [`SummaryApi`].
#[derive(Clone)]
pub struct JobController {
    shared: Arc<Shared>,
}

impl JobController {
    /// `poll_interval` below [`MIN_POLL_INTERVAL`] is raised to it.
    pub fn new(api: Arc<dyn SummaryApi>, rules: ValidationRules, poll_interval: Duration) -> Self {
        let poll_interval = if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {:?} is too short, using {:?}",
                poll_interval, MIN_POLL_INTERVAL
            );
            MIN_POLL_INTERVAL
        } else {
            poll_interval
        };
        let (updates, _) = watch::channel(JobResult::idle());
        Self {
            shared: Arc::new(Shared {
                api,
                rules,
                poll_interval,
                state: Mutex::new(ControllerState::default()),
                updates,
                active_polls: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Controller backed by the HTTP client described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(SummaryClient::from_config(&config.api)),
            config.validation.clone(),
            config.api.poll_interval(),
        )
    }

    /// Validate and select an audio file for the next submission.
    pub async fn select_file(&self, file: AudioFile) -> Result<(), ValidationError> {
        let outcome = validate(&file, &self.shared.rules);
        self.select(SelectedInput::File(file), outcome).await
    }

    /// Validate and select a media URL for the next submission.
    pub async fn select_url(&self, url: &str) -> Result<(), ValidationError> {
        let url = url.trim();
        let outcome = validate_url(url);
        self.select(SelectedInput::Url(url.to_string()), outcome)
            .await
    }

    async fn select(
        &self,
        input: SelectedInput,
        outcome: Result<(), ValidationError>,
    ) -> Result<(), ValidationError> {
        let mut state = self.shared.state.lock().await;
        match outcome {
            Ok(()) => {
                debug!("Selected {}", input);
                state.selected = Some(input);
                state.input_error = None;
                if state.result.status.is_terminal() {
                    self.shared.publish(&mut state, JobResult::idle());
                }
                Ok(())
            }
            Err(err) => {
                warn!("Rejected {}: {}", input, err);
                state.selected = None;
                state.input_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Submit the selected input and return the status reached once the
    /// submission response has been handled.
    pub async fn submit(&self) -> Result<JobStatus, SubmitRejected> {
        let (input, generation) = {
            let mut state = self.shared.state.lock().await;
            if state.result.status == JobStatus::Loading {
                return Err(SubmitRejected::Busy);
            }
            let input = state
                .selected
                .clone()
                .ok_or(SubmitRejected::NothingSelected)?;

            state.generation += 1;
            if let Some(previous) = state.pending.take() {
                info!("Superseding job {}", previous.job.status_uri);
            }
            self.shared.publish(&mut state, JobResult::loading());
            (input, state.generation)
        };

        info!("Submitting {}", input);
        let outcome = self.shared.api.submit(&input).await;

        let mut state = self.shared.state.lock().await;
        if state.generation != generation {
            debug!("Discarding stale submission response #{}", generation);
            return Ok(state.result.status);
        }

        match outcome {
            Ok(SubmitResponse::Accepted {
                status_query_get_uri,
            }) => {
                info!("Job accepted, polling {}", status_query_get_uri);
                let job = PendingJob {
                    status_uri: status_query_get_uri,
                    generation,
                };
                let timer = self.start_polling(job.clone());
                state.pending = Some(Pending { job, _timer: timer });
                self.shared.publish(&mut state, JobResult::processing());
            }
            Ok(SubmitResponse::Completed(summary)) => {
                self.shared
                    .publish(&mut state, JobResult::completed(summary));
            }
            Err(err) => {
                error!("Submission failed: {}", err);
                self.shared
                    .publish(&mut state, JobResult::failed(err.to_string()));
            }
        }

        Ok(state.result.status)
    }

    /// Abandon the current job and return to idle. The selected input is kept.
    pub async fn reset(&self) {
        let mut state = self.shared.state.lock().await;
        state.generation += 1;
        state.pending = None;
        self.shared.publish(&mut state, JobResult::idle());
    }

    fn start_polling(&self, job: PendingJob) -> PollTimer {
        let lease = PollLease::acquire(&self.shared.active_polls);
        let task = tokio::spawn(poll_job(
            Arc::downgrade(&self.shared),
            job,
            self.shared.poll_interval,
        ));
        PollTimer {
            task,
            _lease: lease,
        }
    }

    pub async fn snapshot(&self) -> JobResult {
        self.shared.state.lock().await.result.clone()
    }

    /// Receiver that observes every published [`JobResult`].
    pub fn subscribe(&self) -> watch::Receiver<JobResult> {
        self.shared.updates.subscribe()
    }

    pub async fn selected(&self) -> Option<SelectedInput> {
        self.shared.state.lock().await.selected.clone()
    }

    /// Message from the last rejected selection, if any.
    pub async fn input_error(&self) -> Option<String> {
        self.shared.state.lock().await.input_error.clone()
    }

    pub async fn pending_job(&self) -> Option<PendingJob> {
        self.shared
            .state
            .lock()
            .await
            .pending
            .as_ref()
            .map(|p| p.job.clone())
    }

    /// Number of live polling timers.
    pub fn active_polls(&self) -> usize {
        self.shared.active_polls.load(Ordering::SeqCst)
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::client::ApiError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use tokio::sync::Notify;

    const MIB: u64 = 1024 * 1024;
    const INTERVAL: Duration = Duration::from_millis(500);

    #[derive(Default)]
    struct ScriptedApi {
        submits: std::sync::Mutex<VecDeque<Result<SubmitResponse, ApiError>>>,
        statuses: std::sync::Mutex<VecDeque<Result<StatusResponse, ApiError>>>,
        submit_calls: AtomicUsize,
        status_calls: std::sync::Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
        status_gate: Option<Arc<Notify>>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self::default()
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn with_status_gate(mut self, gate: Arc<Notify>) -> Self {
            self.status_gate = Some(gate);
            self
        }

        fn on_submit(self, response: Result<SubmitResponse, ApiError>) -> Self {
            self.submits.lock().unwrap().push_back(response);
            self
        }

        fn on_status(self, response: Result<StatusResponse, ApiError>) -> Self {
            self.statuses.lock().unwrap().push_back(response);
            self
        }

        fn status_calls(&self) -> usize {
            self.status_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SummaryApi for ScriptedApi {
        async fn submit(&self, _input: &SelectedInput) -> Result<SubmitResponse, ApiError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ApiError::EmptyResponse))
        }

        async fn query_status(&self, status_uri: &str) -> Result<StatusResponse, ApiError> {
            self.status_calls.lock().unwrap().push(status_uri.to_string());
            if let Some(gate) = &self.status_gate {
                gate.notified().await;
            }
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status("Running", None)))
        }
    }

    fn status(runtime: &str, output: Option<serde_json::Value>) -> StatusResponse {
        StatusResponse {
            runtime_status: RuntimeStatus::parse(runtime),
            output,
            instance_id: None,
            last_updated_time: None,
        }
    }

    fn accepted(uri: &str) -> Result<SubmitResponse, ApiError> {
        Ok(SubmitResponse::Accepted {
            status_query_get_uri: uri.to_string(),
        })
    }

    fn audio(name: &str, size: u64) -> AudioFile {
        AudioFile {
            path: PathBuf::from(format!("/tmp/{name}")),
            file_name: name.to_string(),
            size,
            content_type: "audio/mpeg".to_string(),
        }
    }

    fn controller(api: Arc<ScriptedApi>) -> JobController {
        JobController::new(api, ValidationRules::default(), INTERVAL)
    }

    async fn wait_terminal(controller: &JobController) -> JobResult {
        let mut rx = controller.subscribe();
        let result = rx
            .wait_for(|r| r.status.is_terminal())
            .await
            .unwrap()
            .clone();
        result
    }

    #[tokio::test]
    async fn test_submit_without_selection_is_rejected() {
        let api = Arc::new(ScriptedApi::new());
        let controller = controller(api.clone());

        assert_eq!(controller.submit().await, Err(SubmitRejected::NothingSelected));
        assert_eq!(controller.snapshot().await.status, JobStatus::Idle);
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_on_select() {
        let api = Arc::new(ScriptedApi::new());
        let controller = controller(api.clone());

        let err = controller
            .select_file(audio("long.mp3", 60 * MIB))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert!(snapshot.error.is_none());
        assert!(controller.input_error().await.unwrap().contains("too large"));
        assert!(controller.selected().await.is_none());

        assert_eq!(controller.submit().await, Err(SubmitRejected::NothingSelected));
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sync_response_completes() {
        let api = Arc::new(ScriptedApi::new().on_submit(Ok(SubmitResponse::Completed(
            Summary::new("S", vec!["A".into(), "B".into()]),
        ))));
        let controller = controller(api.clone());
        let mut rx = controller.subscribe();

        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        assert_eq!(controller.submit().await, Ok(JobStatus::Completed));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.summary, "S");
        assert_eq!(snapshot.action_items, vec!["A", "B"]);
        assert!(controller.pending_job().await.is_none());
        assert_eq!(controller.active_polls(), 0);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_submission_enters_loading() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(ScriptedApi::gated(gate.clone()).on_submit(accepted("http://s/1")));
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit().await }
        });

        let mut rx = controller.subscribe();
        rx.wait_for(|r| r.status == JobStatus::Loading).await.unwrap();
        assert_eq!(controller.submit().await, Err(SubmitRejected::Busy));

        gate.notify_one();
        assert_eq!(task.await.unwrap(), Ok(JobStatus::Processing));
        controller.reset().await;
    }

    #[tokio::test]
    async fn test_submission_failure_is_terminal() {
        let api = Arc::new(ScriptedApi::new().on_submit(Err(ApiError::Status {
            context: "Failed to process audio",
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        })));
        let controller = controller(api);
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();

        assert_eq!(controller.submit().await, Ok(JobStatus::Error));
        let snapshot = controller.snapshot().await;
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Failed to process audio (500 Internal Server Error)")
        );
        assert_eq!(controller.active_polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_job_polls_until_completed() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_status(Ok(status("Running", None)))
                .on_status(Ok(status(
                    "Completed",
                    Some(json!("{\"summary\":\"S\",\"action_items\":[\"A\",\"B\"]}")),
                ))),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();

        assert_eq!(controller.submit().await, Ok(JobStatus::Processing));
        assert_eq!(
            controller.pending_job().await.map(|p| p.status_uri),
            Some("http://s/job-1".to_string())
        );
        assert_eq!(controller.active_polls(), 1);

        let result = wait_terminal(&controller).await;
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.summary, "S");
        assert_eq!(result.action_items, vec!["A", "B"]);
        assert_eq!(api.status_calls(), 2);
        assert!(controller.pending_job().await.is_none());
        assert_eq!(controller.active_polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_keeps_processing() {
        let api = Arc::new(ScriptedApi::new().on_submit(accepted("http://s/job-1")));
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();

        tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;

        assert_eq!(api.status_calls(), 3);
        assert_eq!(controller.snapshot().await.status, JobStatus::Processing);
        assert_eq!(controller.active_polls(), 1);
        controller.reset().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_output_defaults_action_items() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_status(Ok(status("Running", None)))
                .on_status(Ok(status("Running", None)))
                .on_status(Ok(status("Running", None)))
                .on_status(Ok(status(
                    "Completed",
                    Some(json!("{\"summary\":\"Weekly sync\"}")),
                ))),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();

        let result = wait_terminal(&controller).await;
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.summary, "Weekly sync");
        assert!(result.action_items.is_empty());
        assert_eq!(api.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_query_failure_keeps_polling() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_status(Err(ApiError::Status {
                    context: "Failed to get job status",
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: String::new(),
                }))
                .on_status(Ok(status("Completed", Some(json!({"summary": "S"}))))),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();

        let result = wait_terminal(&controller).await;
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_failure_maps_to_error() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_status(Ok(status("Failed", Some(json!("transcription timed out"))))),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();

        let result = wait_terminal(&controller).await;
        assert_eq!(result.status, JobStatus::Error);
        let message = result.error.unwrap();
        assert!(message.contains("Failed"), "{message}");
        assert!(message.contains("transcription timed out"), "{message}");
        assert_eq!(controller.active_polls(), 0);

        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submission_replaces_poll_timer() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_submit(accepted("http://s/job-2")),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("one.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();
        assert_eq!(controller.active_polls(), 1);

        controller.select_file(audio("two.mp3", 2048)).await.unwrap();
        assert_eq!(controller.submit().await, Ok(JobStatus::Processing));
        assert_eq!(controller.active_polls(), 1);
        assert_eq!(
            controller.pending_job().await.map(|p| p.status_uri),
            Some("http://s/job-2".to_string())
        );

        tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
        let calls = api.status_calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["http://s/job-2", "http://s/job-2"]);
        controller.reset().await;
        assert_eq!(controller.active_polls(), 0);
    }

    #[tokio::test]
    async fn test_stale_submission_response_is_ignored() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(ScriptedApi::gated(gate.clone()).on_submit(accepted("http://s/old")));
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit().await }
        });
        let mut rx = controller.subscribe();
        rx.wait_for(|r| r.status == JobStatus::Loading).await.unwrap();

        controller.reset().await;
        gate.notify_one();

        assert_eq!(task.await.unwrap(), Ok(JobStatus::Idle));
        assert!(controller.pending_job().await.is_none());
        assert_eq!(controller.active_polls(), 0);
    }

    #[tokio::test]
    async fn test_valid_selection_after_error_returns_to_idle() {
        let api = Arc::new(ScriptedApi::new().on_submit(Err(ApiError::EmptyResponse)));
        let controller = controller(api);
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();
        assert_eq!(controller.snapshot().await.status, JobStatus::Error);

        controller.select_file(audio("bad.txt", 10)).await.unwrap_err();
        assert_eq!(controller.snapshot().await.status, JobStatus::Error);

        controller.select_file(audio("ep2.mp3", 10)).await.unwrap();
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert!(snapshot.error.is_none());
        assert!(controller.input_error().await.is_none());
    }

    #[tokio::test]
    async fn test_select_url() {
        let api = Arc::new(ScriptedApi::new());
        let controller = controller(api);
        controller
            .select_url(" https://www.youtube.com/watch?v=abc ")
            .await
            .unwrap();
        assert_eq!(
            controller.selected().await,
            Some(SelectedInput::Url(
                "https://www.youtube.com/watch?v=abc".to_string()
            ))
        );
        assert!(controller.select_url("nope").await.is_err());
        assert!(controller.selected().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_is_raised() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_status(Ok(status("Completed", Some(json!({"summary": "S"}))))),
        );
        let controller =
            JobController::new(api.clone(), ValidationRules::default(), Duration::ZERO);
        assert_eq!(controller.poll_interval(), MIN_POLL_INTERVAL);

        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        assert_eq!(controller.submit().await, Ok(JobStatus::Processing));

        let result = wait_terminal(&controller).await;
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.summary, "S");
        assert_eq!(controller.active_polls(), 0);
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_status_query_stays_idle() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(
            ScriptedApi::new()
                .with_status_gate(gate.clone())
                .on_submit(accepted("http://s/job-1"))
                .on_status(Ok(status("Completed", Some(json!({"summary": "late"}))))),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();

        tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
        assert_eq!(api.status_calls(), 1);

        controller.reset().await;
        gate.notify_one();
        tokio::time::sleep(INTERVAL * 3).await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert!(snapshot.summary.is_empty());
        assert_eq!(api.status_calls(), 1);
        assert_eq!(controller.active_polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_for_superseded_job_is_ignored() {
        let api = Arc::new(
            ScriptedApi::new()
                .on_submit(accepted("http://s/job-1"))
                .on_submit(accepted("http://s/job-2")),
        );
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();
        let first = controller.pending_job().await.unwrap();

        controller.submit().await.unwrap();
        let step = controller
            .shared
            .apply_status(&first, status("Completed", Some(json!({"summary": "old"}))))
            .await;
        assert_eq!(step, PollStep::Stop);
        assert_eq!(controller.snapshot().await.status, JobStatus::Processing);
        assert_eq!(
            controller.pending_job().await.map(|p| p.status_uri),
            Some("http://s/job-2".to_string())
        );

        controller.reset().await;
        let step = controller
            .shared
            .apply_status(&first, status("Failed", Some(json!("boom"))))
            .await;
        assert_eq!(step, PollStep::Stop);
        assert_eq!(controller.snapshot().await.status, JobStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_stops_polling() {
        let api = Arc::new(ScriptedApi::new().on_submit(accepted("http://s/job-1")));
        let controller = controller(api.clone());
        controller.select_file(audio("ep.mp3", 1024)).await.unwrap();
        controller.submit().await.unwrap();
        drop(controller);

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(api.status_calls(), 0);
    }
}
