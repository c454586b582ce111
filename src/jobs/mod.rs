//! Audio summarization jobs: the remote API, the status model and the
//! controller that ties them together.

pub mod client;
pub mod controller;
pub mod status;

pub use client::{ApiError, SelectedInput, StatusResponse, SubmitResponse, SummaryApi, SummaryClient};
pub use controller::{JobController, PendingJob, SubmitRejected, MIN_POLL_INTERVAL};
pub use status::{JobResult, JobStatus, RuntimeStatus, Summary};
