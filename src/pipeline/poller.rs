//! Bounded status polling for a submitted job.
//!
//! Each attempt sleeps for the configured interval and then asks the provider
//! for the job state. Running out of attempts is not an error: the caller gets
//! `PollOutcome::Waiting` and can resume later with a `check` request, since the
//! provider keeps the job state.
use crate::config::PollSettings;
use crate::error::{AppResult, GenerationError};
use crate::model::{GenerationJob, JobState};
use crate::provider::GenerationProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded { result_url: String },
    Failed { message: String },
    Waiting,
}

pub async fn poll(
    provider: &dyn GenerationProvider,
    api_key: &str,
    job: &mut GenerationJob,
    settings: PollSettings,
) -> AppResult<PollOutcome> {
    for attempt in 1..=settings.max_attempts {
        tokio::time::sleep(settings.interval).await;

        let status = match provider.task_status(api_key, &job.task_id).await {
            Ok(status) => status,
            Err(err @ (GenerationError::CredentialRejected | GenerationError::InsufficientBalance)) => {
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(task_id = %job.task_id, attempt, error = %err, "status check failed");
                job.state = JobState::Waiting;
                continue;
            }
        };

        job.state = status.state;
        match status.state {
            JobState::Success => match status.result_url {
                Some(url) => {
                    tracing::info!(task_id = %job.task_id, attempt, "generation succeeded");
                    job.result_url = Some(url.clone());
                    return Ok(PollOutcome::Succeeded { result_url: url });
                }
                None => {
                    // Reported done before the result URL is visible; keep asking.
                    tracing::warn!(task_id = %job.task_id, attempt, "success without result url");
                    job.state = JobState::Waiting;
                }
            },
            JobState::Fail => {
                let message = status
                    .fail_message
                    .unwrap_or_else(|| "provider reported failure".to_string());
                tracing::warn!(task_id = %job.task_id, attempt, %message, "generation failed");
                return Ok(PollOutcome::Failed { message });
            }
            JobState::Pending | JobState::Waiting => {
                tracing::debug!(task_id = %job.task_id, attempt, "generation still running");
            }
        }
    }

    tracing::info!(
        task_id = %job.task_id,
        attempts = settings.max_attempts,
        "poll budget exhausted, returning waiting"
    );
    job.state = JobState::Waiting;
    Ok(PollOutcome::Waiting)
}
