//! Long running operation polling.
//!
//! The platform answers slow requests with `202 Accepted`, a `Location` header
//! pointing at an operation resource and an optional `Retry-After` (seconds).
//! We sleep, poll the location with the same token and stop once the
//! operation is done or the [`LroPolicy`] bound is exceeded.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::Instant;

use common::config::LroPolicy;
use common::errors::{AppError, AppResult};
use common::models::{OperationState, OperationStatus};

use crate::http::FabricHttp;
use crate::transport::PlatformResponse;

const ACCEPTED: u16 = 202;

/// Polls operation locations on behalf of one caller.
pub struct LroPoller<'a> {
    http: &'a FabricHttp,
    policy: &'a LroPolicy,
}

impl<'a> LroPoller<'a> {
    pub fn new(http: &'a FabricHttp, policy: &'a LroPolicy) -> Self {
        Self { http, policy }
    }

    /// Waits until the operation behind `response` completes and parses the
    /// final body as `T`.
    ///
    /// A response other than 202 is already final and is parsed immediately.
    /// The location is polled again while it keeps answering 202; the first
    /// success is parsed, anything else is an upstream error.
    pub async fn wait_for_operation_completion<T: DeserializeOwned>(
        &self,
        token: &str,
        response: PlatformResponse,
    ) -> AppResult<T> {
        if response.status != ACCEPTED {
            return response.json();
        }
        let location = operation_location(&response)?;
        let mut interval = self.retry_after(&response);
        let mut clock = PollClock::start(self.policy);

        loop {
            clock.tick(interval).await?;
            let polled = self.http.get(&location, token).await?;
            if polled.status == ACCEPTED {
                interval = parse_retry_after(&polled).unwrap_or(interval);
                continue;
            }
            return polled.error_for_status()?.json();
        }
    }

    /// Like [`wait_for_operation_completion`](Self::wait_for_operation_completion),
    /// but also keeps polling while the operation reports `NotStarted` or
    /// `Running`. Returns the terminal status.
    ///
    /// A response other than 202 means the work finished synchronously and
    /// yields `Succeeded`.
    pub async fn wait_for_operation(
        &self,
        token: &str,
        response: PlatformResponse,
    ) -> AppResult<OperationStatus> {
        if response.status != ACCEPTED {
            response.error_for_status()?;
            return Ok(OperationStatus {
                status: OperationState::Succeeded,
                percent_complete: Some(100),
                ..Default::default()
            });
        }
        let location = operation_location(&response)?;
        let mut interval = self.retry_after(&response);
        let mut clock = PollClock::start(self.policy);

        loop {
            clock.tick(interval).await?;
            let polled = self.http.get(&location, token).await?;
            interval = parse_retry_after(&polled).unwrap_or(interval);
            if polled.status == ACCEPTED {
                continue;
            }
            let status: OperationStatus = polled.error_for_status()?.json()?;
            if status.status.is_pending() {
                tracing::debug!(
                    state = %status.status,
                    percent = status.percent_complete.unwrap_or_default(),
                    "operation still running"
                );
                continue;
            }
            return Ok(status);
        }
    }

    /// Finishes an item create that may have been accepted as a long running
    /// operation.
    ///
    /// A synchronous answer carries the item itself. The operation resource of
    /// an accepted create only reports a status, so once it succeeds the item
    /// is read back through `lookup`.
    pub async fn wait_for_created<T, F, Fut>(
        &self,
        token: &str,
        response: PlatformResponse,
        item_name: &str,
        lookup: F,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Option<T>>>,
    {
        if response.status != ACCEPTED {
            return response.error_for_status()?.json();
        }
        let operation = self.wait_for_operation(token, response).await?;
        ensure_succeeded(operation, item_name)?;
        lookup()
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{item_name} after its creation succeeded")))
    }

    fn retry_after(&self, response: &PlatformResponse) -> Duration {
        parse_retry_after(response).unwrap_or(self.policy.default_retry_after)
    }
}

/// Maps a terminal operation that did not succeed to `OperationFailed`.
pub fn ensure_succeeded(operation: OperationStatus, item_name: &str) -> AppResult<()> {
    if operation.status == OperationState::Succeeded {
        return Ok(());
    }
    Err(AppError::OperationFailed {
        status: operation.status.to_string(),
        message: operation
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("creating {item_name} did not succeed")),
    })
}

/// Tracks attempts and elapsed time against the policy.
struct PollClock<'a> {
    policy: &'a LroPolicy,
    started: Instant,
    attempts: u32,
}

impl<'a> PollClock<'a> {
    fn start(policy: &'a LroPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Sleeps for `interval` unless the next poll would break the bound.
    async fn tick(&mut self, interval: Duration) -> AppResult<()> {
        let elapsed = self.started.elapsed();
        if self.attempts >= self.policy.max_attempts || elapsed + interval > self.policy.timeout {
            tracing::warn!(
                attempts = self.attempts,
                elapsed_secs = elapsed.as_secs(),
                "operation polling bound exceeded"
            );
            return Err(AppError::OperationTimeout {
                attempts: self.attempts,
                elapsed_secs: elapsed.as_secs(),
            });
        }
        tokio::time::sleep(interval).await;
        self.attempts += 1;
        Ok(())
    }
}

fn operation_location(response: &PlatformResponse) -> AppResult<String> {
    response
        .header("location")
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingOperationLocation)
}

/// `Retry-After` in whole seconds; anything else is ignored.
fn parse_retry_after(response: &PlatformResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::models::KqlDatabase;

    use crate::testing::ScriptedTransport;

    fn policy() -> LroPolicy {
        LroPolicy::default()
    }

    fn accepted(location: &str) -> PlatformResponse {
        PlatformResponse::new(202, "").with_header("Location", location)
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_accepted_response_returns_without_waiting() {
        let transport = Arc::new(ScriptedTransport::default());
        let http = FabricHttp::new(transport.clone());
        let policy = policy();
        let started = Instant::now();

        let db: KqlDatabase = LroPoller::new(&http, &policy)
            .wait_for_operation_completion(
                "t",
                PlatformResponse::new(201, r#"{"id":"db-1","displayName":"Investments"}"#),
            )
            .await
            .unwrap();

        assert_eq!(db.id, "db-1");
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_after_retry_after_interval() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            200,
            r#"{"status":"Succeeded"}"#,
        )]));
        let http = FabricHttp::new(transport.clone());
        let policy = policy();
        let started = Instant::now();

        let status: OperationStatus = LroPoller::new(&http, &policy)
            .wait_for_operation_completion(
                "tok",
                accepted("https://api/v1/operations/1").with_header("Retry-After", "5"),
            )
            .await
            .unwrap();

        assert_eq!(status.status, OperationState::Succeeded);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://api/v1/operations/1");
        assert_eq!(requests[0].token.as_deref(), Some("tok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_or_bad_retry_after_defaults_to_thirty_seconds() {
        for response in [
            accepted("https://api/v1/operations/1"),
            accepted("https://api/v1/operations/1").with_header("Retry-After", "soon"),
        ] {
            let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
                200,
                r#"{"status":"Succeeded"}"#,
            )]));
            let http = FabricHttp::new(transport);
            let policy = policy();
            let started = Instant::now();

            let _: OperationStatus = LroPoller::new(&http, &policy)
                .wait_for_operation_completion("t", response)
                .await
                .unwrap();

            assert_eq!(started.elapsed(), Duration::from_secs(30));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_without_location_fails_fast() {
        let http = FabricHttp::new(Arc::new(ScriptedTransport::default()));
        let policy = policy();
        let err = LroPoller::new(&http, &policy)
            .wait_for_operation_completion::<OperationStatus>("t", PlatformResponse::new(202, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingOperationLocation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_surfaces_upstream_body() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            404,
            r#"{"errorCode":"OperationNotFound","message":"gone"}"#,
        )]));
        let http = FabricHttp::new(transport);
        let policy = policy();
        let err = LroPoller::new(&http, &policy)
            .wait_for_operation_completion::<OperationStatus>("t", accepted("https://api/op"))
            .await
            .unwrap_err();
        assert_eq!(err.to_envelope().error, "OperationNotFound");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_operation_keeps_polling_while_running() {
        let transport = Arc::new(ScriptedTransport::with_responses([
            PlatformResponse::new(200, r#"{"status":"NotStarted"}"#),
            PlatformResponse::new(200, r#"{"status":"Running","percentComplete":50}"#)
                .with_header("Retry-After", "2"),
            PlatformResponse::new(200, r#"{"status":"Succeeded","percentComplete":100}"#),
        ]));
        let http = FabricHttp::new(transport.clone());
        let policy = policy();
        let started = Instant::now();

        let status = LroPoller::new(&http, &policy)
            .wait_for_operation("t", accepted("https://api/op").with_header("Retry-After", "1"))
            .await
            .unwrap();

        assert_eq!(status.status, OperationState::Succeeded);
        assert_eq!(transport.requests().len(), 3);
        // 1s, then 1s again (no header), then the 2s announced by the second poll.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_at_max_attempts() {
        let responses = (0..10).map(|_| PlatformResponse::new(200, r#"{"status":"Running"}"#));
        let transport = Arc::new(ScriptedTransport::with_responses(responses));
        let http = FabricHttp::new(transport.clone());
        let policy = LroPolicy {
            default_retry_after: Duration::from_secs(1),
            max_attempts: 3,
            timeout: Duration::from_secs(3600),
        };

        let err = LroPoller::new(&http, &policy)
            .wait_for_operation("t", accepted("https://api/op"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::OperationTimeout { attempts: 3, .. }));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_at_timeout() {
        let responses = (0..10).map(|_| PlatformResponse::new(202, ""));
        let transport = Arc::new(ScriptedTransport::with_responses(responses));
        let http = FabricHttp::new(transport);
        let policy = LroPolicy {
            default_retry_after: Duration::from_secs(30),
            max_attempts: 100,
            timeout: Duration::from_secs(60),
        };

        let err = LroPoller::new(&http, &policy)
            .wait_for_operation_completion::<OperationStatus>("t", accepted("https://api/op"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::OperationTimeout {
                attempts: 2,
                elapsed_secs: 60
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_create_reads_item_back_after_success() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            200,
            r#"{"status":"Succeeded","percentComplete":100}"#,
        )]));
        let http = FabricHttp::new(transport.clone());
        let policy = policy();

        let db: KqlDatabase = LroPoller::new(&http, &policy)
            .wait_for_created(
                "t",
                accepted("https://api/op").with_header("Retry-After", "1"),
                "Investments",
                || async { Ok(serde_json::from_str(r#"{"id":"db-7","displayName":"Investments"}"#).ok()) },
            )
            .await
            .unwrap();

        assert_eq!(db.id, "db-7");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_create_that_failed_skips_lookup() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            200,
            r#"{"status":"Failed","error":{"errorCode":"Quota","message":"capacity exhausted"}}"#,
        )]));
        let http = FabricHttp::new(transport);
        let policy = policy();

        let err = LroPoller::new(&http, &policy)
            .wait_for_created::<KqlDatabase, _, _>("t", accepted("https://api/op"), "Investments", || async {
                Err(AppError::NotFound("looked up a failed create".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::OperationFailed { ref message, .. } if message == "capacity exhausted"));
    }
}
