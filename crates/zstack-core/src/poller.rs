//! Async job polling.
//!
//! Operations the management server runs in the background answer with
//! `202 Accepted` and a `location` URL. An [`AsyncHandle`] polls that URL at a
//! fixed interval until the job reaches a terminal state or the deadline passes:
//!
//! | status | meaning                      | state       |
//! |--------|------------------------------|-------------|
//! | 202    | still running                | `Pending`   |
//! | 200    | done, body is the result     | `Succeeded` |
//! | 404    | location no longer available | `Expired`   |
//! | 503    | job failed, body is an error | `Failed`    |
//! | other  | protocol violation           | `Failed`    |
//!
//! The deadline is checked after every wait and before every request, and the
//! in-flight request races it, so a job that completes in the same instant the
//! deadline passes is reported as timed out.

use crate::error::{describe_failure, PollError};
use crate::session::Session;
use crate::types::AsyncEnvelope;
use crate::{Error, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// Roughly 30 years, used when `now + timeout` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// State of an async job as seen by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Job still running
    Pending,
    /// Job finished and its result was decoded
    Succeeded,
    /// Job failed, or its result could not be decoded
    Failed,
    /// Location no longer exists
    Expired,
    /// Deadline elapsed first
    TimedOut,
}

impl PollState {
    /// State implied by a poll response status.
    ///
    /// A 200 whose body fails to decode is later demoted to `Failed`.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::ACCEPTED => Self::Pending,
            StatusCode::OK => Self::Succeeded,
            StatusCode::NOT_FOUND => Self::Expired,
            _ => Self::Failed,
        }
    }

    /// Returns true for every state except `Pending`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Handle to a job accepted by the server.
///
/// Built only from a `202 Accepted` response and consumed by
/// [`resolve`](Self::resolve).
#[derive(Debug)]
pub struct AsyncHandle<'a> {
    session: &'a Session,
    location: Url,
    interval: Duration,
}

impl<'a> AsyncHandle<'a> {
    /// Build a handle from a `202 Accepted` response.
    ///
    /// The poll interval defaults to the session's configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAsyncResponse`] if the status is not 202 or the body
    /// does not carry an absolute `location` URL.
    pub async fn from_response(session: &'a Session, response: Response) -> Result<Self> {
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            return Err(Error::InvalidAsyncResponse(format!(
                "can't parse a non-async response (status {}) from {}",
                status.as_u16(),
                response.url()
            )));
        }

        let url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|err| Error::transport("read async response", &url, &err))?;

        let envelope: AsyncEnvelope = serde_json::from_str(&body).map_err(|err| {
            Error::InvalidAsyncResponse(format!("missing location in response from {url}: {err}"))
        })?;

        let location = Url::parse(&envelope.location).map_err(|err| {
            Error::InvalidAsyncResponse(format!(
                "location `{}` is not an absolute URL: {err}",
                envelope.location
            ))
        })?;

        debug!(%location, "job accepted");

        Ok(Self {
            session,
            location,
            interval: session.config().poll_interval(),
        })
    }

    /// Override the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Location being polled.
    #[must_use]
    pub const fn location(&self) -> &Url {
        &self.location
    }

    /// Interval between polls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll the location until the job finishes or `timeout` elapses.
    ///
    /// Returns `Ok(None)` when the job succeeds with an empty body. A timeout
    /// too large to represent, such as `Duration::MAX`, waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Poll`] for every terminal failure (expired, timed out,
    /// server error, unexpected status, undecodable result) and
    /// [`Error::Transport`] if a poll request gets no response.
    pub async fn resolve<T>(self, timeout: Duration) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut ticks: u32 = 0;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(timeout, ticks));
            }
            sleep(self.interval.min(deadline - now)).await;
            if Instant::now() >= deadline {
                return Err(self.timed_out(timeout, ticks));
            }

            ticks += 1;
            match timeout_at(deadline, self.tick::<T>()).await {
                Err(_) => return Err(self.timed_out(timeout, ticks)),
                Ok(Err(err)) => {
                    warn!(location = %self.location, ticks, error = %err, "job did not succeed");
                    return Err(err);
                }
                Ok(Ok((state, result))) if state.is_terminal() => {
                    info!(location = %self.location, ticks, ?state, "job finished");
                    return Ok(result);
                }
                Ok(Ok((state, _))) => {
                    debug!(location = %self.location, ticks, ?state, "job still running");
                }
            }
        }
    }

    async fn tick<T>(&self) -> Result<(PollState, Option<T>)>
    where
        T: DeserializeOwned,
    {
        // The location is pre-authorized, so no Authorization header.
        let response = self
            .session
            .http()
            .get(self.location.clone())
            .send()
            .await
            .map_err(|err| Error::transport("poll", &self.location, &err))?;

        let status = response.status();
        match PollState::from_status(status) {
            PollState::Pending => Ok((PollState::Pending, None)),
            PollState::Succeeded => {
                let body = response
                    .text()
                    .await
                    .map_err(|err| Error::transport("poll", &self.location, &err))?;
                if body.trim().is_empty() {
                    return Ok((PollState::Succeeded, None));
                }
                serde_json::from_str(&body)
                    .map(|value| (PollState::Succeeded, Some(value)))
                    .map_err(|err| {
                        PollError::DecodeFailure {
                            location: self.location.to_string(),
                            message: err.to_string(),
                        }
                        .into()
                    })
            }
            PollState::Expired => Err(PollError::Expired {
                location: self.location.to_string(),
            }
            .into()),
            _ if status == StatusCode::SERVICE_UNAVAILABLE => {
                let body = self.read_body(response).await;
                Err(PollError::ServerError {
                    location: self.location.to_string(),
                    message: describe_failure(status, &body),
                }
                .into())
            }
            _ => {
                let body = self.read_body(response).await;
                Err(PollError::Unexpected {
                    location: self.location.to_string(),
                    status: status.as_u16(),
                    body,
                }
                .into())
            }
        }
    }

    async fn read_body(&self, response: Response) -> String {
        let status = response.status();
        response.text().await.unwrap_or_else(|err| {
            warn!(location = %self.location, status = status.as_u16(), error = %err, "failed to read poll response body");
            String::new()
        })
    }

    fn timed_out(&self, timeout: Duration, ticks: u32) -> Error {
        warn!(location = %self.location, ticks, state = ?PollState::TimedOut, "gave up waiting for job");
        PollError::Timeout {
            location: self.location.to_string(),
            timeout,
        }
        .into()
    }
}
