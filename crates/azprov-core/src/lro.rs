//! Long-running operation handling.
//!
//! Every create-or-update is a `PUT` that the provider answers in one of three ways: with
//! the finished resource, with an operation handle to poll, or with an error.
//! [`ServiceClient::begin_put`] classifies the response into a [`CreateOutcome`];
//! [`CreateOutcome::wait`] then blocks the calling task until the operation reaches a
//! terminal state or the bounded wait of the [`PollPolicy`] elapses.
//!
//! Three polling protocols are understood:
//!
//! - `Azure-AsyncOperation`: the header URL reports `{"status": ..., "error": ...}`.
//! - `Location`: the header URL answers `202` while running and `200`/`201`/`204` when done.
//! - Resource probing: the resource itself is fetched until its
//!   `properties.provisioningState` is terminal.
//!
//! A timeout does not cancel anything remotely; the operation may still finish and a
//! later `get` reconciles the state.

use crate::client::{PollPolicy, ServiceClient};
use crate::error::ArmError;
use crate::types::ASYNC_OPERATION_HEADER;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Status of a long-running operation or of a resource's provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Still running (`InProgress`, `Creating`, `Updating`, `Accepted`, ...)
    InProgress(String),
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Canceled by the provider or another caller
    Canceled,
}

impl OperationStatus {
    /// Parse a provider status string; anything not terminal is in progress.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::InProgress(status.to_string()),
        }
    }

    /// Returns true once the operation will not change any more.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress(_))
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress(state) => f.write_str(state),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Canceled => f.write_str("Canceled"),
        }
    }
}

/// Body served at an `Azure-AsyncOperation` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsyncOperationStatus {
    /// Operation status
    pub status: String,
    /// Error details when the operation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ArmError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningSnapshot {
    #[serde(default)]
    properties: Option<SnapshotProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

fn provisioning_status(bytes: &[u8]) -> Option<OperationStatus> {
    serde_json::from_slice::<ProvisioningSnapshot>(bytes)
        .ok()?
        .properties?
        .provisioning_state
        .map(|state| OperationStatus::parse(&state))
}

/// How a pending operation is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// Poll the `Azure-AsyncOperation` status URL
    AsyncOperation(Url),
    /// Poll the `Location` URL
    Location(Url),
    /// Poll the resource's own `provisioningState`
    Resource,
}

/// Handle to a create-or-update accepted by the provider but not yet finished.
pub struct LongRunningOperation<T> {
    client: ServiceClient,
    resource_path: String,
    target: PollTarget,
    retry_after: Option<Duration>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for LongRunningOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongRunningOperation")
            .field("service", &self.client.service())
            .field("resource_path", &self.resource_path)
            .field("target", &self.target)
            .field("retry_after", &self.retry_after)
            .finish()
    }
}

impl<T> LongRunningOperation<T>
where
    T: DeserializeOwned,
{
    /// Path of the resource being created.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// How completion is observed.
    #[must_use]
    pub const fn target(&self) -> &PollTarget {
        &self.target
    }

    /// Block until the operation completes, then fetch the resulting resource.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` once `policy.max_wait` elapses, `Provider` if the operation
    /// failed or was canceled, or the error of any status request.
    pub async fn wait(mut self, policy: &PollPolicy) -> Result<T> {
        let service = self.client.service();
        let deadline = Instant::now() + policy.max_wait;
        let timed_out = |path: &str| {
            Error::Timeout(format!(
                "{service} operation on `{path}` did not complete within {:?}",
                policy.max_wait
            ))
        };
        let mut polls: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out(&self.resource_path));
            }
            sleep(std::cmp::min(policy.next_delay(self.retry_after), remaining)).await;

            // The status request itself counts against the bounded wait.
            polls += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Ok(status) = timeout(remaining, self.poll()).await else {
                return Err(timed_out(&self.resource_path));
            };
            let status = status?;
            debug!(%service, resource = %self.resource_path, polls, %status, "Polled long-running operation");

            match status {
                OperationStatus::InProgress(_) => continue,
                OperationStatus::Succeeded => break,
                OperationStatus::Failed | OperationStatus::Canceled => {
                    return Err(Error::Provider {
                        code: format!("Operation{status}"),
                        message: format!(
                            "{service} operation on `{}` finished as {status}",
                            self.resource_path
                        ),
                    });
                }
            }
        }

        info!(%service, resource = %self.resource_path, polls, "Long-running operation completed");
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, self.client.get_json(&self.resource_path)).await {
            Ok(resource) => resource,
            Err(_) => Err(timed_out(&self.resource_path)),
        }
    }

    async fn poll(&mut self) -> Result<OperationStatus> {
        match self.target.clone() {
            PollTarget::AsyncOperation(url) => {
                let response = self.client.execute::<()>(Method::GET, url, None).await?;
                self.retry_after = retry_after(response.headers());
                let body: AsyncOperationStatus = self
                    .client
                    .read_json(&self.resource_path, response)
                    .await?;
                let status = OperationStatus::parse(&body.status);
                if status == OperationStatus::Failed {
                    if let Some(error) = body.error {
                        return Err(error.into());
                    }
                }
                Ok(status)
            }
            PollTarget::Location(url) => {
                let response = self.client.execute::<()>(Method::GET, url, None).await?;
                self.retry_after = retry_after(response.headers());
                if response.status() == StatusCode::ACCEPTED {
                    Ok(OperationStatus::InProgress("Accepted".to_string()))
                } else {
                    Ok(OperationStatus::Succeeded)
                }
            }
            PollTarget::Resource => {
                let url = self.client.resource_url(&self.resource_path)?;
                let response = self.client.execute::<()>(Method::GET, url, None).await?;
                self.retry_after = retry_after(response.headers());
                let bytes = response.bytes().await?;
                Ok(provisioning_status(&bytes).unwrap_or(OperationStatus::Succeeded))
            }
        }
    }
}

/// Result of submitting a create-or-update.
#[derive(Debug)]
pub enum CreateOutcome<T> {
    /// The provider returned the finished resource
    Completed(T),
    /// The provider accepted the request and is still working on it
    Pending(LongRunningOperation<T>),
}

impl<T> CreateOutcome<T>
where
    T: DeserializeOwned,
{
    /// Returns true if the operation still has to be awaited.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Await completion with the client's poll policy.
    ///
    /// # Errors
    ///
    /// See [`LongRunningOperation::wait`].
    pub async fn wait(self) -> Result<T> {
        match self {
            Self::Completed(resource) => Ok(resource),
            Self::Pending(operation) => {
                let policy = operation.client.poll_policy();
                operation.wait(&policy).await
            }
        }
    }

    /// Await completion with an explicit poll policy.
    ///
    /// # Errors
    ///
    /// See [`LongRunningOperation::wait`].
    pub async fn wait_with(self, policy: &PollPolicy) -> Result<T> {
        match self {
            Self::Completed(resource) => Ok(resource),
            Self::Pending(operation) => operation.wait(policy).await,
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_url(headers: &HeaderMap, name: &str) -> Option<Url> {
    Url::parse(headers.get(name)?.to_str().ok()?).ok()
}

impl ServiceClient {
    // The bearer token is only ever sent to the management endpoint's origin.
    fn operation_url(&self, headers: &HeaderMap, name: &str) -> Option<Url> {
        let url = header_url(headers, name)?;
        if url.origin() == self.base_url().origin() {
            return Some(url);
        }
        warn!(
            service = %self.service(),
            header = name,
            host = url.host_str().unwrap_or_default(),
            "Ignoring operation URL outside the management endpoint"
        );
        None
    }
}

impl ServiceClient {
    /// Submit a create-or-update and classify the provider's answer.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error if the request is rejected, or `Provider` if
    /// the resource reports a failed provisioning state straight away.
    pub async fn begin_put<B, T>(&self, path: &str, body: &B) -> Result<CreateOutcome<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resource_url(path)?;
        let response = self.execute(Method::PUT, url, Some(body)).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        let pending = |target: PollTarget| -> Result<CreateOutcome<T>> {
            debug!(service = %self.service(), path, ?target, "Create accepted, operation pending");
            Ok(CreateOutcome::Pending(LongRunningOperation {
                client: self.clone(),
                resource_path: path.to_string(),
                target,
                retry_after: retry_after(&headers),
                _marker: PhantomData,
            }))
        };

        if let Some(url) = self.operation_url(&headers, ASYNC_OPERATION_HEADER) {
            return pending(PollTarget::AsyncOperation(url));
        }
        if status == StatusCode::ACCEPTED {
            return match self.operation_url(&headers, LOCATION.as_str()) {
                Some(url) => pending(PollTarget::Location(url)),
                None => pending(PollTarget::Resource),
            };
        }

        match provisioning_status(&bytes) {
            Some(OperationStatus::InProgress(_)) => return pending(PollTarget::Resource),
            Some(state @ (OperationStatus::Failed | OperationStatus::Canceled)) => {
                return Err(Error::Provider {
                    code: format!("Provisioning{state}"),
                    message: format!("{} resource `{path}` reported {state}", self.service()),
                });
            }
            _ => {}
        }

        serde_json::from_slice(&bytes)
            .map(CreateOutcome::Completed)
            .map_err(|err| {
                Error::ParseError(format!(
                    "Failed to parse {} response for `{path}`: {err}",
                    self.service()
                ))
            })
    }
}
