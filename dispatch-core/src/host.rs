use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{DispatchError, Result};
use crate::types::HostState;

/// C3: a thin wrapper over the compute host control plane. `describe` reports the
/// current state; `start`/`stop` attempt the one valid transition and are no-ops
/// otherwise (spec.md §3, §4.3).
///
/// Both the orchestrator's wake-on-submit and the idle detector's shutdown go through
/// this trait, injected as a constructor parameter rather than looked up globally.
#[async_trait]
pub trait HostController: Send + Sync {
    async fn describe(&self) -> Result<HostState>;

    /// Attempts `Stopped -> Starting`. No-op (not an error) if the host is not
    /// currently `Stopped`.
    async fn start(&self) -> Result<()>;

    /// Attempts `Running -> Stopping`. No-op if the host is not currently `Running`,
    /// and in particular must never fire while the host is `Starting`.
    async fn stop(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    state: HostState,
}

/// HTTP implementation of `HostController`. The compute host control plane is an
/// external collaborator (spec.md §1); this is the generic REST shape any such
/// control plane is assumed to expose, parameterized by `base_url` and `host_id`.
///
/// The precondition check (only `Stopped` accepts `start`, only `Running` accepts
/// `stop`) is enforced here via a `describe` call before the mutating request, so the
/// no-op behavior in spec.md §8 property 8 holds even against a remote control plane
/// that isn't itself idempotent.
pub struct HttpHostController {
    client: reqwest::Client,
    base_url: String,
    host_id: String,
}

impl HttpHostController {
    pub fn new(base_url: impl Into<String>, host_id: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build host controller http client");

        Self {
            client,
            base_url: base_url.into(),
            host_id: host_id.into(),
        }
    }

    fn describe_url(&self) -> String {
        format!("{}/hosts/{}", self.base_url, self.host_id)
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/hosts/{}/{}", self.base_url, self.host_id, action)
    }
}

#[async_trait]
impl HostController for HttpHostController {
    async fn describe(&self) -> Result<HostState> {
        let response = self
            .client
            .get(self.describe_url())
            .send()
            .await?
            .error_for_status()?
            .json::<DescribeResponse>()
            .await
            .map_err(DispatchError::from)?;

        Ok(response.state)
    }

    async fn start(&self) -> Result<()> {
        if self.describe().await? != HostState::Stopped {
            return Ok(());
        }

        self.client
            .post(self.action_url("start"))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.describe().await? != HostState::Running {
            return Ok(());
        }

        self.client
            .post(self.action_url("stop"))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
