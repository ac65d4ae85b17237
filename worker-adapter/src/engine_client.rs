use std::collections::HashMap;
use std::time::Duration;

use dispatch_wire::{EngineRequestBody, EngineRoute, EngineStatusResponse, EngineSubmitResponse};

use crate::error::EngineError;

/// Consumes the inference engine contract spec.md §6 describes: a `submit` URL and a
/// `status` URL per `job_type`, read from configuration (`ENGINE_ROUTES`) rather than
/// hardcoded, since each deployment points at its own inference host.
pub struct EngineClient {
    client: reqwest::Client,
    routes: HashMap<String, EngineRoute>,
}

impl EngineClient {
    pub fn new(routes: HashMap<String, EngineRoute>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build engine http client");

        Self { client, routes }
    }

    fn route(&self, job_type: &str) -> Result<&EngineRoute, EngineError> {
        self.routes
            .get(job_type)
            .ok_or_else(|| EngineError::UnknownRoute(job_type.to_owned()))
    }

    /// POST `request_body` to the engine's submit URL for this job type.
    pub async fn submit(
        &self,
        job_type: &str,
        request_body: &EngineRequestBody,
    ) -> Result<EngineSubmitResponse, EngineError> {
        let route = self.route(job_type)?;

        let response = self
            .client
            .post(&route.submit_url)
            .json(request_body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<EngineSubmitResponse>().await?)
    }

    /// GET the engine's status endpoint for a previously submitted engine job id.
    pub async fn poll(
        &self,
        job_type: &str,
        engine_job_id: &str,
    ) -> Result<EngineStatusResponse, EngineError> {
        let route = self.route(job_type)?;
        let url = format!("{}/{}", route.status_url.trim_end_matches('/'), engine_job_id);

        let response = self.client.get(&url).send().await?.error_for_status()?;

        Ok(response.json::<EngineStatusResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_wire::EngineStatus;
    use httpmock::MockServer;
    use serde_json::json;

    fn routes(server: &MockServer) -> HashMap<String, EngineRoute> {
        let mut map = HashMap::new();
        map.insert(
            "camera-angle".to_string(),
            EngineRoute {
                submit_url: format!("{}/camera-angle/submit", server.base_url()),
                status_url: format!("{}/camera-angle/status", server.base_url()),
            },
        );
        map
    }

    #[tokio::test]
    async fn submit_parses_engine_job_id() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/camera-angle/submit");
            then.status(200)
                .json_body(json!({"job_id": "engine-123", "status": "pending"}));
        });

        let client = EngineClient::new(routes(&server), Duration::from_secs(5));
        let response = client
            .submit("camera-angle", &json!({"prompt": "top-down"}))
            .await
            .unwrap();

        assert_eq!(response.job_id, "engine-123");
        assert_eq!(response.status, EngineStatus::Pending);
    }

    #[tokio::test]
    async fn poll_parses_terminal_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/camera-angle/status/engine-123");
            then.status(200)
                .json_body(json!({"status": "completed", "result_url": "s3://b/out.jpg"}));
        });

        let client = EngineClient::new(routes(&server), Duration::from_secs(5));
        let response = client.poll("camera-angle", "engine-123").await.unwrap();

        assert!(response.status.is_terminal());
        assert_eq!(response.result_url.as_deref(), Some("s3://b/out.jpg"));
    }

    #[tokio::test]
    async fn unknown_job_type_is_an_error() {
        let server = MockServer::start();
        let client = EngineClient::new(routes(&server), Duration::from_secs(5));

        let result = client.submit("face-mask", &json!({})).await;
        assert!(matches!(result, Err(EngineError::UnknownRoute(_))));
    }
}
