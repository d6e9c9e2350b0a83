//! Transfer API client
//!
//! Direct HTTP client for the Globus Transfer REST API. Each method is a
//! single call-through; the only local logic is filling in submission
//! ids, following event-list pages and the polling inside [`task_wait`].
//!
//! [`task_wait`]: TransferClient::task_wait

use crate::auth::Authorizer;
use crate::error::MuleError;
use crate::transfer::types::{
    DeleteData, Page, SubmissionId, SubmissionResult, Task, TaskEvent, TransferData,
};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Page size used when walking a task's event list
const EVENT_PAGE_SIZE: usize = 100;

/// Client for the Transfer API
#[derive(Clone)]
pub struct TransferClient {
    http: reqwest::Client,
    base_url: String,
    authorizer: Arc<dyn Authorizer>,
}

impl TransferClient {
    /// Create a client for the API at `base_url`
    pub fn new(http: reqwest::Client, base_url: &str, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorizer,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MuleError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");

        let response = self
            .http
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, self.authorizer.authorization_header().await?)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, MuleError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "POST");

        let response = self
            .http
            .post(&url)
            .json(body)
            .header(AUTHORIZATION, self.authorizer.authorization_header().await?)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, MuleError> {
        let status = response.status();
        if !status.is_success() {
            let err = MuleError::from_response(response).await;
            tracing::error!(status_code = status.as_u16(), error = %err, "Transfer API error");
            return Err(err);
        }
        Ok(response.json().await?)
    }

    /// Fetch a fresh submission id
    pub async fn get_submission_id(&self) -> Result<String, MuleError> {
        let id: SubmissionId = self.get("/submission_id", &[]).await?;
        Ok(id.value)
    }

    /// Submit a transfer task
    pub async fn submit_transfer(
        &self,
        mut data: TransferData,
    ) -> Result<SubmissionResult, MuleError> {
        if data.submission_id.is_none() {
            data.submission_id = Some(self.get_submission_id().await?);
        }
        self.post("/transfer", &data).await
    }

    /// Submit a delete task
    pub async fn submit_delete(&self, mut data: DeleteData) -> Result<SubmissionResult, MuleError> {
        if data.submission_id.is_none() {
            data.submission_id = Some(self.get_submission_id().await?);
        }
        self.post("/delete", &data).await
    }

    /// Fetch a task document
    pub async fn get_task(&self, task_id: &str) -> Result<Task, MuleError> {
        self.get(&format!("/task/{}", task_id), &[]).await
    }

    /// Poll a task until it is terminal or `timeout` elapses
    ///
    /// Returns `true` when the task reached `SUCCEEDED` or `FAILED`.
    pub async fn task_wait(
        &self,
        task_id: &str,
        timeout: Duration,
        polling_interval: Duration,
    ) -> Result<bool, MuleError> {
        let started = Instant::now();
        loop {
            let task = self.get_task(task_id).await?;
            if task.status.is_terminal() {
                return Ok(true);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            sleep(polling_interval.min(timeout - elapsed)).await;
        }
    }

    /// List every event of a task, following pages
    pub async fn task_event_list(&self, task_id: &str) -> Result<Vec<TaskEvent>, MuleError> {
        let path = format!("/task/{}/event_list", task_id);
        let mut events = Vec::new();
        let mut offset = 0;

        loop {
            let page: Page<TaskEvent> = self
                .get(
                    &path,
                    &[
                        ("offset", offset.to_string()),
                        ("limit", EVENT_PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            let next = page.next_offset();
            events.extend(page.data);
            match next {
                Some(n) => offset = n,
                None => break,
            }
        }
        Ok(events)
    }

    /// Most recently requested tasks, newest first
    pub async fn task_list(&self, limit: usize) -> Result<Vec<Task>, MuleError> {
        let page: Page<Task> = self
            .get(
                "/task_list",
                &[
                    ("limit", limit.to_string()),
                    ("orderby", "request_time DESC".to_string()),
                ],
            )
            .await?;
        Ok(page.data)
    }
}
