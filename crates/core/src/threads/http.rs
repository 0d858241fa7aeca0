//! Telegram Bot API forum topics as staff threads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ThreadApiConfig;
use crate::ticket::ThreadId;

use super::{ThreadApi, ThreadApiError};

/// Response envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForumTopic {
    message_thread_id: i64,
}

#[derive(Debug, Serialize)]
struct CreateTopicRequest<'a> {
    chat_id: i64,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct TopicRequest {
    chat_id: i64,
    message_thread_id: i64,
}

/// HTTP thread API client.
pub struct HttpThreadApi {
    client: Client,
    config: ThreadApiConfig,
}

impl HttpThreadApi {
    /// Create a new client.
    pub fn new(config: ThreadApiConfig) -> Result<Self, ThreadApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ThreadApiError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, ThreadApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("Calling thread API method {}", method);

        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ThreadApiError::Timeout
                } else if e.is_connect() {
                    ThreadApiError::ConnectionFailed(e.to_string())
                } else {
                    ThreadApiError::InvalidResponse(e.to_string())
                }
            })?;

        let body = response
            .text()
            .await
            .map_err(|e| ThreadApiError::InvalidResponse(e.to_string()))?;

        parse_envelope(&body)
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ThreadApiError> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body).map_err(|e| {
        ThreadApiError::InvalidResponse(format!(
            "{}: {}",
            e,
            body.chars().take(100).collect::<String>()
        ))
    })?;

    if !envelope.ok {
        return Err(ThreadApiError::Rejected(
            envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
        ));
    }

    envelope
        .result
        .ok_or_else(|| ThreadApiError::InvalidResponse("missing result".to_string()))
}

#[async_trait]
impl ThreadApi for HttpThreadApi {
    async fn open_group(&self, staff_chat_id: i64, name: &str) -> Result<ThreadId, ThreadApiError> {
        let topic: ForumTopic = self
            .call(
                "createForumTopic",
                &CreateTopicRequest {
                    chat_id: staff_chat_id,
                    name,
                },
            )
            .await?;
        Ok(ThreadId(topic.message_thread_id))
    }

    async fn close_group(
        &self,
        staff_chat_id: i64,
        thread_id: ThreadId,
    ) -> Result<(), ThreadApiError> {
        let _: bool = self
            .call(
                "closeForumTopic",
                &TopicRequest {
                    chat_id: staff_chat_id,
                    message_thread_id: thread_id.0,
                },
            )
            .await?;
        Ok(())
    }

    async fn reopen_group(
        &self,
        staff_chat_id: i64,
        thread_id: ThreadId,
    ) -> Result<(), ThreadApiError> {
        let _: bool = self
            .call(
                "reopenForumTopic",
                &TopicRequest {
                    chat_id: staff_chat_id,
                    message_thread_id: thread_id.0,
                },
            )
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "telegram"
    }
}
