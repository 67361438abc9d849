use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::apireq::{self, ApiError, Url};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Debug)]
pub(crate) struct ChatMessage<'m> {
    pub role: Role,
    pub content: &'m str,
}

/* Structures to serialize /chat/completions */

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'o> {
    model: &'o str,
    messages: &'o [ChatMessage<'o>],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/* Structures to deserialize /chat/completions */

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Choice {
    #[serde(default)]
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ChatCompletion {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// The text of the first choice, if the model produced any.
    pub(crate) fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
    }
}

/* Structures to deserialize /models */

/// Mistral extends the OpenAI model object with capability flags.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub(crate) struct Capabilities {
    #[serde(default)]
    pub completion_chat: bool,
    #[serde(default)]
    pub vision: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ModelObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_context_length: Option<u64>,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
}

#[derive(Deserialize, Debug)]
struct ModelList {
    data: Vec<ModelObject>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
struct ApiErrorPayload {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ApiErrorResponse {
    Nested { error: ApiErrorPayload },
    Flat { message: String },
}

pub(crate) fn error_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ApiErrorResponse>(body).ok()? {
        ApiErrorResponse::Nested { error } => Some(error.message),
        ApiErrorResponse::Flat { message } => Some(message),
    }
}

pub(crate) struct OpenAIApi {
    client: Client,
    api_base: Url,
    api_key: String,
}

impl OpenAIApi {
    pub(crate) fn new(api_key: &str, api_base: &str, timeout: Duration) -> Result<OpenAIApi, ApiError> {
        Ok(OpenAIApi {
            client: apireq::http_client(timeout)?,
            api_base: apireq::parse_api_base(api_base)?,
            api_key: api_key.to_string(),
        })
    }

    async fn get_models(&self, timeout: Option<Duration>) -> Result<Vec<ModelObject>, ApiError> {
        let url = apireq::endpoint(&self.api_base, "v1/models")?;

        let mut req = self.client.get(url).bearer_auth(&self.api_key);

        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().await.map_err(|e| ApiError::RequestFailed(e.into()))?;

        let res = apireq::check_status(res, error_message).await?;

        let list: ModelList = res
            .json()
            .await
            .map_err(|e| ApiError::RequestFailed(e.into()))?;

        Ok(list.data)
    }

    pub(crate) async fn models(&self) -> Result<Vec<ModelObject>, ApiError> {
        self.get_models(None).await
    }

    /// Lists models under a tighter deadline, discarding the result.
    pub(crate) async fn probe(&self, timeout: Duration) -> Result<(), ApiError> {
        self.get_models(Some(timeout)).await.map(|_| ())
    }

    pub(crate) async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage<'_>],
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<ChatCompletion, ApiError> {
        let url = apireq::endpoint(&self.api_base, "v1/chat/completions")?;

        let res = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model,
                messages,
                temperature,
                max_tokens,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.into()))?;

        let res = apireq::check_status(res, error_message).await?;

        res.json()
            .await
            .map_err(|e| ApiError::RequestFailed(e.into()))
    }
}
