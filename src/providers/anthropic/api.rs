use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::apireq::{self, ApiError, Url};

pub(super) const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";

// Upper bound of the listing page size.
const PAGE_LIMIT: &str = "1000";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(super) enum Role {
    User,
    Assistant,
}

#[derive(Serialize, Debug)]
pub(super) struct Message<'m> {
    pub role: Role,
    pub content: &'m str,
}

/* Structures to serialize /v1/messages */

#[derive(Serialize, Debug)]
struct MessagesRequest<'r> {
    model: &'r str,
    max_tokens: u32,
    messages: &'r [Message<'r>],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'r str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/* Structures to deserialize /v1/messages */

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
pub(super) struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[derive(Deserialize, Debug)]
pub(super) struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// Concatenation of all text blocks.
    pub(super) fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/* Structures to deserialize /v1/models */

#[derive(Deserialize, Debug, Clone)]
pub(super) struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ModelPage {
    data: Vec<ModelInfo>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
struct ApiErrorPayload {
    message: String,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|res| res.error.message)
}

pub(super) struct AnthropicApi {
    client: Client,
    api_base: Url,
    api_key: String,
}

impl AnthropicApi {
    pub(super) fn new(api_key: &str, api_base: &str, timeout: Duration) -> Result<AnthropicApi, ApiError> {
        Ok(AnthropicApi {
            client: apireq::http_client(timeout)?,
            api_base: apireq::parse_api_base(api_base)?,
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    async fn model_page(
        &self,
        after_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<ModelPage, ApiError> {
        let mut url = apireq::endpoint(&self.api_base, "v1/models")?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", PAGE_LIMIT);

            if let Some(after_id) = after_id {
                query.append_pair("after_id", after_id);
            }
        }

        let mut req = self.authorized(self.client.get(url));

        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().await.map_err(|e| ApiError::RequestFailed(e.into()))?;

        let res = apireq::check_status(res, error_message).await?;

        res.json()
            .await
            .map_err(|e| ApiError::RequestFailed(e.into()))
    }

    /// Follows the listing cursor until every page has been read.
    pub(super) async fn models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let mut models = Vec::new();
        let mut after_id: Option<String> = None;

        loop {
            let page = self.model_page(after_id.as_deref(), None).await?;

            models.extend(page.data);

            match (page.has_more, page.last_id) {
                (true, Some(last_id)) => after_id = Some(last_id),
                _ => break,
            }
        }

        Ok(models)
    }

    pub(super) async fn probe(&self, timeout: Duration) -> Result<(), ApiError> {
        self.model_page(None, Some(timeout)).await.map(|_| ())
    }

    pub(super) async fn messages(
        &self,
        model: &str,
        messages: &[Message<'_>],
        system: Option<&str>,
        temperature: Option<f32>,
        max_tokens: u32,
    ) -> Result<MessagesResponse, ApiError> {
        let url = apireq::endpoint(&self.api_base, "v1/messages")?;

        let req = self.authorized(self.client.post(url)).json(&MessagesRequest {
            model,
            max_tokens,
            messages,
            system,
            temperature,
        });

        let res = req.send().await.map_err(|e| ApiError::RequestFailed(e.into()))?;

        let res = apireq::check_status(res, error_message).await?;

        res.json()
            .await
            .map_err(|e| ApiError::RequestFailed(e.into()))
    }
}
