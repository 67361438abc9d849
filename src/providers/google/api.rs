use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::apireq::{self, ApiError, Url};

pub(super) const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

const PAGE_SIZE: &str = "1000";

/* Structures to serialize :generateContent */

#[derive(Serialize, Debug)]
pub(super) struct Part<'p> {
    pub text: &'p str,
}

#[derive(Serialize, Debug)]
pub(super) struct Content<'c> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<Part<'c>>,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'r> {
    contents: &'r [Content<'r>],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<&'r Content<'r>>,
    generation_config: &'r GenerationConfig,
}

/* Structures to deserialize :generateContent */

#[derive(Deserialize, Debug, Default)]
pub(super) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct Candidate {
    #[serde(default)]
    pub content: ResponseContent,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: usize,
    #[serde(default)]
    pub candidates_token_count: usize,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Text of the first candidate.
    pub(super) fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;

        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/* Structures to deserialize /v1beta/models */

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(super) struct Model {
    /// Resource name, e.g. `models/gemini-2.0-flash`
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_token_limit: Option<u64>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl Model {
    /// The id used in request paths, without the `models/` prefix.
    pub(super) fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub(super) fn can_generate(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|method| method == "generateContent")
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ModelPage {
    #[serde(default)]
    models: Vec<Model>,
    #[serde(default)]
    next_page_token: Option<String>,
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

pub(super) struct GoogleApi {
    client: Client,
    api_base: Url,
    api_key: String,
}

impl GoogleApi {
    pub(super) fn new(api_key: &str, api_base: &str, timeout: Duration) -> Result<GoogleApi, ApiError> {
        Ok(GoogleApi {
            client: apireq::http_client(timeout)?,
            api_base: apireq::parse_api_base(api_base)?,
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("x-goog-api-key", &self.api_key)
    }

    async fn model_page(
        &self,
        page_token: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<ModelPage, ApiError> {
        let mut url = apireq::endpoint(&self.api_base, "v1beta/models")?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", PAGE_SIZE);

            if let Some(page_token) = page_token {
                query.append_pair("pageToken", page_token);
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

    pub(super) async fn models(&self) -> Result<Vec<Model>, ApiError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.model_page(page_token.as_deref(), None).await?;

            models.extend(page.models);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }

    pub(super) async fn probe(&self, timeout: Duration) -> Result<(), ApiError> {
        self.model_page(None, Some(timeout)).await.map(|_| ())
    }

    pub(super) async fn generate_content(
        &self,
        model: &str,
        contents: &[Content<'_>],
        system_instruction: Option<&Content<'_>>,
        generation_config: &GenerationConfig,
    ) -> Result<GenerateContentResponse, ApiError> {
        let path = format!("v1beta/models/{}:generateContent", model);
        let url = apireq::endpoint(&self.api_base, &path)?;

        let req = self
            .authorized(self.client.post(url))
            .json(&GenerateContentRequest {
                contents,
                system_instruction,
                generation_config,
            });

        let res = req.send().await.map_err(|e| ApiError::RequestFailed(e.into()))?;

        let res = apireq::check_status(res, error_message).await?;

        res.json()
            .await
            .map_err(|e| ApiError::RequestFailed(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_page() {
        let body = r#"{
            "models": [
                {
                    "name": "models/gemini-2.0-flash",
                    "version": "2.0",
                    "displayName": "Gemini 2.0 Flash",
                    "description": "Gemini 2.0 Flash",
                    "inputTokenLimit": 1048576,
                    "outputTokenLimit": 8192,
                    "supportedGenerationMethods": ["generateContent", "countTokens"]
                },
                {
                    "name": "models/text-embedding-004",
                    "displayName": "Text Embedding 004",
                    "inputTokenLimit": 2048,
                    "supportedGenerationMethods": ["embedContent"]
                }
            ],
            "nextPageToken": "abc"
        }"#;

        let page: ModelPage = serde_json::from_str(body).unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        assert_eq!(page.models[0].id(), "gemini-2.0-flash");
        assert!(page.models[0].can_generate());
        assert!(!page.models[1].can_generate());
        assert_eq!(page.models[0].input_token_limit, Some(1_048_576));
    }

    #[test]
    fn text_comes_from_first_candidate() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Hi "}, {"text": "there"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        }"#;

        let res: GenerateContentResponse = serde_json::from_str(body).unwrap();

        assert_eq!(res.text().as_deref(), Some("Hi there"));
        assert_eq!(
            res.usage_metadata.as_ref().map(|u| u.candidates_token_count),
            Some(2)
        );
    }

    #[test]
    fn blocked_prompt_has_no_text() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;

        let res: GenerateContentResponse = serde_json::from_str(body).unwrap();

        assert_eq!(res.text(), None);
    }

    #[test]
    fn request_uses_camel_case() {
        let contents = [Content {
            role: Some("user"),
            parts: vec![Part { text: "Hi" }],
        }];
        let system = Content {
            role: None,
            parts: vec![Part { text: "Be brief." }],
        };
        let config = GenerationConfig {
            temperature: None,
            max_output_tokens: Some(128),
        };

        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: Some(&system),
            generation_config: &config,
        };

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 128);
        assert!(json["systemInstruction"].get("role").is_none());
    }
}
