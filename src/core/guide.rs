use crate::config::toml_config::ApiSettings;
use crate::core::retry::{retry_after, run_with_retry, Attempt, RetryPolicy};
use crate::core::Sleeper;
use crate::domain::model::{GuideHandle, Stage};
use crate::utils::error::StageError;
use crate::utils::validation::validate_keyword;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::sync::Arc;

/// Creates (or looks up) the guide for a keyword/language pair.
pub struct GuideResolver {
    client: Client,
    api: ApiSettings,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GuideResolver {
    pub fn new(client: Client, api: ApiSettings, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            api,
            retry,
            sleeper,
        }
    }

    pub async fn resolve(&self, keyword: &str, lang: &str) -> Result<GuideHandle, StageError> {
        if let Err(error) = validate_keyword(keyword) {
            tracing::warn!(keyword, "keyword rejected before guide creation: {}", error);
            return Err(error);
        }

        tracing::info!(keyword, lang, "resolving guide");
        let url = self.api.endpoint("guide/");
        let form = [
            ("query", keyword),
            ("lang", lang),
            ("type", self.api.quality.as_str()),
        ];
        let (url, form) = (&url, &form);

        let guide = run_with_retry(
            Stage::Guide,
            keyword,
            self.retry.max_attempts,
            self.sleeper.as_ref(),
            move |_| self.try_create(url, form),
        )
        .await?;

        tracing::info!(keyword, guide_id = %guide, "guide resolved");
        Ok(guide)
    }

    async fn try_create(&self, url: &str, form: &[(&str, &str)]) -> Attempt<GuideHandle> {
        let request = self
            .client
            .post(url)
            .header("KEY", self.api.key())
            .header(ACCEPT, "application/json")
            .form(form);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry {
                    wait: self.retry.timeout_delay,
                    reason: "guide request timed out".to_string(),
                }
            }
            Err(e) => {
                return Attempt::Fail(StageError::Transport {
                    stage: Stage::Guide,
                    message: e.to_string(),
                })
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<serde_json::Value>().await {
                Ok(body) => match guide_id(&body) {
                    Some(id) => Attempt::Done(GuideHandle(id)),
                    None => Attempt::Fail(StageError::Payload {
                        stage: Stage::Guide,
                        message: format!("no guide_id in {}", body),
                    }),
                },
                Err(e) if e.is_timeout() => Attempt::Retry {
                    wait: self.retry.timeout_delay,
                    reason: "guide response timed out".to_string(),
                },
                Err(e) => Attempt::Fail(StageError::Payload {
                    stage: Stage::Guide,
                    message: e.to_string(),
                }),
            },
            StatusCode::TOO_MANY_REQUESTS => Attempt::Retry {
                wait: retry_after(response.headers()).unwrap_or(self.retry.guide_rate_limit_delay),
                reason: "too many requests".to_string(),
            },
            status => Attempt::Fail(StageError::Rejected {
                stage: Stage::Guide,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// `guide_id` as a string; the service sends it as a number or a string.
fn guide_id(body: &serde_json::Value) -> Option<String> {
    match body.get("guide_id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
