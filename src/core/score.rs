use crate::config::toml_config::ApiSettings;
use crate::core::retry::{retry_after, run_with_retry, Attempt, RetryPolicy};
use crate::core::Sleeper;
use crate::domain::model::{GuideHandle, ScoreResult, Stage};
use crate::utils::error::StageError;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;

const GUIDE_NOT_READY: &str = "No Corresponding Guide";

/// Submits page content to a guide's check endpoint.
pub struct ScoreFetcher {
    client: Client,
    api: ApiSettings,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ScoreFetcher {
    pub fn new(client: Client, api: ApiSettings, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            api,
            retry,
            sleeper,
        }
    }

    pub async fn fetch(
        &self,
        guide: &GuideHandle,
        content: &str,
        keyword: &str,
    ) -> Result<ScoreResult, StageError> {
        tracing::info!(keyword, guide_id = %guide, "fetching scores");
        tracing::debug!(keyword, content, "content sent for scoring");

        let url = self.api.endpoint(&format!("check/{}", guide));
        let url = &url;

        let scores = run_with_retry(
            Stage::Score,
            keyword,
            self.retry.max_attempts,
            self.sleeper.as_ref(),
            move |_| self.try_check(url, content),
        )
        .await?;

        tracing::info!(
            keyword,
            seo_score = scores.seo_score,
            danger = scores.danger,
            "scores retrieved"
        );
        Ok(scores)
    }

    async fn try_check(&self, url: &str, content: &str) -> Attempt<ScoreResult> {
        let request = self
            .client
            .post(url)
            .header("KEY", self.api.key())
            .header(ACCEPT, "application/json")
            .form(&[("content", content)]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry {
                    wait: self.retry.timeout_delay,
                    reason: "check request timed out".to_string(),
                }
            }
            Err(e) => {
                return Attempt::Fail(StageError::Transport {
                    stage: Stage::Score,
                    message: e.to_string(),
                })
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<Value>().await {
                Ok(body) if guide_not_ready(&body) => Attempt::Retry {
                    wait: self.retry.guide_not_ready_delay,
                    reason: format!("'{}', guide not materialized yet", GUIDE_NOT_READY),
                },
                Ok(body) => Attempt::Done(ScoreResult {
                    seo_score: number_field(&body, "score"),
                    danger: number_field(&body, "danger"),
                    raw_payload: body,
                }),
                Err(e) if e.is_timeout() => Attempt::Retry {
                    wait: self.retry.timeout_delay,
                    reason: "check response timed out".to_string(),
                },
                Err(e) => Attempt::Fail(StageError::Payload {
                    stage: Stage::Score,
                    message: e.to_string(),
                }),
            },
            StatusCode::TOO_MANY_REQUESTS => Attempt::Retry {
                wait: retry_after(response.headers()).unwrap_or(self.retry.rate_limit_delay),
                reason: "too many requests".to_string(),
            },
            status => Attempt::Fail(StageError::Rejected {
                stage: Stage::Score,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// The check endpoint answers 200 with an `errors` entry until the guide exists.
fn guide_not_ready(body: &Value) -> bool {
    match body.get("errors") {
        Some(Value::String(message)) => message.contains(GUIDE_NOT_READY),
        Some(Value::Array(messages)) => messages
            .iter()
            .filter_map(Value::as_str)
            .any(|message| message.contains(GUIDE_NOT_READY)),
        _ => false,
    }
}

/// Numeric field that may arrive as a number or a numeric string; 0 when absent.
pub(crate) fn number_field(body: &Value, key: &str) -> f64 {
    match body.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}
