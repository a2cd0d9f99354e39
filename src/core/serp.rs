use crate::config::toml_config::ApiSettings;
use crate::core::retry::{retry_after, run_with_retry, Attempt, RetryPolicy};
use crate::core::Sleeper;
use crate::domain::model::{GuideHandle, SerpAverages, Stage};
use crate::utils::error::StageError;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;

const TOP_N: usize = 5;
const TOP_SHORT: usize = 3;

/// Main-content scores of one competitor page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompetitorScores {
    pub soseo: f64,
    pub dseo: f64,
}

/// Averages the top competitor scores of a guide's SERP.
pub struct SerpAverager {
    client: Client,
    api: ApiSettings,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SerpAverager {
    pub fn new(client: Client, api: ApiSettings, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            api,
            retry,
            sleeper,
        }
    }

    pub async fn fetch_averages(
        &self,
        guide: &GuideHandle,
        keyword: &str,
    ) -> Result<SerpAverages, StageError> {
        tracing::info!(keyword, guide_id = %guide, "fetching SERP data");

        let url = self.api.endpoint(&format!("serp/{}", guide));
        let url = &url;

        let competitors = run_with_retry(
            Stage::Serp,
            keyword,
            self.retry.max_attempts,
            self.sleeper.as_ref(),
            move |_| self.try_serp(url),
        )
        .await?;

        let averages = compute_averages(&competitors);
        if averages.is_unavailable() {
            tracing::warn!(keyword, guide_id = %guide, "no SERP data available for averaging");
        } else {
            tracing::info!(
                keyword,
                soseo_avg_3 = ?averages.soseo_avg_3,
                soseo_avg_5 = ?averages.soseo_avg_5,
                dseo_avg_3 = ?averages.dseo_avg_3,
                dseo_avg_5 = ?averages.dseo_avg_5,
                "SERP averages computed"
            );
        }
        Ok(averages)
    }

    async fn try_serp(&self, url: &str) -> Attempt<Vec<CompetitorScores>> {
        let request = self
            .client
            .get(url)
            .header("KEY", self.api.key())
            .header(ACCEPT, "application/json");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry {
                    wait: self.retry.timeout_delay,
                    reason: "serp request timed out".to_string(),
                }
            }
            Err(e) => {
                return Attempt::Fail(StageError::Transport {
                    stage: Stage::Serp,
                    message: e.to_string(),
                })
            }
        };

        match response.status() {
            StatusCode::OK => {
                let body = match response.json::<Value>().await {
                    Ok(body) => body,
                    Err(e) if e.is_timeout() => {
                        return Attempt::Retry {
                            wait: self.retry.timeout_delay,
                            reason: "serp response timed out".to_string(),
                        }
                    }
                    Err(e) => {
                        return Attempt::Fail(StageError::Payload {
                            stage: Stage::Serp,
                            message: e.to_string(),
                        })
                    }
                };
                match parse_competitors(&body) {
                    Ok(competitors) => Attempt::Done(competitors),
                    Err(message) => Attempt::Fail(StageError::Payload {
                        stage: Stage::Serp,
                        message,
                    }),
                }
            }
            StatusCode::TOO_MANY_REQUESTS => Attempt::Retry {
                wait: retry_after(response.headers()).unwrap_or(self.retry.rate_limit_delay),
                reason: "too many requests".to_string(),
            },
            status => Attempt::Fail(StageError::Rejected {
                stage: Stage::Serp,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Reads the first five entries of `serps`. A missing list counts as empty.
pub fn parse_competitors(body: &Value) -> Result<Vec<CompetitorScores>, String> {
    let entries: &[Value] = match body.get("serps") {
        Some(Value::Array(entries)) => entries.as_slice(),
        Some(Value::Null) | None => &[],
        Some(other) => return Err(format!("serps is not a list: {}", other)),
    };

    entries
        .iter()
        .take(TOP_N)
        .enumerate()
        .map(|(rank, entry)| {
            let score = |key: &str| {
                entry
                    .get("scores")
                    .and_then(|scores| scores.get(key))
                    .and_then(whole_score)
                    .ok_or_else(|| format!("competitor #{} has no {}", rank + 1, key))
            };
            Ok(CompetitorScores {
                soseo: score("soseo_main_content")?,
                dseo: score("dseo_main_content")?,
            })
        })
        .collect()
}

/// Scores are truncated to whole numbers before averaging.
fn whole_score(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.trunc())
}

/// Means over the top 3 and top 5 competitors.
///
/// No competitors means no data: every average is `None`. With fewer than
/// three competitors the top-3 averages are 0.
pub fn compute_averages(competitors: &[CompetitorScores]) -> SerpAverages {
    if competitors.is_empty() {
        return SerpAverages::unavailable();
    }

    let top = &competitors[..competitors.len().min(TOP_N)];
    let soseo: Vec<f64> = top.iter().map(|c| c.soseo).collect();
    let dseo: Vec<f64> = top.iter().map(|c| c.dseo).collect();

    SerpAverages {
        soseo_avg_3: Some(top_short_mean(&soseo)),
        soseo_avg_5: Some(mean(&soseo)),
        dseo_avg_3: Some(top_short_mean(&dseo)),
        dseo_avg_5: Some(mean(&dseo)),
    }
}

fn top_short_mean(values: &[f64]) -> f64 {
    if values.len() >= TOP_SHORT {
        mean(&values[..TOP_SHORT])
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn competitors(pairs: &[(f64, f64)]) -> Vec<CompetitorScores> {
        pairs
            .iter()
            .map(|&(soseo, dseo)| CompetitorScores { soseo, dseo })
            .collect()
    }

    #[test]
    fn test_empty_list_is_unavailable_not_zero() {
        let averages = compute_averages(&[]);
        assert_eq!(averages, SerpAverages::unavailable());
        assert!(averages.soseo_avg_3.is_none());
        assert!(averages.dseo_avg_5.is_none());
    }

    #[test]
    fn test_two_competitors() {
        let averages = compute_averages(&competitors(&[(40.0, 10.0), (60.0, 20.0)]));
        assert_eq!(averages.soseo_avg_3, Some(0.0));
        assert_eq!(averages.soseo_avg_5, Some(50.0));
        assert_eq!(averages.dseo_avg_3, Some(0.0));
        assert_eq!(averages.dseo_avg_5, Some(15.0));
    }

    #[test]
    fn test_only_top_five_count() {
        let averages = compute_averages(&competitors(&[
            (10.0, 1.0),
            (20.0, 2.0),
            (30.0, 3.0),
            (40.0, 4.0),
            (50.0, 5.0),
            (1000.0, 1000.0),
        ]));
        assert_eq!(averages.soseo_avg_3, Some(20.0));
        assert_eq!(averages.soseo_avg_5, Some(30.0));
        assert_eq!(averages.dseo_avg_3, Some(2.0));
        assert_eq!(averages.dseo_avg_5, Some(3.0));
    }

    #[test]
    fn test_parse_competitors() {
        let body = json!({
            "serps": [
                {"url": "a", "scores": {"soseo_main_content": 41.9, "dseo_main_content": "12"}},
                {"url": "b", "scores": {"soseo_main_content": "60", "dseo_main_content": 8}}
            ]
        });
        assert_eq!(
            parse_competitors(&body).unwrap(),
            competitors(&[(41.0, 12.0), (60.0, 8.0)])
        );
    }

    #[test]
    fn test_parse_competitors_missing_list_is_empty() {
        assert!(parse_competitors(&json!({})).unwrap().is_empty());
        assert!(parse_competitors(&json!({"serps": []})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_competitors_rejects_entry_without_scores() {
        let body = json!({"serps": [{"url": "a", "scores": {"soseo_main_content": 3}}]});
        let error = parse_competitors(&body).unwrap_err();
        assert!(error.contains("dseo_main_content"));
    }
}
