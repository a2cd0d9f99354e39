use crate::config::toml_config::ContentSettings;
use crate::core::retry::{run_with_retry, Attempt};
use crate::core::Sleeper;
use crate::domain::model::{Stage, CONTENT_NOT_AVAILABLE};
use crate::utils::error::{Result, StageError};
use reqwest::Client;
use scraper::{Html, Node};
use std::sync::Arc;

/// Elements whose text never shows up on the rendered page.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Fetches pages and reduces them to their visible text.
pub struct ContentExtractor {
    client: Client,
    settings: ContentSettings,
    sleeper: Arc<dyn Sleeper>,
}

impl ContentExtractor {
    pub fn new(settings: ContentSettings, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            settings,
            sleeper,
        })
    }

    /// Text of the page at `url`, or [`CONTENT_NOT_AVAILABLE`].
    pub async fn fetch_text(&self, url: &str) -> String {
        tracing::info!("Processing {}", url);

        let result = run_with_retry(
            Stage::Content,
            url,
            self.settings.max_attempts,
            self.sleeper.as_ref(),
            move |_| self.try_fetch(url),
        )
        .await;

        match result {
            Ok(html) => {
                let text = html_to_text(&html);
                tracing::debug!(url, chars = text.chars().count(), "content retrieved");
                text
            }
            Err(error) => {
                tracing::warn!(url, "Error fetching content: {}", error);
                CONTENT_NOT_AVAILABLE.to_string()
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Attempt<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry {
                    wait: self.settings.retry_delay,
                    reason: "request timed out".to_string(),
                }
            }
            Err(e) => {
                return Attempt::Fail(StageError::Transport {
                    stage: Stage::Content,
                    message: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.text().await {
                Ok(body) => Attempt::Done(body),
                Err(e) if e.is_timeout() => Attempt::Retry {
                    wait: self.settings.retry_delay,
                    reason: "response body timed out".to_string(),
                },
                Err(e) => Attempt::Fail(StageError::Transport {
                    stage: Stage::Content,
                    message: e.to_string(),
                }),
            };
        }

        if status.is_server_error() {
            Attempt::Retry {
                wait: self.settings.retry_delay,
                reason: format!("server answered {}", status),
            }
        } else {
            Attempt::Fail(StageError::Rejected {
                stage: Stage::Content,
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}

/// Visible text of an HTML document, whitespace collapsed to single spaces.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                });
                (!hidden).then_some(&**text)
            }
            _ => None,
        })
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_joins_visible_text() {
        let html = r#"<html>
            <head><title>Shoes</title><style>p { color: red }</style></head>
            <body>
                <h1>Best   running
                    shoes</h1>
                <script>var tracking = 1;</script>
                <p>Light, <b>fast</b> and cheap.</p>
                <noscript>Enable JS</noscript>
            </body>
        </html>"#;

        assert_eq!(html_to_text(html), "Best running shoes Light, fast and cheap.");
    }

    #[test]
    fn test_html_to_text_plain_fragment() {
        assert_eq!(html_to_text("Example text"), "Example text");
        assert_eq!(html_to_text("<div>  </div>"), "");
    }
}
