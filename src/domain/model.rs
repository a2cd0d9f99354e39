use crate::utils::error::StageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Written in place of any field a failed stage could not produce.
pub const ERROR_MARKER: &str = "ERROR";

/// Written in place of an average when the guide has no competitor data.
pub const UNAVAILABLE_MARKER: &str = "N/A";

/// Content used when a page cannot be fetched.
pub const CONTENT_NOT_AVAILABLE: &str = "Content not available";

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    #[serde(rename = "KEYWORD")]
    pub keyword: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "CONTENT", default)]
    pub content: Option<String>,
}

/// Opaque guide identifier handed out by the scoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideHandle(pub String);

impl GuideHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuideHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub seo_score: f64,
    pub danger: f64,
    pub raw_payload: serde_json::Value,
}

/// Competitor score means. `None` means the service returned no competitors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SerpAverages {
    pub soseo_avg_3: Option<f64>,
    pub soseo_avg_5: Option<f64>,
    pub dseo_avg_3: Option<f64>,
    pub dseo_avg_5: Option<f64>,
}

impl SerpAverages {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_unavailable(&self) -> bool {
        self.soseo_avg_3.is_none()
            && self.soseo_avg_5.is_none()
            && self.dseo_avg_3.is_none()
            && self.dseo_avg_5.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Content,
    Guide,
    Score,
    Serp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Content => "content",
            Stage::Guide => "guide",
            Stage::Score => "score",
            Stage::Serp => "serp",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Pending,
    ContentFetched,
    GuideResolved,
    Scored,
    Averaged,
    Written,
    Failed(Stage),
}

/// A row as it moves through the batch.
#[derive(Debug, Clone)]
pub struct RowRecord {
    pub line: usize,
    pub input: InputRow,
    pub content: String,
    pub state: RowState,
    pub guide: Option<GuideHandle>,
    pub scores: Option<ScoreResult>,
    pub averages: Option<SerpAverages>,
    pub failure: Option<StageError>,
}

impl RowRecord {
    pub fn new(line: usize, input: InputRow) -> Self {
        Self {
            line,
            input,
            content: String::new(),
            state: RowState::Pending,
            guide: None,
            scores: None,
            averages: None,
            failure: None,
        }
    }

    pub fn content_fetched(&mut self, content: String) {
        self.content = content;
        self.state = RowState::ContentFetched;
    }

    pub fn guide_resolved(&mut self, guide: GuideHandle) {
        self.guide = Some(guide);
        self.state = RowState::GuideResolved;
    }

    pub fn scored(&mut self, scores: ScoreResult) {
        self.scores = Some(scores);
        self.state = RowState::Scored;
    }

    pub fn averaged(&mut self, averages: SerpAverages) {
        self.averages = Some(averages);
        self.state = RowState::Averaged;
    }

    pub fn fail(&mut self, stage: Stage, error: StageError) {
        self.failure = Some(error);
        self.state = RowState::Failed(stage);
    }

    pub fn written(&mut self) {
        if !self.is_failed() {
            self.state = RowState::Written;
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, RowState::Failed(_))
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self.state {
            RowState::Failed(stage) => Some(stage),
            _ => None,
        }
    }
}

/// One row of the report, every field already rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "KEYWORD")]
    pub keyword: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "CONTENT")]
    pub content: String,
    #[serde(rename = "GUIDE_ID")]
    pub guide_id: String,
    #[serde(rename = "SEO_SCORE")]
    pub seo_score: String,
    #[serde(rename = "DANGER")]
    pub danger: String,
    #[serde(rename = "SOSEO_AVG_3")]
    pub soseo_avg_3: String,
    #[serde(rename = "SOSEO_AVG_5")]
    pub soseo_avg_5: String,
    #[serde(rename = "DSEO_AVG_3")]
    pub dseo_avg_3: String,
    #[serde(rename = "DSEO_AVG_5")]
    pub dseo_avg_5: String,
}

impl From<&RowRecord> for OutputRow {
    fn from(record: &RowRecord) -> Self {
        let error = || ERROR_MARKER.to_string();

        // A failed stage voids its own fields and every later one.
        let guide_id = record
            .guide
            .as_ref()
            .map(|guide| guide.to_string())
            .unwrap_or_else(error);

        let (seo_score, danger) = match &record.scores {
            Some(scores) => (format_number(scores.seo_score), format_number(scores.danger)),
            None => (error(), error()),
        };

        let [soseo_avg_3, soseo_avg_5, dseo_avg_3, dseo_avg_5] = match &record.averages {
            Some(averages) => [
                averages.soseo_avg_3,
                averages.soseo_avg_5,
                averages.dseo_avg_3,
                averages.dseo_avg_5,
            ]
            .map(format_average),
            None => [error(), error(), error(), error()],
        };

        Self {
            keyword: record.input.keyword.clone(),
            url: record.input.url.clone(),
            content: record.content.clone(),
            guide_id,
            seo_score,
            danger,
            soseo_avg_3,
            soseo_avg_5,
            dseo_avg_3,
            dseo_avg_5,
        }
    }
}

/// Row of the intermediate content snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ContentRow<'a> {
    #[serde(rename = "KEYWORD")]
    pub keyword: &'a str,
    #[serde(rename = "URL")]
    pub url: &'a str,
    #[serde(rename = "CONTENT")]
    pub content: &'a str,
}

impl<'a> From<&'a RowRecord> for ContentRow<'a> {
    fn from(record: &'a RowRecord) -> Self {
        Self {
            keyword: &record.input.keyword,
            url: &record.input.url,
            content: &record.content,
        }
    }
}

pub fn format_number(value: f64) -> String {
    value.to_string()
}

fn format_average(value: Option<f64>) -> String {
    value
        .map(format_number)
        .unwrap_or_else(|| UNAVAILABLE_MARKER.to_string())
}
