use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::analysis::{FeatureAnalysis, MoscowPriority};
use crate::models::job::AnalysisItem;

/// Seam over the inference endpoint so the worker can run against a test
/// double. No retries live here; a timeout surfaces as an error.
pub trait AnalysisProvider: Send + Sync {
    /// Liveness probe. Never fails; any transport error reads as `false`.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// Score one feature.
    fn analyze(
        &self,
        item: &AnalysisItem,
    ) -> impl Future<Output = Result<FeatureAnalysis, AnalysisError>> + Send;
}

/// Client for a local Ollama inference endpoint.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, AnalysisError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(AnalysisError::Http)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn scoring_prompt(item: &AnalysisItem) -> String {
        format!(
            concat!(
                "You are a software engineering expert reviewing a feature specification. ",
                "Analyze the following feature and respond ONLY with six comma-separated ",
                "values, no other text.\n\n",
                "Feature: {summary}\n\nDescription:\n{description}\n\n",
                "Values, in order:\n",
                "1. Engineering Quality (1-5): how well-defined are the technical requirements?\n",
                "2. Clarity (1-5): how clear and understandable is the specification?\n",
                "3. Completeness (1-5): how complete is the information provided?\n",
                "4. Implementability (1-5): how feasible is this to implement?\n",
                "5. Overall Quality (1-5): overall assessment of the specification\n",
                "6. Suggested MoSCoW priority: one of must, should, could, wont\n\n",
                "Example response: 4,3,5,4,4,should"
            ),
            summary = item.summary,
            description = item.description,
        )
    }
}

impl AnalysisProvider for OllamaClient {
    async fn is_available(&self) -> bool {
        match self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn analyze(&self, item: &AnalysisItem) -> Result<FeatureAnalysis, AnalysisError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: Self::scoring_prompt(item),
            stream: false,
        };

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(AnalysisError::Http)?;

        if !resp.status().is_success() {
            return Err(AnalysisError::Api {
                status: resp.status().as_u16(),
            });
        }

        let generated: GenerateResponse = resp.json().await.map_err(AnalysisError::Http)?;
        parse_analysis_response(&generated.response)
    }
}

/// Parse a model reply like `4,3,5,4,4,should` into a [`FeatureAnalysis`].
/// Scores outside 1-5 are clamped, matching how the upstream tooling treats
/// out-of-range model output.
pub fn parse_analysis_response(text: &str) -> Result<FeatureAnalysis, AnalysisError> {
    let parts: Vec<&str> = text.trim().split(',').map(str::trim).collect();
    if parts.len() < 6 {
        return Err(AnalysisError::Parse(format!(
            "expected 6 comma-separated values, got {}: {text:?}",
            parts.len()
        )));
    }

    let score = |raw: &str| -> Result<u8, AnalysisError> {
        raw.parse::<i64>()
            .map(|n| n.clamp(1, 5) as u8)
            .map_err(|_| AnalysisError::Parse(format!("not a score: {raw:?}")))
    };

    let priority_raw = parts[5].trim_matches(|c: char| matches!(c, '"' | '.' | '!'));
    let suggested_priority = priority_raw
        .parse::<MoscowPriority>()
        .map_err(|_| AnalysisError::Parse(format!("not a MoSCoW bucket: {:?}", parts[5])))?;

    Ok(FeatureAnalysis {
        engineering_score: score(parts[0])?,
        clarity_score: score(parts[1])?,
        completeness_score: score(parts[2])?,
        implementability_score: score(parts[3])?,
        overall_score: score(parts[4])?,
        suggested_priority,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis API returned status {status}")]
    Api { status: u16 },

    #[error("failed to parse model response: {0}")]
    Parse(String),
}
