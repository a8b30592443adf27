use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, Role,
    },
    Client,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::AppError;
use crate::models::ColumnFacts;

pub const FALLBACK_REPORT: &str = "An error occurred while generating AI insights.";
pub const NO_NUMERIC_REPORT: &str = "No numerical data found for analysis.";

/// Single-shot text generation. The production implementation talks to the
/// OpenAI chat API; tests substitute stubs.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                name: None,
                role: Role::User,
            },
        )];

        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.1),
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::LlmError(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::LlmError("empty completion response".to_string()))
    }
}

/// Produce the summary report for the given facts. An empty facts map
/// short-circuits without touching the external service; a service failure
/// of any kind degrades to a fixed fallback string and is never propagated.
pub async fn generate_insights(
    generator: &dyn TextGenerator,
    facts: &BTreeMap<String, ColumnFacts>,
) -> String {
    if facts.is_empty() {
        return NO_NUMERIC_REPORT.to_string();
    }

    let prompt = build_prompt(facts);
    match generator.generate(&prompt).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("AI generation error: {}", e);
            FALLBACK_REPORT.to_string()
        }
    }
}

pub fn build_prompt(facts: &BTreeMap<String, ColumnFacts>) -> String {
    let mut facts_string = String::new();
    for (name, f) in facts {
        facts_string.push_str(&format!(
            "- {} ({}): Count={}, Mean={}, Median={}, Mode={}, Std Dev={}, Min={}, Max={}",
            name,
            f.dtype,
            f.count,
            f.mean,
            f.median,
            format_modes(&f.mode),
            f.std_dev,
            format_number(f.min),
            format_number(f.max),
        ));
        if f.has_pie {
            facts_string.push_str(" | Pie chart generated.");
        }
        facts_string.push('\n');
    }

    format!(
        "You are an expert data analyst. Generate a concise textual summary of the \
         dataset with bullet points for each column, highlighting key trends, outliers, \
         missing values, and distribution patterns. Make it professional, easy to read, \
         and suitable for a report.\n\n{}\n",
        facts_string
    )
}

fn format_modes(modes: &[f64]) -> String {
    let parts: Vec<String> = modes.iter().map(|&v| format_number(v)).collect();
    format!("[{}]", parts.join(", "))
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}
