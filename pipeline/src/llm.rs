use std::time::Duration;

use anyhow::Context;
use devboard_engine::{ActivityDigest, TextGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You write short, factual summaries of open source contributors. \
Use only the numbers and titles you are given. Do not speculate.";

/// Builds the user prompt from a digest; the digest itself travels as JSON.
pub fn prompt(digest: &ActivityDigest, cap: usize) -> anyhow::Result<String> {
    let data = serde_json::to_string_pretty(digest)?;
    Ok(format!(
        "Summarize the activity of {login} for {period} in under {cap} characters.\n\
         Start with the login, mention the most relevant work and focus areas, \
         and use only the data below.\n\n{data}",
        login = digest.login,
        period = digest.period,
    ))
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions endpoint used as the summary generator.
pub struct ChatCompletions {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletions {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for ChatCompletions {
    async fn generate(&self, digest: &ActivityDigest, cap: usize) -> anyhow::Result<String> {
        let user_prompt = prompt(digest, cap)?;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.3,
            // a token is rarely shorter than two characters
            max_tokens: (cap / 2).max(32) as u32,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat completion returned {status}: {body}");
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("unexpected chat completion response")?;
        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .context("chat completion returned no choices")
    }
}
