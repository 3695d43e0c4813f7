//! Gemini HTTP client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use bizconsult_core::config::ProviderConfig;
use bizconsult_core::persona;
use bizconsult_core::session::{Message, Role};

use crate::base::{ConversationProvider, ProviderError, ProviderResult, ReplyStream};

/// Gemini generateContent request format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

/// Gemini generateContent response format, one frame per SSE event
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn content_from_message(message: &Message) -> Content {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
    };
    Content {
        role: role.to_string(),
        parts: vec![Part {
            text: message.content.clone(),
        }],
    }
}

fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let content = candidate.content.as_ref()?;
    let text: String = content
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

/// Gemini provider client configured with the BizConsult persona
#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
    /// Conversation turns sent with every request, committed per completed turn
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiProvider {
    /// Create a new Gemini client from provider configuration
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::ConfigError(
                "provider.api_key is not set".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }

    fn build_request(&self, contents: Vec<Content>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents,
            system_instruction: Content {
                role: "system".to_string(),
                parts: vec![Part {
                    text: persona::SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    fn parse_sse_events(buffer: &mut String) -> Vec<String> {
        // The endpoint delimits frames with CRLF pairs
        if buffer.contains('\r') {
            *buffer = buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = buffer.find("\n\n") {
            let raw = buffer[..pos].to_string();
            buffer.drain(..pos + 2);

            let mut data_lines = Vec::new();
            for line in raw.lines() {
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.trim().to_string());
                }
            }

            if !data_lines.is_empty() {
                events.push(data_lines.join("\n"));
            }
        }
        events
    }
}

#[async_trait]
impl ConversationProvider for GeminiProvider {
    async fn start_conversation(&self, history: &[Message]) -> ProviderResult<()> {
        let mut contents = self.history.lock().await;
        *contents = history.iter().map(content_from_message).collect();
        debug!(
            "Conversation context reset with {} prior messages",
            contents.len()
        );
        Ok(())
    }

    async fn stream_reply(&self, text: &str) -> ProviderResult<ReplyStream> {
        let user_turn = Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        };

        let mut contents = self.history.lock().await.clone();
        contents.push(user_turn.clone());
        let request = self.build_request(contents);

        debug!("Sending streaming request for model {}", self.config.model);

        let response = self
            .client
            .post(self.stream_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            let mut response = response;
            let mut buffer = String::new();
            let mut full_reply = String::new();

            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(ProviderError::HttpError(err)));
                        return;
                    }
                };

                let text = String::from_utf8_lossy(&chunk);
                buffer.push_str(&text);

                for payload in Self::parse_sse_events(&mut buffer) {
                    let parsed = match serde_json::from_str::<GenerateContentResponse>(&payload) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            let _ = tx.send(Err(ProviderError::JsonError(err)));
                            return;
                        }
                    };

                    if let Some(fragment) = extract_text(&parsed) {
                        full_reply.push_str(&fragment);
                        let _ = tx.send(Ok(fragment));
                    }
                }
            }

            // Commit the turn only after the stream finished cleanly, so a
            // failed turn does not leave a half-answered exchange in context.
            let mut contents = history.lock().await;
            contents.push(user_turn);
            contents.push(Content {
                role: "model".to_string(),
                parts: vec![Part { text: full_reply }],
            });
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}
