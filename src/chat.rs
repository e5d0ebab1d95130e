// Chat service: composes the prompt and talks to the completion API.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_MODEL: &str = "mistral-small-latest";

/// The corpus excerpt embedded in the system prompt is capped so oversized
/// course material cannot blow up the request.
const CORPUS_CHAR_LIMIT: usize = 8_000;

const SYSTEM_GUIDANCE: &str = "You are a helpful teaching assistant for INFO 6200, \
a Python coding course. Answer student questions clearly and concisely based on the \
course materials provided. If the answer isn't in the course materials, provide \
general Python guidance but mention that students should verify with their professor.";

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Constructed once at startup with the corpus blob and handed to request
/// handlers; the corpus is immutable for the lifetime of the process.
pub struct ChatService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    corpus_text: String,
}

impl ChatService {
    pub fn new(api_key: String, base_url: String, corpus_text: String) -> Self {
        ChatService {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: DEFAULT_MODEL.to_string(),
            corpus_text,
        }
    }

    /// Answer a question. Never fails past this boundary: any error from
    /// the external call is converted into a displayable apology string,
    /// which callers persist as the answer like any other.
    pub async fn answer(&self, question: &str) -> String {
        match self.complete(question).await {
            Ok(answer) => answer,
            Err(e) => format!(
                "I apologize, but I encountered an error: {}\nPlease try again.",
                e
            ),
        }
    }

    fn system_message(&self) -> String {
        let mut message = SYSTEM_GUIDANCE.to_string();
        if !self.corpus_text.is_empty() {
            let excerpt: String = self.corpus_text.chars().take(CORPUS_CHAR_LIMIT).collect();
            message.push_str("\n\nCourse Materials:\n");
            message.push_str(&excerpt);
        }
        message
    }

    async fn complete(&self, question: &str) -> Result<String> {
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: self.system_message(),
                },
                Message {
                    role: "user".to_string(),
                    content: question.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Completion(format!("{} - {}", status, text)));
        }

        let data: CompletionResponse = response.json().await?;
        data.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Completion("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_embeds_a_truncated_corpus() {
        let service = ChatService::new(
            "key".to_string(),
            "http://localhost".to_string(),
            "x".repeat(20_000),
        );
        let message = service.system_message();
        assert!(message.starts_with(SYSTEM_GUIDANCE));
        assert!(message.contains("Course Materials:"));
        assert!(message.len() < SYSTEM_GUIDANCE.len() + CORPUS_CHAR_LIMIT + 100);
    }

    #[test]
    fn system_message_without_corpus_is_just_the_guidance() {
        let service =
            ChatService::new("key".to_string(), "http://localhost".to_string(), String::new());
        assert_eq!(service.system_message(), SYSTEM_GUIDANCE);
    }

    #[tokio::test]
    async fn unreachable_api_yields_an_apology_not_an_error() {
        let service = ChatService::new(
            "key".to_string(),
            // Nothing listens here; the send fails immediately.
            "http://127.0.0.1:9/v1".to_string(),
            String::new(),
        );
        let answer = service.answer("what is a tuple?").await;
        assert!(answer.starts_with("I apologize, but I encountered an error:"));
        assert!(answer.ends_with("Please try again."));
    }
}
