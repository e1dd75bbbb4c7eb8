//! services/api/src/adapters/llm.rs
//!
//! The adapter for the text-generation LLM. It implements the `LlmService` port
//! from the `core` crate on top of any OpenAI-compatible chat completion endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use roadmap_core::domain::{ChatRole, ChatTurn};
use roadmap_core::ports::{LlmService, PortError, PortResult};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LlmService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiLlmAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmAdapter {
    /// Creates a new `OpenAiLlmAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn system_message(text: &str) -> PortResult<ChatCompletionRequestMessage> {
        Ok(ChatCompletionRequestSystemMessageArgs::default()
            .content(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into())
    }

    fn message_for(turn: &ChatTurn) -> PortResult<ChatCompletionRequestMessage> {
        match turn.role {
            ChatRole::System => Self::system_message(&turn.text),
            ChatRole::User => Ok(ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()),
            ChatRole::Model => Ok(ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()),
        }
    }

    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Generation("LLM returned no choices in its response.".to_string()))?
            .message
            .content
            .ok_or_else(|| PortError::Generation("LLM response contained no text content.".to_string()))?;

        debug!(model = %self.model, chars = content.len(), "LLM completion received");
        Ok(content)
    }
}

//=========================================================================================
// `LlmService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LlmService for OpenAiLlmAdapter {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into();
        self.complete(vec![message]).await
    }

    /// Sends the conversation as role-tagged messages instead of one flattened prompt.
    async fn converse(&self, system: Option<&str>, turns: &[ChatTurn]) -> PortResult<String> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        if let Some(system) = system {
            messages.push(Self::system_message(system)?);
        }
        for turn in turns {
            messages.push(Self::message_for(turn)?);
        }
        self.complete(messages).await
    }
}
