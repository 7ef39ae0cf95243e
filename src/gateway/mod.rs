// SPDX-License-Identifier: MIT

//! Boundary contracts for external delegates
//!
//! The engine itself never talks to a provider; it goes through the narrow
//! traits defined here. [TextGateway] is the text-generation call contract,
//! [bridge::CodingRuntime] the autonomous-coding-runtime one. Real
//! implementations live outside this crate; [EchoGateway] ships as the
//! in-tree simulated gateway for tests, demos and offline runs.

pub mod bridge;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A role-tagged message in a generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Generation parameters forwarded to the provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A completed generation round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// Call contract the engine expects from a text-generation service
#[async_trait]
pub trait TextGateway: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<Generation, GatewayError>;
}

/// Deterministic local gateway: answers with the last user message.
///
/// Stands in for a real provider wherever one is not wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGateway;

impl EchoGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGateway for EchoGateway {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> Result<Generation, GatewayError> {
        let prompt_tokens: u32 = messages
            .iter()
            .map(|m| m.content.split_whitespace().count() as u32)
            .sum();

        let text = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .ok_or_else(|| {
                GatewayError::InvalidResponse("no user message in request".to_string())
            })?;

        let completion_tokens = text.split_whitespace().count() as u32;

        Ok(Generation {
            text,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
            },
        })
    }
}
