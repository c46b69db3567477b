//! Gemini 客户端（走 Google 提供的 OpenAI 兼容端点）
//!
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai
//! - 默认模型: gemini-2.0-flash

use std::time::Duration;

use crate::llm::OpenAiClient;

/// Gemini API 常量
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";

/// 创建 Gemini 客户端；model 为空时使用 gemini-2.0-flash
pub fn create_gemini_client(api_key: &str, model: Option<&str>, request_timeout: Duration) -> OpenAiClient {
    let model = model.filter(|m| !m.is_empty()).unwrap_or(GEMINI_FLASH);
    OpenAiClient::new(Some(GEMINI_OPENAI_BASE_URL), model, api_key, request_timeout)
}
