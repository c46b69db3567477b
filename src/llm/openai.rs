//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini、OpenAI、自建代理均走这里。
//! 负责 Message / ToolSpec 与 chat completion 请求格式之间的双向转换。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, request_timeout: Duration) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout,
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn build_err(e: OpenAIError) -> LlmError {
    LlmError::InvalidRequest(e.to_string())
}

/// 内部 Message 转为 chat completion 请求消息
pub(crate) fn to_openai_messages(
    messages: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    messages
        .iter()
        .map(|m| {
            let msg = match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(build_err)?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(build_err)?,
                ),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() || m.tool_calls.is_empty() {
                        args.content(m.content.clone());
                    }
                    if !m.tool_calls.is_empty() {
                        args.tool_calls(m.tool_calls.iter().map(to_openai_tool_call).collect::<Vec<_>>());
                    }
                    ChatCompletionRequestMessage::Assistant(args.build().map_err(build_err)?)
                }
                Role::Tool => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.clone())
                        .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                        .build()
                        .map_err(build_err)?,
                ),
            };
            Ok(msg)
        })
        .collect()
}

fn to_openai_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCalls {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
        id: call.id.clone(),
        function: FunctionCall {
            name: call.name.clone(),
            arguments,
        },
    })
}

pub(crate) fn to_openai_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTools> {
    tools
        .iter()
        .map(|t| {
            ChatCompletionTools::Function(ChatCompletionTool {
                function: FunctionObject {
                    name: t.name.clone(),
                    description: (!t.description.is_empty()).then(|| t.description.clone()),
                    parameters: Some(t.parameters.clone()),
                    strict: None,
                },
            })
        })
        .collect()
}

/// 模型返回的工具调用转为内部 ToolCall；参数不是合法 JSON 时保留原始字符串，交给工具校验报错
pub(crate) fn from_openai_tool_calls(calls: Vec<ChatCompletionMessageToolCalls>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .filter_map(|c| match c {
            ChatCompletionMessageToolCalls::Function(f) => {
                let arguments = if f.function.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&f.function.arguments)
                        .unwrap_or(Value::String(f.function.arguments))
                };
                let id = if f.id.is_empty() {
                    format!("call_{}", uuid::Uuid::new_v4().simple())
                } else {
                    f.id
                };
                Some(ToolCall::new(id, f.function.name, arguments))
            }
            ChatCompletionMessageToolCalls::Custom(c) => {
                tracing::warn!(id = %c.id, "ignoring custom tool call");
                None
            }
        })
        .collect()
}

fn map_openai_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::Reqwest(e) => LlmError::Network(e.to_string()),
        OpenAIError::ApiError(api) => {
            let rate_limited = api
                .code
                .as_deref()
                .map(|c| c.contains("rate_limit"))
                .unwrap_or(false);
            if rate_limited {
                LlmError::RateLimited { retry_after_ms: 0 }
            } else {
                LlmError::Api(api.to_string())
            }
        }
        OpenAIError::JSONDeserialize(e, _) => LlmError::InvalidResponse(e.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg),
        other => LlmError::Api(other.to_string()),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Message, LlmError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(to_openai_messages(messages)?);
        if !tools.is_empty() {
            builder.tools(to_openai_tools(tools));
        }
        let request = builder.build().map_err(build_err)?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(self.request_timeout.as_secs()))?
            .map_err(map_openai_error)?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .map(from_openai_tool_calls)
            .unwrap_or_default();

        tracing::debug!(
            model = %self.model,
            tool_calls = tool_calls.len(),
            "chat completion received"
        );

        Ok(Message::assistant_with_tool_calls(content, tool_calls))
    }
}
