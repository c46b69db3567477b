//! Mock LLM 客户端（用于测试，无需 API）
//!
//! - MockLlmClient：回显最后一条 User 消息，从不请求工具，便于本地跑通回合流程
//! - ScriptedLlmClient：按预设顺序返回回复，并记录每次请求，供回合控制器测试使用

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<Message, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(Message::assistant(format!("Echo from Mock: {}", last_user)))
    }
}

/// 一次模型调用的记录
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// 脚本化客户端：依次弹出预设回复；脚本耗尽后返回纯文本 "(script exhausted)"
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<Message, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前等待一段时间（用于取消、并发冲突测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reply_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(Message::assistant(text)))
    }

    pub fn reply_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.push(Ok(Message::assistant_with_tool_calls("", calls)))
    }

    pub fn reply_error(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    fn push(self, reply: Result<Message, LlmError>) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Message, LlmError> {
        lock(&self.requests).push(RecordedRequest {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Ok(Message::assistant("(script exhausted)")))
    }
}
