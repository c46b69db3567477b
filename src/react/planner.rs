//! Planner：推理步
//!
//! 每次推理把 system 指令（助手身份 + 回复语言 + 已缓存的 ID）拼到对话历史前，
//! 连同本回合可调用的工具列表（本地操作 ∪ 外部动作）一起交给 LLM，得到一条 assistant 消息。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{LlmClient, ToolSpec};
use crate::memory::{ConversationState, Message};

/// 默认助手身份
pub const DEFAULT_PERSONA: &str =
    "You are a helpful project management assistant capable of managing tasks in ClickUp.";

/// system 中每类缓存最多列出的条目数
const MAX_CACHED_IN_PROMPT: usize = 20;

/// 合并本回合可调用工具：外部动作在前；与外部动作同名的本地操作不再暴露
pub fn merge_tool_specs(local: &[ToolSpec], external: &[ToolSpec]) -> Vec<ToolSpec> {
    let mut merged: Vec<ToolSpec> = external.to_vec();
    merged.extend(
        local
            .iter()
            .filter(|l| !external.iter().any(|e| e.name == l.name))
            .cloned(),
    );
    merged
}

/// Planner：持有 LLM 与助手身份描述
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    persona: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_persona(llm, DEFAULT_PERSONA)
    }

    pub fn with_persona(llm: Arc<dyn LlmClient>, persona: impl Into<String>) -> Self {
        Self {
            llm,
            persona: persona.into(),
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub fn system_prompt(&self, state: &ConversationState) -> String {
        let mut prompt = format!("{} Talk in {}.", self.persona, state.language);
        let sections = [
            ("spaces", &state.spaces),
            ("lists", &state.lists),
            ("tasks", &state.tasks),
        ];
        for (label, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            let start = entries.len().saturating_sub(MAX_CACHED_IN_PROMPT);
            prompt.push_str(&format!(
                "\nKnown ClickUp {label} (id:name): {}",
                entries[start..].join(", ")
            ));
        }
        prompt
    }

    /// 一次推理：返回模型的 assistant 消息；模型调用失败为 ModelAccess
    pub async fn reason(
        &self,
        state: &ConversationState,
        tools: &[ToolSpec],
    ) -> Result<Message, AgentError> {
        let mut full_messages = Vec::with_capacity(state.messages().len() + 1);
        full_messages.push(Message::system(self.system_prompt(state)));
        full_messages.extend(state.messages().iter().cloned());
        let reply = self.llm.complete_with_tools(&full_messages, tools).await?;
        Ok(reply)
    }
}
