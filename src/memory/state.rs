//! 会话状态：对话历史 + 项目管理相关的缓存字段
//!
//! 组合而非继承：ConversationState 内嵌通用的 ConversationMemory，再加语言偏好与
//! spaces / lists / tasks 缓存。缓存只是便利，ClickUp 才是数据源。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{ConversationMemory, Message, ToolCall};

/// 默认回复语言
pub const DEFAULT_LANGUAGE: &str = "english";

/// 缓存字段最多保留的条目数
const MAX_CACHED_ENTRIES: usize = 200;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// 回合之间持久化的会话状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default, rename = "messages")]
    pub conversation: ConversationMemory,
    #[serde(default = "default_language")]
    pub language: String,
    /// "<id>:<name>" 快照
    #[serde(default)]
    pub spaces: Vec<String>,
    #[serde(default)]
    pub lists: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    /// 已交给调用方、尚未收到结果的外部动作调用 ID
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub awaiting_actions: Vec<String>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl ConversationState {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            conversation: ConversationMemory::new(),
            language: language.into(),
            spaces: Vec::new(),
            lists: Vec::new(),
            tasks: Vec::new(),
            awaiting_actions: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn push_message(&mut self, msg: Message) {
        self.conversation.push(msg);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }

    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.conversation.pending_tool_calls()
    }

    /// 成功的查询类操作刷新对应缓存；其它操作忽略
    pub fn record_operation_result(&mut self, operation: &str, result: &Value) {
        let (key, cache) = match operation {
            "get_spaces" => ("spaces", &mut self.spaces),
            "get_lists" => ("lists", &mut self.lists),
            "get_tasks" => ("tasks", &mut self.tasks),
            _ => return,
        };
        for entry in snapshot_entries(result, key) {
            if !cache.contains(&entry) {
                cache.push(entry);
            }
        }
        if cache.len() > MAX_CACHED_ENTRIES {
            let excess = cache.len() - MAX_CACHED_ENTRIES;
            cache.drain(..excess);
        }
    }
}

/// 从 {"<key>": [{"id": .., "name": ..}, ..]} 中提取 "<id>:<name>"
fn snapshot_entries(result: &Value, key: &str) -> Vec<String> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = match item.get("id")? {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    let name = item.get("name").and_then(Value::as_str).unwrap_or("");
                    Some(format!("{id}:{name}"))
                })
                .collect()
        })
        .unwrap_or_default()
}
