//! 操作参数解析与校验
//!
//! 模型给出的参数是 JSON；这里统一转成类型化参数结构体，失败一律为 AgentError::Validation，
//! 由执行器写回对话让模型纠正。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::core::AgentError;

/// 参数 JSON 转为类型化结构；null 视为空对象，未知键忽略
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, AgentError> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        Value::String(raw) => {
            return Err(AgentError::Validation(format!(
                "arguments must be a JSON object, got: {raw}"
            )))
        }
        other => other,
    };
    serde_json::from_value(args).map_err(|e| AgentError::Validation(e.to_string()))
}

/// 路径中使用的 ID：非空且不含路径分隔符
pub fn require_id<'a>(field: &str, value: &'a str) -> Result<&'a str, AgentError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AgentError::Validation(format!("{field} must not be empty")));
    }
    if value.contains(['/', '?', '#']) {
        return Err(AgentError::Validation(format!(
            "{field} contains invalid characters: {value}"
        )));
    }
    Ok(value)
}

/// 以 JSON 字符串形式传入的列表（如 "[123, 456]"）；空串视为未提供
pub fn parse_json_list<T: DeserializeOwned>(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<Vec<T>>, AgentError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| AgentError::Validation(format!("{field} must be a JSON array: {e}")))
}

/// 能解析为 JSON 就用 JSON 值，否则保留原始字符串
pub fn parse_loose_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// ID 字段同时接受字符串与数字
pub fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(s) => s,
        IdRepr::Number(n) => n.to_string(),
    })
}
