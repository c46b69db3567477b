//! 自定义字段赋值

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::integrations::ProjectService;
use crate::tools::args::{de_id, parse_args, parse_loose_value, require_id};
use crate::tools::schema::parameters_schema;
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetCustomFieldArgs {
    /// The ID of the task
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub task_id: String,
    /// The ID of the custom field
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub field_id: String,
    /// The value to set, as a string; JSON values such as 42 or ["a"] are converted to their type
    #[schemars(with = "String")]
    pub value: Value,
}

/// value 为字符串时尝试按 JSON 解析，失败保留原文；已是 JSON 值时原样使用
fn field_value(value: Value) -> Value {
    match value {
        Value::String(raw) => parse_loose_value(&raw),
        other => other,
    }
}

pub struct SetCustomFieldValueTool {
    service: Arc<dyn ProjectService>,
}

impl SetCustomFieldValueTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for SetCustomFieldValueTool {
    fn name(&self) -> &str {
        "set_custom_field_value"
    }

    fn description(&self) -> &str {
        "Set a value for a custom field on a ClickUp task."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<SetCustomFieldArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: SetCustomFieldArgs = parse_args(args)?;
        let task_id = require_id("task_id", &args.task_id)?;
        let field_id = require_id("field_id", &args.field_id)?;
        self.service
            .set_custom_field_value(task_id, field_id, &field_value(args.value))
            .await
    }
}
