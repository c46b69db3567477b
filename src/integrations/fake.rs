//! 测试替身：记录每次调用与请求体，返回预设结果

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::integrations::{NewTask, ProjectService, TaskUpdate};

/// 一次调用：操作名、路径参数、请求体
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub ids: Vec<String>,
    pub payload: Value,
}

#[derive(Default)]
pub struct RecordingProjectService {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, (u16, String)>>,
}

impl RecordingProjectService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, operation: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(operation.to_string(), value);
        self
    }

    pub fn fail(self, operation: &str, status: u16, body: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), (status, body.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, ids: &[&str], payload: Value) -> Result<Value, AgentError> {
        self.calls.lock().unwrap().push(RecordedCall {
            operation: operation.to_string(),
            ids: ids.iter().map(|s| s.to_string()).collect(),
            payload,
        });
        if let Some((status, body)) = self.failures.lock().unwrap().get(operation).cloned() {
            return Err(AgentError::RemoteService { status, body });
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(operation)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}

#[async_trait]
impl ProjectService for RecordingProjectService {
    async fn get_spaces(&self) -> Result<Value, AgentError> {
        self.record("get_spaces", &[], Value::Null)
    }

    async fn get_lists(&self, space_id: &str) -> Result<Value, AgentError> {
        self.record("get_lists", &[space_id], Value::Null)
    }

    async fn get_tasks(&self, list_id: &str) -> Result<Value, AgentError> {
        self.record("get_tasks", &[list_id], Value::Null)
    }

    async fn create_task(&self, list_id: &str, task: &NewTask) -> Result<Value, AgentError> {
        let payload = serde_json::to_value(task).unwrap();
        self.record("create_task", &[list_id], payload)
    }

    async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Value, AgentError> {
        let payload = serde_json::to_value(update).unwrap();
        self.record("update_task", &[task_id], payload)
    }

    async fn delete_task(&self, task_id: &str) -> Result<Value, AgentError> {
        self.record("delete_task", &[task_id], Value::Null)
    }

    async fn get_task_by_id(&self, task_id: &str) -> Result<Value, AgentError> {
        self.record("get_task_by_id", &[task_id], Value::Null)
    }

    async fn set_custom_field_value(
        &self,
        task_id: &str,
        field_id: &str,
        value: &Value,
    ) -> Result<Value, AgentError> {
        self.record(
            "set_custom_field_value",
            &[task_id, field_id],
            json!({ "value": value }),
        )
    }
}
