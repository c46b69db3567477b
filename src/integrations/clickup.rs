//! ClickUp REST 客户端（API v2）
//!
//! ProjectService 每个方法对应一次 HTTP 调用：构造请求、2xx 时返回解码后的 JSON，
//! 否则返回 RemoteService{status, body}；连接失败或响应体无法解码返回 RemoteTransport。
//! 不做重试、缓存与限流。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;

pub const CLICKUP_API_BASE: &str = "https://api.clickup.com/api/v2";

/// 任务优先级，线上编码固定为 1..=4
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    Urgent = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "urgent" => Some(Priority::Urgent),
            "high" => Some(Priority::High),
            "normal" => Some(Priority::Normal),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// 从 ClickUp 返回的任务对象中读取优先级：
    /// `{"priority": {"id": "1", "priority": "urgent"}}`、数字或 null
    pub fn from_task(task: &Value) -> Option<Self> {
        match task.get("priority")? {
            Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()).and_then(|n| Self::try_from(n).ok()),
            Value::Object(obj) => obj
                .get("id")
                .and_then(|id| match id {
                    Value::String(s) => s.parse::<u8>().ok(),
                    Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
                    _ => None,
                })
                .and_then(|n| Self::try_from(n).ok())
                .or_else(|| obj.get("priority").and_then(Value::as_str).and_then(Self::from_label)),
            _ => None,
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Urgent),
            2 => Ok(Priority::High),
            3 => Ok(Priority::Normal),
            4 => Ok(Priority::Low),
            other => Err(format!(
                "priority must be 1 (urgent), 2 (high), 3 (normal) or 4 (low), got {other}"
            )),
        }
    }
}

/// 新建任务的请求体；due_date_time / start_date_time 总是发送
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewTask {
    pub name: String,
    pub due_date_time: bool,
    pub start_date_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_estimate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// 更新任务的请求体：只发送给出的字段
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_time: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_estimate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

/// 项目管理服务接口（ClickUp 实现 + 测试替身）
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn get_spaces(&self) -> Result<Value, AgentError>;

    async fn get_lists(&self, space_id: &str) -> Result<Value, AgentError>;

    async fn get_tasks(&self, list_id: &str) -> Result<Value, AgentError>;

    async fn create_task(&self, list_id: &str, task: &NewTask) -> Result<Value, AgentError>;

    async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Value, AgentError>;

    async fn delete_task(&self, task_id: &str) -> Result<Value, AgentError>;

    async fn get_task_by_id(&self, task_id: &str) -> Result<Value, AgentError>;

    async fn set_custom_field_value(
        &self,
        task_id: &str,
        field_id: &str,
        value: &Value,
    ) -> Result<Value, AgentError>;
}

/// ClickUp HTTP 客户端：凭据放在默认请求头中，团队 ID 用于 get_spaces
#[derive(Clone, Debug)]
pub struct ClickUpClient {
    http: reqwest::Client,
    base_url: String,
    team_id: String,
}

impl ClickUpClient {
    pub fn new(
        api_key: &str,
        team_id: &str,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("CLICKUP_API_KEY is empty".to_string()));
        }
        if team_id.trim().is_empty() {
            return Err(AgentError::Config("CLICKUP_TEAM_ID is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(api_key)
            .map_err(|e| AgentError::Config(format!("invalid CLICKUP_API_KEY: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(CLICKUP_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            team_id: team_id.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, AgentError> {
        let resp = req
            .send()
            .await
            .map_err(|e| AgentError::RemoteTransport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AgentError::RemoteTransport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "ClickUp API error");
            return Err(AgentError::RemoteService {
                status: status.as_u16(),
                body,
            });
        }
        // DELETE 通常返回空体
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&body)
            .map_err(|e| AgentError::RemoteTransport(format!("invalid JSON from ClickUp: {e}")))
    }
}

#[async_trait]
impl ProjectService for ClickUpClient {
    async fn get_spaces(&self) -> Result<Value, AgentError> {
        let path = format!("/team/{}/space", self.team_id);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn get_lists(&self, space_id: &str) -> Result<Value, AgentError> {
        let path = format!("/space/{space_id}/list");
        self.send(self.request(Method::GET, &path)).await
    }

    async fn get_tasks(&self, list_id: &str) -> Result<Value, AgentError> {
        let path = format!("/list/{list_id}/task");
        self.send(self.request(Method::GET, &path)).await
    }

    async fn create_task(&self, list_id: &str, task: &NewTask) -> Result<Value, AgentError> {
        let path = format!("/list/{list_id}/task");
        self.send(self.request(Method::POST, &path).json(task)).await
    }

    async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Value, AgentError> {
        let path = format!("/task/{task_id}");
        self.send(self.request(Method::PUT, &path).json(update)).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<Value, AgentError> {
        let path = format!("/task/{task_id}");
        self.send(self.request(Method::DELETE, &path)).await
    }

    async fn get_task_by_id(&self, task_id: &str) -> Result<Value, AgentError> {
        let path = format!("/task/{task_id}");
        self.send(self.request(Method::GET, &path)).await
    }

    async fn set_custom_field_value(
        &self,
        task_id: &str,
        field_id: &str,
        value: &Value,
    ) -> Result<Value, AgentError> {
        let path = format!("/task/{task_id}/field/{field_id}");
        let body = serde_json::json!({ "value": value });
        self.send(self.request(Method::POST, &path).json(&body)).await
    }
}
