//! 任务操作：查询、创建、更新、删除

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::integrations::{NewTask, Priority, ProjectService, TaskUpdate};
use crate::tools::args::{de_id, parse_args, parse_json_list, require_id};
use crate::tools::schema::parameters_schema;
use crate::tools::Tool;

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn priority(raw: Option<u8>) -> Result<Option<Priority>, AgentError> {
    raw.map(Priority::try_from)
        .transpose()
        .map_err(AgentError::Validation)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListIdArgs {
    /// The ID of the ClickUp list
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub list_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskIdArgs {
    /// The ID of the task
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub task_id: String,
}

/// 列出某个 list 下的任务
pub struct GetTasksTool {
    service: Arc<dyn ProjectService>,
}

impl GetTasksTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetTasksTool {
    fn name(&self) -> &str {
        "get_tasks"
    }

    fn description(&self) -> &str {
        "Get all tasks for a specific ClickUp list. Each task is an individual work item."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<ListIdArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: ListIdArgs = parse_args(args)?;
        let list_id = require_id("list_id", &args.list_id)?;
        self.service.get_tasks(list_id).await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskArgs {
    /// The ID of the ClickUp list
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub list_id: String,
    /// The name of the task
    pub name: String,
    /// The description of the task
    #[serde(default)]
    pub description: Option<String>,
    /// The due date as unix timestamp in milliseconds
    #[serde(default)]
    pub due_date: Option<i64>,
    /// The priority of the task (1=urgent, 2=high, 3=normal, 4=low)
    #[serde(default)]
    #[schemars(range(min = 1, max = 4))]
    pub priority: Option<u8>,
    /// Whether the due date includes time
    #[serde(default)]
    pub due_date_time: Option<bool>,
    /// The time estimate in milliseconds
    #[serde(default)]
    pub time_estimate: Option<i64>,
    /// The start date as unix timestamp in milliseconds
    #[serde(default)]
    pub start_date: Option<i64>,
    /// Whether the start date includes time
    #[serde(default)]
    pub start_date_time: Option<bool>,
    /// JSON string of assignee user IDs, e.g. "[123, 456]"
    #[serde(default)]
    pub assignees: Option<String>,
    /// JSON string of tags, e.g. '["tag1", "tag2"]'
    #[serde(default)]
    pub tags: Option<String>,
    /// The status of the task
    #[serde(default)]
    pub status: Option<String>,
}

impl CreateTaskArgs {
    /// 校验并转换为请求体；空字符串、0 值视为未提供
    pub fn into_new_task(self) -> Result<(String, NewTask), AgentError> {
        let list_id = require_id("list_id", &self.list_id)?.to_string();
        if self.name.trim().is_empty() {
            return Err(AgentError::Validation("name must not be empty".to_string()));
        }
        let task = NewTask {
            name: self.name,
            due_date_time: self.due_date_time.unwrap_or(false),
            start_date_time: self.start_date_time.unwrap_or(false),
            description: non_empty(self.description),
            due_date: self.due_date.filter(|d| *d != 0),
            priority: priority(self.priority)?,
            time_estimate: self.time_estimate.filter(|t| *t != 0),
            start_date: self.start_date.filter(|d| *d != 0),
            assignees: parse_json_list("assignees", self.assignees.as_deref())?
                .filter(|a| !a.is_empty()),
            tags: parse_json_list("tags", self.tags.as_deref())?.filter(|t| !t.is_empty()),
            status: non_empty(self.status),
        };
        Ok((list_id, task))
    }
}

/// 在指定 list 中新建任务
pub struct CreateTaskTool {
    service: Arc<dyn ProjectService>,
}

impl CreateTaskTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a new project task in a specific ClickUp list. Returns the created task."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<CreateTaskArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: CreateTaskArgs = parse_args(args)?;
        let (list_id, task) = args.into_new_task()?;
        self.service.create_task(&list_id, &task).await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskArgs {
    /// The ID of the task to update
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub task_id: String,
    /// New name for the task
    #[serde(default)]
    pub name: Option<String>,
    /// New description for the task
    #[serde(default)]
    pub description: Option<String>,
    /// New status for the task
    #[serde(default)]
    pub status: Option<String>,
    /// New priority (1=urgent, 2=high, 3=normal, 4=low)
    #[serde(default)]
    #[schemars(range(min = 1, max = 4))]
    pub priority: Option<u8>,
    /// New due date as unix timestamp in milliseconds
    #[serde(default)]
    pub due_date: Option<i64>,
    /// Whether the due date includes time
    #[serde(default)]
    pub due_date_time: Option<bool>,
    /// New time estimate in milliseconds
    #[serde(default)]
    pub time_estimate: Option<i64>,
    /// New start date as unix timestamp in milliseconds
    #[serde(default)]
    pub start_date: Option<i64>,
    /// Whether the start date includes time
    #[serde(default)]
    pub start_date_time: Option<bool>,
    /// JSON string of assignee user IDs, e.g. "[123, 456]"
    #[serde(default)]
    pub assignees: Option<String>,
    /// Whether the task is archived
    #[serde(default)]
    pub archived: Option<bool>,
}

impl UpdateTaskArgs {
    pub fn into_update(self) -> Result<(String, TaskUpdate), AgentError> {
        let task_id = require_id("task_id", &self.task_id)?.to_string();
        let update = TaskUpdate {
            name: non_empty(self.name),
            description: non_empty(self.description),
            status: non_empty(self.status),
            priority: priority(self.priority)?,
            due_date: self.due_date,
            due_date_time: self.due_date_time,
            time_estimate: self.time_estimate,
            start_date: self.start_date,
            start_date_time: self.start_date_time,
            assignees: parse_json_list("assignees", self.assignees.as_deref())?,
            archived: self.archived,
        };
        Ok((task_id, update))
    }
}

/// 更新已有任务（只发送给出的字段）
pub struct UpdateTaskTool {
    service: Arc<dyn ProjectService>,
}

impl UpdateTaskTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update an existing project task in ClickUp. Only the fields provided are changed."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<UpdateTaskArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: UpdateTaskArgs = parse_args(args)?;
        let (task_id, update) = args.into_update()?;
        self.service.update_task(&task_id, &update).await
    }
}

pub struct DeleteTaskTool {
    service: Arc<dyn ProjectService>,
}

impl DeleteTaskTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &str {
        "delete_task"
    }

    fn description(&self) -> &str {
        "Delete a project task from ClickUp."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<TaskIdArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: TaskIdArgs = parse_args(args)?;
        let task_id = require_id("task_id", &args.task_id)?;
        self.service.delete_task(task_id).await
    }
}

pub struct GetTaskByIdTool {
    service: Arc<dyn ProjectService>,
}

impl GetTaskByIdTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetTaskByIdTool {
    fn name(&self) -> &str {
        "get_task_by_id"
    }

    fn description(&self) -> &str {
        "Get a specific project task by its ID, including status, assignees and dates."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<TaskIdArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: TaskIdArgs = parse_args(args)?;
        let task_id = require_id("task_id", &args.task_id)?;
        self.service.get_task_by_id(task_id).await
    }
}
