//! 工作区层级查询：spaces / lists

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::integrations::ProjectService;
use crate::tools::args::{de_id, parse_args, require_id};
use crate::tools::schema::parameters_schema;
use crate::tools::Tool;

/// 列出团队下所有 space
pub struct GetSpacesTool {
    service: Arc<dyn ProjectService>,
}

impl GetSpacesTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetSpacesTool {
    fn name(&self) -> &str {
        "get_spaces"
    }

    fn description(&self) -> &str {
        "Get all workspace spaces from ClickUp. Returns every space available in the user's workspace."
    }

    async fn execute(&self, _args: Value) -> Result<Value, AgentError> {
        self.service.get_spaces().await
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetListsArgs {
    /// The ID of the ClickUp space
    #[serde(deserialize_with = "de_id")]
    #[schemars(with = "String")]
    pub space_id: String,
}

/// 列出某个 space 下的 list
pub struct GetListsTool {
    service: Arc<dyn ProjectService>,
}

impl GetListsTool {
    pub fn new(service: Arc<dyn ProjectService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetListsTool {
    fn name(&self) -> &str {
        "get_lists"
    }

    fn description(&self) -> &str {
        "Get all lists for a specific ClickUp space. Lists contain the tasks."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<GetListsArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let args: GetListsArgs = parse_args(args)?;
        let space_id = require_id("space_id", &args.space_id)?;
        self.service.get_lists(space_id).await
    }
}
