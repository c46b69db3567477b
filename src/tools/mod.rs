//! 工具层：本地 ClickUp 操作集、注册表与执行器

pub mod args;
pub mod custom_field;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod spaces;
pub mod tasks;

use std::sync::Arc;

use crate::integrations::ProjectService;

pub use custom_field::SetCustomFieldValueTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use schema::parameters_schema;
pub use spaces::{GetListsTool, GetSpacesTool};
pub use tasks::{CreateTaskTool, DeleteTaskTool, GetTaskByIdTool, GetTasksTool, UpdateTaskTool};

/// 固定的八个操作，按此顺序暴露给模型；进程启动时构建一次
pub fn project_operations(service: Arc<dyn ProjectService>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(GetSpacesTool::new(Arc::clone(&service)));
    registry.register(GetListsTool::new(Arc::clone(&service)));
    registry.register(GetTasksTool::new(Arc::clone(&service)));
    registry.register(CreateTaskTool::new(Arc::clone(&service)));
    registry.register(UpdateTaskTool::new(Arc::clone(&service)));
    registry.register(DeleteTaskTool::new(Arc::clone(&service)));
    registry.register(GetTaskByIdTool::new(Arc::clone(&service)));
    registry.register(SetCustomFieldValueTool::new(service));
    registry
}
