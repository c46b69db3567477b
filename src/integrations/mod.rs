//! 外部集成：ClickUp REST 客户端；HTTP 接入层（需 `web` feature）

pub mod clickup;
#[cfg(test)]
pub mod fake;
#[cfg(feature = "web")]
pub mod http;

pub use clickup::{ClickUpClient, NewTask, Priority, ProjectService, TaskUpdate, CLICKUP_API_BASE};
