//! 认知层：推理步（Planner）与分发步（Dispatcher）

pub mod dispatcher;
pub mod planner;

pub use dispatcher::{DispatchOutcome, Dispatcher, ExternalPolicy, ToolOutcome};
pub use planner::{merge_tool_specs, Planner, DEFAULT_PERSONA};
