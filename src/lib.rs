//! PM Agent - 基于 ClickUp 的项目管理对话智能体
//!
//! 模块划分：
//! - **agent**: 无头 Agent 运行时（供 REPL / HTTP 调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 回合控制器、回合阶段、会话监管、错误类型
//! - **integrations**: ClickUp REST 客户端与 HTTP 接入层
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **memory**: 对话历史、会话状态与检查点持久化
//! - **observability**: 日志初始化
//! - **react**: Planner（推理步）与 Dispatcher（分发步）
//! - **tools**: ClickUp 操作集、注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
