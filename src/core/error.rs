//! Agent 错误类型
//!
//! 分两层：工具级错误（参数校验、远端 HTTP 失败、未知操作等）写回对话成为 tool 结果，
//! 由模型在下一轮推理中自行纠正；回合级错误（模型调用失败、会话冲突、取消、检查点读写失败）
//! 直接返回给调用方，且不写入检查点。

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 必需的凭据或标识缺失，启动时即失败
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid arguments: {0}")]
    Validation(String),

    /// 远端返回非 2xx，携带状态码与响应体
    #[error("Remote service returned HTTP {status}: {body}")]
    RemoteService { status: u16, body: String },

    /// 连接失败、超时或响应体无法解码
    #[error("Remote request failed: {0}")]
    RemoteTransport(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// 外部动作由调用方执行，本地从不执行
    #[error("Action '{0}' is handled by the client and was not executed")]
    ExternalAction(String),

    /// 回合开始时仍未收到调用方结果的外部动作
    #[error("No result was supplied for action '{0}'")]
    MissingActionResult(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Model access failed: {0}")]
    ModelAccess(#[from] LlmError),

    /// 同一会话已有回合在进行中
    #[error("Session '{0}' already has a turn in flight")]
    StateConflict(String),

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl AgentError {
    /// 工具级错误：写回对话供模型处理，而不是中断回合
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            AgentError::Validation(_)
                | AgentError::RemoteService { .. }
                | AgentError::RemoteTransport(_)
                | AgentError::UnknownOperation(_)
                | AgentError::ExternalAction(_)
                | AgentError::MissingActionResult(_)
                | AgentError::ToolTimeout(_)
        )
    }
}
