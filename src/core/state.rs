//! 回合状态机的阶段

use serde::{Deserialize, Serialize};

/// Reasoning ⇄ Dispatch → Done
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// 调用模型，决定直接回复还是请求工具
    Reasoning,
    /// 执行本地操作并写回结果
    Dispatch,
    /// 检查点已写入，控制权交回调用方
    Done,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnPhase::Reasoning => "reasoning",
            TurnPhase::Dispatch => "dispatch",
            TurnPhase::Done => "done",
        };
        f.write_str(s)
    }
}
