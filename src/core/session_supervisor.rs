//! 会话监管：同一会话同一时刻只允许一个回合，并持有各回合的取消令牌
//!
//! begin() 登记会话并返回 TurnGuard；guard 在回合结束（完成、出错、取消、被 drop）时自动注销。
//! 第二个并发回合直接得到 StateConflict，不排队。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;

type ActiveTurns = Arc<Mutex<HashMap<String, CancellationToken>>>;

fn lock(active: &ActiveTurns) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 会话级生命周期管理：进行中的回合与其取消令牌
#[derive(Debug, Clone, Default)]
pub struct SessionSupervisor {
    active: ActiveTurns,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个回合；该会话已有回合在进行时返回 StateConflict
    pub fn begin(&self, session_id: &str, cancel: CancellationToken) -> Result<TurnGuard, AgentError> {
        let mut active = lock(&self.active);
        if active.contains_key(session_id) {
            return Err(AgentError::StateConflict(session_id.to_string()));
        }
        active.insert(session_id.to_string(), cancel);
        Ok(TurnGuard {
            session_id: session_id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    /// 取消会话当前回合（用户 Ctrl+C / HTTP 断开）；返回是否存在进行中的回合
    pub fn cancel(&self, session_id: &str) -> bool {
        match lock(&self.active).get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        lock(&self.active).contains_key(session_id)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

/// 回合占用凭证，drop 时释放会话
#[derive(Debug)]
pub struct TurnGuard {
    session_id: String,
    active: ActiveTurns,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.session_id);
    }
}
