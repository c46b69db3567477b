//! 工具执行器
//!
//! 持有 ToolRegistry、单次调用超时与并发上限，execute(tool_name, args) 在超时内调用 registry.execute，
//! 超时转为 AgentError::ToolTimeout；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::ToolSpec;
use crate::tools::ToolRegistry;

/// 工具执行器：对每次调用施加超时与并发限制
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64, max_concurrent: usize) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs), max_concurrent)
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// 执行指定工具；超时返回 ToolTimeout，其余错误原样透传；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<Value, AgentError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AgentError::Cancelled)?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(AgentError::RemoteService { .. })) => (false, "remote_error"),
            Ok(Err(AgentError::Validation(_))) => (false, "invalid_args"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(r) => r,
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
