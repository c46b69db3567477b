//! 分发步：执行一条 assistant 消息中的本地工具调用
//!
//! 同一批调用并发执行（join_all），结果按请求顺序写回；外部动作从不在本地执行，
//! 只生成一条说明性的错误结果，保证每个请求都有且只有一个对应的 tool 结果。

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::memory::{Message, ToolCall};
use crate::tools::ToolExecutor;

/// 外部动作出现在待执行批次中时的处理口径
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternalPolicy {
    /// 模型在本地批次里混入了外部动作
    NotExecuted,
    /// 回合开始时调用方没有提供结果
    NoResultSupplied,
}

/// 单个调用的执行结果
#[derive(Debug)]
pub struct ToolOutcome {
    pub call: ToolCall,
    pub result: Result<Value, AgentError>,
}

impl ToolOutcome {
    /// 转为 tool 消息：成功为 JSON 文本，失败为 "Error: <原因>"
    pub fn to_message(&self) -> Message {
        let content = match &self.result {
            Ok(value) => value.to_string(),
            Err(e) => format!("Error: {e}"),
        };
        Message::tool_result(self.call.id.clone(), content)
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// 按请求顺序排列的结果
    Completed(Vec<ToolOutcome>),
    Cancelled,
}

pub struct Dispatcher {
    executor: Arc<ToolExecutor>,
}

impl Dispatcher {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// 执行一批调用；取消时丢弃进行中的远端请求并返回 Cancelled
    pub async fn dispatch(
        &self,
        calls: &[ToolCall],
        external: &[String],
        policy: ExternalPolicy,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let futures = calls.iter().map(|call| async move {
            let result = if external.iter().any(|name| name == &call.name) {
                Err(match policy {
                    ExternalPolicy::NotExecuted => AgentError::ExternalAction(call.name.clone()),
                    ExternalPolicy::NoResultSupplied => {
                        AgentError::MissingActionResult(call.name.clone())
                    }
                })
            } else {
                self.executor
                    .execute(&call.name, call.arguments.clone())
                    .await
            };
            match &result {
                Err(e) if e.is_tool_level() => {
                    tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                }
                Err(e) => {
                    tracing::error!(tool = %call.name, call_id = %call.id, error = %e, "tool call aborted");
                }
                Ok(_) => {}
            }
            ToolOutcome {
                call: call.clone(),
                result,
            }
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => DispatchOutcome::Cancelled,
            outcomes = join_all(futures) => DispatchOutcome::Completed(outcomes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::fake::RecordingProjectService;
    use crate::tools::project_operations;
    use serde_json::json;

    fn dispatcher(service: Arc<RecordingProjectService>) -> Dispatcher {
        let executor = ToolExecutor::new(project_operations(service), 5, 4);
        Dispatcher::new(Arc::new(executor))
    }

    fn outcomes(outcome: DispatchOutcome) -> Vec<ToolOutcome> {
        match outcome {
            DispatchOutcome::Completed(o) => o,
            DispatchOutcome::Cancelled => panic!("unexpected cancel"),
        }
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let service = Arc::new(
            RecordingProjectService::new()
                .respond("get_spaces", json!({"spaces": []}))
                .respond("get_lists", json!({"lists": []})),
        );
        let calls = vec![
            ToolCall::new("a", "get_lists", json!({"space_id": "1"})),
            ToolCall::new("b", "get_spaces", json!({})),
            ToolCall::new("c", "no_such_op", json!({})),
        ];
        let results = outcomes(
            dispatcher(service)
                .dispatch(&calls, &[], ExternalPolicy::NotExecuted, &CancellationToken::new())
                .await,
        );
        let ids: Vec<_> = results.iter().map(|o| o.call.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(results[0].to_message().content, r#"{"lists":[]}"#);
        assert!(matches!(results[2].result, Err(AgentError::UnknownOperation(_))));
        assert_eq!(
            results[2].to_message().content,
            "Error: Unknown operation: no_such_op"
        );
    }

    #[tokio::test]
    async fn test_external_actions_are_never_executed_locally() {
        let service = Arc::new(RecordingProjectService::new());
        let calls = vec![
            ToolCall::new("a", "get_spaces", json!({})),
            ToolCall::new("b", "showTaskCard", json!({"task_id": "1"})),
        ];
        let external = vec!["showTaskCard".to_string()];
        let results = outcomes(
            dispatcher(service.clone())
                .dispatch(&calls, &external, ExternalPolicy::NotExecuted, &CancellationToken::new())
                .await,
        );
        assert!(results[0].is_ok());
        assert!(matches!(results[1].result, Err(AgentError::ExternalAction(ref n)) if n == "showTaskCard"));
        assert_eq!(service.calls().len(), 1);

        let results = outcomes(
            dispatcher(service)
                .dispatch(&calls[1..], &external, ExternalPolicy::NoResultSupplied, &CancellationToken::new())
                .await,
        );
        assert!(matches!(results[0].result, Err(AgentError::MissingActionResult(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_dispatch() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = dispatcher(Arc::new(RecordingProjectService::new()))
            .dispatch(
                &[ToolCall::new("a", "get_spaces", json!({}))],
                &[],
                ExternalPolicy::NotExecuted,
                &token,
            )
            .await;
        assert!(matches!(outcome, DispatchOutcome::Cancelled));
    }
}
