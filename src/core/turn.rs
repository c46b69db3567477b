//! 回合控制器：Reasoning ⇄ Dispatch → Done
//!
//! 一个回合 = 读取检查点 → 补齐上回合遗留的工具请求 → 追加新输入 → 推理/分发循环 → 写检查点。
//! 回合中途出错或被取消时不写检查点，会话回到上一个回合边界。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, SessionSupervisor, TurnPhase};
use crate::llm::ToolSpec;
use crate::memory::{Checkpoint, CheckpointStore, ConversationState, Message, Role, ToolCall};
use crate::react::{merge_tool_specs, DispatchOutcome, Dispatcher, ExternalPolicy, Planner, ToolOutcome};

/// 单回合最多推理次数
pub const DEFAULT_MAX_STEPS: usize = 20;

/// 一次回合请求
#[derive(Clone, Debug, Default)]
pub struct TurnRequest {
    pub session_id: String,
    /// 新的用户消息，和/或对上回合外部动作请求的 tool 结果
    pub messages: Vec<Message>,
    /// 覆盖会话的回复语言
    pub language: Option<String>,
    /// 调用方本回合提供的外部动作（不持久化，每回合重新提供）
    pub actions: Vec<ToolSpec>,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// 只带一条用户消息的请求
    pub fn user(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(session_id).with_message(Message::user(text))
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_tool_result(self, tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        self.with_message(Message::tool_result(tool_call_id, content))
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_actions(mut self, actions: Vec<ToolSpec>) -> Self {
        self.actions = actions;
        self
    }
}

/// 回合结果
#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    /// 本回合追加到会话中的消息（含调用方输入）
    pub messages: Vec<Message>,
    pub phase: TurnPhase,
    /// 等待调用方执行并回传结果的外部动作请求
    pub pending_actions: Vec<ToolCall>,
    pub reasoning_steps: usize,
    pub dispatch_steps: usize,
    /// 会话已完成的回合数（含本回合）
    pub turn: u64,
}

impl TurnOutcome {
    /// 本回合最后一条纯文本 assistant 回复
    pub fn reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.has_tool_calls())
            .map(|m| m.content.as_str())
    }
}

/// 推理结果决定下一阶段。
///
/// 只看第一个工具请求：它命名了外部动作时整条消息交给调用方（即使后面还有本地请求），
/// 否则进入分发（本地操作或未知名称，未知名称在分发时得到错误结果）。
pub fn next_phase(reply: &Message, external: &[String]) -> TurnPhase {
    match reply.first_tool_call() {
        None => TurnPhase::Done,
        Some(call) if external.iter().any(|name| name == &call.name) => TurnPhase::Done,
        Some(_) => TurnPhase::Dispatch,
    }
}

/// 回合控制器：串联 Planner、Dispatcher 与检查点存储；本地操作集与客户端经 Arc 共享
pub struct TurnController {
    planner: Planner,
    dispatcher: Dispatcher,
    store: Arc<dyn CheckpointStore>,
    supervisor: SessionSupervisor,
    max_steps: usize,
    default_language: String,
}

impl TurnController {
    pub fn new(planner: Planner, dispatcher: Dispatcher, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            planner,
            dispatcher,
            store,
            supervisor: SessionSupervisor::new(),
            max_steps: DEFAULT_MAX_STEPS,
            default_language: crate::memory::DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// 本地操作的工具描述
    pub fn operation_specs(&self) -> Vec<ToolSpec> {
        self.dispatcher.executor().specs()
    }

    /// 清除会话检查点；会话有回合进行中时拒绝
    pub async fn reset_session(&self, session_id: &str) -> Result<bool, AgentError> {
        let _guard = self.supervisor.begin(session_id, CancellationToken::new())?;
        self.store.delete(session_id).await
    }

    pub async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let TurnRequest {
            session_id,
            messages,
            language,
            actions,
        } = request;
        let _guard = self.supervisor.begin(&session_id, cancel.clone())?;

        let (mut state, completed_turns) = match self.store.load(&session_id).await? {
            Some(cp) => (cp.state, cp.turn),
            None => (ConversationState::new(self.default_language.clone()), 0),
        };
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            state.language = language;
        }
        let start_len = state.messages().len();
        let external: Vec<String> = actions.iter().map(|a| a.name.clone()).collect();

        tracing::info!(
            session_id = %session_id,
            turn = completed_turns + 1,
            inputs = messages.len(),
            actions = external.len(),
            "turn started"
        );

        let (tool_results, inputs): (Vec<Message>, Vec<Message>) =
            messages.into_iter().partition(|m| m.role == Role::Tool);
        self.resolve_pending(&mut state, tool_results, &external, &cancel)
            .await?;
        for message in inputs {
            state.push_message(message);
        }

        let tools = merge_tool_specs(&self.operation_specs(), &actions);
        let mut phase = TurnPhase::Reasoning;
        let mut reasoning_steps = 0usize;
        let mut dispatch_steps = 0usize;

        while phase != TurnPhase::Done {
            match phase {
                TurnPhase::Reasoning => {
                    if reasoning_steps >= self.max_steps {
                        tracing::warn!(session_id = %session_id, max_steps = self.max_steps, "step limit reached");
                        state.push_message(Message::assistant(format!(
                            "I stopped after {} reasoning steps without reaching a final answer. \
                             Please narrow the request or ask me to continue.",
                            self.max_steps
                        )));
                        phase = TurnPhase::Done;
                        continue;
                    }
                    if cancel.is_cancelled() {
                        return Err(self.cancelled(&session_id));
                    }
                    let reply = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(self.cancelled(&session_id)),
                        reply = self.planner.reason(&state, &tools) => reply?,
                    };
                    reasoning_steps += 1;
                    phase = next_phase(&reply, &external);
                    tracing::debug!(
                        session_id = %session_id,
                        step = reasoning_steps,
                        tool_calls = reply.tool_calls.len(),
                        next = %phase,
                        "reasoning step finished"
                    );
                    state.push_message(reply);
                }
                TurnPhase::Dispatch => {
                    let calls = state
                        .last_message()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();
                    let outcomes = match self
                        .dispatcher
                        .dispatch(&calls, &external, ExternalPolicy::NotExecuted, &cancel)
                        .await
                    {
                        DispatchOutcome::Completed(outcomes) => outcomes,
                        DispatchOutcome::Cancelled => return Err(self.cancelled(&session_id)),
                    };
                    apply_outcomes(&mut state, &outcomes);
                    dispatch_steps += 1;
                    phase = TurnPhase::Reasoning;
                }
                TurnPhase::Done => {}
            }
        }

        let pending_actions: Vec<ToolCall> = state
            .pending_tool_calls()
            .into_iter()
            .filter(|c| external.contains(&c.name))
            .collect();
        state.awaiting_actions = pending_actions.iter().map(|c| c.id.clone()).collect();
        let turn = completed_turns + 1;
        let new_messages = state.messages()[start_len..].to_vec();
        self.store
            .save(Checkpoint::new(session_id.clone(), turn, state))
            .await?;

        let (prompt_tokens, completion_tokens, _) = self.planner.token_usage();
        tracing::info!(
            session_id = %session_id,
            turn,
            reasoning_steps,
            dispatch_steps,
            pending_actions = pending_actions.len(),
            prompt_tokens,
            completion_tokens,
            "turn finished"
        );

        Ok(TurnOutcome {
            session_id,
            messages: new_messages,
            phase,
            pending_actions,
            reasoning_steps,
            dispatch_steps,
            turn,
        })
    }

    /// 补齐上回合最后一条 assistant 消息中尚无结果的请求：
    /// 先写入调用方提供的结果，剩余的本地操作就地执行，外部动作记为未提供结果。
    ///
    /// 外部动作包括：上回合交给调用方的调用、名字出现在本回合 actions 中的调用、
    /// 以及本地操作集中不存在的名字。同名的本地操作不会代为执行。
    async fn resolve_pending(
        &self,
        state: &mut ConversationState,
        tool_results: Vec<Message>,
        external: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let awaiting = std::mem::take(&mut state.awaiting_actions);
        for result in tool_results {
            let answers_pending = result
                .tool_call_id
                .as_deref()
                .map(|id| state.pending_tool_calls().iter().any(|c| c.id == id))
                .unwrap_or(false);
            if answers_pending {
                state.push_message(result);
            } else {
                tracing::warn!(
                    tool_call_id = ?result.tool_call_id,
                    "dropping tool result that answers no pending request"
                );
            }
        }

        let unresolved = state.pending_tool_calls();
        if unresolved.is_empty() {
            return Ok(());
        }
        let executor = self.dispatcher.executor();
        // 同一条消息里同名调用的归属一致，按名字判定即可
        let not_local: Vec<String> = unresolved
            .iter()
            .filter(|c| {
                awaiting.contains(&c.id)
                    || external.contains(&c.name)
                    || !executor.contains(&c.name)
            })
            .map(|c| c.name.clone())
            .collect();
        tracing::debug!(
            count = unresolved.len(),
            external = not_local.len(),
            "resolving pending tool requests"
        );
        match self
            .dispatcher
            .dispatch(&unresolved, &not_local, ExternalPolicy::NoResultSupplied, cancel)
            .await
        {
            DispatchOutcome::Completed(outcomes) => {
                apply_outcomes(state, &outcomes);
                Ok(())
            }
            DispatchOutcome::Cancelled => Err(AgentError::Cancelled),
        }
    }

    fn cancelled(&self, session_id: &str) -> AgentError {
        tracing::info!(session_id = %session_id, "turn cancelled, checkpoint not written");
        AgentError::Cancelled
    }
}

/// 写回结果并刷新缓存
fn apply_outcomes(state: &mut ConversationState, outcomes: &[ToolOutcome]) {
    for outcome in outcomes {
        if let Ok(value) = &outcome.result {
            state.record_operation_result(&outcome.call.name, value);
        }
        state.push_message(outcome.to_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::fake::RecordingProjectService;
    use crate::llm::ScriptedLlmClient;
    use crate::memory::InMemoryCheckpointStore;
    use crate::tools::{project_operations, ToolExecutor};
    use serde_json::json;

    fn controller(llm: Arc<ScriptedLlmClient>, service: Arc<RecordingProjectService>) -> TurnController {
        let executor = Arc::new(ToolExecutor::new(project_operations(service), 5, 4));
        TurnController::new(
            Planner::new(llm),
            Dispatcher::new(executor),
            Arc::new(InMemoryCheckpointStore::new()),
        )
    }

    #[test]
    fn test_next_phase_first_request_decides() {
        let external = vec!["showTaskCard".to_string()];
        assert_eq!(next_phase(&Message::assistant("hi"), &external), TurnPhase::Done);

        let local_first = Message::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::new("1", "get_spaces", json!({})),
                ToolCall::new("2", "showTaskCard", json!({})),
            ],
        );
        assert_eq!(next_phase(&local_first, &external), TurnPhase::Dispatch);

        let external_first = Message::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::new("1", "showTaskCard", json!({})),
                ToolCall::new("2", "get_spaces", json!({})),
            ],
        );
        assert_eq!(next_phase(&external_first, &external), TurnPhase::Done);

        let unknown = Message::assistant_with_tool_calls("", vec![ToolCall::new("1", "nope", json!({}))]);
        assert_eq!(next_phase(&unknown, &external), TurnPhase::Dispatch);
    }

    #[tokio::test]
    async fn test_step_limit_ends_turn_with_explanation() {
        let mut llm = ScriptedLlmClient::new();
        for i in 0..5 {
            llm = llm.reply_tool_calls(vec![ToolCall::new(format!("c{i}"), "get_spaces", json!({}))]);
        }
        let llm = Arc::new(llm);
        let service = Arc::new(RecordingProjectService::new());
        let controller = controller(llm.clone(), service.clone()).with_max_steps(2);

        let outcome = controller
            .run_turn(TurnRequest::user("s", "loop forever"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.phase, TurnPhase::Done);
        assert_eq!(outcome.reasoning_steps, 2);
        assert_eq!(outcome.dispatch_steps, 2);
        assert!(outcome.reply().unwrap().contains("2 reasoning steps"));
        assert_eq!(llm.call_count(), 2);
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_refreshed_from_successful_lookups() {
        let llm = Arc::new(
            ScriptedLlmClient::new()
                .reply_tool_calls(vec![ToolCall::new("c1", "get_spaces", json!({}))])
                .reply_text("You have one space."),
        );
        let service = Arc::new(
            RecordingProjectService::new()
                .respond("get_spaces", json!({"spaces": [{"id": "90183095898", "name": "Blueprint"}]})),
        );
        let controller = controller(llm.clone(), service);
        controller
            .run_turn(TurnRequest::user("s", "spaces?"), CancellationToken::new())
            .await
            .unwrap();

        let cp = controller.store().load("s").await.unwrap().unwrap();
        assert_eq!(cp.state.spaces, vec!["90183095898:Blueprint"]);
        // 第二次推理的 system 指令已包含缓存
        let second = &llm.requests()[1];
        assert!(second.messages[0].content.contains("90183095898:Blueprint"));
    }

    #[tokio::test]
    async fn test_language_override_persists() {
        let llm = Arc::new(ScriptedLlmClient::new().reply_text("hola").reply_text("otra vez"));
        let controller = controller(llm.clone(), Arc::new(RecordingProjectService::new()));
        controller
            .run_turn(
                TurnRequest::user("s", "hi").with_language("spanish"),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        controller
            .run_turn(TurnRequest::user("s", "again"), CancellationToken::new())
            .await
            .unwrap();
        assert!(llm.requests()[1].messages[0].content.ends_with("Talk in spanish."));
    }

    #[tokio::test]
    async fn test_reset_session_clears_checkpoint() {
        let llm = Arc::new(ScriptedLlmClient::new().reply_text("ok"));
        let controller = controller(llm, Arc::new(RecordingProjectService::new()));
        controller
            .run_turn(TurnRequest::user("s", "hi"), CancellationToken::new())
            .await
            .unwrap();
        assert!(controller.reset_session("s").await.unwrap());
        assert!(controller.store().load("s").await.unwrap().is_none());
    }
}
