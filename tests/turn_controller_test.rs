//! 回合控制器集成测试：通过公开 API 驱动完整回合（脚本化 LLM + 内存项目服务）

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use pm_agent::core::{AgentError, TurnController, TurnPhase, TurnRequest};
use pm_agent::integrations::{NewTask, ProjectService, TaskUpdate};
use pm_agent::llm::{LlmError, ScriptedLlmClient, ToolSpec};
use pm_agent::memory::{CheckpointStore, InMemoryCheckpointStore, Role, ToolCall};
use pm_agent::react::{Dispatcher, Planner};
use pm_agent::tools::{project_operations, ToolExecutor};

/// 记录调用的内存项目服务
#[derive(Default)]
struct FakeClickUp {
    calls: Mutex<Vec<String>>,
}

impl FakeClickUp {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProjectService for FakeClickUp {
    async fn get_spaces(&self) -> Result<Value, AgentError> {
        self.record("get_spaces".into());
        Ok(json!({"spaces": [{"id": "790", "name": "Engineering"}]}))
    }

    async fn get_lists(&self, space_id: &str) -> Result<Value, AgentError> {
        self.record(format!("get_lists:{space_id}"));
        Ok(json!({"lists": [{"id": "901", "name": "Sprint"}]}))
    }

    async fn get_tasks(&self, list_id: &str) -> Result<Value, AgentError> {
        self.record(format!("get_tasks:{list_id}"));
        Ok(json!({"tasks": [{"id": "86a", "name": "Write docs"}]}))
    }

    async fn create_task(&self, list_id: &str, task: &NewTask) -> Result<Value, AgentError> {
        self.record(format!("create_task:{list_id}:{}", task.name));
        Ok(json!({"id": "86b", "name": task.name}))
    }

    async fn update_task(&self, task_id: &str, _update: &TaskUpdate) -> Result<Value, AgentError> {
        self.record(format!("update_task:{task_id}"));
        Ok(json!({"id": task_id}))
    }

    async fn delete_task(&self, task_id: &str) -> Result<Value, AgentError> {
        self.record(format!("delete_task:{task_id}"));
        Ok(json!({}))
    }

    async fn get_task_by_id(&self, task_id: &str) -> Result<Value, AgentError> {
        self.record(format!("get_task_by_id:{task_id}"));
        Ok(json!({"id": task_id, "name": "Write docs"}))
    }

    async fn set_custom_field_value(
        &self,
        task_id: &str,
        field_id: &str,
        _value: &Value,
    ) -> Result<Value, AgentError> {
        self.record(format!("set_custom_field_value:{task_id}:{field_id}"));
        Ok(json!({}))
    }
}

struct Harness {
    controller: Arc<TurnController>,
    llm: Arc<ScriptedLlmClient>,
    service: Arc<FakeClickUp>,
    store: Arc<InMemoryCheckpointStore>,
}

fn harness(llm: ScriptedLlmClient) -> Harness {
    let llm = Arc::new(llm);
    let service = Arc::new(FakeClickUp::default());
    let store = Arc::new(InMemoryCheckpointStore::new());
    let executor = ToolExecutor::new(project_operations(service.clone()), 5, 4);
    let controller = TurnController::new(
        Planner::new(llm.clone()),
        Dispatcher::new(Arc::new(executor)),
        store.clone(),
    );
    Harness {
        controller: Arc::new(controller),
        llm,
        service,
        store,
    }
}

fn task_card_action() -> ToolSpec {
    ToolSpec::new(
        "showTaskCard",
        "Show a task card in the UI",
        json!({"type": "object", "properties": {"task_id": {"type": "string"}}}),
    )
}

#[tokio::test]
async fn plain_message_finishes_after_one_reasoning_step() {
    let h = harness(ScriptedLlmClient::new().reply_text("Hello! How can I help?"));

    let outcome = h
        .controller
        .run_turn(TurnRequest::user("s1", "hi"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.phase, TurnPhase::Done);
    assert_eq!(outcome.reasoning_steps, 1);
    assert_eq!(outcome.dispatch_steps, 0);
    assert_eq!(outcome.reply(), Some("Hello! How can I help?"));
    assert!(h.service.calls().is_empty());

    let checkpoint = h.store.load("s1").await.unwrap().unwrap();
    assert_eq!(checkpoint.turn, 1);
    let roles: Vec<Role> = checkpoint.state.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
}

#[tokio::test]
async fn local_requests_are_dispatched_in_order_then_reasoning_resumes() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_tool_calls(vec![
                ToolCall::new("c1", "get_tasks", json!({"list_id": "901"})),
                ToolCall::new("c2", "get_spaces", json!({})),
            ])
            .reply_text("You have one task: Write docs."),
    );

    let outcome = h
        .controller
        .run_turn(TurnRequest::user("s1", "what are my tasks?"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.reasoning_steps, 2);
    assert_eq!(outcome.dispatch_steps, 1);
    assert_eq!(outcome.reply(), Some("You have one task: Write docs."));

    let tool_ids: Vec<_> = outcome
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.tool_call_id.clone().unwrap())
        .collect();
    assert_eq!(tool_ids, vec!["c1", "c2"]);

    let mut calls = h.service.calls();
    calls.sort();
    assert_eq!(calls, vec!["get_spaces", "get_tasks:901"]);

    // 第二次推理能看到两条 tool 结果
    let second = &h.llm.requests()[1];
    assert_eq!(
        second.messages.iter().filter(|m| m.role == Role::Tool).count(),
        2
    );

    let state = h.store.load("s1").await.unwrap().unwrap().state;
    assert_eq!(state.tasks, vec!["86a:Write docs"]);
    assert_eq!(state.spaces, vec!["790:Engineering"]);
}

#[tokio::test]
async fn first_request_external_ends_turn_without_local_calls() {
    let h = harness(ScriptedLlmClient::new().reply_tool_calls(vec![
        ToolCall::new("ui1", "showTaskCard", json!({"task_id": "86a"})),
        ToolCall::new("c2", "get_spaces", json!({})),
    ]));

    let outcome = h
        .controller
        .run_turn(
            TurnRequest::user("s1", "show me task 86a").with_actions(vec![task_card_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.phase, TurnPhase::Done);
    assert_eq!(outcome.dispatch_steps, 0);
    assert!(h.service.calls().is_empty());
    assert_eq!(outcome.pending_actions.len(), 1);
    assert_eq!(outcome.pending_actions[0].id, "ui1");
    assert_eq!(h.llm.requests()[0].tool_names[0], "showTaskCard");
}

#[tokio::test]
async fn caller_result_resolves_pending_action_next_turn() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_tool_calls(vec![
                ToolCall::new("ui1", "showTaskCard", json!({"task_id": "86a"})),
                ToolCall::new("c2", "get_spaces", json!({})),
            ])
            .reply_text("The card is on screen."),
    );
    h.controller
        .run_turn(
            TurnRequest::user("s1", "show me task 86a").with_actions(vec![task_card_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let outcome = h
        .controller
        .run_turn(
            TurnRequest::new("s1")
                .with_tool_result("ui1", r#"{"shown":true}"#)
                .with_actions(vec![task_card_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.turn, 2);
    assert_eq!(outcome.reply(), Some("The card is on screen."));
    assert!(outcome.pending_actions.is_empty());
    // 遗留的本地请求在回合开始时补执行
    assert_eq!(h.service.calls(), vec!["get_spaces"]);

    let tool_messages: Vec<_> = outcome
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("ui1"));
    assert_eq!(tool_messages[0].content, r#"{"shown":true}"#);
}

#[tokio::test]
async fn missing_action_result_becomes_error_result() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_tool_calls(vec![ToolCall::new(
                "ui1",
                "showTaskCard",
                json!({"task_id": "86a"}),
            )])
            .reply_text("Okay, moving on."),
    );
    h.controller
        .run_turn(
            TurnRequest::user("s1", "show me task 86a").with_actions(vec![task_card_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let outcome = h
        .controller
        .run_turn(TurnRequest::user("s1", "never mind"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.messages[0].role, Role::Tool);
    assert_eq!(
        outcome.messages[0].content,
        "Error: No result was supplied for action 'showTaskCard'"
    );
    assert_eq!(outcome.messages[1].content, "never mind");
    assert_eq!(outcome.reply(), Some("Okay, moving on."));
}

fn create_task_action() -> ToolSpec {
    ToolSpec::new(
        "create_task",
        "Open the task creation form in the UI",
        json!({"type": "object", "properties": {"name": {"type": "string"}}}),
    )
}

#[tokio::test]
async fn shadowing_action_is_never_run_against_clickup() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_tool_calls(vec![ToolCall::new(
                "ui1",
                "create_task",
                json!({"list_id": "901", "name": "Draft"}),
            )])
            .reply_text("No problem."),
    );
    let first = h
        .controller
        .run_turn(
            TurnRequest::user("s1", "new task please").with_actions(vec![create_task_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(first.phase, TurnPhase::Done);
    assert_eq!(first.pending_actions.len(), 1);

    let second = h
        .controller
        .run_turn(
            TurnRequest::user("s1", "forget it").with_actions(vec![create_task_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(h.service.calls().is_empty());
    assert_eq!(
        second.messages[0].content,
        "Error: No result was supplied for action 'create_task'"
    );
}

#[tokio::test]
async fn handed_off_action_stays_external_when_caller_drops_actions() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_tool_calls(vec![ToolCall::new(
                "ui1",
                "create_task",
                json!({"list_id": "901", "name": "Draft"}),
            )])
            .reply_text("Okay."),
    );
    h.controller
        .run_turn(
            TurnRequest::user("s1", "new task please").with_actions(vec![create_task_action()]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let state = h.store.load("s1").await.unwrap().unwrap().state;
    assert_eq!(state.awaiting_actions, vec!["ui1"]);

    let second = h
        .controller
        .run_turn(TurnRequest::user("s1", "hello again"), CancellationToken::new())
        .await
        .unwrap();

    assert!(h.service.calls().is_empty());
    assert_eq!(second.messages[0].role, Role::Tool);
    assert!(second.messages[0].content.starts_with("Error: No result was supplied"));
    let state = h.store.load("s1").await.unwrap().unwrap().state;
    assert!(state.awaiting_actions.is_empty());
}

#[tokio::test]
async fn unknown_operation_yields_error_result_and_turn_continues() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_tool_calls(vec![ToolCall::new("c1", "archive_space", json!({}))])
            .reply_text("I can't archive spaces."),
    );

    let outcome = h
        .controller
        .run_turn(TurnRequest::user("s1", "archive it"), CancellationToken::new())
        .await
        .unwrap();

    let tool = outcome.messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool.content, "Error: Unknown operation: archive_space");
    assert_eq!(outcome.reply(), Some("I can't archive spaces."));
}

#[tokio::test]
async fn concurrent_turns_on_one_session_conflict() {
    let h = harness(
        ScriptedLlmClient::new()
            .with_delay(Duration::from_millis(200))
            .reply_text("first")
            .reply_text("second"),
    );

    let a = {
        let controller = h.controller.clone();
        tokio::spawn(async move {
            controller
                .run_turn(TurnRequest::user("s1", "one"), CancellationToken::new())
                .await
        })
    };
    let b = {
        let controller = h.controller.clone();
        tokio::spawn(async move {
            controller
                .run_turn(TurnRequest::user("s1", "two"), CancellationToken::new())
                .await
        })
    };
    let results = vec![a.await.unwrap(), b.await.unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AgentError::StateConflict(_))))
        .count();
    assert_eq!((ok, conflicts), (1, 1));

    let checkpoint = h.store.load("s1").await.unwrap().unwrap();
    assert_eq!(checkpoint.turn, 1);
    assert_eq!(checkpoint.state.messages().len(), 2);
    assert!(!h.controller.supervisor().is_active("s1"));
}

#[tokio::test]
async fn model_failure_leaves_no_checkpoint() {
    let h = harness(ScriptedLlmClient::new().reply_error(LlmError::Timeout(60)));

    let err = h
        .controller
        .run_turn(TurnRequest::user("s1", "hi"), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::ModelAccess(LlmError::Timeout(60))));
    assert!(h.store.load("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn cancelled_turn_rolls_back_to_previous_boundary() {
    let h = harness(
        ScriptedLlmClient::new()
            .reply_text("first answer")
            .reply_text("never seen"),
    );
    h.controller
        .run_turn(TurnRequest::user("s1", "one"), CancellationToken::new())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = h
        .controller
        .run_turn(TurnRequest::user("s1", "two"), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));

    let checkpoint = h.store.load("s1").await.unwrap().unwrap();
    assert_eq!(checkpoint.turn, 1);
    assert_eq!(checkpoint.state.messages().len(), 2);
}

#[tokio::test]
async fn cancel_during_reasoning_stops_the_turn() {
    let h = harness(
        ScriptedLlmClient::new()
            .with_delay(Duration::from_secs(5))
            .reply_text("too late"),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h
        .controller
        .run_turn(TurnRequest::user("s1", "hi"), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));
    assert!(h.store.load("s1").await.unwrap().is_none());
    assert!(!h.controller.supervisor().is_active("s1"));
}

#[tokio::test]
async fn language_override_reaches_system_prompt() {
    let h = harness(ScriptedLlmClient::new().reply_text("Bonjour"));
    h.controller
        .run_turn(
            TurnRequest::user("s1", "salut").with_language("french"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let system = &h.llm.requests()[0].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.ends_with("Talk in french."));
}
