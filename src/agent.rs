//! Headless Agent 运行时
//!
//! 供 REPL 与 HTTP 前端调用：create_llm_from_config 按配置选择模型后端，
//! create_controller 组装 ClickUp 客户端、操作集、Planner 与检查点存储，
//! process_message 对单条用户输入跑一个回合并返回最终回复。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, Secrets};
use crate::core::{AgentError, TurnController, TurnRequest};
use crate::integrations::{ClickUpClient, ProjectService};
use crate::llm::{create_gemini_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::create_checkpoint_store;
use crate::react::{Dispatcher, Planner};
use crate::tools::{project_operations, ToolExecutor};

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 按 [llm].provider 创建模型客户端；所选后端缺少凭据时为配置错误
pub fn create_llm_from_config(
    cfg: &AppConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn LlmClient>, AgentError> {
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);
    let model = cfg.llm.model.as_deref().filter(|m| !m.is_empty());
    match cfg.llm.provider.to_lowercase().as_str() {
        "gemini" => {
            let key = Secrets::require(&secrets.gemini_api_key, "GEMINI_KEY")?;
            let client = create_gemini_client(key, model, timeout);
            tracing::info!("Using Gemini LLM ({})", client.model());
            Ok(Arc::new(client))
        }
        "openai" => {
            let key = Secrets::require(&secrets.openai_api_key, "OPENAI_API_KEY")?;
            let model = model.unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI-compatible LLM ({})", model);
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                model,
                key,
                timeout,
            )))
        }
        "mock" => {
            tracing::warn!("Using Mock LLM, replies are echoes");
            Ok(Arc::new(MockLlmClient))
        }
        other => Err(AgentError::Config(format!(
            "unknown llm provider '{other}', expected gemini, openai or mock"
        ))),
    }
}

/// 用给定的模型与项目服务组装控制器（测试与自定义后端使用）
pub fn create_controller_with(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    service: Arc<dyn ProjectService>,
) -> TurnController {
    let executor = ToolExecutor::new(
        project_operations(service),
        cfg.agent.tool_timeout_secs,
        cfg.agent.max_concurrent_tools,
    );
    TurnController::new(
        Planner::new(llm),
        Dispatcher::new(Arc::new(executor)),
        create_checkpoint_store(cfg.app.checkpoint_dir.as_deref()),
    )
    .with_max_steps(cfg.agent.max_steps)
    .with_default_language(cfg.agent.default_language.clone())
}

/// 按配置与环境变量创建控制器；缺少 ClickUp 或模型凭据时启动即失败
pub fn create_controller(cfg: &AppConfig, secrets: &Secrets) -> Result<TurnController, AgentError> {
    let api_key = Secrets::require(&secrets.clickup_api_key, "CLICKUP_API_KEY")?;
    let team_id = Secrets::require(&secrets.clickup_team_id, "CLICKUP_TEAM_ID")?;
    let service = ClickUpClient::new(
        api_key,
        team_id,
        Some(&cfg.clickup.base_url),
        Duration::from_secs(cfg.clickup.request_timeout_secs),
    )?;
    let llm = create_llm_from_config(cfg, secrets)?;
    Ok(create_controller_with(cfg, llm, Arc::new(service)))
}

/// 处理单条用户消息：跑一个回合，返回最终回复文本（没有文本回复时为空串）
pub async fn process_message(
    controller: &TurnController,
    session_id: &str,
    user_input: &str,
) -> Result<String, AgentError> {
    let outcome = controller
        .run_turn(
            TurnRequest::user(session_id, user_input),
            CancellationToken::new(),
        )
        .await?;
    Ok(outcome.reply().unwrap_or_default().to_string())
}
