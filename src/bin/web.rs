//! PM Agent HTTP 服务
//!
//! 启动: cargo run --bin pm-agent-web --features web
//!
//! 环境变量:
//! - CLICKUP_API_KEY / CLICKUP_TEAM_ID: ClickUp 凭据
//! - GEMINI_KEY 或 OPENAI_API_KEY: 按 [llm].provider 选择
//! - PM_AGENT_PORT: 监听端口（默认 8080）

#[cfg(feature = "web")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use pm_agent::agent::create_controller;
    use pm_agent::config::{load_config, Secrets};
    use pm_agent::integrations::http::{create_router, HttpState};

    pm_agent::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let controller = create_controller(&cfg, &Secrets::from_env()).context("Failed to create agent")?;
    let app = create_router(Arc::new(HttpState { controller }));

    let port = std::env::var("PM_AGENT_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("PM Agent HTTP: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(not(feature = "web"))]
fn main() {
    eprintln!("pm-agent-web requires the `web` feature: cargo run --bin pm-agent-web --features web");
}
