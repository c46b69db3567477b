//! PM Agent 交互式命令行
//!
//! 入口：初始化日志、按配置创建回合控制器，逐行读取 stdin 作为用户消息。
//! 命令：`/lang <语言>` 切换回复语言，`/reset` 清空会话，`/quit` 退出。
//! 回合进行中按 Ctrl-C 取消本回合（会话回到上一个回合边界）。

use std::path::PathBuf;

use anyhow::Context;
use pm_agent::agent::create_controller;
use pm_agent::config::{load_config, Secrets};
use pm_agent::core::{AgentError, TurnController, TurnRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

const SESSION_ID: &str = "cli";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pm_agent::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let controller = create_controller(&cfg, &Secrets::from_env()).context("Failed to create agent")?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut language: Option<String> = None;

    stdout
        .write_all(b"PM Agent ready. Commands: /lang <name>, /reset, /quit\n")
        .await?;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/reset", _) => {
                controller.reset_session(SESSION_ID).await?;
                println!("Session cleared.");
            }
            ("/lang", name) if !name.is_empty() => {
                language = Some(name.to_string());
                println!("Replies will be in {name}.");
            }
            ("/lang", _) => println!("Usage: /lang <language>"),
            _ => {
                let mut request = TurnRequest::user(SESSION_ID, input);
                request.language = language.take();
                run_one_turn(&controller, request).await?;
            }
        }
    }
    Ok(())
}

async fn run_one_turn(controller: &TurnController, request: TurnRequest) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let turn = controller.run_turn(request, cancel.clone());
    tokio::pin!(turn);

    let result = tokio::select! {
        res = &mut turn => res,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            turn.await
        }
    };

    match result {
        Ok(outcome) => {
            match outcome.reply() {
                Some(reply) => println!("{reply}"),
                None => println!("(no reply)"),
            }
            for action in &outcome.pending_actions {
                println!("[pending action] {} {}", action.name, action.arguments);
            }
        }
        Err(AgentError::Cancelled) => println!("Turn cancelled."),
        Err(AgentError::ModelAccess(e)) => println!("Model unavailable: {e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
