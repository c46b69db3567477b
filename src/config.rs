//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PM_AGENT__*` 覆盖（双下划线表示嵌套，如 `PM_AGENT__LLM__PROVIDER=openai`）。
//! 凭据不放在配置文件里，只从约定的环境变量读取（见 Secrets）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub clickup: ClickUpSection,
    pub agent: AgentSection,
}

/// [app] 段：应用名、检查点目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 会话检查点目录；未设置时使用内存存储（进程退出即丢失）
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "pm-agent".to_string(),
            checkpoint_dir: None,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock
    pub provider: String,
    /// 为空时使用后端默认模型（gemini-2.0-flash / gpt-4o-mini）
    pub model: Option<String>,
    /// 仅 openai 后端使用，指向任意 OpenAI 兼容端点
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次模型请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [clickup] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickUpSection {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ClickUpSection {
    fn default() -> Self {
        Self {
            base_url: crate::integrations::CLICKUP_API_BASE.to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// [agent] 段：回合步数上限、工具超时与并发、默认语言
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: usize,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 同一批工具调用的最大并发数
    pub max_concurrent_tools: usize,
    pub default_language: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: crate::core::DEFAULT_MAX_STEPS,
            tool_timeout_secs: 30,
            max_concurrent_tools: 4,
            default_language: crate::memory::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// 从环境变量读取的凭据
#[derive(Clone, Default)]
pub struct Secrets {
    pub clickup_api_key: Option<String>,
    pub clickup_team_id: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("clickup_api_key", &mask(&self.clickup_api_key))
            .field("clickup_team_id", &self.clickup_team_id)
            .field("gemini_api_key", &mask(&self.gemini_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .finish()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Secrets {
    /// CLICKUP_API_KEY、CLICKUP_TEAM_ID、GEMINI_KEY（或 GEMINI_API_KEY）、OPENAI_API_KEY
    pub fn from_env() -> Self {
        Self {
            clickup_api_key: env_var("CLICKUP_API_KEY"),
            clickup_team_id: env_var("CLICKUP_TEAM_ID"),
            gemini_api_key: env_var("GEMINI_KEY").or_else(|| env_var("GEMINI_API_KEY")),
            openai_api_key: env_var("OPENAI_API_KEY"),
        }
    }

    pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AgentError> {
        value
            .as_deref()
            .ok_or_else(|| AgentError::Config(format!("{name} environment variable not set")))
    }
}

/// 从 config 目录加载配置，环境变量 PM_AGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PM_AGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PM_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
