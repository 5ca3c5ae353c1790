//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读默认 TOML，再读显式指定的文件，最后用环境变量 `MAESTRO__*` 覆盖
//! （双下划线表示嵌套，如 `MAESTRO__RETRY__MAX_RETRIES=5`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::context::ContextOptions;
use crate::llm::{ProviderOptions, RetryPolicy};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub provider: ProviderSection,
    pub retry: RetrySection,
    pub context: ContextSection,
}

/// [app] 段：应用名、工作目录、system prompt
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 生成文件的根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    pub system_prompt: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "maestro".to_string(),
            workspace_root: None,
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are a software engineering assistant. Plan the project with propose_plan, \
     ask_user_for_clarification when the request is ambiguous, and write each file \
     with write_file_content."
        .to_string()
}

/// [provider] 段：激活的适配器与请求选项
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub active: String,
    pub model: Option<String>,
    pub template: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 工具执行超时
    pub tool_timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            active: "mock".to_string(),
            model: None,
            template: None,
            timeout_secs: 30,
            temperature: 0.7,
            max_tokens: 2000,
            tool_timeout_secs: 30,
        }
    }
}

impl ProviderSection {
    /// 与 [retry] 合成适配器选项
    pub fn to_options(&self, retry: &RetrySection) -> ProviderOptions {
        ProviderOptions {
            timeout_secs: self.timeout_secs,
            max_retries: retry.max_retries,
            retry_delay_ms: retry.initial_backoff_ms,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            template_id: self.template.clone(),
            ..ProviderOptions::default()
        }
    }
}

/// [retry] 段：重试策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_factor: f64,
    pub jitter_factor: f64,
    pub retry_on_rate_limit: bool,
    pub retry_on_server_error: bool,
    pub retry_on_network_error: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            retry_on_rate_limit: true,
            retry_on_server_error: true,
            retry_on_network_error: true,
        }
    }
}

impl RetrySection {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_factor: self.backoff_factor,
            jitter_factor: self.jitter_factor,
            retry_on_rate_limit: self.retry_on_rate_limit,
            retry_on_server_error: self.retry_on_server_error,
            retry_on_network_error: self.retry_on_network_error,
        }
    }
}

/// [context] 段：prompt 上下文增强
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextSection {
    pub enabled: bool,
    pub max_files: usize,
    pub max_snippet_lines: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        let defaults = ContextOptions::default();
        Self {
            enabled: false,
            max_files: defaults.max_snippets,
            max_snippet_lines: defaults.max_snippet_lines,
        }
    }
}

impl ContextSection {
    pub fn to_options(&self) -> ContextOptions {
        ContextOptions {
            max_snippets: self.max_files,
            max_snippet_lines: self.max_snippet_lines,
            ..ContextOptions::default()
        }
    }
}

/// 加载配置：默认 TOML（若存在）→ 指定文件 → `MAESTRO__*` 环境变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MAESTRO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
