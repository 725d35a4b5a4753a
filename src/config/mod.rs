/// 统一配置系统
///
/// 提供TOML/JSON配置文件和环境变量覆盖
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod modules;
pub mod runtime;

pub use modules::ModuleConfig;
pub use runtime::RuntimeConfig;

use crate::impl_default;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 脚本运行时资源限制
    pub runtime: RuntimeConfig,

    /// 模块搜索路径
    pub modules: ModuleConfig,

    /// 错误报告
    pub errors: ErrorConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl_default!(BridgeConfig {
    runtime: RuntimeConfig::default(),
    modules: ModuleConfig::default(),
    errors: ErrorConfig::default(),
    logging: LoggingConfig::default(),
});

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 按扩展名加载：`.json` 为JSON，其余按TOML解析
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// 用给定的查找函数覆盖配置（`BRIDGE_*` 键）
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // 运行时
        if let Some(limit) = lookup("BRIDGE_MEMORY_LIMIT").and_then(|v| v.parse().ok()) {
            self.runtime.memory_limit = limit;
        }
        if let Some(size) = lookup("BRIDGE_MAX_STACK_SIZE").and_then(|v| v.parse().ok()) {
            self.runtime.max_stack_size = size;
        }
        if let Some(threshold) = lookup("BRIDGE_GC_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.runtime.gc_threshold = threshold;
        }

        // 模块路径，使用系统路径分隔符
        if let Some(paths) = lookup("BRIDGE_MODULE_PATH") {
            self.modules.search_paths = env::split_paths(&paths).collect();
        }

        // 错误与日志
        if let Some(verbose) = lookup("BRIDGE_VERBOSE_ERRORS").and_then(|v| v.parse().ok()) {
            self.errors.verbose = verbose;
        }
        if let Some(level) = lookup("BRIDGE_LOG_LEVEL").and_then(|v| LogLevel::parse(&v)) {
            self.logging.level = level;
        }
        if let Some(path) = lookup("BRIDGE_LOG_FILE") {
            self.logging.log_to_file = true;
            self.logging.log_file_path = path;
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.runtime.validate()?;
        self.modules.validate()?;
        self.errors.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./script_bridge.toml
    /// 2. ./script_bridge.json
    /// 3. ~/.config/script_bridge/config.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        for candidate in Self::search_locations() {
            if !candidate.is_file() {
                continue;
            }
            match Self::from_file(&candidate) {
                Ok(config) => {
                    tracing::info!(target: "config", "Loaded config from {:?}", candidate);
                    return config;
                }
                Err(e) => {
                    tracing::warn!(target: "config", "Ignoring {:?}: {}", candidate, e);
                }
            }
        }

        tracing::debug!(target: "config", "Using default configuration");
        Self::default()
    }

    fn search_locations() -> Vec<PathBuf> {
        let mut locations = vec![
            PathBuf::from("script_bridge.toml"),
            PathBuf::from("script_bridge.json"),
        ];
        if let Some(home) = env::var_os("HOME") {
            locations.push(
                PathBuf::from(home)
                    .join(".config")
                    .join("script_bridge")
                    .join("config.toml"),
            );
        }
        locations
    }
}

/// 错误报告配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// 是否把失败的调用写入日志
    pub log_errors: bool,

    /// 日志中附带脚本调用栈
    pub verbose: bool,

    /// 保留的最近错误条数
    pub max_recent: usize,
}

impl_default!(ErrorConfig {
    log_errors: true,
    verbose: false,
    max_recent: 100,
});

impl ErrorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_recent == 0 {
            return Err(ConfigError::ValidationError(
                "errors.max_recent must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到文件
    pub log_to_file: bool,

    /// 日志文件路径
    pub log_file_path: String,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_file: false,
    log_file_path: "script_bridge.log".to_string(),
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// `EnvFilter` 指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}
