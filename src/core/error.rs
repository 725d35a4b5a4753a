//! 统一错误处理模块
//!
//! 提供跨运行时调用桥的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **桥接层错误** (`BridgeError`): 每一次跨边界调用的失败结果，只有三类：
//!   `DomainError`（输入不满足运算定义）、`CallbackError`（对端运行时中的回调抛出异常）、
//!   `TransportError`（参数个数/类型无法跨越边界）。
//! - **宿主层错误** (`HostError`): 运行时初始化、脚本求值、模块加载、配置等错误。
//!
//! `HostError` 可以通过 `#[from]` 直接承载 `BridgeError`。

use crate::bindings::protocol::TypeTag;
use crate::config::ConfigError;
use crate::operations::CatalogError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 错误种类，跨边界时以名称传递给调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    DomainError,
    CallbackError,
    TransportError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DomainError => "DomainError",
            ErrorKind::CallbackError => "CallbackError",
            ErrorKind::TransportError => "TransportError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 领域错误：输入对一个定义良好的数学或结构运算无效
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{operation} is not defined for negative numbers (got {value})")]
    NegativeArgument { operation: &'static str, value: i64 },

    #[error("{operation} overflows a 64-bit integer: {detail}")]
    Overflow {
        operation: &'static str,
        detail: String,
    },

    #[error("cannot compute {operation} of an empty sequence")]
    EmptyInput { operation: &'static str },

    #[error("matrices cannot be empty")]
    EmptyMatrix,

    #[error("matrix is not rectangular: row {row} has {found} columns, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cannot multiply matrices: {left_columns} columns != {right_rows} rows")]
    DimensionMismatch {
        left_columns: usize,
        right_rows: usize,
    },

    #[error("cannot divide by zero")]
    DivisionByZero,

    #[error("key not found: {0}")]
    MissingKey(String),
}

/// 回调错误：被调用的回调在其所属运行时中抛出了异常
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackError {
    /// 以名称调用脚本函数时的函数名；匿名回调为 `None`
    pub function: Option<String>,
    /// 对端运行时给出的异常消息
    pub message: String,
    /// 对端运行时的调用栈（如果可用）
    pub stack: Option<String>,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            function: None,
            message: message.into(),
            stack: None,
        }
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "script function '{}' raised: {}", function, self.message),
            None => write!(f, "callback raised: {}", self.message),
        }
    }
}

impl std::error::Error for CallbackError {}

/// 传输错误：值无法按声明的类型跨越边界
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("unknown script function: {0}")]
    UnknownFunction(String),

    #[error("module not loaded: {0}")]
    UnknownModule(String),

    #[error("module {module} has no attribute {name}")]
    UnknownAttribute { module: String, name: String },

    #[error("{target} expects {expected} argument(s), got {found}")]
    ArityMismatch {
        target: String,
        expected: usize,
        found: usize,
    },

    #[error("{context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: TypeTag,
        found: String,
    },

    #[error("{context}: value of type {found} cannot cross the boundary")]
    Unsupported { context: String, found: String },

    #[error("invalid {kind} handle: {handle}")]
    InvalidHandle { kind: &'static str, handle: i64 },

    #[error("re-entrant call to {0} while bridge state is in use")]
    Reentrant(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("runtime failure: {0}")]
    Runtime(String),
}

/// 跨边界调用的统一错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("DomainError: {0}")]
    Domain(#[from] DomainError),

    #[error("CallbackError: {0}")]
    Callback(#[from] CallbackError),

    #[error("TransportError: {0}")]
    Transport(#[from] TransportError),
}

impl BridgeError {
    /// 获取错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Domain(_) => ErrorKind::DomainError,
            BridgeError::Callback(_) => ErrorKind::CallbackError,
            BridgeError::Transport(_) => ErrorKind::TransportError,
        }
    }

    /// 不带种类前缀的错误消息
    pub fn message(&self) -> String {
        match self {
            BridgeError::Domain(e) => e.to_string(),
            BridgeError::Callback(e) => e.to_string(),
            BridgeError::Transport(e) => e.to_string(),
        }
    }

    /// 便捷构造：回调失败
    pub fn callback(message: impl Into<String>) -> Self {
        BridgeError::Callback(CallbackError::new(message))
    }
}

/// 脚本宿主错误
#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Runtime initialization error: {0}")]
    Init(String),

    #[error("Script error in {source_name}: {message}")]
    Script {
        source_name: String,
        message: String,
        stack: Option<String>,
    },

    #[error("Invalid module name: {0}")]
    InvalidModuleName(String),

    #[error("Module not found: {name} (searched {searched:?})")]
    ModuleNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;
pub type HostResult<T> = Result<T, HostError>;
