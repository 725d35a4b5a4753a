//! 核心模块
//!
//! 包含调用桥的核心功能：
//! - `bridge` - 操作目录、桥接状态与错误报告的组合入口
//! - `state` - 计数器与有状态对象的句柄表
//! - `error` - 错误类型定义
//! - `error_reporter` - 错误统计与观察者
//! - `logging` - tracing 初始化

pub mod bridge;
pub mod error;
pub mod error_reporter;
pub mod logging;
pub mod state;
pub mod utils;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{
    BridgeError, BridgeResult, CallbackError, DomainError, ErrorKind, HostError, HostResult,
    TransportError,
};

// 重新导出错误报告器
pub use error_reporter::{ErrorRecord, ErrorReporter, ErrorStats};

pub use bridge::Bridge;
pub use logging::{init_logging, LogSinks};
pub use state::{BridgeState, HandleTable};
pub use utils::current_timestamp;
