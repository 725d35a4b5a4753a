//! 脚本宿主层
//!
//! - `host` - `ScriptHost`：脚本执行、模块加载、宿主 → 脚本调用
//! - `demo` - 内置演示脚本

pub mod demo;
pub mod host;

pub use host::{ModuleRef, ScriptFunction, ScriptHost, ScriptModule};
