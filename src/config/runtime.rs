use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 脚本运行时资源限制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 堆内存上限（字节）
    pub memory_limit: usize,

    /// 最大栈大小（字节）
    pub max_stack_size: usize,

    /// GC 触发阈值（字节）
    pub gc_threshold: usize,
}

impl_default!(RuntimeConfig {
    memory_limit: 64 * 1024 * 1024,
    max_stack_size: 1024 * 1024,
    gc_threshold: 4 * 1024 * 1024,
});

impl RuntimeConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.memory_limit == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.memory_limit must be greater than zero".to_string(),
            ));
        }
        if self.max_stack_size == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.max_stack_size must be greater than zero".to_string(),
            ));
        }
        if self.gc_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.gc_threshold must be greater than zero".to_string(),
            ));
        }
        if self.max_stack_size >= self.memory_limit {
            return Err(ConfigError::ValidationError(
                "runtime.max_stack_size must be smaller than runtime.memory_limit".to_string(),
            ));
        }
        Ok(())
    }
}
