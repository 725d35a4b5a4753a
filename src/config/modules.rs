use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 脚本模块解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// 按顺序搜索的目录，先匹配者优先
    pub search_paths: Vec<PathBuf>,

    /// 模块文件扩展名
    pub extension: String,
}

impl_default!(ModuleConfig {
    search_paths: vec![PathBuf::from("scripts"), PathBuf::from(".")],
    extension: "js".to_string(),
});

impl ModuleConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "modules.extension is not a plain extension: {:?}",
                self.extension
            )));
        }
        if self.search_paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::ValidationError(
                "modules.search_paths contains an empty path".to_string(),
            ));
        }
        Ok(())
    }

    /// 在 `dir` 中模块 `name` 对应的文件
    pub fn candidate(&self, dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.{}", name, self.extension))
    }

    /// 追加一个搜索目录（重复时忽略）
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }
}
