//! 错误报告模块
//!
//! 记录每一次失败的跨边界调用：按种类和来源统计、保留最近的记录、
//! 通知注册的观察者，并按配置写入日志。报告不会改变被传播的错误。

use crate::config::ErrorConfig;
use crate::core::error::{BridgeError, BridgeResult, CallbackError, ErrorKind};
use crate::core::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

/// 错误记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 错误种类
    pub kind: ErrorKind,
    /// 错误来源（操作名或脚本函数名）
    pub source: String,
    /// 错误消息
    pub message: String,
    /// 时间戳（秒）
    pub timestamp: u64,
    /// 错误详情（例如脚本调用栈）
    pub details: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
            timestamp: current_timestamp(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn from_error(source: impl Into<String>, error: &BridgeError) -> Self {
        let record = Self::new(error.kind(), source, error.message());
        match error {
            BridgeError::Callback(CallbackError {
                stack: Some(stack), ..
            }) => record.with_details(stack.clone()),
            _ => record,
        }
    }
}

/// 错误统计信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    /// 错误总数
    pub total_count: u64,
    /// 按错误种类分组的计数
    pub by_kind: BTreeMap<ErrorKind, u64>,
    /// 按错误来源分组的计数
    pub by_source: BTreeMap<String, u64>,
    /// 最近发生的错误（最多保留 N 条）
    pub recent: VecDeque<ErrorRecord>,
}

impl ErrorStats {
    /// 获取最常见的错误来源
    pub fn most_common_source(&self) -> Option<(&String, &u64)> {
        self.by_source.iter().max_by_key(|(_, count)| *count)
    }

    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

type Observer = Box<dyn Fn(&ErrorRecord)>;

/// 错误报告器
///
/// 单线程使用；观察者在记录写入后依次被调用。
pub struct ErrorReporter {
    stats: RefCell<ErrorStats>,
    observers: RefCell<Vec<Observer>>,
    config: ErrorConfig,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(ErrorConfig::default())
    }
}

impl ErrorReporter {
    pub fn new(config: ErrorConfig) -> Self {
        Self {
            stats: RefCell::new(ErrorStats::default()),
            observers: RefCell::new(Vec::new()),
            config,
        }
    }

    pub fn config(&self) -> &ErrorConfig {
        &self.config
    }

    /// 注册观察者
    pub fn add_observer(&self, observer: impl Fn(&ErrorRecord) + 'static) {
        self.observers.borrow_mut().push(Box::new(observer));
    }

    pub fn clear_observers(&self) {
        self.observers.borrow_mut().clear();
    }

    /// 记录一次失败
    pub fn report(&self, source: &str, error: &BridgeError) {
        self.record(ErrorRecord::from_error(source, error));
    }

    pub fn record(&self, record: ErrorRecord) {
        if self.config.log_errors {
            match (&record.details, self.config.verbose) {
                (Some(details), true) => tracing::warn!(
                    target: "bridge",
                    kind = %record.kind,
                    source = %record.source,
                    "{}\n{}",
                    record.message,
                    details
                ),
                _ => tracing::warn!(
                    target: "bridge",
                    kind = %record.kind,
                    source = %record.source,
                    "{}",
                    record.message
                ),
            }
        }

        {
            let mut stats = self.stats.borrow_mut();
            stats.total_count += 1;
            *stats.by_kind.entry(record.kind).or_insert(0) += 1;
            *stats.by_source.entry(record.source.clone()).or_insert(0) += 1;
            stats.recent.push_back(record.clone());
            while stats.recent.len() > self.config.max_recent {
                stats.recent.pop_front();
            }
        }

        // 观察者可能再次发起调用，记录写入完成后再通知
        if let Ok(observers) = self.observers.try_borrow() {
            for observer in observers.iter() {
                observer(&record);
            }
        }
    }

    /// 失败时报告并返回 `None`
    pub fn capture<T>(&self, source: &str, result: BridgeResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.report(source, &err);
                None
            }
        }
    }

    /// 获取错误统计
    pub fn stats(&self) -> ErrorStats {
        self.stats.borrow().clone()
    }

    pub fn total(&self) -> u64 {
        self.stats.borrow().total_count
    }

    pub fn last(&self) -> Option<ErrorRecord> {
        self.stats.borrow().recent.back().cloned()
    }

    /// 清除所有统计
    pub fn clear(&self) {
        *self.stats.borrow_mut() = ErrorStats::default();
    }

    /// 导出错误报告（JSON 格式）
    pub fn export_report(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.stats())
    }

    /// 格式化摘要
    pub fn summary(&self) -> String {
        let stats = self.stats.borrow();
        let mut lines = vec![format!("total errors: {}", stats.total_count)];
        for (kind, count) in &stats.by_kind {
            lines.push(format!("  {}: {}", kind, count));
        }
        if let Some((source, count)) = stats.most_common_source() {
            lines.push(format!("most common source: {} ({})", source, count));
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("stats", &self.stats.borrow())
            .field("observers", &self.observers.borrow().len())
            .field("config", &self.config)
            .finish()
    }
}
