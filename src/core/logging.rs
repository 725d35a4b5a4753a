//! 日志初始化
//!
//! `RUST_LOG` 优先；未设置时使用配置中的级别。重复初始化是无害的。
//! 文件与控制台是两个独立的输出层，可以同时启用。

use crate::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// 实际启用的输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSinks {
    pub file: bool,
    pub console: bool,
}

/// 按配置构建订阅者，不安装
///
/// 日志文件打不开时只输出到控制台（若启用），并在 stderr 提示一次。
pub fn build_subscriber(
    config: &LoggingConfig,
    verbose: bool,
) -> (Box<dyn Subscriber + Send + Sync>, LogSinks) {
    let level = if verbose {
        "debug"
    } else {
        config.level.as_filter()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = if config.log_to_file {
        open_log_file(&config.log_file_path).map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        })
    } else {
        None
    };
    let console_layer = config
        .log_to_console
        .then(|| fmt::layer().with_writer(std::io::stderr));

    let sinks = LogSinks {
        file: file_layer.is_some(),
        console: console_layer.is_some(),
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);
    (Box::new(subscriber), sinks)
}

/// 按配置安装全局 `tracing` 订阅者
///
/// `verbose` 把默认级别提升到 `debug`。
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> LogSinks {
    let (subscriber, sinks) = build_subscriber(config, verbose);
    let _ = tracing::subscriber::set_global_default(subscriber);
    sinks
}

fn open_log_file(path: &str) -> Option<File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("cannot open log file {}: {}", path, e);
            None
        }
    }
}
