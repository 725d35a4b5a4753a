//! 跨运行时调用桥
//!
//! `Bridge` 拥有操作目录、桥接状态和错误报告器。所有入口
//! （脚本适配器、JSON 协议、原生调用）都经过 [`Bridge::invoke`]，
//! 失败的调用在这里统一报告，然后原样返回给调用方。
//!
//! 脚本对象被回收时只登记待释放的句柄（回收可能发生在调用中途），
//! 真正的释放在下一次调用开始或查询存活对象时进行。

use crate::bindings::protocol::{BridgeValue, CallRequest, CallResponse, ErrorEnvelope, OperationDescriptor};
use crate::config::{BridgeConfig, ErrorConfig};
use crate::core::error::{BridgeError, BridgeResult, ErrorKind, HostResult, TransportError};
use crate::core::error_reporter::ErrorReporter;
use crate::core::state::BridgeState;
use crate::operations::{Argument, CatalogError, OperationCatalog};
use std::cell::RefCell;

pub struct Bridge {
    catalog: OperationCatalog,
    state: RefCell<BridgeState>,
    released: RefCell<Vec<(&'static str, i64)>>,
    reporter: ErrorReporter,
}

impl Bridge {
    pub fn new(catalog: OperationCatalog, reporter: ErrorReporter) -> Self {
        Self {
            catalog,
            state: RefCell::new(BridgeState::default()),
            released: RefCell::new(Vec::new()),
            reporter,
        }
    }

    /// 内置目录 + 默认错误报告配置
    pub fn with_builtins() -> Result<Self, CatalogError> {
        Ok(Self::new(
            OperationCatalog::with_builtins()?,
            ErrorReporter::new(ErrorConfig::default()),
        ))
    }

    pub fn from_config(config: &BridgeConfig) -> HostResult<Self> {
        config.validate()?;
        Ok(Self::new(
            OperationCatalog::with_builtins()?,
            ErrorReporter::new(config.errors.clone()),
        ))
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperationDescriptor> {
        self.catalog.descriptor(name)
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// 调用一个操作；参数中可以包含回调
    pub fn invoke(&self, name: &str, args: Vec<Argument<'_>>) -> BridgeResult<BridgeValue> {
        tracing::trace!(target: "bridge", operation = name, args = args.len(), "invoke");
        self.collect_released();
        let result = self.catalog.invoke(name, args, &self.state);
        if let Err(ref err) = result {
            self.reporter.report(name, err);
        }
        result
    }

    /// 只含普通值的调用
    pub fn call(&self, name: &str, args: Vec<BridgeValue>) -> BridgeResult<BridgeValue> {
        self.invoke(name, args.into_iter().map(Argument::Value).collect())
    }

    pub fn handle_request(&self, request: CallRequest) -> CallResponse {
        CallResponse::from(self.call(&request.operation, request.args))
    }

    /// JSON 请求 → JSON 响应；格式错误的请求得到 `TransportError` 响应
    pub fn handle_json(&self, request: &str) -> String {
        let response = match serde_json::from_str::<CallRequest>(request) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                let err: BridgeError = TransportError::Malformed(e.to_string()).into();
                self.reporter.report("<json>", &err);
                CallResponse::Error(ErrorEnvelope::from(&err))
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"error":{{"kind":"{}","message":{:?}}}}}"#,
                ErrorKind::TransportError,
                e.to_string()
            )
        })
    }

    /// 按名称排序的目录 JSON
    pub fn catalog_json(&self) -> serde_json::Result<String> {
        let descriptors: Vec<&OperationDescriptor> = self.catalog.descriptors().collect();
        serde_json::to_string(&descriptors)
    }

    /// 清空计数器与全部有状态对象
    pub fn reset_state(&self) -> BridgeResult<()> {
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| TransportError::Reentrant("reset_state".to_string()))?;
        *state = BridgeState::default();
        Ok(())
    }

    /// 存活的有状态对象数量；状态正被借用时返回 `None`
    pub fn live_objects(&self) -> Option<usize> {
        self.collect_released();
        self.state.try_borrow().ok().map(|state| state.live_objects())
    }

    /// 登记一个不再可达的对象句柄，稍后释放
    pub fn defer_release(&self, kind: &'static str, handle: i64) {
        match self.released.try_borrow_mut() {
            Ok(mut queue) => queue.push((kind, handle)),
            Err(_) => tracing::warn!(target: "bridge", kind, handle, "Release queue busy, object kept"),
        }
    }

    /// 等待释放的句柄数
    pub fn pending_releases(&self) -> usize {
        self.released.try_borrow().map(|queue| queue.len()).unwrap_or(0)
    }

    /// 释放登记过的句柄；状态正被借用时留到下一次
    fn collect_released(&self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        let Ok(mut queue) = self.released.try_borrow_mut() else {
            return;
        };
        for (kind, handle) in queue.drain(..) {
            if state.release(kind, handle) {
                tracing::debug!(target: "bridge", kind, handle, "Released unreachable object");
            }
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("catalog", &self.catalog)
            .field("reporter", &self.reporter)
            .finish()
    }
}
