//! Exported Operation Set
//!
//! A fixed catalog of named operations callable from the other runtime.
//! Each entry pairs an immutable [`OperationDescriptor`] with a handler.
//! Arguments are checked against the descriptor (arity, then types with
//! boundary coercion) before any handler runs, so a handler only ever
//! sees well-typed input.
//!
//! ## Namespaces
//!
//! - pure functions: `add`, `factorial`, `matrix_multiply`, `concatenate`, ...
//! - `counter.*`: the bridge-owned counter
//! - `accumulator.*` / `container.*`: handle-based stateful objects
//! - `callback.*`: operations that take a callable argument

pub mod accumulator;
pub mod container;
pub mod counter;
pub mod math;
pub mod text;

use crate::bindings::marshal::{coerce, FromBridge};
use crate::bindings::protocol::{BridgeValue, OperationDescriptor, TypeTag};
use crate::callback::{Callback, CallbackHandle};
use crate::core::error::{BridgeResult, TransportError};
use crate::core::state::BridgeState;
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// 目录注册错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate operation: {0}")]
    Duplicate(String),

    #[error("Invalid descriptor for {name}: {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

/// 一次调用的单个参数
pub enum Argument<'a> {
    Value(BridgeValue),
    Callable(Box<dyn Callback + 'a>),
}

impl<'a> Argument<'a> {
    pub fn value(value: impl Into<BridgeValue>) -> Self {
        Argument::Value(value.into())
    }

    pub fn callable(callback: impl Callback + 'a) -> Self {
        Argument::Callable(Box::new(callback))
    }

    fn describe(&self) -> String {
        match self {
            Argument::Value(value) => value.type_tag().to_string(),
            Argument::Callable(_) => TypeTag::Callback.to_string(),
        }
    }
}

impl fmt::Debug for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Argument::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl From<BridgeValue> for Argument<'_> {
    fn from(value: BridgeValue) -> Self {
        Argument::Value(value)
    }
}

/// 已通过检查的一次调用
///
/// 处理函数通过类型化的访问器读取参数，通过 `state()` 借用桥接状态。
pub struct Invocation<'a> {
    descriptor: &'a OperationDescriptor,
    args: Vec<Argument<'a>>,
    state: &'a RefCell<BridgeState>,
}

impl<'a> Invocation<'a> {
    pub fn operation(&self) -> &str {
        &self.descriptor.name
    }

    /// 按声明类型读取第 `index` 个参数
    pub fn arg<T: FromBridge>(&self, index: usize) -> BridgeResult<T> {
        match self.args.get(index) {
            Some(Argument::Value(value)) => T::from_bridge(value.clone(), &self.context(index)),
            Some(Argument::Callable(_)) => Err(TransportError::TypeMismatch {
                context: self.context(index),
                expected: T::TAG,
                found: TypeTag::Callback.to_string(),
            }
            .into()),
            None => Err(TransportError::ArityMismatch {
                target: self.descriptor.name.clone(),
                expected: index + 1,
                found: self.args.len(),
            }
            .into()),
        }
    }

    pub fn number(&self, index: usize) -> BridgeResult<f64> {
        self.arg(index)
    }

    pub fn integer(&self, index: usize) -> BridgeResult<i64> {
        self.arg(index)
    }

    pub fn text(&self, index: usize) -> BridgeResult<String> {
        self.arg(index)
    }

    pub fn numbers(&self, index: usize) -> BridgeResult<Vec<f64>> {
        self.arg(index)
    }

    pub fn matrix(&self, index: usize) -> BridgeResult<Vec<Vec<f64>>> {
        self.arg(index)
    }

    /// 取得第 `index` 个参数上的回调句柄
    pub fn callback(&mut self, index: usize) -> BridgeResult<CallbackHandle<'_, 'a>> {
        let descriptor = self.descriptor;
        let signature = descriptor.callback.as_ref().ok_or_else(|| TransportError::TypeMismatch {
            context: format!("{} argument {}", descriptor.name, index + 1),
            expected: TypeTag::Callback,
            found: "operation without callback signature".to_string(),
        })?;

        let found = self.args.len();
        match self.args.get_mut(index) {
            Some(Argument::Callable(callable)) => Ok(CallbackHandle::new(
                callable.as_mut(),
                signature,
                &descriptor.name,
            )),
            Some(other) => Err(TransportError::TypeMismatch {
                context: format!("{} argument {}", descriptor.name, index + 1),
                expected: TypeTag::Callback,
                found: other.describe(),
            }
            .into()),
            None => Err(TransportError::ArityMismatch {
                target: descriptor.name.clone(),
                expected: index + 1,
                found,
            }
            .into()),
        }
    }

    /// 可变借用桥接状态
    ///
    /// 外层调用正持有状态时（回调中的重入调用）返回 `TransportError::Reentrant`。
    pub fn state(&self) -> BridgeResult<RefMut<'a, BridgeState>> {
        self.state
            .try_borrow_mut()
            .map_err(|_| TransportError::Reentrant(self.descriptor.name.clone()).into())
    }

    fn context(&self, index: usize) -> String {
        format!("{} argument {}", self.descriptor.name, index + 1)
    }
}

type Handler = Box<dyn Fn(&mut Invocation<'_>) -> BridgeResult<BridgeValue>>;

struct CatalogEntry {
    descriptor: OperationDescriptor,
    handler: Handler,
}

/// 操作目录：名称 → 描述符 + 处理函数
#[derive(Default)]
pub struct OperationCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含全部内置操作的目录
    pub fn with_builtins() -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        math::register(&mut catalog)?;
        text::register(&mut catalog)?;
        counter::register(&mut catalog)?;
        accumulator::register(&mut catalog)?;
        container::register(&mut catalog)?;
        crate::callback::register(&mut catalog)?;
        Ok(catalog)
    }

    /// 注册操作；名称重复或回调签名不一致时失败
    pub fn register<F>(&mut self, descriptor: OperationDescriptor, handler: F) -> Result<(), CatalogError>
    where
        F: Fn(&mut Invocation<'_>) -> BridgeResult<BridgeValue> + 'static,
    {
        if self.entries.contains_key(&descriptor.name) {
            return Err(CatalogError::Duplicate(descriptor.name));
        }
        Self::validate(&descriptor)?;

        self.entries.insert(
            descriptor.name.clone(),
            CatalogEntry {
                descriptor,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    fn validate(descriptor: &OperationDescriptor) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidDescriptor {
            name: descriptor.name.clone(),
            reason: reason.to_string(),
        };

        if descriptor.name.is_empty() {
            return Err(invalid("empty name"));
        }
        if descriptor.returns == TypeTag::Callback {
            return Err(invalid("callbacks cannot be returned"));
        }
        match (descriptor.takes_callback(), &descriptor.callback) {
            (true, None) => Err(invalid("callback parameter without a signature")),
            (false, Some(_)) => Err(invalid("signature without a callback parameter")),
            (true, Some(signature)) if signature.params.contains(&TypeTag::Callback) => {
                Err(invalid("callbacks cannot take callbacks"))
            }
            _ => Ok(()),
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperationDescriptor> {
        self.entries.get(name).map(|entry| &entry.descriptor)
    }

    /// 按名称排序的全部描述符
    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.entries.values().map(|entry| &entry.descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 检查参数并分派到处理函数
    pub fn invoke<'a>(
        &'a self,
        name: &str,
        args: Vec<Argument<'a>>,
        state: &'a RefCell<BridgeState>,
    ) -> BridgeResult<BridgeValue> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| TransportError::UnknownOperation(name.to_string()))?;
        let descriptor = &entry.descriptor;

        if args.len() != descriptor.arity() {
            return Err(TransportError::ArityMismatch {
                target: descriptor.name.clone(),
                expected: descriptor.arity(),
                found: args.len(),
            }
            .into());
        }

        let args = args
            .into_iter()
            .zip(&descriptor.params)
            .enumerate()
            .map(|(i, (arg, tag))| check_argument(descriptor, i, arg, *tag))
            .collect::<BridgeResult<Vec<_>>>()?;

        let mut invocation = Invocation {
            descriptor,
            args,
            state,
        };
        (entry.handler)(&mut invocation)
    }
}

fn check_argument<'a>(
    descriptor: &OperationDescriptor,
    index: usize,
    arg: Argument<'a>,
    expected: TypeTag,
) -> BridgeResult<Argument<'a>> {
    let context = format!("{} argument {}", descriptor.name, index + 1);
    match (expected, arg) {
        (TypeTag::Callback, arg @ Argument::Callable(_)) => Ok(arg),
        (_, Argument::Value(value)) => Ok(Argument::Value(coerce(value, expected, &context)?)),
        (expected, arg) => Err(TransportError::TypeMismatch {
            context,
            expected,
            found: arg.describe(),
        }
        .into()),
    }
}

impl fmt::Debug for OperationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCatalog")
            .field("operations", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::protocol::CallbackSignature;
    use crate::core::error::{BridgeError, ErrorKind};

    fn echo(inv: &mut Invocation<'_>) -> BridgeResult<BridgeValue> {
        inv.number(0).map(BridgeValue::Number)
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut catalog = OperationCatalog::new();
        let descriptor = OperationDescriptor::new("echo", vec![TypeTag::Number], TypeTag::Number);
        catalog.register(descriptor.clone(), echo).unwrap();

        let err = catalog.register(descriptor, echo).unwrap_err();
        assert_eq!(err, CatalogError::Duplicate("echo".to_string()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_callback_param_requires_signature() {
        let mut catalog = OperationCatalog::new();
        let err = catalog
            .register(
                OperationDescriptor::new("bad", vec![TypeTag::Callback], TypeTag::Void),
                |_: &mut Invocation<'_>| Ok(BridgeValue::Void),
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDescriptor { .. }));

        let err = catalog
            .register(
                OperationDescriptor::new("bad", vec![], TypeTag::Void)
                    .with_callback(CallbackSignature::new(vec![], TypeTag::Void)),
                |_: &mut Invocation<'_>| Ok(BridgeValue::Void),
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_builtin_listing_is_sorted() {
        let catalog = OperationCatalog::with_builtins().unwrap();
        let names: Vec<_> = catalog.descriptors().map(|d| d.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for name in ["add", "factorial", "counter.increment", "accumulator.divide", "callback.execute"] {
            assert!(catalog.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_invoke_checks_before_dispatch() {
        let catalog = OperationCatalog::with_builtins().unwrap();
        let state = RefCell::new(BridgeState::default());

        let err = catalog
            .invoke("add", vec![Argument::value(1.0)], &state)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::ArityMismatch { expected: 2, found: 1, .. })
        ));

        let err = catalog
            .invoke("factorial", vec![Argument::value("five")], &state)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportError);

        let err = catalog.invoke("nope", vec![], &state).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Transport(TransportError::UnknownOperation("nope".into()))
        );
    }

    #[test]
    fn test_callable_in_value_position_is_rejected() {
        let catalog = OperationCatalog::with_builtins().unwrap();
        let state = RefCell::new(BridgeState::default());
        let err = catalog
            .invoke(
                "text_length",
                vec![Argument::callable(|_: &[BridgeValue]| Ok(BridgeValue::Void))],
                &state,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::TypeMismatch { expected: TypeTag::Text, .. })
        ));
    }

    #[test]
    fn test_state_is_not_reentrant() {
        let catalog = OperationCatalog::with_builtins().unwrap();
        let state = RefCell::new(BridgeState::default());
        let _held = state.borrow_mut();

        let err = catalog.invoke("counter.increment", vec![], &state).unwrap_err();
        assert!(matches!(err, BridgeError::Transport(TransportError::Reentrant(_))));

        // stateless operations do not touch the state
        let sum = catalog
            .invoke("add", vec![Argument::value(1i64), Argument::value(2.5)], &state)
            .unwrap();
        assert_eq!(sum, BridgeValue::Number(3.5));
    }

    #[test]
    fn test_callback_accessor_reports_missing_argument() {
        let mut catalog = OperationCatalog::new();
        catalog
            .register(
                OperationDescriptor::new("second_callback", vec![TypeTag::Callback], TypeTag::Void)
                    .with_callback(CallbackSignature::new(vec![], TypeTag::Void)),
                |inv: &mut Invocation<'_>| {
                    inv.callback(1)?;
                    Ok(BridgeValue::Void)
                },
            )
            .unwrap();
        let state = RefCell::new(BridgeState::default());

        let err = catalog
            .invoke(
                "second_callback",
                vec![Argument::callable(|_: &[BridgeValue]| Ok(BridgeValue::Void))],
                &state,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::ArityMismatch { expected: 2, found: 1, .. })
        ));
    }
}
