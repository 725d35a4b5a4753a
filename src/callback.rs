//! Callback Invocation Path
//!
//! A callable from the calling runtime enters the bridge as an ordinary
//! argument of a single operation call. The native side sees it only as
//! a [`CallbackHandle`], which borrows from the enclosing [`Invocation`]
//! and therefore cannot be retained after the operation returns.
//!
//! Every invocation is checked against the operation's declared
//! [`CallbackSignature`]: arguments before the call, the result after.
//! A failure raised on the callback's own side is propagated unchanged
//! as a `CallbackError`.

use crate::bindings::marshal::{coerce, FromBridge};
use crate::bindings::protocol::{BridgeValue, CallbackSignature, OperationDescriptor, TypeTag};
use crate::core::error::{BridgeResult, TransportError};
use crate::operations::{CatalogError, Invocation, OperationCatalog};

/// 来自调用方运行时的可调用对象
///
/// 绑定适配器为每种脚本语言实现此 trait；原生测试可以直接使用闭包。
pub trait Callback {
    fn call(&mut self, args: &[BridgeValue]) -> BridgeResult<BridgeValue>;
}

impl<F> Callback for F
where
    F: FnMut(&[BridgeValue]) -> BridgeResult<BridgeValue>,
{
    fn call(&mut self, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        self(args)
    }
}

/// Call-scoped view of a callback argument
pub struct CallbackHandle<'h, 'a> {
    callable: &'h mut (dyn Callback + 'a),
    signature: &'h CallbackSignature,
    operation: &'h str,
    calls: usize,
}

impl<'h, 'a> CallbackHandle<'h, 'a> {
    pub(crate) fn new(
        callable: &'h mut (dyn Callback + 'a),
        signature: &'h CallbackSignature,
        operation: &'h str,
    ) -> Self {
        Self {
            callable,
            signature,
            operation,
            calls: 0,
        }
    }

    pub fn signature(&self) -> &CallbackSignature {
        self.signature
    }

    /// Number of completed invocations so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// 调用回调；参数与结果都按声明的签名检查
    pub fn invoke(&mut self, args: Vec<BridgeValue>) -> BridgeResult<BridgeValue> {
        let target = format!("callback of {}", self.operation);
        if args.len() != self.signature.params.len() {
            return Err(TransportError::ArityMismatch {
                target,
                expected: self.signature.params.len(),
                found: args.len(),
            }
            .into());
        }

        let args = args
            .into_iter()
            .zip(&self.signature.params)
            .enumerate()
            .map(|(i, (value, tag))| coerce(value, *tag, &format!("{} argument {}", target, i + 1)))
            .collect::<BridgeResult<Vec<_>>>()?;

        let result = self.callable.call(&args)?;
        self.calls += 1;

        if self.signature.returns == TypeTag::Void {
            return Ok(BridgeValue::Void);
        }
        coerce(result, self.signature.returns, &format!("{} result", target))
    }

    /// 调用并取出指定类型的结果
    pub fn invoke_as<T: FromBridge>(&mut self, args: Vec<BridgeValue>) -> BridgeResult<T> {
        let result = self.invoke(args)?;
        T::from_bridge(result, self.operation)
    }
}

/// Message passed to the callback of `callback.execute`
pub const GREETING: &str = "Hello from native";

/// 注册回调相关操作
pub fn register(catalog: &mut OperationCatalog) -> Result<(), CatalogError> {
    catalog.register(
        OperationDescriptor::new("callback.execute", vec![TypeTag::Callback], TypeTag::Void)
            .fallible()
            .with_callback(CallbackSignature::new(vec![TypeTag::Text], TypeTag::Void))
            .summary("Invoke the callback once with a greeting"),
        execute,
    )?;

    catalog.register(
        OperationDescriptor::new(
            "callback.transform",
            vec![TypeTag::Text, TypeTag::Callback],
            TypeTag::Text,
        )
        .fallible()
        .with_callback(CallbackSignature::new(vec![TypeTag::Text], TypeTag::Text))
        .summary("Pass text through the callback and return its result"),
        transform,
    )?;

    catalog.register(
        OperationDescriptor::new(
            "callback.map_numbers",
            vec![TypeTag::NumberList, TypeTag::Callback],
            TypeTag::NumberList,
        )
        .fallible()
        .with_callback(CallbackSignature::new(vec![TypeTag::Number], TypeTag::Number))
        .summary("Apply the callback to each number in order"),
        map_numbers,
    )?;

    Ok(())
}

fn execute(inv: &mut Invocation<'_>) -> BridgeResult<BridgeValue> {
    let mut callback = inv.callback(0)?;
    callback.invoke(vec![BridgeValue::from(GREETING)])?;
    Ok(BridgeValue::Void)
}

fn transform(inv: &mut Invocation<'_>) -> BridgeResult<BridgeValue> {
    let input = inv.text(0)?;
    let mut callback = inv.callback(1)?;
    let output: String = callback.invoke_as(vec![BridgeValue::Text(input)])?;
    Ok(BridgeValue::Text(output))
}

fn map_numbers(inv: &mut Invocation<'_>) -> BridgeResult<BridgeValue> {
    let numbers = inv.numbers(0)?;
    let mut callback = inv.callback(1)?;
    let mapped = numbers
        .into_iter()
        .map(|n| callback.invoke_as::<f64>(vec![BridgeValue::Number(n)]))
        .collect::<BridgeResult<Vec<_>>>()?;
    Ok(BridgeValue::NumberList(mapped))
}
