//! 累加器：带操作日志的有状态对象
//!
//! 实例保存在桥接状态的句柄表中，脚本端只持有整数句柄。
//! 所有修改先校验再执行：失败的 `divide` 不改变数值，也不追加日志。

use super::{CatalogError, Invocation, OperationCatalog};
use crate::bindings::protocol::{BridgeValue, OperationDescriptor, TypeTag};
use crate::core::error::{BridgeResult, DomainError};
use std::fmt;

pub const KIND: &str = "accumulator";

/// 累加器支持的二元运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl AccumulatorOp {
    pub const ALL: [AccumulatorOp; 4] = [
        AccumulatorOp::Add,
        AccumulatorOp::Subtract,
        AccumulatorOp::Multiply,
        AccumulatorOp::Divide,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AccumulatorOp::Add => "add",
            AccumulatorOp::Subtract => "subtract",
            AccumulatorOp::Multiply => "multiply",
            AccumulatorOp::Divide => "divide",
        }
    }
}

impl fmt::Display for AccumulatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    value: f64,
    history: Vec<String>,
}

impl Accumulator {
    pub fn new(initial: f64) -> Self {
        Self {
            value: initial,
            history: Vec::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// 按插入顺序的操作日志
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// 应用一次运算，返回新的当前值
    pub fn apply(&mut self, op: AccumulatorOp, x: f64) -> Result<f64, DomainError> {
        let next = match op {
            AccumulatorOp::Add => self.value + x,
            AccumulatorOp::Subtract => self.value - x,
            AccumulatorOp::Multiply => self.value * x,
            AccumulatorOp::Divide => {
                if x == 0.0 {
                    return Err(DomainError::DivisionByZero);
                }
                self.value / x
            }
        };
        self.value = next;
        self.history.push(format!("{}({})", op, x));
        Ok(next)
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.history.clear();
    }
}

fn apply(inv: &mut Invocation<'_>, op: AccumulatorOp) -> BridgeResult<BridgeValue> {
    let handle = inv.integer(0)?;
    let x = inv.number(1)?;
    let mut state = inv.state()?;
    let accumulator = state.accumulators.get_mut(handle)?;
    Ok(accumulator.apply(op, x)?.into())
}

pub fn register(catalog: &mut OperationCatalog) -> Result<(), CatalogError> {
    catalog.register(
        OperationDescriptor::new("accumulator.create", vec![TypeTag::Number], TypeTag::Integer)
            .summary("Create an accumulator with an initial value; returns its handle"),
        |inv: &mut Invocation<'_>| {
            let initial = inv.number(0)?;
            let handle = inv.state()?.accumulators.insert(Accumulator::new(initial));
            Ok(handle.into())
        },
    )?;

    for op in AccumulatorOp::ALL {
        let mut descriptor = OperationDescriptor::new(
            format!("accumulator.{}", op),
            vec![TypeTag::Integer, TypeTag::Number],
            TypeTag::Number,
        )
        .summary(format!("Apply {} to the current value", op));
        if op == AccumulatorOp::Divide {
            descriptor = descriptor.fallible();
        }
        catalog.register(descriptor, move |inv: &mut Invocation<'_>| apply(inv, op))?;
    }

    catalog.register(
        OperationDescriptor::new("accumulator.reset", vec![TypeTag::Integer], TypeTag::Void)
            .summary("Reset the value to zero and clear the history"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            inv.state()?.accumulators.get_mut(handle)?.reset();
            Ok(BridgeValue::Void)
        },
    )?;
    catalog.register(
        OperationDescriptor::new("accumulator.value", vec![TypeTag::Integer], TypeTag::Number)
            .summary("Current value"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            Ok(inv.state()?.accumulators.get(handle)?.value().into())
        },
    )?;
    catalog.register(
        OperationDescriptor::new("accumulator.history", vec![TypeTag::Integer], TypeTag::TextList)
            .summary("Operation log in insertion order"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            Ok(inv.state()?.accumulators.get(handle)?.history().to_vec().into())
        },
    )?;
    catalog.register(
        OperationDescriptor::new("accumulator.release", vec![TypeTag::Integer], TypeTag::Void)
            .summary("Drop the accumulator behind a handle"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            inv.state()?.accumulators.remove(handle)?;
            Ok(BridgeValue::Void)
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_log_in_order() {
        let mut acc = Accumulator::new(10.0);
        assert_eq!(acc.apply(AccumulatorOp::Add, 5.0), Ok(15.0));
        assert_eq!(acc.apply(AccumulatorOp::Multiply, 2.0), Ok(30.0));
        assert_eq!(acc.apply(AccumulatorOp::Subtract, 0.5), Ok(29.5));
        assert_eq!(acc.apply(AccumulatorOp::Divide, 2.5), Ok(11.8));
        assert_eq!(
            acc.history(),
            ["add(5)", "multiply(2)", "subtract(0.5)", "divide(2.5)"]
        );
    }

    #[test]
    fn test_failed_divide_leaves_state_unchanged() {
        let mut acc = Accumulator::new(0.0);
        acc.apply(AccumulatorOp::Add, 10.0).unwrap();
        let before = acc.clone();

        assert_eq!(
            acc.apply(AccumulatorOp::Divide, 0.0),
            Err(DomainError::DivisionByZero)
        );
        assert_eq!(acc, before);
    }

    #[test]
    fn test_reset_clears_value_and_history() {
        let mut acc = Accumulator::new(3.0);
        acc.apply(AccumulatorOp::Add, 1.0).unwrap();
        acc.reset();
        assert_eq!(acc.value(), 0.0);
        assert!(acc.history().is_empty());
    }
}
