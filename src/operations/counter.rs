//! 桥接状态持有的计数器
//!
//! 生命周期与所属 `Bridge` 相同；只能通过 `counter.*` 操作修改。

use super::{CatalogError, Invocation, OperationCatalog};
use crate::bindings::protocol::{BridgeValue, OperationDescriptor, TypeTag};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterState {
    value: i64,
}

impl CounterState {
    /// 返回自增后的值
    pub fn increment(&mut self) -> i64 {
        self.value = self.value.wrapping_add(1);
        self.value
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}

pub fn register(catalog: &mut OperationCatalog) -> Result<(), CatalogError> {
    catalog.register(
        OperationDescriptor::new("counter.increment", vec![], TypeTag::Integer)
            .summary("Increment the counter and return the new value"),
        |inv: &mut Invocation<'_>| Ok(inv.state()?.counter.increment().into()),
    )?;
    catalog.register(
        OperationDescriptor::new("counter.get", vec![], TypeTag::Integer)
            .summary("Current counter value"),
        |inv: &mut Invocation<'_>| Ok(inv.state()?.counter.get().into()),
    )?;
    catalog.register(
        OperationDescriptor::new("counter.reset", vec![], TypeTag::Void)
            .summary("Reset the counter to zero"),
        |inv: &mut Invocation<'_>| {
            inv.state()?.counter.reset();
            Ok(BridgeValue::Void)
        },
    )?;
    Ok(())
}
