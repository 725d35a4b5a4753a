//! 数据容器：字符串键到整数值的有序映射

use super::{CatalogError, Invocation, OperationCatalog};
use crate::bindings::protocol::{BridgeValue, OperationDescriptor, TypeTag};
use crate::core::error::DomainError;
use std::collections::BTreeMap;

pub const KIND: &str = "container";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataContainer {
    entries: BTreeMap<String, i64>,
}

impl DataContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖
    pub fn insert(&mut self, key: impl Into<String>, value: i64) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Result<i64, DomainError> {
        self.entries
            .get(key)
            .copied()
            .ok_or_else(|| DomainError::MissingKey(key.to_string()))
    }

    pub fn entries(&self) -> &BTreeMap<String, i64> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_record(&self) -> BTreeMap<String, BridgeValue> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), BridgeValue::Integer(*v)))
            .collect()
    }
}

pub fn register(catalog: &mut OperationCatalog) -> Result<(), CatalogError> {
    catalog.register(
        OperationDescriptor::new("container.create", vec![], TypeTag::Integer)
            .summary("Create an empty container; returns its handle"),
        |inv: &mut Invocation<'_>| Ok(inv.state()?.containers.insert(DataContainer::new()).into()),
    )?;
    catalog.register(
        OperationDescriptor::new(
            "container.insert",
            vec![TypeTag::Integer, TypeTag::Text, TypeTag::Integer],
            TypeTag::Void,
        )
        .summary("Insert or overwrite a key"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            let key = inv.text(1)?;
            let value = inv.integer(2)?;
            inv.state()?.containers.get_mut(handle)?.insert(key, value);
            Ok(BridgeValue::Void)
        },
    )?;
    catalog.register(
        OperationDescriptor::new(
            "container.get",
            vec![TypeTag::Integer, TypeTag::Text],
            TypeTag::Integer,
        )
        .fallible()
        .summary("Value for a key; fails when the key is missing"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            let key = inv.text(1)?;
            let state = inv.state()?;
            let value = state.containers.get(handle)?.get(&key)?;
            Ok(value.into())
        },
    )?;
    catalog.register(
        OperationDescriptor::new("container.entries", vec![TypeTag::Integer], TypeTag::Record)
            .summary("All entries ordered by key"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            Ok(inv.state()?.containers.get(handle)?.to_record().into())
        },
    )?;
    catalog.register(
        OperationDescriptor::new("container.release", vec![TypeTag::Integer], TypeTag::Void)
            .summary("Drop the container behind a handle"),
        |inv: &mut Invocation<'_>| {
            let handle = inv.integer(0)?;
            inv.state()?.containers.remove(handle)?;
            Ok(BridgeValue::Void)
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_overwrites() {
        let mut container = DataContainer::new();
        container.insert("a", 1);
        container.insert("a", 2);
        assert_eq!(container.get("a"), Ok(2));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_missing_key_is_domain_error() {
        let container = DataContainer::new();
        assert_eq!(
            container.get("nope"),
            Err(DomainError::MissingKey("nope".to_string()))
        );
        assert!(container.is_empty());
    }

    #[test]
    fn test_record_is_ordered_by_key() {
        let mut container = DataContainer::new();
        container.insert("zeta", 26);
        container.insert("alpha", 1);
        let keys: Vec<_> = container.to_record().into_keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
