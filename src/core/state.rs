//! 桥接状态
//!
//! 计数器和有状态对象都由 `Bridge` 拥有，放在一个 `RefCell` 中；
//! 脚本端只持有整数句柄。

use crate::core::error::{BridgeResult, TransportError};
use crate::impl_default;
use crate::operations::accumulator::{self, Accumulator};
use crate::operations::container::{self, DataContainer};
use crate::operations::counter::CounterState;
use std::collections::BTreeMap;

/// 句柄表：整数句柄 → 实例
///
/// 句柄从 1 开始单调递增，释放后不复用。
#[derive(Debug, Clone)]
pub struct HandleTable<T> {
    kind: &'static str,
    next: i64,
    items: BTreeMap<i64, T>,
}

impl<T> HandleTable<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            next: 1,
            items: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> i64 {
        let handle = self.next;
        self.next += 1;
        self.items.insert(handle, item);
        handle
    }

    pub fn get(&self, handle: i64) -> BridgeResult<&T> {
        self.items.get(&handle).ok_or_else(|| self.invalid(handle))
    }

    pub fn get_mut(&mut self, handle: i64) -> BridgeResult<&mut T> {
        let kind = self.kind;
        self.items.get_mut(&handle).ok_or_else(|| {
            TransportError::InvalidHandle { kind, handle }.into()
        })
    }

    pub fn remove(&mut self, handle: i64) -> BridgeResult<T> {
        self.items.remove(&handle).ok_or_else(|| self.invalid(handle))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn invalid(&self, handle: i64) -> crate::core::error::BridgeError {
        TransportError::InvalidHandle {
            kind: self.kind,
            handle,
        }
        .into()
    }
}

/// 一个 `Bridge` 拥有的全部可变状态
#[derive(Debug, Clone)]
pub struct BridgeState {
    pub counter: CounterState,
    pub accumulators: HandleTable<Accumulator>,
    pub containers: HandleTable<DataContainer>,
}

impl_default!(BridgeState {
    counter: CounterState::default(),
    accumulators: HandleTable::new(accumulator::KIND),
    containers: HandleTable::new(container::KIND),
});

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 存活的有状态对象总数
    pub fn live_objects(&self) -> usize {
        self.accumulators.len() + self.containers.len()
    }

    /// 按种类释放一个句柄；句柄不存在（已释放或已重置）时返回 `false`
    pub fn release(&mut self, kind: &str, handle: i64) -> bool {
        match kind {
            accumulator::KIND => self.accumulators.remove(handle).is_ok(),
            container::KIND => self.containers.remove(handle).is_ok(),
            _ => false,
        }
    }
}

/// 有状态对象种类名 → 静态名称
pub fn object_kind(name: &str) -> Option<&'static str> {
    [accumulator::KIND, container::KIND]
        .into_iter()
        .find(|kind| *kind == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BridgeError;

    #[test]
    fn test_handles_are_not_reused() {
        let mut table = HandleTable::new("thing");
        let first = table.insert("a");
        let second = table.insert("b");
        assert_eq!((first, second), (1, 2));

        assert_eq!(table.remove(first).unwrap(), "a");
        let third = table.insert("c");
        assert_eq!(third, 3);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unknown_handle_is_transport_error() {
        let mut table: HandleTable<u8> = HandleTable::new("thing");
        let err = table.get_mut(7).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Transport(TransportError::InvalidHandle {
                kind: "thing",
                handle: 7
            })
        );
        assert!(table.remove(7).is_err());
    }

    #[test]
    fn test_release_by_kind() {
        let mut state = BridgeState::new();
        let acc = state.accumulators.insert(Accumulator::new(1.0));
        let container = state.containers.insert(DataContainer::default());
        assert_eq!(state.live_objects(), 2);

        assert!(!state.release(container::KIND, acc + 10));
        assert!(state.release(accumulator::KIND, acc));
        assert!(!state.release(accumulator::KIND, acc));
        assert!(!state.release("widget", container));
        assert!(state.release(container::KIND, container));
        assert_eq!(state.live_objects(), 0);

        assert_eq!(object_kind("container"), Some(container::KIND));
        assert_eq!(object_kind("widget"), None);
    }

    #[test]
    fn test_default_state_is_empty() {
        let state = BridgeState::new();
        assert_eq!(state.counter.get(), 0);
        assert_eq!(state.live_objects(), 0);
    }
}
