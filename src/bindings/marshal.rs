//! 边界值的类型转换
//!
//! `coerce` 按声明的类型标签检查并转换一个 `BridgeValue`；
//! `FromBridge` 把已经通过检查的值取出为 Rust 原生类型。

use super::protocol::{parse_non_finite, BridgeValue, TypeTag};
use crate::core::error::{BridgeResult, TransportError};
use std::collections::BTreeMap;

/// 将值转换为声明的类型
///
/// - `Integer → Number` 总是允许
/// - `Number → Integer` 仅当数值有限且为整数
/// - 空 `NumberList` 可以作为空 `Matrix` 或空 `TextList`
/// - `"NaN"`、`"Infinity"`、`"-Infinity"` 可以作为 `Number`
pub fn coerce(value: BridgeValue, expected: TypeTag, context: &str) -> BridgeResult<BridgeValue> {
    let coerced = match (expected, value) {
        (TypeTag::Number, BridgeValue::Integer(i)) => BridgeValue::Number(i as f64),
        (TypeTag::Number, BridgeValue::Text(text)) => match parse_non_finite(&text) {
            Some(n) => BridgeValue::Number(n),
            None => return Err(mismatch(context, expected, TypeTag::Text.to_string())),
        },
        (TypeTag::Integer, BridgeValue::Number(n)) => match integral(n) {
            Some(i) => BridgeValue::Integer(i),
            None => return Err(mismatch(context, expected, format!("number {}", n))),
        },
        (TypeTag::NumberList, BridgeValue::NumberList(items)) => BridgeValue::NumberList(items),
        (TypeTag::Matrix, BridgeValue::NumberList(items)) if items.is_empty() => {
            BridgeValue::Matrix(Vec::new())
        }
        (TypeTag::TextList, BridgeValue::NumberList(items)) if items.is_empty() => {
            BridgeValue::TextList(Vec::new())
        }
        (TypeTag::Callback, value) => {
            return Err(mismatch(context, expected, value.type_tag().to_string()))
        }
        (expected, value) if value.type_tag() == expected => value,
        (expected, value) => {
            return Err(mismatch(context, expected, value.type_tag().to_string()))
        }
    };
    Ok(coerced)
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

fn mismatch(context: &str, expected: TypeTag, found: String) -> crate::core::error::BridgeError {
    TransportError::TypeMismatch {
        context: context.to_string(),
        expected,
        found,
    }
    .into()
}

/// 从边界值中取出 Rust 类型
pub trait FromBridge: Sized {
    const TAG: TypeTag;

    fn from_bridge(value: BridgeValue, context: &str) -> BridgeResult<Self>;
}

macro_rules! impl_from_bridge {
    ($ty:ty, $tag:ident, $pat:pat => $out:expr) => {
        impl FromBridge for $ty {
            const TAG: TypeTag = TypeTag::$tag;

            fn from_bridge(value: BridgeValue, context: &str) -> BridgeResult<Self> {
                match coerce(value, Self::TAG, context)? {
                    $pat => Ok($out),
                    other => Err(mismatch(context, Self::TAG, other.type_tag().to_string())),
                }
            }
        }
    };
}

impl_from_bridge!(bool, Bool, BridgeValue::Bool(b) => b);
impl_from_bridge!(i64, Integer, BridgeValue::Integer(i) => i);
impl_from_bridge!(f64, Number, BridgeValue::Number(n) => n);
impl_from_bridge!(String, Text, BridgeValue::Text(s) => s);
impl_from_bridge!(Vec<f64>, NumberList, BridgeValue::NumberList(items) => items);
impl_from_bridge!(Vec<String>, TextList, BridgeValue::TextList(items) => items);
impl_from_bridge!(Vec<Vec<f64>>, Matrix, BridgeValue::Matrix(rows) => rows);
impl_from_bridge!(BTreeMap<String, BridgeValue>, Record, BridgeValue::Record(map) => map);

impl FromBridge for () {
    const TAG: TypeTag = TypeTag::Void;

    fn from_bridge(value: BridgeValue, context: &str) -> BridgeResult<Self> {
        coerce(value, Self::TAG, context).map(|_| ())
    }
}

impl FromBridge for BridgeValue {
    // 任意值：不做转换
    const TAG: TypeTag = TypeTag::Void;

    fn from_bridge(value: BridgeValue, _context: &str) -> BridgeResult<Self> {
        Ok(value)
    }
}
