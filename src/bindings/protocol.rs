//! Unified Call Protocol
//!
//! This protocol defines a language-agnostic interface between
//! scripting languages and the native operation catalog: the type tags
//! that describe parameters, the values that cross the boundary, the
//! operation descriptors published to the script side, and the JSON
//! request/response envelopes.

use crate::core::bridge::Bridge;
use crate::core::error::{BridgeError, BridgeResult, ErrorKind, HostResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Primitive type tags used in operation and callback signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Void,
    Bool,
    Integer,
    Number,
    Text,
    NumberList,
    TextList,
    Matrix,
    Record,
    /// A call-scoped callable from the calling runtime. Never a value.
    Callback,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::Text => "text",
            TypeTag::NumberList => "number_list",
            TypeTag::TextList => "text_list",
            TypeTag::Matrix => "matrix",
            TypeTag::Record => "record",
            TypeTag::Callback => "callback",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializable value for cross-language transfer
///
/// The JSON form is untagged, so `5` is an integer, `2.5` a number,
/// `[1, 2]` a number list and `[[1], [2]]` a matrix. Non-finite numbers
/// are written as `"NaN"`, `"Infinity"` and `"-Infinity"`; inside number
/// lists and matrices those spellings read back as numbers, a lone one
/// reads back as text and is coerced where a number is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeValue {
    Void,
    Bool(bool),
    Integer(i64),
    Number(#[serde(serialize_with = "wire_number::serialize")] f64),
    Text(String),
    NumberList(
        #[serde(
            serialize_with = "wire_number::serialize_list",
            deserialize_with = "wire_number::deserialize_list"
        )]
        Vec<f64>,
    ),
    TextList(Vec<String>),
    Matrix(
        #[serde(
            serialize_with = "wire_number::serialize_matrix",
            deserialize_with = "wire_number::deserialize_matrix"
        )]
        Vec<Vec<f64>>,
    ),
    Record(BTreeMap<String, BridgeValue>),
}

/// Number spelled out on the wire (`"NaN"`, `"Infinity"`, `"-Infinity"`)
pub fn parse_non_finite(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

mod wire_number {
    use super::parse_non_finite;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// f64 whose JSON form survives non-finite values
    struct Wire(f64);

    impl Serialize for Wire {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let n = self.0;
            if n.is_nan() {
                serializer.serialize_str("NaN")
            } else if n == f64::INFINITY {
                serializer.serialize_str("Infinity")
            } else if n == f64::NEG_INFINITY {
                serializer.serialize_str("-Infinity")
            } else {
                serializer.serialize_f64(n)
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Spelled(String),
    }

    impl<'de> Deserialize<'de> for Wire {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match Repr::deserialize(deserializer)? {
                Repr::Number(n) => Ok(Wire(n)),
                Repr::Spelled(text) => parse_non_finite(&text)
                    .map(Wire)
                    .ok_or_else(|| D::Error::custom(format!("not a number: {:?}", text))),
            }
        }
    }

    pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        Wire(*n).serialize(serializer)
    }

    pub fn serialize_list<S: Serializer>(items: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|n| Wire(*n)))
    }

    pub fn serialize_matrix<S: Serializer>(rows: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(rows.iter().map(|row| row.iter().map(|n| Wire(*n)).collect::<Vec<_>>()))
    }

    pub fn deserialize_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let items = Vec::<Wire>::deserialize(deserializer)?;
        Ok(items.into_iter().map(|w| w.0).collect())
    }

    pub fn deserialize_matrix<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows = Vec::<Vec<Wire>>::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|w| w.0).collect())
            .collect())
    }
}

impl BridgeValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            BridgeValue::Void => TypeTag::Void,
            BridgeValue::Bool(_) => TypeTag::Bool,
            BridgeValue::Integer(_) => TypeTag::Integer,
            BridgeValue::Number(_) => TypeTag::Number,
            BridgeValue::Text(_) => TypeTag::Text,
            BridgeValue::NumberList(_) => TypeTag::NumberList,
            BridgeValue::TextList(_) => TypeTag::TextList,
            BridgeValue::Matrix(_) => TypeTag::Matrix,
            BridgeValue::Record(_) => TypeTag::Record,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, BridgeValue::Void)
    }

    /// Numeric view of integers and numbers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BridgeValue::Integer(i) => Some(*i as f64),
            BridgeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BridgeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeValue::Void => f.write_str("void"),
            BridgeValue::Bool(b) => write!(f, "{}", b),
            BridgeValue::Integer(i) => write!(f, "{}", i),
            BridgeValue::Number(n) => write!(f, "{}", n),
            BridgeValue::Text(s) => f.write_str(s),
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<()> for BridgeValue {
    fn from(_: ()) -> Self {
        BridgeValue::Void
    }
}

impl From<bool> for BridgeValue {
    fn from(value: bool) -> Self {
        BridgeValue::Bool(value)
    }
}

impl From<i64> for BridgeValue {
    fn from(value: i64) -> Self {
        BridgeValue::Integer(value)
    }
}

impl From<f64> for BridgeValue {
    fn from(value: f64) -> Self {
        BridgeValue::Number(value)
    }
}

impl From<&str> for BridgeValue {
    fn from(value: &str) -> Self {
        BridgeValue::Text(value.to_string())
    }
}

impl From<String> for BridgeValue {
    fn from(value: String) -> Self {
        BridgeValue::Text(value)
    }
}

impl From<Vec<f64>> for BridgeValue {
    fn from(value: Vec<f64>) -> Self {
        BridgeValue::NumberList(value)
    }
}

impl From<Vec<String>> for BridgeValue {
    fn from(value: Vec<String>) -> Self {
        BridgeValue::TextList(value)
    }
}

impl From<Vec<Vec<f64>>> for BridgeValue {
    fn from(value: Vec<Vec<f64>>) -> Self {
        BridgeValue::Matrix(value)
    }
}

impl From<BTreeMap<String, BridgeValue>> for BridgeValue {
    fn from(value: BTreeMap<String, BridgeValue>) -> Self {
        BridgeValue::Record(value)
    }
}

/// Declared argument and result types of a callback parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSignature {
    pub params: Vec<TypeTag>,
    pub returns: TypeTag,
}

impl CallbackSignature {
    pub fn new(params: Vec<TypeTag>, returns: TypeTag) -> Self {
        Self { params, returns }
    }
}

/// Metadata describing one exported operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub params: Vec<TypeTag>,
    pub returns: TypeTag,
    pub fallible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackSignature>,
    #[serde(default)]
    pub summary: String,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<TypeTag>, returns: TypeTag) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            fallible: false,
            callback: None,
            summary: String::new(),
        }
    }

    pub fn fallible(mut self) -> Self {
        self.fallible = true;
        self
    }

    pub fn with_callback(mut self, signature: CallbackSignature) -> Self {
        self.callback = Some(signature);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn takes_callback(&self) -> bool {
        self.params.contains(&TypeTag::Callback)
    }
}

/// A call sent over the JSON wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub operation: String,
    #[serde(default)]
    pub args: Vec<BridgeValue>,
}

impl CallRequest {
    pub fn new(operation: impl Into<String>, args: Vec<BridgeValue>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }
}

/// Error half of a response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BridgeError> for ErrorEnvelope {
    fn from(err: &BridgeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message(),
        }
    }
}

/// Result of a call: `{"ok": value}` or `{"error": {"kind": .., "message": ..}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResponse {
    Ok(BridgeValue),
    Error(ErrorEnvelope),
}

impl CallResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallResponse::Ok(_))
    }
}

impl From<BridgeResult<BridgeValue>> for CallResponse {
    fn from(result: BridgeResult<BridgeValue>) -> Self {
        match result {
            Ok(value) => CallResponse::Ok(value),
            Err(err) => CallResponse::Error(ErrorEnvelope::from(&err)),
        }
    }
}

/// Trait for language-specific binding adapters
pub trait BindingAdapter {
    /// Name of the script language this adapter hosts
    fn language(&self) -> &'static str;

    /// Expose the bridge catalog to the script runtime
    fn install(&mut self, bridge: Rc<Bridge>) -> HostResult<()>;

    /// Evaluate script source; `source_name` is used in diagnostics
    fn execute(&self, source_name: &str, code: &str) -> HostResult<BridgeValue>;

    /// Whether a global script function with this name exists
    fn has_function(&self, name: &str) -> bool;

    /// Call a global script function from the native side
    fn call_function(&self, name: &str, args: &[BridgeValue]) -> BridgeResult<BridgeValue>;

    /// Evaluate module source in its own scope and register its exports under `module`
    fn load_module(&self, module: &str, source_name: &str, code: &str) -> HostResult<()>;

    /// Whether the exports of `module` contain a function named `name`
    fn module_has_function(&self, module: &str, name: &str) -> bool;

    /// Call an exported function of a loaded module
    fn call_module_function(
        &self,
        module: &str,
        name: &str,
        args: &[BridgeValue],
    ) -> BridgeResult<BridgeValue>;

    /// Read an exported value of a loaded module
    fn get_attribute(&self, module: &str, name: &str) -> BridgeResult<BridgeValue>;

    /// Replace or add an exported value of a loaded module
    fn set_attribute(&self, module: &str, name: &str, value: &BridgeValue) -> BridgeResult<()>;

    /// Collect unreachable script objects now
    fn run_gc(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_json_is_untagged() {
        let values: Vec<BridgeValue> = serde_json::from_str(r#"[null, 5, 2.5, "s", [1, 2], ["a"], [[1], [2]]]"#).unwrap();
        assert_eq!(values[0], BridgeValue::Void);
        assert_eq!(values[1], BridgeValue::Integer(5));
        assert_eq!(values[2], BridgeValue::Number(2.5));
        assert_eq!(values[3], BridgeValue::Text("s".into()));
        assert_eq!(values[4], BridgeValue::NumberList(vec![1.0, 2.0]));
        assert_eq!(values[5], BridgeValue::TextList(vec!["a".into()]));
        assert_eq!(values[6], BridgeValue::Matrix(vec![vec![1.0], vec![2.0]]));
    }

    #[test]
    fn test_non_finite_numbers_on_the_wire() {
        let value = BridgeValue::NumberList(vec![1.5, f64::INFINITY, f64::NEG_INFINITY]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"[1.5,"Infinity","-Infinity"]"#);
        assert_eq!(serde_json::from_str::<BridgeValue>(&json).unwrap(), value);

        assert_eq!(serde_json::to_string(&BridgeValue::Number(f64::NAN)).unwrap(), r#""NaN""#);
        let matrix: BridgeValue = serde_json::from_str(r#"[[1], ["NaN"]]"#).unwrap();
        match matrix {
            BridgeValue::Matrix(rows) => assert!(rows[1][0].is_nan()),
            other => panic!("unexpected value: {other:?}"),
        }

        // 普通字符串列表不受影响
        assert_eq!(
            serde_json::from_str::<BridgeValue>(r#"["NaN", "x"]"#).unwrap(),
            BridgeValue::TextList(vec!["NaN".into(), "x".into()])
        );
        assert_eq!(parse_non_finite("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_non_finite("inf"), None);
    }

    #[test]
    fn test_response_envelope_shape() {
        let ok = CallResponse::Ok(BridgeValue::Integer(120));
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"ok":120}"#);

        let err = CallResponse::Error(ErrorEnvelope {
            kind: ErrorKind::DomainError,
            message: "bad".into(),
        });
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"error":{"kind":"DomainError","message":"bad"}}"#
        );
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = OperationDescriptor::new(
            "callback.transform",
            vec![TypeTag::Text, TypeTag::Callback],
            TypeTag::Text,
        )
        .fallible()
        .with_callback(CallbackSignature::new(vec![TypeTag::Text], TypeTag::Text));

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains(r#""params":["text","callback"]"#));
        assert!(descriptor.takes_callback());
        assert_eq!(descriptor.arity(), 2);

        let parsed: OperationDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(BridgeValue::Number(4.0).to_string(), "4");
        assert_eq!(BridgeValue::Text("hi".into()).to_string(), "hi");
        assert_eq!(
            BridgeValue::Matrix(vec![vec![1.0, 2.0]]).to_string(),
            "[[1.0,2.0]]"
        );
    }
}
