//! Language Binding Layer
//!
//! This module provides a unified binding layer design that can be reused
//! across different scripting languages. Only JavaScript (QuickJS) is
//! implemented; other runtimes plug in through [`BindingAdapter`].
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Script Runtime                           │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │  Native.* / Accumulator / DataContainer / BridgeError│   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          │  {ok} / {error, message}         │
//! │                          v                                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │        Binding Adapter (JsBindingAdapter)           │   │
//! │  │   value marshalling, callbacks as call-scoped args  │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          │                                  │
//! │                          v                                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │          Unified Call Protocol (protocol.rs)        │   │
//! │  │   BridgeValue, OperationDescriptor, CallRequest     │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          │                                  │
//! │                          v                                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │      Bridge (catalog + state + error reporter)      │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod js;
pub mod marshal;
pub mod protocol;

pub use js::JsBindingAdapter;
pub use marshal::{coerce, FromBridge};
pub use protocol::*;
