//! # Script Bridge
//!
//! A cross-runtime call bridge between Rust and an embedded JavaScript
//! runtime (QuickJS).
//!
//! ## Features
//!
//! - **Operation Catalog**: named native operations with typed descriptors
//! - **Callbacks**: script functions passed into native operations, valid for one call
//! - **Stateful Objects**: accumulators and data containers addressed by handle
//! - **Error Kinds**: `DomainError`, `CallbackError` and `TransportError` cross the boundary intact
//! - **Script Host**: script execution, module loading, host → script calls
//!
//! ### Example
//!
//! ```no_run
//! use script_bridge::config::BridgeConfig;
//! use script_bridge::scripting::ScriptHost;
//!
//! let host = ScriptHost::new(&BridgeConfig::default()).unwrap();
//! let value = host.execute("Native.callback.transform('hi', s => s + '!')").unwrap();
//! assert_eq!(value.to_string(), "hi!");
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Bridge, state, errors and logging
//! - [`operations`]: Operation catalog and built-in operations
//! - [`callback`]: Callback capability
//! - [`bindings`]: Call protocol and the JavaScript adapter
//! - [`scripting`]: Script host
//! - [`config`]: Configuration

/// Bridge, state, errors and logging
pub mod core;
/// Operation catalog and built-in operations
pub mod operations;
/// Callbacks passed into native operations
pub mod callback;
/// Language bindings and the unified call protocol
pub mod bindings;
/// Script host
pub mod scripting;
/// Configuration system
pub mod config;
/// Command line interface
pub mod cli;

pub use bindings::protocol::{BridgeValue, OperationDescriptor, TypeTag};
pub use callback::{Callback, CallbackHandle};
pub use config::BridgeConfig;
pub use core::{Bridge, BridgeError, BridgeResult, ErrorKind, HostError, HostResult};
pub use operations::{Argument, OperationCatalog};
pub use scripting::ScriptHost;
