//! JavaScript Binding Adapter using rquickjs
//!
//! This adapter exposes the operation catalog to QuickJS. The native side
//! installs two globals, `__bridge_catalog` (the descriptor list as JSON)
//! and `__bridge_call(name, ...args)`, and the prelude builds the script
//! facing API on top of them:
//!
//! ```javascript
//! Native.add(1, 2);                       // 3
//! Native.callback.transform("a", s => s + "!");
//! const acc = new Accumulator(10);
//! acc.divide(0);                          // throws BridgeError (name "DomainError")
//! ```
//!
//! `__bridge_call` never throws: it returns `{ok: value}` or
//! `{error: kind, message, stack?}` and the prelude turns the latter into a
//! thrown `BridgeError`.
//!
//! A third global, `__bridge_guard(kind, handle)`, returns a small function
//! object owning a native guard. The prelude stores one on every
//! `Accumulator` and `DataContainer`; when the script object is collected the
//! guard is dropped and the handle is queued for release on the bridge.
//! Calling the guard (done by `release()`) disarms it.
//!
//! Modules are evaluated as `function (exports, module, require)` bodies, so
//! their declarations stay private. `module.exports` is stored in a registry
//! keyed by module name, which `require(name)` reads on the script side.

use super::protocol::{BindingAdapter, BridgeValue};
use crate::callback::Callback;
use crate::config::RuntimeConfig;
use crate::core::bridge::Bridge;
use crate::core::error::{
    BridgeError, BridgeResult, CallbackError, HostError, HostResult, TransportError,
};
use crate::operations::Argument;
use crate::core::state::object_kind;
use rquickjs::function::{Rest, This};
use rquickjs::{Array, Context, Ctx, Function, IntoJs, Object, Runtime, Type, Value};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Script-side API built on the installed globals
pub const PRELUDE: &str = include_str!("prelude.js");

/// 模块导出表（由 prelude 定义，脚本不可枚举）
const MODULE_REGISTRY: &str = "__bridge_modules";

pub struct JsBindingAdapter {
    context: Context,
    runtime: Runtime,
    installed: bool,
}

impl JsBindingAdapter {
    pub fn new() -> HostResult<Self> {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> HostResult<Self> {
        let runtime = Runtime::new().map_err(|e| HostError::Init(e.to_string()))?;
        runtime.set_memory_limit(config.memory_limit);
        runtime.set_max_stack_size(config.max_stack_size);
        runtime.set_gc_threshold(config.gc_threshold);

        let context = Context::full(&runtime).map_err(|e| HostError::Init(e.to_string()))?;
        context
            .with(|ctx| install_console(&ctx))
            .map_err(|e| HostError::Init(e.to_string()))?;

        tracing::debug!(
            target: "script_host",
            memory_limit = config.memory_limit,
            max_stack_size = config.max_stack_size,
            "QuickJS runtime created"
        );

        Ok(Self {
            context,
            runtime,
            installed: false,
        })
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

impl BindingAdapter for JsBindingAdapter {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn install(&mut self, bridge: Rc<Bridge>) -> HostResult<()> {
        if self.installed {
            return Err(HostError::Init("bridge already installed".to_string()));
        }
        let catalog = bridge
            .catalog_json()
            .map_err(|e| HostError::Init(e.to_string()))?;
        let operations = bridge.catalog().len();

        self.context
            .with(|ctx| install_bridge(&ctx, bridge, catalog))
            .map_err(|e| HostError::Init(e.to_string()))?;
        self.execute("<prelude>", PRELUDE)?;
        self.installed = true;

        tracing::info!(target: "script_host", operations, "Bridge installed into JavaScript context");
        Ok(())
    }

    fn execute(&self, source_name: &str, code: &str) -> HostResult<BridgeValue> {
        self.context.with(|ctx| match ctx.eval::<Value, _>(code) {
            // 无法跨越边界的完成值按 void 处理
            Ok(value) => Ok(value_from_js(&value, source_name).unwrap_or(BridgeValue::Void)),
            Err(e) => Err(script_error(&ctx, source_name, e)),
        })
    }

    fn has_function(&self, name: &str) -> bool {
        self.context.with(|ctx| {
            ctx.globals()
                .get::<_, Value>(name)
                .map(|value| value.is_function())
                .unwrap_or(false)
        })
    }

    fn call_function(&self, name: &str, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        self.context.with(|ctx| {
            let globals = ctx.globals();
            let value: Value = globals.get(name).map_err(runtime_error)?;
            let Some(function) = value.as_function().cloned() else {
                return Err(TransportError::UnknownFunction(name.to_string()).into());
            };
            call_js(&ctx, globals, &function, name, args)
        })
    }

    fn load_module(&self, module: &str, source_name: &str, code: &str) -> HostResult<()> {
        let wrapped = format!("(function (exports, module, require) {{\n{}\n}})", code);
        self.context.with(|ctx| {
            let fail = |e: rquickjs::Error| script_error(&ctx, source_name, e);
            let factory: Function = ctx.eval(wrapped).map_err(fail)?;
            let exports = Object::new(ctx.clone()).map_err(fail)?;
            let record = Object::new(ctx.clone()).map_err(fail)?;
            record.set("exports", exports.clone()).map_err(fail)?;
            let require: Value = ctx.globals().get("require").map_err(fail)?;

            factory
                .call::<_, ()>((exports, record.clone(), require))
                .map_err(fail)?;

            // 模块可以整体替换 module.exports
            let exported: Value = record.get("exports").map_err(fail)?;
            let registry: Object = ctx.globals().get(MODULE_REGISTRY).map_err(fail)?;
            registry.set(module, exported).map_err(fail)
        })
    }

    fn module_has_function(&self, module: &str, name: &str) -> bool {
        self.context.with(|ctx| {
            module_exports(&ctx, module)
                .and_then(|exports| exports.get::<_, Value>(name).map_err(runtime_error))
                .map(|value| value.is_function())
                .unwrap_or(false)
        })
    }

    fn call_module_function(
        &self,
        module: &str,
        name: &str,
        args: &[BridgeValue],
    ) -> BridgeResult<BridgeValue> {
        self.context.with(|ctx| {
            let exports = module_exports(&ctx, module)?;
            let qualified = format!("{}.{}", module, name);
            let value: Value = exports.get(name).map_err(runtime_error)?;
            let Some(function) = value.as_function().cloned() else {
                return Err(TransportError::UnknownFunction(qualified).into());
            };
            call_js(&ctx, exports, &function, &qualified, args)
        })
    }

    fn get_attribute(&self, module: &str, name: &str) -> BridgeResult<BridgeValue> {
        self.context.with(|ctx| {
            let exports = module_exports(&ctx, module)?;
            if !exports.contains_key(name).map_err(runtime_error)? {
                return Err(TransportError::UnknownAttribute {
                    module: module.to_string(),
                    name: name.to_string(),
                }
                .into());
            }
            let value: Value = exports.get(name).map_err(runtime_error)?;
            value_from_js(&value, &format!("{}.{}", module, name))
        })
    }

    fn set_attribute(&self, module: &str, name: &str, value: &BridgeValue) -> BridgeResult<()> {
        self.context.with(|ctx| {
            let exports = module_exports(&ctx, module)?;
            let value = value_to_js(&ctx, value).map_err(runtime_error)?;
            exports.set(name, value).map_err(runtime_error)
        })
    }

    fn run_gc(&self) {
        self.runtime.run_gc();
    }
}

/// 调用脚本函数；异常成为带函数名的 `CallbackError`
fn call_js<'js>(
    ctx: &Ctx<'js>,
    this: Object<'js>,
    function: &Function<'js>,
    name: &str,
    args: &[BridgeValue],
) -> BridgeResult<BridgeValue> {
    let js_args = to_js_args(ctx, args)?;
    match function.call::<_, Value>((This(this), Rest(js_args))) {
        Ok(result) => value_from_js(&result, &format!("result of {}", name)),
        Err(rquickjs::Error::Exception) => Err(caught_error(ctx).in_function(name).into()),
        Err(e) => Err(runtime_error(e)),
    }
}

fn module_exports<'js>(ctx: &Ctx<'js>, module: &str) -> BridgeResult<Object<'js>> {
    let registry: Object = ctx.globals().get(MODULE_REGISTRY).map_err(runtime_error)?;
    let value: Value = registry.get(module).map_err(runtime_error)?;
    value
        .as_object()
        .cloned()
        .ok_or_else(|| TransportError::UnknownModule(module.to_string()).into())
}

/// 脚本对象持有的原生守卫；被回收且未解除时登记释放句柄
struct HandleGuard {
    bridge: Weak<Bridge>,
    kind: &'static str,
    handle: i64,
    disarmed: Cell<bool>,
}

impl HandleGuard {
    fn disarm(&self) {
        self.disarmed.set(true);
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if self.disarmed.get() {
            return;
        }
        if let Some(bridge) = self.bridge.upgrade() {
            tracing::trace!(target: "bridge", kind = self.kind, handle = self.handle, "Script object collected");
            bridge.defer_release(self.kind, self.handle);
        }
    }
}

/// A script function received as an argument of one operation call
struct JsCallback<'js> {
    ctx: Ctx<'js>,
    function: Function<'js>,
}

impl<'js> Callback for JsCallback<'js> {
    fn call(&mut self, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        let js_args = to_js_args(&self.ctx, args)?;
        match self.function.call::<_, Value>((Rest(js_args),)) {
            Ok(result) => value_from_js(&result, "callback result"),
            Err(rquickjs::Error::Exception) => Err(caught_error(&self.ctx).into()),
            Err(e) => Err(runtime_error(e)),
        }
    }
}

fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let log = Function::new(ctx.clone(), |level: String, message: String| {
        match level.as_str() {
            "error" => tracing::error!(target: "script.console", "{}", message),
            "warn" => tracing::warn!(target: "script.console", "{}", message),
            "debug" => tracing::debug!(target: "script.console", "{}", message),
            _ => tracing::info!(target: "script.console", "{}", message),
        }
    })?;
    ctx.globals().set("__bridge_log", log)?;
    ctx.eval::<(), _>(CONSOLE)
}

/// console.* 和 print 把参数转为字符串后交给 `__bridge_log`
const CONSOLE: &str = r#"
(function (global) {
    const log = global.__bridge_log;
    const format = (args) => args.map((arg) => {
        if (typeof arg === "string") return arg;
        try { return JSON.stringify(arg) ?? String(arg); } catch (_) { return String(arg); }
    }).join(" ");
    global.console = {
        log: (...args) => log("info", format(args)),
        info: (...args) => log("info", format(args)),
        debug: (...args) => log("debug", format(args)),
        warn: (...args) => log("warn", format(args)),
        error: (...args) => log("error", format(args)),
    };
    global.print = (...args) => log("info", format(args));
})(globalThis);
"#;

fn install_bridge<'js>(ctx: &Ctx<'js>, bridge: Rc<Bridge>, catalog: String) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.set("__bridge_catalog", catalog)?;

    let weak = Rc::downgrade(&bridge);
    let guard = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, kind: String, handle: i64| -> rquickjs::Result<Option<Function<'js>>> {
            // 未知种类不生成守卫
            let Some(kind) = object_kind(&kind) else {
                return Ok(None);
            };
            let guard = HandleGuard {
                bridge: weak.clone(),
                kind,
                handle,
                disarmed: Cell::new(false),
            };
            Function::new(ctx, move || guard.disarm()).map(Some)
        },
    )?;
    globals.set("__bridge_guard", guard)?;

    let call = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, name: String, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let result = dispatch(&bridge, &ctx, &name, args.0);
            envelope(&ctx, result)
        },
    )?;
    globals.set("__bridge_call", call)?;
    Ok(())
}

/// 把脚本参数转换为 `Argument`：函数成为回调，其余按值转换
fn dispatch<'js>(
    bridge: &Bridge,
    ctx: &Ctx<'js>,
    name: &str,
    args: Vec<Value<'js>>,
) -> BridgeResult<BridgeValue> {
    let converted = args
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value.as_function() {
            Some(function) => Ok(Argument::callable(JsCallback {
                ctx: ctx.clone(),
                function: function.clone(),
            })),
            None => value_from_js(&value, &format!("{} argument {}", name, i + 1))
                .map(Argument::Value),
        })
        .collect::<BridgeResult<Vec<_>>>();

    match converted {
        Ok(args) => bridge.invoke(name, args),
        Err(err) => {
            bridge.reporter().report(name, &err);
            Err(err)
        }
    }
}

fn envelope<'js>(ctx: &Ctx<'js>, result: BridgeResult<BridgeValue>) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    match result {
        Ok(value) => object.set("ok", value_to_js(ctx, &value)?)?,
        Err(err) => {
            object.set("error", err.kind().as_str())?;
            object.set("message", err.message())?;
            if let BridgeError::Callback(CallbackError {
                stack: Some(stack), ..
            }) = &err
            {
                object.set("stack", stack.as_str())?;
            }
        }
    }
    Ok(object.into_value())
}

fn to_js_args<'js>(ctx: &Ctx<'js>, args: &[BridgeValue]) -> BridgeResult<Vec<Value<'js>>> {
    args.iter()
        .map(|arg| value_to_js(ctx, arg))
        .collect::<rquickjs::Result<Vec<_>>>()
        .map_err(runtime_error)
}

fn script_error(ctx: &Ctx<'_>, source_name: &str, err: rquickjs::Error) -> HostError {
    let (message, stack) = match err {
        rquickjs::Error::Exception => {
            let caught = caught_error(ctx);
            (caught.message, caught.stack)
        }
        other => (other.to_string(), None),
    };
    HostError::Script {
        source_name: source_name.to_string(),
        message,
        stack,
    }
}

/// 取出并清除当前挂起的异常
fn caught_error(ctx: &Ctx<'_>) -> CallbackError {
    let value = ctx.catch();
    if let Some(exception) = value.as_exception() {
        let message = exception
            .message()
            .unwrap_or_else(|| "uncaught exception".to_string());
        let error = CallbackError::new(message);
        match exception.stack() {
            Some(stack) if !stack.is_empty() => error.with_stack(stack),
            _ => error,
        }
    } else if let Some(text) = value.as_string().and_then(|s| s.to_string().ok()) {
        CallbackError::new(text)
    } else {
        CallbackError::new(format!("thrown value of type {:?}", value.type_of()))
    }
}

fn runtime_error(err: rquickjs::Error) -> BridgeError {
    TransportError::Runtime(err.to_string()).into()
}

fn unsupported(context: &str, found: impl Into<String>) -> BridgeError {
    TransportError::Unsupported {
        context: context.to_string(),
        found: found.into(),
    }
    .into()
}

/// `BridgeValue` → JS 值
pub fn value_to_js<'js>(ctx: &Ctx<'js>, value: &BridgeValue) -> rquickjs::Result<Value<'js>> {
    let js = match value {
        BridgeValue::Void => Value::new_undefined(ctx.clone()),
        BridgeValue::Bool(b) => Value::new_bool(ctx.clone(), *b),
        BridgeValue::Integer(i) => match i32::try_from(*i) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *i as f64),
        },
        BridgeValue::Number(n) => Value::new_float(ctx.clone(), *n),
        BridgeValue::Text(s) => s.as_str().into_js(ctx)?,
        BridgeValue::NumberList(items) => items.clone().into_js(ctx)?,
        BridgeValue::TextList(items) => items.clone().into_js(ctx)?,
        BridgeValue::Matrix(rows) => rows.clone().into_js(ctx)?,
        BridgeValue::Record(fields) => {
            let object = Object::new(ctx.clone())?;
            for (key, field) in fields {
                object.set(key.as_str(), value_to_js(ctx, field)?)?;
            }
            object.into_value()
        }
    };
    Ok(js)
}

/// JS 值 → `BridgeValue`
///
/// 数组按元素分类：空数组、数字列表、字符串列表或数字矩阵；
/// 普通对象成为 record。函数和其他值无法跨越边界。
pub fn value_from_js(value: &Value<'_>, context: &str) -> BridgeResult<BridgeValue> {
    match value.type_of() {
        Type::Undefined | Type::Null => Ok(BridgeValue::Void),
        Type::Bool => Ok(BridgeValue::Bool(value.as_bool().unwrap_or_default())),
        Type::Int => Ok(BridgeValue::Integer(i64::from(value.as_int().unwrap_or_default()))),
        Type::Float => Ok(BridgeValue::Number(value.as_float().unwrap_or_default())),
        Type::String => value
            .as_string()
            .and_then(|s| s.to_string().ok())
            .map(BridgeValue::Text)
            .ok_or_else(|| unsupported(context, "string")),
        Type::Array => match value.as_array() {
            Some(array) => array_from_js(array, context),
            None => Err(unsupported(context, "array")),
        },
        Type::Object => match value.as_object() {
            Some(object) => record_from_js(object, context),
            None => Err(unsupported(context, "object")),
        },
        other => Err(unsupported(context, format!("{:?}", other).to_lowercase())),
    }
}

fn array_from_js(array: &Array<'_>, context: &str) -> BridgeResult<BridgeValue> {
    let items = (0..array.len())
        .map(|i| {
            let item: Value = array.get(i).map_err(runtime_error)?;
            value_from_js(&item, context)
        })
        .collect::<BridgeResult<Vec<_>>>()?;

    if items.is_empty() {
        return Ok(BridgeValue::NumberList(Vec::new()));
    }
    if let Some(numbers) = items.iter().map(BridgeValue::as_f64).collect::<Option<Vec<_>>>() {
        return Ok(BridgeValue::NumberList(numbers));
    }
    if let Some(texts) = items
        .iter()
        .map(|item| item.as_text().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return Ok(BridgeValue::TextList(texts));
    }

    items
        .into_iter()
        .map(|item| match item {
            BridgeValue::NumberList(row) => Some(row),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .map(BridgeValue::Matrix)
        .ok_or_else(|| unsupported(context, "array of mixed element types"))
}

fn record_from_js(object: &Object<'_>, context: &str) -> BridgeResult<BridgeValue> {
    let mut fields = BTreeMap::new();
    for prop in object.props::<String, Value>() {
        let (key, value) = prop.map_err(runtime_error)?;
        let field = value_from_js(&value, &format!("{} field {}", context, key))?;
        fields.insert(key, field);
    }
    Ok(BridgeValue::Record(fields))
}
