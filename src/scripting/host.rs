// ============================================================================
// 脚本宿主
// 持有调用桥与一个绑定适配器，负责脚本执行、模块加载与宿主 → 脚本调用
// 每个模块有独立作用域，通过 ModuleRef 访问其导出
// ============================================================================

use crate::bindings::js::JsBindingAdapter;
use crate::bindings::marshal::FromBridge;
use crate::bindings::protocol::{BindingAdapter, BridgeValue};
use crate::config::{BridgeConfig, ModuleConfig};
use crate::core::bridge::Bridge;
use crate::core::error::{BridgeResult, HostError, HostResult};
use crate::core::utils::current_timestamp;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// 已加载的脚本模块
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptModule {
    pub name: String,
    pub path: PathBuf,
    /// 加载时间（Unix 秒）
    pub loaded_at: u64,
}

pub struct ScriptHost {
    bridge: Rc<Bridge>,
    adapter: Box<dyn BindingAdapter>,
    modules: ModuleConfig,
    loaded: BTreeMap<String, ScriptModule>,
}

impl ScriptHost {
    /// 按配置创建 QuickJS 宿主并安装调用桥
    pub fn new(config: &BridgeConfig) -> HostResult<Self> {
        let bridge = Bridge::from_config(config)?;
        let adapter = JsBindingAdapter::with_config(&config.runtime)?;
        Self::with_adapter(Rc::new(bridge), Box::new(adapter), config.modules.clone())
    }

    /// 使用任意绑定适配器
    pub fn with_adapter(
        bridge: Rc<Bridge>,
        mut adapter: Box<dyn BindingAdapter>,
        modules: ModuleConfig,
    ) -> HostResult<Self> {
        adapter.install(Rc::clone(&bridge))?;
        tracing::debug!(
            target: "script_host",
            language = adapter.language(),
            search_paths = ?modules.search_paths,
            "Script host ready"
        );
        Ok(Self {
            bridge,
            adapter,
            modules,
            loaded: BTreeMap::new(),
        })
    }

    pub fn bridge(&self) -> &Rc<Bridge> {
        &self.bridge
    }

    pub fn language(&self) -> &'static str {
        self.adapter.language()
    }

    pub fn execute(&self, code: &str) -> HostResult<BridgeValue> {
        self.execute_named("<eval>", code)
    }

    pub fn execute_named(&self, source_name: &str, code: &str) -> HostResult<BridgeValue> {
        let result = self.adapter.execute(source_name, code);
        if let Err(ref e) = result {
            tracing::debug!(target: "script_host", source = source_name, "Script failed: {}", e);
        }
        result
    }

    pub fn execute_file<P: AsRef<Path>>(&self, path: P) -> HostResult<BridgeValue> {
        let path = path.as_ref();
        let code = fs::read_to_string(path)?;
        tracing::info!(target: "script_host", "Executing {:?}", path);
        self.execute_named(&path.display().to_string(), &code)
    }

    /// 按名称加载模块；已加载的模块直接返回缓存
    ///
    /// 依次在搜索目录中查找 `<name>.<extension>`，第一个存在的文件胜出。
    /// 模块代码在自己的作用域中执行，只有 `module.exports` 对外可见，
    /// 脚本中通过 `require(name)` 取得。
    pub fn load_module(&mut self, name: &str) -> HostResult<ModuleRef<'_>> {
        validate_module_name(name)?;

        if !self.loaded.contains_key(name) {
            let searched: Vec<PathBuf> = self
                .modules
                .search_paths
                .iter()
                .map(|dir| self.modules.candidate(dir, name))
                .collect();
            let Some(path) = searched.iter().find(|path| path.is_file()).cloned() else {
                return Err(HostError::ModuleNotFound {
                    name: name.to_string(),
                    searched,
                });
            };

            let code = fs::read_to_string(&path)?;
            self.adapter
                .load_module(name, &path.display().to_string(), &code)?;
            tracing::info!(target: "script_host", module = name, "Loaded module from {:?}", path);
            self.loaded.insert(
                name.to_string(),
                ScriptModule {
                    name: name.to_string(),
                    path,
                    loaded_at: current_timestamp(),
                },
            );
        }

        let host: &Self = self;
        host.module(name)
            .ok_or_else(|| HostError::InvalidModuleName(name.to_string()))
    }

    /// 已加载模块的句柄
    pub fn module(&self, name: &str) -> Option<ModuleRef<'_>> {
        self.loaded.get(name).map(|info| ModuleRef { host: self, info })
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.modules.add_search_path(path);
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.modules.search_paths
    }

    pub fn loaded_modules(&self) -> impl Iterator<Item = &ScriptModule> {
        self.loaded.values()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.adapter.has_function(name)
    }

    /// 宿主 → 脚本调用；失败会记录到错误报告器
    pub fn call_function(&self, name: &str, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        let result = self.adapter.call_function(name, args);
        if let Err(ref err) = result {
            self.bridge.reporter().report(name, err);
        }
        result
    }

    /// 调用脚本函数并把结果转换为 `T`
    pub fn call_as<T: FromBridge>(&self, name: &str, args: &[BridgeValue]) -> BridgeResult<T> {
        let value = self.call_function(name, args)?;
        let result = T::from_bridge(value, &format!("result of {}", name));
        if let Err(ref err) = result {
            self.bridge.reporter().report(name, err);
        }
        result
    }

    /// 立即回收不可达的脚本对象，并释放它们持有的原生句柄
    pub fn run_gc(&self) {
        self.adapter.run_gc();
    }

    /// 绑定到一个脚本函数名的调用句柄
    pub fn function<'h>(&'h self, name: &str) -> ScriptFunction<'h> {
        ScriptFunction {
            host: self,
            name: name.to_string(),
        }
    }
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("language", &self.adapter.language())
            .field("modules", &self.modules)
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 已加载模块的句柄：调用导出函数、读写导出值
///
/// 失败记录到错误报告器，来源为 `module.name`。
#[derive(Clone, Copy)]
pub struct ModuleRef<'h> {
    host: &'h ScriptHost,
    info: &'h ScriptModule,
}

impl<'h> ModuleRef<'h> {
    pub fn name(&self) -> &'h str {
        &self.info.name
    }

    pub fn path(&self) -> &'h Path {
        &self.info.path
    }

    pub fn info(&self) -> &'h ScriptModule {
        self.info
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.host.adapter.module_has_function(&self.info.name, name)
    }

    pub fn call_function(&self, name: &str, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        let result = self
            .host
            .adapter
            .call_module_function(&self.info.name, name, args);
        self.report(name, result)
    }

    pub fn call_as<T: FromBridge>(&self, name: &str, args: &[BridgeValue]) -> BridgeResult<T> {
        let value = self.call_function(name, args)?;
        let context = format!("result of {}.{}", self.info.name, name);
        self.report(name, T::from_bridge(value, &context))
    }

    pub fn get_attribute(&self, name: &str) -> BridgeResult<BridgeValue> {
        let result = self.host.adapter.get_attribute(&self.info.name, name);
        self.report(name, result)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<BridgeValue>) -> BridgeResult<()> {
        let result = self
            .host
            .adapter
            .set_attribute(&self.info.name, name, &value.into());
        self.report(name, result)
    }

    fn report<T>(&self, name: &str, result: BridgeResult<T>) -> BridgeResult<T> {
        if let Err(ref err) = result {
            let source = format!("{}.{}", self.info.name, name);
            self.host.bridge.reporter().report(&source, err);
        }
        result
    }
}

impl std::fmt::Debug for ModuleRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModuleRef").field(self.info).finish()
    }
}

/// 脚本函数句柄
pub struct ScriptFunction<'h> {
    host: &'h ScriptHost,
    name: String,
}

impl<'h> ScriptFunction<'h> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.host.has_function(&self.name)
    }

    pub fn call(&self, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        self.host.call_function(&self.name, args)
    }

    pub fn call_as<T: FromBridge>(&self, args: &[BridgeValue]) -> BridgeResult<T> {
        self.host.call_as(&self.name, args)
    }
}

/// 模块名只允许字母、数字、`_` 和 `-`
fn validate_module_name(name: &str) -> HostResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(HostError::InvalidModuleName(name.to_string()))
    }
}
