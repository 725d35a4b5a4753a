//! 命令行入口

use crate::bindings::protocol::{BridgeValue, CallRequest, CallResponse};
use crate::config::BridgeConfig;
use crate::core::bridge::Bridge;
use crate::core::error::{BridgeError, HostError, HostResult, TransportError};
use crate::scripting::demo::run_demo;
use crate::scripting::ScriptHost;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser, Clone)]
#[command(name = "script_bridge")]
#[command(about = "Cross-runtime call bridge between Rust and embedded JavaScript")]
pub struct Cli {
    /// Config file (TOML or JSON). Defaults to the standard search locations.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Extra module search directory, searched after the configured ones.
    #[arg(long = "module-path", global = true)]
    pub module_paths: Vec<PathBuf>,

    /// Debug level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run script files with the bridge installed.
    Run {
        /// Modules to load before the files, by name.
        #[arg(short, long = "module")]
        modules: Vec<String>,

        files: Vec<PathBuf>,
    },
    /// Run the built-in demonstration script.
    Demo,
    /// Print the operation catalog as JSON.
    Catalog,
    /// Invoke one operation through the JSON protocol.
    Call {
        operation: String,

        /// Arguments as a JSON array, e.g. '[2, 10]'.
        args: Option<String>,
    },
}

impl Cli {
    /// 读取配置：`--config` 指定的文件或默认搜索位置，然后应用环境变量
    pub fn load_config(&self) -> HostResult<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::load_or_default(),
        };
        config.apply_env_overrides();
        for path in &self.module_paths {
            config.modules.add_search_path(path.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn run(cli: &Cli, config: &BridgeConfig) -> HostResult<ExitCode> {
    match &cli.command {
        Command::Run { modules, files } => {
            let mut host = ScriptHost::new(config)?;
            for name in modules {
                host.load_module(name)?;
            }
            for file in files {
                host.execute_file(file)?;
            }
            report_errors(&host);
            Ok(ExitCode::SUCCESS)
        }
        Command::Demo => {
            let host = ScriptHost::new(config)?;
            run_demo(&host)?;
            report_errors(&host);
            Ok(ExitCode::SUCCESS)
        }
        Command::Catalog => {
            let host = ScriptHost::new(config)?;
            let json = host
                .bridge()
                .catalog_json()
                .map_err(|e| malformed(e.to_string()))?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { operation, args } => {
            let bridge = Bridge::from_config(config)?;
            let args: Vec<BridgeValue> = serde_json::from_str(args.as_deref().unwrap_or("[]"))
                .map_err(|e| malformed(format!("arguments: {}", e)))?;
            let response = bridge.handle_request(CallRequest::new(operation.clone(), args));
            let json = serde_json::to_string(&response).map_err(|e| malformed(e.to_string()))?;
            println!("{}", json);
            Ok(match response {
                CallResponse::Ok(_) => ExitCode::SUCCESS,
                CallResponse::Error(_) => ExitCode::FAILURE,
            })
        }
    }
}

fn report_errors(host: &ScriptHost) {
    let reporter = host.bridge().reporter();
    if reporter.total() > 0 {
        tracing::info!(target: "script_host", "{}", reporter.summary());
    }
}

fn malformed(message: String) -> HostError {
    BridgeError::from(TransportError::Malformed(message)).into()
}
