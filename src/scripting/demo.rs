//! 内置演示脚本

use super::host::ScriptHost;
use crate::bindings::protocol::BridgeValue;
use crate::core::error::HostResult;

pub const DEMO_SCRIPT: &str = include_str!("../../scripts/bridge_demo.js");

/// 运行演示脚本，然后从宿主侧反向调用一次脚本函数
pub fn run_demo(host: &ScriptHost) -> HostResult<()> {
    host.execute_named("bridge_demo.js", DEMO_SCRIPT)?;

    host.execute_named(
        "<demo>",
        "function host_greeting(name) { return Native.process_text('greetings to ' + name); }",
    )?;
    let greeting: String = host.call_as("host_greeting", &[BridgeValue::from("the host")])?;
    tracing::info!(target: "script_host", "host -> script -> native: {}", greeting);

    let stats = host.bridge().reporter().stats();
    tracing::info!(
        target: "script_host",
        errors = stats.total_count,
        live_objects = ?host.bridge().live_objects(),
        "Demo finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_demo_runs_and_releases_objects() {
        let host = ScriptHost::new(&BridgeConfig::default()).unwrap();
        run_demo(&host).unwrap();

        let stats = host.bridge().reporter().stats();
        // divide(0) 与错误演示中的 factorial(-1)
        assert_eq!(stats.count(ErrorKind::DomainError), 2);
        assert_eq!(stats.count(ErrorKind::CallbackError), 1);
        assert_eq!(stats.count(ErrorKind::TransportError), 1);
        assert_eq!(host.bridge().live_objects(), Some(0));
    }
}
