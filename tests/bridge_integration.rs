//! 脚本 ↔ 原生的端到端测试

use script_bridge::config::BridgeConfig;
use script_bridge::core::ErrorKind;
use script_bridge::{BridgeError, BridgeValue, HostError, ScriptHost};
use std::cell::RefCell;
use std::rc::Rc;

fn host() -> ScriptHost {
    ScriptHost::new(&BridgeConfig::default()).expect("host")
}

fn numbers(values: &[f64]) -> BridgeValue {
    BridgeValue::NumberList(values.to_vec())
}

#[test]
fn test_factorial_and_fibonacci_from_script() -> anyhow::Result<()> {
    let host = host();
    assert_eq!(
        host.execute("[0, 1, 5, 10].map((n) => Native.factorial(n))")?,
        numbers(&[1.0, 1.0, 120.0, 3628800.0])
    );
    assert_eq!(
        host.execute("[0, 1, 2, 10, 20].map((n) => Native.fibonacci(n))")?,
        numbers(&[0.0, 1.0, 1.0, 55.0, 6765.0])
    );
    Ok(())
}

#[test]
fn test_domain_error_is_thrown_as_bridge_error() -> anyhow::Result<()> {
    let host = host();
    let result = host.execute(
        "try { Native.factorial(-1); 'no error' } \
         catch (e) { [e instanceof BridgeError, e.name, e.kind].join(' ') }",
    )?;
    assert_eq!(result, BridgeValue::Text("true DomainError DomainError".into()));

    let record = host.bridge().reporter().last().expect("reported");
    assert_eq!(record.kind, ErrorKind::DomainError);
    assert_eq!(record.source, "factorial");
    Ok(())
}

#[test]
fn test_uncaught_bridge_error_fails_the_script() {
    let host = host();
    let err = host.execute("Native.average([])").unwrap_err();
    match err {
        HostError::Script { message, .. } => assert!(message.contains("average"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_average_and_matrix_multiply() -> anyhow::Result<()> {
    let host = host();
    assert_eq!(host.execute("Native.average([2, 4, 6])")?.as_f64(), Some(4.0));
    assert_eq!(
        host.execute("Native.matrix_multiply([[1, 2, 3], [4, 5, 6]], [[7, 8], [9, 10], [11, 12]])")?,
        BridgeValue::Matrix(vec![vec![58.0, 64.0], vec![139.0, 154.0]])
    );
    assert_eq!(
        host.execute("try { Native.matrix_multiply([[1, 2]], [[1, 2]]) } catch (e) { e.name }")?,
        BridgeValue::Text("DomainError".into())
    );
    Ok(())
}

#[test]
fn test_accumulator_divide_by_zero_keeps_state() -> anyhow::Result<()> {
    let host = host();
    let result = host.execute(
        "const acc = new Accumulator(); \
         const steps = [acc.add(5), acc.multiply(3)]; \
         let failed = ''; \
         try { acc.divide(0); } catch (e) { failed = e.name; } \
         [steps.join(','), failed, acc.value, acc.history.length].join(' ')",
    )?;
    assert_eq!(result, BridgeValue::Text("5,15 DomainError 15 2".into()));
    Ok(())
}

#[test]
fn test_counter_sequence_and_reset() -> anyhow::Result<()> {
    let host = host();
    assert_eq!(
        host.execute("[Native.counter.increment(), Native.counter.increment(), Native.counter.increment()]")?,
        numbers(&[1.0, 2.0, 3.0])
    );
    assert_eq!(
        host.execute("Native.counter.reset(); Native.counter.increment()")?,
        BridgeValue::Integer(1)
    );
    Ok(())
}

#[test]
fn test_callback_error_reaches_native_caller_and_script() -> anyhow::Result<()> {
    let host = host();
    let result = host.execute(
        "try { Native.callback.transform('x', () => { throw new Error('boom'); }); 'swallowed' } \
         catch (e) { e.name + ': ' + e.message }",
    )?;
    assert_eq!(result, BridgeValue::Text("CallbackError: callback raised: boom".into()));

    // 原生调用方看到的是 CallbackError，而不是 TransportError
    let record = host.bridge().reporter().last().expect("reported");
    assert_eq!(record.kind, ErrorKind::CallbackError);
    assert_eq!(record.source, "callback.transform");
    assert_eq!(host.bridge().reporter().stats().count(ErrorKind::TransportError), 0);
    Ok(())
}

#[test]
fn test_callback_results_are_checked() -> anyhow::Result<()> {
    let host = host();
    assert_eq!(
        host.execute("try { Native.callback.transform('x', (s) => 42) } catch (e) { e.name }")?,
        BridgeValue::Text("TransportError".into())
    );
    // void 回调的返回值被丢弃
    assert_eq!(
        host.execute("let seen = []; Native.callback.execute((m) => { seen.push(m); return 1; }); seen")?,
        BridgeValue::TextList(vec!["Hello from native".into()])
    );
    Ok(())
}

#[test]
fn test_map_numbers_invokes_in_order() -> anyhow::Result<()> {
    let host = host();
    let result = host.execute(
        "const order = []; \
         const out = Native.callback.map_numbers([3, 1, 2], (x) => { order.push(x); return x * 10; }); \
         [out, order]",
    )?;
    assert_eq!(
        result,
        BridgeValue::Matrix(vec![vec![30.0, 10.0, 20.0], vec![3.0, 1.0, 2.0]])
    );
    assert_eq!(
        host.execute("let calls = 0; Native.callback.map_numbers([], () => { calls++; return 0; }); calls")?,
        BridgeValue::Integer(0)
    );
    Ok(())
}

#[test]
fn test_reentrant_calls_from_callbacks() -> anyhow::Result<()> {
    let host = host();
    assert_eq!(
        host.execute("Native.callback.map_numbers([1, 2, 3], (x) => x + Native.counter.increment())")?,
        numbers(&[2.0, 4.0, 6.0])
    );
    assert_eq!(
        host.execute("Native.callback.transform('a', (s) => Native.callback.transform(s, (t) => t + 'b') + 'c')")?,
        BridgeValue::Text("abc".into())
    );
    Ok(())
}

#[test]
fn test_data_container_from_script() -> anyhow::Result<()> {
    let host = host();
    let result = host.execute(
        "const c = new DataContainer(); c.insert('item2', 200); c.insert('item1', 100); \
         let missing = ''; try { c.get('zzz'); } catch (e) { missing = e.name; } \
         ({one: c.get('item1'), all: c.entries(), missing})",
    )?;
    assert_eq!(
        result.to_string(),
        r#"{"all":{"item1":100,"item2":200},"missing":"DomainError","one":100}"#
    );
    Ok(())
}

#[test]
fn test_released_handle_is_transport_error() -> anyhow::Result<()> {
    let host = host();
    let result = host.execute(
        "const acc = new Accumulator(1); acc.release(); \
         try { acc.value } catch (e) { e.kind }",
    )?;
    assert_eq!(result, BridgeValue::Text("TransportError".into()));
    assert_eq!(host.bridge().live_objects(), Some(0));
    Ok(())
}

#[test]
fn test_type_and_arity_mismatch_are_transport_errors() -> anyhow::Result<()> {
    let host = host();
    assert_eq!(
        host.execute("[() => Native.add('one', 2), () => Native.add(1), () => Native.factorial(5.5)]
            .map((f) => { try { f(); return 'ok'; } catch (e) { return e.kind; } })")?,
        BridgeValue::TextList(vec!["TransportError".into(); 3])
    );
    assert_eq!(host.execute("Native.factorial(5.0)")?, BridgeValue::Integer(120));
    Ok(())
}

#[test]
fn test_host_calls_script_function() -> anyhow::Result<()> {
    let host = host();
    host.execute("function fail(kind) { throw new TypeError('bad ' + kind); }")?;

    let err = host.call_function("fail", &["input".into()]).unwrap_err();
    match &err {
        BridgeError::Callback(callback) => {
            assert_eq!(callback.function.as_deref(), Some("fail"));
            assert_eq!(callback.message, "bad input");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::CallbackError);

    let err = host.call_function("not_defined", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportError);
    Ok(())
}

#[test]
fn test_error_observers_see_script_failures() -> anyhow::Result<()> {
    let host = host();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    host.bridge()
        .reporter()
        .add_observer(move |record| sink.borrow_mut().push(record.source.clone()));

    host.execute("try { Native.divide(1, 0) } catch (e) {} try { Native.average([]) } catch (e) {}")?;
    assert_eq!(*seen.borrow(), vec!["divide".to_string(), "average".to_string()]);
    Ok(())
}

#[test]
fn test_console_and_print_are_available() -> anyhow::Result<()> {
    let host = host();
    let value = host.execute("console.log('a', {b: 1}); console.warn('w'); print('p'); 7")?;
    assert_eq!(value, BridgeValue::Integer(7));
    Ok(())
}
