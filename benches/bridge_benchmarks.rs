//! 调用桥性能基准测试
//!
//! 比较原生目录调用、JSON 协议调用与脚本侧调用的开销

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use script_bridge::config::BridgeConfig;
use script_bridge::{Argument, Bridge, BridgeResult, BridgeValue, ScriptHost};
use std::hint::black_box;

fn bench_native_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("native_calls");
    let bridge = Bridge::with_builtins().unwrap();

    group.bench_function("add", |b| {
        b.iter(|| black_box(bridge.call("add", vec![BridgeValue::Number(1.5), BridgeValue::Number(2.5)])));
    });

    group.bench_function("factorial_20", |b| {
        b.iter(|| black_box(bridge.call("factorial", vec![BridgeValue::Integer(20)])));
    });

    group.bench_function("counter_increment", |b| {
        b.iter(|| black_box(bridge.call("counter.increment", vec![])));
    });

    for size in [16usize, 256, 4096] {
        let numbers: Vec<f64> = (0..size).map(|i| i as f64).collect();
        group.bench_with_input(BenchmarkId::new("statistics", size), &numbers, |b, numbers| {
            b.iter(|| black_box(bridge.call("statistics", vec![BridgeValue::NumberList(numbers.clone())])));
        });
    }

    group.finish();
}

fn bench_native_callbacks(c: &mut Criterion) {
    let mut group = c.benchmark_group("native_callbacks");
    let bridge = Bridge::with_builtins().unwrap();

    for size in [16usize, 256] {
        let numbers: Vec<f64> = (0..size).map(|i| i as f64).collect();
        group.bench_with_input(BenchmarkId::new("map_numbers", size), &numbers, |b, numbers| {
            b.iter(|| {
                let double = |args: &[BridgeValue]| -> BridgeResult<BridgeValue> {
                    Ok(BridgeValue::Number(args[0].as_f64().unwrap_or_default() * 2.0))
                };
                black_box(bridge.invoke(
                    "callback.map_numbers",
                    vec![Argument::value(numbers.clone()), Argument::callable(double)],
                ))
            });
        });
    }

    group.finish();
}

fn bench_json_protocol(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_protocol");
    let bridge = Bridge::with_builtins().unwrap();

    group.bench_function("power", |b| {
        b.iter(|| black_box(bridge.handle_json(r#"{"operation": "power", "args": [2, 10]}"#)));
    });

    group.bench_function("matrix_multiply", |b| {
        b.iter(|| {
            black_box(bridge.handle_json(
                r#"{"operation": "matrix_multiply", "args": [[[1, 2], [3, 4]], [[5, 6], [7, 8]]]}"#,
            ))
        });
    });

    group.finish();
}

fn bench_script_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_calls");
    let host = ScriptHost::new(&BridgeConfig::default()).unwrap();
    host.execute(
        "function add(a, b) { return a + b; }\n\
         function native_add(a, b) { return Native.add(a, b); }",
    )
    .unwrap();

    group.bench_function("script_to_native", |b| {
        b.iter(|| black_box(host.execute("Native.add(1, 2)")));
    });

    group.bench_function("host_to_script", |b| {
        let args = [BridgeValue::Integer(1), BridgeValue::Integer(2)];
        b.iter(|| black_box(host.call_function("add", &args)));
    });

    group.bench_function("host_to_script_to_native", |b| {
        let args = [BridgeValue::Integer(1), BridgeValue::Integer(2)];
        b.iter(|| black_box(host.call_function("native_add", &args)));
    });

    group.bench_function("script_callback", |b| {
        b.iter(|| black_box(host.execute("Native.callback.map_numbers([1, 2, 3, 4], x => x + 1)")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_native_calls,
    bench_native_callbacks,
    bench_json_protocol,
    bench_script_calls
);
criterion_main!(benches);
