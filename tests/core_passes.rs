use std::sync::Arc;

use fastats::stdlib::{self, Core};
use fastats::{Engine, EngineConfig, Module, Value};

fn setup() -> (Core, Module) {
    let engine = Engine::new(EngineConfig::default());
    let core = stdlib::core(&engine).unwrap();
    let user = Module::load(&engine, "user", USER).unwrap();
    (core, user)
}

fn floats(value: &Value) -> Vec<f64> {
    value.as_array().unwrap().to_vec()
}

fn cubes(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64).powi(3)).collect()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

const USER: &str = "
fn twice(x) { x * 2 }
fn square(x) { x * x }
fn calc(x) { 2 * math.log(x) }

fn half(x) { x / 2 }
fn quarter(x) { half(x) / 2 }

fn first(x) { x * x }
fn second(x) { x * x * x }
fn multi(x) {
    let a = first(x)
    second(a)
}

fn mean(x) { array.sum(x) / len(x) }
fn std(x) { array.std(x) }

fn double(x, val_in, val_out, state) { (val_in * 2, state) }
fn triple(x, val_in, val_out, state) { (val_in * 3, state) }
fn out_flip(x, val_in, val_out, state) { (val_out * -1, state) }

fn mean_range(x, val_in, val_out, state) {
    state = [1, 2, 3, 4, 5]
    (array.mean(state), state)
}

fn rolling_mean(x, val_in, val_out, state) {
    if len(state) == 0 {
        state = [array.sum(x)]
    } else {
        state[0] = state[0] + val_in - val_out
    }
    (state[0] / len(x), state)
}
";

// ── single_pass ──

#[test]
fn test_single_pass_basic_sanity() {
    let (core, user) = setup();
    let pass = core.single_pass().unwrap();
    let data: Vec<f64> = (0..10).map(f64::from).collect();

    let plain = floats(&pass.call_plain(&[Value::from(data.clone())]).unwrap());
    assert_eq!(plain, data);

    let result = pass
        .invoke()
        .arg(data.clone())
        .with("value", user.callable("twice").unwrap())
        .run()
        .unwrap();
    let result = floats(&result);
    assert_eq!(result[1], 2.0);
    assert_eq!(result[9], 18.0);
    assert_eq!(result.iter().sum::<f64>(), 90.0);

    let squared = pass
        .invoke()
        .arg(data)
        .with("value", user.callable("square").unwrap())
        .run()
        .unwrap();
    assert_eq!(floats(&squared)[9], 81.0);
}

#[test]
fn test_single_pass_library_functions() {
    let (core, user) = setup();
    let pass = core.single_pass().unwrap();
    let tanh = fastats::Callable::Native(fastats::runtime::library::lookup("math", "tanh").unwrap());
    let data = vec![0.1, 0.2, 0.3];

    let result = floats(&pass.invoke().arg(data.clone()).with("value", tanh).run().unwrap());
    for (got, x) in result.iter().zip(&data) {
        assert!(approx(*got, x.tanh()));
    }

    let logs: Vec<f64> = (1..10).map(f64::from).collect();
    let result = pass
        .invoke()
        .arg(logs.clone())
        .with("value", user.callable("calc").unwrap())
        .run()
        .unwrap();
    let result = floats(&result);
    assert_eq!(result[0], 0.0);
    assert!(approx(result[1], 2.0 * 2f64.ln()));
}

#[test]
fn test_single_pass_nested_override_functions() {
    let (core, user) = setup();
    let pass = core.single_pass().unwrap();

    let quarter = pass
        .invoke()
        .arg(vec![1.0, 2.0, 3.0])
        .with("value", user.callable("quarter").unwrap())
        .run()
        .unwrap();
    assert_eq!(floats(&quarter), vec![0.25, 0.5, 0.75]);

    let multi = pass
        .invoke()
        .arg(vec![1.0, 2.0, 3.0])
        .with("value", user.callable("multi").unwrap())
        .run()
        .unwrap();
    assert_eq!(floats(&multi), vec![1.0, 64.0, 729.0]);
}

// ── windowed_pass ──

#[test]
fn test_windowed_pass_mean() {
    let (core, user) = setup();
    let pass = core.windowed_pass().unwrap();
    let data: Vec<f64> = (0..100).map(|i| (i as f64).powi(2)).collect();

    let res = pass
        .invoke()
        .arg(data.clone())
        .arg(5.0)
        .with("value", user.callable("mean").unwrap())
        .run()
        .unwrap();
    let res = floats(&res);
    assert!(res[..4].iter().all(|v| v.is_nan()));
    assert!(approx(res[4], 6.0));
    assert!(approx(res[5], 11.0));
    assert!(approx(res[8], 38.0));
    assert!(approx(res[99], 9411.0));

    let res = pass
        .invoke()
        .arg(data)
        .arg(10.0)
        .with("value", user.callable("mean").unwrap())
        .run()
        .unwrap();
    let res = floats(&res);
    assert!(res[..9].iter().all(|v| v.is_nan()));
    assert!(approx(res[9], 28.5));
    assert!(approx(res[99], 8938.5));
}

#[test]
fn test_windowed_pass_std() {
    let (core, user) = setup();
    let data: Vec<f64> = (0..100).map(|i| (i as f64).powi(2)).collect();
    let res = core
        .windowed_pass()
        .unwrap()
        .invoke()
        .arg(data)
        .arg(5.0)
        .with("value", user.callable("std").unwrap())
        .run()
        .unwrap();
    let res = floats(&res);
    assert!(res[3].is_nan());
    assert!((res[4] - 5.89915248).abs() < 1e-6);
    assert!((res[99] - 274.36253389).abs() < 1e-6);
}

// ── windowed_stateful_pass ──

#[test]
fn test_windowed_stateful_pass_respects_value() {
    let (core, user) = setup();
    let pass = core.windowed_stateful_pass().unwrap();
    let data = cubes(101);

    let ret = pass
        .invoke()
        .arg(data.clone())
        .arg(7.0)
        .with("value", user.callable("double").unwrap())
        .run()
        .unwrap();
    let ret = floats(&ret);
    assert!(ret[..6].iter().all(|v| v.is_nan()));
    for (got, x) in ret[6..].iter().zip(&data[6..]) {
        assert_eq!(*got, x * 2.0);
    }
}

#[test]
fn test_windowed_stateful_pass_val_out() {
    let (core, user) = setup();
    let data = cubes(95);
    let ret = core
        .windowed_stateful_pass()
        .unwrap()
        .invoke()
        .arg(data.clone())
        .arg(9.0)
        .with("value", user.callable("out_flip").unwrap())
        .run()
        .unwrap();
    let ret = floats(&ret);
    assert!(ret[..9].iter().all(|v| v.is_nan()));
    for (got, x) in ret[9..].iter().zip(&data[..data.len() - 9]) {
        assert_eq!(*got, -x);
    }
}

#[test]
fn test_windowed_stateful_pass_constant() {
    let (core, user) = setup();
    let data: Vec<f64> = (0..50).map(f64::from).collect();
    let ret = core
        .windowed_stateful_pass()
        .unwrap()
        .invoke()
        .arg(data)
        .arg(4.0)
        .with("value", user.callable("mean_range").unwrap())
        .run()
        .unwrap();
    let ret = floats(&ret);
    assert!(ret[..3].iter().all(|v| v.is_nan()));
    assert!(ret[3..].iter().all(|v| *v == 3.0));
}

#[test]
fn test_windowed_stateful_pass_rolling_mean() {
    let (core, user) = setup();
    let data = vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0];
    let ret = core
        .windowed_stateful_pass()
        .unwrap()
        .invoke()
        .arg(data)
        .arg(2.0)
        .with("value", user.callable("rolling_mean").unwrap())
        .run()
        .unwrap();
    let ret = floats(&ret);
    assert!(ret[0].is_nan());
    assert_eq!(&ret[1..], &[1.5, 2.5, 4.0, 6.5, 10.5]);
}

#[test]
fn test_windowed_stateful_pass_callable() {
    let (core, user) = setup();
    let compiled = core
        .windowed_stateful_pass()
        .unwrap()
        .invoke()
        .with("value", user.callable("triple").unwrap())
        .compile()
        .unwrap();
    let ret = compiled
        .call(&[Value::from(vec![2.0, 4.0, 6.0]), Value::Num(2.0)])
        .unwrap();
    let ret = floats(&ret);
    assert!(ret[0].is_nan());
    assert_eq!(&ret[1..], &[12.0, 18.0]);
}

#[test]
fn test_passes_share_one_cache() {
    let engine = Engine::new(EngineConfig::default());
    let core = stdlib::core(&engine).unwrap();
    let user = Module::load(&engine, "user", USER).unwrap();
    let pass = core.single_pass().unwrap();
    assert!(Arc::ptr_eq(pass.engine(), &engine));

    for _ in 0..3 {
        pass.invoke()
            .arg(vec![1.0, 2.0])
            .with("value", user.callable("twice").unwrap())
            .run()
            .unwrap();
    }
    let stats = engine.cache().stats();
    assert_eq!(stats.hits + stats.misses, 3);
    assert!(stats.entries >= 1);
}
