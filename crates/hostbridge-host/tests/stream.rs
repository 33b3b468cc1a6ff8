//! Async result stream over a blocking query.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use common::*;
use futures_util::StreamExt;
use hostbridge_core::BridgeError;
use serde_json::json;

#[tokio::test]
async fn streams_rows_then_ends() {
    let (engine, bridge) = bridge();
    engine.script(vec![
        result(json!({"x": int(1)})),
        result(json!({"x": int(2)})),
        result(json!({"x": int(3)})),
    ]);
    let stream = bridge.query_str("f(x)").unwrap().into_stream().unwrap();
    let rows: Vec<i64> = stream
        .map(|row| row.unwrap().get_typed::<i64>("x").unwrap())
        .collect()
        .await;
    assert_eq!(rows, vec![1, 2, 3]);
    assert_eq!(engine.releases(), 1);
}

#[tokio::test]
async fn rows_are_only_computed_on_demand() {
    let (engine, bridge) = bridge();
    engine.script(vec![
        result(json!({"x": int(1)})),
        external_call(1, int(-5), "abs", Some(vec![])),
        result(json!({"x": int(2)})),
    ]);
    let mut stream = bridge.query_str("f(x)").unwrap().into_stream().unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.get_typed::<i64>("x").unwrap(), 1);
    tokio::task::yield_now().await;
    assert!(engine.call_results().is_empty());

    drop(stream);
    for _ in 0..100 {
        if engine.releases() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(engine.releases(), 1);
    assert!(engine.call_results().is_empty());
}

#[tokio::test]
async fn errors_end_the_stream() {
    let (engine, bridge) = bridge();
    engine.script(vec![json!({"Bogus": 1}), result(json!({}))]);
    let mut stream = bridge.query_str("f").unwrap().into_stream().unwrap();
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, BridgeError::UnknownVariant { .. }));
    assert!(stream.next().await.is_none());
    assert_eq!(engine.releases(), 1);
}

#[test]
fn into_stream_requires_a_runtime() {
    let (_, bridge) = bridge();
    let err = bridge.query_str("f").unwrap().into_stream().err().unwrap();
    assert_eq!(err.kind().as_str(), "ENGINE");
}
