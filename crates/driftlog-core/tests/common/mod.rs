use proptest::prelude::*;
use serde_json::{json, Value};

/// A minimal pod-shaped snapshot
#[allow(dead_code)]
pub fn pod(name: &str, image: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": "default",
            "creationTimestamp": "2024-05-01T10:00:00Z",
            "labels": {"app": name}
        },
        "spec": {
            "image": image,
            "containers": [
                {"name": "app", "image": image, "ports": [{"containerPort": 80}]},
                {"name": "sidecar", "image": "envoy:1.29"}
            ]
        }
    })
}

/// Leaf values, including RFC 3339 timestamps with assorted offsets
#[allow(dead_code)]
pub fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9:./-]{0,12}".prop_map(Value::String),
        (2000i32..2100, 1u32..13, 1u32..29, 0u32..24, 0u32..60, 0u32..60, -12i32..13).prop_map(
            |(y, mo, d, h, mi, s, off)| {
                let zone = if off == 0 {
                    "Z".to_string()
                } else {
                    format!("{:+03}:00", off)
                };
                Value::String(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}",
                    y, mo, d, h, mi, s, zone
                ))
            }
        ),
    ]
}

/// Arbitrary nested documents
#[allow(dead_code)]
pub fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Arbitrary mapping-rooted documents
#[allow(dead_code)]
pub fn arb_mapping() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,6}", arb_json(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}
