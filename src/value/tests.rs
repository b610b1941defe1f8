use crate::{shallow_eq, Value};

#[test]
fn record_get() {
    let value = Value::record([("count", Value::Int(1)), ("name", Value::from("x"))]);
    assert_eq!(value.get("count"), Some(&Value::Int(1)));
    assert_eq!(value.get("name").and_then(Value::as_str), Some("x"));
    assert_eq!(value.get("missing"), None);
    assert_eq!(Value::Int(1).get("count"), None);
}

#[test]
fn typed_accessors_are_variant_exact() {
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::Int(1).as_bool(), None);
    assert_eq!(Value::Float(0.5).as_float(), Some(0.5));
    assert_eq!(Value::Int(1).as_float(), None);
}

#[test]
fn same_is_identity_for_records() {
    let a = Value::record([("x", 1)]);
    let b = a.clone();
    assert!(a.same(&b));

    let c = Value::record([("x", 1)]);
    assert_eq!(a, c);
    assert!(!a.same(&c));
}

#[test]
fn same_compares_primitives_by_value() {
    assert!(Value::Int(1).same(&Value::Int(1)));
    assert!(!Value::Int(1).same(&Value::Int(2)));
    assert!(Value::from("a").same(&Value::from("a")));
    assert!(Value::Null.same(&Value::Null));
    assert!(!Value::Null.same(&Value::Int(0)));
}

#[test]
fn lists_compare_by_identity_under_same() {
    let a = Value::from(vec![1, 2]);
    let b = a.clone();
    let c = Value::from(vec![1, 2]);
    assert!(a.same(&b));
    assert!(!a.same(&c));
    assert_eq!(a, c);
}

#[test]
fn opaque_is_identity_only() {
    struct Marker;
    let a = Value::opaque(Marker);
    let b = a.clone();
    let c = Value::opaque(Marker);
    assert!(a.same(&b));
    assert_eq!(a, b);
    assert!(!a.same(&c));
    assert_ne!(a, c);
}

#[test]
fn shallow_eq_is_field_wise() {
    let name = Value::from("x");
    let a = Value::record([("n", Value::Int(1)), ("name", name.clone())]);
    let b = Value::record([("n", Value::Int(1)), ("name", name.clone())]);
    assert!(shallow_eq(&a, &b));

    let c = Value::record([("n", Value::Int(2)), ("name", name.clone())]);
    assert!(!shallow_eq(&a, &c));

    let d = Value::record([("n", Value::Int(1))]);
    assert!(!shallow_eq(&a, &d));
}

#[test]
fn shallow_eq_does_not_recurse() {
    // Distinct allocations of an equal nested record are not shallow-equal.
    let a = Value::record([("inner", Value::record([("x", 1)]))]);
    let b = Value::record([("inner", Value::record([("x", 1)]))]);
    assert!(!shallow_eq(&a, &b));
}

#[test]
fn serde_round_trip() {
    let value: Value =
        serde_json::from_str(r#"{"count":1,"half":0.5,"name":"x","tags":["a","b"],"none":null}"#)
            .unwrap();
    assert_eq!(value.get("count"), Some(&Value::Int(1)));
    assert_eq!(value.get("half").and_then(Value::as_float), Some(0.5));
    assert_eq!(value.get("none"), Some(&Value::Null));
    assert_eq!(value.get("tags"), Some(&Value::from(vec!["a", "b"])));

    let json = serde_json::to_value(&value).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"count":1,"half":0.5,"name":"x","tags":["a","b"],"none":null})
    );
}

#[test]
fn opaque_does_not_serialize() {
    let value = Value::record([("blob", Value::opaque(5u8))]);
    assert!(serde_json::to_value(&value).is_err());
}
