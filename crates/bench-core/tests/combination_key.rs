use bench_core::{AxisValue, Combination};
use proptest::prelude::*;

fn combo(pairs: &[(&str, AxisValue)]) -> Combination {
    Combination::new(
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect(),
        3,
    )
}

#[test]
fn key_ignores_axis_order() {
    let a = combo(&[("size", AxisValue::Int(1000)), ("sparsity", AxisValue::Float(0.25))]);
    let b = combo(&[("sparsity", AxisValue::Float(0.25)), ("size", AxisValue::Int(1000))]);
    assert_eq!(a.key(), b.key());
    assert_ne!(a, b);
}

#[test]
fn key_distinguishes_values() {
    let a = combo(&[("size", AxisValue::Int(1000)), ("workers", AxisValue::Int(1))]);
    let b = combo(&[("size", AxisValue::Int(1000)), ("workers", AxisValue::Int(2))]);
    assert_ne!(a.key(), b.key());
}

#[test]
fn float_render_uses_precision() {
    assert_eq!(AxisValue::Float(0.25).render(Some(6)), "0.250000");
    assert_eq!(AxisValue::Float(0.25).render(None), "0.25");
    assert_eq!(AxisValue::Int(7).render(Some(6)), "7");
}

#[test]
fn label_and_slug_follow_declaration_order() {
    let c = combo(&[("size", AxisValue::Int(1000)), ("sparsity", AxisValue::Float(0.5))]);
    assert_eq!(c.label(), "size=1000 sparsity=0.5");
    assert_eq!(c.slug(), "size-1000_sparsity-0_5");
}

#[test]
fn sub_key_keeps_only_requested_axes() {
    let c = combo(&[("degree", AxisValue::Int(10)), ("threads", AxisValue::Int(4))]);
    let key = c.sub_key(&["degree".to_string()]);
    assert_eq!(key.get("degree"), Some("10"));
    assert_eq!(key.get("threads"), None);
}

#[test]
fn untagged_values_deserialize_by_shape() {
    let values: Vec<AxisValue> = serde_json::from_str("[1000, 0.95]").expect("json");
    assert_eq!(values, vec![AxisValue::Int(1000), AxisValue::Float(0.95)]);
}

proptest! {
    #[test]
    fn canonical_float_parses_back_exactly(value in -1.0e12f64..1.0e12f64) {
        let rendered = AxisValue::Float(value).canonical();
        let parsed: f64 = rendered.parse().unwrap();
        prop_assert_eq!(parsed.to_bits(), value.to_bits());
    }
}
