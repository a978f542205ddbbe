//! Exercises the modules `build.rs` renders from the fixture IDLs, compiled
//! against the runtime like any downstream crate would.
include!(concat!(env!("OUT_DIR"), "/fixtures.rs"));

use example_program::inner::{self, Idle, Single, Wrapped};
use example_program::shape::{self, Circle, Pair, Unit};
use example_program::{
    Blank, BlankFields, Holder, HolderFields, InnerKind, Node, NodeFields, NodeJson, ShapeJson, ShapeKind, State,
    StateFields, StateJson, Wide, WideFields, WideJson,
};
use idl_typegen::runtime::{ConvertError, Decoded};
use idl_typegen::{Generator, GeneratorConfig};
use serde_json::{Value as Json, json};

fn fixture() -> Generator {
    let src = include_str!("../fixtures/example_program/idl.json");
    Generator::from_json_str(src, GeneratorConfig::default()).unwrap()
}

/// Bytes the executable bundle produces for the same JSON.
fn bundle_bytes(generator: &Generator, type_name: &str, json: &Json) -> Vec<u8> {
    let bundle = generator.bundle(type_name).unwrap();
    let value = bundle.from_json(json).unwrap();
    bundle.encode(&value, generator.registry()).unwrap()
}

#[test]
fn structs_round_trip_through_bytes_and_json() {
    let state = State::new(StateFields { vec_of_option: vec![None, Some(7)] });
    let bytes = state.encode().unwrap();
    assert_eq!(hex::encode(&bytes), "0200000000010700000000000000");
    assert_eq!(State::decode(&bytes).unwrap(), state);

    let json = serde_json::to_value(state.to_json()).unwrap();
    assert_eq!(json, json!({ "vecOfOption": [null, "7"] }));
    let parsed: StateJson = serde_json::from_value(json).unwrap();
    assert_eq!(State::from_json(&parsed).unwrap(), state);

    let blank = Blank::new(BlankFields {});
    assert!(blank.encode().unwrap().is_empty());
    assert_eq!(Blank::decode(&[]).unwrap(), blank);
    assert_eq!(serde_json::to_value(blank.to_json()).unwrap(), json!({}));
}

#[test]
fn every_variant_shape_round_trips() {
    let cases = [
        (
            ShapeKind::Circle(Circle { radius: 2.0 }),
            "000000000000000040",
            json!({ "kind": "Circle", "value": { "radius": 2.0 } }),
        ),
        (ShapeKind::Unit(Unit), "01", json!({ "kind": "Unit" })),
        (ShapeKind::Pair(Pair(1, -2)), "0201feffffffffffffff", json!({ "kind": "Pair", "value": [1, "-2"] })),
    ];
    for (kind, hex_bytes, expected_json) in cases {
        let bytes = kind.encode().unwrap();
        assert_eq!(hex::encode(&bytes), hex_bytes, "{kind:?}");
        assert_eq!(ShapeKind::decode(&bytes).unwrap(), kind);

        let json = serde_json::to_value(kind.to_json()).unwrap();
        assert_eq!(json, expected_json);
        let parsed: ShapeJson = serde_json::from_value(json).unwrap();
        assert_eq!(shape::from_json(&parsed).unwrap(), kind);
    }
}

#[test]
fn recursive_types_round_trip() {
    let node = Node::new(NodeFields {
        value: 1,
        next: Some(Box::new(NodeFields { value: 2, next: None })),
    });
    let bytes = node.encode().unwrap();
    assert_eq!(bytes, [1, 1, 2, 0]);
    assert_eq!(Node::decode(&bytes).unwrap(), node);

    let json = serde_json::to_value(node.to_json()).unwrap();
    assert_eq!(json, json!({ "value": 1, "next": { "value": 2, "next": null } }));
    let parsed: NodeJson = serde_json::from_value(json).unwrap();
    assert_eq!(Node::from_json(&parsed).unwrap(), node);
}

#[test]
fn nested_containers_and_enums_match_the_bundle() {
    let generator = fixture();
    let wide = Wide::new(WideFields {
        maybe: Some(Some(-5)),
        grid: vec![vec![1, -2], vec![]],
        by_kind: vec![
            (7, InnerKind::Single(Single(u64::MAX))),
            (8, InnerKind::Wrapped(Wrapped { shape: ShapeKind::Pair(Pair(1, -2)) })),
            (9, InnerKind::Idle(Idle)),
        ],
    });
    let json = serde_json::to_value(wide.to_json()).unwrap();
    assert_eq!(
        json,
        json!({
            "maybe": "-5",
            "grid": [[1, -2], []],
            "byKind": [
                [7, { "kind": "Single", "value": ["18446744073709551615"] }],
                [8, { "kind": "Wrapped", "value": { "shape": { "kind": "Pair", "value": [1, "-2"] } } }],
                [9, { "kind": "Idle" }]
            ]
        })
    );

    let bytes = wide.encode().unwrap();
    assert_eq!(bytes, bundle_bytes(&generator, "Wide", &json));
    assert_eq!(Wide::decode(&bytes).unwrap(), wide);
    let parsed: WideJson = serde_json::from_value(json).unwrap();
    assert_eq!(Wide::from_json(&parsed).unwrap(), wide);

    let holder = Holder::new(HolderFields { shape: ShapeKind::Unit(Unit), note: Some("hi".to_string()) });
    let bytes = holder.encode().unwrap();
    assert_eq!(hex::encode(&bytes), "0101020000006869");
    assert_eq!(Holder::decode(&bytes).unwrap(), holder);
}

#[test]
fn empty_variants_require_a_record_payload() {
    let err = shape::from_decoded(&Decoded::variant_of("Unit", Decoded::UInt(1))).unwrap_err();
    assert!(matches!(err, ConvertError::ShapeMismatch { ref path, .. } if path == "Unit"), "{err:?}");
    assert_eq!(
        inner::from_decoded(&Decoded::variant_of("Idle", Decoded::empty())).unwrap(),
        InnerKind::Idle(Idle)
    );

    let generator = fixture();
    let bundle = generator.bundle("Shape").unwrap();
    let bundle_err = bundle.from_decoded(&Decoded::variant_of("Unit", Decoded::UInt(1))).unwrap_err();
    assert!(
        matches!(bundle_err, ConvertError::ShapeMismatch { ref path, .. } if path == "Shape.Unit"),
        "{bundle_err:?}"
    );
}
