use idl_typegen::{
    CodecError, ConvertError, Decoded, GenError, Generator, GeneratorConfig, Layout, Payload, TypeBundle, Value,
    runtime,
};
use indexmap::IndexMap;
use serde_json::json;

fn generator(types: &str) -> Generator {
    Generator::from_json_str(&format!(r#"{{ "types": {types} }}"#), GeneratorConfig::default()).unwrap()
}

fn shapes() -> Generator {
    generator(
        r#"[
        { "name": "Shape", "type": { "kind": "enum", "variants": [
            { "name": "Circle", "fields": [ { "name": "radius", "type": "f64" } ] },
            { "name": "Unit" }
        ] } }
    ]"#,
    )
}

fn enum_bundle<'a>(generator: &'a Generator, name: &str) -> idl_typegen::EnumBundle<'a> {
    match generator.bundle(name).unwrap() {
        TypeBundle::Enum(bundle) => bundle,
        TypeBundle::Struct(_) => panic!("{name} is a struct"),
    }
}

#[test]
fn vec_of_option_u64() {
    let generator = generator(
        r#"[ { "name": "State", "type": { "kind": "struct", "fields": [
            { "name": "vecOfOption", "type": { "vec": { "option": "u64" } } }
        ] } } ]"#,
    );
    let bundle = generator.bundle("State").unwrap();
    let TypeBundle::Struct(state) = &bundle else { panic!() };
    let value = state
        .construct(IndexMap::from([(
            "vecOfOption".to_string(),
            Value::List(vec![Value::none(), Value::some(Value::Unsigned(7))]),
        )]))
        .unwrap();

    let bytes = bundle.encode(&value, generator.registry()).unwrap();
    assert_eq!(bytes, [2, 0, 0, 0, 0, 1, 7, 0, 0, 0, 0, 0, 0, 0]);

    let json = bundle.to_json(&value).unwrap();
    assert_eq!(json, json!({ "vecOfOption": [null, "7"] }));
    assert_eq!(bundle.from_json(&json).unwrap(), value);
    assert_eq!(bundle.decode(&bytes, generator.registry()).unwrap(), value);
}

#[test]
fn shape_circle_and_unit() {
    let generator = shapes();
    let bundle = generator.bundle("Shape").unwrap();
    let shape = enum_bundle(&generator, "Shape");

    let circle = shape
        .construct("Circle", Payload::Named(IndexMap::from([("radius".to_string(), Value::float(2.0))])))
        .unwrap();
    let mut expected = vec![0];
    expected.extend_from_slice(&2.0f64.to_le_bytes());
    assert_eq!(bundle.encode(&circle, generator.registry()).unwrap(), expected);

    let unit = shape.construct("Unit", Payload::Empty).unwrap();
    assert_eq!(bundle.encode(&unit, generator.registry()).unwrap(), [1]);

    let decoded_unit = Decoded::structure([("Unit", Decoded::empty())]);
    assert_eq!(bundle.from_decoded(&decoded_unit).unwrap(), unit);
    let decoded_circle = Decoded::structure([("Circle", Decoded::structure([("radius", Decoded::Float(2.0))]))]);
    assert_eq!(bundle.from_decoded(&decoded_circle).unwrap(), circle);
    assert!(matches!(
        bundle.from_decoded(&Decoded::empty()),
        Err(ConvertError::InvalidEnum { enum_name, .. }) if enum_name == "Shape"
    ));
}

#[test]
fn discriminants_are_declaration_indices() {
    let generator = generator(
        r#"[ { "name": "Letters", "type": { "kind": "enum", "variants": [
            { "name": "A" }, { "name": "B" }, { "name": "C" }
        ] } } ]"#,
    );
    let letters = enum_bundle(&generator, "Letters");
    for (kind, tag) in [("A", 0u8), ("B", 1), ("C", 2)] {
        let value = letters.construct(kind, Payload::Empty).unwrap();
        assert_eq!(letters.discriminator(&value).unwrap(), tag);
        assert_eq!(letters.kind(&value).unwrap(), kind);
        let bytes = generator.bundle("Letters").unwrap().encode(&value, generator.registry()).unwrap();
        assert_eq!(bytes, [tag]);
    }
}

#[test]
fn dispatch_never_defaults() {
    let generator = shapes();
    let bundle = generator.bundle("Shape").unwrap();
    let two_keys = Decoded::structure([("Circle", Decoded::empty()), ("Unit", Decoded::empty())]);
    assert!(matches!(bundle.from_decoded(&two_keys), Err(ConvertError::InvalidEnum { .. })));
    let unknown = Decoded::variant_of("Square", Decoded::empty());
    assert!(matches!(bundle.from_decoded(&unknown), Err(ConvertError::InvalidEnum { .. })));
    assert_eq!(
        bundle.from_json(&json!({ "kind": "circle", "value": { "radius": 1.0 } })).unwrap_err(),
        ConvertError::UnrecognizedKind { enum_name: "Shape".into(), kind: "circle".into() }
    );
    assert!(matches!(
        bundle.decode(&[2], generator.registry()),
        Err(runtime::Error::Codec(CodecError::InvalidEnumTag { tag: 2, .. }))
    ));
}

#[test]
fn every_variant_shape_has_tag_plus_field_widths() {
    let generator = generator(
        r#"[ { "name": "Msg", "type": { "kind": "enum", "variants": [
            { "name": "Quit" },
            { "name": "Move", "fields": [ { "name": "x", "type": "i32" }, { "name": "y", "type": "i32" } ] },
            { "name": "Color", "fields": [ "u8", "u8", "u8" ] }
        ] } } ]"#,
    );
    let bundle = generator.bundle("Msg").unwrap();
    let msg = enum_bundle(&generator, "Msg");
    let cases = [
        (msg.construct("Quit", Payload::Empty).unwrap(), 1),
        (
            msg.construct(
                "Move",
                Payload::Named(IndexMap::from([
                    ("x".to_string(), Value::Signed(-1)),
                    ("y".to_string(), Value::Signed(2)),
                ])),
            )
            .unwrap(),
            1 + 4 + 4,
        ),
        (
            msg.construct("Color", Payload::Tuple(vec![Value::Unsigned(1), Value::Unsigned(2), Value::Unsigned(3)]))
                .unwrap(),
            1 + 3,
        ),
    ];
    for (value, len) in cases {
        let bytes = bundle.encode(&value, generator.registry()).unwrap();
        assert_eq!(bytes.len(), len, "{value:?}");
        assert_eq!(bundle.decode(&bytes, generator.registry()).unwrap(), value);
    }
    let color = Layout::structure([("_0", Layout::U8), ("_1", Layout::U8), ("_2", Layout::U8)]);
    assert_eq!(color.fixed_size(generator.registry()), Some(3));
}

#[test]
fn mismatches_name_the_offending_path() {
    let generator = generator(
        r#"[
        { "name": "Foo", "type": { "kind": "struct", "fields": [
            { "name": "bytes", "type": { "vec": "u8" } },
            { "name": "inner", "type": { "defined": "Bar" } }
        ] } },
        { "name": "Bar", "type": { "kind": "struct", "fields": [ { "name": "key", "type": "publicKey" } ] } }
    ]"#,
    );
    let bundle = generator.bundle("Foo").unwrap();
    let err = bundle
        .from_json(&json!({ "bytes": [1, 2, "x"], "inner": { "key": "11111111111111111111111111111111" } }))
        .unwrap_err();
    assert_eq!(err, ConvertError::mismatch("Foo.bytes[2]", "u8", "string"));

    let err = bundle.from_json(&json!({ "bytes": [], "inner": { "key": "0OIl" } })).unwrap_err();
    assert!(matches!(err, ConvertError::ShapeMismatch { ref path, .. } if path == "Foo.inner.key"), "{err}");
}

#[test]
fn schema_errors_surface_before_generation() {
    let dangling = r#"{ "types": [ { "name": "A", "type": { "kind": "struct", "fields": [
        { "name": "b", "type": { "defined": "Missing" } } ] } } ] }"#;
    assert!(matches!(
        Generator::from_json_str(dangling, GeneratorConfig::default()),
        Err(GenError::Reference { missing, .. }) if missing == "Missing"
    ));

    let unbounded = r#"{ "types": [ { "name": "Loop", "type": { "kind": "struct", "fields": [
        { "name": "again", "type": { "defined": "Loop" } } ] } } ] }"#;
    assert!(matches!(
        Generator::from_json_str(unbounded, GeneratorConfig::default()),
        Err(GenError::UnboundedRecursion { .. })
    ));

    let bad_type = r#"{ "types": [ { "name": "A", "type": { "kind": "struct", "fields": [
        { "name": "b", "type": "u256" } ] } } ] }"#;
    assert!(matches!(Generator::from_json_str(bad_type, GeneratorConfig::default()), Err(GenError::Parse(_))));
}

#[test]
fn recursive_types_round_trip_through_indirection() {
    let generator = generator(
        r#"[ { "name": "Node", "type": { "kind": "struct", "fields": [
            { "name": "value", "type": "u8" },
            { "name": "next", "type": { "option": { "defined": "Node" } } }
        ] } } ]"#,
    );
    let bundle = generator.bundle("Node").unwrap();
    let json = json!({ "value": 1, "next": { "value": 2, "next": null } });
    let value = bundle.from_json(&json).unwrap();
    let bytes = bundle.encode(&value, generator.registry()).unwrap();
    assert_eq!(bytes, [1, 1, 2, 0]);
    assert_eq!(bundle.to_json(&bundle.decode(&bytes, generator.registry()).unwrap()).unwrap(), json);
}

#[test]
fn linked_lists_nest_up_to_the_depth_limit() {
    let generator = generator(
        r#"[ { "name": "Node", "type": { "kind": "struct", "fields": [
            { "name": "value", "type": "u8" },
            { "name": "next", "type": { "option": { "defined": "Node" } } }
        ] } } ]"#,
    );
    let bundle = generator.bundle("Node").unwrap();
    let list = |len: usize| {
        let mut json = json!({ "value": 0, "next": null });
        for i in 1..len {
            json = json!({ "value": i % 256, "next": json });
        }
        bundle.from_json(&json).unwrap()
    };

    // the outermost node is the bundle's own layout, every further node is one nested reference
    let longest = list(idl_typegen::codec::MAX_DEPTH + 1);
    let bytes = bundle.encode(&longest, generator.registry()).unwrap();
    assert_eq!(bytes.len(), 2 * (idl_typegen::codec::MAX_DEPTH + 1));
    assert_eq!(bundle.decode(&bytes, generator.registry()).unwrap(), longest);

    let too_long = list(idl_typegen::codec::MAX_DEPTH + 2);
    assert_eq!(
        bundle.encode(&too_long, generator.registry()),
        Err(runtime::Error::Codec(CodecError::DepthLimit(idl_typegen::codec::MAX_DEPTH)))
    );
}

#[test]
fn f32_members_reject_values_that_would_narrow() {
    let generator = generator(
        r#"[ { "name": "Gauge", "type": { "kind": "struct", "fields": [ { "name": "a", "type": "f32" } ] } } ]"#,
    );
    let TypeBundle::Struct(gauge) = generator.bundle("Gauge").unwrap() else { panic!() };
    let err = gauge.construct(IndexMap::from([("a".to_string(), Value::float(0.1))])).unwrap_err();
    assert_eq!(err, ConvertError::mismatch("Gauge.a", "f32", "0.1"));

    let value = gauge
        .construct(IndexMap::from([("a".to_string(), Value::float(f64::from(0.1f32)))]))
        .unwrap();
    let bundle = generator.bundle("Gauge").unwrap();
    let bytes = bundle.encode(&value, generator.registry()).unwrap();
    assert_eq!(bytes, 0.1f32.to_le_bytes());
    assert_eq!(bundle.decode(&bytes, generator.registry()).unwrap(), value);
}
