use idl_typegen::{Generator, GeneratorConfig, Payload, PublicKey, StructValue, Value};
use indexmap::IndexMap;
use proptest::prelude::*;

const IDL: &str = r#"{ "types": [
    { "name": "Record", "type": { "kind": "struct", "fields": [
        { "name": "small", "type": "u8" },
        { "name": "balance", "type": "i64" },
        { "name": "supply", "type": "u128" },
        { "name": "ratio", "type": "f64" },
        { "name": "weight", "type": "f32" },
        { "name": "label", "type": "string" },
        { "name": "limit", "type": { "option": "u32" } },
        { "name": "deltas", "type": { "vec": "i16" } },
        { "name": "blob", "type": "bytes" },
        { "name": "owner", "type": "publicKey" },
        { "name": "flags", "type": { "array": [ "bool", 3 ] } },
        { "name": "names", "type": { "hashMap": [ "u16", "string" ] } },
        { "name": "shape", "type": { "defined": "Shape" } }
    ] } },
    { "name": "Shape", "type": { "kind": "enum", "variants": [
        { "name": "Circle", "fields": [ { "name": "radius", "type": "f64" } ] },
        { "name": "Unit" },
        { "name": "Pair", "fields": [ "u8", "i64" ] }
    ] } }
] }"#;

fn generator() -> Generator {
    Generator::from_json_str(IDL, GeneratorConfig::default()).unwrap()
}

fn shape(kind: &str, discriminator: u8, payload: Payload) -> Value {
    Value::Enum(idl_typegen::EnumValue {
        type_name: "Shape".into(),
        kind: kind.into(),
        discriminator,
        payload,
    })
}

fn shape_strategy(ratio: impl Strategy<Value = f64> + 'static) -> impl Strategy<Value = Value> {
    prop_oneof![
        ratio.prop_map(|r| shape("Circle", 0, Payload::Named(IndexMap::from([("radius".to_string(), Value::float(r))])))),
        Just(shape("Unit", 1, Payload::Empty)),
        (any::<u8>(), any::<i64>()).prop_map(|(a, b)| shape(
            "Pair",
            2,
            Payload::Tuple(vec![Value::Unsigned(a.into()), Value::Signed(b.into())])
        )),
    ]
}

/// `finite` keeps floats inside the range where the JSON form is lossless.
fn record_strategy(finite: bool) -> impl Strategy<Value = Value> {
    let ratio = move || -> BoxedStrategy<f64> {
        if finite { (-1e12f64..1e12).boxed() } else { any::<f64>().boxed() }
    };
    let weight = if finite { (-1e6f32..1e6).boxed() } else { any::<f32>().boxed() };
    (
        any::<u8>(),
        any::<i64>(),
        any::<u128>(),
        (ratio(), weight),
        "[a-zA-Z0-9 ]{0,12}",
        proptest::option::of(any::<u32>()),
        prop::collection::vec(any::<i16>(), 0..8),
        prop::collection::vec(any::<u8>(), 0..16),
        any::<[u8; 32]>(),
        any::<[bool; 3]>(),
        prop::collection::vec((any::<u16>(), "[a-z]{0,4}"), 0..4),
        shape_strategy(ratio()),
    )
        .prop_map(
            |(small, balance, supply, (ratio, weight), label, limit, deltas, blob, owner, flags, names, shape)| {
                let fields = IndexMap::from([
                    ("small".to_string(), Value::Unsigned(small.into())),
                    ("balance".to_string(), Value::Signed(balance.into())),
                    ("supply".to_string(), Value::Unsigned(supply)),
                    ("ratio".to_string(), Value::float(ratio)),
                    ("weight".to_string(), Value::float(weight.into())),
                    ("label".to_string(), Value::String(label)),
                    ("limit".to_string(), Value::Option(limit.map(|n| Box::new(Value::Unsigned(n.into()))))),
                    ("deltas".to_string(), Value::List(deltas.into_iter().map(|d| Value::Signed(d.into())).collect())),
                    ("blob".to_string(), Value::Bytes(blob)),
                    ("owner".to_string(), Value::PublicKey(PublicKey::new(owner))),
                    ("flags".to_string(), Value::List(flags.into_iter().map(Value::Bool).collect())),
                    (
                        "names".to_string(),
                        Value::Map(
                            names
                                .into_iter()
                                .map(|(k, v)| (Value::Unsigned(k.into()), Value::String(v)))
                                .collect(),
                        ),
                    ),
                    ("shape".to_string(), shape),
                ]);
                Value::Struct(StructValue { type_name: "Record".into(), fields })
            },
        )
}

proptest! {
    #[test]
    fn binary_round_trip(value in record_strategy(false)) {
        let generator = generator();
        let bundle = generator.bundle("Record").unwrap();
        let bytes = bundle.encode(&value, generator.registry()).unwrap();
        let back = bundle.decode(&bytes, generator.registry()).unwrap();
        prop_assert_eq!(back, value);
    }

    #[test]
    fn json_round_trip(value in record_strategy(true)) {
        let generator = generator();
        let bundle = generator.bundle("Record").unwrap();
        let json = bundle.to_json(&value).unwrap();
        // wide integers never travel as JSON numbers
        prop_assert!(json["balance"].is_string());
        prop_assert!(json["supply"].is_string());
        let back = bundle.from_json(&json).unwrap();
        prop_assert_eq!(back, value);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let generator = generator();
        for name in ["Record", "Shape"] {
            let bundle = generator.bundle(name).unwrap();
            let _ = bundle.decode(&bytes, generator.registry());
        }
    }

    #[test]
    fn shape_tag_is_first_byte(value in shape_strategy(any::<f64>())) {
        let generator = generator();
        let bundle = generator.bundle("Shape").unwrap();
        let bytes = bundle.encode(&value, generator.registry()).unwrap();
        let Value::Enum(ev) = &value else { unreachable!() };
        prop_assert_eq!(bytes[0], ev.discriminator);
    }
}
