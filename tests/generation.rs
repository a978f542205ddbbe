use idl_typegen::{GenError, Generator, GeneratorConfig};

const IDL: &str = r#"{
    "version": "0.1.0",
    "name": "demo",
    "instructions": [],
    "types": [
        { "name": "Config", "type": { "kind": "struct", "fields": [
            { "name": "authority", "type": "publicKey" },
            { "name": "type", "type": "u8" },
            { "name": "feeBps", "type": "u64" },
            { "name": "modes", "type": { "vec": { "defined": "Mode" } } }
        ] } },
        { "name": "Mode", "type": { "kind": "enum", "variants": [
            { "name": "Off" },
            { "name": "Fixed", "fields": [ { "name": "amount", "type": "u64" } ] },
            { "name": "Nested", "fields": [ { "defined": "Config" } ] }
        ] } }
    ]
}"#;

fn rendered(config: GeneratorConfig) -> idl_typegen::RenderedModules {
    Generator::from_json_str(IDL, config).unwrap().render().unwrap()
}

fn module<'a>(modules: &'a idl_typegen::RenderedModules, type_name: &str) -> &'a str {
    &modules.modules.iter().find(|m| m.type_name == type_name).unwrap().source
}

#[test]
fn struct_module_carries_all_three_records() {
    let out = rendered(GeneratorConfig::default());
    let config = module(&out, "Config");
    for needle in [
        "pub struct ConfigFields {",
        "pub struct ConfigJson {",
        "pub struct Config {",
        "pub r#type: u8,",
        "    #[serde(rename = \"feeBps\")]\n    pub fee_bps: String,",
        "pub modes: Vec<super::mode::ModeKind>,",
        "authority: runtime::parse_public_key(&obj.authority).map_err(|e| e.within(\"authority\"))?,",
        "fee_bps: self.fee_bps.to_string(),",
        "Layout::structure([(\"authority\", Layout::PublicKey), (\"type\", Layout::U8), (\"feeBps\", Layout::U64), (\"modes\", Layout::vec(Layout::defined(\"Mode\")))])",
    ] {
        assert!(config.contains(needle), "missing {needle:?} in\n{config}");
    }
    assert!(config.contains("        Decoded::structure([\n            (\"authority\","));
    assert!(config.contains("        ])\n    }"));
    // serde already strips the `r#` prefix
    assert!(!config.contains("rename = \"type\""));
}

#[test]
fn enum_module_carries_variants_and_unions() {
    let out = rendered(GeneratorConfig::default());
    let mode = module(&out, "Mode");
    for needle in [
        "pub struct Off;",
        "pub struct Fixed {\n    pub amount: u64,\n}",
        "pub struct Nested(pub super::config::Config);",
        "pub enum ModeKind {",
        "pub enum ModeJson {",
        "    Nested((super::config::ConfigJson,)),",
        "runtime::check_single_variant(obj, \"Mode\")?;",
        "    if let Some(val) = obj.variant(\"Off\") {\n        val.to_struct().map_err(|e| e.within(\"Off\"))?;\n        return Ok(ModeKind::Off(Off));\n    }",
        "        Decoded::variant_of(Self::KIND, Decoded::structure([\n            (\"amount\",",
        "ModeJson::Nested((f0,)) => ModeKind::Nested(Nested(super::config::Config::from_json(f0).map_err(|e| e.within(\"Nested._0\"))?)),",
        "pub fn decode(bytes: &[u8]) -> Result<Self, runtime::Error> {",
    ] {
        assert!(mode.contains(needle), "missing {needle:?} in\n{mode}");
    }
    assert!(mode.contains("        ]))\n    }"));
}

#[test]
fn record_literals_close_their_own_brackets() {
    let out = rendered(GeneratorConfig::default());
    for module in &out.modules {
        assert!(!module.source.contains("([ {"), "{}", module.source);
        assert!(!module.source.contains("}])"), "{}", module.source);
    }
}

#[test]
fn runtime_path_is_configurable() {
    let out = rendered(GeneratorConfig { runtime_path: "crate::rt".into(), parallel: false });
    assert!(module(&out, "Mode").contains("use crate::rt::{self, CodecError, ConvertError, Decoded, Layout, PublicKey};"));
    assert!(out.index.contains("pub fn registry() -> &'static crate::rt::LayoutRegistry {"));
}

#[test]
fn modules_are_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let out = rendered(GeneratorConfig::default());
    let written = out.write_to(&dir.path().join("generated")).unwrap();
    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, ["mod.rs", "config.rs", "mode.rs"]);
    let index = std::fs::read_to_string(dir.path().join("generated/mod.rs")).unwrap();
    assert_eq!(index, out.index);
}

#[test]
fn output_is_deterministic() {
    let a = rendered(GeneratorConfig::default());
    let b = rendered(GeneratorConfig::default());
    assert_eq!(a, b);
}

#[test]
fn colliding_member_names_are_rejected() {
    let idl = r#"{ "types": [ { "name": "A", "type": { "kind": "struct", "fields": [
        { "name": "fooBar", "type": "u8" },
        { "name": "foo_bar", "type": "u8" }
    ] } } ] }"#;
    let generator = Generator::from_json_str(idl, GeneratorConfig::default()).unwrap();
    assert!(matches!(generator.render(), Err(GenError::DuplicateField { .. })));
}
