use devtools_core::DevToolsError;
use devtools_plugin::{DescriptorParser, LoadOrder};

const FULL_DESCRIPTOR: &str = r#"
name: "My Plugin!@#"
version: 1.2.0
main: author\myplugin\Main
api:
  - 3.0.0
  - 4.0.0
load: startup
author: Alice
authors:
  - Bob
  - Carol
description: Does useful things
website: https://example.org
prefix: MP
depend: [EconomyAPI]
softdepend: PurePerms
loadbefore:
  - WorldGuard
commands:
  heal:
    description: Heal a player
    usage: /heal [player]
    permission: myplugin.heal
    aliases: h
  fly:
    aliases: [f, soar]
  ping: ~
unknown_key: ignored
"#;

fn field_of(err: &DevToolsError) -> Option<&str> {
    match err {
        DevToolsError::InvalidDescriptor { field, .. } => Some(field.as_str()),
        _ => None,
    }
}

#[test]
fn test_full_descriptor() {
    let descriptor = DescriptorParser::default()
        .parse(FULL_DESCRIPTOR)
        .expect("full descriptor should parse");

    assert_eq!(descriptor.name(), "My_Plugin");
    assert_eq!(descriptor.version(), "1.2.0");
    assert_eq!(descriptor.main(), "author\\myplugin\\Main");
    assert_eq!(descriptor.compatible_apis(), ["3.0.0", "4.0.0"]);
    assert_eq!(descriptor.load_order(), LoadOrder::Startup);
    assert_eq!(descriptor.authors(), ["Alice", "Bob", "Carol"]);
    assert_eq!(descriptor.description(), Some("Does useful things"));
    assert_eq!(descriptor.website(), Some("https://example.org"));
    assert_eq!(descriptor.prefix(), Some("MP"));
    assert!(descriptor.depend().contains("EconomyAPI"));
    assert!(descriptor.soft_depend().contains("PurePerms"));
    assert!(descriptor.load_before().contains("WorldGuard"));

    let commands: Vec<&String> = descriptor.commands().keys().collect();
    assert_eq!(commands, ["heal", "fly", "ping"]);
    let heal = &descriptor.commands()["heal"];
    assert_eq!(heal.usage.as_deref(), Some("/heal [player]"));
    assert_eq!(heal.aliases, ["h"]);
    assert_eq!(descriptor.commands()["fly"].aliases, ["f", "soar"]);
    assert_eq!(descriptor.commands()["ping"].description, None);
}

#[test]
fn test_each_required_key_is_enforced() {
    let complete = [
        ("name", "name: Example"),
        ("version", "version: 1.0.0"),
        ("main", "main: example\\Main"),
        ("api", "api: 3.0.0"),
    ];

    for (dropped, _) in &complete {
        let yaml: String = complete
            .iter()
            .filter(|(key, _)| key != dropped)
            .map(|(_, line)| format!("{}\n", line))
            .collect();

        let err = DescriptorParser::default()
            .parse(&yaml)
            .expect_err("descriptor without a required key must fail");
        assert_eq!(field_of(&err), Some(*dropped), "dropped {}", dropped);
    }
}

#[test]
fn test_name_without_allowed_characters() {
    let yaml = "name: \"!!!\"\nversion: 1\nmain: a\\B\napi: 1\n";
    let err = DescriptorParser::default()
        .parse(yaml)
        .expect_err("name should be rejected");
    assert_eq!(field_of(&err), Some("name"));
}

#[test]
fn test_reserved_namespace_is_case_insensitive() {
    let parser = DescriptorParser::new("examplehost\\");
    for main in ["examplehost\\Foo", "ExampleHost\\Foo", "EXAMPLEHOST\\plugin\\Main"] {
        let yaml = format!("name: Valid\nversion: 1\nmain: '{}'\napi: 1\n", main);
        let err = parser.parse(&yaml).expect_err("reserved namespace must be rejected");
        assert_eq!(field_of(&err), Some("main"));
    }

    let allowed = "name: Valid\nversion: 1\nmain: examplehostile\\Foo\napi: 1\n";
    assert!(parser.parse(allowed).is_ok());
}

#[test]
fn test_default_reserved_namespace_is_pocketmine() {
    let yaml = "name: Sneaky\nversion: 1\nmain: PocketMine\\Server\napi: 1\n";
    let err = DescriptorParser::default()
        .parse(yaml)
        .expect_err("pocketmine namespace must be rejected");
    assert_eq!(field_of(&err), Some("main"));
}

#[test]
fn test_malformed_command_definition() {
    let yaml = "name: N\nversion: 1\nmain: a\\B\napi: 1\ncommands:\n  heal: [1, 2]\n";
    let err = DescriptorParser::default()
        .parse(yaml)
        .expect_err("sequence command body should fail");
    assert_eq!(field_of(&err), Some("commands.heal"));
}

#[test]
fn test_non_mapping_commands_are_ignored() {
    let yaml = "name: N\nversion: 1\nmain: a\\B\napi: 1\ncommands: nope\n";
    let descriptor = DescriptorParser::default()
        .parse(yaml)
        .expect("scalar commands are treated as absent");
    assert!(descriptor.commands().is_empty());
}
