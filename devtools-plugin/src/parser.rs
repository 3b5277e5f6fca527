//! plugin.yml parsing
//!
//! The YAML document is read into a generic value first and every field is
//! extracted explicitly, so missing or mistyped keys surface as
//! `InvalidDescriptor` with the offending field name.

use devtools_core::error::{DevToolsError, Result};
use devtools_core::BuilderConfig;
use indexmap::{IndexMap, IndexSet};
use serde_yaml_ng::{Mapping, Value};
use tracing::debug;

use crate::descriptor::{sanitize_name, CommandDefinition, LoadOrder, PluginDescriptor};

/// Parses descriptor documents against one host's reserved namespace
#[derive(Debug, Clone)]
pub struct DescriptorParser {
    reserved_namespace: String,
}

impl Default for DescriptorParser {
    fn default() -> Self {
        Self::new(BuilderConfig::default().reserved_namespace)
    }
}

impl DescriptorParser {
    pub fn new(reserved_namespace: impl Into<String>) -> Self {
        Self {
            reserved_namespace: reserved_namespace.into(),
        }
    }

    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(config.reserved_namespace.clone())
    }

    pub fn parse_bytes(&self, raw: &[u8]) -> Result<PluginDescriptor> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            DevToolsError::invalid_descriptor("document", format!("not valid UTF-8: {}", e))
        })?;
        self.parse(text)
    }

    pub fn parse(&self, text: &str) -> Result<PluginDescriptor> {
        let document: Value = serde_yaml_ng::from_str(text)?;
        let map = match document {
            Value::Mapping(map) => map,
            _ => {
                return Err(DevToolsError::invalid_descriptor(
                    "document",
                    "expected a mapping of descriptor keys",
                ))
            }
        };

        let raw_name = required_scalar(&map, "name")?;
        let name = sanitize_name(&raw_name).ok_or_else(|| {
            DevToolsError::invalid_descriptor("name", "no usable characters left after sanitizing")
        })?;

        let version = required_scalar(&map, "version")?;
        let main = required_scalar(&map, "main")?;
        let api = match map.get("api") {
            None | Some(Value::Null) => return Err(missing("api")),
            Some(value) => string_list(value, "api")?,
        };

        if !self.reserved_namespace.is_empty()
            && main
                .to_lowercase()
                .starts_with(&self.reserved_namespace.to_lowercase())
        {
            return Err(DevToolsError::invalid_descriptor(
                "main",
                format!(
                    "'{}' cannot start within the reserved {} namespace",
                    main, self.reserved_namespace
                ),
            ));
        }

        let commands = match map.get("commands") {
            Some(Value::Mapping(commands)) => parse_commands(commands)?,
            _ => IndexMap::new(),
        };

        let mut authors = Vec::new();
        if let Some(author) = optional_scalar(&map, "author")? {
            authors.push(author);
        }
        if let Some(value) = map.get("authors") {
            authors.extend(string_list(value, "authors")?);
        }

        let load_order = optional_scalar(&map, "load")?
            .map(|keyword| LoadOrder::from_keyword(&keyword))
            .unwrap_or_default();

        let descriptor = PluginDescriptor {
            name,
            version,
            main,
            api,
            commands,
            depend: string_set(&map, "depend")?,
            soft_depend: string_set(&map, "softdepend")?,
            load_before: string_set(&map, "loadbefore")?,
            description: optional_scalar(&map, "description")?,
            website: optional_scalar(&map, "website")?,
            authors,
            prefix: optional_scalar(&map, "prefix")?,
            load_order,
        };

        debug!(
            plugin = %descriptor.full_name(),
            depend = descriptor.depend.len(),
            softdepend = descriptor.soft_depend.len(),
            "Parsed plugin descriptor"
        );
        Ok(descriptor)
    }
}

fn missing(field: &str) -> DevToolsError {
    DevToolsError::invalid_descriptor(field, "missing required key")
}

/// Render a YAML scalar the way the host would read it as a string
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_scalar(map: &Mapping, field: &str) -> Result<String> {
    match map.get(field) {
        None | Some(Value::Null) => Err(missing(field)),
        Some(value) => scalar_to_string(value)
            .ok_or_else(|| DevToolsError::invalid_descriptor(field, "expected a scalar value")),
    }
}

fn optional_scalar(map: &Mapping, field: &str) -> Result<Option<String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value)
            .map(Some)
            .ok_or_else(|| DevToolsError::invalid_descriptor(field, "expected a scalar value")),
    }
}

/// A scalar becomes a one-element list; null becomes empty
fn string_list(value: &Value, field: &str) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_to_string(item).ok_or_else(|| {
                    DevToolsError::invalid_descriptor(field, "list entries must be scalars")
                })
            })
            .collect(),
        other => scalar_to_string(other).map(|s| vec![s]).ok_or_else(|| {
            DevToolsError::invalid_descriptor(field, "expected a scalar or a list")
        }),
    }
}

fn string_set(map: &Mapping, field: &str) -> Result<IndexSet<String>> {
    match map.get(field) {
        None => Ok(IndexSet::new()),
        Some(value) => Ok(string_list(value, field)?.into_iter().collect()),
    }
}

fn parse_commands(commands: &Mapping) -> Result<IndexMap<String, CommandDefinition>> {
    let mut parsed = IndexMap::with_capacity(commands.len());

    for (key, value) in commands {
        let name = scalar_to_string(key).ok_or_else(|| {
            DevToolsError::invalid_descriptor("commands", "command names must be scalars")
        })?;
        let field = format!("commands.{}", name);

        let definition = match value {
            Value::Null => CommandDefinition::default(),
            Value::Mapping(body) => CommandDefinition {
                description: optional_scalar(body, "description")
                    .map_err(|_| DevToolsError::invalid_descriptor(&field, "bad description"))?,
                usage: optional_scalar(body, "usage")
                    .map_err(|_| DevToolsError::invalid_descriptor(&field, "bad usage"))?,
                permission: optional_scalar(body, "permission")
                    .map_err(|_| DevToolsError::invalid_descriptor(&field, "bad permission"))?,
                permission_message: optional_scalar(body, "permission-message").map_err(
                    |_| DevToolsError::invalid_descriptor(&field, "bad permission-message"),
                )?,
                aliases: match body.get("aliases") {
                    Some(aliases) => string_list(aliases, &field)?,
                    None => Vec::new(),
                },
            },
            _ => {
                return Err(DevToolsError::invalid_descriptor(
                    field,
                    "command definition must be a mapping",
                ))
            }
        };

        parsed.insert(name, definition);
    }

    Ok(parsed)
}
