use chrono::{DateTime, Utc};
use devtools_plugin::PluginDescriptor;

use crate::php_serde::{PhpKey, PhpValue};

/// The record embedded in the archive and returned by the host's
/// `Phar::getMetadata()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMetadata {
    pub name: String,
    pub version: String,
    pub main: String,
    pub api: Vec<String>,
    pub depend: Vec<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub website: Option<String>,
    pub creation_date: i64,
}

impl ArchiveMetadata {
    pub fn from_descriptor(descriptor: &PluginDescriptor, created_at: DateTime<Utc>) -> Self {
        Self {
            name: descriptor.name().to_string(),
            version: descriptor.version().to_string(),
            main: descriptor.main().to_string(),
            api: descriptor.compatible_apis().to_vec(),
            depend: descriptor.depend().iter().cloned().collect(),
            description: descriptor.description().map(str::to_string),
            authors: descriptor.authors().to_vec(),
            website: descriptor.website().map(str::to_string),
            creation_date: created_at.timestamp(),
        }
    }

    /// Key order matches what the host prints back
    pub fn to_php_value(&self) -> PhpValue {
        let field = |key: &str, value: PhpValue| (PhpKey::Str(key.to_string()), value);
        PhpValue::Array(vec![
            field("name", PhpValue::from(&self.name)),
            field("version", PhpValue::from(&self.version)),
            field("main", PhpValue::from(&self.main)),
            field("api", PhpValue::list(&self.api)),
            field("depend", PhpValue::list(&self.depend)),
            field("description", PhpValue::from(self.description.as_deref())),
            field("authors", PhpValue::list(&self.authors)),
            field("website", PhpValue::from(self.website.as_deref())),
            field("creationDate", PhpValue::Int(self.creation_date)),
        ])
    }
}

/// Render metadata as `Key: value` lines, the same output the default stub
/// produces when run.
pub fn describe_lines(metadata: &PhpValue) -> Vec<String> {
    match metadata {
        PhpValue::Array(pairs) => pairs
            .iter()
            .map(|(key, value)| {
                let key = match key {
                    PhpKey::Str(s) => ucfirst(s),
                    PhpKey::Int(i) => i.to_string(),
                };
                format!("{}: {}", key, value.display())
            })
            .collect(),
        other => vec![other.display()],
    }
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use devtools_plugin::DescriptorParser;

    fn metadata() -> ArchiveMetadata {
        let descriptor = DescriptorParser::default()
            .parse(
                "name: Example\nversion: 1.0.0\nmain: ex\\Main\napi: [3.0.0, 4.0.0]\n\
                 author: Alice\ndepend: [EconomyAPI]\n",
            )
            .expect("valid descriptor");
        let created = Utc.timestamp_opt(1_700_000_000, 0).single().expect("timestamp");
        ArchiveMetadata::from_descriptor(&descriptor, created)
    }

    #[test]
    fn test_serialized_key_order_and_nulls() {
        let serialized = metadata().to_php_value().serialize();
        assert!(serialized.starts_with("a:9:{s:4:\"name\";s:7:\"Example\";s:7:\"version\";"));
        assert!(serialized.contains("s:11:\"description\";N;"));
        assert!(serialized.contains("s:7:\"website\";N;"));
        assert!(serialized.ends_with("s:12:\"creationDate\";i:1700000000;}"));
    }

    #[test]
    fn test_describe_lines() {
        let lines = describe_lines(&metadata().to_php_value());
        assert_eq!(lines[0], "Name: Example");
        assert_eq!(lines[3], "Api: 3.0.0, 4.0.0");
        assert_eq!(lines[4], "Depend: EconomyAPI");
        assert_eq!(lines[5], "Description: ");
        assert_eq!(lines[6], "Authors: Alice");
        assert_eq!(lines[8], "CreationDate: 1700000000");
    }
}
