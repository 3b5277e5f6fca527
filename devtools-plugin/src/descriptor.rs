use indexmap::{IndexMap, IndexSet};

/// When the host enables a plugin relative to world loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOrder {
    Startup = 0,
    #[default]
    PostWorld = 1,
}

impl LoadOrder {
    /// Case-insensitive match on the `load` keyword; anything other than
    /// `STARTUP` means post-world.
    pub fn from_keyword(keyword: &str) -> Self {
        if keyword.trim().eq_ignore_ascii_case("STARTUP") {
            LoadOrder::Startup
        } else {
            LoadOrder::PostWorld
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A command declared under `commands:`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandDefinition {
    pub description: Option<String>,
    pub usage: Option<String>,
    pub permission: Option<String>,
    pub permission_message: Option<String>,
    pub aliases: Vec<String>,
}

/// Validated plugin descriptor.
///
/// Built once by [`crate::DescriptorParser`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) main: String,
    pub(crate) api: Vec<String>,
    pub(crate) commands: IndexMap<String, CommandDefinition>,
    pub(crate) depend: IndexSet<String>,
    pub(crate) soft_depend: IndexSet<String>,
    pub(crate) load_before: IndexSet<String>,
    pub(crate) description: Option<String>,
    pub(crate) website: Option<String>,
    pub(crate) authors: Vec<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) load_order: LoadOrder,
}

impl PluginDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `"<name> v<version>"`
    pub fn full_name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn compatible_apis(&self) -> &[String] {
        &self.api
    }

    pub fn commands(&self) -> &IndexMap<String, CommandDefinition> {
        &self.commands
    }

    pub fn depend(&self) -> &IndexSet<String> {
        &self.depend
    }

    pub fn soft_depend(&self) -> &IndexSet<String> {
        &self.soft_depend
    }

    pub fn load_before(&self) -> &IndexSet<String> {
        &self.load_before
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn load_order(&self) -> LoadOrder {
        self.load_order
    }
}

/// Strip everything outside `[A-Za-z0-9 _.-]`, then turn spaces into
/// underscores. Returns `None` when nothing usable is left.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-'))
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.replace(' ', "_"))
    }
}
