pub mod descriptor;
pub mod parser;

pub use descriptor::{sanitize_name, CommandDefinition, LoadOrder, PluginDescriptor};
pub use parser::DescriptorParser;
