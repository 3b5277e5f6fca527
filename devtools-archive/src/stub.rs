//! Loader stubs placed at the head of the archive.

use chrono::{DateTime, Utc};
use devtools_plugin::PluginDescriptor;

/// Marker PHP looks for to find the end of the stub
pub const HALT_COMPILER: &str = "__HALT_COMPILER();";

/// Produces the stub for one build, branding the default stub with the
/// configured host and builder names.
#[derive(Debug, Clone)]
pub struct StubGenerator {
    host_name: String,
    banner: String,
}

impl StubGenerator {
    pub fn new(host_name: impl Into<String>, banner: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            banner: banner.into(),
        }
    }

    /// Stub that requires the given archive entry when executed
    pub fn entry_stub(entry: &str) -> String {
        format!(
            "<?php require(\"phar://\". __FILE__ .\"/{}\"); {}",
            normalize_entry(entry),
            HALT_COMPILER
        )
    }

    /// Self-describing stub printing the banner and then the archive metadata
    pub fn describe_stub(
        &self,
        descriptor: &PluginDescriptor,
        generated_at: DateTime<Utc>,
    ) -> String {
        format!(
            "<?php echo \"{host} plugin {name} v{version}\\nThis file has been generated using {banner} at {date}\\n----------------\\n\";\
             if(extension_loaded(\"phar\")){{$phar = new \\Phar(__FILE__);\
             foreach($phar->getMetadata() as $key => $value){{\
             echo ucfirst($key).\": \".(is_array($value) ? implode(\", \", $value):$value).\"\\n\";}}}} {halt}",
            host = escape_double_quoted(&self.host_name),
            name = escape_double_quoted(descriptor.name()),
            version = escape_double_quoted(descriptor.version()),
            banner = escape_double_quoted(&self.banner),
            date = generated_at.to_rfc2822(),
            halt = HALT_COMPILER,
        )
    }
}

/// Convert separators to `/` and apply PHP `addslashes`
pub fn normalize_entry(entry: &str) -> String {
    addslashes(&entry.replace('\\', "/"))
}

fn addslashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

// Inside "..." PHP interpolates `$` and treats `\` as an escape
fn escape_double_quoted(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
