use devtools_core::error::Result;
use serde::Deserialize;

/// One search hit: the resource and the version to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub resource_id: String,
    pub version_id: String,
}

impl Candidate {
    pub fn new(resource_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            version_id: version_id.into(),
        }
    }
}

/// Remote source of plugin archives
pub trait PluginRepository {
    /// Every candidate whose name matches `name`
    fn search(&self, name: &str) -> Result<Vec<Candidate>>;

    /// The archive bytes for `candidate`
    fn download(&self, candidate: &Candidate) -> Result<Vec<u8>>;
}

impl<R: PluginRepository + ?Sized> PluginRepository for &R {
    fn search(&self, name: &str) -> Result<Vec<Candidate>> {
        (**self).search(name)
    }

    fn download(&self, candidate: &Candidate) -> Result<Vec<u8>> {
        (**self).download(candidate)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "plugin-suggest", default)]
    suggest: Option<Vec<Suggestion>>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    options: Option<Vec<SuggestOption>>,
}

#[derive(Debug, Deserialize)]
struct SuggestOption {
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    resource_id: Identifier,
    current_version_id: Identifier,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Identifier {
    Number(serde_json::Number),
    Text(String),
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        match id {
            Identifier::Number(n) => n.to_string(),
            Identifier::Text(s) => s,
        }
    }
}

/// Parse an autocomplete response body.
///
/// Only the first suggestion group is considered. A missing group or option
/// list means no candidates.
pub fn parse_search_response(body: &str) -> Result<Vec<Candidate>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let options = response
        .suggest
        .and_then(|groups| groups.into_iter().next())
        .and_then(|group| group.options)
        .unwrap_or_default();

    Ok(options
        .into_iter()
        .map(|option| Candidate {
            resource_id: option.payload.resource_id.into(),
            version_id: option.payload.current_version_id.into(),
        })
        .collect())
}
