use serde::Deserialize;
use std::collections::BTreeMap;

/// How an anchor string is compared against paragraph text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Substring containment.
    #[default]
    Contains,
    /// Whole-paragraph equality.
    Exact,
}

impl MatchMode {
    /// Parse a user-supplied mode name. Surrounding whitespace and letter
    /// case are ignored; anything else is rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contains" => Ok(MatchMode::Contains),
            "exact" => Ok(MatchMode::Exact),
            _ => Err(format!("unsupported match mode: {raw}")),
        }
    }

    pub fn matches(self, text: &str, needle: &str) -> bool {
        match self {
            MatchMode::Contains => text.contains(needle),
            MatchMode::Exact => text == needle,
        }
    }
}

fn deserialize_match_mode<'de, D>(deserializer: D) -> Result<MatchMode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(MatchMode::default()),
        Some(value) => MatchMode::parse(&value).map_err(serde::de::Error::custom),
    }
}

/// One tracked replacement: where to apply it, what to write, and why.
#[derive(Debug, Clone, Deserialize)]
pub struct Patch {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub anchor: String,
    #[serde(default, deserialize_with = "deserialize_match_mode")]
    pub anchor_match: MatchMode,
    /// Optional filter on the question paragraph preceding the anchor.
    #[serde(default)]
    pub question_anchor: Option<String>,
    #[serde(default, deserialize_with = "deserialize_match_mode")]
    pub question_match: MatchMode,
    #[serde(default)]
    pub replacement: String,
    #[serde(default)]
    pub reason: String,
}

/// A complete revision plan: the patches plus the citation text for every
/// new footnote key the replacements may reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchPlan {
    #[serde(default)]
    pub patches: Vec<Patch>,
    #[serde(default)]
    pub footnote_sources: BTreeMap<String, String>,
}

impl PatchPlan {
    /// Trim the fields that are compared as identifiers. Anchors and
    /// replacements keep their whitespace; it is significant there.
    pub fn normalize(&mut self) {
        for patch in &mut self.patches {
            patch.label = patch.label.trim().to_string();
            patch.reason = patch.reason.trim().to_string();
            patch.question_anchor = patch
                .question_anchor
                .take()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty());
        }
    }
}
