//! Core data models for contributed documents.
//!
//! A [`Document`] is the system of record for one piece of contributed
//! knowledge. Chunks derived from it are disposable (see the `store`
//! module) and reference the document only through a stringified id in
//! their metadata, never a foreign key.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Content-type tag of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Survey,
    Interview,
    Review,
    Doc,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Survey => "survey",
            ContentKind::Interview => "interview",
            ContentKind::Review => "review",
            ContentKind::Doc => "doc",
        }
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "survey" => Ok(ContentKind::Survey),
            "interview" => Ok(ContentKind::Interview),
            "review" => Ok(ContentKind::Review),
            "doc" => Ok(ContentKind::Doc),
            other => Err(Error::validation(format!(
                "unknown content kind '{other}' (expected survey, interview, review, or doc)"
            ))),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Id,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Id => "id",
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "en" => Ok(Language::En),
            "id" => Ok(Language::Id),
            other => Err(Error::validation(format!(
                "unknown language '{other}' (expected en or id)"
            ))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a contribution is visible beyond its author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(Error::validation(format!(
                "unknown visibility '{other}' (expected public or private)"
            ))),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value allowed in the free-form `extra` metadata map.
///
/// The closed union keeps caller-supplied metadata typed while still
/// round-tripping through plain JSON (untagged representation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Number(f64),
    String(String),
    Object(BTreeMap<String, ExtraValue>),
}

impl From<&ExtraValue> for serde_json::Value {
    fn from(value: &ExtraValue) -> Self {
        match value {
            ExtraValue::Bool(b) => serde_json::Value::Bool(*b),
            ExtraValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ExtraValue::String(s) => serde_json::Value::String(s.clone()),
            ExtraValue::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Caller-supplied free-form metadata attached to a document.
pub type ExtraMap = BTreeMap<String, ExtraValue>;

/// A contributed document: the system of record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub text: String,
    pub kind: ContentKind,
    pub domain_key: Option<String>,
    pub language: Option<Language>,
    pub author_id: Option<i64>,
    pub source: Option<String>,
    pub extra: ExtraMap,
    pub visibility: Visibility,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub updated_at: i64,
}

/// Payload for creating a document. Anonymous contributions (no
/// `author_id`) are accepted by ingestion but cannot be listed, read
/// back, updated, or deleted, since those operations scope by author.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub text: String,
    pub kind: ContentKind,
    pub domain_key: Option<String>,
    pub language: Option<Language>,
    pub author_id: Option<i64>,
    pub source: Option<String>,
    pub extra: ExtraMap,
    pub visibility: Visibility,
}

impl NewDocument {
    pub fn new(text: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            text: text.into(),
            kind,
            domain_key: None,
            language: None,
            author_id: None,
            source: None,
            extra: ExtraMap::new(),
            visibility: Visibility::default(),
        }
    }

    #[must_use]
    pub fn with_domain_key(mut self, domain_key: impl Into<String>) -> Self {
        self.domain_key = Some(domain_key.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    #[must_use]
    pub fn with_author_id(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = extra;
        self
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Partial update payload. A `None` field retains the stored value;
/// there is no way to clear a nullable field back to `NULL`.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub text: Option<String>,
    pub kind: Option<ContentKind>,
    pub domain_key: Option<String>,
    pub language: Option<Language>,
    pub source: Option<String>,
    pub extra: Option<ExtraMap>,
    pub visibility: Option<Visibility>,
}

impl DocumentPatch {
    /// Merge this patch into `doc`, leaving unspecified fields alone.
    pub fn apply_to(&self, doc: &mut Document) {
        if let Some(text) = &self.text {
            doc.text = text.clone();
        }
        if let Some(kind) = self.kind {
            doc.kind = kind;
        }
        if let Some(domain_key) = &self.domain_key {
            doc.domain_key = Some(domain_key.clone());
        }
        if let Some(language) = self.language {
            doc.language = Some(language);
        }
        if let Some(source) = &self.source {
            doc.source = Some(source.clone());
        }
        if let Some(extra) = &self.extra {
            doc.extra = extra.clone();
        }
        if let Some(visibility) = self.visibility {
            doc.visibility = visibility;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            ContentKind::Survey,
            ContentKind::Interview,
            ContentKind::Review,
            ContentKind::Doc,
        ] {
            assert_eq!(kind.as_str().parse::<ContentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        let err = "podcast".parse::<ContentKind>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn visibility_defaults_to_private() {
        let doc = NewDocument::new("hello", ContentKind::Doc);
        assert_eq!(doc.visibility, Visibility::Private);
    }

    #[test]
    fn extra_value_serializes_untagged() {
        let mut map = ExtraMap::new();
        map.insert("flag".into(), ExtraValue::Bool(true));
        map.insert("weight".into(), ExtraValue::Number(2.5));
        map.insert("label".into(), ExtraValue::String("x".into()));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["flag"], serde_json::json!(true));
        assert_eq!(json["weight"], serde_json::json!(2.5));
        assert_eq!(json["label"], serde_json::json!("x"));
    }

    #[test]
    fn patch_merges_only_specified_fields() {
        let mut doc = Document {
            id: 1,
            text: "old".into(),
            kind: ContentKind::Survey,
            domain_key: Some("health".into()),
            language: Some(Language::En),
            author_id: Some(7),
            source: None,
            extra: ExtraMap::new(),
            visibility: Visibility::Private,
            created_at: 0,
            updated_at: 0,
        };
        let patch = DocumentPatch {
            text: Some("new".into()),
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        patch.apply_to(&mut doc);
        assert_eq!(doc.text, "new");
        assert_eq!(doc.visibility, Visibility::Public);
        assert_eq!(doc.kind, ContentKind::Survey);
        assert_eq!(doc.domain_key.as_deref(), Some("health"));
    }
}
