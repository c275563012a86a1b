//! Chunk metadata assembly.
//!
//! Every stored chunk carries a JSON metadata map that denormalizes the
//! owning document's attributes, so retrieval can filter without joining
//! back to the documents table. The document reference itself is weak:
//! `doc_id` is a stringified id inside the map, not a foreign key.
//!
//! Well-known keys are protected from caller-supplied `extra` entries,
//! with one exception: an `extra` entry named `visibility` intentionally
//! overrides the document-level visibility for all of its chunks.

use serde_json::{Map, Value};

use crate::models::Document;

pub const META_DOC_ID: &str = "doc_id";
pub const META_TYPE: &str = "type";
pub const META_DOMAIN_KEY: &str = "domain_key";
pub const META_LANGUAGE_KEY: &str = "language_key";
pub const META_AUTHOR_ID: &str = "author_id";
pub const META_SOURCE: &str = "source";
pub const META_VISIBILITY: &str = "visibility";
pub const META_CHUNK_INDEX: &str = "chunk_index";

/// Source label used when the document does not carry one.
pub const DEFAULT_SOURCE: &str = "contribution";

/// Keys owned by the pipeline; extras may not shadow them (except
/// `visibility`, see module docs).
pub fn is_reserved_key(key: &str) -> bool {
    matches!(
        key,
        META_DOC_ID
            | META_TYPE
            | META_DOMAIN_KEY
            | META_LANGUAGE_KEY
            | META_AUTHOR_ID
            | META_SOURCE
            | META_VISIBILITY
            | META_CHUNK_INDEX
    )
}

/// Build the metadata map for chunk number `chunk_index` of `doc`.
///
/// Ids are stringified: they may originate as numeric or big-integer
/// types upstream, and the stored form must compare as a string.
pub fn chunk_metadata(doc: &Document, chunk_index: usize) -> Value {
    let mut map = Map::new();
    map.insert(META_DOC_ID.into(), Value::String(doc.id.to_string()));
    map.insert(META_TYPE.into(), Value::String(doc.kind.as_str().into()));
    map.insert(
        META_DOMAIN_KEY.into(),
        doc.domain_key
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    map.insert(
        META_LANGUAGE_KEY.into(),
        doc.language
            .map(|l| Value::String(l.as_str().into()))
            .unwrap_or(Value::Null),
    );
    map.insert(
        META_AUTHOR_ID.into(),
        doc.author_id
            .map(|a| Value::String(a.to_string()))
            .unwrap_or(Value::Null),
    );
    map.insert(
        META_SOURCE.into(),
        Value::String(
            doc.source
                .clone()
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        ),
    );
    map.insert(
        META_VISIBILITY.into(),
        Value::String(doc.visibility.as_str().into()),
    );
    map.insert(META_CHUNK_INDEX.into(), Value::from(chunk_index as u64));

    for (key, value) in &doc.extra {
        if is_reserved_key(key) && key != META_VISIBILITY {
            continue;
        }
        map.insert(key.clone(), Value::from(value));
    }

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, Document, ExtraMap, ExtraValue, Language, Visibility};

    fn doc() -> Document {
        Document {
            id: 42,
            text: "body".into(),
            kind: ContentKind::Interview,
            domain_key: Some("health".into()),
            language: Some(Language::En),
            author_id: Some(9),
            source: None,
            extra: ExtraMap::new(),
            visibility: Visibility::Private,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn base_keys_are_present_and_ids_stringified() {
        let meta = chunk_metadata(&doc(), 3);
        assert_eq!(meta[META_DOC_ID], serde_json::json!("42"));
        assert_eq!(meta[META_TYPE], serde_json::json!("interview"));
        assert_eq!(meta[META_DOMAIN_KEY], serde_json::json!("health"));
        assert_eq!(meta[META_LANGUAGE_KEY], serde_json::json!("en"));
        assert_eq!(meta[META_AUTHOR_ID], serde_json::json!("9"));
        assert_eq!(meta[META_CHUNK_INDEX], serde_json::json!(3));
        assert_eq!(meta[META_VISIBILITY], serde_json::json!("private"));
    }

    #[test]
    fn missing_source_defaults_to_contribution() {
        let meta = chunk_metadata(&doc(), 0);
        assert_eq!(meta[META_SOURCE], serde_json::json!("contribution"));

        let mut with_source = doc();
        with_source.source = Some("import".into());
        let meta = chunk_metadata(&with_source, 0);
        assert_eq!(meta[META_SOURCE], serde_json::json!("import"));
    }

    #[test]
    fn extras_flow_through() {
        let mut d = doc();
        d.extra
            .insert("campaign".into(), ExtraValue::String("q3".into()));
        d.extra.insert("priority".into(), ExtraValue::Number(2.0));
        let meta = chunk_metadata(&d, 0);
        assert_eq!(meta["campaign"], serde_json::json!("q3"));
        assert_eq!(meta["priority"], serde_json::json!(2.0));
    }

    #[test]
    fn reserved_keys_cannot_be_shadowed() {
        let mut d = doc();
        d.extra
            .insert(META_DOC_ID.into(), ExtraValue::String("999".into()));
        d.extra
            .insert(META_CHUNK_INDEX.into(), ExtraValue::Number(7.0));
        let meta = chunk_metadata(&d, 1);
        assert_eq!(meta[META_DOC_ID], serde_json::json!("42"));
        assert_eq!(meta[META_CHUNK_INDEX], serde_json::json!(1));
    }

    #[test]
    fn extra_visibility_overrides_document_visibility() {
        let mut d = doc();
        d.extra
            .insert(META_VISIBILITY.into(), ExtraValue::String("public".into()));
        let meta = chunk_metadata(&d, 0);
        assert_eq!(meta[META_VISIBILITY], serde_json::json!("public"));
    }

    #[test]
    fn absent_optionals_are_null_not_missing() {
        let mut d = doc();
        d.domain_key = None;
        d.language = None;
        d.author_id = None;
        let meta = chunk_metadata(&d, 0);
        assert_eq!(meta[META_DOMAIN_KEY], Value::Null);
        assert_eq!(meta[META_LANGUAGE_KEY], Value::Null);
        assert_eq!(meta[META_AUTHOR_ID], Value::Null);
    }
}
