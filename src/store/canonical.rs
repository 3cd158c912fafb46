//! Canonical serialization and content hashing
//!
//! Every artifact hash in the crate is computed the same way: serialize to
//! canonical JSON (sorted object keys, compact separators, UTF-8), then
//! SHA-256 over those bytes. Files on disk may be pretty-printed; hashes
//! never depend on file formatting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Version of the feature row schema. Bump when `FeatureRow` fields change.
pub const SCHEMA_VERSION: u32 = 1;

/// Canonical JSON for any serializable value.
///
/// Round-tripping through `serde_json::Value` sorts map keys; array and
/// struct field order is preserved as declared.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&value)?)
}

/// Hash canonical bytes into the house format `sha256-<hex>`.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonical_json(value)?;
    Ok(hash_bytes(canonical.as_bytes()))
}

pub(crate) fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("sha256-{}", hex::encode(&result[..16]))
}

/// One field of the feature row schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub dtype: String,
}

/// Ordered field descriptor list for `FeatureRow`, the unit of schema
/// compatibility between datasets and models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub schema_version: u32,
    pub fields: Vec<FieldDescriptor>,
}

impl FeatureSchema {
    /// Descriptor of the schema this build of the crate produces.
    pub fn current() -> Self {
        let fields = [
            ("id", "string"),
            ("duration_min", "int"),
            ("duration_bucket", "string"),
            ("start_hour", "int"),
            ("weekday", "int"),
            ("is_weekend", "bool"),
            ("notes_len", "int"),
            ("notes_len_bucket", "string"),
            ("has_incidents", "bool"),
            ("status_norm", "string"),
            ("is_suspicious", "bool"),
            ("start_ts", "int?"),
        ]
        .into_iter()
        .map(|(name, dtype)| FieldDescriptor {
            name: name.to_string(),
            dtype: dtype.to_string(),
        })
        .collect();
        FeatureSchema {
            schema_version: SCHEMA_VERSION,
            fields,
        }
    }

    /// Hash of the ordered descriptor list.
    pub fn hash(&self) -> Result<String> {
        content_hash(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&a).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_canonical_json_preserves_array_order() {
        let value: serde_json::Value = serde_json::from_str("[3, 1, 2]").unwrap();
        assert_eq!(canonical_json(&value).unwrap(), "[3,1,2]");
    }

    #[test]
    fn test_content_hash_format() {
        let hash = content_hash(&vec![1, 2, 3]).unwrap();
        assert!(hash.starts_with("sha256-"));
        // 16 bytes of digest, hex encoded.
        assert_eq!(hash.len(), "sha256-".len() + 32);
    }

    #[test]
    fn test_content_hash_key_order_invariant() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x": 1, "y": [1, 2]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y": [1, 2], "x": 1}"#).unwrap();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_content_hash_differs_on_content() {
        let a = content_hash(&"uno").unwrap();
        let b = content_hash(&"dos").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_schema_current_shape() {
        let schema = FeatureSchema::current();
        assert_eq!(schema.schema_version, SCHEMA_VERSION);
        assert_eq!(schema.fields.len(), 12);
        assert_eq!(schema.fields[0].name, "id");
        assert_eq!(schema.fields[11].name, "start_ts");
    }

    #[test]
    fn test_schema_hash_is_stable() {
        let a = FeatureSchema::current().hash().unwrap();
        let b = FeatureSchema::current().hash().unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256-"));
    }

    #[test]
    fn test_schema_hash_tracks_field_changes() {
        let current = FeatureSchema::current();
        let mut renamed = current.clone();
        renamed.fields[0].name = "uuid".to_string();
        assert_ne!(current.hash().unwrap(), renamed.hash().unwrap());

        let mut reordered = current.clone();
        reordered.fields.swap(0, 1);
        assert_ne!(current.hash().unwrap(), reordered.hash().unwrap());
    }
}
