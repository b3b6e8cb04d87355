//! Cache key codec.
//!
//! A key is `{video_id}_{language}_{source}` followed by `_{name}={value}` for
//! every extra parameter, sorted by name. Fields may not contain `_`, so a key
//! always splits back into exactly the fields it was built from.

use std::collections::BTreeMap;

use super::CacheError;

/// Separator between key fields
pub const SEPARATOR: char = '_';

/// Map source aliases onto the token used in keys.
///
/// `auto_generated` contains the separator, so it is stored as `automatic`.
pub fn normalize_source(source: &str) -> &str {
    match source {
        "auto_generated" => "automatic",
        other => other,
    }
}

/// The identity fields of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub video_id: String,
    pub language: String,
    pub source: String,
    pub extra: BTreeMap<String, String>,
}

fn check_field(field: &str, value: &str, allow_empty: bool) -> Result<(), CacheError> {
    if (!allow_empty && value.is_empty()) || value.contains(SEPARATOR) {
        return Err(CacheError::InvalidKeyField {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

impl CacheKey {
    pub fn new(
        video_id: impl Into<String>,
        language: impl Into<String>,
        source: impl AsRef<str>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            language: language.into(),
            source: normalize_source(source.as_ref()).to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// Add an extra parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Build the key string for the given fields
    pub fn generate(
        video_id: &str,
        language: &str,
        source: &str,
        extra: &BTreeMap<String, String>,
    ) -> Result<String, CacheError> {
        let mut key = Self::new(video_id, language, source);
        key.extra = extra.clone();
        key.encode()
    }

    /// Encode to the key string, rejecting fields that contain the separator
    pub fn encode(&self) -> Result<String, CacheError> {
        check_field("video_id", &self.video_id, false)?;
        check_field("language", &self.language, false)?;
        check_field("source", &self.source, false)?;

        let mut key = format!(
            "{}{sep}{}{sep}{}",
            self.video_id,
            self.language,
            self.source,
            sep = SEPARATOR
        );

        for (name, value) in &self.extra {
            check_field("parameter name", name, false)?;
            if name.contains('=') {
                return Err(CacheError::InvalidKeyField {
                    field: "parameter name".to_string(),
                    value: name.clone(),
                });
            }
            check_field(name, value, true)?;

            key.push(SEPARATOR);
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }

        Ok(key)
    }

    /// Split a key string back into its fields
    pub fn parse(key: &str) -> Result<Self, CacheError> {
        let mut parts = key.split(SEPARATOR);
        let (Some(video_id), Some(language), Some(source)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CacheError::KeyFormat(key.to_string()));
        };

        if video_id.is_empty() || language.is_empty() || source.is_empty() {
            return Err(CacheError::KeyFormat(key.to_string()));
        }

        let mut extra = BTreeMap::new();
        for token in parts {
            let (name, value) = token
                .split_once('=')
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| CacheError::KeyFormat(key.to_string()))?;

            if extra.insert(name.to_string(), value.to_string()).is_some() {
                return Err(CacheError::KeyFormat(key.to_string()));
            }
        }

        Ok(Self {
            video_id: video_id.to_string(),
            language: language.to_string(),
            source: source.to_string(),
            extra,
        })
    }

    /// All fields as one map, including `video_id`, `language` and `source`
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.extra.clone();
        fields.insert("video_id".to_string(), self.video_id.clone());
        fields.insert("language".to_string(), self.language.clone());
        fields.insert("source".to_string(), self.source.clone());
        fields
    }
}

impl std::str::FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_base_key() {
        let key = CacheKey::generate("abc123", "en", "manual", &BTreeMap::new()).unwrap();
        assert_eq!(key, "abc123_en_manual");
    }

    #[test]
    fn test_extra_params_are_sorted() {
        let mut extra = BTreeMap::new();
        extra.insert("tlang".to_string(), "de".to_string());
        extra.insert("fmt".to_string(), "vtt".to_string());

        let key = CacheKey::generate("abc123", "en", "manual", &extra).unwrap();
        assert_eq!(key, "abc123_en_manual_fmt=vtt_tlang=de");

        let parsed = CacheKey::parse(&key).unwrap();
        assert_eq!(parsed.extra, extra);
    }

    #[test]
    fn test_auto_generated_source_is_normalized() {
        let key = CacheKey::generate("abc123", "en", "auto_generated", &BTreeMap::new()).unwrap();
        assert_eq!(key, "abc123_en_automatic");
    }

    #[test]
    fn test_separator_in_field_is_rejected() {
        let err = CacheKey::generate("abc_123", "en", "manual", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKeyField { ref field, .. } if field == "video_id"));

        let key = CacheKey::new("abc123", "en", "manual").with_param("a=b", "c");
        assert!(key.encode().is_err());

        let key = CacheKey::new("abc123", "en", "manual").with_param("name", "x_y");
        assert!(key.encode().is_err());

        assert!(CacheKey::new("abc123", "", "manual").encode().is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        for bad in ["", "abc123", "abc123_en", "abc123__manual", "abc123_en_manual_noequals", "a_b_c_=v"] {
            assert!(
                matches!(CacheKey::parse(bad), Err(CacheError::KeyFormat(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_fields_include_identity() {
        let key: CacheKey = "abc123_en_manual_v=2".parse().unwrap();
        let fields = key.fields();
        assert_eq!(fields["video_id"], "abc123");
        assert_eq!(fields["language"], "en");
        assert_eq!(fields["source"], "manual");
        assert_eq!(fields["v"], "2");
    }
}
