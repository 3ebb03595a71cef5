//! Field template parsing.
//!
//! A field template is a comma separated list of `key=value` pairs. The value
//! only decides the field type: a trailing `i` means integer, a trailing `str`
//! means string, anything else is a float.

use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldKind {
    Int,
    Float,
    Str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: String,
    pub kind: FieldKind,
}

/// Parsed field template, ordered integers first, then floats, then strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplate {
    fields: Vec<FieldSpec>,
}

impl FieldTemplate {
    pub fn parse(template: &str) -> Result<Self, DataError> {
        let template = template.trim();
        if template.is_empty() {
            return Err(DataError::InvalidFieldTemplate(template.to_string()));
        }

        let mut fields = Vec::new();
        for part in template.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| DataError::InvalidFieldTemplate(template.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(DataError::InvalidFieldTemplate(template.to_string()));
            }
            let kind = if value.ends_with("str") {
                FieldKind::Str
            } else if value.ends_with('i') {
                FieldKind::Int
            } else {
                FieldKind::Float
            };
            fields.push(FieldSpec {
                key: key.to_string(),
                kind,
            });
        }
        // Stable sort keeps declaration order within a kind.
        fields.sort_by_key(|f| f.kind);

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn keys_of(&self, kind: FieldKind) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.kind == kind)
            .map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_kinds() {
        let tmpl = FieldTemplate::parse("s=abcstr,n=0i,f=1.5,m=2i").unwrap();
        let ints: Vec<_> = tmpl.keys_of(FieldKind::Int).collect();
        let floats: Vec<_> = tmpl.keys_of(FieldKind::Float).collect();
        let strs: Vec<_> = tmpl.keys_of(FieldKind::Str).collect();
        assert_eq!(ints, vec!["n", "m"]);
        assert_eq!(floats, vec!["f"]);
        assert_eq!(strs, vec!["s"]);
        assert_eq!(tmpl.fields()[0].key, "n");
        assert_eq!(tmpl.len(), 4);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FieldTemplate::parse("").is_err());
        assert!(FieldTemplate::parse("value").is_err());
        assert!(FieldTemplate::parse("=1i").is_err());
    }
}
