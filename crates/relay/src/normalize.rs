use std::collections::BTreeMap;

use regex::Regex;

/// Uncompiled normalization rules, shaped for direct construction from
/// config.
#[derive(Debug, Clone, Default)]
pub struct NormalizerSpec {
    /// Regex whose first occurrence is rewritten to `rewrite_with`.
    pub rewrite_pattern: Option<String>,
    pub rewrite_with: String,
    /// Patterns removed from the text, applied in order.
    pub strip_patterns: Vec<String>,
    /// `(field name, pattern with one capture group)`.
    pub field_rules: Vec<(String, String)>,
    /// Field whose value becomes the correlation subject id.
    pub subject_field: String,
    /// Field whose value tags the message's attachments.
    pub tag_field: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("invalid pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// Output of normalizing one raw message.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMessage {
    pub text: String,
    pub fields: BTreeMap<String, String>,
    /// Value of the subject field, when extracted.
    pub subject: Option<String>,
    /// Lowercased value of the tag field, applied to attachments that arrived
    /// with this message.
    pub attachment_tag: Option<String>,
}

/// Pure text cleanup and field extraction over raw reply text.
///
/// Strips the responder's banner/footer noise, optionally rewrites its brand
/// tag, then runs the field rules over what remains.
pub struct MessageNormalizer {
    rewrite: Option<(Regex, String)>,
    strip: Vec<Regex>,
    fields: Vec<(String, Regex)>,
    subject_field: String,
    tag_field: String,
}

impl MessageNormalizer {
    pub fn compile(spec: &NormalizerSpec) -> Result<Self, NormalizeError> {
        let rewrite = match &spec.rewrite_pattern {
            Some(pattern) => Some((compile(pattern)?, spec.rewrite_with.clone())),
            None => None,
        };
        let strip = spec
            .strip_patterns
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = spec
            .field_rules
            .iter()
            .map(|(name, pattern)| Ok((name.clone(), compile(pattern)?)))
            .collect::<Result<Vec<_>, NormalizeError>>()?;

        Ok(Self {
            rewrite,
            strip,
            fields,
            subject_field: spec.subject_field.clone(),
            tag_field: spec.tag_field.clone(),
        })
    }

    pub fn normalize(&self, raw: &str) -> NormalizedMessage {
        let mut text = raw.to_string();
        if let Some((pattern, with)) = &self.rewrite {
            text = pattern.replace(&text, with.as_str()).into_owned();
        }
        for pattern in &self.strip {
            text = pattern.replace_all(&text, "").into_owned();
        }
        let text = text.trim().to_string();

        let mut fields = BTreeMap::new();
        for (name, pattern) in &self.fields {
            if let Some(value) = pattern.captures(&text).and_then(|captures| captures.get(1)) {
                fields.insert(name.clone(), value.as_str().trim().to_string());
            }
        }

        let subject = fields.get(&self.subject_field).cloned();
        let attachment_tag = fields.get(&self.tag_field).map(|tag| tag.to_lowercase());

        NormalizedMessage {
            text,
            fields,
            subject,
            attachment_tag,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, NormalizeError> {
    Regex::new(pattern).map_err(|source| NormalizeError::BadPattern {
        pattern: pattern.to_string(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> NormalizerSpec {
        NormalizerSpec {
            rewrite_pattern: Some(r"(?i)^\[\#LEDER_BOT\]".into()),
            rewrite_with: "[BOTLINE]".into(),
            strip_patterns: vec![
                r"(?is)^\[.*?\]\s*→\s*.*?\[.*?\](\r?\n){1,2}".into(),
                r"(?is)(Página\s*\d+/\d+.*|Credits\s*:.+)".into(),
                r"-{3,}".into(),
            ],
            field_rules: vec![
                ("dni".into(), r"(?i)DNI\s*:\s*(\d{8})".into()),
                (
                    "photo_type".into(),
                    r"(?i)Foto\s*:\s*(rostro|huella|firma|adverso|reverso)".into(),
                ),
            ],
            subject_field: "dni".into(),
            tag_field: "photo_type".into(),
        }
    }

    fn normalizer() -> MessageNormalizer {
        MessageNormalizer::compile(&spec()).unwrap()
    }

    #[test]
    fn strips_header_and_footer_noise() {
        let raw = "[RESULT] → consulta [RESULT]\nDNI : 12345678\nNombre : ANA\n----------\nPágina 1/2 siguiente";
        let normalized = normalizer().normalize(raw);
        assert!(normalized.text.starts_with("DNI : 12345678"));
        assert!(!normalized.text.contains("Página"));
        assert!(!normalized.text.contains("-----"));
    }

    #[test]
    fn rewrites_brand_tag() {
        let normalized = normalizer().normalize("[#LEDER_BOT] DNI : 12345678");
        assert!(normalized.text.starts_with("[BOTLINE]"));
    }

    #[test]
    fn extracts_subject_and_fields() {
        let normalized = normalizer().normalize("DNI : 12345678\nFoto : ROSTRO");
        assert_eq!(normalized.subject.as_deref(), Some("12345678"));
        assert_eq!(normalized.fields.get("dni").map(String::as_str), Some("12345678"));
        assert_eq!(normalized.attachment_tag.as_deref(), Some("rostro"));
    }

    #[test]
    fn no_subject_when_field_absent() {
        let normalized = normalizer().normalize("Número : 999888777");
        assert!(normalized.subject.is_none());
        assert!(normalized.attachment_tag.is_none());
        assert!(normalized.fields.is_empty());
    }

    #[test]
    fn empty_spec_only_trims() {
        let normalizer = MessageNormalizer::compile(&NormalizerSpec::default()).unwrap();
        let normalized = normalizer.normalize("  hola  ");
        assert_eq!(normalized.text, "hola");
        assert!(normalized.fields.is_empty());
    }

    #[test]
    fn bad_pattern_is_reported() {
        let spec = NormalizerSpec {
            strip_patterns: vec!["(".into()],
            ..Default::default()
        };
        assert!(matches!(
            MessageNormalizer::compile(&spec),
            Err(NormalizeError::BadPattern { .. })
        ));
    }
}
