use std::collections::BTreeMap;

use {botline_common::types::EndpointId, serde::Serialize};

use crate::types::CallResult;

/// Consolidated outcome of a resolved call.
///
/// `promoted` holds identifying fields lifted out of the nested field map
/// (serialized flattened at the top level, the shape downstream consumers
/// already expect).
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    pub status: String,
    /// Reply texts joined in arrival order.
    #[serde(rename = "message")]
    pub text: String,
    pub fields: BTreeMap<String, String>,
    /// Attachment URL per semantic tag; duplicate tags get `tag_2`, `tag_3`…
    pub attachments: BTreeMap<String, String>,
    #[serde(flatten)]
    pub promoted: BTreeMap<String, String>,
    /// False when the deadline cut accumulation short.
    pub complete: bool,
    /// Endpoint that actually answered.
    pub endpoint: EndpointId,
}

/// Pure, deterministic consolidation of an ordered reply list.
#[derive(Debug, Clone)]
pub struct Aggregator {
    separator: String,
    promote: Vec<String>,
}

impl Aggregator {
    pub fn new(separator: impl Into<String>, promote: Vec<String>) -> Self {
        Self {
            separator: separator.into(),
            promote,
        }
    }

    pub fn aggregate(&self, call: CallResult) -> AggregatedResult {
        let CallResult {
            endpoint,
            replies,
            complete,
        } = call;

        let text = replies
            .iter()
            .map(|reply| reply.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator);

        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        let mut attachments: BTreeMap<String, String> = BTreeMap::new();
        for reply in &replies {
            // First reply wins; later replies only fill gaps.
            for (name, value) in &reply.fields {
                fields
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            for attachment in &reply.attachments {
                let key = suffixed_key(&attachments, &attachment.tag);
                attachments.insert(key, attachment.url.clone());
            }
        }

        let mut promoted = BTreeMap::new();
        for name in &self.promote {
            if let Some(value) = fields.remove(name) {
                promoted.insert(name.clone(), value);
            }
        }

        AggregatedResult {
            status: "ok".into(),
            text,
            fields,
            attachments,
            promoted,
            complete,
            endpoint,
        }
    }
}

/// First occurrence keeps the bare tag; later ones get `tag_2`, `tag_3`, … in
/// arrival order. An existing key is never overwritten.
fn suffixed_key(existing: &BTreeMap<String, String>, tag: &str) -> String {
    if !existing.contains_key(tag) {
        return tag.to_string();
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{tag}_{n}");
        if !existing.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use {botline_common::types::AttachmentRef, chrono::Utc};

    use {super::*, crate::types::InboundReply};

    fn reply(text: &str, fields: &[(&str, &str)], attachments: &[(&str, &str)]) -> InboundReply {
        InboundReply {
            endpoint: EndpointId::from("primary"),
            subject: None,
            text: text.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            attachments: attachments
                .iter()
                .map(|(url, tag)| AttachmentRef::new(*url, *tag))
                .collect(),
            received_at: Utc::now(),
        }
    }

    fn call(replies: Vec<InboundReply>, complete: bool) -> CallResult {
        CallResult {
            endpoint: EndpointId::from("primary"),
            replies,
            complete,
        }
    }

    fn aggregator() -> Aggregator {
        Aggregator::new("\n---\n", vec!["dni".into()])
    }

    #[test]
    fn earlier_fields_are_never_overwritten() {
        let result = aggregator().aggregate(call(
            vec![
                reply("r1", &[("id", "1")], &[]),
                reply("r2", &[("id", "2"), ("name", "X")], &[]),
            ],
            true,
        ));
        assert_eq!(result.fields.get("id").map(String::as_str), Some("1"));
        assert_eq!(result.fields.get("name").map(String::as_str), Some("X"));
    }

    #[test]
    fn texts_join_in_arrival_order() {
        let result = aggregator().aggregate(call(
            vec![reply("uno", &[], &[]), reply("dos", &[], &[])],
            true,
        ));
        assert_eq!(result.text, "uno\n---\ndos");
    }

    #[test]
    fn duplicate_attachment_tags_get_deterministic_suffixes() {
        let result = aggregator().aggregate(call(
            vec![
                reply("a", &[], &[("u1", "rostro"), ("u2", "file")]),
                reply("b", &[], &[("u3", "file"), ("u4", "file")]),
            ],
            true,
        ));
        assert_eq!(result.attachments.get("rostro").map(String::as_str), Some("u1"));
        assert_eq!(result.attachments.get("file").map(String::as_str), Some("u2"));
        assert_eq!(result.attachments.get("file_2").map(String::as_str), Some("u3"));
        assert_eq!(result.attachments.get("file_3").map(String::as_str), Some("u4"));
    }

    #[test]
    fn promoted_fields_leave_the_nested_map() {
        let result = aggregator().aggregate(call(
            vec![reply("r", &[("dni", "12345678"), ("name", "X")], &[])],
            true,
        ));
        assert_eq!(result.promoted.get("dni").map(String::as_str), Some("12345678"));
        assert!(!result.fields.contains_key("dni"));
        assert!(result.fields.contains_key("name"));

        // Flattened at the top level of the serialized result.
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["dni"], "12345678");
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn incomplete_flag_carries_through() {
        let result = aggregator().aggregate(call(vec![reply("r", &[], &[])], false));
        assert!(!result.complete);
        assert_eq!(result.status, "ok");
    }

    #[test]
    fn aggregation_is_deterministic() {
        let replies = vec![
            reply("a", &[("k", "v")], &[("u1", "t")]),
            reply("b", &[("k", "w")], &[("u2", "t")]),
        ];
        let first = aggregator().aggregate(call(replies.clone(), true));
        let second = aggregator().aggregate(call(replies, true));
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }
}
