//! Parts: the discrete units written to a session's output stream.
//!
//! Every part serializes to a tagged JSON record. Protocol markers use
//! reserved tags (`start`, `finish`, `error`, `text-*`); custom channels use
//! the `data-` prefix and carry `{ type, id, data }`.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Prefix that distinguishes custom channel tags from protocol markers.
pub const DATA_PREFIX: &str = "data-";

pub const START: &str = "start";
pub const FINISH: &str = "finish";
pub const ERROR: &str = "error";
pub const TEXT_START: &str = "text-start";
pub const TEXT_DELTA: &str = "text-delta";
pub const TEXT_END: &str = "text-end";

/// One emitted unit on an output stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawPart")]
pub enum Part {
    /// Session-start marker.
    Start {
        message_id: Option<String>,
        metadata: Option<Value>,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    /// Snapshot of a custom channel's value.
    Data {
        tag: String,
        id: String,
        data: Value,
    },
    /// Error-indicating terminal part.
    Error {
        error_text: String,
    },
    /// Session-finish marker.
    Finish,
}

impl Part {
    /// The wire `type` of this part.
    pub fn type_tag(&self) -> &str {
        match self {
            Part::Start { .. } => START,
            Part::TextStart { .. } => TEXT_START,
            Part::TextDelta { .. } => TEXT_DELTA,
            Part::TextEnd { .. } => TEXT_END,
            Part::Data { tag, .. } => tag.as_str(),
            Part::Error { .. } => ERROR,
            Part::Finish => FINISH,
        }
    }

    /// The channel or text-block identifier, if the part carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Part::TextStart { id }
            | Part::TextDelta { id, .. }
            | Part::TextEnd { id }
            | Part::Data { id, .. } => Some(id),
            Part::Start { .. } | Part::Error { .. } | Part::Finish => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Part::Start { .. })
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Part::Finish)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Part::Error { .. })
    }
}

/// Normalize a producer-chosen channel name into a custom data tag.
pub fn data_tag(name: &str) -> String {
    if name.starts_with(DATA_PREFIX) {
        name.to_string()
    } else {
        format!("{DATA_PREFIX}{name}")
    }
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.type_tag())?;
        match self {
            Part::Start { message_id, metadata } => {
                if let Some(message_id) = message_id {
                    map.serialize_entry("messageId", message_id)?;
                }
                if let Some(metadata) = metadata {
                    map.serialize_entry("messageMetadata", metadata)?;
                }
            }
            Part::TextStart { id } | Part::TextEnd { id } => {
                map.serialize_entry("id", id)?;
            }
            Part::TextDelta { id, delta } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("delta", delta)?;
            }
            Part::Data { id, data, .. } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("data", data)?;
            }
            Part::Error { error_text } => {
                map.serialize_entry("errorText", error_text)?;
            }
            Part::Finish => {}
        }
        map.end()
    }
}

/// Loose wire shape used to decode parts read back from a stream.
#[derive(Debug, Deserialize)]
struct RawPart {
    #[serde(rename = "type")]
    kind: String,
    id: Option<String>,
    delta: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(rename = "messageId")]
    message_id: Option<String>,
    #[serde(rename = "messageMetadata")]
    message_metadata: Option<Value>,
    #[serde(rename = "errorText")]
    error_text: Option<String>,
}

impl TryFrom<RawPart> for Part {
    type Error = String;

    fn try_from(raw: RawPart) -> Result<Self, String> {
        let need_id = |id: Option<String>| id.ok_or_else(|| format!("{} part without id", raw.kind));

        let part = match raw.kind.as_str() {
            START => Part::Start {
                message_id: raw.message_id,
                metadata: raw.message_metadata,
            },
            FINISH => Part::Finish,
            ERROR => Part::Error {
                error_text: raw.error_text.unwrap_or_default(),
            },
            TEXT_START => Part::TextStart { id: need_id(raw.id)? },
            TEXT_END => Part::TextEnd { id: need_id(raw.id)? },
            TEXT_DELTA => Part::TextDelta {
                id: need_id(raw.id)?,
                delta: raw.delta.unwrap_or_default(),
            },
            tag if tag.starts_with(DATA_PREFIX) => Part::Data {
                tag: tag.to_string(),
                id: need_id(raw.id)?,
                data: raw.data,
            },
            other => return Err(format!("unknown part type: {other}")),
        };
        Ok(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_part_wire_shape() {
        let part = Part::Data {
            tag: data_tag("plan"),
            id: "p-1".to_string(),
            data: json!("look things up"),
        };
        let wire = serde_json::to_value(&part).unwrap();
        assert_eq!(
            wire,
            json!({ "type": "data-plan", "id": "p-1", "data": "look things up" })
        );
    }

    #[test]
    fn test_start_part_omits_empty_fields() {
        let part = Part::Start {
            message_id: None,
            metadata: None,
        };
        assert_eq!(serde_json::to_string(&part).unwrap(), r#"{"type":"start"}"#);

        let part = Part::Start {
            message_id: Some("m-1".into()),
            metadata: Some(json!({ "model": "basic" })),
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({ "type": "start", "messageId": "m-1", "messageMetadata": { "model": "basic" } })
        );
    }

    #[test]
    fn test_error_part_wire_shape() {
        let part = Part::Error {
            error_text: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({ "type": "error", "errorText": "boom" })
        );
    }

    #[test]
    fn test_decode_wire_parts() {
        let part: Part =
            serde_json::from_str(r#"{"type":"text-delta","id":"t-1","delta":"Hi"}"#).unwrap();
        assert_eq!(
            part,
            Part::TextDelta {
                id: "t-1".into(),
                delta: "Hi".into()
            }
        );

        let part: Part = serde_json::from_str(r#"{"type":"data-queries","id":"q","data":["a"]}"#).unwrap();
        assert_eq!(part.type_tag(), "data-queries");
        assert_eq!(part.id(), Some("q"));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(serde_json::from_str::<Part>(r#"{"type":"reasoning","id":"x"}"#).is_err());
        assert!(serde_json::from_str::<Part>(r#"{"type":"data-plan"}"#).is_err());
    }

    #[test]
    fn test_data_tag_prefix_is_idempotent() {
        assert_eq!(data_tag("plan"), "data-plan");
        assert_eq!(data_tag("data-plan"), "data-plan");
    }
}
