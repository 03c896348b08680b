//! Typed analytics events.

use serde::{Deserialize, Serialize};

/// Free-form trait/property bag. Keys keep insertion order.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A single analytics event.
///
/// Segments are immutable once built; the engine moves them into a log
/// action and renders a separate payload per destination.
///
/// The serde representation is internally tagged, so a segment can be read
/// straight from a JSON line such as
/// `{"type":"track","event":"Signed Up","properties":{"plan":"pro"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traits: Option<Properties>,
    },
    Identify {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traits: Option<Properties>,
    },
    Screen {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Properties>,
    },
    Track {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Properties>,
    },
}

impl Segment {
    pub fn group(group_id: impl Into<String>, traits: Option<Properties>) -> Self {
        Segment::Group { group_id: group_id.into(), traits }
    }

    pub fn identify(user_id: impl Into<String>, traits: Option<Properties>) -> Self {
        Segment::Identify { user_id: user_id.into(), traits }
    }

    pub fn screen(name: impl Into<String>, properties: Option<Properties>) -> Self {
        Segment::Screen { name: name.into(), properties }
    }

    pub fn track(event: impl Into<String>, properties: Option<Properties>) -> Self {
        Segment::Track { event: event.into(), properties }
    }

    /// The wire name of this segment's subtype.
    pub fn kind(&self) -> &'static str {
        match self {
            Segment::Group { .. } => "group",
            Segment::Identify { .. } => "identify",
            Segment::Screen { .. } => "screen",
            Segment::Track { .. } => "track",
        }
    }

    /// The identifier or name carried by the segment.
    pub fn name(&self) -> &str {
        match self {
            Segment::Group { group_id, .. } => group_id,
            Segment::Identify { user_id, .. } => user_id,
            Segment::Screen { name, .. } => name,
            Segment::Track { event, .. } => event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segment_from_json_line() {
        let line = r#"{"type":"track","event":"Signed Up","properties":{"plan":"pro"}}"#;
        let segment: Segment = serde_json::from_str(line).unwrap();

        assert_eq!(segment.kind(), "track");
        assert_eq!(segment.name(), "Signed Up");
        match segment {
            Segment::Track { properties: Some(props), .. } => {
                assert_eq!(props.get("plan"), Some(&json!("pro")));
            }
            other => panic!("unexpected segment: {:?}", other),
        }
    }

    #[test]
    fn test_identify_without_traits() {
        let segment: Segment = serde_json::from_str(r#"{"type":"identify","userId":"u-1"}"#).unwrap();
        assert_eq!(segment, Segment::identify("u-1", None));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<Segment>(r#"{"type":"alias","previousId":"a"}"#);
        assert!(result.is_err());
    }
}
