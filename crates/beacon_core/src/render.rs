//! Rendering of segments into transport payloads.
//!
//! Rendering is a pure, synchronous step the engine performs once per
//! destination. It is also the only place trait/property bags are checked.

use crate::error::RenderError;
use crate::segment::{Properties, Segment};
use serde_json::Value;
use uuid::Uuid;

/// A rendered event ready for a destination queue.
pub type Payload = serde_json::Map<String, Value>;

/// Deepest nesting of objects/arrays accepted inside a property bag.
pub const MAX_PROPERTY_DEPTH: usize = 32;

/// Per-render context supplied by the engine.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Organisation identifier staged with the last setup, if any.
    pub org_id: Option<String>,
}

/// Renders `segment` into a payload.
///
/// The payload carries the subtype under `type`, the identifier under the
/// subtype's key (`groupId`, `userId`, `name` or `event`), the bag under
/// `traits` or `properties` (empty object when absent), a fresh `messageId`
/// and a millisecond `timestamp`. `orgId` is added when the context has one.
pub fn render(segment: &Segment, ctx: &RenderContext) -> Result<Payload, RenderError> {
    let (id_key, bag_key, bag) = match segment {
        Segment::Group { traits, .. } => ("groupId", "traits", traits),
        Segment::Identify { traits, .. } => ("userId", "traits", traits),
        Segment::Screen { properties, .. } => ("name", "properties", properties),
        Segment::Track { properties, .. } => ("event", "properties", properties),
    };

    if segment.name().trim().is_empty() {
        return Err(RenderError::BlankIdentifier(id_key));
    }
    if let Some(bag) = bag {
        validate_properties(bag, 1)?;
    }

    let mut payload = Payload::new();
    payload.insert("type".to_string(), Value::from(segment.kind()));
    payload.insert(id_key.to_string(), Value::from(segment.name()));
    payload.insert(
        bag_key.to_string(),
        Value::Object(bag.clone().unwrap_or_default()),
    );
    payload.insert(
        "messageId".to_string(),
        Value::from(Uuid::new_v4().to_string()),
    );
    payload.insert("timestamp".to_string(), Value::from(current_timestamp_millis()));
    if let Some(org_id) = &ctx.org_id {
        payload.insert("orgId".to_string(), Value::from(org_id.as_str()));
    }

    Ok(payload)
}

fn validate_properties(bag: &Properties, depth: usize) -> Result<(), RenderError> {
    if depth > MAX_PROPERTY_DEPTH {
        return Err(RenderError::TooDeep(MAX_PROPERTY_DEPTH));
    }
    for (key, value) in bag {
        if key.trim().is_empty() {
            return Err(RenderError::BlankKey);
        }
        validate_value(value, depth)?;
    }
    Ok(())
}

fn validate_value(value: &Value, depth: usize) -> Result<(), RenderError> {
    match value {
        Value::Object(map) => validate_properties(map, depth + 1),
        Value::Array(items) => {
            if depth + 1 > MAX_PROPERTY_DEPTH {
                return Err(RenderError::TooDeep(MAX_PROPERTY_DEPTH));
            }
            items.iter().try_for_each(|item| validate_value(item, depth + 1))
        }
        _ => Ok(()),
    }
}

/// Current Unix time in milliseconds.
pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_render_track() {
        let segment = Segment::track("Signed Up", Some(props(json!({"plan": "pro"}))));
        let ctx = RenderContext { org_id: Some("org-7".to_string()) };
        let payload = render(&segment, &ctx).unwrap();

        assert_eq!(payload["type"], json!("track"));
        assert_eq!(payload["event"], json!("Signed Up"));
        assert_eq!(payload["properties"], json!({"plan": "pro"}));
        assert_eq!(payload["orgId"], json!("org-7"));
        assert!(payload["messageId"].as_str().is_some());
        assert!(payload["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_render_identify_without_traits() {
        let payload = render(&Segment::identify("u-1", None), &RenderContext::default()).unwrap();

        assert_eq!(payload["userId"], json!("u-1"));
        assert_eq!(payload["traits"], json!({}));
        assert!(!payload.contains_key("orgId"));
    }

    #[test]
    fn test_render_keeps_key_order() {
        let payload = render(&Segment::group("g-1", None), &RenderContext::default()).unwrap();
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "groupId", "traits", "messageId", "timestamp"]);
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = render(&Segment::screen("  ", None), &RenderContext::default());
        assert_eq!(result.unwrap_err(), RenderError::BlankIdentifier("name"));
    }

    #[test]
    fn test_blank_nested_key_rejected() {
        let segment = Segment::track("x", Some(props(json!({"outer": {"": 1}}))));
        let result = render(&segment, &RenderContext::default());
        assert_eq!(result.unwrap_err(), RenderError::BlankKey);
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut value = json!(1);
        for _ in 0..MAX_PROPERTY_DEPTH + 1 {
            value = json!({ "k": value });
        }
        let segment = Segment::track("x", Some(props(value)));
        let result = render(&segment, &RenderContext::default());
        assert_eq!(result.unwrap_err(), RenderError::TooDeep(MAX_PROPERTY_DEPTH));
    }

    #[test]
    fn test_message_ids_are_unique() {
        let segment = Segment::track("x", None);
        let a = render(&segment, &RenderContext::default()).unwrap();
        let b = render(&segment, &RenderContext::default()).unwrap();
        assert_ne!(a["messageId"], b["messageId"]);
    }
}
