//! Newline-delimited JSON input.
//!
//! Each non-blank line is one record. Segments use their own wire shape
//! (`{"type":"track","event":"..."}`); two control records are understood
//! as well:
//!
//! ```text
//! {"type":"lifecycle","state":"paused"}
//! {"type":"flush"}
//! ```

use anyhow::Context;
use beacon_core::{LifecycleState, Segment};
use serde_json::Value;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRecord {
    Segment(Segment),
    /// `None` for a state name the host reported but we do not know.
    Lifecycle(Option<LifecycleState>),
    Flush,
}

/// Parses a single line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<InputRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line).context("line is not valid JSON")?;
    let record = match value.get("type").and_then(Value::as_str) {
        Some("lifecycle") => {
            let state = value
                .get("state")
                .and_then(Value::as_str)
                .and_then(LifecycleState::from_name);
            InputRecord::Lifecycle(state)
        }
        Some("flush") => InputRecord::Flush,
        _ => InputRecord::Segment(serde_json::from_value(value).context("line is not a segment")?),
    };
    Ok(Some(record))
}
