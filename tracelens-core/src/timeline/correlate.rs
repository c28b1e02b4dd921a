//! Tool call / result correlation within one agent's events.
//!
//! Results arrive as separate records after their call. They are folded into
//! the `tool_use` event that shares their call identifier, and the standalone
//! result events are removed. A result whose call never appears is orphaned
//! and dropped: a result with no visible call is not actionable.

use crate::types::{Event, EventKind, ToolResult};
use std::collections::{HashMap, HashSet};

/// Outcome of correlating one agent's events.
#[derive(Debug, Default)]
pub struct Correlated {
    /// Events in original order, results folded into their calls
    pub events: Vec<Event>,
    /// Results dropped because no call carried their identifier
    pub orphaned_results: usize,
    /// Results superseded by a later result with the same identifier
    pub duplicate_results: usize,
}

/// Fold `tool_result` events into the `tool_use` events they answer.
///
/// If several results share an identifier, the last one seen wins.
pub fn correlate(events: Vec<Event>) -> Correlated {
    let call_ids: HashSet<String> = events
        .iter()
        .filter(|e| e.kind == EventKind::ToolUse)
        .filter_map(|e| e.tool.as_ref().and_then(|t| t.id.clone()))
        .collect();

    let mut results: HashMap<String, ToolResult> = HashMap::new();
    let mut orphaned_results = 0;
    let mut duplicate_results = 0;
    let mut remaining = Vec::with_capacity(events.len());

    for event in events {
        if event.kind != EventKind::ToolResult {
            remaining.push(event);
            continue;
        }

        let Some(result) = event.result else {
            orphaned_results += 1;
            continue;
        };
        match result.call_id.clone() {
            Some(id) if call_ids.contains(&id) => {
                if results.insert(id.clone(), result).is_some() {
                    tracing::debug!(call_id = %id, "Duplicate tool result; keeping the last one");
                    duplicate_results += 1;
                }
            }
            _ => orphaned_results += 1,
        }
    }

    for event in remaining.iter_mut() {
        if event.kind != EventKind::ToolUse {
            continue;
        }
        let id = event.tool.as_ref().and_then(|t| t.id.as_deref());
        if let Some(result) = id.and_then(|id| results.remove(id)) {
            event.result = Some(result);
        }
    }

    Correlated {
        events: remaining,
        orphaned_results,
        duplicate_results,
    }
}
