use std::collections::BTreeMap;

use crate::protocol::response::parse_arguments;
use crate::types::tool::{ToolCall, ToolCallFragment};

/// Collects streamed tool-call fragments, keyed by their index, into final ToolCalls.
///
/// Tolerant: if the joined arguments are not valid JSON, the raw string is kept.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    pending: BTreeMap<u32, PendingCall>,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn on_fragment(&mut self, index: u32, fragment: ToolCallFragment) {
        let call = self.pending.entry(index).or_default();
        // First id/name wins; some providers repeat them on every fragment.
        if call.id.is_none() {
            call.id = fragment.id.filter(|s| !s.is_empty());
        }
        if call.name.is_none() {
            call.name = fragment.name.filter(|s| !s.is_empty());
        }
        if let Some(args) = fragment.arguments {
            call.arguments.push_str(&args);
        }
    }

    /// Calls in index order. Calls that never received a name are dropped.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.pending
            .into_iter()
            .filter_map(|(index, call)| {
                let name = call.name?;
                Some(ToolCall {
                    id: call.id.unwrap_or_else(|| format!("call_{}", index)),
                    name,
                    arguments: parse_arguments(&call.arguments),
                })
            })
            .collect()
    }
}
