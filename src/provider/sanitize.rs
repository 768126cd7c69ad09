//! Transcript sanitization before a provider call.
//!
//! Chat-completions backends reject an assistant tool-call turn that is not
//! followed by one result per call, and reject tool results without their
//! call. A turn cut short by a disconnect can leave either shape behind, so
//! the transcript is repaired before every request.

use std::collections::{HashMap, HashSet};

use crate::types::{ModelMessage, Role};

const MISSING_RESULT: &str = "[System] Tool result missing from transcript (the turn was interrupted).";

pub fn sanitize_tool_result_pairing(messages: &[ModelMessage]) -> Vec<ModelMessage> {
    let mut out: Vec<ModelMessage> = Vec::with_capacity(messages.len());
    let mut seen_tool_results: HashSet<String> = HashSet::new();

    let mut i = 0usize;
    while i < messages.len() {
        let msg = &messages[i];
        if msg.role != Role::Assistant || msg.tool_calls.is_empty() {
            // Orphaned tool results are dropped.
            if msg.role != Role::Tool {
                out.push(msg.clone());
            }
            i += 1;
            continue;
        }

        let call_ids: HashSet<&str> = msg.tool_calls.iter().map(|tc| tc.id.as_str()).collect();
        let mut span_results: HashMap<String, ModelMessage> = HashMap::new();

        let mut j = i + 1;
        while j < messages.len() && messages[j].role == Role::Tool {
            if let Some(id) = messages[j].tool_call_id.as_deref() {
                if call_ids.contains(id) && seen_tool_results.insert(id.to_string()) {
                    span_results.insert(id.to_string(), messages[j].clone());
                }
            }
            j += 1;
        }

        out.push(msg.clone());
        for call in &msg.tool_calls {
            match span_results.remove(&call.id) {
                Some(existing) => out.push(existing),
                None => out.push(ModelMessage::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    MISSING_RESULT,
                )),
            }
        }
        i = j;
    }

    out
}
