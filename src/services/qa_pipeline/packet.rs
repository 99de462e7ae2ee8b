//! Evaluation packet: a bounded Markdown digest of a trace.

use std::collections::HashMap;

use crate::domain::models::{Event, EventPayload, Trace};

pub const THOUGHT_PREVIEW_CHARS: usize = 500;
pub const OUTPUT_PREVIEW_CHARS: usize = 200;
const MAX_INVOCATIONS: usize = 5;
const MAX_MESSAGE_CHARS: usize = 100;
const SHORT_SHA_CHARS: usize = 12;
const TRUNCATION_MARKER: &str = "\n\n[packet truncated]";

/// Blob previews keyed by blob id.
pub type PacketPreviews = HashMap<String, String>;

fn prefix(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(i, _)| &s[..i])
}

/// One digest line, or `None` for event kinds the evaluator does not see.
fn summarize(event: &Event, previews: &PacketPreviews) -> Option<String> {
    let head = format!("[seq={}, ts={}] ", event.seq, event.ts_ms);
    let line = match &event.payload {
        EventPayload::FileEdit(p) => format!("**file_edit**: `{}` ({})", p.file_path, p.edit_kind.as_str()),
        EventPayload::Thought(p) => match previews.get(&p.content_blob_id) {
            Some(text) => format!("**thought** ({}): {text}", p.kind.as_str()),
            None => format!("**thought** ({}): [blob: {}]", p.kind.as_str(), p.content_blob_id),
        },
        EventPayload::TestRun(p) => format!(
            "**test_run**: `{}` (exit_code={}, passed={}, duration={}ms)",
            p.command, p.exit_code, p.passed, p.duration_ms
        ),
        EventPayload::TerminalCommand(p) => format!("**terminal_command**: `{}` (cwd: {})", p.command, p.cwd),
        EventPayload::TerminalOutput(p) => {
            let stream = p.stream.as_str();
            match previews.get(&p.chunk_blob_id) {
                Some(text) => format!("**terminal_output** ({stream}): {text}"),
                None => format!("**terminal_output** ({stream}): [truncated={}]", p.is_truncated),
            }
        }
        EventPayload::Commit(p) => format!(
            "**commit**: {} - {}",
            prefix(&p.commit_sha, SHORT_SHA_CHARS),
            prefix(&p.message, MAX_MESSAGE_CHARS)
        ),
        EventPayload::Error(p) => format!(
            "**error**: {}: {}",
            p.error_type,
            prefix(&p.message, MAX_MESSAGE_CHARS)
        ),
        EventPayload::FileSnapshot(_)
        | EventPayload::DebugAction(_)
        | EventPayload::Navigation(_)
        | EventPayload::PrMetadata(_) => return None,
    };
    Some(head + &line)
}

/// Render the packet for `trace` with `events` in seq order.
pub fn render_packet(trace: &Trace, events: &[Event], previews: &PacketPreviews) -> String {
    let mut lines: Vec<String> = Vec::new();
    let bug = &trace.task.bug_report;

    lines.push("## Bug Report".to_string());
    lines.push(format!("**Title:** {}", bug.title));
    lines.push(format!("**Description:** {}", bug.description));
    push_labeled(
        &mut lines,
        [
            ("Repro Steps", &bug.repro_steps),
            ("Expected", &bug.expected),
            ("Actual", &bug.actual),
        ],
    );

    lines.push(String::new());
    lines.push("## Developer Actions (ordered by sequence)".to_string());
    lines.extend(events.iter().filter_map(|e| summarize(e, previews)));

    lines.push(String::new());
    lines.push("## Final State".to_string());
    let final_state = trace
        .final_state
        .as_ref()
        .filter(|f| f.commit_head.is_some() || f.pr.is_some());
    match final_state {
        Some(state) => {
            if let Some(head) = &state.commit_head {
                lines.push(format!("**Final commit:** {head}"));
            }
            if let Some(pr) = &state.pr {
                push_labeled(
                    &mut lines,
                    [
                        ("PR Title", &pr.title),
                        ("PR Description", &pr.description),
                        ("Diff blob", &pr.diff_blob_id),
                    ],
                );
            }
        }
        None => lines.push("No final state recorded.".to_string()),
    }

    lines.push(String::new());
    lines.push("## Test Results".to_string());
    match trace.qa.as_ref().and_then(|qa| qa.tests.as_ref()) {
        Some(tests) => {
            lines.push(format!("**Runner:** {}", tests.runner));
            lines.push(format!("**Final passed:** {}", tests.final_passed));
            lines.extend(tests.invocations.iter().take(MAX_INVOCATIONS).enumerate().map(|(i, inv)| {
                format!(
                    "- Invocation {}: command=`{}`, exit_code={}, passed={}, duration_ms={}",
                    i + 1,
                    inv.command,
                    inv.exit_code,
                    inv.passed,
                    inv.duration_ms
                )
            }));
        }
        None => lines.push("No test results recorded.".to_string()),
    }

    lines.join("\n").trim_end().to_string()
}

/// Push `**label:** value` for each present, non-empty value.
fn push_labeled<const N: usize>(lines: &mut Vec<String>, fields: [(&str, &Option<String>); N]) {
    for (label, value) in fields {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            lines.push(format!("**{label}:** {value}"));
        }
    }
}

/// Bound `packet` to `max_chars` characters, marking any cut.
pub fn cap_packet(packet: String, max_chars: usize) -> String {
    if packet.chars().count() <= max_chars {
        return packet;
    }
    let mut capped = prefix(&packet, max_chars).to_string();
    capped.push_str(TRUNCATION_MARKER);
    capped
}
