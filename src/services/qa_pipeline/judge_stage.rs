//! `qa.run_judge`: score the trace with the automated evaluator.

use serde_json::Value;
use std::sync::LazyLock;
use tracing::info;
use uuid::Uuid;

use super::packet::{cap_packet, render_packet, PacketPreviews, OUTPUT_PREVIEW_CHARS, THOUGHT_PREVIEW_CHARS};
use super::QaPipeline;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Event, EventPayload, JudgeOutput, JudgeResult, RUBRIC_VERSION};
use crate::domain::validation::validate_judge_output;

/// Leading text of `qa.error` when the developer has not consented to
/// automated evaluation. Evaluator faults never start with it.
pub const CONSENT_REFUSED_PREFIX: &str = "Consent refused: ";

pub const RUBRIC_TEXT: &str = r#"# Bug-Fix Trace Rubric

Score every dimension from 0.0 to 5.0 with one decimal place.

1. `root_cause_identification`: 5 means the exact root cause is named and backed by evidence such as logs, stack traces or code references; 0 means no root-cause analysis is visible.
2. `plan_quality`: 5 means a hypothesis-driven plan with a systematic test-and-iterate loop; 0 means no discernible method.
3. `experiment_iterate_loop`: 5 means every change is tested and its result informs the next step; 0 means no experimentation.
4. `use_of_signals_tests_logs`: 5 means tests, logs and error output consistently guide decisions; 0 means signals are ignored.
5. `minimality_of_fix`: 5 means a precisely targeted diff with no unrelated changes; 0 means the changes are mostly unrelated to the bug.
6. `clarity`: 5 means reasoning is clear and grounded in code and evidence; 0 means no reasoning is given.

`overall` is the equal-weight mean of the six scores, rounded to one decimal place.

Flags, set only when clearly warranted:
- `hallucination_risk`: the reasoning appears to contain fabricated information.
- `missing_steps`: significant debugging steps seem absent from the trace.
- `unsafe_suggestion`: the fix introduces security or reliability concerns.
- `incomplete_fix`: the fix may not fully resolve the reported bug.
- `exemplary_trace`: the trace is exceptionally good training material.

Answer with exactly this JSON shape and no other keys:

{
  "scores": {
    "root_cause_identification": 0.0,
    "plan_quality": 0.0,
    "experiment_iterate_loop": 0.0,
    "use_of_signals_tests_logs": 0.0,
    "minimality_of_fix": 0.0,
    "clarity": 0.0
  },
  "overall": 0.0,
  "rationale": "One to three paragraphs explaining the scores.",
  "flags": []
}"#;

pub static SYSTEM_PROMPT: LazyLock<String> = LazyLock::new(|| {
    format!(
        "You are an expert code reviewer evaluating a developer's bug-fix trace.\n\n\
         Evaluate the trace against the rubric below and answer with strictly valid JSON.\n\n\
         {RUBRIC_TEXT}\n\n\
         Return only the JSON object, with no text before or after it. \
         Every score must be a number between 0.0 and 5.0."
    )
});

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = trimmed.split_once('\n').map_or("", |(_, rest)| rest);
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

/// Parse and strictly validate the evaluator's answer.
pub fn parse_evaluator_response(text: &str) -> DomainResult<JudgeOutput> {
    let value: Value = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        let head: String = text.chars().take(500).collect();
        DomainError::Pipeline(format!("Evaluator returned invalid JSON: {e}; response: {head}"))
    })?;

    validate_judge_output(&value).map_err(|errors| {
        let details = errors
            .errors()
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        DomainError::Pipeline(format!("Evaluator response failed validation: {details}"))
    })
}

impl QaPipeline {
    async fn collect_previews(&self, events: &[Event]) -> PacketPreviews {
        let mut previews = PacketPreviews::new();
        for event in events {
            let (blob_id, max_chars) = match &event.payload {
                EventPayload::Thought(p) => (&p.content_blob_id, THOUGHT_PREVIEW_CHARS),
                EventPayload::TerminalOutput(p) => (&p.chunk_blob_id, OUTPUT_PREVIEW_CHARS),
                _ => continue,
            };
            if previews.contains_key(blob_id) {
                continue;
            }
            if let Some(text) = self.artifacts.preview(blob_id, max_chars).await {
                previews.insert(blob_id.clone(), text);
            }
        }
        previews
    }

    pub(super) async fn run_judge(&self, trace_id: Uuid) -> DomainResult<()> {
        let trace = self.load_finalizing(trace_id).await?;
        if !trace.developer.consent_flags.allow_llm_judge {
            return Err(DomainError::Pipeline(format!(
                "{CONSENT_REFUSED_PREFIX}developer consent does not allow automated evaluation (allow_llm_judge=false)"
            )));
        }

        let events = self.traces.list_events(trace_id).await?;
        let previews = self.collect_previews(&events).await;
        let packet = cap_packet(
            render_packet(&trace, &events, &previews),
            self.settings.max_packet_chars,
        );
        let user_prompt = format!("Please evaluate the following bug-fix trace:\n\n{packet}");

        let answer = self
            .evaluator
            .evaluate(&SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| DomainError::Pipeline(format!("Evaluator request failed: {e}")))?;
        let output = parse_evaluator_response(&answer)?;

        let rationale = self.artifacts.store(output.rationale.as_bytes(), "text/plain").await?;
        let judge = JudgeResult {
            model: self.evaluator.model().to_string(),
            rubric_version: RUBRIC_VERSION.to_string(),
            scores: output.scores,
            overall: output.overall,
            rationale_blob_id: Some(rationale.blob_id.to_string()),
            flags: output.flags,
        };

        self.traces.record_judge(trace_id, &judge).await?;
        info!(overall = judge.overall, flags = judge.flags.len(), "Evaluation recorded");
        Ok(())
    }
}
