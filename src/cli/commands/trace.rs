//! Trace CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use super::read_json_input;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::AppContext;
use crate::domain::models::{EventsAccepted, Trace, TraceCreated, TraceFinalized};

#[derive(Args, Debug)]
pub struct TraceArgs {
    #[command(subcommand)]
    pub command: TraceCommands,
}

#[derive(Subcommand, Debug)]
pub enum TraceCommands {
    /// Create a trace from a JSON request body
    Create {
        /// Request file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: PathBuf,
    },
    /// Append a batch of events (`{"events": [...]}`)
    Append {
        trace_id: Uuid,
        /// Batch file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: PathBuf,
    },
    /// Finalize a trace and queue it for QA
    Finalize {
        trace_id: Uuid,
        /// Finalize request file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: PathBuf,
    },
    /// Show a stored trace
    Show {
        trace_id: Uuid,
        /// Omit the event log
        #[arg(long)]
        no_events: bool,
        /// Omit the QA block
        #[arg(long)]
        no_qa: bool,
    },
}

impl CommandOutput for TraceCreated {
    fn to_human(&self) -> String {
        format!("Created trace {} ({})", self.trace_id, self.status)
    }
}

impl CommandOutput for EventsAccepted {
    fn to_human(&self) -> String {
        format!("Accepted {} event(s); seq high-water is {}", self.accepted, self.seq_high)
    }
}

impl CommandOutput for TraceFinalized {
    fn to_human(&self) -> String {
        format!(
            "Trace {} is {}; QA job {} queued",
            self.trace_id, self.status, self.qa_job_id
        )
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct TraceDetailOutput {
    pub trace: Trace,
}

impl CommandOutput for TraceDetailOutput {
    fn to_human(&self) -> String {
        let trace = &self.trace;
        let mut lines = vec![
            format!("Trace:    {}", trace.trace_id),
            format!("Status:   {}", trace.status),
            format!("Repo:     {} @ {}", trace.repo.repo_id, trace.repo.commit_base),
            format!("Bug:      {}", truncate(&trace.task.bug_report.title, 70)),
            format!("Seq high: {}", trace.seq_high),
        ];

        if let Some(qa) = &trace.qa {
            if let Some(tests) = &qa.tests {
                lines.push(format!(
                    "Tests:    {} ({} invocation(s))",
                    if tests.final_passed { "passed" } else { "failed" },
                    tests.invocations.len()
                ));
            }
            if let Some(judge) = &qa.judge {
                lines.push(format!("Judge:    overall {:.1} by {}", judge.overall, judge.model));
                if !judge.flags.is_empty() {
                    let flags: Vec<&str> = judge.flags.iter().map(|f| f.as_str()).collect();
                    lines.push(format!("Flags:    {}", flags.join(", ")));
                }
            }
            if let Some(error) = &qa.error {
                lines.push(format!("QA error: {error}"));
            }
        }

        if !trace.events.is_empty() {
            lines.push(format!("\n{:<6} {:<16} {:<18} {}", "SEQ", "TYPE", "TS_MS", "EVENT_ID"));
            lines.push("-".repeat(70));
            for event in &trace.events {
                lines.push(format!(
                    "{:<6} {:<16} {:<18} {}",
                    event.seq,
                    event.event_type.as_str(),
                    event.ts_ms,
                    truncate(&event.event_id, 28)
                ));
            }
        }

        lines.join("\n")
    }
}

pub async fn execute(args: TraceArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    match args.command {
        TraceCommands::Create { file } => {
            let body = read_json_input(&file).await?;
            let created = ctx.ingestion.create_trace(&body).await?;
            output(&created, json_mode);
        }
        TraceCommands::Append { trace_id, file } => {
            let body = read_json_input(&file).await?;
            let accepted = ctx.ingestion.append_events(trace_id, &body).await?;
            output(&accepted, json_mode);
        }
        TraceCommands::Finalize { trace_id, file } => {
            let body = read_json_input(&file).await?;
            let finalized = ctx.ingestion.finalize(trace_id, &body).await?;
            output(&finalized, json_mode);
        }
        TraceCommands::Show { trace_id, no_events, no_qa } => {
            let trace = ctx.ingestion.get_trace(trace_id, !no_events, !no_qa).await?;
            output(&TraceDetailOutput { trace }, json_mode);
        }
    }
    Ok(())
}
