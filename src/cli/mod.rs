//! Command-line interface: argument parsing, service wiring and output.

pub mod commands;
pub mod context;
pub mod output;
pub mod types;

pub use context::AppContext;
pub use types::{Cli, Commands};

use crate::domain::errors::DomainError;

/// Print `err` to stderr and exit with status 1.
///
/// Domain errors are rendered with the body a router would send plus its
/// status code, so validation failures list every offending field.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let domain = err.downcast_ref::<DomainError>();

    if json_mode {
        let body = match domain {
            Some(domain) => {
                let mut body = domain.to_response_body();
                if let Some(object) = body.as_object_mut() {
                    object.insert("status".to_string(), domain.kind().http_status().into());
                }
                body
            }
            None => serde_json::json!({ "detail": format!("{err:#}") }),
        };
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
        if let Some(DomainError::Validation(errors)) = domain {
            for field in errors.errors() {
                eprintln!("  {}: {}", field.field, field.message);
            }
        }
    }
    std::process::exit(1);
}
