//! Automated evaluator adapters.

pub mod anthropic;

pub use anthropic::{AnthropicConfig, AnthropicEvaluator};
