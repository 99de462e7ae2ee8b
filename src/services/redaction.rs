//! Redaction engine applied to stored artifacts.
//!
//! Rules always run in the fixed order `secret_scan`, `pii_mask`,
//! `truncate_large`, whatever order they are requested in. The text rules
//! only run on valid UTF-8; binary content is left to the size cap.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::domain::models::{BlobRedaction, RedactionRule};

/// Default byte cap enforced by `truncate_large`.
pub const MAX_BLOB_BYTES: usize = 1_048_576;

const SECRET_REPLACEMENT: &str = "[SECRET_REDACTED]";

static SECRET_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:api[_-]?key|secret|token|password|passwd|credential)\s*[:=]\s*['"]?([^\s'"]{8,})"#,
    )
    .expect("secret assignment pattern is valid")
});

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // GitHub tokens
        r"(?:ghp|gho|ghu|ghs|ghr)_[A-Za-z0-9_]{36,}",
        // AWS access key ids
        r"AKIA[0-9A-Z]{16}",
        r"-----BEGIN (?:RSA |EC )?PRIVATE KEY-----",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("secret pattern is valid"))
    .collect()
});

/// Any marker this module writes.
static REDACTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[A-Z]+_REDACTED\]").expect("marker pattern is valid"));

static PII_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}", "[EMAIL_REDACTED]"),
        (r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", "[PHONE_REDACTED]"),
    ]
    .into_iter()
    .map(|(p, replacement)| (Regex::new(p).expect("pii pattern is valid"), replacement))
    .collect()
});

/// Result of one redaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionOutcome {
    pub content: Vec<u8>,
    /// Rules that changed the content, in the order they ran.
    pub applied_rules: Vec<RedactionRule>,
    pub modified: bool,
    pub truncated: bool,
    pub original_length: usize,
}

impl RedactionOutcome {
    /// Report stored alongside the blob's metadata.
    pub fn report(&self) -> BlobRedaction {
        BlobRedaction {
            applied: self.modified,
            rules: self.applied_rules.clone(),
        }
    }
}

/// Replace every match of `patterns`, returning whether anything changed.
fn replace_all_patterns<'r>(
    text: &str,
    patterns: impl Iterator<Item = (&'r Regex, &'r str)>,
) -> (String, bool) {
    let mut text = Cow::Borrowed(text);
    let mut changed = false;
    for (pattern, replacement) in patterns {
        let replaced = match pattern.replace_all(&text, replacement) {
            Cow::Owned(s) => Some(s),
            Cow::Borrowed(_) => None,
        };
        if let Some(s) = replaced {
            text = Cow::Owned(s);
            changed = true;
        }
    }
    (text.into_owned(), changed)
}

/// Mask secrets in `text`; `true` when something was replaced.
///
/// An assignment whose value already carries a redaction marker was masked by
/// an earlier pass and is kept as is.
pub fn secret_scan(text: &str) -> (String, bool) {
    let masked = SECRET_ASSIGNMENT.replace_all(text, |caps: &Captures<'_>| {
        if REDACTION_MARKER.is_match(&caps[1]) {
            caps[0].to_string()
        } else {
            SECRET_REPLACEMENT.to_string()
        }
    });
    let assignments_changed = masked != text;
    let (out, changed) =
        replace_all_patterns(&masked, SECRET_PATTERNS.iter().map(|p| (p, SECRET_REPLACEMENT)));
    (out, assignments_changed || changed)
}

/// Mask email addresses and phone-shaped numbers in `text`.
pub fn pii_mask(text: &str) -> (String, bool) {
    replace_all_patterns(text, PII_PATTERNS.iter().map(|(p, r)| (p, *r)))
}

/// Pure transformation of bytes into redacted bytes plus a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redactor {
    max_bytes: usize,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(MAX_BLOB_BYTES)
    }
}

impl Redactor {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Apply `rules` to `data`; `None` applies every rule.
    pub fn apply(&self, data: &[u8], rules: Option<&[RedactionRule]>) -> RedactionOutcome {
        let wanted = |rule: RedactionRule| rules.map_or(true, |r| r.contains(&rule));
        let mut applied = Vec::new();
        let mut modified = false;
        let mut content: Cow<'_, [u8]> = Cow::Borrowed(data);

        let run_secret = wanted(RedactionRule::SecretScan);
        let run_pii = wanted(RedactionRule::PiiMask);
        if run_secret || run_pii {
            if let Ok(text) = std::str::from_utf8(data) {
                let mut text = Cow::Borrowed(text);
                if run_secret {
                    let (out, changed) = secret_scan(&text);
                    if changed {
                        text = Cow::Owned(out);
                        applied.push(RedactionRule::SecretScan);
                    }
                }
                if run_pii {
                    let (out, changed) = pii_mask(&text);
                    if changed {
                        text = Cow::Owned(out);
                        applied.push(RedactionRule::PiiMask);
                    }
                }
                if let Cow::Owned(text) = text {
                    content = Cow::Owned(text.into_bytes());
                    modified = true;
                }
            }
        }

        let mut truncated = false;
        if wanted(RedactionRule::TruncateLarge) && content.len() > self.max_bytes {
            content = Cow::Owned(content[..self.max_bytes].to_vec());
            applied.push(RedactionRule::TruncateLarge);
            truncated = true;
            modified = true;
        }

        RedactionOutcome {
            content: content.into_owned(),
            applied_rules: applied,
            modified,
            truncated,
            original_length: data.len(),
        }
    }
}

/// Apply `rules` with the default size cap.
pub fn apply_redaction(data: &[u8], rules: Option<&[RedactionRule]>) -> RedactionOutcome {
    Redactor::default().apply(data, rules)
}
