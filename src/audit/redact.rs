//! Scrubbing secrets out of text before it reaches the audit log.
//!
//! Two passes: every registered secret (API key, passwords) is replaced
//! verbatim, then credential-looking `key=value` pairs (query strings,
//! form bodies) get their value masked.

use std::sync::OnceLock;

use regex::Regex;
use zeroize::Zeroizing;

pub const REDACTED: &str = "[REDACTED]";

fn credential_param() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(api_key|apikey|x-api-key|password|token)(=|:\s*)([^&\s,;]+)")
            .expect("credential parameter pattern is valid")
    })
}

/// Replaces known secrets in free text.
#[derive(Default, Clone)]
pub struct Redactor {
    secrets: Vec<Zeroizing<String>>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret. Empty strings are ignored.
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.add_secret(secret);
        self
    }

    pub fn add_secret(&mut self, secret: &str) {
        if !secret.is_empty() && !self.secrets.iter().any(|s| s.as_str() == secret) {
            self.secrets.push(Zeroizing::new(secret.to_string()));
            // Longest first, so a secret containing another is replaced whole.
            self.secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let out = match self.secret_pattern() {
            Some(Ok(pattern)) => pattern.replace_all(text, REDACTED).into_owned(),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "secret pattern rejected, redacting whole text");
                return REDACTED.to_string();
            }
            None => text.to_string(),
        };
        credential_param()
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                if &caps[3] == REDACTED {
                    caps[0].to_string()
                } else {
                    format!("{}{}{REDACTED}", &caps[1], &caps[2])
                }
            })
            .into_owned()
    }
}

impl Redactor {
    /// One alternation over every secret, longest first, so all of them
    /// are replaced in a single pass and earlier markers are never
    /// rewritten by a later, shorter secret.
    fn secret_pattern(&self) -> Option<Result<Regex, regex::Error>> {
        if self.secrets.is_empty() {
            return None;
        }
        let alternation = Zeroizing::new(
            self.secrets
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|"),
        );
        Some(Regex::new(&alternation))
    }
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
