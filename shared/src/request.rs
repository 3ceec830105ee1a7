//! AT command requests and reply validation
//!
//! The modem has no correlation id, so a reply is only trusted if it passes
//! the request's validation pattern after post-processing.

use crate::protocol::{COMMAND_TERMINATOR, CTRL_Z, ERROR_MARKER};
use regex::Regex;
use std::sync::LazyLock;

static ANY_REPLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(".*").unwrap());

/// Outcome of checking one raw reply against a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Reply passed validation; carries the transformed text
    Accepted(String),
    /// Reply contained the error marker
    ErrorReply,
    /// Reply did not match the pattern; carries the transformed text
    Mismatch(String),
}

/// One AT command with its reply handling rules
#[derive(Debug, Clone)]
pub struct AtRequest {
    command: String,
    terminator: String,
    strip_newlines: bool,
    pattern: Regex,
    substitutions: Vec<(String, String)>,
    payload: Option<String>,
}

impl AtRequest {
    /// Create a request terminated by CR, accepting any reply
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            terminator: COMMAND_TERMINATOR.to_string(),
            strip_newlines: true,
            pattern: ANY_REPLY.clone(),
            substitutions: Vec::new(),
            payload: None,
        }
    }

    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    /// Keep CR/LF in the reply text
    pub fn keep_newlines(mut self) -> Self {
        self.strip_newlines = false;
        self
    }

    /// Validation pattern, matched from the start of the transformed reply
    pub fn expect(mut self, pattern: &Regex) -> Self {
        self.pattern = pattern.clone();
        self
    }

    /// Append a substitution; substitutions run in insertion order
    pub fn replace(mut self, find: impl Into<String>, with: impl Into<String>) -> Self {
        self.substitutions.push((find.into(), with.into()));
        self
    }

    /// Text entered after the `> ` prompt, terminated by Ctrl-Z
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Bytes written to start the exchange
    pub fn command_bytes(&self) -> Vec<u8> {
        format!("{}{}", self.command, self.terminator).into_bytes()
    }

    /// Bytes written after the prompt, if the request has a payload
    pub fn payload_bytes(&self) -> Option<Vec<u8>> {
        self.payload
            .as_ref()
            .map(|payload| format!("{}{}", payload, CTRL_Z).into_bytes())
    }

    /// Apply newline stripping and substitutions
    pub fn transform(&self, raw: &str) -> String {
        let mut reply = if self.strip_newlines {
            raw.replace(['\r', '\n'], "")
        } else {
            raw.to_string()
        };

        for (find, with) in &self.substitutions {
            reply = reply.replace(find.as_str(), with);
        }
        reply
    }

    /// Check a raw reply
    pub fn evaluate(&self, raw: &str) -> Verdict {
        if raw.contains(ERROR_MARKER) {
            return Verdict::ErrorReply;
        }

        let reply = self.transform(raw);
        let matched = self
            .pattern
            .find(&reply)
            .is_some_and(|m| m.start() == 0);

        if matched {
            Verdict::Accepted(reply)
        } else {
            Verdict::Mismatch(reply)
        }
    }
}
