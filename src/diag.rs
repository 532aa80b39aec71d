//! Error taxonomy: registration-time catalog errors and per-span diagnostics.
//!
//! Catalog errors reject bad signatures before they ever reach scan time.
//! Diagnostics are the per-file, per-span failure channel: nothing in the
//! pipeline is fatal to a batch, and the always-surfaced cases (unterminated
//! carriers, attachment ambiguity, missing required keys) appear here even
//! when a caller chooses to ignore them.

use serde::Serialize;
use thiserror::Error;

/// Bad signature or registry operation, rejected at registration time.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{language}/{variant}: open token must not be empty")]
    EmptyOpenToken { language: String, variant: String },

    #[error("{language}/{variant}: multiline token carrier needs a close token")]
    MissingCloseToken { language: String, variant: String },

    #[error("{language}/{variant}: positional carrier needs a column rule")]
    MissingColumnRule { language: String, variant: String },

    #[error("{language}/{variant}: column rule is only valid on positional carriers")]
    UnexpectedColumnRule { language: String, variant: String },

    #[error("{language}/{variant}: equal padding needs long-bracket open/close tokens")]
    BadPaddingTokens { language: String, variant: String },

    #[error(
        "{language}/{variant}: identical open and close tokens need a collision strategy"
    )]
    UnguardedCloseToken { language: String, variant: String },

    #[error("duplicate signature {language}/{variant}")]
    DuplicateSignature { language: String, variant: String },

    #[error("{field}: delimiter must be exactly 1 character, got {value:?}")]
    BadDelimiter { field: String, value: String },

    #[error("operator {name}: delimiter must be exactly 2 characters, got {value:?}")]
    BadOperatorDelimiter { name: String, value: String },

    #[error("UDL {name:?} is already registered")]
    DuplicateUdl { name: String },

    #[error("UDL name {name:?} must be lowercase alphanumeric with - or _")]
    BadUdlName { name: String },

    #[error("unknown language {language:?}{}", suggestion_suffix(.suggestions))]
    UnknownLanguage {
        language: String,
        suggestions: Vec<String>,
    },

    #[error("failed to read catalog {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {path} is not valid JSON")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

/// Scanner failure: unterminated carrier or an overlap the specificity
/// order could not break.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{variant} at line {line}: {message}")]
pub struct ScanDiagnostic {
    pub variant: String,
    pub line: usize,
    pub message: String,
}

/// Zero or multiple binding candidates where the attachment rule requires
/// exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{variant} at lines {line_start}-{line_end}: {message} ({candidates} candidate(s))")]
pub struct AttachmentAmbiguity {
    pub variant: String,
    pub line_start: usize,
    pub line_end: usize,
    pub candidates: usize,
    pub message: String,
}

/// Malformed payload, non-UTF-8 body, or oversize payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}{message}", .line.map(|l| format!("line {l}: ")).unwrap_or_default())]
pub struct ParseFailure {
    pub line: Option<usize>,
    pub message: String,
}

/// Missing required key or wrong value type in a parsed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}{message}", .field.as_deref().map(|f| format!("{f}: ")).unwrap_or_default())]
pub struct ValidationFailure {
    pub field: Option<String>,
    pub message: String,
}

/// Diagnostic kind, for strict-vs-lenient partitioning by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Scan,
    Attachment,
    Parse,
    Validation,
}

/// Any per-span failure surfaced by the pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error(transparent)]
    Scan(ScanDiagnostic),
    #[error(transparent)]
    Attachment(AttachmentAmbiguity),
    #[error(transparent)]
    Parse(ParseFailure),
    #[error(transparent)]
    Validation(ValidationFailure),
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::Scan(_) => DiagnosticKind::Scan,
            Diagnostic::Attachment(_) => DiagnosticKind::Attachment,
            Diagnostic::Parse(_) => DiagnosticKind::Parse,
            Diagnostic::Validation(_) => DiagnosticKind::Validation,
        }
    }
}
