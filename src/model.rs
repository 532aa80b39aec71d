//! Data model for carrier scanning and payload extraction — format-agnostic.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// How a documentation carrier is lexically represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierKind {
    /// A string literal doubling as documentation (Python `"""`).
    StringLiteral,
    /// A delimited block comment (`/** */`, `{- -}`).
    BlockComment,
    /// A run of contiguous line comments sharing one prefix (`///`, `-- |`).
    LineCommentRun,
    /// An attribute form carrying the doc body (`@doc """`).
    Attribute,
    /// Fixed-column legacy formats (COBOL column 7, Fortran column 1).
    Positional,
}

/// Mechanism preventing a payload's own content from closing its carrier early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionStrategy {
    #[default]
    None,
    /// Lua-style long brackets: `--[=[` closes only on `]=]` with equal padding.
    EqualPadding,
    /// D-style nesting: balanced counter over nested opens before the close.
    NestingDepthCount,
    /// The body must not contain the close token; first match ends the span.
    DisallowCloseTokenInBody,
}

/// Fixed-column rule for positional carriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// 1-based column holding the indicator character.
    pub column: usize,
    pub indicator: char,
}

/// How a carrier binds to the symbol it documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentRule {
    /// Binds to any following symbol (JSDoc/Javadoc/Rustdoc families).
    NextSymbol,
    /// Docstring only when it is the first statement of the enclosing scope
    /// (Python); otherwise downgraded to a plain string.
    EnclosingScopeFirstStatement,
    /// Binds to the symbol immediately below, no blank line between (Julia).
    AboveTarget,
    /// Nearest declaration by line proximity, ties toward the following one.
    PositionalConvention,
    /// Plain comment, never a documentation carrier.
    None,
}

/// One carrier grammar for one (language, variant) pair.
///
/// Immutable once registered; `Catalog::register` enforces the
/// self-consistency rules at registration time so the scanner never has to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierSignature {
    pub language: String,
    pub variant: String,
    pub open_token: String,
    #[serde(default)]
    pub close_token: Option<String>,
    pub kind: CarrierKind,
    pub multiline: bool,
    #[serde(default)]
    pub nestable: bool,
    /// Token counted by the nesting-depth strategy when it differs from
    /// `open_token` (D opens on `/++` but nests on `/+`).
    #[serde(default)]
    pub nest_open_token: Option<String>,
    #[serde(default)]
    pub column_rule: Option<ColumnRule>,
    #[serde(default)]
    pub collision: CollisionStrategy,
    pub attachment: AttachmentRule,
}

/// A declaration's extent, supplied by a host-language-aware collaborator.
/// The engine never parses host-language syntax itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMarker {
    pub line_start: usize,
    pub line_end: usize,
    /// Free-form declaration kind ("function", "class", "module").
    pub kind: String,
}

/// A carrier found in raw text. Ephemeral: produced and consumed within one
/// resolution pass, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierSpan {
    pub language: String,
    pub variant: String,
    pub line_start: usize,
    pub line_end: usize,
    pub raw_body: String,
}

/// A span plus the binding decision made for it.
///
/// `target_symbol` is an index into the caller's marker slice. `documents`
/// distinguishes "module-level documentation with no named target" from
/// "carrier the rule classified as a plain comment or loose string" — a
/// `None` target is not an error in either case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCarrier {
    pub span: CarrierSpan,
    pub attachment: AttachmentRule,
    pub target_symbol: Option<usize>,
    pub documents: bool,
}

/// A parsed payload value: scalar, list, or nested mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// A list whose items are all scalars, as owned strings.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => items
                .iter()
                .map(|v| v.as_scalar().map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Raw parse result: ordered entries plus the keys that occurred more than
/// once (last occurrence wins; the validator turns duplicates into warnings).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayloadMap {
    pub entries: Vec<(String, Value)>,
    pub duplicates: Vec<String>,
}

impl PayloadMap {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

fn serialize_pairs<S: Serializer>(
    pairs: &Vec<(String, Value)>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (k, v) in pairs {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

/// The canonical metadata payload embedded inside a carrier body.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CanonicalPayload {
    pub format: String,
    pub purpose: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Unknown keys, preserved in order of appearance.
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_pairs")]
    pub extra: Vec<(String, Value)>,
}

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line_start: usize,
    pub line_end: usize,
}

/// The emitted unit, handed by value to the storage collaborator.
/// Immutable after emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub language: String,
    /// Carrier variant name from the catalog.
    pub carrier: String,
    pub attachment: AttachmentRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_symbol: Option<usize>,
    pub payload: CanonicalPayload,
    pub source: SourceLocation,
    /// Validator warnings (unknown keys, duplicate keys) kept with the
    /// record so lenient callers still see them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
