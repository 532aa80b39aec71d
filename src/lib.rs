//! docspan — find, resolve and normalize documentation carriers in source code.
//!
//! Languages are catalog entries, not code: each one is a set of
//! [`CarrierSignature`] values describing how documentation is lexically
//! carried (string literals, block comments, line-comment runs, attributes,
//! fixed columns) and how a carrier binds to the symbol it documents. The
//! [`Engine`] runs the full pipeline over one file at a time: scan, resolve
//! attachment, extract and parse the payload, validate it, and emit
//! [`NormalizedRecord`] values plus per-span diagnostics.
//!
//! ```no_run
//! use docspan::{Catalog, Engine, SymbolMarker};
//!
//! let engine = Engine::new(Catalog::builtin());
//! let markers = [SymbolMarker { line_start: 1, line_end: 6, kind: "function".into() }];
//! let text = "def f():\n    \"\"\"\n    format: github\n    purpose: x\n    user: dev\n    \"\"\"\n";
//! let (records, diagnostics) = engine
//!     .scan_and_resolve("python", "f.py", text, &markers)
//!     .unwrap();
//! # let _ = (records, diagnostics);
//! ```

pub mod catalog;
pub mod diag;
pub mod engine;
pub mod model;
pub mod payload;
pub mod resolve;
pub mod scanner;
pub mod validate;

pub use catalog::{Catalog, CatalogManifest, UdlDefinition, UdlOperator, UDL_NAMESPACE};
pub use diag::{
    AttachmentAmbiguity, CatalogError, Diagnostic, DiagnosticKind, ParseFailure, ScanDiagnostic,
    ValidationFailure,
};
pub use engine::Engine;
pub use model::{
    AttachmentRule, CanonicalPayload, CarrierKind, CarrierSignature, CarrierSpan, CollisionStrategy,
    ColumnRule, NormalizedRecord, PayloadMap, ResolvedCarrier, SourceLocation, SymbolMarker, Value,
};
pub use validate::{PayloadPolicy, UnknownKeyPolicy};
