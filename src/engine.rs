//! The resolution pipeline: scan, resolve, extract, parse, validate, emit.
//!
//! One entry point per file. A batch is never fatal: every per-span failure
//! becomes a diagnostic and the remaining spans still produce records.
//! Records are emitted in source order and the pipeline is deterministic,
//! so re-running a file yields identical output.

use tracing::debug;

use crate::catalog::Catalog;
use crate::diag::{CatalogError, Diagnostic, ParseFailure};
use crate::model::{NormalizedRecord, SourceLocation, SymbolMarker};
use crate::validate::PayloadPolicy;
use crate::{payload, resolve, scanner, validate};

pub struct Engine {
    catalog: Catalog,
    policy: PayloadPolicy,
}

impl Engine {
    pub fn new(catalog: Catalog) -> Self {
        Engine::with_policy(catalog, PayloadPolicy::default())
    }

    pub fn with_policy(catalog: Catalog, policy: PayloadPolicy) -> Self {
        Engine { catalog, policy }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Mutable catalog access, for runtime UDL registration.
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn policy(&self) -> &PayloadPolicy {
        &self.policy
    }

    /// Run the full pipeline over one file's text.
    ///
    /// An unknown language is the only hard error; everything downstream is
    /// reported per span. Symbol markers come from the caller — the engine
    /// itself never parses host-language syntax.
    pub fn scan_and_resolve(
        &self,
        language: &str,
        file: &str,
        text: &str,
        markers: &[SymbolMarker],
    ) -> Result<(Vec<NormalizedRecord>, Vec<Diagnostic>), CatalogError> {
        let signatures = self.catalog.lookup(language)?;
        let (spans, mut diagnostics) = scanner::scan(signatures, text);
        let lines: Vec<&str> = text.lines().collect();

        let mut records = Vec::new();
        for span in spans {
            let Some(sig) = signatures.iter().find(|s| s.variant == span.variant) else {
                continue;
            };
            let (resolved, ambiguity) = resolve::resolve(&span, sig, &lines, markers);
            if let Some(diag) = ambiguity {
                diagnostics.push(diag);
                continue;
            }
            if !resolved.documents {
                continue;
            }

            let body = payload::extract(&resolved.span, sig);
            let map = match payload::parse_payload(&body, self.policy.max_payload_bytes) {
                Ok(map) => map,
                Err(mut err) => {
                    // Body-relative line, rebased onto the file.
                    err.line = Some(span.line_start + err.line.unwrap_or(1) - 1);
                    diagnostics.push(Diagnostic::Parse(err));
                    continue;
                }
            };
            let (payload, warnings) = match validate::validate(&map, &self.policy) {
                Ok(validated) => validated,
                Err(err) => {
                    diagnostics.push(Diagnostic::Validation(err));
                    continue;
                }
            };

            records.push(NormalizedRecord {
                language: span.language.clone(),
                carrier: span.variant.clone(),
                attachment: resolved.attachment,
                target_symbol: resolved.target_symbol,
                payload,
                source: SourceLocation {
                    file: file.to_string(),
                    line_start: span.line_start,
                    line_end: span.line_end,
                },
                warnings,
            });
        }

        debug!(
            file,
            records = records.len(),
            diagnostics = diagnostics.len(),
            "resolution pass complete"
        );
        Ok((records, diagnostics))
    }

    /// Byte-level entry point: non-UTF-8 input is a per-file parse
    /// diagnostic, not an error.
    pub fn scan_and_resolve_bytes(
        &self,
        language: &str,
        file: &str,
        bytes: &[u8],
        markers: &[SymbolMarker],
    ) -> Result<(Vec<NormalizedRecord>, Vec<Diagnostic>), CatalogError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.scan_and_resolve(language, file, text, markers),
            Err(err) => {
                self.catalog.lookup(language)?;
                let diag = Diagnostic::Parse(ParseFailure {
                    line: None,
                    message: format!("file is not valid UTF-8: {err}"),
                });
                Ok((Vec::new(), vec![diag]))
            }
        }
    }
}
