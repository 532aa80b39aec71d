//! Scanner — finds candidate carrier spans in raw source text.
//!
//! Two strategies, selected per signature: token scanning (delimited blocks,
//! string literals, line-comment runs) and positional scanning (fixed-column
//! legacy formats). Column-positional scanning is a distinct mode, not a
//! special case of token matching.

pub mod positional;
pub mod token;

use crate::diag::{Diagnostic, ScanDiagnostic};
use crate::model::{CarrierSignature, CarrierSpan};

/// Scan `text` against every signature, narrowest first.
///
/// When two signatures match overlapping text, the more specific one wins
/// (longer open token, then column rule); an unbreakable tie is surfaced as
/// a `ScanDiagnostic` and the first match in specificity order is kept.
/// Scan diagnostics raised inside a span another signature claimed are
/// dropped with it: a sibling quote style false-starting inside a kept
/// docstring is not malformed input.
pub fn scan(signatures: &[CarrierSignature], text: &str) -> (Vec<CarrierSpan>, Vec<Diagnostic>) {
    let mut scanned: Vec<(usize, Vec<CarrierSpan>)> = Vec::new();
    let mut pending: Vec<Diagnostic> = Vec::new();

    for (idx, sig) in signatures.iter().enumerate() {
        let spans = if sig.column_rule.is_some() {
            positional::scan(sig, text)
        } else if sig.close_token.is_some() {
            let (spans, mut diags) = token::scan_delimited(sig, text);
            pending.append(&mut diags);
            spans
        } else {
            token::scan_line_run(sig, text)
        };
        scanned.push((idx, spans));
    }

    let mut kept: Vec<(usize, CarrierSpan)> = Vec::new();
    let mut diagnostics = Vec::new();
    for (idx, spans) in scanned {
        let sig = &signatures[idx];
        for span in spans {
            match kept.iter().find(|(_, k)| overlaps(k, &span)) {
                Some((kept_idx, kept_span)) => {
                    // Signatures arrive in specificity order, so the kept
                    // span is at least as specific as the candidate.
                    let winner = &signatures[*kept_idx];
                    let tied = winner.open_token.len() == sig.open_token.len()
                        && winner.column_rule.is_some() == sig.column_rule.is_some();
                    if tied {
                        diagnostics.push(Diagnostic::Scan(ScanDiagnostic {
                            variant: span.variant.clone(),
                            line: span.line_start,
                            message: format!(
                                "ambiguous overlap with {} at line {}",
                                kept_span.variant, kept_span.line_start
                            ),
                        }));
                    }
                }
                None => kept.push((idx, span)),
            }
        }
    }

    pending.retain(|diag| match diag {
        Diagnostic::Scan(scan) => !kept.iter().any(|(_, span)| {
            span.variant != scan.variant
                && span.line_start <= scan.line
                && scan.line <= span.line_end
        }),
        _ => true,
    });
    diagnostics.extend(pending);

    kept.sort_by_key(|(_, span)| (span.line_start, span.line_end));
    (kept.into_iter().map(|(_, span)| span).collect(), diagnostics)
}

fn overlaps(a: &CarrierSpan, b: &CarrierSpan) -> bool {
    a.line_start <= b.line_end && b.line_start <= a.line_end
}

/// Byte offset to 1-based line number lookup.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        LineIndex { starts }
    }

    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn line_index_maps_offsets() {
        let idx = LineIndex::new("ab\ncd\nef");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 1);
        assert_eq!(idx.line_of(3), 2);
        assert_eq!(idx.line_of(7), 3);
    }

    #[test]
    fn scan_is_deterministic() {
        let catalog = Catalog::builtin();
        let sigs = catalog.lookup("rust").unwrap();
        let text = "/// doc for a\nfn a() {}\n\n/// doc for b\nfn b() {}\n";
        let first = scan(sigs, text);
        let second = scan(sigs, text);
        assert_eq!(first, second);
        assert_eq!(first.0.len(), 2);
    }

    #[test]
    fn sibling_quote_style_inside_kept_span_is_not_unterminated() {
        let catalog = Catalog::builtin();
        let sigs = catalog.lookup("python").unwrap();
        // The lone `'''` never closes, but it sits inside a kept `"""` span.
        let text = "\"\"\"\nformat: x\nmention ''' once\n\"\"\"\nx = 1\n";
        let (spans, diags) = scan(sigs, text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].variant, "triple_quote");
        assert!(diags.is_empty());
    }

    #[test]
    fn unterminated_open_outside_any_span_still_reports() {
        let catalog = Catalog::builtin();
        let sigs = catalog.lookup("python").unwrap();
        let (spans, diags) = scan(sigs, "x = 1\n''' dangling\n");
        assert!(spans.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("unterminated"));
    }

    #[test]
    fn narrower_signature_wins_overlap() {
        let catalog = Catalog::builtin();
        let sigs = catalog.lookup("lua").unwrap();
        // The long bracket opens with `--[[` which also looks like a plain
        // `--` comment to less specific rules; only one span may survive.
        let text = "--[[\nformat: x\n]]\nlocal f\n";
        let (spans, diags) = scan(sigs, text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].variant, "long_bracket");
        assert!(diags.is_empty());
    }
}
