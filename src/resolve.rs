//! Attachment resolution: binds a scanned span to the symbol it documents.
//!
//! Symbol extents come from the caller; the engine never parses host-language
//! syntax. Resolution is pure geometry over line numbers plus blank-line
//! checks, so two carriers with identical placement can still resolve
//! differently when their signatures carry different attachment rules.

use crate::diag::{AttachmentAmbiguity, Diagnostic};
use crate::model::{AttachmentRule, CarrierSignature, CarrierSpan, ResolvedCarrier, SymbolMarker};

/// Resolve one span against the file's symbol markers.
///
/// Returns the binding decision and, when the rule demanded exactly one
/// candidate and found zero or several, an ambiguity diagnostic. A `None`
/// target without a diagnostic is a legitimate outcome (module-level
/// documentation, or a carrier downgraded to a plain comment).
pub fn resolve(
    span: &CarrierSpan,
    sig: &CarrierSignature,
    lines: &[&str],
    markers: &[SymbolMarker],
) -> (ResolvedCarrier, Option<Diagnostic>) {
    match sig.attachment {
        AttachmentRule::NextSymbol => next_symbol(span, sig, markers),
        AttachmentRule::EnclosingScopeFirstStatement => enclosing_scope(span, sig, lines, markers),
        AttachmentRule::AboveTarget => above_target(span, sig, lines, markers),
        AttachmentRule::PositionalConvention => positional_convention(span, sig, markers),
        AttachmentRule::None => (carrier(span, sig, None, false), None),
    }
}

fn carrier(
    span: &CarrierSpan,
    sig: &CarrierSignature,
    target_symbol: Option<usize>,
    documents: bool,
) -> ResolvedCarrier {
    ResolvedCarrier {
        span: span.clone(),
        attachment: sig.attachment,
        target_symbol,
        documents,
    }
}

fn ambiguity(span: &CarrierSpan, candidates: usize, message: &str) -> Diagnostic {
    Diagnostic::Attachment(AttachmentAmbiguity {
        variant: span.variant.clone(),
        line_start: span.line_start,
        line_end: span.line_end,
        candidates,
        message: message.to_string(),
    })
}

/// All lines strictly between line numbers `after` and `before` are blank.
/// Marker line numbers come from an external feed and may point past the
/// end of the file; anything beyond the last line counts as blank.
fn gap_is_blank(lines: &[&str], after: usize, before: usize) -> bool {
    if before <= after + 1 {
        return true;
    }
    let hi = (before - 1).min(lines.len());
    let lo = after.min(hi);
    lines[lo..hi].iter().all(|l| l.trim().is_empty())
}

/// Binds to the first symbol declared after the carrier ends.
fn next_symbol(
    span: &CarrierSpan,
    sig: &CarrierSignature,
    markers: &[SymbolMarker],
) -> (ResolvedCarrier, Option<Diagnostic>) {
    let nearest_start = markers
        .iter()
        .filter(|m| m.line_start > span.line_end)
        .map(|m| m.line_start)
        .min();
    let Some(start) = nearest_start else {
        return (
            carrier(span, sig, None, false),
            Some(ambiguity(span, 0, "no symbol follows the carrier")),
        );
    };
    let candidates: Vec<usize> = markers
        .iter()
        .enumerate()
        .filter(|(_, m)| m.line_start == start)
        .map(|(idx, _)| idx)
        .collect();
    if candidates.len() > 1 {
        let n = candidates.len();
        return (
            carrier(span, sig, None, false),
            Some(ambiguity(span, n, "several symbols start on the target line")),
        );
    }
    (carrier(span, sig, Some(candidates[0]), true), None)
}

/// First-statement-of-scope rule: the carrier documents the innermost
/// enclosing symbol only when nothing but blank lines separates the scope
/// opener from the carrier. Anywhere else in the scope it is a plain string,
/// not an error. With no enclosing symbol at all, the same test against the
/// top of the file decides between module documentation and a loose string.
fn enclosing_scope(
    span: &CarrierSpan,
    sig: &CarrierSignature,
    lines: &[&str],
    markers: &[SymbolMarker],
) -> (ResolvedCarrier, Option<Diagnostic>) {
    let enclosing: Vec<(usize, &SymbolMarker)> = markers
        .iter()
        .enumerate()
        .filter(|(_, m)| m.line_start < span.line_start && span.line_end <= m.line_end)
        .collect();

    let innermost_start = enclosing.iter().map(|(_, m)| m.line_start).max();
    match innermost_start {
        Some(start) => {
            let innermost: Vec<&(usize, &SymbolMarker)> = enclosing
                .iter()
                .filter(|(_, m)| m.line_start == start)
                .collect();
            if innermost.len() > 1 {
                return (
                    carrier(span, sig, None, false),
                    Some(ambiguity(
                        span,
                        innermost.len(),
                        "several enclosing symbols open on the same line",
                    )),
                );
            }
            let (idx, _) = *innermost[0];
            if gap_is_blank(lines, start, span.line_start) {
                (carrier(span, sig, Some(idx), true), None)
            } else {
                (carrier(span, sig, None, false), None)
            }
        }
        None => {
            // File scope: a first-statement carrier is module documentation.
            let documents = gap_is_blank(lines, 0, span.line_start);
            (carrier(span, sig, None, documents), None)
        }
    }
}

/// Binds to the symbol directly below, blank lines permitted in between but
/// no intervening code.
fn above_target(
    span: &CarrierSpan,
    sig: &CarrierSignature,
    lines: &[&str],
    markers: &[SymbolMarker],
) -> (ResolvedCarrier, Option<Diagnostic>) {
    let below: Vec<(usize, &SymbolMarker)> = markers
        .iter()
        .enumerate()
        .filter(|(_, m)| {
            m.line_start > span.line_end && gap_is_blank(lines, span.line_end, m.line_start)
        })
        .collect();

    let nearest_start = below.iter().map(|(_, m)| m.line_start).min();
    match nearest_start {
        Some(start) => {
            let nearest: Vec<&(usize, &SymbolMarker)> =
                below.iter().filter(|(_, m)| m.line_start == start).collect();
            if nearest.len() > 1 {
                let n = nearest.len();
                return (
                    carrier(span, sig, None, false),
                    Some(ambiguity(span, n, "several symbols start on the target line")),
                );
            }
            (carrier(span, sig, Some(nearest[0].0), true), None)
        }
        None => (
            carrier(span, sig, None, false),
            Some(ambiguity(span, 0, "no symbol directly below the carrier")),
        ),
    }
}

/// Fixed-format convention: the nearest declaration by line distance, ties
/// broken toward the following one. Files with no markers at all are treated
/// as documented at the program level.
fn positional_convention(
    span: &CarrierSpan,
    sig: &CarrierSignature,
    markers: &[SymbolMarker],
) -> (ResolvedCarrier, Option<Diagnostic>) {
    if markers.is_empty() {
        return (carrier(span, sig, None, true), None);
    }
    let mut best: Option<(usize, usize, bool)> = None; // (index, distance, follows)
    for (idx, m) in markers.iter().enumerate() {
        let follows = m.line_start > span.line_end;
        let distance = if m.line_start <= span.line_end && span.line_start <= m.line_end {
            0
        } else if follows {
            m.line_start - span.line_end
        } else {
            span.line_start - m.line_end
        };
        let better = match best {
            None => true,
            Some((_, d, f)) => distance < d || (distance == d && follows && !f),
        };
        if better {
            best = Some((idx, distance, follows));
        }
    }
    let (idx, _, _) = best.unwrap();
    (carrier(span, sig, Some(idx), true), None)
}
