//! Token scanner: delimited carriers and line-comment runs.

use super::LineIndex;
use crate::diag::{Diagnostic, ScanDiagnostic};
use crate::model::{CarrierSignature, CarrierSpan, CollisionStrategy};

/// Scan for a delimited carrier (block comment, string literal, attribute).
///
/// Honors the signature's collision strategy: a balanced counter for
/// nestable carriers, padding-matched long brackets for equal padding,
/// first-match close otherwise. An open token with no matching close yields
/// a diagnostic, not a silent drop.
pub fn scan_delimited(
    sig: &CarrierSignature,
    text: &str,
) -> (Vec<CarrierSpan>, Vec<Diagnostic>) {
    let mut spans = Vec::new();
    let mut diagnostics = Vec::new();
    let Some(close) = sig.close_token.as_deref() else {
        return (spans, diagnostics);
    };
    let index = LineIndex::new(text);
    let open = sig.open_token.as_str();

    let mut at = 0;
    while at < text.len() {
        let (open_pos, body_start, padding) = match sig.collision {
            CollisionStrategy::EqualPadding => {
                match find_padded_open(text, at, open) {
                    Some(found) => found,
                    None => break,
                }
            }
            _ => match text[at..].find(open) {
                Some(p) => (at + p, at + p + open.len(), 0),
                None => break,
            },
        };

        let close_match = match sig.collision {
            CollisionStrategy::EqualPadding => {
                let padded = format!("]{}]", "=".repeat(padding));
                text[body_start..]
                    .find(&padded)
                    .map(|p| (body_start + p, padded.len()))
            }
            CollisionStrategy::NestingDepthCount if sig.nestable => {
                let nest_open = sig.nest_open_token.as_deref().unwrap_or(open);
                find_balanced_close(text, body_start, nest_open, close)
                    .map(|p| (p, close.len()))
            }
            _ => text[body_start..]
                .find(close)
                .map(|p| (body_start + p, close.len())),
        };

        match close_match {
            Some((close_pos, close_len)) => {
                spans.push(CarrierSpan {
                    language: sig.language.clone(),
                    variant: sig.variant.clone(),
                    line_start: index.line_of(open_pos),
                    line_end: index.line_of(close_pos + close_len - 1),
                    raw_body: text[body_start..close_pos].to_string(),
                });
                at = close_pos + close_len;
            }
            None => {
                diagnostics.push(Diagnostic::Scan(ScanDiagnostic {
                    variant: sig.variant.clone(),
                    line: index.line_of(open_pos),
                    message: format!("unterminated carrier: no matching {close:?}"),
                }));
                // Resume past the bad open; one unmatched carrier must not
                // swallow the rest of the file.
                at = body_start;
            }
        }
    }
    (spans, diagnostics)
}

/// Match a long-bracket open with any padding level: the cataloged token is
/// the zero-padding form (`--[[`), actual text may read `--[=[`, `--[==[`…
/// Returns (open position, body start, padding level).
fn find_padded_open(text: &str, from: usize, open: &str) -> Option<(usize, usize, usize)> {
    let stem = &open[..open.len() - 1];
    let mut at = from;
    while at < text.len() {
        let p = text[at..].find(stem)? + at;
        let mut cursor = p + stem.len();
        let padding = text[cursor..].bytes().take_while(|&b| b == b'=').count();
        cursor += padding;
        if text[cursor..].starts_with('[') {
            return Some((p, cursor + 1, padding));
        }
        at = p + 1;
    }
    None
}

/// Find the close matching an already-consumed open, counting nested opens.
/// `/++ /+ inner +/ outer +/` consumes both closes before terminating.
fn find_balanced_close(text: &str, start: usize, nest_open: &str, close: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut at = start;
    while at < text.len() {
        let rest = &text[at..];
        if rest.starts_with(close) {
            if depth == 0 {
                return Some(at);
            }
            depth -= 1;
            at += close.len();
        } else if rest.starts_with(nest_open) {
            depth += 1;
            at += nest_open.len();
        } else {
            at += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Merge contiguous lines sharing a doc-comment prefix into one span.
///
/// A run starts at a line matching the full open token and extends through
/// lines matching at least its leading word (`%% @doc` starts a run that
/// plain `%%` lines continue). A blank line or any other line ends the run.
pub fn scan_line_run(sig: &CarrierSignature, text: &str) -> Vec<CarrierSpan> {
    let prefix = sig.open_token.as_str();
    let leader = prefix.split_whitespace().next().unwrap_or(prefix);

    let mut spans = Vec::new();
    let mut run: Option<(usize, Vec<&str>)> = None;
    for (i, line) in text.lines().enumerate() {
        let number = i + 1;
        let trimmed = line.trim_start();
        let starts = trimmed.starts_with(prefix);
        let continues = !trimmed.is_empty() && trimmed.starts_with(leader);

        match run.as_mut() {
            Some((_, lines)) if starts || continues => lines.push(line),
            Some(_) => {
                flush_run(sig, run.take(), &mut spans);
                if starts {
                    run = Some((number, vec![line]));
                }
            }
            None if starts => run = Some((number, vec![line])),
            None => {}
        }
    }
    flush_run(sig, run.take(), &mut spans);
    spans
}

fn flush_run(sig: &CarrierSignature, run: Option<(usize, Vec<&str>)>, spans: &mut Vec<CarrierSpan>) {
    if let Some((start, lines)) = run {
        spans.push(CarrierSpan {
            language: sig.language.clone(),
            variant: sig.variant.clone(),
            line_start: start,
            line_end: start + lines.len() - 1,
            raw_body: lines.join("\n"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn signature<'a>(language: &str, variant: &str, catalog: &'a Catalog) -> &'a CarrierSignature {
        catalog
            .lookup(language)
            .unwrap()
            .iter()
            .find(|s| s.variant == variant)
            .unwrap()
    }

    #[test]
    fn delimited_block_basic() {
        let catalog = Catalog::builtin();
        let sig = signature("javascript", "jsdoc", &catalog);
        let text = "/**\n * docs\n */\nfunction f() {}\n";
        let (spans, diags) = scan_delimited(sig, text);
        assert!(diags.is_empty());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].line_start, 1);
        assert_eq!(spans[0].line_end, 3);
        assert!(spans[0].raw_body.contains("docs"));
    }

    #[test]
    fn unterminated_block_yields_diagnostic_not_span() {
        let catalog = Catalog::builtin();
        let sig = signature("javascript", "jsdoc", &catalog);
        let (spans, diags) = scan_delimited(sig, "/** never closed\nfunction f() {}\n");
        assert!(spans.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("unterminated"));
    }

    #[test]
    fn nested_opens_consume_both_closes() {
        let catalog = Catalog::builtin();
        let sig = signature("d", "nested_doc", &catalog);
        let text = "/++ /+ inner +/ outer +/";
        let (spans, diags) = scan_delimited(sig, text);
        assert!(diags.is_empty());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].raw_body, " /+ inner +/ outer ");
    }

    #[test]
    fn unterminated_open_does_not_mask_later_carriers() {
        let catalog = Catalog::builtin();
        let sig = signature("lua", "long_bracket", &catalog);
        // The `--[=[` open has no padding-1 close anywhere; the padding-0
        // carrier after it must still scan.
        let text = "--[=[ never closed\n--[[ body ]]\n";
        let (spans, diags) = scan_delimited(sig, text);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("unterminated"));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].raw_body, " body ");
        assert_eq!(spans[0].line_start, 2);
    }

    #[test]
    fn equal_padding_matches_same_level_only() {
        let catalog = Catalog::builtin();
        let sig = signature("lua", "long_bracket", &catalog);
        // `]]` inside the body must not close a `--[=[` carrier.
        let text = "--[=[\nvalue: a]]b\n]=]\n";
        let (spans, diags) = scan_delimited(sig, text);
        assert!(diags.is_empty());
        assert_eq!(spans.len(), 1);
        assert!(spans[0].raw_body.contains("a]]b"));
    }

    #[test]
    fn zero_padding_bracket_still_matches() {
        let catalog = Catalog::builtin();
        let sig = signature("lua", "long_bracket", &catalog);
        let (spans, _) = scan_delimited(sig, "--[[ body ]]");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].raw_body, " body ");
    }

    #[test]
    fn string_literal_first_close_ends_span() {
        let catalog = Catalog::builtin();
        let sig = signature("python", "triple_quote", &catalog);
        let text = "\"\"\"first\"\"\"\nx = 1\n\"\"\"second\"\"\"\n";
        let (spans, diags) = scan_delimited(sig, text);
        assert!(diags.is_empty());
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].raw_body, "first");
        assert_eq!(spans[1].raw_body, "second");
    }

    #[test]
    fn line_run_merges_contiguous_prefix_lines() {
        let catalog = Catalog::builtin();
        let sig = signature("rust", "line_doc", &catalog);
        let text = "/// one\n/// two\n\n/// three\nfn f() {}\n";
        let spans = scan_line_run(sig, text);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].line_start, spans[0].line_end), (1, 2));
        assert_eq!((spans[1].line_start, spans[1].line_end), (4, 4));
    }

    #[test]
    fn line_run_terminates_on_non_prefix_line() {
        let catalog = Catalog::builtin();
        let sig = signature("rust", "line_doc", &catalog);
        let spans = scan_line_run(sig, "/// doc\nfn f() {}\n/// more\n");
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn line_run_leader_continues_full_prefix_starts() {
        let catalog = Catalog::builtin();
        let sig = signature("erlang", "edoc", &catalog);
        let text = "%% plain comment\n\n%% @doc Frobnicate\n%% continuation line\nfrob() -> ok.\n";
        let spans = scan_line_run(sig, text);
        // The plain `%%` block never starts a run; the `%% @doc` one does and
        // the bare `%%` line extends it.
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].line_start, spans[0].line_end), (3, 4));
    }
}
