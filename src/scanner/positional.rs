//! Positional scanner: fixed-column legacy formats (COBOL, Fortran).
//!
//! Inspects only the indicator column of each physical line. Whatever
//! precedes the indicator (COBOL sequence numbers in columns 1-6) is
//! captured in the raw span but never interpreted.

use crate::model::{CarrierSignature, CarrierSpan};

/// Scan for runs of lines carrying the indicator character in exactly the
/// configured column. Contiguous indicator lines merge into one span; a
/// character in any other column never matches.
pub fn scan(sig: &CarrierSignature, text: &str) -> Vec<CarrierSpan> {
    let Some(rule) = sig.column_rule else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    let mut run: Option<(usize, Vec<&str>)> = None;
    for (i, line) in text.lines().enumerate() {
        let number = i + 1;
        let hit = line.chars().nth(rule.column - 1) == Some(rule.indicator);
        match (hit, run.as_mut()) {
            (true, Some((_, lines))) => lines.push(line),
            (true, None) => run = Some((number, vec![line])),
            (false, Some(_)) => flush(sig, run.take(), &mut spans),
            (false, None) => {}
        }
    }
    flush(sig, run.take(), &mut spans);
    spans
}

fn flush(sig: &CarrierSignature, run: Option<(usize, Vec<&str>)>, spans: &mut Vec<CarrierSpan>) {
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

    fn cobol_sig(catalog: &Catalog) -> &CarrierSignature {
        &catalog.lookup("cobol").unwrap()[0]
    }

    #[test]
    fn only_the_indicator_column_matches() {
        let catalog = Catalog::builtin();
        let sig = cobol_sig(&catalog);
        // Indicator in column 6, 7, 8 respectively; only column 7 scans.
        let text = "0001 * too early\n000100* format: github\n0001   * too late\n";
        let spans = scan(sig, text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].line_start, 2);
        assert_eq!(spans[0].line_end, 2);
    }

    #[test]
    fn contiguous_indicator_lines_merge() {
        let catalog = Catalog::builtin();
        let sig = cobol_sig(&catalog);
        let text = "000100* format: github\n000200* purpose: cli_doc_db\n000300 MOVE A TO B.\n000400* user: dev\n";
        let spans = scan(sig, text);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].line_start, spans[0].line_end), (1, 2));
        assert_eq!((spans[1].line_start, spans[1].line_end), (4, 4));
    }

    #[test]
    fn short_lines_never_match() {
        let catalog = Catalog::builtin();
        let sig = cobol_sig(&catalog);
        assert!(scan(sig, "*\n **\n").is_empty());
    }

    #[test]
    fn fortran_column_one() {
        let catalog = Catalog::builtin();
        let sig = &catalog.lookup("fortran").unwrap()[0];
        let text = "C format: github\n      X = 1\nC user: dev\n";
        let spans = scan(sig, text);
        assert_eq!(spans.len(), 2);
    }
}
