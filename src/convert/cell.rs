//! Cell rendering for CSV output

use std::borrow::Cow;

use calamine::{Data, DataType};

/// Character that replaces each line break inside a cell
pub const LINE_BREAK_REPLACEMENT: char = '|';

/// Render a spreadsheet cell as text
///
/// Date-times use `YYYY-MM-DD HH:MM:SS`, errors their spreadsheet name
/// (`#DIV/0!`), empty cells an empty string.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(v) => v.clone(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DateTimeIso(v) => v.clone(),
        Data::DurationIso(v) => v.clone(),
        Data::Error(v) => v.to_string(),
        Data::Empty => String::new(),
    }
}

/// Replace every line break with a single `|`
///
/// `\r\n` counts as one break, as do a lone `\r` or `\n`.
pub fn normalize_line_breaks(value: &str) -> Cow<'_, str> {
    if !value.contains(|c| c == '\n' || c == '\r') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(LINE_BREAK_REPLACEMENT);
            }
            '\n' => out.push(LINE_BREAK_REPLACEMENT),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn test_scalar_cells() {
        assert_eq!(cell_to_string(&Data::String("abc".into())), "abc");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn test_error_cells_use_spreadsheet_names() {
        assert_eq!(cell_to_string(&Data::Error(CellErrorType::Div0)), "#DIV/0!");
    }

    #[test]
    fn test_unchanged_values_are_borrowed() {
        assert!(matches!(normalize_line_breaks("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_line_break_variants() {
        assert_eq!(normalize_line_breaks("a\nb"), "a|b");
        assert_eq!(normalize_line_breaks("a\r\nb"), "a|b");
        assert_eq!(normalize_line_breaks("a\rb"), "a|b");
        assert_eq!(normalize_line_breaks("\n\nx\n"), "||x|");
    }

    #[test]
    fn test_pipe_count_matches_break_count() {
        let samples = ["one\ntwo\nthree", "x\r\n\r\ny", "\r\r\n\n", "no breaks"];
        for sample in samples {
            let breaks = sample.replace("\r\n", "\n").matches(|c| c == '\n' || c == '\r').count();
            let out = normalize_line_breaks(sample);
            assert!(!out.contains('\n') && !out.contains('\r'), "{sample:?}");
            let added = out.matches('|').count() - sample.matches('|').count();
            assert_eq!(added, breaks, "{sample:?}");
        }
    }
}
