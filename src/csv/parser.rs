//! Row parsing using the csv crate
//!
//! Each call decodes exactly one line. Malformed content never fails the read:
//! the row degrades to a single field holding the trimmed raw text.

use super::model::Delimiter;

/// Parse one line of bytes into its fields
///
/// Uses the csv crate for RFC 4180 compliant parsing (quoted fields, escaped
/// quotes). Falls back to a single synthetic field when the bytes are not a
/// valid record, including lines that hold no record at all.
pub fn parse_row(line: &[u8], delimiter: Delimiter) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(line);

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(|s| s.to_string()).collect(),
        Ok(false) => fallback_row(line),
        Err(e) => {
            tracing::debug!("Row parse failed, keeping raw line: {}", e);
            fallback_row(line)
        }
    }
}

/// Single-field row containing the trimmed raw line
fn fallback_row(line: &[u8]) -> Vec<String> {
    vec![String::from_utf8_lossy(line).trim().to_string()]
}

/// Detect delimiter by analyzing first few lines
pub fn detect_delimiter(content: &str) -> Delimiter {
    let first_lines: String = content.lines().take(5).collect::<Vec<_>>().join("\n");

    let comma_count = first_lines.matches(',').count();
    let tab_count = first_lines.matches('\t').count();
    let pipe_count = first_lines.matches('|').count();
    let semi_count = first_lines.matches(';').count();

    let max = comma_count.max(tab_count).max(pipe_count).max(semi_count);

    if max == 0 || comma_count == max {
        return Delimiter::Comma;
    }

    if tab_count == max {
        Delimiter::Tab
    } else if pipe_count == max {
        Delimiter::Pipe
    } else {
        Delimiter::Semicolon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_row() {
        let fields = parse_row(b"a,b,c\n", Delimiter::Comma);
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_crlf_row() {
        let fields = parse_row(b"1,2,3\r\n", Delimiter::Comma);
        assert_eq!(fields, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_parse_quoted_fields() {
        let fields = parse_row(br#""hello, world","with ""quotes""""#, Delimiter::Comma);
        assert_eq!(fields, vec!["hello, world", "with \"quotes\""]);
    }

    #[test]
    fn test_parse_tsv_row() {
        let fields = parse_row(b"a\tb\tc\n", Delimiter::Tab);
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_last_line_without_newline() {
        let fields = parse_row(b"x,y", Delimiter::Comma);
        assert_eq!(fields, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_empty_line_falls_back_to_single_field() {
        assert_eq!(parse_row(b"\n", Delimiter::Comma), vec![""]);
        assert_eq!(parse_row(b"", Delimiter::Comma), vec![""]);
    }

    #[test]
    fn test_parse_invalid_utf8_falls_back_to_raw_line() {
        let fields = parse_row(b"  ab\xFF,cd  \r\n", Delimiter::Comma);
        assert_eq!(fields.len(), 1);
        assert!(fields[0].starts_with("ab"));
        assert!(fields[0].ends_with(",cd"));
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3\n"), Delimiter::Comma);
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3\n"), Delimiter::Tab);
    }

    #[test]
    fn test_detect_delimiter_pipe() {
        assert_eq!(detect_delimiter("a|b|c\n1|2|3\n"), Delimiter::Pipe);
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3\n"), Delimiter::Semicolon);
    }

    #[test]
    fn test_detect_delimiter_defaults_to_comma() {
        assert_eq!(detect_delimiter("single\ncolumn\n"), Delimiter::Comma);
    }
}
