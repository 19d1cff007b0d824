//! RFC 4180 CSV: quoting for the files we write, record splitting for the
//! files we read.

/// Quote a field when it holds a comma, quote or line break.
pub(crate) fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split CSV text into records. Rows may be ragged; quoted fields may hold
/// commas, doubled quotes and line breaks. Blank lines are dropped.
///
/// # Errors
///
/// A description of the problem when a quoted field is never closed.
pub(crate) fn parse_records(contents: &str) -> Result<Vec<Vec<String>>, String> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);

    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut chars = contents.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    current.push(c);
                }
                _ => current.push(c),
            }
            continue;
        }

        match c {
            '"' if current.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut current)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut current));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(format!("unterminated quoted field before line {line}"));
    }
    if !current.is_empty() || !record.is_empty() {
        record.push(current);
        push_record(&mut records, record);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if !(record.len() == 1 && record[0].is_empty()) {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_quoting() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_ragged_rows_and_quotes() {
        let text = "Page,Alias 1,Alias 2\r\nAxe,Base.Axe,\"Axe, hand\"\n\nBolt\n\"Multi\nline\",\"He said \"\"no\"\"\"";
        let records = parse_records(text).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0], vec!["Page", "Alias 1", "Alias 2"]);
        assert_eq!(records[1], vec!["Axe", "Base.Axe", "Axe, hand"]);
        assert_eq!(records[2], vec!["Bolt"]);
        assert_eq!(records[3], vec!["Multi\nline", "He said \"no\""]);
    }

    #[test]
    fn test_trailing_empty_field_kept() {
        let records = parse_records("\u{feff}A,B,\n").unwrap();
        assert_eq!(records, vec![vec!["A", "B", ""]]);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_records("A,\"open\nB").unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn test_written_fields_read_back() {
        let values = ["x,y", "q\"uote", "line\nbreak", "plain"];
        let line: Vec<String> = values.iter().map(|v| field(v)).collect();
        let records = parse_records(&line.join(",")).unwrap();
        assert_eq!(records, vec![values.to_vec()]);
    }
}
