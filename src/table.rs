pub type Row = Vec<String>;

/// Splits comma-delimited text into rows.
///
/// Quoted fields may contain commas, line breaks and doubled quotes (`""`).
/// Outside quotes `\r` is dropped, so both LF and CRLF line endings are accepted.
/// Rows are returned as they appear; rows of different lengths are not padded.
pub fn parse(text: &str) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut row = Row::new();
    let mut field = String::new();
    let mut quoted = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => quoted = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            '\r' => {}
            other => field.push(other),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Serializes one row without a trailing newline.
pub fn write_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let field = field.as_ref();
        if needs_quotes(field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out
}

pub fn write_table<S: AsRef<str>>(rows: &[Vec<S>]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&write_row(row));
        out.push('\n');
    }
    out
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}
