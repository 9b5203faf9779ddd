//! Content-line handling for rewriting a feed in place.
//!
//! The icalendar crate's serializer stamps a fresh UID and DTSTAMP onto every
//! component that lacks one, so rewritten feeds are built line by line here:
//! untouched lines are copied byte for byte and only replaced properties are
//! re-encoded (RFC 5545 §3.1 folding, §3.3.11 text escaping).

/// Maximum octets per physical line before folding
const FOLD_WIDTH: usize = 75;

/// One logical content line together with the raw text it was read from.
#[derive(Debug)]
pub struct ContentLine<'a> {
    start: usize,
    /// Original physical lines, including folds and line terminators
    pub raw: &'a str,
    /// The line with folding removed and without terminator
    pub unfolded: String,
}

impl ContentLine<'_> {
    /// Property name, uppercased (`DESCRIPTION` for `DESCRIPTION;LANGUAGE=de:...`)
    pub fn name(&self) -> String {
        let head = self.head();
        head.split(';').next().unwrap_or(head).to_ascii_uppercase()
    }

    /// Name and parameters, everything before the value separator
    pub fn head(&self) -> &str {
        self.split().0
    }

    /// Raw, still escaped value
    pub fn value(&self) -> &str {
        self.split().1
    }

    /// Terminator of the last physical line (empty at end of input)
    pub fn terminator(&self) -> &str {
        if self.raw.ends_with("\r\n") {
            "\r\n"
        } else if self.raw.ends_with('\n') {
            "\n"
        } else {
            ""
        }
    }

    pub fn is_begin(&self) -> bool {
        self.name() == "BEGIN"
    }

    pub fn is_end(&self) -> bool {
        self.name() == "END"
    }

    /// `BEGIN:<kind>` for the given component kind
    pub fn begins(&self, kind: &str) -> bool {
        self.is_begin() && self.value().trim().eq_ignore_ascii_case(kind)
    }

    // Split at the first ':' that is not inside a quoted parameter
    fn split(&self) -> (&str, &str) {
        let mut quoted = false;
        for (i, c) in self.unfolded.char_indices() {
            match c {
                '"' => quoted = !quoted,
                ':' if !quoted => return (&self.unfolded[..i], &self.unfolded[i + 1..]),
                _ => {}
            }
        }
        (&self.unfolded, "")
    }
}

/// Split ICS text into logical content lines, keeping the raw text of each.
pub fn content_lines(text: &str) -> Vec<ContentLine<'_>> {
    let mut lines: Vec<ContentLine<'_>> = Vec::new();
    let mut offset = 0;

    for physical in text.split_inclusive('\n') {
        let start = offset;
        offset += physical.len();
        let body = physical.trim_end_matches(['\r', '\n']);

        let folded = body.starts_with([' ', '\t']);
        match lines.last_mut() {
            Some(last) if folded => {
                last.raw = &text[last.start..offset];
                last.unfolded.push_str(&body[1..]);
            }
            _ => lines.push(ContentLine {
                start,
                raw: &text[start..offset],
                unfolded: body.to_string(),
            }),
        }
    }

    lines
}

/// Unescape an ICS text value.
/// Reverses: \, → , and \; → ; and \\ → \ and \n → newline
pub fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&escaped) if matches!(escaped, ',' | ';' | '\\') => {
                    result.push(escaped);
                    chars.next();
                }
                Some('n') | Some('N') => {
                    result.push('\n');
                    chars.next();
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Escape a text value for use in a content line.
pub fn escape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            ';' => result.push_str("\\;"),
            ',' => result.push_str("\\,"),
            '\n' => result.push_str("\\n"),
            '\r' => {}
            _ => result.push(c),
        }
    }

    result
}

/// Write `head:value` as a folded content line.
pub fn write_property(out: &mut String, head: &str, value: &str, terminator: &str) {
    let line = format!("{head}:{}", escape_text(value));
    let fold = if terminator.is_empty() { "\r\n" } else { terminator };

    let mut width = 0;
    for c in line.chars() {
        if width + c.len_utf8() > FOLD_WIDTH {
            out.push_str(fold);
            out.push(' ');
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out.push_str(terminator);
}
