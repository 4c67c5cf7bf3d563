//! A minimal parser and writer for flat `key=value` property lists.
//!
//! This is the on-disk text format of a single cache entry. The dialect is the
//! familiar Java `.properties` one: `#`/`!` comments, `=`/`:`/whitespace
//! separators, backslash line continuations and `\t \n \r \f \\ \uXXXX`
//! escapes. [`write`] only ever produces text that [`parse`] maps back to the
//! exact same keys and values.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    pub entries: Vec<PropertyEntry>,
}

impl PropertiesFile {
    #[must_use]
    pub fn by_key<'a, 'k>(
        &'a self,
        key: &'k str,
    ) -> impl Iterator<Item = &'a PropertyEntry> + use<'a, 'k> {
        self.entries.iter().filter(move |e| e.key == key)
    }

    /// Returns the value of the last entry for `key`, matching property-map semantics.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a property list into key/value entries.
///
/// Malformed input never fails; unknown escapes degrade to the escaped
/// character itself.
#[must_use]
pub fn parse(text: &str) -> PropertiesFile {
    let bytes = text.as_bytes();
    let mut offset = 0usize;
    let mut entries = Vec::new();

    while offset < bytes.len() {
        let line_start = offset;
        let logical = read_logical_line(bytes, &mut offset);
        if let Some((key, value)) = parse_logical_line(&logical) {
            entries.push(PropertyEntry { key, value });
        }

        // Ensure we always make progress even on pathological inputs.
        if offset == line_start {
            offset += 1;
        }
    }

    PropertiesFile { entries }
}

/// Serialize entries as a property list, one `key=value` line per entry.
#[must_use]
pub fn write<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in entries {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

fn read_logical_line(bytes: &[u8], offset: &mut usize) -> Vec<u8> {
    let mut out = Vec::new();

    loop {
        let segment_start = *offset;
        let mut line_end = segment_start;
        while line_end < bytes.len() && bytes[line_end] != b'\n' {
            line_end += 1;
        }

        let mut content_end = line_end;
        if content_end > segment_start && bytes[content_end - 1] == b'\r' {
            content_end -= 1;
        }

        // Does the physical line end with an unescaped `\`?
        let continues = ends_with_unescaped_backslash(&bytes[segment_start..content_end]);
        let copy_end = if continues {
            content_end.saturating_sub(1)
        } else {
            content_end
        };
        out.extend_from_slice(&bytes[segment_start..copy_end]);

        // Consume the newline if present.
        *offset = if line_end < bytes.len() {
            line_end + 1
        } else {
            line_end
        };

        if !continues || *offset >= bytes.len() {
            break;
        }

        // Continuation: skip leading whitespace on the next physical line.
        while *offset < bytes.len() && is_whitespace(bytes[*offset]) {
            *offset += 1;
        }
    }

    out
}

fn ends_with_unescaped_backslash(line: &[u8]) -> bool {
    let mut i = line.len();
    let mut backslashes = 0usize;
    while i > 0 && line[i - 1] == b'\\' {
        backslashes += 1;
        i -= 1;
    }
    backslashes % 2 == 1
}

fn parse_logical_line(line: &[u8]) -> Option<(String, String)> {
    let mut i = 0usize;
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    if i >= line.len() || line[i] == b'#' || line[i] == b'!' {
        return None;
    }

    let key_start = i;
    while i < line.len() {
        match line[i] {
            b'\\' => i += 2,
            b'=' | b':' => break,
            b if is_whitespace(b) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());

    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    // Optional `:` / `=`.
    if i < line.len() && (line[i] == b'=' || line[i] == b':') {
        i += 1;
    }

    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    let key = unescape(&line[key_start..key_end]);
    let value = unescape(&line[i.min(line.len())..]);
    Some((key, value))
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\x0C')
}

fn unescape(bytes: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }

        i += 1;
        if i >= bytes.len() {
            out.push(b'\\');
            break;
        }

        match bytes[i] {
            b't' => out.push(b'\t'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b'f' => out.push(b'\x0C'),
            b'u' => match decode_unicode_escape(&bytes[i + 1..]) {
                Some(ch) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    i += 4;
                }
                None => out.push(b'u'),
            },
            other => out.push(other),
        }
        i += 1;
    }

    // The input was valid UTF-8 and escapes only ever insert whole scalar values.
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

fn decode_unicode_escape(rest: &[u8]) -> Option<char> {
    let digits = rest.get(..4)?;
    let mut value = 0u32;
    for &digit in digits {
        value = (value << 4) | from_hex(digit)? as u32;
    }
    char::from_u32(value)
}

fn from_hex(b: u8) -> Option<u8> {
    Some(match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + (b - b'a'),
        b'A'..=b'F' => 10 + (b - b'A'),
        _ => return None,
    })
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    for (idx, ch) in text.chars().enumerate() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            // Keys end at the first whitespace; values lose leading whitespace.
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                let code = c as u32;
                out.push_str("\\u00");
                out.push(HEX[((code >> 4) & 0x0F) as usize] as char);
                out.push(HEX[(code & 0x0F) as usize] as char);
            }
            c => out.push(c),
        }
    }
}
