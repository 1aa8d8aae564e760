//! Reduce rich clipboard formats (HTML, RTF) to plain text
//!
//! Only the text survives; formatting is dropped. These are lenient
//! scanners, not validating parsers: malformed input yields best-effort
//! text rather than an error.

/// Elements whose content is never visible text
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "head", "title", "template"];

/// Elements whose boundaries become line breaks
const BLOCK_ELEMENTS: &[&str] = &[
    "br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote",
    "ul", "ol", "table", "section", "article",
];

/// RTF destinations whose content is not document text
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "footer",
    "object",
    "themedata",
    "datastore",
    "listtable",
    "listoverridetable",
    "generator",
];

/// Strip tags and decode entities from an HTML fragment
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut hidden: Option<String> = None;
    let mut rest = html;

    while let Some(pos) = rest.find(['<', '&']) {
        if hidden.is_none() {
            out.push_str(&rest[..pos]);
        }
        rest = &rest[pos..];

        if rest.starts_with('&') {
            let (decoded, consumed) = decode_entity(rest);
            if hidden.is_none() {
                out.push_str(&decoded);
            }
            rest = &rest[consumed..];
            continue;
        }

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }

        let Some(end) = rest.find('>') else {
            // Unterminated tag: keep it as text
            if hidden.is_none() {
                out.push_str(rest);
            }
            rest = "";
            break;
        };
        let tag = &rest[1..end];
        rest = &rest[end + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(open) = &hidden {
            if closing && *open == name {
                hidden = None;
            }
            continue;
        }

        if !closing && HIDDEN_ELEMENTS.contains(&name.as_str()) && !tag.ends_with('/') {
            hidden = Some(name);
            continue;
        }

        if BLOCK_ELEMENTS.contains(&name.as_str()) && (closing || name == "br") && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    if hidden.is_none() {
        out.push_str(rest);
    }

    out.replace('\u{a0}', " ").trim().to_string()
}

/// Decode the entity at the start of `s`; returns (text, bytes consumed)
fn decode_entity(s: &str) -> (String, usize) {
    let Some(end) = s[1..].find(';').map(|i| i + 1).filter(|&i| i <= 12) else {
        return ("&".to_string(), 1);
    };
    let body = &s[1..end];

    let decoded = match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => body.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };

    match decoded {
        Some(c) => (c.to_string(), end + 1),
        None => ("&".to_string(), 1),
    }
}

/// Extract document text from an RTF byte stream
pub fn rtf_to_text(rtf: &[u8]) -> String {
    RtfScanner::new(rtf).run()
}

#[derive(Clone, Copy)]
struct GroupState {
    skip: bool,
    /// Fallback characters to drop after a `\uN` escape
    uc: usize,
}

struct RtfScanner<'a> {
    input: &'a [u8],
    pos: usize,
    out: String,
    stack: Vec<GroupState>,
    state: GroupState,
    /// Remaining fallback characters to drop
    pending_skip: usize,
    /// Set right after `{`, to recognise destinations
    group_start: bool,
}

impl<'a> RtfScanner<'a> {
    fn new(input: &'a [u8]) -> Self {
        RtfScanner {
            input,
            pos: 0,
            out: String::new(),
            stack: Vec::new(),
            state: GroupState { skip: false, uc: 1 },
            pending_skip: 0,
            group_start: false,
        }
    }

    fn run(mut self) -> String {
        while let Some(&byte) = self.input.get(self.pos) {
            self.pos += 1;
            match byte {
                b'{' => {
                    self.stack.push(self.state);
                    self.group_start = true;
                    self.pending_skip = 0;
                    continue;
                }
                b'}' => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                    self.pending_skip = 0;
                }
                b'\\' => self.control(),
                b'\r' | b'\n' => {}
                _ => self.emit_text(byte as char),
            }
            self.group_start = false;
        }

        self.out.trim().to_string()
    }

    fn control(&mut self) {
        let at_group_start = self.group_start;
        let input = self.input;
        let Some(&next) = input.get(self.pos) else {
            return;
        };

        if !next.is_ascii_alphabetic() {
            self.pos += 1;
            match next {
                b'\\' | b'{' | b'}' => self.emit_text(next as char),
                b'\'' => {
                    let hex = self.input.get(self.pos..self.pos + 2);
                    self.pos = (self.pos + 2).min(self.input.len());
                    let value = hex
                        .and_then(|h| std::str::from_utf8(h).ok())
                        .and_then(|h| u8::from_str_radix(h, 16).ok());
                    if let Some(value) = value {
                        // Windows-1252 approximated as Latin-1
                        self.emit_text(value as char);
                    }
                }
                b'*' if at_group_start => self.state.skip = true,
                b'~' => self.emit_text('\u{a0}'),
                b'-' | b'_' => {}
                _ => {}
            }
            return;
        }

        let start = self.pos;
        while self.input.get(self.pos).is_some_and(u8::is_ascii_alphabetic) {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&input[start..self.pos]).unwrap_or("");

        let num_start = self.pos;
        if self.input.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.input.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        let param: Option<i32> = std::str::from_utf8(&self.input[num_start..self.pos])
            .ok()
            .and_then(|n| n.parse().ok());

        // A single space delimits the control word and is consumed
        if self.input.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }

        if at_group_start && SKIPPED_DESTINATIONS.contains(&word) {
            self.state.skip = true;
            return;
        }

        match word {
            "par" | "line" | "row" => self.emit_text('\n'),
            "tab" | "cell" => self.emit_text('\t'),
            "uc" => self.state.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(code) = param {
                    // Negative values encode code points above 32767
                    let code = if code < 0 { code + 65536 } else { code };
                    if let Some(c) = char::from_u32(code as u32) {
                        self.emit_char(c);
                    }
                    self.pending_skip = self.state.uc;
                }
            }
            "emdash" => self.emit_text('\u{2014}'),
            "endash" => self.emit_text('\u{2013}'),
            "bullet" => self.emit_text('\u{2022}'),
            "lquote" => self.emit_text('\u{2018}'),
            "rquote" => self.emit_text('\u{2019}'),
            "ldblquote" => self.emit_text('\u{201c}'),
            "rdblquote" => self.emit_text('\u{201d}'),
            _ => {}
        }
    }

    /// Emit one document character, unless it is the fallback of a `\uN`
    fn emit_text(&mut self, c: char) {
        if self.pending_skip > 0 {
            self.pending_skip -= 1;
            return;
        }
        self.emit_char(c);
    }

    fn emit_char(&mut self, c: char) {
        if !self.state.skip {
            self.out.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_strips_tags_and_decodes_entities() {
        let html = "<html><head><title>T</title><style>p{}</style></head>\
                    <body><p>Fish &amp; Chips</p><p>5 &lt; 6&nbsp;&#33;&#x3F;</p></body></html>";
        assert_eq!(html_to_text(html), "Fish & Chips\n5 < 6 !?");
    }

    #[test]
    fn test_html_line_breaks_and_comments() {
        let html = "one<br>two<br/><!-- hidden -->three<script>alert(1)</script>";
        assert_eq!(html_to_text(html), "one\ntwo\nthree");
    }

    #[test]
    fn test_html_leaves_stray_ampersands() {
        assert_eq!(html_to_text("salt & pepper &bogus; a<b"), "salt & pepper &bogus; a<b");
    }

    #[test]
    fn test_rtf_basic_document() {
        let rtf = br"{\rtf1\ansi\deff0{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red255\green0\blue0;}
\f0\fs24 Hello \b World\b0\par
Second line\tab end}";
        assert_eq!(rtf_to_text(rtf), "Hello World\nSecond line\tend");
    }

    #[test]
    fn test_rtf_escapes_and_unicode() {
        let rtf = br"{\rtf1 caf\'e9 \{x\} \\ \u8364? \uc2\u916 ab done}";
        assert_eq!(rtf_to_text(rtf), "caf\u{e9} {x} \\ \u{20ac} \u{394} done");
    }

    #[test]
    fn test_rtf_unicode_with_hex_fallback() {
        assert_eq!(rtf_to_text(br"{\rtf1\ansi\uc1 caf\u233\'e9 ok}"), "caf\u{e9} ok");
        assert_eq!(
            rtf_to_text(br"{\rtf1\uc2 \u8212\'97\'97 dash\uc1\u8220\ldblquote x}"),
            "\u{2014} dash\u{201c}x"
        );
    }

    #[test]
    fn test_rtf_skips_ignorable_destinations() {
        let rtf = br"{\rtf1{\*\generator Writer;}{\*\unknown secret}visible}";
        assert_eq!(rtf_to_text(rtf), "visible");
    }
}
