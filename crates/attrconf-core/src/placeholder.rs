//! Placeholder scanning and substitution
//!
//! Placeholders have the form `${name}`. Names may contain placeholders
//! themselves (`${model.${kind}}`) and may start with `.` to refer to a
//! sibling of the owning key (`${.dim}`).

use crate::error::Result;

/// Scanner over text that may contain `${...}` placeholders
///
/// Works on byte offsets: `$`, `{` and `}` are ASCII so every offset the
/// scanner stops at is a char boundary.
struct PlaceholderScanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PlaceholderScanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos + 1).copied()
    }

    fn check_placeholder_start(&self) -> bool {
        self.current() == Some(b'$') && self.peek() == Some(b'{')
    }

    /// Spans of the outermost placeholders, as `(open, close)` offsets of
    /// the `${` and the matching `}`
    fn outer_spans(&mut self) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut opens: Vec<usize> = Vec::new();

        while !self.is_eof() {
            if self.check_placeholder_start() {
                opens.push(self.pos);
                self.pos += 2;
                continue;
            }
            if self.current() == Some(b'}') {
                if let Some(open) = opens.pop() {
                    if opens.is_empty() {
                        spans.push((open, self.pos));
                    }
                }
            }
            self.pos += 1;
        }

        spans
    }
}

/// Find all placeholder names in `text`
///
/// Each outermost placeholder is reported with its raw contents, followed
/// by the placeholders found inside it. Unclosed `${` and stray `}` are
/// left alone.
///
/// ```
/// use attrconf_core::placeholder::find_placeholders;
///
/// assert_eq!(find_placeholders("${a}.${b}"), vec!["a", "b"]);
/// assert_eq!(find_placeholders("${a${b}}"), vec!["a${b}", "b"]);
/// ```
pub fn find_placeholders(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    collect_placeholders(text, &mut names);
    names
}

fn collect_placeholders(text: &str, names: &mut Vec<String>) {
    for (open, close) in PlaceholderScanner::new(text).outer_spans() {
        let inner = &text[open + 2..close];
        names.push(inner.to_string());
        collect_placeholders(inner, names);
    }
}

/// Whether `text` contains at least one complete placeholder
pub fn contains_placeholder(text: &str) -> bool {
    text.contains("${") && !PlaceholderScanner::new(text).outer_spans().is_empty()
}

/// Whether a placeholder name is built from other placeholders
pub fn is_dynamic(name: &str) -> bool {
    name.contains("${")
}

/// If `text` is exactly one placeholder and nothing else, its name
///
/// `"${a}"` qualifies; `"${a}!"`, `"${a}${b}"` and `"${a${b}}"` do not.
pub fn pure_reference(text: &str) -> Option<&str> {
    match PlaceholderScanner::new(text).outer_spans().as_slice() {
        [(0, close)] if *close + 1 == text.len() => {
            let name = &text[2..*close];
            (!is_dynamic(name)).then_some(name)
        }
        _ => None,
    }
}

/// Resolve a `.`-prefixed name against the key that owns it
///
/// The owner's text up to its last `.` (or the whole owner when it has no
/// `.`) is prepended to the name.
///
/// ```
/// use attrconf_core::placeholder::resolve_relative;
///
/// assert_eq!(resolve_relative("model.dim", ".hidden"), "model.hidden");
/// assert_eq!(resolve_relative("dim", "hidden"), "hidden");
/// ```
pub fn resolve_relative(owner: &str, name: &str) -> String {
    if !name.starts_with('.') {
        return name.to_string();
    }
    let prefix = owner.rsplit_once('.').map_or(owner, |(prefix, _)| prefix);
    format!("{}{}", prefix, name)
}

/// Replace every placeholder in `text` with the text `lookup` returns
///
/// Inner placeholders are replaced before the name of the enclosing one is
/// looked up. Substituted text is not scanned again, so a value containing
/// `${` stays literal. Unclosed `${` and stray `}` are kept as written.
pub fn render<F>(text: &str, mut lookup: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut scanner = PlaceholderScanner::new(text);
    // Bottom buffer is the output; one buffer per open placeholder above it
    let mut buffers = vec![String::new()];
    let mut literal_start = 0;

    while !scanner.is_eof() {
        if scanner.check_placeholder_start() {
            push_top(&mut buffers, &text[literal_start..scanner.pos]);
            buffers.push(String::new());
            scanner.pos += 2;
            literal_start = scanner.pos;
            continue;
        }
        if scanner.current() == Some(b'}') && buffers.len() > 1 {
            push_top(&mut buffers, &text[literal_start..scanner.pos]);
            let name = buffers.pop().unwrap_or_default();
            let rendered = lookup(&name)?;
            push_top(&mut buffers, &rendered);
            scanner.pos += 1;
            literal_start = scanner.pos;
            continue;
        }
        scanner.pos += 1;
    }
    push_top(&mut buffers, &text[literal_start..]);

    // Unclosed placeholders fold back into their parent as literal text
    while buffers.len() > 1 {
        let unclosed = buffers.pop().unwrap_or_default();
        push_top(&mut buffers, "${");
        push_top(&mut buffers, &unclosed);
    }

    Ok(buffers.pop().unwrap_or_default())
}

fn push_top(buffers: &mut [String], text: &str) {
    if let Some(top) = buffers.last_mut() {
        top.push_str(text);
    }
}
