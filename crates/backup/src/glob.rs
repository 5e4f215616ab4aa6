//! Shell-style glob patterns for `database.table` identifiers.
//!
//! | Pattern    | Matches                                          |
//! |------------|--------------------------------------------------|
//! | `*`        | any sequence of characters except `/`            |
//! | `?`        | exactly one character except `/`                 |
//! | `[abc]`    | one of the listed characters                     |
//! | `[a-z]`    | one character in the range                       |
//! | `[!a-z]`   | one character *not* in the range (`^` works too) |
//! | `\x`       | the literal character `x`                        |
//!
//! Patterns are compiled to an anchored [`Regex`] once and reused for every
//! table.

use regex::Regex;

#[derive(Debug, Clone)]
pub(crate) struct Glob(Regex);
impl Glob {
    /// Compile a pattern. Malformed patterns (unclosed `[`, trailing `\`)
    /// return `None`, and callers treat them as matching nothing.
    pub(crate) fn new(pattern: &str) -> Option<Self> {
        Regex::new(&translate(pattern)?).ok().map(Self)
    }

    pub(crate) fn is_match(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }
}

fn translate(pattern: &str) -> Option<String> {
    let mut regex = String::with_capacity(pattern.len() * 2 + 2);
    regex.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '\\' => push_literal(&mut regex, chars.next()?),
            '[' => {
                regex.push('[');
                if chars.next_if(|&c| matches!(c, '!' | '^')).is_some() {
                    regex.push('^');
                }
                let mut empty = true;
                loop {
                    match chars.next()? {
                        // A `]` straight after the opening bracket is a literal.
                        ']' if !empty => break,
                        '-' if !empty && chars.peek().is_some_and(|next| *next != ']') => regex.push('-'),
                        '\\' => push_class_literal(&mut regex, chars.next()?),
                        c => push_class_literal(&mut regex, c),
                    }
                    empty = false;
                }
                regex.push(']');
            },
            c => push_literal(&mut regex, c),
        }
    }
    regex.push('$');
    Some(regex)
}

fn push_literal(regex: &mut String, c: char) {
    let mut buffer = [0; 4];
    regex.push_str(&regex::escape(c.encode_utf8(&mut buffer)));
}

fn push_class_literal(regex: &mut String, c: char) {
    if c.is_ascii_punctuation() {
        regex.push('\\');
    }
    regex.push(c);
}
