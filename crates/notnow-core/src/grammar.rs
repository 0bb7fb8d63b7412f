//! Command text grammar shared by the parser and the replay engine.
//!
//! An occurrence is `<marker> <name>[ <args>]`, where the argument span runs
//! to the end of the line, the next occurrence, or the end of the text.

use regex::Regex;

pub const DEFAULT_MARKER: &str = "/notnow";

/// One command occurrence located in a text blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence<'a> {
    pub name: &'a str,
    pub args: &'a str,
    pub raw: &'a str,
    /// Byte offset of the marker in the scanned text.
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct CommandGrammar {
    marker: String,
    pattern: Regex,
}

impl CommandGrammar {
    pub fn new(marker: &str) -> Self {
        let marker = marker.trim();
        let marker = if marker.is_empty() { DEFAULT_MARKER } else { marker };
        let pattern = Regex::new(&format!(r"{}[ \t]+(\w+)", regex::escape(marker)))
            .expect("regex");
        Self {
            marker: marker.to_string(),
            pattern,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn contains_command(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn scan<'a>(&self, text: &'a str) -> Vec<Occurrence<'a>> {
        let matches: Vec<_> = self.pattern.captures_iter(text).collect();
        let mut occurrences = Vec::with_capacity(matches.len());
        for (idx, caps) in matches.iter().enumerate() {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let args_start = whole.end();
            let line_end = text[args_start..]
                .find('\n')
                .map(|offset| args_start + offset)
                .unwrap_or(text.len());
            let next_start = matches
                .get(idx + 1)
                .and_then(|next| next.get(0))
                .map(|next| next.start())
                .unwrap_or(text.len());
            let end = line_end.min(next_start);
            occurrences.push(Occurrence {
                name: name.as_str(),
                args: text[args_start..end].trim(),
                raw: text[whole.start()..end].trim_end(),
                position: whole.start(),
            });
        }
        occurrences
    }
}

impl Default for CommandGrammar {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// True when any part of the token was inside double quotes.
    pub quoted: bool,
}

impl Token {
    /// `--name` or a two-character `-x`; quoted tokens never qualify.
    pub fn is_option_like(&self) -> bool {
        if self.quoted {
            return false;
        }
        if let Some(rest) = self.text.strip_prefix("--") {
            return !rest.is_empty();
        }
        self.text.len() == 2 && self.text.starts_with('-')
    }
}

/// Splits argument text on unquoted whitespace. `\"` yields a literal quote
/// without toggling quoting mode.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                started = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        quoted,
                    });
                }
                started = false;
                quoted = false;
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        tokens.push(Token {
            text: current,
            quoted,
        });
    }
    tokens
}
