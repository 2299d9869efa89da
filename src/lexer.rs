use fnv::FnvHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::token::{Pattern, TokenDef, TokenKind, IDENTIFIER_KIND, PATTERN_TABLE, RADIX_MARKER, SKIP_PATTERN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: usize,
    pub length: usize,
}

impl Lexeme {
    pub fn new(kind: TokenKind, text: &str, line: u32, column: usize, length: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            line,
            column,
            length,
        }
    }
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("token pattern for {kind:?} does not compile")]
    Invalid {
        kind: TokenKind,
        #[source]
        source: regex::Error,
    },
    #[error("combined token pattern does not compile")]
    Combined(#[source] regex::Error),
    #[error("token table has no pattern for the identifier kind")]
    MissingIdentifier,
}

#[derive(Debug)]
pub struct TokenMatcher {
    tokens: Regex,
    skip: Regex,
    groups: Vec<(&'static str, TokenKind)>,
    keywords: FnvHashMap<&'static str, TokenKind>,
}

static DEFAULT_MATCHER: Lazy<TokenMatcher> = Lazy::new(|| {
    TokenMatcher::new(PATTERN_TABLE, IDENTIFIER_KIND).expect("built-in token table compiles")
});

impl TokenMatcher {
    pub fn new(table: &[TokenDef], identifier: TokenKind) -> Result<Self, PatternError> {
        let identifier_pattern = table
            .iter()
            .find_map(|def| match (def.kind == identifier, def.pattern) {
                (true, Pattern::Regex(fragment)) => Some(fragment),
                _ => None,
            })
            .ok_or(PatternError::MissingIdentifier)?;
        let whole_identifier = Regex::new(&format!("^(?:{})$", identifier_pattern)).map_err(|source| {
            PatternError::Invalid {
                kind: identifier,
                source,
            }
        })?;

        let mut keywords = FnvHashMap::default();
        let mut regex_groups = Vec::new();
        let mut symbol_groups = Vec::new();
        for def in table {
            match def.pattern {
                Pattern::Synthetic => (),
                Pattern::Literal(text) if whole_identifier.is_match(text) => {
                    keywords.insert(text, def.kind);
                }
                Pattern::Literal(text) => symbol_groups.push((text.chars().count(), regex::escape(text), def.kind)),
                Pattern::Regex(fragment) => {
                    Regex::new(fragment).map_err(|source| PatternError::Invalid {
                        kind: def.kind,
                        source,
                    })?;
                    regex_groups.push((fragment.to_string(), def.kind));
                }
            }
        }
        // Longest symbol first: alternation is leftmost-first, so `>>>`
        // has to be tried before `>>` and `>`.
        symbol_groups.sort_by(|a, b| b.0.cmp(&a.0));

        let groups: Vec<(String, TokenKind)> = regex_groups
            .into_iter()
            .chain(symbol_groups.into_iter().map(|(_, text, kind)| (text, kind)))
            .collect();
        let alternation = groups
            .iter()
            .map(|(fragment, kind)| format!("(?P<{}>{})", kind.group_name(), fragment))
            .collect::<Vec<_>>()
            .join("|");
        let tokens = Regex::new(&format!("^(?:{})", alternation)).map_err(PatternError::Combined)?;
        let skip = Regex::new(&format!("^{}", SKIP_PATTERN)).map_err(PatternError::Combined)?;

        Ok(Self {
            tokens,
            skip,
            groups: groups.into_iter().map(|(_, kind)| (kind.group_name(), kind)).collect(),
            keywords,
        })
    }

    pub fn keyword(&self, text: &str) -> Option<TokenKind> {
        self.keywords.get(text).copied()
    }
}

pub struct Lexer<'a> {
    matcher: &'static TokenMatcher,
    source: &'a str,
    current: usize,
    line: u32,
    line_start: usize,
    at_end: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_matcher(source, &DEFAULT_MATCHER)
    }

    pub fn with_matcher(source: &'a str, matcher: &'static TokenMatcher) -> Self {
        Self {
            matcher,
            source,
            current: 0,
            line: 1,
            line_start: 0,
            at_end: false,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> usize {
        self.source[self.line_start..self.current].chars().count() + 1
    }

    pub fn scan(&mut self) -> Lexeme {
        self.skip_whitespace();
        let column = self.column();
        if self.at_end || self.current >= self.source.len() {
            self.at_end = true;
            return Lexeme::new(TokenKind::Eof, "", self.line, column, 0);
        }

        let rest = &self.source[self.current..];
        let found = self.matcher.tokens.captures(rest).and_then(|captures| {
            self.matcher
                .groups
                .iter()
                .find_map(|(name, kind)| captures.name(name).map(|m| (*kind, m.as_str())))
        });

        let lexeme = match found {
            Some((kind, text)) if !text.is_empty() => {
                let kind = if kind == IDENTIFIER_KIND {
                    self.matcher.keyword(text).unwrap_or(kind)
                } else {
                    kind
                };
                let length = text.chars().count();
                let mut lexeme = Lexeme::new(kind, text, self.line, column, length);
                if kind == TokenKind::Number {
                    lexeme.text = normalize_number(text);
                }
                self.current += text.len();
                lexeme
            }
            _ => {
                let len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                let text = &rest[..len];
                self.current += len;
                Lexeme::new(TokenKind::Unmatched, text, self.line, column, 1)
            }
        };

        tracing::trace!(kind = ?lexeme.kind, text = %lexeme.text, line = lexeme.line, "scanned");
        lexeme
    }

    fn skip_whitespace(&mut self) -> () {
        let rest = &self.source[self.current..];
        let skipped = self.matcher.skip.find(rest).map(|m| m.end()).unwrap_or(0);
        for (offset, c) in rest[..skipped].char_indices() {
            if c == '\n' {
                self.line += 1;
                self.line_start = self.current + offset + 1;
            }
        }
        self.current += skipped;
    }
}

fn normalize_number(text: &str) -> String {
    match text.strip_prefix(RADIX_MARKER) {
        Some(digits) => match i64::from_str_radix(digits, 16) {
            Ok(value) if value <= i32::MAX as i64 => value.to_string(),
            _ => text.to_string(),
        },
        None => text.to_string(),
    }
}
