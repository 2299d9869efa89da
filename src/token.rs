#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Unmatched,

    Number,
    Identifier,
    Str,

    If,
    Then,
    Elif,
    Else,
    End,
    While,
    Do,
    Until,
    Print,
    Read,
    Break,
    Continue,

    Assign,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Increment,
    Decrement,

    SemiColon,
    Comma,
    LeftParen,
    RightParen,

    ToStr,
    ToInt,
    Length,
    Left,
    Right,
    Format,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pattern {
    Synthetic,
    Literal(&'static str),
    Regex(&'static str),
}

#[derive(Debug)]
pub struct TokenDef {
    pub kind: TokenKind,
    pub pattern: Pattern,
    pub display: &'static str,
}

const fn synthetic(kind: TokenKind, display: &'static str) -> TokenDef {
    TokenDef {
        kind,
        pattern: Pattern::Synthetic,
        display,
    }
}

const fn literal(kind: TokenKind, text: &'static str) -> TokenDef {
    TokenDef {
        kind,
        pattern: Pattern::Literal(text),
        display: text,
    }
}

const fn regex(kind: TokenKind, fragment: &'static str, display: &'static str) -> TokenDef {
    TokenDef {
        kind,
        pattern: Pattern::Regex(fragment),
        display,
    }
}

pub const IDENTIFIER_KIND: TokenKind = TokenKind::Identifier;

pub const SKIP_PATTERN: &str = r"(?:\s+|//[^\n]*)*";

pub const RADIX_MARKER: char = '#';

pub static PATTERN_TABLE: &[TokenDef] = &[
    synthetic(TokenKind::Eof, "<end of file>"),
    synthetic(TokenKind::Unmatched, "<unmatched>"),
    regex(TokenKind::Number, r"[0-9]+|#[0-9A-Fa-f]+", "<number>"),
    regex(TokenKind::Identifier, r"[A-Za-z][A-Za-z0-9_]*\$?", "<identifier>"),
    regex(TokenKind::Str, r#""[^"\n]*""#, "<string>"),
    literal(TokenKind::If, "if"),
    literal(TokenKind::Then, "then"),
    literal(TokenKind::Elif, "elif"),
    literal(TokenKind::Else, "else"),
    literal(TokenKind::End, "end"),
    literal(TokenKind::While, "while"),
    literal(TokenKind::Do, "do"),
    literal(TokenKind::Until, "until"),
    literal(TokenKind::Print, "print"),
    literal(TokenKind::Read, "read"),
    literal(TokenKind::Break, "break"),
    literal(TokenKind::Continue, "continue"),
    literal(TokenKind::Assign, "="),
    literal(TokenKind::Equal, "=="),
    literal(TokenKind::NotEqual, "!="),
    literal(TokenKind::Greater, ">"),
    literal(TokenKind::GreaterEqual, ">="),
    literal(TokenKind::Less, "<"),
    literal(TokenKind::LessEqual, "<="),
    literal(TokenKind::ShiftLeft, "<<"),
    literal(TokenKind::ShiftRight, ">>"),
    literal(TokenKind::ShiftRightUnsigned, ">>>"),
    literal(TokenKind::Plus, "+"),
    literal(TokenKind::Minus, "-"),
    literal(TokenKind::Star, "*"),
    literal(TokenKind::Slash, "/"),
    literal(TokenKind::Percent, "%"),
    literal(TokenKind::Increment, "++"),
    literal(TokenKind::Decrement, "--"),
    literal(TokenKind::SemiColon, ";"),
    literal(TokenKind::Comma, ","),
    literal(TokenKind::LeftParen, "("),
    literal(TokenKind::RightParen, ")"),
    literal(TokenKind::ToStr, "str"),
    literal(TokenKind::ToInt, "int"),
    literal(TokenKind::Length, "length"),
    literal(TokenKind::Left, "left"),
    literal(TokenKind::Right, "right"),
    literal(TokenKind::Format, "format"),
];

impl TokenKind {
    pub fn def(self) -> &'static TokenDef {
        // Every kind has exactly one entry; see `table_covers_every_kind`.
        PATTERN_TABLE
            .iter()
            .find(|def| def.kind == self)
            .unwrap_or(&PATTERN_TABLE[1])
    }

    pub fn display(self) -> &'static str {
        self.def().display
    }

    pub fn group_name(self) -> &'static str {
        match self {
            TokenKind::Eof => "Eof",
            TokenKind::Unmatched => "Unmatched",
            TokenKind::Number => "Number",
            TokenKind::Identifier => "Identifier",
            TokenKind::Str => "Str",
            TokenKind::If => "If",
            TokenKind::Then => "Then",
            TokenKind::Elif => "Elif",
            TokenKind::Else => "Else",
            TokenKind::End => "End",
            TokenKind::While => "While",
            TokenKind::Do => "Do",
            TokenKind::Until => "Until",
            TokenKind::Print => "Print",
            TokenKind::Read => "Read",
            TokenKind::Break => "Break",
            TokenKind::Continue => "Continue",
            TokenKind::Assign => "Assign",
            TokenKind::Equal => "Equal",
            TokenKind::NotEqual => "NotEqual",
            TokenKind::Greater => "Greater",
            TokenKind::GreaterEqual => "GreaterEqual",
            TokenKind::Less => "Less",
            TokenKind::LessEqual => "LessEqual",
            TokenKind::ShiftLeft => "ShiftLeft",
            TokenKind::ShiftRight => "ShiftRight",
            TokenKind::ShiftRightUnsigned => "ShiftRightUnsigned",
            TokenKind::Plus => "Plus",
            TokenKind::Minus => "Minus",
            TokenKind::Star => "Star",
            TokenKind::Slash => "Slash",
            TokenKind::Percent => "Percent",
            TokenKind::Increment => "Increment",
            TokenKind::Decrement => "Decrement",
            TokenKind::SemiColon => "SemiColon",
            TokenKind::Comma => "Comma",
            TokenKind::LeftParen => "LeftParen",
            TokenKind::RightParen => "RightParen",
            TokenKind::ToStr => "ToStr",
            TokenKind::ToInt => "ToInt",
            TokenKind::Length => "Length",
            TokenKind::Left => "Left",
            TokenKind::Right => "Right",
            TokenKind::Format => "Format",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_covers_every_kind() {
        let mut seen = HashSet::new();
        for def in PATTERN_TABLE {
            assert!(seen.insert(def.kind), "{:?} declared twice", def.kind);
            assert_eq!(def.kind.def().kind, def.kind);
        }
        assert_eq!(seen.len(), 44);
    }

    #[test]
    fn group_names_are_distinct() {
        let names: HashSet<_> = PATTERN_TABLE.iter().map(|d| d.kind.group_name()).collect();
        assert_eq!(names.len(), PATTERN_TABLE.len());
    }

    #[test]
    fn literal_tokens_display_their_text() {
        assert_eq!(TokenKind::Then.display(), "then");
        assert_eq!(TokenKind::ShiftRightUnsigned.display(), ">>>");
        assert_eq!(TokenKind::Identifier.display(), "<identifier>");
    }
}
