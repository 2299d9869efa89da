use crate::token::TokenKind;

#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub line: u32,
    pub column: usize,
    pub node_type: AstNodeType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNodeType {
    Error,
    IntLiteral(i32),
    StrLiteral(String),
    Variable(String),
    Unary(Operator, Box<AstNode>),
    Binary(Operator, Box<AstNode>, Box<AstNode>),
    Call(Builtin, Vec<AstNode>),

    StatementList(Vec<AstNode>),
    Assign(String, Box<AstNode>),
    Increment(String),
    Decrement(String),
    If(Vec<Branch>),
    Loop(LoopTest, Box<AstNode>),
    Break,
    Continue,
    Print(Box<AstNode>),
    Read(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub test: Test,
    pub body: AstNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    Condition(AstNode),
    Otherwise,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopTest {
    Pre(Box<AstNode>),
    Post(Box<AstNode>),
    Never,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,

    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Neg,
}

impl Operator {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Sub,
            TokenKind::Star => Operator::Mul,
            TokenKind::Slash => Operator::Div,
            TokenKind::Percent => Operator::Mod,
            TokenKind::ShiftLeft => Operator::ShiftLeft,
            TokenKind::ShiftRight => Operator::ShiftRight,
            TokenKind::ShiftRightUnsigned => Operator::ShiftRightUnsigned,
            TokenKind::Equal => Operator::Equal,
            TokenKind::NotEqual => Operator::NotEqual,
            TokenKind::Greater => Operator::Greater,
            TokenKind::GreaterEqual => Operator::GreaterEqual,
            TokenKind::Less => Operator::Less,
            TokenKind::LessEqual => Operator::LessEqual,
            _ => return None,
        })
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Greater
                | Operator::GreaterEqual
                | Operator::Less
                | Operator::LessEqual
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub | Operator::Neg => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
            Operator::ShiftRightUnsigned => ">>>",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Builtin {
    ToStr,
    ToInt,
    Length,
    Left,
    Right,
    Format,
}

impl Builtin {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::ToStr => Some(Builtin::ToStr),
            TokenKind::ToInt => Some(Builtin::ToInt),
            TokenKind::Length => Some(Builtin::Length),
            TokenKind::Left => Some(Builtin::Left),
            TokenKind::Right => Some(Builtin::Right),
            TokenKind::Format => Some(Builtin::Format),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::ToStr | Builtin::ToInt | Builtin::Length => 1,
            Builtin::Left | Builtin::Right | Builtin::Format => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::ToStr => "str",
            Builtin::ToInt => "int",
            Builtin::Length => "length",
            Builtin::Left => "left",
            Builtin::Right => "right",
            Builtin::Format => "format",
        }
    }
}

impl AstNode {
    pub fn new(line: u32, column: usize, node_type: AstNodeType) -> Self {
        Self {
            line,
            column,
            node_type,
        }
    }
}
