use crate::ast::{AstNode, AstNodeType, Branch, Builtin, LoopTest, Operator, Test};
use crate::common::{Diagnostics, ErrorKind};
use crate::lexer::{Lexeme, Lexer};
use crate::token::TokenKind;

pub struct Parser<'a, 'd> {
    lexer: Lexer<'a>,
    current: Lexeme,
    diagnostics: &'d mut Diagnostics,
    panic_mode: bool,
}

const RELATIONAL_OPS: &[TokenKind] = &[
    TokenKind::Less,
    TokenKind::LessEqual,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
    TokenKind::Equal,
    TokenKind::NotEqual,
];

const ADD_OPS: &[TokenKind] = &[TokenKind::Plus, TokenKind::Minus];

const MUL_OPS: &[TokenKind] = &[
    TokenKind::Star,
    TokenKind::Slash,
    TokenKind::Percent,
    TokenKind::ShiftLeft,
    TokenKind::ShiftRight,
    TokenKind::ShiftRightUnsigned,
];

const TERM_START: &[TokenKind] = &[
    TokenKind::Identifier,
    TokenKind::Number,
    TokenKind::Str,
    TokenKind::Minus,
    TokenKind::LeftParen,
    TokenKind::ToInt,
    TokenKind::ToStr,
    TokenKind::Length,
    TokenKind::Left,
    TokenKind::Right,
    TokenKind::Format,
];

impl<'a, 'd> Parser<'a, 'd> {
    pub fn new(lexer: Lexer<'a>, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            lexer,
            current: Lexeme::new(TokenKind::Unmatched, "", 0, 0, 0),
            diagnostics,
            panic_mode: false,
        }
    }

    pub fn advance(&mut self) -> () {
        loop {
            self.current = self.lexer.scan();
            if self.current.kind != TokenKind::Unmatched {
                break;
            }
            let message = format!("Unexpected character '{}'", printable(&self.current.text));
            self.diagnostics.report_span(
                ErrorKind::Lexical,
                self.current.line,
                self.current.column,
                self.current.length,
                &message,
            );
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn check_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.current.kind)
    }

    fn match_tok(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        self.consume_any(&[kind])
    }

    fn consume_any(&mut self, kinds: &[TokenKind]) -> bool {
        if self.check_any(kinds) {
            self.advance();
            true
        } else {
            let expected = kinds
                .iter()
                .map(|k| format!("'{}'", k.display()))
                .collect::<Vec<_>>()
                .join(", ");
            let found = match self.current.kind {
                TokenKind::Eof => "end of file".to_string(),
                _ => format!("'{}'", self.current.text),
            };
            self.error_at_current(&format!("Found {} when expecting {}", found, expected));
            false
        }
    }

    fn error_at_current(&mut self, message: &str) -> () {
        // Silence errors until the next statement starts
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.diagnostics.report_span(
            ErrorKind::Syntax,
            self.current.line,
            self.current.column,
            self.current.length,
            message,
        );
    }

    fn node(&self, lexeme: &Lexeme, node_type: AstNodeType) -> AstNode {
        AstNode::new(lexeme.line, lexeme.column, node_type)
    }

    pub fn program(&mut self) -> AstNode {
        self.advance();
        let mut statements = Vec::new();
        loop {
            self.statement_list_into(&mut statements);
            if self.check(TokenKind::Eof) {
                break;
            }
            self.consume(TokenKind::Eof);
            // skip the offending token and carry on looking for statements
            self.advance();
        }
        AstNode::new(1, 1, AstNodeType::StatementList(statements))
    }

    fn statement_list(&mut self) -> AstNode {
        let start = self.current.clone();
        let mut statements = Vec::new();
        self.statement_list_into(&mut statements);
        self.node(&start, AstNodeType::StatementList(statements))
    }

    fn statement_list_into(&mut self, statements: &mut Vec<AstNode>) -> () {
        loop {
            while self.match_tok(TokenKind::SemiColon) {}
            let statement = match self.current.kind {
                TokenKind::If => self.if_statement(),
                TokenKind::While => self.while_statement(),
                TokenKind::Do => self.do_statement(),
                TokenKind::Print => self.print_statement(),
                TokenKind::Read => self.read_statement(),
                TokenKind::Identifier => self.assignment(),
                TokenKind::Break | TokenKind::Continue => {
                    let node_type = if self.check(TokenKind::Break) {
                        AstNodeType::Break
                    } else {
                        AstNodeType::Continue
                    };
                    let node = self.node(&self.current, node_type);
                    self.advance();
                    node
                }
                _ => return,
            };
            self.panic_mode = false;
            statements.push(statement);
        }
    }

    fn if_statement(&mut self) -> AstNode {
        let start = self.current.clone();
        self.advance();
        let mut branches = Vec::new();
        let test = self.expression();
        self.consume(TokenKind::Then);
        branches.push(Branch {
            test: Test::Condition(test),
            body: self.statement_list(),
        });
        while self.match_tok(TokenKind::Elif) {
            let test = self.expression();
            self.consume(TokenKind::Then);
            branches.push(Branch {
                test: Test::Condition(test),
                body: self.statement_list(),
            });
        }
        if self.match_tok(TokenKind::Else) {
            branches.push(Branch {
                test: Test::Otherwise,
                body: self.statement_list(),
            });
        }
        self.consume(TokenKind::End);
        self.node(&start, AstNodeType::If(branches))
    }

    fn while_statement(&mut self) -> AstNode {
        let start = self.current.clone();
        self.advance();
        let test = self.expression();
        self.consume(TokenKind::Do);
        let body = self.statement_list();
        self.consume(TokenKind::End);
        self.node(&start, AstNodeType::Loop(LoopTest::Pre(Box::new(test)), Box::new(body)))
    }

    fn do_statement(&mut self) -> AstNode {
        let start = self.current.clone();
        self.advance();
        let body = self.statement_list();
        let test = if self.match_tok(TokenKind::Until) {
            LoopTest::Post(Box::new(self.expression()))
        } else {
            self.consume_any(&[TokenKind::End, TokenKind::Until]);
            LoopTest::Never
        };
        self.node(&start, AstNodeType::Loop(test, Box::new(body)))
    }

    fn print_statement(&mut self) -> AstNode {
        let start = self.current.clone();
        self.advance();
        let mut prints = Vec::new();
        loop {
            let item = self.expression();
            prints.push(AstNode::new(item.line, item.column, AstNodeType::Print(Box::new(item))));
            if !self.match_tok(TokenKind::Comma) {
                break;
            }
        }
        self.node(&start, AstNodeType::StatementList(prints))
    }

    fn read_statement(&mut self) -> AstNode {
        let start = self.current.clone();
        self.advance();
        let mut reads = Vec::new();
        loop {
            let name = self.current.clone();
            if self.consume(TokenKind::Identifier) {
                reads.push(self.node(&name, AstNodeType::Read(name.text.clone())));
            }
            if !self.match_tok(TokenKind::Comma) {
                break;
            }
        }
        self.node(&start, AstNodeType::StatementList(reads))
    }

    fn assignment(&mut self) -> AstNode {
        let name = self.current.clone();
        self.advance();
        if self.match_tok(TokenKind::Increment) {
            self.node(&name, AstNodeType::Increment(name.text.clone()))
        } else if self.match_tok(TokenKind::Decrement) {
            self.node(&name, AstNodeType::Decrement(name.text.clone()))
        } else {
            self.consume_any(&[TokenKind::Assign, TokenKind::Increment, TokenKind::Decrement]);
            let value = self.expression();
            self.node(&name, AstNodeType::Assign(name.text.clone(), Box::new(value)))
        }
    }

    pub fn expression(&mut self) -> AstNode {
        let lhs = self.add_expression();
        if self.check_any(RELATIONAL_OPS) {
            let op = self.current.clone();
            self.advance();
            let rhs = self.add_expression();
            return self.binary(&op, lhs, rhs);
        }
        lhs
    }

    fn add_expression(&mut self) -> AstNode {
        let mut node = self.mul_expression();
        while self.check_any(ADD_OPS) {
            let op = self.current.clone();
            self.advance();
            let rhs = self.mul_expression();
            node = self.binary(&op, node, rhs);
        }
        node
    }

    fn mul_expression(&mut self) -> AstNode {
        let mut node = self.term();
        while self.check_any(MUL_OPS) {
            let op = self.current.clone();
            self.advance();
            let rhs = self.term();
            node = self.binary(&op, node, rhs);
        }
        node
    }

    fn binary(&self, op: &Lexeme, lhs: AstNode, rhs: AstNode) -> AstNode {
        match Operator::from_token(op.kind) {
            Some(operator) => self.node(op, AstNodeType::Binary(operator, Box::new(lhs), Box::new(rhs))),
            None => self.node(op, AstNodeType::Error),
        }
    }

    fn term(&mut self) -> AstNode {
        let token = self.current.clone();
        match token.kind {
            TokenKind::LeftParen => {
                self.advance();
                let node = self.expression();
                self.consume(TokenKind::RightParen);
                node
            }
            TokenKind::Identifier => {
                self.advance();
                self.node(&token, AstNodeType::Variable(token.text.clone()))
            }
            TokenKind::Number => {
                self.advance();
                match token.text.parse::<i32>() {
                    Ok(value) => self.node(&token, AstNodeType::IntLiteral(value)),
                    Err(_) => {
                        self.diagnostics.report_span(
                            ErrorKind::Syntax,
                            token.line,
                            token.column,
                            token.length,
                            &format!("Number {} is out of range", token.text),
                        );
                        self.node(&token, AstNodeType::Error)
                    }
                }
            }
            TokenKind::Str => {
                self.advance();
                let inner = token.text.trim_start_matches('"').trim_end_matches('"');
                self.node(&token, AstNodeType::StrLiteral(inner.to_string()))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.term();
                self.node(&token, AstNodeType::Unary(Operator::Neg, Box::new(operand)))
            }
            kind => match Builtin::from_token(kind) {
                Some(builtin) => self.call(builtin),
                None => {
                    self.consume_any(TERM_START);
                    self.node(&token, AstNodeType::Error)
                }
            },
        }
    }

    fn call(&mut self, builtin: Builtin) -> AstNode {
        let token = self.current.clone();
        self.advance();
        self.consume(TokenKind::LeftParen);
        let mut args = vec![self.expression()];
        while self.match_tok(TokenKind::Comma) {
            args.push(self.expression());
        }
        self.consume(TokenKind::RightParen);
        if args.len() != builtin.arity() {
            self.diagnostics.report_span(
                ErrorKind::Syntax,
                token.line,
                token.column,
                token.length,
                &format!(
                    "'{}' takes {} argument(s) but {} were given",
                    builtin.name(),
                    builtin.arity(),
                    args.len()
                ),
            );
            return self.node(&token, AstNodeType::Error);
        }
        self.node(&token, AstNodeType::Call(builtin, args))
    }
}

fn printable(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c < ' ' || c > '~' {
                format!("\\u{:04x}", c as u32)
            } else {
                c.to_string()
            }
        })
        .collect()
}

pub fn parse(source: &str, diagnostics: &mut Diagnostics) -> AstNode {
    let mut parser = Parser::new(Lexer::new(source), diagnostics);
    parser.program()
}
