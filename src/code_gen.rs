use crate::ast::{AstNode, AstNodeType, Branch, Builtin, LoopTest, Operator, Test};
use crate::chunk::{ArithOp, Instruction, LibraryCall, Listing, Relation};
use crate::common::{Diagnostics, ErrorKind, ValueType};
use crate::scope::{Binding, Constant, Label, LoopLabel, ScopeStack};

const ARGS_NAME: &str = "ARGS TO MAIN";

pub const PROGRAM_NAME: &str = "^PROGRAM";

pub struct Generator<'d> {
    listing: Listing,
    scopes: ScopeStack,
    diagnostics: &'d mut Diagnostics,
    line: u32,
    column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    pub class_name: String,
    pub listing: Listing,
    pub max_locals: u16,
}

impl<'d> Generator<'d> {
    pub fn new(class_name: &str, diagnostics: &'d mut Diagnostics) -> Self {
        let mut scopes = ScopeStack::new();
        scopes.promote(PROGRAM_NAME, Constant::Text(class_name.to_string()));
        Self {
            listing: Listing::new(),
            scopes,
            diagnostics,
            line: 0,
            column: 0,
        }
    }

    pub fn generate(mut self, program: &AstNode) -> GeneratedCode {
        self.scopes.begin_scope();
        self.scopes.declare_local(ARGS_NAME, ValueType::Text);
        self.statement(program);
        self.scopes.end_scope();

        let class_name = match self.scopes.constant(PROGRAM_NAME) {
            Some(Constant::Text(name)) => name.clone(),
            _ => String::new(),
        };
        let max_locals = self.scopes.finish();
        tracing::debug!(%class_name, max_locals, instructions = self.listing.len(), "generated");
        GeneratedCode {
            class_name,
            listing: self.listing,
            max_locals,
        }
    }

    fn emit(&mut self, code: Instruction) -> () {
        self.listing.append(code, self.line)
    }

    fn set_label(&mut self, label: &Label) -> () {
        self.emit(Instruction::Label(label.clone()))
    }

    fn at(&mut self, node: &AstNode) -> () {
        self.line = node.line;
        self.column = node.column;
    }

    fn error(&mut self, message: &str) -> () {
        self.diagnostics
            .report(ErrorKind::Semantic, self.line, self.column, message)
    }

    fn statement(&mut self, node: &AstNode) -> () {
        self.at(node);
        match &node.node_type {
            AstNodeType::StatementList(statements) => {
                for statement in statements {
                    self.statement(statement);
                }
            }
            AstNodeType::Assign(name, value) => self.assign(node, name, value),
            AstNodeType::Increment(name) => self.increment(name, 1),
            AstNodeType::Decrement(name) => self.increment(name, -1),
            AstNodeType::If(branches) => self.if_chain(branches),
            AstNodeType::Loop(test, body) => self.lower_loop(test, body),
            AstNodeType::Break => self.loop_jump(LoopLabel::Break),
            AstNodeType::Continue => self.loop_jump(LoopLabel::Continue),
            AstNodeType::Print(e) => {
                let call = match self.expression(e) {
                    ValueType::Numeric => LibraryCall::PrintInt,
                    ValueType::Text => LibraryCall::PrintStr,
                };
                self.emit(Instruction::Call(call))
            }
            AstNodeType::Read(name) => {
                let call = match ValueType::of_name(name) {
                    ValueType::Numeric => LibraryCall::ReadInt,
                    ValueType::Text => LibraryCall::ReadStr,
                };
                self.emit(Instruction::Call(call));
                self.store(name)
            }
            AstNodeType::Error => self.error("Cannot generate code for an invalid statement"),
            _ => {
                // an expression in statement position: evaluate and discard
                self.expression(node);
                self.emit(Instruction::Pop)
            }
        }
    }

    fn assign(&mut self, node: &AstNode, name: &str, value: &AstNode) -> () {
        let target = self.declared_type(name);
        let value_type = self.expression(value);
        self.at(node);
        if target == value_type {
            self.store(name);
        } else {
            match target {
                ValueType::Text => {
                    self.error(&format!("Attempt to assign int value to string variable '{}'", name))
                }
                ValueType::Numeric => {
                    self.error(&format!("Attempt to assign string value to int variable '{}'", name))
                }
            }
            self.emit(Instruction::Pop);
        }
    }

    fn declared_type(&self, name: &str) -> ValueType {
        match self.scopes.lookup(name) {
            Some(Binding::LocalSlot(_, value_type)) => *value_type,
            _ => ValueType::of_name(name),
        }
    }

    fn store(&mut self, name: &str) -> () {
        let binding = match self.scopes.lookup(name).cloned() {
            Some(binding @ Binding::LocalSlot(..)) => binding,
            _ => self.scopes.declare_local(name, ValueType::of_name(name)),
        };
        if let Binding::LocalSlot(slot, value_type) = binding {
            self.emit(Instruction::Store(slot, value_type))
        }
    }

    fn variable(&mut self, name: &str) -> (u16, ValueType) {
        if let Some(Binding::LocalSlot(slot, value_type)) = self.scopes.lookup(name) {
            return (*slot, *value_type);
        }
        self.error(&format!("Variable '{}' is used before it has been initialised", name));
        match self.scopes.declare_local(name, ValueType::of_name(name)) {
            Binding::LocalSlot(slot, value_type) => (slot, value_type),
            _ => (0, ValueType::of_name(name)),
        }
    }

    fn increment(&mut self, name: &str, delta: i32) -> () {
        let (slot, value_type) = self.variable(name);
        match value_type {
            ValueType::Numeric => self.emit(Instruction::Increment(slot, delta)),
            ValueType::Text => self.error(&format!(
                "Attempt to {} string variable '{}'",
                if delta > 0 { "increment" } else { "decrement" },
                name
            )),
        }
    }

    fn if_chain(&mut self, branches: &[Branch]) -> () {
        self.scopes.begin_scope();
        let end_if = self.scopes.new_label("END IF");
        for branch in branches {
            match &branch.test {
                Test::Condition(test) => {
                    let next_test = self.scopes.new_label("NEXT TEST");
                    self.condition(test);
                    self.emit(Instruction::IfFalse(next_test.clone()));
                    self.statement(&branch.body);
                    self.emit(Instruction::Jump(end_if.clone()));
                    self.set_label(&next_test);
                }
                Test::Otherwise => self.statement(&branch.body),
            }
        }
        self.set_label(&end_if);
        self.scopes.end_scope();
    }

    fn lower_loop(&mut self, test: &LoopTest, body: &AstNode) -> () {
        self.scopes.begin_scope();
        let next_loop = self.scopes.new_label("NEXT LOOP");
        let exit_loop = self.scopes.new_label("EXIT LOOP");
        self.scopes.set_loop_labels(&next_loop, &exit_loop);
        match test {
            LoopTest::Pre(test) => {
                self.set_label(&next_loop);
                self.condition(test);
                self.emit(Instruction::IfFalse(exit_loop.clone()));
                self.statement(body);
                self.emit(Instruction::Jump(next_loop.clone()));
            }
            LoopTest::Never => {
                self.set_label(&next_loop);
                self.statement(body);
                self.emit(Instruction::Jump(next_loop.clone()));
            }
            LoopTest::Post(test) => {
                let start_loop = self.scopes.new_label("START LOOP");
                self.set_label(&start_loop);
                self.statement(body);
                self.set_label(&next_loop);
                self.condition(test);
                self.emit(Instruction::IfFalse(start_loop));
            }
        }
        self.set_label(&exit_loop);
        self.scopes.end_scope();
    }

    fn loop_jump(&mut self, kind: LoopLabel) -> () {
        match self.scopes.loop_label(kind).cloned() {
            Some(label) => self.emit(Instruction::Jump(label)),
            None => self.error("'break' or 'continue' used outside a loop"),
        }
    }

    fn condition(&mut self, test: &AstNode) -> () {
        if self.expression(test) == ValueType::Text {
            // non-empty text counts as true
            self.emit(Instruction::Call(LibraryCall::Length));
        }
    }

    pub fn expression(&mut self, node: &AstNode) -> ValueType {
        self.at(node);
        match &node.node_type {
            AstNodeType::IntLiteral(value) => {
                self.emit(Instruction::PushInt(*value));
                ValueType::Numeric
            }
            AstNodeType::StrLiteral(text) => {
                self.emit(Instruction::PushStr(text.clone()));
                ValueType::Text
            }
            AstNodeType::Variable(name) => {
                let (slot, value_type) = self.variable(name);
                self.emit(Instruction::Load(slot, value_type));
                value_type
            }
            AstNodeType::Unary(_, operand) => {
                let operand_type = self.expression(operand);
                self.at(node);
                if operand_type != ValueType::Numeric {
                    self.error("Attempt to apply '-' to a string");
                }
                self.emit(Instruction::Negate);
                ValueType::Numeric
            }
            AstNodeType::Binary(operator, lhs, rhs) => {
                let lhs_type = self.expression(lhs);
                let rhs_type = self.expression(rhs);
                self.at(node);
                if operator.is_relational() {
                    self.comparison(*operator, lhs_type, rhs_type)
                } else {
                    self.arithmetic(*operator, lhs_type, rhs_type)
                }
            }
            AstNodeType::Call(builtin, args) => self.call(*builtin, args, node),
            AstNodeType::Error => {
                self.error("Cannot generate code for an invalid expression");
                self.emit(Instruction::ConstZero);
                ValueType::Numeric
            }
            _ => {
                self.error("Statement used where an expression was expected");
                self.emit(Instruction::ConstZero);
                ValueType::Numeric
            }
        }
    }

    fn arithmetic(&mut self, operator: Operator, lhs: ValueType, rhs: ValueType) -> ValueType {
        if operator == Operator::Add && lhs == ValueType::Text && rhs == ValueType::Text {
            self.emit(Instruction::Call(LibraryCall::Concat));
            return ValueType::Text;
        }
        if lhs != ValueType::Numeric || rhs != ValueType::Numeric {
            self.error(&format!("{} {} {} is illegal", lhs, operator.symbol(), rhs));
        }
        let op = match operator {
            Operator::Add => ArithOp::Add,
            Operator::Sub => ArithOp::Sub,
            Operator::Mul => ArithOp::Mul,
            Operator::Div => ArithOp::Div,
            Operator::Mod => ArithOp::Rem,
            Operator::ShiftLeft => ArithOp::ShiftLeft,
            Operator::ShiftRight => ArithOp::ShiftRight,
            Operator::ShiftRightUnsigned => ArithOp::ShiftRightUnsigned,
            _ => {
                self.error(&format!("Unexpected operator '{}'", operator.symbol()));
                return ValueType::Numeric;
            }
        };
        self.emit(Instruction::Arith(op));
        ValueType::Numeric
    }

    fn comparison(&mut self, operator: Operator, lhs: ValueType, rhs: ValueType) -> ValueType {
        if lhs != rhs {
            self.error(&format!("{} {} {} is illegal", lhs, operator.symbol(), rhs));
            self.emit(Instruction::Pop);
            self.emit(Instruction::Pop);
            self.emit(Instruction::ConstZero);
            return ValueType::Numeric;
        }
        if lhs == ValueType::Text {
            self.emit(Instruction::Call(LibraryCall::Compare));
            self.emit(Instruction::ConstZero);
        }
        let relation = match operator {
            Operator::Equal => Relation::Equal,
            Operator::NotEqual => Relation::NotEqual,
            Operator::Greater => Relation::Greater,
            Operator::GreaterEqual => Relation::GreaterEqual,
            Operator::Less => Relation::Less,
            _ => Relation::LessEqual,
        };
        let if_true = self.scopes.new_label("TRUE VAL");
        let merge = self.scopes.new_label("MERGE VAL");
        self.emit(Instruction::IfCompare(relation, if_true.clone()));
        self.emit(Instruction::ConstZero);
        self.emit(Instruction::Jump(merge.clone()));
        self.set_label(&if_true);
        self.emit(Instruction::ConstOne);
        self.set_label(&merge);
        ValueType::Numeric
    }

    fn call(&mut self, builtin: Builtin, args: &[AstNode], node: &AstNode) -> ValueType {
        let arg_types: Vec<ValueType> = args.iter().map(|arg| self.expression(arg)).collect();
        self.at(node);
        let call = match builtin {
            Builtin::ToStr => LibraryCall::ToStr,
            Builtin::ToInt => LibraryCall::ToInt,
            Builtin::Length => LibraryCall::Length,
            Builtin::Left => LibraryCall::Left,
            Builtin::Right => LibraryCall::Right,
            Builtin::Format => match arg_types.get(1) {
                Some(ValueType::Text) => LibraryCall::FormatText,
                _ => LibraryCall::FormatInt,
            },
        };
        let (expected, result) = call.signature();
        if expected != arg_types.as_slice() {
            let wanted = expected.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
            let found = arg_types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
            self.error(&format!(
                "'{}' expects ({}) but was given ({})",
                builtin.name(),
                wanted,
                found
            ));
        }
        self.emit(Instruction::Call(call));
        result.unwrap_or(ValueType::Numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn generate(source: &str) -> (GeneratedCode, Diagnostics) {
        let mut diagnostics = Diagnostics::quiet("test");
        let program = parse(source, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 0, "parse errors: {:?}", diagnostics.entries());
        let code = Generator::new("Test", &mut diagnostics).generate(&program);
        (code, diagnostics)
    }

    fn is_store(code: &Instruction) -> bool {
        matches!(code, Instruction::Store(..))
    }

    fn is_jump(code: &Instruction) -> bool {
        matches!(code, Instruction::Jump(_))
    }

    fn labels(code: &GeneratedCode) -> Vec<Label> {
        code.listing
            .code()
            .iter()
            .filter_map(|c| match c {
                Instruction::Label(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn numeric_assignment_stores_in_first_free_slot() {
        let (code, diagnostics) = generate("x = 1 + 2");
        assert!(!diagnostics.has_errors());
        assert_eq!(
            code.listing.code(),
            &[
                Instruction::PushInt(1),
                Instruction::PushInt(2),
                Instruction::Arith(ArithOp::Add),
                Instruction::Store(1, ValueType::Numeric),
            ]
        );
        assert_eq!(code.max_locals, 2);
        assert_eq!(code.class_name, "Test");
    }

    #[test]
    fn mismatched_assignment_skips_store() {
        let (code, diagnostics) = generate("x$ = 1\ny = 2");
        assert_eq!(diagnostics.count_of(ErrorKind::Semantic), 1);
        assert_eq!(diagnostics.entries()[0].line, 1);
        assert_eq!(code.listing.count(is_store), 1);
        assert_eq!(code.listing.code()[1], Instruction::Pop);
        assert_eq!(code.listing.code()[3], Instruction::Store(1, ValueType::Numeric));
    }

    #[test]
    fn mismatch_is_reported_at_the_target() {
        let (_, diagnostics) = generate("y = 0\nx$ = 1 + 2");
        let entry = &diagnostics.entries()[0];
        assert_eq!((entry.line, entry.column), (2, 1));
    }

    #[test]
    fn text_into_numeric_variable_is_rejected() {
        let (code, diagnostics) = generate("n = \"abc\"");
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(
            diagnostics.entries()[0].message,
            "Attempt to assign string value to int variable 'n'"
        );
        assert_eq!(
            code.listing.code(),
            &[Instruction::PushStr("abc".to_string()), Instruction::Pop]
        );
    }

    #[test]
    fn increment_of_undeclared_variable_declares_it() {
        let (code, diagnostics) = generate("x++\nx++");
        assert_eq!(diagnostics.count_of(ErrorKind::Semantic), 1);
        assert!(diagnostics.entries()[0].message.contains("'x' is used before"));
        assert_eq!(
            code.listing.code(),
            &[Instruction::Increment(1, 1), Instruction::Increment(1, 1)]
        );
        assert_eq!(code.max_locals, 2);
    }

    #[test]
    fn sibling_blocks_get_increasing_slots() {
        let (code, diagnostics) = generate("do x = 1 end do y = 2 end");
        assert!(!diagnostics.has_errors());
        let slots: Vec<u16> = code
            .listing
            .code()
            .iter()
            .filter_map(|c| match c {
                Instruction::Store(slot, _) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![1, 2]);
        assert_eq!(code.max_locals, 3);
    }

    #[test]
    fn break_outside_loop_emits_no_jump() {
        let (code, diagnostics) = generate("break\nx = 1");
        assert_eq!(diagnostics.count_of(ErrorKind::Semantic), 1);
        assert_eq!(code.listing.count(is_jump), 0);
        assert_eq!(code.listing.count(is_store), 1);
    }

    #[test]
    fn break_and_continue_target_nearest_loop() {
        let (code, diagnostics) = generate("while 1 do do break end continue end");
        assert!(!diagnostics.has_errors());
        let jumps: Vec<String> = code
            .listing
            .code()
            .iter()
            .filter_map(|c| match c {
                Instruction::Jump(label) => Some(label.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(
            jumps,
            vec!["EXIT_LOOP#3", "NEXT_LOOP#2", "NEXT_LOOP#0", "NEXT_LOOP#0"]
        );
    }

    #[test]
    fn comparison_uses_two_fresh_labels() {
        let (code, _) = generate("x = 1 < 2\ny = 1 < 2");
        let labels = labels(&code);
        assert_eq!(labels.len(), 4);
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            &code.listing.code()[2..8],
            &[
                Instruction::IfCompare(Relation::Less, labels[0].clone()),
                Instruction::ConstZero,
                Instruction::Jump(labels[1].clone()),
                Instruction::Label(labels[0].clone()),
                Instruction::ConstOne,
                Instruction::Label(labels[1].clone()),
            ]
        );
    }

    #[test]
    fn text_comparison_calls_compare() {
        let (code, diagnostics) = generate("a$ = \"x\"\nb = a$ >= \"y\"");
        assert!(!diagnostics.has_errors());
        let position = code
            .listing
            .code()
            .iter()
            .position(|c| *c == Instruction::Call(LibraryCall::Compare))
            .expect("compare call");
        assert_eq!(code.listing.code()[position + 1], Instruction::ConstZero);
        assert!(matches!(
            code.listing.code()[position + 2],
            Instruction::IfCompare(Relation::GreaterEqual, _)
        ));
    }

    #[test]
    fn mixed_comparison_is_reported_without_labels() {
        let (code, diagnostics) = generate("b = 1 == \"one\"");
        assert_eq!(diagnostics.count_of(ErrorKind::Semantic), 1);
        assert!(labels(&code).is_empty());
        assert_eq!(code.listing.count(is_store), 1);
    }

    #[test]
    fn negating_text_still_emits_negate() {
        let (code, diagnostics) = generate("n = -\"a\"");
        assert_eq!(diagnostics.error_count(), 1);
        assert!(code.listing.code().contains(&Instruction::Negate));
        assert_eq!(code.listing.count(is_store), 1);
    }

    #[test]
    fn arithmetic_on_text_is_reported_once() {
        let (code, diagnostics) = generate("n = \"a\" * 2");
        assert_eq!(diagnostics.error_count(), 1);
        assert!(code.listing.code().contains(&Instruction::Arith(ArithOp::Mul)));
    }

    #[test]
    fn adding_texts_concatenates() {
        let (code, diagnostics) = generate("s$ = \"a\" + \"b\"");
        assert!(!diagnostics.has_errors());
        assert_eq!(code.listing.code()[2], Instruction::Call(LibraryCall::Concat));
        assert_eq!(code.listing.code()[3], Instruction::Store(1, ValueType::Text));
    }

    #[test]
    fn undeclared_variable_is_reported_then_declared() {
        let (code, diagnostics) = generate("print n\nprint n");
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(code.listing.code()[0], Instruction::Load(1, ValueType::Numeric));
        assert_eq!(code.listing.code()[2], Instruction::Load(1, ValueType::Numeric));
    }

    #[test]
    fn increment_works_in_place() {
        let (code, diagnostics) = generate("i = 0\ni++\ni--");
        assert!(!diagnostics.has_errors());
        assert_eq!(code.listing.code()[2], Instruction::Increment(1, 1));
        assert_eq!(code.listing.code()[3], Instruction::Increment(1, -1));
    }

    #[test]
    fn incrementing_text_is_an_error() {
        let (code, diagnostics) = generate("s$ = \"a\"\ns$++");
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(code.listing.len(), 2);
    }

    #[test]
    fn read_uses_naming_convention() {
        let (code, _) = generate("read n, s$");
        assert_eq!(
            code.listing.code(),
            &[
                Instruction::Call(LibraryCall::ReadInt),
                Instruction::Store(1, ValueType::Numeric),
                Instruction::Call(LibraryCall::ReadStr),
                Instruction::Store(2, ValueType::Text),
            ]
        );
    }

    #[test]
    fn builtin_argument_types_are_checked() {
        let (_, diagnostics) = generate("n = length(5)");
        assert_eq!(diagnostics.error_count(), 1);
        let (code, diagnostics) = generate("s$ = format(\"%d items\", 3)");
        assert!(!diagnostics.has_errors());
        assert!(code.listing.code().contains(&Instruction::Call(LibraryCall::FormatInt)));
    }

    #[test]
    fn else_branch_has_no_test() {
        let (code, diagnostics) = generate("if 1 then x = 1 else x = 2 end");
        assert!(!diagnostics.has_errors());
        assert_eq!(code.listing.count(|c| matches!(c, Instruction::IfFalse(_))), 1);
        let names: Vec<String> = labels(&code).iter().map(|l| l.to_string()).collect();
        assert_eq!(names, vec!["NEXT_TEST#1", "END_IF#0"]);
    }
}
