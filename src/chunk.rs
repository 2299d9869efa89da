use std::fmt;

use crate::common::ValueType;
use crate::scope::Label;

pub const LIBRARY_CLASS: &str = "small/Library";

pub const TEXT_DESCRIPTOR: &str = "Ljava/lang/String;";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Relation {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Relation {
    pub fn holds(self, a: i32, b: i32) -> bool {
        match self {
            Relation::Equal => a == b,
            Relation::NotEqual => a != b,
            Relation::Greater => a > b,
            Relation::GreaterEqual => a >= b,
            Relation::Less => a < b,
            Relation::LessEqual => a <= b,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Relation::Equal => "eq",
            Relation::NotEqual => "ne",
            Relation::Greater => "gt",
            Relation::GreaterEqual => "ge",
            Relation::Less => "lt",
            Relation::LessEqual => "le",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
}

impl ArithOp {
    fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "iadd",
            ArithOp::Sub => "isub",
            ArithOp::Mul => "imul",
            ArithOp::Div => "idiv",
            ArithOp::Rem => "irem",
            ArithOp::ShiftLeft => "ishl",
            ArithOp::ShiftRight => "ishr",
            ArithOp::ShiftRightUnsigned => "iushr",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LibraryCall {
    ToStr,
    ToInt,
    Length,
    Concat,
    Compare,
    Left,
    Right,
    FormatText,
    FormatInt,
    ReadInt,
    ReadStr,
    PrintStr,
    PrintInt,
}

impl LibraryCall {
    pub fn name(self) -> &'static str {
        match self {
            LibraryCall::ToStr => "toStr",
            LibraryCall::ToInt => "toInt",
            LibraryCall::Length => "len",
            LibraryCall::Concat => "concat",
            LibraryCall::Compare => "compare",
            LibraryCall::Left => "left",
            LibraryCall::Right => "right",
            LibraryCall::FormatText | LibraryCall::FormatInt => "format",
            LibraryCall::ReadInt => "readInt",
            LibraryCall::ReadStr => "readStr",
            LibraryCall::PrintStr | LibraryCall::PrintInt => "print",
        }
    }

    pub fn short_descriptor(self) -> &'static str {
        match self {
            LibraryCall::ToStr => "(I)~",
            LibraryCall::ToInt => "(~)I",
            LibraryCall::Length => "(~)I",
            LibraryCall::Concat => "(~~)~",
            LibraryCall::Compare => "(~~)I",
            LibraryCall::Left => "(~I)~",
            LibraryCall::Right => "(~I)~",
            LibraryCall::FormatText => "(~~)~",
            LibraryCall::FormatInt => "(~I)~",
            LibraryCall::ReadInt => "()I",
            LibraryCall::ReadStr => "()~",
            LibraryCall::PrintStr => "(~)V",
            LibraryCall::PrintInt => "(I)V",
        }
    }

    pub fn descriptor(self) -> String {
        self.short_descriptor().replace('~', TEXT_DESCRIPTOR)
    }

    pub fn signature(self) -> (&'static [ValueType], Option<ValueType>) {
        use ValueType::{Numeric as N, Text as T};
        match self {
            LibraryCall::ToStr => (&[N], Some(T)),
            LibraryCall::ToInt => (&[T], Some(N)),
            LibraryCall::Length => (&[T], Some(N)),
            LibraryCall::Concat => (&[T, T], Some(T)),
            LibraryCall::Compare => (&[T, T], Some(N)),
            LibraryCall::Left | LibraryCall::Right => (&[T, N], Some(T)),
            LibraryCall::FormatText => (&[T, T], Some(T)),
            LibraryCall::FormatInt => (&[T, N], Some(T)),
            LibraryCall::ReadInt => (&[], Some(N)),
            LibraryCall::ReadStr => (&[], Some(T)),
            LibraryCall::PrintStr => (&[T], None),
            LibraryCall::PrintInt => (&[N], None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Label(Label),
    PushInt(i32),
    PushStr(String),
    ConstZero,
    ConstOne,
    Load(u16, ValueType),
    Store(u16, ValueType),
    Increment(u16, i32),
    Arith(ArithOp),
    Negate,
    Pop,
    Jump(Label),
    IfFalse(Label),
    IfCompare(Relation, Label),
    Call(LibraryCall),
}

fn slot_prefix(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Numeric => "i",
        ValueType::Text => "a",
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Label(label) => write!(f, "{}:", label),
            Instruction::PushInt(value) => write!(f, "  ldc {}", value),
            Instruction::PushStr(text) => write!(f, "  ldc \"{}\"", text),
            Instruction::ConstZero => write!(f, "  iconst_0"),
            Instruction::ConstOne => write!(f, "  iconst_1"),
            Instruction::Load(slot, value_type) => write!(f, "  {}load {}", slot_prefix(*value_type), slot),
            Instruction::Store(slot, value_type) => write!(f, "  {}store {}", slot_prefix(*value_type), slot),
            Instruction::Increment(slot, delta) => write!(f, "  iinc {} {}", slot, delta),
            Instruction::Arith(op) => write!(f, "  {}", op.mnemonic()),
            Instruction::Negate => write!(f, "  ineg"),
            Instruction::Pop => write!(f, "  pop"),
            Instruction::Jump(label) => write!(f, "  goto {}", label),
            Instruction::IfFalse(label) => write!(f, "  ifeq {}", label),
            Instruction::IfCompare(relation, label) => write!(f, "  if_icmp{} {}", relation.suffix(), label),
            Instruction::Call(call) => write!(
                f,
                "  invokestatic {}/{}{}",
                LIBRARY_CLASS,
                call.name(),
                call.descriptor()
            ),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Listing {
    code: Vec<Instruction>,
    lines: Vec<u32>,
}

impl Listing {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn append(&mut self, code: Instruction, line: u32) -> () {
        self.code.push(code);
        self.lines.push(line);
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn get_line(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&Instruction) -> bool) -> usize {
        self.code.iter().filter(|code| predicate(code)).count()
    }

    pub fn disassemble(&self, name: &str) -> String {
        let mut out = format!("== {} ==\n", name);
        for (offset, code) in self.code.iter().enumerate() {
            let line = if offset > 0 && self.lines.get(offset) == self.lines.get(offset - 1) {
                "   |".to_string()
            } else {
                format!("{:>4}", self.lines[offset])
            };
            out.push_str(&format!("{:>4} {} {}\n", offset, line, code));
        }
        out
    }
}
