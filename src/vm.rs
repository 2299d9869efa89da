use std::cmp::Ordering;
use std::fmt;
use std::io::{self, BufRead, Write};

use fnv::FnvHashMap;
use thiserror::Error;

use crate::chunk::{ArithOp, Instruction, LibraryCall};
use crate::code_gen::GeneratedCode;
use crate::common::ValueType;
use crate::scope::Label;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("line {line}: operand stack underflow")]
    StackUnderflow { line: u32 },
    #[error("line {line}: expected {expected} on the operand stack")]
    TypeMismatch { line: u32, expected: ValueType },
    #[error("line {line}: local {slot} read before it was stored")]
    Uninitialised { line: u32, slot: u16 },
    #[error("line {line}: local {slot} is outside the frame")]
    BadSlot { line: u32, slot: u16 },
    #[error("line {line}: jump to undefined label {label}")]
    UnknownLabel { line: u32, label: String },
    #[error("line {line}: division by zero")]
    DivisionByZero { line: u32 },
    #[error("expected an integer on input, found '{0}'")]
    BadInput(String),
    #[error("input exhausted")]
    EndOfInput,
    #[error("gave up after {0} steps")]
    StepLimit(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

struct Stack(Vec<Value>);

impl Stack {
    fn push(&mut self, value: Value) -> () {
        self.0.push(value)
    }

    fn push_int(&mut self, n: i32) -> () {
        self.0.push(Value::Int(n))
    }

    fn pop(&mut self, line: u32) -> Result<Value, RuntimeError> {
        self.0.pop().ok_or(RuntimeError::StackUnderflow { line })
    }

    fn pop_int(&mut self, line: u32) -> Result<i32, RuntimeError> {
        match self.pop(line)? {
            Value::Int(n) => Ok(n),
            Value::Text(_) => Err(RuntimeError::TypeMismatch {
                line,
                expected: ValueType::Numeric,
            }),
        }
    }

    fn pop_text(&mut self, line: u32) -> Result<String, RuntimeError> {
        match self.pop(line)? {
            Value::Text(s) => Ok(s),
            Value::Int(_) => Err(RuntimeError::TypeMismatch {
                line,
                expected: ValueType::Text,
            }),
        }
    }
}

pub struct Vm<R: BufRead, W: Write> {
    input: R,
    output: W,
    // rest of the current input line
    pending: Option<String>,
    step_limit: Option<usize>,
}

impl<R: BufRead, W: Write> Vm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: None,
            step_limit: None,
        }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn run(&mut self, program: &GeneratedCode) -> Result<(), RuntimeError> {
        let result = self.execute(program);
        self.output.flush()?;
        result
    }

    fn execute(&mut self, program: &GeneratedCode) -> Result<(), RuntimeError> {
        let code = program.listing.code();
        let targets: FnvHashMap<&Label, usize> = code
            .iter()
            .enumerate()
            .filter_map(|(offset, instruction)| match instruction {
                Instruction::Label(label) => Some((label, offset)),
                _ => None,
            })
            .collect();
        let mut locals: Vec<Option<Value>> = vec![None; program.max_locals as usize];
        if let Some(args) = locals.first_mut() {
            *args = Some(Value::Text(String::new()));
        }
        let mut stack = Stack(Vec::new());
        let mut ip = 0;
        let mut steps = 0;

        while ip < code.len() {
            if let Some(limit) = self.step_limit {
                steps += 1;
                if steps > limit {
                    return Err(RuntimeError::StepLimit(limit));
                }
            }
            let line = program.listing.get_line(ip).unwrap_or(0);
            let jump_to = |label: &Label| {
                targets
                    .get(label)
                    .copied()
                    .ok_or_else(|| RuntimeError::UnknownLabel {
                        line,
                        label: label.to_string(),
                    })
            };
            ip += 1;
            match &code[ip - 1] {
                Instruction::Label(_) => {}
                Instruction::PushInt(n) => stack.push_int(*n),
                Instruction::PushStr(s) => stack.push(Value::Text(s.clone())),
                Instruction::ConstZero => stack.push_int(0),
                Instruction::ConstOne => stack.push_int(1),
                Instruction::Load(slot, _) => {
                    let value = locals
                        .get(*slot as usize)
                        .ok_or(RuntimeError::BadSlot { line, slot: *slot })?
                        .clone()
                        .ok_or(RuntimeError::Uninitialised { line, slot: *slot })?;
                    stack.push(value)
                }
                Instruction::Store(slot, _) => {
                    let value = stack.pop(line)?;
                    let local = locals
                        .get_mut(*slot as usize)
                        .ok_or(RuntimeError::BadSlot { line, slot: *slot })?;
                    *local = Some(value);
                }
                Instruction::Increment(slot, delta) => {
                    let local = locals
                        .get_mut(*slot as usize)
                        .ok_or(RuntimeError::BadSlot { line, slot: *slot })?;
                    match local {
                        Some(Value::Int(n)) => *n = n.wrapping_add(*delta),
                        Some(Value::Text(_)) => {
                            return Err(RuntimeError::TypeMismatch {
                                line,
                                expected: ValueType::Numeric,
                            })
                        }
                        None => return Err(RuntimeError::Uninitialised { line, slot: *slot }),
                    }
                }
                Instruction::Arith(op) => {
                    let b = stack.pop_int(line)?;
                    let a = stack.pop_int(line)?;
                    stack.push_int(arithmetic(*op, a, b, line)?)
                }
                Instruction::Negate => {
                    let n = stack.pop_int(line)?;
                    stack.push_int(n.wrapping_neg())
                }
                Instruction::Pop => {
                    stack.pop(line)?;
                }
                Instruction::Jump(label) => ip = jump_to(label)?,
                Instruction::IfFalse(label) => {
                    if stack.pop_int(line)? == 0 {
                        ip = jump_to(label)?;
                    }
                }
                Instruction::IfCompare(relation, label) => {
                    let b = stack.pop_int(line)?;
                    let a = stack.pop_int(line)?;
                    if relation.holds(a, b) {
                        ip = jump_to(label)?;
                    }
                }
                Instruction::Call(call) => self.call(*call, &mut stack, line)?,
            }
        }
        Ok(())
    }

    fn call(&mut self, call: LibraryCall, stack: &mut Stack, line: u32) -> Result<(), RuntimeError> {
        let result = match call {
            LibraryCall::PrintInt => {
                let n = stack.pop_int(line)?;
                write!(self.output, "{}", n)?;
                return Ok(());
            }
            LibraryCall::PrintStr => {
                let s = stack.pop_text(line)?;
                write!(self.output, "{}", s)?;
                return Ok(());
            }
            LibraryCall::ReadInt => Value::Int(self.read_int()?),
            LibraryCall::ReadStr => Value::Text(self.read_line()?),
            LibraryCall::ToStr => Value::Text(stack.pop_int(line)?.to_string()),
            LibraryCall::ToInt => Value::Int(stack.pop_text(line)?.parse().unwrap_or(i32::MIN)),
            LibraryCall::Length => Value::Int(stack.pop_text(line)?.chars().count() as i32),
            LibraryCall::Concat => {
                let b = stack.pop_text(line)?;
                let a = stack.pop_text(line)?;
                Value::Text(a + &b)
            }
            LibraryCall::Compare => {
                let b = stack.pop_text(line)?;
                let a = stack.pop_text(line)?;
                Value::Int(match a.cmp(&b) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                })
            }
            LibraryCall::Left => {
                let n = stack.pop_int(line)?;
                let s = stack.pop_text(line)?;
                Value::Text(s.chars().take(n.max(0) as usize).collect())
            }
            LibraryCall::Right => {
                let n = stack.pop_int(line)?;
                let s = stack.pop_text(line)?;
                let len = s.chars().count();
                let skip = len.saturating_sub(n.max(0) as usize);
                Value::Text(s.chars().skip(skip).collect())
            }
            LibraryCall::FormatText | LibraryCall::FormatInt => {
                let value = stack.pop(line)?;
                let template = stack.pop_text(line)?;
                Value::Text(format_value(&template, &value))
            }
        };
        stack.push(result);
        Ok(())
    }

    fn fill_pending(&mut self) -> Result<(), RuntimeError> {
        if self.pending.is_none() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(RuntimeError::EndOfInput);
            }
            let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r').len();
            line.truncate(trimmed);
            self.pending = Some(line);
        }
        Ok(())
    }

    fn read_int(&mut self) -> Result<i32, RuntimeError> {
        loop {
            self.fill_pending()?;
            let rest = self.pending.take().unwrap_or_default();
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            let (token, remainder) = trimmed.split_at(end);
            let value = token
                .parse()
                .map_err(|_| RuntimeError::BadInput(token.to_string()))?;
            self.pending = Some(remainder.to_string());
            return Ok(value);
        }
    }

    fn read_line(&mut self) -> Result<String, RuntimeError> {
        self.fill_pending()?;
        Ok(self.pending.take().unwrap_or_default())
    }
}

fn arithmetic(op: ArithOp, a: i32, b: i32, line: u32) -> Result<i32, RuntimeError> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div | ArithOp::Rem if b == 0 => return Err(RuntimeError::DivisionByZero { line }),
        ArithOp::Div => a.wrapping_div(b),
        ArithOp::Rem => a.wrapping_rem(b),
        // shift counts are masked to five bits
        ArithOp::ShiftLeft => a.wrapping_shl(b as u32),
        ArithOp::ShiftRight => a.wrapping_shr(b as u32),
        ArithOp::ShiftRightUnsigned => (a as u32).wrapping_shr(b as u32) as i32,
    })
}

fn format_value(template: &str, value: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut used = false;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('d') | Some('s') if !used => {
                chars.next();
                used = true;
                out.push_str(&value.to_string());
            }
            _ => out.push('%'),
        }
    }
    out
}

pub fn run_to_string(program: &GeneratedCode, input: &str) -> Result<String, RuntimeError> {
    let mut vm = Vm::new(input.as_bytes(), Vec::new()).with_step_limit(1_000_000);
    vm.run(program)?;
    Ok(String::from_utf8_lossy(&vm.into_output()).into_owned())
}
