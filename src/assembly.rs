use std::io::{self, Write};

use crate::chunk::{Instruction, LIBRARY_CLASS};
use crate::code_gen::GeneratedCode;

const TEMPLATE: &str = "\
.class public {CLASSNAME}
.super java/lang/Object

.method public <init>()V
  .limit stack {STACK}
  aload_0
  invokespecial java/lang/Object/<init>()V
  return
.end method

.method public static main([Ljava/lang/String;)V
  .limit stack {STACK}
{CODE}  return
  .limit locals {LOCALS}
.end method
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub library_class: String,
    pub stack_limit: u16,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            library_class: LIBRARY_CLASS.to_string(),
            stack_limit: 10,
        }
    }
}

fn render_code(code: &GeneratedCode, options: &CompileOptions) -> String {
    let mut out = String::new();
    for instruction in code.listing.code() {
        let mut text = instruction.to_string();
        if let Instruction::Call(_) = instruction {
            if options.library_class != LIBRARY_CLASS {
                text = text.replacen(LIBRARY_CLASS, &options.library_class, 1);
            }
        }
        out.push_str(&text);
        out.push('\n');
    }
    out
}

pub fn render(code: &GeneratedCode, options: &CompileOptions) -> String {
    TEMPLATE
        .replace("{CLASSNAME}", &code.class_name)
        .replace("{STACK}", &options.stack_limit.to_string())
        .replace("{LOCALS}", &code.max_locals.to_string())
        .replace("{CODE}", &render_code(code, options))
}

pub fn write_program<W: Write>(out: &mut W, code: &GeneratedCode, options: &CompileOptions) -> io::Result<()> {
    out.write_all(render(code, options).as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{LibraryCall, Listing};
    use pretty_assertions::assert_eq;

    fn sample() -> GeneratedCode {
        let mut listing = Listing::new();
        listing.append(Instruction::PushInt(7), 1);
        listing.append(Instruction::Call(LibraryCall::PrintInt), 1);
        GeneratedCode {
            class_name: "Hello".to_string(),
            listing,
            max_locals: 1,
        }
    }

    #[test]
    fn template_is_filled_in() {
        let text = render(&sample(), &CompileOptions::default());
        let expected = "\
.class public Hello
.super java/lang/Object

.method public <init>()V
  .limit stack 10
  aload_0
  invokespecial java/lang/Object/<init>()V
  return
.end method

.method public static main([Ljava/lang/String;)V
  .limit stack 10
  ldc 7
  invokestatic small/Library/print(I)V
  return
  .limit locals 1
.end method
";
        assert_eq!(text, expected);
    }

    #[test]
    fn library_class_can_be_overridden() {
        let options = CompileOptions {
            library_class: "rt/Lib".to_string(),
            stack_limit: 4,
        };
        let mut out = Vec::new();
        write_program(&mut out, &sample(), &options).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("invokestatic rt/Lib/print(I)V"));
        assert!(text.contains(".limit stack 4"));
    }
}
