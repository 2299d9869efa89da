pub mod assembly;
pub mod ast;
pub mod chunk;
pub mod code_gen;
pub mod common;
pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;
pub mod vm;
