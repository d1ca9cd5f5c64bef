#![doc = include_str!("../../../README.md")]

mod compile;
mod coordination;
mod exception;
mod expressions;
mod function;
mod io;
mod lex;
mod parse;
mod run;
mod scope;
mod statements;
mod value;

pub use crate::{
    compile::{CompileError, SyntaxErrorKind},
    exception::{ErrorKind, RailwayError, StackFrame},
    io::{CollectStringPrint, NoPrint, PrintWriter, SharedWriter, StdPrint, shared_writer},
    lex::LexError,
    parse::ParseError,
    run::{LoadError, Module},
    value::{ArithmeticError, MemoryCell, Number},
};
