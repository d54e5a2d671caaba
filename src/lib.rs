mod builtins;
mod code;
mod compiler;
mod error;
mod lexer;
mod parser;
mod session;
mod symbol_table;
mod value;
mod vm;

pub use self::{
    builtins::*, code::*, compiler::*, error::*, lexer::*, parser::*, session::*,
    symbol_table::*, value::*, vm::*,
};

use std::fmt::Display;

fn flatten(items: &[impl Display], separator: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}
