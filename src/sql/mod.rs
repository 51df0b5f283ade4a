//! T-SQL script reader.

mod lexer;
mod parser;

pub use parser::{SqlParseError, parse_sql};
