//! DDL rendering for SQL Server.

pub mod dialect;
mod generator;
pub mod types;

pub use generator::{
    ChangeDdl, DdlGenerator, DdlOptions, GeneratedDdl, default_constraint_name, primary_key_name,
    render_script,
};
