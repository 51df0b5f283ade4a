//! Structural rule checks over a schema model.
//!
//! Every rule pass runs even when an earlier one fails, so callers get the
//! complete list of errors and warnings in one go. Only an empty table list
//! skips the table and column passes.

use crate::model::{
    ColumnModel, DataType, ForeignKeyNaming, MAX_LENGTH, SchemaModel, TableModel, name_key,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

static IDENTIFIER: std::sync::LazyLock<Result<Regex, regex::Error>> =
    std::sync::LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"));

/// Largest precision accepted for `decimal`/`numeric`.
pub const MAX_DECIMAL_PRECISION: u32 = 38;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER
        .as_ref()
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    naming: ForeignKeyNaming,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(naming: ForeignKeyNaming) -> Self {
        Self { naming }
    }

    pub fn validate(&self, model: &SchemaModel) -> ValidationResult {
        let mut result = ValidationResult::default();

        if model.tables.is_empty() {
            result.error("Schema must contain at least one table");
        } else {
            check_identifiers(model, &mut result);
            check_uniqueness(model, &mut result);
            for table in &model.tables {
                check_table(table, &mut result);
                check_indexes(table, &mut result);
                for column in &table.columns {
                    check_column_type(table, column, &mut result);
                    check_default(table, column, &mut result);
                }
            }
        }

        self.check_relationships(model, &mut result);
        check_cycles(model, &mut result);

        result.is_valid = result.errors.is_empty();
        tracing::debug!(
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated schema"
        );
        result
    }

    fn check_relationships(&self, model: &SchemaModel, result: &mut ValidationResult) {
        let mut names = HashSet::new();

        for rel in &model.relationships {
            if !names.insert(name_key(&rel.name)) {
                result.warning(format!("Duplicate relationship name '{}'", rel.name));
            }

            let source = model.table(&rel.source_table);
            let target = model.table(&rel.target_table);
            if source.is_none() {
                result.error(format!(
                    "Relationship '{}' references unknown table '{}'",
                    rel.name, rel.source_table
                ));
            }
            if target.is_none() {
                result.error(format!(
                    "Relationship '{}' references unknown table '{}'",
                    rel.name, rel.target_table
                ));
            }

            let endpoints = [
                (source, &rel.source_column),
                (target, &rel.target_column),
            ];
            for (table, column) in endpoints {
                if let (Some(table), Some(column)) = (table, column) {
                    if table.column(column).is_none() {
                        result.error(format!(
                            "Relationship '{}' references unknown column '{}.{}'",
                            rel.name, table.name, column
                        ));
                    }
                }
            }

            if source.is_none() || target.is_none() {
                continue;
            }
            let Some(binding) = rel.binding(model, &self.naming) else {
                continue;
            };
            let child_has_column = model
                .table(&binding.child_table)
                .is_some_and(|t| t.column(&binding.fk_column).is_some());
            if binding.fk_column_inferred && !child_has_column {
                result.warning(format!(
                    "Relationship '{}': foreign key column '{}.{}' not found (inferred from naming convention)",
                    rel.name, binding.child_table, binding.fk_column
                ));
            }
        }
    }
}

/// Convenience for `SchemaValidator::new().validate(model)`.
pub fn validate(model: &SchemaModel) -> ValidationResult {
    SchemaValidator::new().validate(model)
}

fn check_identifiers(model: &SchemaModel, result: &mut ValidationResult) {
    for table in &model.tables {
        if !is_valid_identifier(&table.name) {
            result.error(format!("Invalid table name '{}'", table.name));
        }
        for column in &table.columns {
            if !is_valid_identifier(&column.name) {
                result.error(format!("Invalid column name '{}.{}'", table.name, column.name));
            }
        }
    }
}

fn check_uniqueness(model: &SchemaModel, result: &mut ValidationResult) {
    let mut tables = HashSet::new();
    for table in &model.tables {
        if !tables.insert(name_key(&table.name)) {
            result.error(format!("Duplicate table name '{}'", table.name));
        }

        let mut columns = HashSet::new();
        for column in &table.columns {
            if !columns.insert(name_key(&column.name)) {
                result.error(format!(
                    "Duplicate column name '{}.{}'",
                    table.name, column.name
                ));
            }
        }

        let mut indexes = HashSet::new();
        for index in &table.indexes {
            if !indexes.insert(name_key(&index.name)) {
                result.error(format!("Duplicate index name '{}.{}'", table.name, index.name));
            }
        }
    }
}

fn check_table(table: &TableModel, result: &mut ValidationResult) {
    if table.columns.is_empty() {
        result.error(format!("Table '{}' has no columns", table.name));
        return;
    }

    let primary_key = table.primary_key_columns();
    if primary_key.is_empty() {
        result.warning(format!("Table '{}' has no primary key", table.name));
    }
    for column in primary_key {
        if column.is_nullable {
            result.error(format!(
                "Primary key column '{}.{}' cannot be nullable",
                table.name, column.name
            ));
        }
    }
}

fn check_indexes(table: &TableModel, result: &mut ValidationResult) {
    for index in &table.indexes {
        if index.columns.is_empty() {
            result.error(format!("Index '{}.{}' has no columns", table.name, index.name));
        }
        for column in &index.columns {
            if table.column(column).is_none() {
                result.error(format!(
                    "Index '{}.{}' references unknown column '{}'",
                    table.name, index.name, column
                ));
            }
        }
    }

    if table.indexes.iter().filter(|i| i.is_clustered).count() > 1 {
        result.error(format!(
            "Table '{}' has more than one clustered index",
            table.name
        ));
    }
}

fn check_column_type(table: &TableModel, column: &ColumnModel, result: &mut ValidationResult) {
    let qualified = format!("{}.{}", table.name, column.name);
    let data_type = &column.data_type;

    if !data_type.is_known() {
        result.warning(format!(
            "Column '{}' has unrecognized type '{}'",
            qualified, data_type
        ));
        return;
    }

    if data_type.is_string() && column.length.is_none() {
        result.warning(format!(
            "Column '{}' of type {} has no length",
            qualified, data_type
        ));
    }
    if let Some(length) = column.length {
        if length == 0 || length < MAX_LENGTH {
            result.error(format!("Column '{}' has invalid length {}", qualified, length));
        }
    }

    if data_type.is_exact_decimal() {
        if let Some(precision) = column.precision {
            if !(1..=MAX_DECIMAL_PRECISION).contains(&precision) {
                result.error(format!(
                    "Column '{}' precision {} is outside 1-{}",
                    qualified, precision, MAX_DECIMAL_PRECISION
                ));
            }
            if let Some(scale) = column.scale {
                if scale > precision {
                    result.error(format!(
                        "Column '{}' scale {} exceeds precision {}",
                        qualified, scale, precision
                    ));
                }
            }
        }
    }
}

fn check_default(table: &TableModel, column: &ColumnModel, result: &mut ValidationResult) {
    let Some(value) = column.default_value.as_deref() else {
        return;
    };
    let qualified = format!("{}.{}", table.name, column.name);

    if value.eq_ignore_ascii_case("null") {
        if !column.is_nullable {
            result.error(format!(
                "Column '{}' is NOT NULL but defaults to NULL",
                qualified
            ));
        }
        return;
    }

    if !default_matches_type(&column.data_type, value) {
        result.error(format!(
            "Column '{}' default '{}' is not a valid {}",
            qualified, value, column.data_type
        ));
        return;
    }

    if column.data_type.is_string() {
        if let Some(length) = column.length.filter(|l| *l != MAX_LENGTH) {
            if value.chars().count() > usize::try_from(length).unwrap_or(0) {
                result.error(format!(
                    "Column '{}' default exceeds declared length {}",
                    qualified, length
                ));
            }
        }
    }
}

/// Whether a default literal parses as the given type.
pub fn default_matches_type(data_type: &DataType, value: &str) -> bool {
    let value = value.trim();
    if let Some(range) = data_type.integer_range() {
        return value
            .parse::<i64>()
            .is_ok_and(|n| n >= range.0 && n <= range.1);
    }

    match data_type {
        DataType::Bit => matches!(
            value.to_lowercase().as_str(),
            "0" | "1" | "true" | "false"
        ),
        DataType::Decimal
        | DataType::Numeric
        | DataType::Money
        | DataType::SmallMoney
        | DataType::Float
        | DataType::Real => value.parse::<f64>().is_ok_and(f64::is_finite),
        t if t.is_temporal() => is_temporal_literal(t, value),
        DataType::UniqueIdentifier => {
            is_function(value, &["newid", "newsequentialid"]) || uuid::Uuid::parse_str(value).is_ok()
        }
        _ => true,
    }
}

/// Current-timestamp keywords accepted as defaults on temporal columns.
pub fn is_now_keyword(value: &str) -> bool {
    is_function(
        value,
        &["now", "getdate", "getutcdate", "sysdatetime", "sysutcdatetime", "current_timestamp"],
    )
}

fn is_function(value: &str, names: &[&str]) -> bool {
    let bare = value.strip_suffix("()").unwrap_or(value);
    names.iter().any(|n| bare.eq_ignore_ascii_case(n))
}

fn is_temporal_literal(data_type: &DataType, value: &str) -> bool {
    if is_now_keyword(value) {
        return true;
    }
    match data_type {
        DataType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        DataType::Time => NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok(),
        DataType::DateTimeOffset => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %:z").is_ok()
        }
        _ => {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnStack,
    Done,
}

/// Depth-first search over child -> parent foreign-key edges with an
/// explicit stack. Each distinct cycle is reported once.
fn check_cycles(model: &SchemaModel, result: &mut ValidationResult) {
    let mut graph: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut display: HashMap<String, &str> = HashMap::new();
    for table in &model.tables {
        let key = name_key(&table.name);
        display.entry(key.clone()).or_insert(&table.name);
        graph.entry(key).or_default();
    }
    for rel in &model.relationships {
        let Some((child, parent)) = rel.dependency() else {
            continue;
        };
        let (child, parent) = (name_key(child), name_key(parent));
        if !graph.contains_key(&parent) {
            continue;
        }
        if let Some(edges) = graph.get_mut(&child) {
            if !edges.contains(&parent) {
                edges.push(parent);
            }
        }
    }

    let mut state: HashMap<&str, Visit> = HashMap::new();
    let mut reported: HashSet<Vec<&str>> = HashSet::new();

    for start in graph.keys() {
        if state.contains_key(start.as_str()) {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        state.insert(start.as_str(), Visit::OnStack);

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let edges = &graph[node];
            if frame.1 >= edges.len() {
                state.insert(node, Visit::Done);
                stack.pop();
                continue;
            }
            let next = edges[frame.1].as_str();
            frame.1 += 1;

            match state.get(next) {
                None => {
                    state.insert(next, Visit::OnStack);
                    stack.push((next, 0));
                }
                Some(Visit::OnStack) => {
                    let from = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<&str> = stack[from..].iter().map(|(n, _)| *n).collect();
                    let min = cycle
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, n)| **n)
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    cycle.rotate_left(min);
                    if reported.insert(cycle.clone()) {
                        let mut names: Vec<&str> = cycle
                            .iter()
                            .map(|&k| display.get(k).copied().unwrap_or(k))
                            .collect();
                        names.push(names[0]);
                        result.warning(format!(
                            "circular reference detected: {}",
                            names.join(" -> ")
                        ));
                    }
                }
                Some(Visit::Done) => {}
            }
        }
    }
}
