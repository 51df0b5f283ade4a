//! Serializer for converting a schema model back to `erDiagram` notation.

use crate::model::{
    ColumnModel, IndexModel, ReferentialAction, RelationshipModel, SchemaModel, TableModel,
};
use crate::parser::DIAGRAM_KEYWORD;
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

const INDENT: &str = "    ";

/// Serialize a model to notation text that parses back to the same structure.
pub fn generate(model: &SchemaModel) -> String {
    let mut output = String::new();
    output.push_str(DIAGRAM_KEYWORD);
    output.push('\n');

    let _ = writeln!(output, "{}%% @version {}", INDENT, model.version);
    for (key, value) in &model.metadata {
        if key.eq_ignore_ascii_case("version") {
            continue;
        }
        let _ = writeln!(output, "{}%% @{} {}", INDENT, key, value);
    }

    for table in &model.tables {
        serialize_table(&mut output, table);
    }

    for rel in &model.relationships {
        serialize_relationship(&mut output, rel);
    }

    output
}

fn serialize_table(output: &mut String, table: &TableModel) {
    output.push_str(INDENT);
    output.push_str(&table.name);
    if let Some(desc) = &table.description {
        let _ = write!(output, "[{}]", quote(desc));
    }
    output.push_str(" {\n");

    // Align column names by the widest type
    let types: Vec<String> = table.columns.iter().map(ColumnModel::type_display).collect();
    let type_width = types.iter().map(|t| t.width()).max().unwrap_or(0);

    for (column, typ) in table.columns.iter().zip(&types) {
        serialize_column(output, column, typ, type_width);
    }

    for index in &table.indexes {
        serialize_index(output, index);
    }

    output.push_str(INDENT);
    output.push_str("}\n");
}

fn serialize_column(output: &mut String, column: &ColumnModel, typ: &str, type_width: usize) {
    let padding = type_width.saturating_sub(typ.width());
    let _ = write!(
        output,
        "{}{}{}{} {}",
        INDENT,
        INDENT,
        typ,
        " ".repeat(padding),
        column.name
    );

    if column.is_primary_key {
        output.push_str(" PK");
    }
    if column.is_foreign_key {
        output.push_str(" FK");
    }
    if !column.is_nullable && !column.is_primary_key {
        output.push_str(" NOT NULL");
    }
    if let Some(value) = &column.default_value {
        output.push_str(" DEFAULT ");
        output.push_str(&default_token(value));
    }
    if let Some(desc) = &column.description {
        output.push(' ');
        output.push_str(&quote(desc));
    }

    output.push('\n');
}

fn serialize_index(output: &mut String, index: &IndexModel) {
    let _ = write!(
        output,
        "{}{}INDEX {} ({})",
        INDENT,
        INDENT,
        index.name,
        index.columns.join(", ")
    );
    if index.is_unique {
        output.push_str(" UNIQUE");
    }
    if index.is_clustered {
        output.push_str(" CLUSTERED");
    }
    output.push('\n');
}

fn serialize_relationship(output: &mut String, rel: &RelationshipModel) {
    output.push_str(INDENT);
    output.push_str(&endpoint(&rel.source_table, rel.source_column.as_deref()));
    output.push(' ');
    output.push_str(rel.relation_type.connector());
    output.push(' ');
    output.push_str(&endpoint(&rel.target_table, rel.target_column.as_deref()));

    if !rel.is_auto_named() {
        let _ = write!(output, " : {}", quote(&rel.name));
    }
    if rel.on_delete != ReferentialAction::NoAction {
        let _ = write!(output, " ON DELETE {}", rel.on_delete.sql());
    }
    if rel.on_update != ReferentialAction::NoAction {
        let _ = write!(output, " ON UPDATE {}", rel.on_update.sql());
    }

    output.push('\n');
}

fn endpoint(table: &str, column: Option<&str>) -> String {
    match column {
        Some(c) => format!("{}.{}", table, c),
        None => table.to_string(),
    }
}

/// Render a default value as a bare token when it lexes as one, else quoted.
pub(crate) fn default_token(value: &str) -> String {
    if is_bare_number(value) || is_bare_call(value) {
        value.to_string()
    } else {
        quote(value)
    }
}

fn is_bare_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_ok = parts
        .next()
        .is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
    !int_part.is_empty() && int_part.chars().all(|c| c.is_ascii_digit()) && frac_ok
}

fn is_bare_call(s: &str) -> bool {
    let ident = s.strip_suffix("()").unwrap_or(s);
    let mut chars = ident.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
