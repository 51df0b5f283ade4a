//! DDL generation for whole models and for single schema changes.

use super::dialect::{
    BATCH_SEPARATOR, ObjectKind, is_reserved, object_id, qualified, quote_ident, string_literal,
};
use super::types::{check_bounds, default_literal, render_type};
use crate::compare::{ChangeType, SchemaChange, SchemaObject};
use crate::error::{Result, SchemaError};
use crate::model::{
    ColumnModel, ForeignKeyBinding, ForeignKeyNaming, IndexModel, ReferentialAction,
    RelationshipModel, SchemaModel, TableModel,
};
use crate::validator::SchemaValidator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdlOptions {
    /// Schema every object is created in.
    pub schema: String,
    /// Emit `MS_Description` extended properties for descriptions.
    pub include_descriptions: bool,
    /// Prefix the script with guarded drops of every object it creates.
    pub drop_existing: bool,
    pub naming: ForeignKeyNaming,
}

impl Default for DdlOptions {
    fn default() -> Self {
        Self {
            schema: "dbo".to_string(),
            include_descriptions: true,
            drop_existing: false,
            naming: ForeignKeyNaming::default(),
        }
    }
}

/// Statements for a whole model plus non-fatal warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDdl {
    pub statements: Vec<String>,
    pub warnings: Vec<String>,
}

impl GeneratedDdl {
    pub fn script(&self) -> String {
        render_script(&self.statements)
    }
}

/// Forward and rollback statements for one change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDdl {
    pub statements: Vec<String>,
    pub rollback: Vec<String>,
    pub reversible: bool,
    pub warnings: Vec<String>,
}

impl ChangeDdl {
    fn reversible(statements: Vec<String>, rollback: Vec<String>) -> Self {
        Self {
            statements,
            rollback,
            reversible: true,
            warnings: Vec::new(),
        }
    }

    fn irreversible(statements: Vec<String>) -> Self {
        Self {
            statements,
            rollback: Vec::new(),
            reversible: false,
            warnings: Vec::new(),
        }
    }
}

/// Join statements into one script, each followed by a batch separator.
pub fn render_script(statements: &[String]) -> String {
    let mut out = String::new();
    for statement in statements {
        out.push_str(statement);
        out.push('\n');
        out.push_str(BATCH_SEPARATOR);
        out.push_str("\n\n");
    }
    out
}

pub fn default_constraint_name(table: &str, column: &str) -> String {
    format!("DF_{}_{}", table, column)
}

pub fn primary_key_name(table: &str) -> String {
    format!("PK_{}", table)
}

#[derive(Debug, Clone, Default)]
pub struct DdlGenerator {
    options: DdlOptions,
}

impl DdlGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DdlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DdlOptions {
        &self.options
    }

    /// Full creation script for a model. Fails on validation errors,
    /// unsupported types and dialect bound violations.
    pub fn generate(&self, model: &SchemaModel) -> Result<GeneratedDdl> {
        let validation = SchemaValidator::with_naming(self.options.naming.clone()).validate(model);
        if !validation.is_valid {
            return Err(SchemaError::validation("model", validation.errors));
        }

        let mut ddl = GeneratedDdl::default();
        self.check_dialect(model, &mut ddl.warnings)?;

        if self.options.drop_existing {
            ddl.statements.extend(self.drop_existing(model));
        }

        for table in &model.tables {
            ddl.statements.extend(self.create_table(table)?);
        }
        for table in &model.tables {
            for index in &table.indexes {
                ddl.statements.push(self.create_index(&table.name, index));
            }
        }
        for rel in &model.relationships {
            match rel.binding(model, &self.options.naming) {
                Some(binding) => ddl
                    .statements
                    .push(self.add_foreign_key(&binding, &mut ddl.warnings)),
                None => ddl.warnings.push(junction_warning(rel)),
            }
        }

        tracing::debug!(
            statements = ddl.statements.len(),
            warnings = ddl.warnings.len(),
            "generated ddl"
        );
        Ok(ddl)
    }

    fn check_dialect(&self, model: &SchemaModel, warnings: &mut Vec<String>) -> Result<()> {
        let mut errors = Vec::new();
        for table in &model.tables {
            if is_reserved(&table.name) {
                warnings.push(format!("Table name '{}' is a reserved word", table.name));
            }
            for column in &table.columns {
                if render_type(column).is_none() {
                    return Err(unsupported(table, column));
                }
                if is_reserved(&column.name) {
                    warnings.push(format!(
                        "Column name '{}.{}' is a reserved word",
                        table.name, column.name
                    ));
                }
                for problem in check_bounds(column) {
                    errors.push(format!("Column '{}.{}': {}", table.name, column.name, problem));
                }
                if column.data_type.is_string() && column.length.is_none() {
                    warnings.push(format!(
                        "Column '{}.{}' has no length; the server default applies",
                        table.name, column.name
                    ));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::validation("target", errors))
        }
    }

    fn drop_existing(&self, model: &SchemaModel) -> Vec<String> {
        let mut statements: Vec<String> = model
            .relationships
            .iter()
            .filter_map(|rel| rel.binding(model, &self.options.naming))
            .map(|binding| self.drop_foreign_key(&binding))
            .collect();
        for table in model.tables.iter().rev() {
            statements.push(self.drop_table_if_exists(&table.name));
        }
        statements
    }

    /// DDL for a single change. A table drop is refused unless
    /// `allow_table_drop` is set.
    pub fn change_ddl(&self, change: &SchemaChange, allow_table_drop: bool) -> Result<ChangeDdl> {
        match change.change_type {
            ChangeType::TableAdded => {
                let table = table_of(&change.after, change)?;
                let mut statements = self.create_table(table)?;
                statements.extend(table.indexes.iter().map(|i| self.create_index(&table.name, i)));
                Ok(ChangeDdl::reversible(
                    statements,
                    vec![self.drop_table_if_exists(&table.name)],
                ))
            }
            ChangeType::TableRemoved => {
                if !allow_table_drop {
                    return Err(SchemaError::PolicyViolation(format!(
                        "dropping table '{}' requires allow_table_drop",
                        change.object_name
                    )));
                }
                let table = table_of(&change.before, change)?;
                Ok(ChangeDdl::irreversible(self.drop_table(&table.name)))
            }
            ChangeType::TableModified => {
                let before = table_of(&change.before, change)?;
                let after = table_of(&change.after, change)?;
                let forward = self.change_description(
                    &after.name,
                    None,
                    before.description.as_deref(),
                    after.description.as_deref(),
                );
                let rollback = self.change_description(
                    &after.name,
                    None,
                    after.description.as_deref(),
                    before.description.as_deref(),
                );
                Ok(ChangeDdl::reversible(
                    forward.into_iter().collect(),
                    rollback.into_iter().collect(),
                ))
            }
            ChangeType::ColumnAdded => {
                let table = owner_of(change)?;
                let column = column_of(&change.after, change)?;
                let mut ddl = ChangeDdl::reversible(
                    self.add_column(table, column)?,
                    self.drop_column(table, column),
                );
                if !column.is_nullable && column.default_value.is_none() {
                    ddl.warnings.push(format!(
                        "Column '{}.{}' is NOT NULL without a default; adding it fails on a non-empty table",
                        table, column.name
                    ));
                }
                Ok(ddl)
            }
            ChangeType::ColumnRemoved => {
                let table = owner_of(change)?;
                let column = column_of(&change.before, change)?;
                Ok(ChangeDdl::irreversible(self.drop_column(table, column)))
            }
            ChangeType::ColumnModified => {
                let table = owner_of(change)?;
                let before = column_of(&change.before, change)?;
                let after = column_of(&change.after, change)?;
                let mut ddl = ChangeDdl::reversible(
                    self.modify_column(table, before, after)?,
                    self.modify_column(table, after, before)?,
                );
                if before.is_primary_key != after.is_primary_key {
                    ddl.warnings.push(format!(
                        "Primary key membership of '{}.{}' changed; rebuild {} manually",
                        table,
                        after.name,
                        quote_ident(&primary_key_name(table))
                    ));
                }
                if self.alters_shape(table, before, after)? {
                    for index in &change.dependent_indexes {
                        ddl.warnings.push(format!(
                            "Column '{}.{}' is used by index {}; drop it before ALTER COLUMN and recreate it after",
                            table,
                            after.name,
                            quote_ident(index)
                        ));
                    }
                    if before.is_foreign_key || after.is_foreign_key {
                        ddl.warnings.push(format!(
                            "Column '{}.{}' is a foreign key column; ALTER COLUMN fails until its constraint is dropped",
                            table, after.name
                        ));
                    }
                }
                Ok(ddl)
            }
            ChangeType::IndexAdded => {
                let table = owner_of(change)?;
                let index = index_of(&change.after, change)?;
                Ok(ChangeDdl::reversible(
                    vec![self.create_index(table, index)],
                    vec![self.drop_index(table, &index.name)],
                ))
            }
            ChangeType::IndexRemoved => {
                let table = owner_of(change)?;
                let index = index_of(&change.before, change)?;
                Ok(ChangeDdl::reversible(
                    vec![self.drop_index(table, &index.name)],
                    vec![self.create_index(table, index)],
                ))
            }
            ChangeType::IndexModified => {
                let table = owner_of(change)?;
                let before = index_of(&change.before, change)?;
                let after = index_of(&change.after, change)?;
                Ok(ChangeDdl::reversible(
                    vec![self.drop_index(table, &before.name), self.create_index(table, after)],
                    vec![self.drop_index(table, &after.name), self.create_index(table, before)],
                ))
            }
            ChangeType::RelationshipAdded => {
                let mut ddl = ChangeDdl::reversible(Vec::new(), Vec::new());
                match &change.new_binding {
                    Some(binding) => {
                        ddl.statements.push(self.add_foreign_key(binding, &mut ddl.warnings));
                        ddl.rollback.push(self.drop_foreign_key(binding));
                    }
                    None => ddl.warnings.push(self.unbound_warning(change)),
                }
                Ok(ddl)
            }
            ChangeType::RelationshipRemoved => {
                let mut ddl = ChangeDdl::reversible(Vec::new(), Vec::new());
                if let Some(binding) = &change.old_binding {
                    ddl.statements.push(self.drop_foreign_key(binding));
                    ddl.rollback.push(self.add_foreign_key(binding, &mut ddl.warnings));
                }
                Ok(ddl)
            }
            ChangeType::RelationshipModified => {
                let mut ddl = ChangeDdl::reversible(Vec::new(), Vec::new());
                if let Some(old) = &change.old_binding {
                    ddl.statements.push(self.drop_foreign_key(old));
                }
                match &change.new_binding {
                    Some(new) => {
                        ddl.statements.push(self.add_foreign_key(new, &mut ddl.warnings));
                        ddl.rollback.push(self.drop_foreign_key(new));
                    }
                    None => ddl.warnings.push(self.unbound_warning(change)),
                }
                if let Some(old) = &change.old_binding {
                    let mut ignored = Vec::new();
                    ddl.rollback.push(self.add_foreign_key(old, &mut ignored));
                }
                Ok(ddl)
            }
        }
    }

    fn table_ref(&self, table: &str) -> String {
        qualified(&self.options.schema, table)
    }

    fn column_type(&self, table: &str, column: &ColumnModel) -> Result<String> {
        let rendered = render_type(column).ok_or_else(|| SchemaError::UnsupportedType {
            table: table.to_string(),
            column: column.name.clone(),
            type_name: column.data_type.name().to_string(),
        })?;
        let problems = check_bounds(column);
        if !problems.is_empty() {
            return Err(SchemaError::validation(
                "target",
                problems
                    .into_iter()
                    .map(|p| format!("Column '{}.{}': {}", table, column.name, p))
                    .collect(),
            ));
        }
        Ok(rendered)
    }

    fn column_definition(&self, table: &str, column: &ColumnModel) -> Result<String> {
        let mut def = format!(
            "{} {} {}",
            quote_ident(&column.name),
            self.column_type(table, column)?,
            if column.is_nullable { "NULL" } else { "NOT NULL" }
        );
        if let Some(value) = &column.default_value {
            def.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                quote_ident(&default_constraint_name(table, &column.name)),
                default_literal(column, value)
            ));
        }
        Ok(def)
    }

    /// `CREATE TABLE` followed by its description properties.
    pub fn create_table(&self, table: &TableModel) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(table.columns.len() + 1);
        for column in &table.columns {
            lines.push(format!("    {}", self.column_definition(&table.name, column)?));
        }

        let key: Vec<String> = table
            .primary_key_columns()
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect();
        if !key.is_empty() {
            let clustering = if table.has_clustered_index() {
                "NONCLUSTERED"
            } else {
                "CLUSTERED"
            };
            lines.push(format!(
                "    CONSTRAINT {} PRIMARY KEY {} ({})",
                quote_ident(&primary_key_name(&table.name)),
                clustering,
                key.join(", ")
            ));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n{}\n);",
            self.table_ref(&table.name),
            lines.join(",\n")
        )];

        if self.options.include_descriptions {
            if let Some(desc) = &table.description {
                statements.push(self.add_description(&table.name, None, desc));
            }
            for column in &table.columns {
                if let Some(desc) = &column.description {
                    statements.push(self.add_description(&table.name, Some(&column.name), desc));
                }
            }
        }
        Ok(statements)
    }

    fn drop_table_if_exists(&self, table: &str) -> String {
        format!(
            "IF {} IS NOT NULL DROP TABLE {};",
            object_id(&self.options.schema, table, ObjectKind::Table),
            self.table_ref(table)
        )
    }

    /// Drops every foreign key referencing the table, then the table.
    fn drop_table(&self, table: &str) -> Vec<String> {
        let referencing = format!(
            "DECLARE @sql nvarchar(max) = N'';\n\
             SELECT @sql += N'ALTER TABLE ' + QUOTENAME(OBJECT_SCHEMA_NAME(fk.parent_object_id)) + N'.' + QUOTENAME(OBJECT_NAME(fk.parent_object_id)) + N' DROP CONSTRAINT ' + QUOTENAME(fk.name) + N';'\n\
             FROM sys.foreign_keys AS fk\n\
             WHERE fk.referenced_object_id = {};\n\
             EXEC sys.sp_executesql @sql;",
            object_id(&self.options.schema, table, ObjectKind::Table)
        );
        vec![referencing, self.drop_table_if_exists(table)]
    }

    fn add_column(&self, table: &str, column: &ColumnModel) -> Result<Vec<String>> {
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD {};",
            self.table_ref(table),
            self.column_definition(table, column)?
        )];
        if self.options.include_descriptions {
            if let Some(desc) = &column.description {
                statements.push(self.add_description(table, Some(&column.name), desc));
            }
        }
        Ok(statements)
    }

    fn drop_column(&self, table: &str, column: &ColumnModel) -> Vec<String> {
        let mut statements = Vec::new();
        if column.default_value.is_some() {
            statements.push(self.drop_default(table, &column.name));
        }
        statements.push(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.table_ref(table),
            quote_ident(&column.name)
        ));
        statements
    }

    fn alters_shape(&self, table: &str, before: &ColumnModel, after: &ColumnModel) -> Result<bool> {
        Ok(self.column_type(table, before)? != self.column_type(table, after)?
            || before.is_nullable != after.is_nullable)
    }

    fn modify_column(&self, table: &str, before: &ColumnModel, after: &ColumnModel) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        let shape_changed = self.alters_shape(table, before, after)?;
        let default_changed = before.default_value != after.default_value;

        if before.name != after.name {
            statements.push(self.rename_column(table, &before.name, &after.name));
        }
        if before.default_value.is_some() && (default_changed || shape_changed) {
            statements.push(self.drop_default(table, &after.name));
        }
        if shape_changed {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} {};",
                self.table_ref(table),
                quote_ident(&after.name),
                self.column_type(table, after)?,
                if after.is_nullable { "NULL" } else { "NOT NULL" }
            ));
        }
        if let Some(value) = &after.default_value {
            if default_changed || shape_changed {
                statements.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {};",
                    self.table_ref(table),
                    quote_ident(&default_constraint_name(table, &after.name)),
                    default_literal(after, value),
                    quote_ident(&after.name)
                ));
            }
        }
        statements.extend(self.change_description(
            table,
            Some(&after.name),
            before.description.as_deref(),
            after.description.as_deref(),
        ));
        Ok(statements)
    }

    fn rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "EXEC sp_rename {}, {}, N'COLUMN';",
            string_literal(&format!("{}.{}", self.table_ref(table), quote_ident(from)), true),
            string_literal(to, true)
        )
    }

    /// Drops the column's default under whatever name the catalog holds.
    fn drop_default(&self, table: &str, column: &str) -> String {
        format!(
            "DECLARE @sql nvarchar(max);\n\
             SELECT @sql = {} + QUOTENAME(dc.name) + N';'\n\
             FROM sys.default_constraints AS dc\n\
             JOIN sys.columns AS c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id\n\
             WHERE dc.parent_object_id = {} AND c.name = {};\n\
             IF @sql IS NOT NULL EXEC sys.sp_executesql @sql;",
            string_literal(&format!("ALTER TABLE {} DROP CONSTRAINT ", self.table_ref(table)), true),
            object_id(&self.options.schema, table, ObjectKind::Table),
            string_literal(column, true)
        )
    }

    pub fn create_index(&self, table: &str, index: &IndexModel) -> String {
        let mut kind = String::new();
        if index.is_unique {
            kind.push_str("UNIQUE ");
        }
        if index.is_clustered {
            kind.push_str("CLUSTERED ");
        }
        let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            kind,
            quote_ident(&index.name),
            self.table_ref(table),
            columns.join(", ")
        )
    }

    fn drop_index(&self, table: &str, index: &str) -> String {
        format!(
            "IF EXISTS (SELECT 1 FROM sys.indexes WHERE name = {} AND object_id = {}) DROP INDEX {} ON {};",
            string_literal(index, true),
            object_id(&self.options.schema, table, ObjectKind::Table),
            quote_ident(index),
            self.table_ref(table)
        )
    }

    pub fn add_foreign_key(&self, binding: &ForeignKeyBinding, warnings: &mut Vec<String>) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.table_ref(&binding.child_table),
            quote_ident(&binding.constraint_name),
            quote_ident(&binding.fk_column),
            self.table_ref(&binding.parent_table),
            quote_ident(&binding.referenced_column)
        );
        for (clause, action) in [("DELETE", binding.on_delete), ("UPDATE", binding.on_update)] {
            match action {
                ReferentialAction::NoAction => {}
                ReferentialAction::Restrict => warnings.push(format!(
                    "{}: ON {} RESTRICT is not supported; NO ACTION applies",
                    binding.constraint_name, clause
                )),
                action => sql.push_str(&format!(" ON {} {}", clause, action.sql())),
            }
        }
        sql.push(';');
        sql
    }

    fn drop_foreign_key(&self, binding: &ForeignKeyBinding) -> String {
        format!(
            "IF {} IS NOT NULL ALTER TABLE {} DROP CONSTRAINT {};",
            object_id(&self.options.schema, &binding.constraint_name, ObjectKind::ForeignKey),
            self.table_ref(&binding.child_table),
            quote_ident(&binding.constraint_name)
        )
    }

    fn property_target(&self, table: &str, column: Option<&str>) -> String {
        let mut target = format!(
            "@level0type = N'SCHEMA', @level0name = {}, @level1type = N'TABLE', @level1name = {}",
            string_literal(&self.options.schema, true),
            string_literal(table, true)
        );
        if let Some(column) = column {
            target.push_str(&format!(
                ", @level2type = N'COLUMN', @level2name = {}",
                string_literal(column, true)
            ));
        }
        target
    }

    fn add_description(&self, table: &str, column: Option<&str>, text: &str) -> String {
        format!(
            "EXEC sys.sp_addextendedproperty @name = N'MS_Description', @value = {}, {};",
            string_literal(text, true),
            self.property_target(table, column)
        )
    }

    fn change_description(
        &self,
        table: &str,
        column: Option<&str>,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Option<String> {
        if !self.options.include_descriptions || old == new {
            return None;
        }
        Some(match (old, new) {
            (None, Some(text)) => self.add_description(table, column, text),
            (Some(_), Some(text)) => format!(
                "EXEC sys.sp_updateextendedproperty @name = N'MS_Description', @value = {}, {};",
                string_literal(text, true),
                self.property_target(table, column)
            ),
            _ => format!(
                "EXEC sys.sp_dropextendedproperty @name = N'MS_Description', {};",
                self.property_target(table, column)
            ),
        })
    }

    fn unbound_warning(&self, change: &SchemaChange) -> String {
        match &change.after {
            Some(SchemaObject::Relationship(rel)) => junction_warning(rel),
            _ => format!("Relationship '{}' has no foreign key binding", change.object_name),
        }
    }
}

fn junction_warning(rel: &RelationshipModel) -> String {
    format!(
        "Relationship '{}' is many-to-many and needs a junction table; no foreign key generated",
        rel.name
    )
}

fn unsupported(table: &TableModel, column: &ColumnModel) -> SchemaError {
    SchemaError::UnsupportedType {
        table: table.name.clone(),
        column: column.name.clone(),
        type_name: column.data_type.name().to_string(),
    }
}

fn missing(change: &SchemaChange, what: &str) -> SchemaError {
    SchemaError::UnresolvedReference(format!(
        "{} '{}' carries no {}",
        change.change_type, change.object_name, what
    ))
}

fn owner_of(change: &SchemaChange) -> Result<&str> {
    change.table.as_deref().ok_or_else(|| missing(change, "owning table"))
}

fn table_of<'a>(object: &'a Option<SchemaObject>, change: &SchemaChange) -> Result<&'a TableModel> {
    match object {
        Some(SchemaObject::Table(t)) => Ok(t),
        _ => Err(missing(change, "table definition")),
    }
}

fn column_of<'a>(object: &'a Option<SchemaObject>, change: &SchemaChange) -> Result<&'a ColumnModel> {
    match object {
        Some(SchemaObject::Column(c)) => Ok(c),
        _ => Err(missing(change, "column definition")),
    }
}

fn index_of<'a>(object: &'a Option<SchemaObject>, change: &SchemaChange) -> Result<&'a IndexModel> {
    match object {
        Some(SchemaObject::Index(i)) => Ok(i),
        _ => Err(missing(change, "index definition")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::SchemaComparer;
    use crate::model::{DataType, RelationType};

    fn shop() -> SchemaModel {
        SchemaModel::new()
            .with_table(
                TableModel::new("Customer")
                    .with_description("People who buy")
                    .with_column(ColumnModel::new("Id", DataType::Int).primary_key())
                    .with_column(ColumnModel::new("Name", DataType::NVarChar).with_length(50).not_null()),
            )
            .with_table(
                TableModel::new("Order")
                    .with_column(ColumnModel::new("Id", DataType::Int).primary_key())
                    .with_column(ColumnModel::new("CustomerId", DataType::Int).foreign_key().not_null())
                    .with_column(ColumnModel::new("Paid", DataType::Bit).not_null().with_default("false"))
                    .with_index(IndexModel::new("IX_Order_Customer", ["CustomerId"])),
            )
            .with_relationship(
                RelationshipModel::new("Customer", "Order", RelationType::OneToMany)
                    .with_on_delete(ReferentialAction::Cascade),
            )
    }

    #[test]
    fn test_create_table() {
        let ddl = DdlGenerator::new().generate(&shop()).unwrap();
        assert_eq!(
            ddl.statements[0],
            "CREATE TABLE [dbo].[Customer] (\n    [Id] int NOT NULL,\n    [Name] nvarchar(50) NOT NULL,\n    CONSTRAINT [PK_Customer] PRIMARY KEY CLUSTERED ([Id])\n);"
        );
        assert!(ddl.statements[1].starts_with("EXEC sys.sp_addextendedproperty @name = N'MS_Description', @value = N'People who buy'"));
        assert!(ddl.statements[2].contains("[Paid] bit NOT NULL CONSTRAINT [DF_Order_Paid] DEFAULT 0"));
    }

    #[test]
    fn test_indexes_and_foreign_keys() {
        let ddl = DdlGenerator::new().generate(&shop()).unwrap();
        assert!(ddl.statements.contains(
            &"CREATE INDEX [IX_Order_Customer] ON [dbo].[Order] ([CustomerId]);".to_string()
        ));
        let fk = ddl.statements.last().unwrap();
        assert_eq!(
            fk,
            "ALTER TABLE [dbo].[Order] ADD CONSTRAINT [FK_Customer_Order] FOREIGN KEY ([CustomerId]) REFERENCES [dbo].[Customer] ([Id]) ON DELETE CASCADE;"
        );
        assert!(ddl.warnings.contains(&"Table name 'Order' is a reserved word".to_string()));
    }

    #[test]
    fn test_script_has_batch_separators() {
        let ddl = DdlGenerator::new().generate(&shop()).unwrap();
        let script = ddl.script();
        assert_eq!(script.matches("\nGO\n").count(), ddl.statements.len());
    }

    #[test]
    fn test_drop_existing_prologue() {
        let options = DdlOptions {
            drop_existing: true,
            include_descriptions: false,
            ..DdlOptions::default()
        };
        let ddl = DdlGenerator::with_options(options).generate(&shop()).unwrap();
        assert_eq!(
            ddl.statements[0],
            "IF OBJECT_ID(N'[dbo].[FK_Customer_Order]', N'F') IS NOT NULL ALTER TABLE [dbo].[Order] DROP CONSTRAINT [FK_Customer_Order];"
        );
        assert_eq!(
            ddl.statements[1],
            "IF OBJECT_ID(N'[dbo].[Order]', N'U') IS NOT NULL DROP TABLE [dbo].[Order];"
        );
    }

    #[test]
    fn test_unsupported_type() {
        let model = SchemaModel::new().with_table(
            TableModel::new("Place")
                .with_column(ColumnModel::new("Id", DataType::Int).primary_key())
                .with_column(ColumnModel::new("Shape", DataType::from_name("geography"))),
        );
        let err = DdlGenerator::new().generate(&model).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { ref column, .. } if column == "Shape"));
    }

    #[test]
    fn test_bounds_are_errors() {
        let model = SchemaModel::new().with_table(
            TableModel::new("Doc")
                .with_column(ColumnModel::new("Id", DataType::Int).primary_key())
                .with_column(ColumnModel::new("Body", DataType::VarChar).with_length(9000)),
        );
        let err = DdlGenerator::new().generate(&model).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid target schema: Column 'Doc.Body': length 9000 of varchar must be in 1..=8000 or max"
        );
    }

    #[test]
    fn test_restrict_and_many_to_many_warnings() {
        let mut model = shop();
        model.relationships[0].on_update = ReferentialAction::Restrict;
        model.relationships.push(RelationshipModel::new("Customer", "Order", RelationType::ManyToMany).with_name("Favourites"));
        let ddl = DdlGenerator::new().generate(&model).unwrap();
        assert!(ddl.warnings.iter().any(|w| w.contains("ON UPDATE RESTRICT is not supported")));
        assert!(ddl.warnings.iter().any(|w| w.contains("'Favourites' is many-to-many")));
        assert!(!ddl.script().contains("RESTRICT"));
    }

    #[test]
    fn test_table_drop_needs_permission() {
        let old = shop();
        let mut new = shop();
        new.tables.retain(|t| t.name != "Order");
        new.relationships.clear();
        let changes = SchemaComparer::new().diff(&old, &new);
        let drop = changes.of_type(ChangeType::TableRemoved).next().unwrap();

        let generator = DdlGenerator::new();
        let err = generator.change_ddl(drop, false).unwrap_err();
        assert!(matches!(err, SchemaError::PolicyViolation(_)));

        let ddl = generator.change_ddl(drop, true).unwrap();
        assert!(!ddl.reversible);
        assert!(ddl.statements[0].contains("FROM sys.foreign_keys AS fk"));
        assert_eq!(
            ddl.statements[1],
            "IF OBJECT_ID(N'[dbo].[Order]', N'U') IS NOT NULL DROP TABLE [dbo].[Order];"
        );
    }

    #[test]
    fn test_column_changes() {
        let old = shop();
        let mut new = shop();
        let order = new.table_mut("Order").unwrap();
        order.columns[2].default_value = Some("true".into());
        order.columns.push(ColumnModel::new("Note", DataType::NVarChar).with_length(100));
        let changes = SchemaComparer::new().diff(&old, &new);
        let generator = DdlGenerator::new();

        let modified = changes.of_type(ChangeType::ColumnModified).next().unwrap();
        let ddl = generator.change_ddl(modified, false).unwrap();
        assert_eq!(ddl.statements.len(), 2);
        assert!(ddl.statements[0].contains("FROM sys.default_constraints AS dc"));
        assert_eq!(
            ddl.statements[1],
            "ALTER TABLE [dbo].[Order] ADD CONSTRAINT [DF_Order_Paid] DEFAULT 1 FOR [Paid];"
        );
        assert!(ddl.rollback[1].contains("DEFAULT 0 FOR [Paid]"));

        let added = changes.of_type(ChangeType::ColumnAdded).next().unwrap();
        let ddl = generator.change_ddl(added, false).unwrap();
        assert_eq!(ddl.statements, vec!["ALTER TABLE [dbo].[Order] ADD [Note] nvarchar(100) NULL;"]);
        assert_eq!(ddl.rollback, vec!["ALTER TABLE [dbo].[Order] DROP COLUMN [Note];"]);
    }

    #[test]
    fn test_alter_column_type() {
        let old = shop();
        let mut new = shop();
        new.tables[0].columns[1].length = Some(200);
        let changes = SchemaComparer::new().diff(&old, &new);
        let ddl = DdlGenerator::new().change_ddl(&changes.changes[0], false).unwrap();
        assert_eq!(
            ddl.statements,
            vec!["ALTER TABLE [dbo].[Customer] ALTER COLUMN [Name] nvarchar(200) NOT NULL;"]
        );
        assert_eq!(
            ddl.rollback,
            vec!["ALTER TABLE [dbo].[Customer] ALTER COLUMN [Name] nvarchar(50) NOT NULL;"]
        );
    }

    #[test]
    fn test_default_drop_finds_catalog_names() {
        let generator = DdlGenerator::new();
        assert_eq!(
            generator.drop_default("Order", "Paid"),
            "DECLARE @sql nvarchar(max);\n\
             SELECT @sql = N'ALTER TABLE [dbo].[Order] DROP CONSTRAINT ' + QUOTENAME(dc.name) + N';'\n\
             FROM sys.default_constraints AS dc\n\
             JOIN sys.columns AS c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id\n\
             WHERE dc.parent_object_id = OBJECT_ID(N'[dbo].[Order]', N'U') AND c.name = N'Paid';\n\
             IF @sql IS NOT NULL EXEC sys.sp_executesql @sql;"
        );
        assert!(!generator.drop_default("Order", "Paid").contains("DF_Order_Paid"));
    }

    #[test]
    fn test_case_only_rename() {
        let old = shop();
        let mut new = shop();
        new.tables[0].columns[1].name = "name".into();
        let changes = SchemaComparer::new().diff(&old, &new);
        let ddl = DdlGenerator::new().change_ddl(&changes.changes[0], false).unwrap();
        assert_eq!(
            ddl.statements,
            vec!["EXEC sp_rename N'[dbo].[Customer].[Name]', N'name', N'COLUMN';"]
        );
        assert_eq!(
            ddl.rollback,
            vec!["EXEC sp_rename N'[dbo].[Customer].[name]', N'Name', N'COLUMN';"]
        );
        assert!(ddl.warnings.is_empty());
    }

    #[test]
    fn test_alter_indexed_or_foreign_key_column_warns() {
        let old = shop();
        let mut new = shop();
        let order = new.table_mut("Order").unwrap();
        order.columns[1].data_type = DataType::BigInt;
        let changes = SchemaComparer::new().diff(&old, &new);
        let modified = changes.of_type(ChangeType::ColumnModified).next().unwrap();
        let ddl = DdlGenerator::new().change_ddl(modified, false).unwrap();
        assert_eq!(
            ddl.statements,
            vec!["ALTER TABLE [dbo].[Order] ALTER COLUMN [CustomerId] bigint NOT NULL;"]
        );
        assert_eq!(ddl.warnings.len(), 2);
        assert!(ddl.warnings[0].contains("index [IX_Order_Customer]"));
        assert!(ddl.warnings[1].contains("foreign key column"));

        // A description-only change emits no ALTER COLUMN and no warning.
        let mut new = shop();
        new.table_mut("Order").unwrap().columns[1].description = Some("Buyer".into());
        let changes = SchemaComparer::new().diff(&old, &new);
        let modified = changes.of_type(ChangeType::ColumnModified).next().unwrap();
        let ddl = DdlGenerator::new().change_ddl(modified, false).unwrap();
        assert!(ddl.warnings.is_empty());
    }

    #[test]
    fn test_relationship_modified_swaps_constraints() {
        let old = shop();
        let mut new = shop();
        new.relationships[0].on_delete = ReferentialAction::NoAction;
        let changes = SchemaComparer::new().diff(&old, &new);
        let ddl = DdlGenerator::new().change_ddl(&changes.changes[0], false).unwrap();
        assert_eq!(ddl.statements.len(), 2);
        assert!(ddl.statements[0].contains("DROP CONSTRAINT [FK_Customer_Order]"));
        assert!(!ddl.statements[1].contains("ON DELETE"));
        assert!(ddl.rollback[1].ends_with("ON DELETE CASCADE;"));
    }
}
