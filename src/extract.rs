//! Sources for the current schema when diffing against a live database
//! instead of a saved document.

use crate::error::{Result, SchemaError};
use crate::executor::{DatabaseExecutor, Params, Row};
use crate::model::{
    ColumnModel, DataType, IndexModel, MAX_LENGTH, ReferentialAction, RelationType,
    RelationshipModel, SchemaModel, TableModel,
};
use crate::sql;
use crate::store::{self, StoreError};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;

pub trait SchemaExtractor {
    fn extract_current_schema(&mut self) -> Result<SchemaModel>;
}

/// Reads the schema from a T-SQL creation script.
#[derive(Debug, Clone)]
pub struct DdlScriptExtractor {
    script: String,
}

impl DdlScriptExtractor {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, StoreError> {
        store::load(path).map(Self::new)
    }
}

impl SchemaExtractor for DdlScriptExtractor {
    fn extract_current_schema(&mut self) -> Result<SchemaModel> {
        sql::parse_sql(&self.script).map_err(|e| SchemaError::Syntax(vec![e.to_string()]))
    }
}

const TABLES_QUERY: &str = "\
SELECT t.name AS table_name, CAST(ep.value AS nvarchar(max)) AS description
FROM sys.tables AS t
JOIN sys.schemas AS s ON s.schema_id = t.schema_id
LEFT JOIN sys.extended_properties AS ep
    ON ep.major_id = t.object_id AND ep.minor_id = 0 AND ep.name = N'MS_Description'
WHERE s.name = @schema
ORDER BY t.name;";

const COLUMNS_QUERY: &str = "\
SELECT t.name AS table_name, c.name AS column_name, ty.name AS type_name,
    c.max_length, c.precision, c.scale, c.is_nullable,
    dc.definition AS default_definition, CAST(ep.value AS nvarchar(max)) AS description
FROM sys.columns AS c
JOIN sys.tables AS t ON t.object_id = c.object_id
JOIN sys.schemas AS s ON s.schema_id = t.schema_id
JOIN sys.types AS ty ON ty.user_type_id = c.user_type_id
LEFT JOIN sys.default_constraints AS dc ON dc.object_id = c.default_object_id
LEFT JOIN sys.extended_properties AS ep
    ON ep.major_id = c.object_id AND ep.minor_id = c.column_id AND ep.name = N'MS_Description'
WHERE s.name = @schema
ORDER BY t.name, c.column_id;";

const INDEXES_QUERY: &str = "\
SELECT t.name AS table_name, i.name AS index_name, i.is_unique, i.is_primary_key,
    i.type_desc, c.name AS column_name
FROM sys.indexes AS i
JOIN sys.tables AS t ON t.object_id = i.object_id
JOIN sys.schemas AS s ON s.schema_id = t.schema_id
JOIN sys.index_columns AS ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
JOIN sys.columns AS c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
WHERE s.name = @schema AND i.name IS NOT NULL AND ic.is_included_column = 0
ORDER BY t.name, i.name, ic.key_ordinal;";

const FOREIGN_KEYS_QUERY: &str = "\
SELECT fk.name AS constraint_name, pt.name AS child_table, pc.name AS child_column,
    rt.name AS parent_table, rc.name AS parent_column,
    fk.delete_referential_action_desc AS on_delete,
    fk.update_referential_action_desc AS on_update
FROM sys.foreign_keys AS fk
JOIN sys.foreign_key_columns AS fkc ON fkc.constraint_object_id = fk.object_id
JOIN sys.tables AS pt ON pt.object_id = fk.parent_object_id
JOIN sys.schemas AS s ON s.schema_id = pt.schema_id
JOIN sys.columns AS pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
JOIN sys.tables AS rt ON rt.object_id = fk.referenced_object_id
JOIN sys.columns AS rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
WHERE s.name = @schema AND fkc.constraint_column_id = 1
ORDER BY fk.name;";

/// Builds the schema from SQL Server catalog views.
pub struct CatalogExtractor<E> {
    executor: E,
    schema: String,
}

impl<E: DatabaseExecutor> CatalogExtractor<E> {
    pub fn new(executor: E, schema: impl Into<String>) -> Self {
        Self {
            executor,
            schema: schema.into(),
        }
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let mut params = Params::new();
        params.insert("@schema".to_string(), Value::String(self.schema.clone()));
        self.executor
            .execute_query(sql, &params)
            .map_err(|e| SchemaError::Execution {
                step: 0,
                message: e.to_string(),
            })
    }
}

impl<E: DatabaseExecutor> SchemaExtractor for CatalogExtractor<E> {
    fn extract_current_schema(&mut self) -> Result<SchemaModel> {
        let mut tables: IndexMap<String, TableModel> = IndexMap::new();

        for row in self.query(TABLES_QUERY)? {
            let name = required(&row, "table_name")?;
            let mut table = TableModel::new(name.clone());
            table.description = text(&row, "description");
            tables.insert(name, table);
        }

        for row in self.query(COLUMNS_QUERY)? {
            let table_name = required(&row, "table_name")?;
            let Some(table) = tables.get_mut(&table_name) else {
                continue;
            };
            table.columns.push(column_from_row(&row)?);
        }

        // Key columns arrive ordered, one row per column.
        let mut indexes: IndexMap<(String, String), IndexModel> = IndexMap::new();
        for row in self.query(INDEXES_QUERY)? {
            let table_name = required(&row, "table_name")?;
            let index_name = required(&row, "index_name")?;
            let column = required(&row, "column_name")?;
            let Some(table) = tables.get_mut(&table_name) else {
                continue;
            };

            if flag(&row, "is_primary_key") {
                if let Some(c) = table.columns.iter_mut().find(|c| c.name == column) {
                    c.is_primary_key = true;
                    c.is_nullable = false;
                }
                continue;
            }
            let index = indexes
                .entry((table_name, index_name.clone()))
                .or_insert_with(|| {
                    let mut index = IndexModel::new(index_name, Vec::<String>::new());
                    index.is_unique = flag(&row, "is_unique");
                    index.is_clustered = text(&row, "type_desc").as_deref() == Some("CLUSTERED");
                    index
                });
            index.columns.push(column);
        }
        for ((table_name, _), index) in indexes {
            if let Some(table) = tables.get_mut(&table_name) {
                table.indexes.push(index);
            }
        }

        let mut relationships = Vec::new();
        for row in self.query(FOREIGN_KEYS_QUERY)? {
            let child = required(&row, "child_table")?;
            let child_column = required(&row, "child_column")?;
            let parent = required(&row, "parent_table")?;
            if !tables.contains_key(&parent) {
                continue;
            }
            if let Some(c) = tables
                .get_mut(&child)
                .and_then(|t| t.columns.iter_mut().find(|c| c.name == child_column))
            {
                c.is_foreign_key = true;
            }

            let action = |key: &str| {
                text(&row, key)
                    .and_then(|a| ReferentialAction::from_name(&a))
                    .unwrap_or_default()
            };
            relationships.push(
                RelationshipModel::new(parent, child, RelationType::OneToMany)
                    .with_name(required(&row, "constraint_name")?)
                    .with_columns(text(&row, "parent_column").as_deref(), Some(child_column.as_str()))
                    .with_on_delete(action("on_delete"))
                    .with_on_update(action("on_update")),
            );
        }

        let mut model = SchemaModel::new();
        model.tables = tables.into_values().collect();
        model.relationships = relationships;
        model
            .metadata
            .insert("source".to_string(), format!("catalog:{}", self.schema));

        tracing::debug!(
            tables = model.tables.len(),
            relationships = model.relationships.len(),
            "extracted catalog schema"
        );
        Ok(model)
    }
}

fn column_from_row(row: &Row) -> Result<ColumnModel> {
    let name = required(row, "column_name")?;
    let data_type = DataType::from_name(&required(row, "type_name")?);
    let mut column = ColumnModel::new(name, data_type);
    column.is_nullable = flag(row, "is_nullable");
    column.description = text(row, "description");
    column.default_value = text(row, "default_definition").map(|d| unwrap_default(&d));

    let max_length = int(row, "max_length");
    let precision = int(row, "precision").and_then(|p| u32::try_from(p).ok());
    let scale = int(row, "scale").and_then(|s| u32::try_from(s).ok());

    if column.data_type.takes_length() {
        // sys.columns reports bytes; n-types use two per character.
        column.length = max_length.map(|len| match len {
            -1 => MAX_LENGTH,
            len if column.data_type.is_unicode() => i32::try_from(len / 2).unwrap_or(MAX_LENGTH),
            len => i32::try_from(len).unwrap_or(MAX_LENGTH),
        });
    } else if column.data_type.is_exact_decimal() {
        column.precision = precision;
        column.scale = scale;
    } else if matches!(
        column.data_type,
        DataType::DateTime2 | DataType::Time | DataType::DateTimeOffset
    ) {
        // fractional seconds are reported as scale
        column.precision = scale;
    } else if column.data_type == DataType::Float {
        column.precision = precision;
    }
    Ok(column)
}

/// `((0))` gives `0`, `(N'x')` gives `x`, `(getdate())` gives `getdate()`.
pub fn unwrap_default(definition: &str) -> String {
    let mut value = definition.trim();
    while value.starts_with('(') && value.ends_with(')') && balanced(&value[1..value.len() - 1]) {
        value = value[1..value.len() - 1].trim();
    }
    let unquoted = value
        .strip_prefix("N'")
        .or_else(|| value.strip_prefix('\''))
        .and_then(|v| v.strip_suffix('\''));
    match unquoted {
        Some(inner) => inner.replace("''", "'"),
        None => value.to_string(),
    }
}

fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn required(row: &Row, key: &str) -> Result<String> {
    text(row, key).ok_or_else(|| SchemaError::UnresolvedReference(format!("catalog row without {}", key)))
}

fn int(row: &Row, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn flag(row: &Row, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorError;
    use serde_json::json;

    /// Answers each catalog query with canned rows.
    struct Catalog {
        queries: Vec<String>,
    }

    fn row(value: serde_json::Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    impl DatabaseExecutor for Catalog {
        fn execute_non_query(&mut self, _sql: &str, _params: &Params) -> Result<u64, ExecutorError> {
            Ok(0)
        }

        fn execute_query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, ExecutorError> {
            assert_eq!(params.get("@schema"), Some(&json!("dbo")));
            self.queries.push(sql.to_string());
            let rows = if sql == TABLES_QUERY {
                vec![
                    row(json!({"table_name": "Customer", "description": "People"})),
                    row(json!({"table_name": "Order", "description": null})),
                ]
            } else if sql == COLUMNS_QUERY {
                vec![
                    row(json!({"table_name": "Customer", "column_name": "Id", "type_name": "int",
                        "max_length": 4, "precision": 10, "scale": 0, "is_nullable": false})),
                    row(json!({"table_name": "Customer", "column_name": "Name", "type_name": "nvarchar",
                        "max_length": 100, "precision": 0, "scale": 0, "is_nullable": true,
                        "description": "Display name"})),
                    row(json!({"table_name": "Order", "column_name": "Id", "type_name": "int",
                        "max_length": 4, "precision": 10, "scale": 0, "is_nullable": false})),
                    row(json!({"table_name": "Order", "column_name": "CustomerId", "type_name": "int",
                        "max_length": 4, "precision": 10, "scale": 0, "is_nullable": false})),
                    row(json!({"table_name": "Order", "column_name": "Total", "type_name": "decimal",
                        "max_length": 9, "precision": 18, "scale": 2, "is_nullable": false,
                        "default_definition": "((0))"})),
                ]
            } else if sql == INDEXES_QUERY {
                vec![
                    row(json!({"table_name": "Customer", "index_name": "PK_Customer", "is_unique": true,
                        "is_primary_key": true, "type_desc": "CLUSTERED", "column_name": "Id"})),
                    row(json!({"table_name": "Order", "index_name": "PK_Order", "is_unique": 1,
                        "is_primary_key": 1, "type_desc": "CLUSTERED", "column_name": "Id"})),
                    row(json!({"table_name": "Order", "index_name": "IX_Order_Customer", "is_unique": 0,
                        "is_primary_key": 0, "type_desc": "NONCLUSTERED", "column_name": "CustomerId"})),
                ]
            } else {
                vec![row(json!({"constraint_name": "FK_Order_Customer", "child_table": "Order",
                    "child_column": "CustomerId", "parent_table": "Customer", "parent_column": "Id",
                    "on_delete": "CASCADE", "on_update": "NO_ACTION"}))]
            };
            Ok(rows)
        }

        fn backup(&mut self, _path: &str) -> Result<(), ExecutorError> {
            Ok(())
        }
    }

    #[test]
    fn test_catalog_extraction() {
        let mut extractor = CatalogExtractor::new(Catalog { queries: Vec::new() }, "dbo");
        let model = extractor.extract_current_schema().unwrap();

        assert_eq!(model.tables.len(), 2);
        let customer = &model.tables[0];
        assert_eq!(customer.description.as_deref(), Some("People"));
        assert!(customer.columns[0].is_primary_key);
        assert_eq!(customer.columns[1].length, Some(50));
        assert_eq!(customer.columns[1].description.as_deref(), Some("Display name"));

        let order = &model.tables[1];
        assert_eq!(order.columns[2].precision, Some(18));
        assert_eq!(order.columns[2].scale, Some(2));
        assert_eq!(order.columns[2].default_value.as_deref(), Some("0"));
        assert_eq!(order.indexes.len(), 1);
        assert_eq!(order.indexes[0].columns, vec!["CustomerId"]);
        assert!(order.columns[1].is_foreign_key);

        let rel = &model.relationships[0];
        assert_eq!(rel.name, "FK_Order_Customer");
        assert_eq!(rel.source_table, "Customer");
        assert_eq!(rel.target_table, "Order");
        assert_eq!(rel.on_delete, ReferentialAction::Cascade);
        assert_eq!(rel.on_update, ReferentialAction::NoAction);
        assert_eq!(extractor.executor.queries.len(), 4);
    }

    #[test]
    fn test_script_extraction() {
        let mut extractor = DdlScriptExtractor::new("CREATE TABLE [T] ([Id] int NOT NULL PRIMARY KEY)");
        let model = extractor.extract_current_schema().unwrap();
        assert_eq!(model.tables[0].name, "T");

        let mut broken = DdlScriptExtractor::new("CREATE TABLE T (Id int");
        assert!(matches!(broken.extract_current_schema(), Err(SchemaError::Syntax(_))));
    }

    #[test]
    fn test_unwrap_default() {
        assert_eq!(unwrap_default("((0))"), "0");
        assert_eq!(unwrap_default("(getdate())"), "getdate()");
        assert_eq!(unwrap_default("(N'it''s')"), "it's");
        assert_eq!(unwrap_default("('a')"), "a");
        assert_eq!(unwrap_default("(1)+(2)"), "(1)+(2)");
    }
}
