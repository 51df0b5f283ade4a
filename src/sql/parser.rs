//! T-SQL DDL parser producing a schema model.

use super::lexer::{Lexer, Token};
use crate::model::{
    ColumnModel, DataType, IndexModel, MAX_LENGTH, ReferentialAction, RelationType,
    RelationshipModel, SchemaModel, TableModel, name_key,
};
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("Unexpected token: {0:?}")]
    UnexpectedToken(Token),
    #[error("Expected {expected}, found {found:?}")]
    Expected { expected: String, found: Token },
    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// Parse a T-SQL script into a schema model.
///
/// Reads `CREATE TABLE`, `CREATE INDEX`, `ALTER TABLE ... ADD CONSTRAINT`
/// and `MS_Description` extended properties. Other statements are skipped.
pub fn parse_sql(input: &str) -> Result<SchemaModel, SqlParseError> {
    let tokens = Lexer::new(input).tokenize();
    let mut parser = Parser::new(tokens);
    parser.parse()?;
    Ok(parser.finish())
}

struct FkInfo {
    name: Option<String>,
    table: String,
    columns: Vec<String>,
    target: String,
    target_columns: Vec<String>,
    on_delete: ReferentialAction,
    on_update: ReferentialAction,
}

struct PendingIndex {
    table: String,
    index: IndexModel,
}

/// A constraint added to an existing table by `ALTER TABLE`.
enum Addition {
    ForeignKey(FkInfo),
    PrimaryKey(Vec<String>),
    Unique(IndexModel),
    Default { column: String, value: String },
}

struct Description {
    table: String,
    column: Option<String>,
    text: String,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    tables: Vec<TableModel>,
    foreign_keys: Vec<FkInfo>,
    indexes: Vec<PendingIndex>,
    additions: Vec<(String, Addition)>,
    descriptions: Vec<Description>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            tables: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            additions: Vec::new(),
            descriptions: Vec::new(),
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident(&mut self, expected: &str) -> Result<String, SqlParseError> {
        match self.current().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            Token::Eof => Err(SqlParseError::UnexpectedEof),
            found => Err(SqlParseError::Expected {
                expected: expected.to_string(),
                found,
            }),
        }
    }

    /// `name`, `schema.name` or `db.schema.name`; returns the last part.
    fn object_name(&mut self, expected: &str) -> Result<String, SqlParseError> {
        let mut name = self.ident(expected)?;
        while self.eat(&Token::Dot) {
            name = self.ident(expected)?;
        }
        Ok(name)
    }

    fn parse(&mut self) -> Result<(), SqlParseError> {
        while self.current() != &Token::Eof {
            match self.current() {
                Token::Create => {
                    self.advance();
                    self.parse_create()?;
                }
                Token::Alter => {
                    self.advance();
                    self.parse_alter_table()?;
                }
                Token::Exec => {
                    self.advance();
                    self.parse_extended_property();
                }
                Token::Go | Token::Semicolon => self.advance(),
                _ => {
                    self.advance();
                    self.skip_statement();
                }
            }
        }
        Ok(())
    }

    fn parse_create(&mut self) -> Result<(), SqlParseError> {
        let mut unique = false;
        let mut clustered = false;
        loop {
            match self.current() {
                Token::Unique => unique = true,
                Token::Clustered => clustered = true,
                Token::Nonclustered => clustered = false,
                _ => break,
            }
            self.advance();
        }

        match self.current() {
            Token::Table if !unique => {
                self.advance();
                self.parse_create_table()
            }
            Token::Index => {
                self.advance();
                self.parse_create_index(unique, clustered)
            }
            // views, procedures, schemas
            _ => {
                self.skip_statement();
                Ok(())
            }
        }
    }

    fn parse_create_table(&mut self) -> Result<(), SqlParseError> {
        let table_name = self.object_name("table name")?;
        if !self.eat(&Token::LParen) {
            self.skip_statement();
            return Ok(());
        }

        let mut table = TableModel::new(table_name.clone());
        let mut pk_columns: Vec<String> = Vec::new();

        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => self.advance(),
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                Token::Constraint | Token::Primary | Token::Foreign | Token::Unique | Token::Check => {
                    match self.parse_table_constraint(&table_name)? {
                        Some(Addition::PrimaryKey(cols)) => pk_columns.extend(cols),
                        Some(Addition::ForeignKey(fk)) => self.foreign_keys.push(fk),
                        Some(Addition::Unique(index)) => table.indexes.push(index),
                        Some(Addition::Default { .. }) | None => {}
                    }
                }
                Token::Index => {
                    self.advance();
                    let index = self.parse_inline_index()?;
                    table.indexes.push(index);
                }
                Token::Ident(_) => {
                    let (column, inline_pk) = self.parse_column(&table_name)?;
                    if inline_pk {
                        pk_columns.push(column.name.clone());
                    }
                    table.columns.push(column);
                }
                other => return Err(SqlParseError::UnexpectedToken(other.clone())),
            }
        }

        // WITH (...) / ON [PRIMARY] / TEXTIMAGE_ON
        self.skip_statement();

        mark_primary_key(&mut table, &pk_columns);
        self.tables.push(table);
        Ok(())
    }

    /// Column definition. Returns the column and whether it carried an
    /// inline `PRIMARY KEY`.
    fn parse_column(&mut self, table: &str) -> Result<(ColumnModel, bool), SqlParseError> {
        let name = self.ident("column name")?;
        let type_name = self.object_name("data type")?;
        let mut column = ColumnModel::new(name, DataType::from_name(&type_name));
        if self.current() == &Token::LParen {
            let params = self.parse_type_params();
            apply_params(&mut column, &params);
        }

        let mut is_pk = false;
        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => break,
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    is_pk = true;
                }
                Token::Not => {
                    self.advance();
                    if self.eat(&Token::Null) {
                        column.is_nullable = false;
                    }
                }
                Token::Null => {
                    self.advance();
                    column.is_nullable = true;
                }
                Token::Default => {
                    self.advance();
                    column.default_value = Some(self.parse_default_value());
                }
                Token::References => {
                    self.advance();
                    let (target, target_columns) = self.parse_reference()?;
                    let (on_delete, on_update) = self.parse_on_actions();
                    column.is_foreign_key = true;
                    self.foreign_keys.push(FkInfo {
                        name: None,
                        table: table.to_string(),
                        columns: vec![column.name.clone()],
                        target,
                        target_columns,
                        on_delete,
                        on_update,
                    });
                }
                Token::Identity | Token::Check | Token::With => {
                    self.advance();
                    self.skip_parenthesized();
                }
                Token::LParen => self.skip_parenthesized(),
                // CONSTRAINT name, CLUSTERED, COLLATE x, ROWGUIDCOL, ...
                _ => self.advance(),
            }
        }

        if is_pk {
            column.is_primary_key = true;
            column.is_nullable = false;
        }
        Ok((column, is_pk))
    }

    /// `(n)`, `(max)` or `(p, s)`.
    fn parse_type_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        self.advance(); // (
        loop {
            match self.current().clone() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Num(n) => params.push(n),
                Token::Ident(s) => params.push(s),
                _ => {}
            }
            self.advance();
        }
        params
    }

    /// Default expression with wrapping parentheses removed:
    /// `((0))` gives `0`, `(getdate())` gives `getdate()`, `(N'x')` gives `x`.
    fn parse_default_value(&mut self) -> String {
        let mut depth = 0;
        while self.eat(&Token::LParen) {
            depth += 1;
        }
        let value = match self.current().clone() {
            Token::Str(s) | Token::Num(s) => {
                self.advance();
                s
            }
            Token::Null => {
                self.advance();
                "NULL".to_string()
            }
            Token::Ident(mut s) => {
                self.advance();
                if self.current() == &Token::LParen {
                    s.push('(');
                    self.advance();
                    s.push_str(&self.collect_until_paren());
                    s.push(')');
                }
                s
            }
            _ => String::new(),
        };
        for _ in 0..depth {
            if !self.eat(&Token::RParen) {
                break;
            }
        }
        value
    }

    fn collect_until_paren(&mut self) -> String {
        let mut parts = Vec::new();
        let mut depth = 1;

        loop {
            match self.current() {
                Token::LParen => {
                    depth += 1;
                    parts.push("(".to_string());
                }
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    parts.push(")".to_string());
                }
                Token::Ident(s) | Token::Num(s) => parts.push(s.clone()),
                Token::Str(s) => parts.push(format!("'{}'", s.replace('\'', "''"))),
                Token::Comma => parts.push(",".to_string()),
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }

        parts.join("")
    }

    /// Table-level or `ALTER TABLE ... ADD` constraint.
    fn parse_table_constraint(&mut self, table: &str) -> Result<Option<Addition>, SqlParseError> {
        let name = if self.eat(&Token::Constraint) {
            Some(self.ident("constraint name")?)
        } else {
            None
        };

        match self.current() {
            Token::Primary => {
                self.advance();
                self.eat(&Token::Key);
                self.skip_clustering();
                let cols = self.parse_column_list()?;
                self.skip_constraint_options();
                Ok(Some(Addition::PrimaryKey(cols)))
            }
            Token::Unique => {
                self.advance();
                let clustered = self.skip_clustering();
                let cols = self.parse_column_list()?;
                self.skip_constraint_options();
                let index_name = name.unwrap_or_else(|| format!("UQ_{}_{}", table, cols.join("_")));
                let mut index = IndexModel::new(index_name, cols).unique();
                index.is_clustered = clustered;
                Ok(Some(Addition::Unique(index)))
            }
            Token::Foreign => {
                self.advance();
                self.eat(&Token::Key);
                let columns = self.parse_column_list()?;
                if !self.eat(&Token::References) {
                    return Err(SqlParseError::Expected {
                        expected: "REFERENCES".to_string(),
                        found: self.current().clone(),
                    });
                }
                let (target, target_columns) = self.parse_reference()?;
                let (on_delete, on_update) = self.parse_on_actions();
                Ok(Some(Addition::ForeignKey(FkInfo {
                    name,
                    table: table.to_string(),
                    columns,
                    target,
                    target_columns,
                    on_delete,
                    on_update,
                })))
            }
            Token::Default => {
                self.advance();
                let value = self.parse_default_value();
                if !self.eat(&Token::For) {
                    return Ok(None);
                }
                let column = self.ident("column name")?;
                Ok(Some(Addition::Default { column, value }))
            }
            Token::Check => {
                self.advance();
                self.skip_parenthesized();
                Ok(None)
            }
            other => Err(SqlParseError::UnexpectedToken(other.clone())),
        }
    }

    /// Optional `CLUSTERED`/`NONCLUSTERED`; true for `CLUSTERED`.
    fn skip_clustering(&mut self) -> bool {
        if self.eat(&Token::Clustered) {
            true
        } else {
            self.eat(&Token::Nonclustered);
            false
        }
    }

    /// `WITH (...)` and `ON [filegroup]` trailing a key constraint.
    fn skip_constraint_options(&mut self) {
        loop {
            match self.current() {
                Token::With => {
                    self.advance();
                    self.skip_parenthesized();
                }
                Token::On => {
                    self.advance();
                    if matches!(self.current(), Token::Ident(_) | Token::Primary) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// `INDEX name [CLUSTERED|NONCLUSTERED] (cols)` inside a table body.
    fn parse_inline_index(&mut self) -> Result<IndexModel, SqlParseError> {
        let name = self.ident("index name")?;
        let unique = self.eat(&Token::Unique);
        let clustered = self.skip_clustering();
        let cols = self.parse_column_list()?;
        self.skip_constraint_options();
        let mut index = IndexModel::new(name, cols);
        index.is_unique = unique;
        index.is_clustered = clustered;
        Ok(index)
    }

    fn parse_create_index(&mut self, unique: bool, clustered: bool) -> Result<(), SqlParseError> {
        let name = self.ident("index name")?;
        if !self.eat(&Token::On) {
            return Err(SqlParseError::Expected {
                expected: "ON".to_string(),
                found: self.current().clone(),
            });
        }
        let table = self.object_name("table name")?;
        let cols = self.parse_column_list()?;
        // INCLUDE (...), WHERE ..., WITH (...)
        self.skip_statement();

        let mut index = IndexModel::new(name, cols);
        index.is_unique = unique;
        index.is_clustered = clustered;
        self.indexes.push(PendingIndex { table, index });
        Ok(())
    }

    /// `ALTER TABLE t [WITH CHECK|NOCHECK] ADD [CONSTRAINT c] ...`.
    fn parse_alter_table(&mut self) -> Result<(), SqlParseError> {
        if !self.eat(&Token::Table) {
            self.skip_statement();
            return Ok(());
        }
        let table = self.object_name("table name")?;

        if self.eat(&Token::With) {
            // CHECK / NOCHECK
            self.advance();
        }
        if !self.eat(&Token::Add) {
            self.skip_statement();
            return Ok(());
        }
        if !matches!(
            self.current(),
            Token::Constraint | Token::Primary | Token::Foreign | Token::Unique | Token::Default
        ) {
            // ADD column
            self.skip_statement();
            return Ok(());
        }

        if let Some(addition) = self.parse_table_constraint(&table)? {
            self.additions.push((table, addition));
        }
        self.skip_statement();
        Ok(())
    }

    /// `EXEC sys.sp_addextendedproperty @name = N'MS_Description', ...`.
    fn parse_extended_property(&mut self) {
        let procedure = match self.object_name("procedure") {
            Ok(name) => name,
            Err(_) => {
                self.skip_statement();
                return;
            }
        };
        if !procedure.eq_ignore_ascii_case("sp_addextendedproperty") {
            self.skip_statement();
            return;
        }

        let mut args: IndexMap<String, String> = IndexMap::new();
        while let Token::Ident(param) = self.current().clone() {
            self.advance();
            if !param.starts_with('@') || !self.eat(&Token::Eq) {
                break;
            }
            if let Token::Str(value) = self.current().clone() {
                args.insert(param.to_lowercase(), value);
            }
            self.advance();
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.skip_statement();

        let is_description = args
            .get("@name")
            .is_some_and(|n| n.eq_ignore_ascii_case("MS_Description"));
        let is_table = args
            .get("@level1type")
            .is_some_and(|t| t.eq_ignore_ascii_case("TABLE"));
        if !is_description || !is_table {
            return;
        }
        if let (Some(table), Some(text)) = (args.get("@level1name"), args.get("@value")) {
            let column = args
                .get("@level2type")
                .filter(|t| t.eq_ignore_ascii_case("COLUMN"))
                .and_then(|_| args.get("@level2name"))
                .cloned();
            self.descriptions.push(Description {
                table: table.clone(),
                column,
                text: text.clone(),
            });
        }
    }

    fn parse_reference(&mut self) -> Result<(String, Vec<String>), SqlParseError> {
        let target = self.object_name("referenced table")?;
        let columns = if self.current() == &Token::LParen {
            self.parse_column_list()?
        } else {
            Vec::new()
        };
        Ok((target, columns))
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        let mut cols = Vec::new();

        if !self.eat(&Token::LParen) {
            return Err(SqlParseError::Expected {
                expected: "column list".to_string(),
                found: self.current().clone(),
            });
        }

        loop {
            match self.current() {
                Token::Ident(name) => {
                    let name = name.clone();
                    self.advance();
                    // ASC / DESC
                    if let Token::Ident(order) = self.current() {
                        if order.eq_ignore_ascii_case("ASC") || order.eq_ignore_ascii_case("DESC") {
                            self.advance();
                        }
                    }
                    cols.push(name);
                }
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                _ => self.advance(),
            }
        }

        Ok(cols)
    }

    fn parse_on_actions(&mut self) -> (ReferentialAction, ReferentialAction) {
        let mut on_delete = ReferentialAction::NoAction;
        let mut on_update = ReferentialAction::NoAction;
        while self.current() == &Token::On {
            self.advance();
            let is_delete = match self.current() {
                Token::Delete => true,
                Token::Update => false,
                _ => break,
            };
            self.advance();
            let action = match self.current().clone() {
                Token::Cascade => {
                    self.advance();
                    ReferentialAction::Cascade
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("SET") => {
                    self.advance();
                    let action = match self.current() {
                        Token::Null => ReferentialAction::SetNull,
                        Token::Default => ReferentialAction::SetDefault,
                        _ => ReferentialAction::NoAction,
                    };
                    self.advance();
                    action
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("NO") => {
                    self.advance();
                    if matches!(self.current(), Token::Ident(a) if a.eq_ignore_ascii_case("ACTION")) {
                        self.advance();
                    }
                    ReferentialAction::NoAction
                }
                _ => ReferentialAction::NoAction,
            };
            if is_delete {
                on_delete = action;
            } else {
                on_update = action;
            }
        }
        (on_delete, on_update)
    }

    fn skip_parenthesized(&mut self) {
        if self.current() != &Token::LParen {
            return;
        }
        self.advance();
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the end of the current statement: `;`, `GO`, or the next
    /// top-level `CREATE`/`ALTER`/`EXEC`.
    fn skip_statement(&mut self) {
        loop {
            match self.current() {
                Token::Semicolon => {
                    self.advance();
                    break;
                }
                Token::Go | Token::Eof | Token::Create | Token::Alter | Token::Exec => break,
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
    }

    /// Attach indexes, constraints and descriptions, and turn foreign keys
    /// into relationships.
    fn finish(mut self) -> SchemaModel {
        let mut model = SchemaModel::new();
        model.tables = std::mem::take(&mut self.tables);

        for pending in std::mem::take(&mut self.indexes) {
            match model.table_mut(&pending.table) {
                Some(table) => table.indexes.push(pending.index),
                None => tracing::warn!(table = %pending.table, index = %pending.index.name, "index on unknown table skipped"),
            }
        }

        for (table_name, addition) in std::mem::take(&mut self.additions) {
            let Some(table) = model.table_mut(&table_name) else {
                tracing::warn!(table = %table_name, "constraint on unknown table skipped");
                continue;
            };
            match addition {
                Addition::ForeignKey(fk) => self.foreign_keys.push(fk),
                Addition::PrimaryKey(cols) => mark_primary_key(table, &cols),
                Addition::Unique(index) => table.indexes.push(index),
                Addition::Default { column, value } => {
                    let key = name_key(&column);
                    if let Some(c) = table.columns.iter_mut().find(|c| name_key(&c.name) == key) {
                        c.default_value = Some(value);
                    }
                }
            }
        }

        for desc in &self.descriptions {
            let Some(table) = model.table_mut(&desc.table) else {
                continue;
            };
            match &desc.column {
                None => table.description = Some(desc.text.clone()),
                Some(column) => {
                    let key = name_key(column);
                    if let Some(c) = table.columns.iter_mut().find(|c| name_key(&c.name) == key) {
                        c.description = Some(desc.text.clone());
                    }
                }
            }
        }

        for fk in &self.foreign_keys {
            if model.table(&fk.target).is_none() {
                tracing::debug!(parent = %fk.target, "foreign key to unknown table skipped");
                continue;
            }
            if fk.columns.len() > 1 {
                tracing::warn!(table = %fk.table, "composite foreign key reduced to its first column");
            }
            if let Some(child) = model.table_mut(&fk.table) {
                for column in &fk.columns {
                    let key = name_key(column);
                    if let Some(c) = child.columns.iter_mut().find(|c| name_key(&c.name) == key) {
                        c.is_foreign_key = true;
                    }
                }
            }

            let mut rel = RelationshipModel::new(fk.target.clone(), fk.table.clone(), RelationType::OneToMany)
                .with_columns(
                    fk.target_columns.first().map(String::as_str),
                    fk.columns.first().map(String::as_str),
                )
                .with_on_delete(fk.on_delete)
                .with_on_update(fk.on_update);
            if let Some(name) = &fk.name {
                rel = rel.with_name(name.clone());
            }
            model.relationships.push(rel);
        }

        tracing::debug!(
            tables = model.tables.len(),
            relationships = model.relationships.len(),
            "parsed sql script"
        );
        model
    }
}

fn apply_params(column: &mut ColumnModel, params: &[String]) {
    let number = |i: usize| params.get(i).and_then(|p| p.parse::<u32>().ok());
    if column.data_type.takes_length() {
        column.length = params.first().and_then(|p| {
            if p.eq_ignore_ascii_case("max") {
                Some(MAX_LENGTH)
            } else {
                p.parse().ok()
            }
        });
    } else if column.data_type.is_exact_decimal() {
        column.precision = number(0);
        column.scale = number(1);
    } else if column.data_type.takes_precision() {
        column.precision = number(0);
    }
}

fn mark_primary_key(table: &mut TableModel, columns: &[String]) {
    for name in columns {
        let key = name_key(name);
        if let Some(c) = table.columns.iter_mut().find(|c| name_key(&c.name) == key) {
            c.is_primary_key = true;
            c.is_nullable = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let sql = r#"
            CREATE TABLE [dbo].[Customer] (
                [Id] INT IDENTITY(1,1) NOT NULL,
                [Email] NVARCHAR(255) NOT NULL,
                [Notes] NVARCHAR(MAX) NULL,
                [Balance] DECIMAL(18, 2) CONSTRAINT [DF_Customer_Balance] DEFAULT ((0)) NOT NULL,
                [Created] DATETIME2(3) DEFAULT (getdate()),
                CONSTRAINT [PK_Customer] PRIMARY KEY CLUSTERED ([Id] ASC)
            );
        "#;

        let model = parse_sql(sql).unwrap();
        assert_eq!(model.tables.len(), 1);

        let customer = &model.tables[0];
        assert_eq!(customer.name, "Customer");
        assert_eq!(customer.columns.len(), 5);
        assert!(customer.columns[0].is_primary_key);
        assert!(!customer.columns[0].is_nullable);
        assert_eq!(customer.columns[1].data_type, DataType::NVarChar);
        assert_eq!(customer.columns[1].length, Some(255));
        assert_eq!(customer.columns[2].length, Some(MAX_LENGTH));
        assert!(customer.columns[2].is_nullable);
        assert_eq!(customer.columns[3].precision, Some(18));
        assert_eq!(customer.columns[3].scale, Some(2));
        assert_eq!(customer.columns[3].default_value.as_deref(), Some("0"));
        assert!(!customer.columns[3].is_nullable);
        assert_eq!(customer.columns[4].precision, Some(3));
        assert_eq!(customer.columns[4].default_value.as_deref(), Some("getdate()"));
    }

    #[test]
    fn test_parse_with_foreign_keys() {
        let sql = r#"
            CREATE TABLE Customer (Id INT PRIMARY KEY)
            GO
            CREATE TABLE [Order] (
                Id INT PRIMARY KEY,
                CustomerId INT NOT NULL,
                ShipperId INT REFERENCES Shipper(Id)
            )
            GO
            ALTER TABLE [dbo].[Order] WITH CHECK ADD CONSTRAINT [FK_Order_Customer]
                FOREIGN KEY ([CustomerId]) REFERENCES [dbo].[Customer] ([Id]) ON DELETE CASCADE
            GO
        "#;

        let model = parse_sql(sql).unwrap();
        assert_eq!(model.tables.len(), 2);
        // Shipper is not declared
        assert_eq!(model.relationships.len(), 1);

        let rel = &model.relationships[0];
        assert_eq!(rel.name, "FK_Order_Customer");
        assert_eq!(rel.source_table, "Customer");
        assert_eq!(rel.target_table, "Order");
        assert_eq!(rel.relation_type, RelationType::OneToMany);
        assert_eq!(rel.source_column.as_deref(), Some("Id"));
        assert_eq!(rel.target_column.as_deref(), Some("CustomerId"));
        assert_eq!(rel.on_delete, ReferentialAction::Cascade);
        assert!(model.tables[1].columns[1].is_foreign_key);
    }

    #[test]
    fn test_parse_indexes_defaults_and_descriptions() {
        let sql = r#"
            CREATE TABLE [dbo].[Order] ([Id] int NOT NULL, [Paid] bit NOT NULL, [Ref] varchar(20) NULL);
            GO
            ALTER TABLE [dbo].[Order] ADD CONSTRAINT [DF_Order_Paid] DEFAULT 0 FOR [Paid];
            GO
            ALTER TABLE [dbo].[Order] ADD CONSTRAINT [PK_Order] PRIMARY KEY ([Id]);
            GO
            CREATE UNIQUE NONCLUSTERED INDEX [IX_Order_Ref] ON [dbo].[Order] ([Ref] DESC) WITH (FILLFACTOR = 90);
            GO
            EXEC sys.sp_addextendedproperty @name = N'MS_Description', @value = N'Customer orders',
                @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Order';
            GO
            EXEC sys.sp_addextendedproperty @name = N'MS_Description', @value = N'Reference code',
                @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Order',
                @level2type = N'COLUMN', @level2name = N'Ref';
        "#;

        let model = parse_sql(sql).unwrap();
        let order = &model.tables[0];
        assert!(order.columns[0].is_primary_key);
        assert_eq!(order.columns[1].default_value.as_deref(), Some("0"));
        assert_eq!(order.indexes.len(), 1);
        assert_eq!(order.indexes[0].name, "IX_Order_Ref");
        assert!(order.indexes[0].is_unique);
        assert!(!order.indexes[0].is_clustered);
        assert_eq!(order.indexes[0].columns, vec!["Ref"]);
        assert_eq!(order.description.as_deref(), Some("Customer orders"));
        assert_eq!(order.columns[2].description.as_deref(), Some("Reference code"));
    }

    #[test]
    fn test_skips_other_statements() {
        let sql = r#"
            SET ANSI_NULLS ON
            GO
            IF OBJECT_ID(N'[dbo].[T]', N'U') IS NOT NULL DROP TABLE [dbo].[T];
            CREATE VIEW v AS SELECT 1 AS x;
            CREATE TABLE T (Id int NOT NULL);
        "#;
        let model = parse_sql(sql).unwrap();
        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.tables[0].name, "T");
    }

    #[test]
    fn test_truncated_table_is_an_error() {
        let err = parse_sql("CREATE TABLE T (Id int,").unwrap_err();
        assert!(matches!(err, SqlParseError::UnexpectedEof));
    }
}
