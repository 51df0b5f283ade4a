//! Compact line format, one declaration per line:
//!
//! ```text
//! TABLE: Customer (Id:int:PrimaryKey=true, Name:nvarchar(50))
//! INDEX: Customer.IX_Customer_Name (Name) Unique=true
//! RELATIONSHIP: FK_Order_Customer (Customer.Id -> Order.CustomerId, Type=OneToMany)
//! ```

use crate::lexer::{Lexer, Token, strip_comments};
use crate::model::{
    ColumnModel, DataType, IndexModel, ReferentialAction, RelationType, RelationshipModel,
    SchemaModel, TableModel,
};
use crate::parser::{
    ParseError, ParseOutput, Parser, apply_directives, apply_type_params, check_brackets,
};
use crate::serializer::{default_token, quote};
use crate::validator::is_valid_identifier;
use std::fmt::Write;

/// Parse the compact format. Each bad declaration is reported and skipped.
pub fn parse(text: &str) -> ParseOutput {
    let stripped = strip_comments(text);
    let tokens = match Lexer::new(&stripped.text).tokenize() {
        Ok(t) => t,
        Err(e) => return ParseOutput::fatal(e.into()),
    };
    if let Err(e) = check_brackets(&tokens) {
        return ParseOutput::fatal(e);
    }

    let mut parser = Parser::new(tokens);
    let mut model = SchemaModel::new();

    loop {
        parser.skip_newlines();
        if *parser.peek() == Token::Eof {
            break;
        }
        if let Err(e) = parse_declaration(&mut parser, &mut model) {
            parser.errors.push(e.to_string());
            parser.recover_line();
        }
    }

    apply_directives(&mut model, stripped.directives);

    tracing::debug!(
        tables = model.tables.len(),
        relationships = model.relationships.len(),
        errors = parser.errors.len(),
        "parsed diagram"
    );

    ParseOutput {
        model,
        errors: parser.errors,
    }
}

fn parse_declaration(p: &mut Parser, model: &mut SchemaModel) -> Result<(), ParseError> {
    let kind = p.expect_ident("TABLE, INDEX or RELATIONSHIP")?;
    p.expect(Token::Colon, "':'")?;

    if kind.eq_ignore_ascii_case("table") {
        let table = parse_table(p)?;
        model.tables.push(table);
    } else if kind.eq_ignore_ascii_case("index") {
        parse_index(p, model)?;
    } else if kind.eq_ignore_ascii_case("relationship") {
        let rel = parse_relationship(p)?;
        model.relationships.push(rel);
    } else {
        return Err(p.invalid(format!("unknown declaration '{}'", kind)));
    }

    p.expect_line_end()
}

fn parse_table(p: &mut Parser) -> Result<TableModel, ParseError> {
    let mut table = TableModel::new(p.expect_ident("table name")?);
    if let Token::Str(desc) = p.peek().clone() {
        p.advance();
        table.description = Some(desc);
    }

    p.expect(Token::LParen, "'('")?;
    loop {
        p.skip_newlines();
        table.columns.push(parse_column(p)?);
        p.skip_newlines();
        match p.peek() {
            Token::Comma => {
                p.advance();
            }
            Token::RParen => {
                p.advance();
                break;
            }
            _ => return Err(p.unexpected("',' or ')'")),
        }
    }

    Ok(table)
}

fn parse_column(p: &mut Parser) -> Result<ColumnModel, ParseError> {
    let name = p.expect_ident("column name")?;
    p.expect(Token::Colon, "':' before column type")?;
    let type_name = p.expect_ident("column type")?;
    let mut column = ColumnModel::new(name, DataType::from_name(&type_name));
    if *p.peek() == Token::LParen {
        let params = p.parse_type_params()?;
        apply_type_params(&mut column, params).map_err(|m| p.invalid(m))?;
    }

    while *p.peek() == Token::Colon {
        p.advance();
        let key = p.expect_ident("column attribute")?;
        p.expect(Token::Eq, "'='")?;
        let value = p.parse_default_value()?;
        match key.to_lowercase().as_str() {
            "primarykey" => column.is_primary_key = parse_bool(p, &value)?,
            "foreignkey" => column.is_foreign_key = parse_bool(p, &value)?,
            "nullable" => column.is_nullable = parse_bool(p, &value)?,
            "default" => column.default_value = Some(value),
            "description" => column.description = Some(value),
            _ => return Err(p.invalid(format!("unknown column attribute '{}'", key))),
        }
    }

    if column.is_primary_key {
        column.is_nullable = false;
    }
    Ok(column)
}

fn parse_index(p: &mut Parser, model: &mut SchemaModel) -> Result<(), ParseError> {
    let table_name = p.expect_ident("table name")?;
    p.expect(Token::Dot, "'.'")?;
    let name = p.expect_ident("index name")?;
    let columns = p.parse_ident_list()?;
    let mut index = IndexModel::new(name, columns);

    while let Token::Ident(key) = p.peek().clone() {
        p.advance();
        p.expect(Token::Eq, "'='")?;
        let value = p.parse_default_value()?;
        match key.to_lowercase().as_str() {
            "unique" => index.is_unique = parse_bool(p, &value)?,
            "clustered" => index.is_clustered = parse_bool(p, &value)?,
            _ => return Err(p.invalid(format!("unknown index attribute '{}'", key))),
        }
    }

    let table = model
        .table_mut(&table_name)
        .ok_or_else(|| p.invalid(format!("index on undeclared table '{}'", table_name)))?;
    table.indexes.push(index);
    Ok(())
}

fn parse_relationship(p: &mut Parser) -> Result<RelationshipModel, ParseError> {
    let name = match p.peek().clone() {
        Token::Ident(s) | Token::Str(s) => {
            p.advance();
            Some(s)
        }
        _ => None,
    };

    p.expect(Token::LParen, "'('")?;
    let (source, source_column) = parse_endpoint(p)?;
    p.expect(Token::Arrow, "'->'")?;
    let (target, target_column) = parse_endpoint(p)?;

    let mut rel = RelationshipModel::new(source, target, RelationType::ManyToOne)
        .with_columns(source_column.as_deref(), target_column.as_deref());
    if let Some(name) = name {
        rel.name = name;
    }

    while *p.peek() == Token::Comma {
        p.advance();
        let key = p.expect_ident("relationship attribute")?;
        p.expect(Token::Eq, "'='")?;
        let value = p.parse_default_value()?;
        match key.to_lowercase().as_str() {
            "type" => {
                rel.relation_type = RelationType::from_name(&value)
                    .ok_or_else(|| p.invalid(format!("unknown relation type '{}'", value)))?;
            }
            "ondelete" => rel.on_delete = parse_action(p, &value)?,
            "onupdate" => rel.on_update = parse_action(p, &value)?,
            _ => return Err(p.invalid(format!("unknown relationship attribute '{}'", key))),
        }
    }
    p.expect(Token::RParen, "')'")?;

    Ok(rel)
}

fn parse_endpoint(p: &mut Parser) -> Result<(String, Option<String>), ParseError> {
    let table = p.expect_ident("table name")?;
    if *p.peek() == Token::Dot {
        p.advance();
        Ok((table, Some(p.expect_ident("column name")?)))
    } else {
        Ok((table, None))
    }
}

fn parse_bool(p: &Parser, value: &str) -> Result<bool, ParseError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(p.invalid(format!("expected true or false, found '{}'", value))),
    }
}

fn parse_action(p: &Parser, value: &str) -> Result<ReferentialAction, ParseError> {
    ReferentialAction::from_name(value)
        .ok_or_else(|| p.invalid(format!("unknown referential action '{}'", value)))
}

/// Render a model in the compact format.
pub fn generate(model: &SchemaModel) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "%% @version {}", model.version);
    for (key, value) in &model.metadata {
        if !key.eq_ignore_ascii_case("version") {
            let _ = writeln!(out, "%% @{} {}", key, value);
        }
    }

    for table in &model.tables {
        let _ = write!(out, "TABLE: {}", table.name);
        if let Some(desc) = &table.description {
            let _ = write!(out, " {}", quote(desc));
        }
        let columns: Vec<String> = table.columns.iter().map(column_spec).collect();
        let _ = writeln!(out, " ({})", columns.join(", "));

        for index in &table.indexes {
            let _ = write!(
                out,
                "INDEX: {}.{} ({})",
                table.name,
                index.name,
                index.columns.join(", ")
            );
            if index.is_unique {
                out.push_str(" Unique=true");
            }
            if index.is_clustered {
                out.push_str(" Clustered=true");
            }
            out.push('\n');
        }
    }

    for rel in &model.relationships {
        if is_valid_identifier(&rel.name) {
            let _ = write!(out, "RELATIONSHIP: {} (", rel.name);
        } else {
            let _ = write!(out, "RELATIONSHIP: {} (", quote(&rel.name));
        }
        out.push_str(&rel.source_table);
        if let Some(c) = &rel.source_column {
            let _ = write!(out, ".{}", c);
        }
        out.push_str(" -> ");
        out.push_str(&rel.target_table);
        if let Some(c) = &rel.target_column {
            let _ = write!(out, ".{}", c);
        }
        let _ = write!(out, ", Type={}", rel.relation_type.name());
        if rel.on_delete != ReferentialAction::NoAction {
            let _ = write!(out, ", OnDelete={}", rel.on_delete.name());
        }
        if rel.on_update != ReferentialAction::NoAction {
            let _ = write!(out, ", OnUpdate={}", rel.on_update.name());
        }
        out.push_str(")\n");
    }

    out
}

fn column_spec(column: &ColumnModel) -> String {
    let mut spec = format!("{}:{}", column.name, column.type_display());
    if column.is_primary_key {
        spec.push_str(":PrimaryKey=true");
    }
    if column.is_foreign_key {
        spec.push_str(":ForeignKey=true");
    }
    if !column.is_nullable && !column.is_primary_key {
        spec.push_str(":Nullable=false");
    }
    if let Some(value) = &column.default_value {
        spec.push_str(":Default=");
        spec.push_str(&default_token(value));
    }
    if let Some(desc) = &column.description {
        spec.push_str(":Description=");
        spec.push_str(&quote(desc));
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_table_line() {
        let out = parse("TABLE: Customer (Id:int:PrimaryKey=true, Name:nvarchar(50))");
        assert!(out.is_ok(), "{:?}", out.errors);
        assert_eq!(out.model.tables.len(), 1);
        let customer = &out.model.tables[0];
        assert_eq!(customer.name, "Customer");
        assert_eq!(customer.columns.len(), 2);
        assert!(customer.columns[0].is_primary_key);
        assert!(!customer.columns[0].is_nullable);
        assert_eq!(customer.columns[1].length, Some(50));
        assert!(customer.columns[1].is_nullable);
    }

    #[test]
    fn test_parse_full_document() {
        let input = r#"
TABLE: Customer (Id:int:PrimaryKey=true)
TABLE: Order "Customer orders" (
    Id:int:PrimaryKey=true,
    CustomerId:int:ForeignKey=true:Nullable=false,
    Total:decimal(18,2):Default=0
)
INDEX: Order.IX_Order_Customer (CustomerId) Unique=false Clustered=true
RELATIONSHIP: FK_Order_Customer (Customer.Id -> Order.CustomerId, Type=OneToMany, OnDelete=Cascade)
"#;
        let out = parse(input);
        assert!(out.is_ok(), "{:?}", out.errors);
        let order = out.model.table("Order").unwrap();
        assert_eq!(order.description.as_deref(), Some("Customer orders"));
        assert!(!order.columns[1].is_nullable && order.columns[1].is_foreign_key);
        assert_eq!(order.columns[2].scale, Some(2));
        assert!(order.indexes[0].is_clustered);
        let rel = &out.model.relationships[0];
        assert_eq!(rel.relation_type, RelationType::OneToMany);
        assert_eq!(rel.on_delete, ReferentialAction::Cascade);
        assert_eq!(rel.target_column.as_deref(), Some("CustomerId"));
    }

    #[test]
    fn test_bad_lines_are_reported_individually() {
        let input = "TABLE: A (Id:int:Primary=true)\nTABLE: B (Id:int)\nINDEX: Missing.IX (Id)\nVIEW: C\n";
        let out = parse(input);
        assert_eq!(out.errors.len(), 3, "{:?}", out.errors);
        assert!(out.errors[0].starts_with("line 1:"));
        assert!(out.errors[1].contains("undeclared table"));
        assert_eq!(out.model.tables.len(), 1);
        assert_eq!(out.model.tables[0].name, "B");
    }

    #[test]
    fn test_round_trip() {
        let input = "TABLE: Customer (Id:int:PrimaryKey=true, Name:nvarchar(50):Nullable=false:Description=\"Full name\")\nRELATIONSHIP: owns (Customer -> Customer, Type=OneToOne)\n";
        let first = parse(input);
        assert!(first.is_ok(), "{:?}", first.errors);
        let text = generate(&first.model);
        assert!(text.contains("TABLE: Customer (Id:int:PrimaryKey=true, Name:nvarchar(50):Nullable=false:Description=\"Full name\")"));
        let second = parse(&text);
        assert!(second.is_ok(), "{:?}", second.errors);
        assert!(first.model.same_structure(&second.model));
    }

    #[test]
    fn test_relationship_label_from_notation() {
        let notation = "erDiagram\n  A {\n    int Id PK\n  }\n  B {\n    int Id PK\n  }\n  A ||--o{ B : \"belongs to\"\n";
        let model = crate::parser::parse(notation).into_result().unwrap();

        let text = generate(&model);
        assert!(text.contains("RELATIONSHIP: \"belongs to\" (A -> B, Type=OneToMany)"), "{}", text);
        let back = parse(&text);
        assert!(back.is_ok(), "{:?}", back.errors);
        assert_eq!(back.model.relationships[0].name, "belongs to");
        assert!(model.same_structure(&back.model));
    }

    #[test]
    fn test_version_directive_is_not_metadata() {
        let mut model = parse("TABLE: A (Id:int:PrimaryKey=true)").model;
        model.version = "4".into();
        model.metadata.insert("owner".into(), "billing".into());

        let back = parse(&generate(&model));
        assert_eq!(back.model.version, "4");
        assert_eq!(back.model.metadata, model.metadata);
    }
}
