//! Parser for the `erDiagram` notation.
//!
//! Document-level problems (missing keyword, unbalanced brackets, an
//! unterminated string) are fatal and produce no model. Problems inside a
//! single column, index or relationship line are reported and the parser
//! resumes at the next line.

use crate::error::SchemaError;
use crate::lexer::{LexError, Lexer, Spanned, Token, strip_comments};
use crate::model::{
    ColumnModel, DataType, IndexModel, MAX_LENGTH, ReferentialAction, RelationshipModel,
    SchemaModel, TableModel,
};

/// Keyword every notation document starts with.
pub const DIAGRAM_KEYWORD: &str = "erDiagram";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("line {0}: document must begin with 'erDiagram'")]
    MissingKeyword(usize),
    #[error("line {line}: unmatched {found}")]
    UnmatchedBracket { line: usize, found: String },
    #[error("line {line}: unclosed {open}")]
    UnclosedBracket { line: usize, open: String },
    #[error("line {line}: unexpected {found}, expected {expected}")]
    Unexpected {
        line: usize,
        found: String,
        expected: &'static str,
    },
    #[error("line {line}: {message}")]
    Invalid { line: usize, message: String },
}

/// Result of parsing a document: a possibly partial model plus every
/// diagnostic collected on the way.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub model: SchemaModel,
    pub errors: Vec<String>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<SchemaModel, SchemaError> {
        if self.errors.is_empty() {
            Ok(self.model)
        } else {
            Err(SchemaError::Syntax(self.errors))
        }
    }

    pub(crate) fn fatal(err: ParseError) -> Self {
        Self {
            model: SchemaModel::new(),
            errors: vec![err.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NotationParser;

impl NotationParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> ParseOutput {
        parse(text)
    }
}

/// Parse notation text into a schema model.
pub fn parse(text: &str) -> ParseOutput {
    let stripped = strip_comments(text);
    let tokens = match Lexer::new(&stripped.text).tokenize() {
        Ok(t) => t,
        Err(e) => return ParseOutput::fatal(e.into()),
    };

    let mut parser = Parser::new(tokens);
    if let Err(e) = parser.expect_keyword() {
        return ParseOutput::fatal(e);
    }
    if let Err(e) = check_brackets(&parser.tokens) {
        return ParseOutput::fatal(e);
    }

    let mut model = parser.parse_document();
    apply_directives(&mut model, stripped.directives);

    tracing::debug!(
        tables = model.tables.len(),
        relationships = model.relationships.len(),
        errors = parser.errors.len(),
        "parsed notation"
    );

    ParseOutput {
        model,
        errors: parser.errors,
    }
}

/// `@version` sets the model version; every other directive lands in
/// `metadata`.
pub(crate) fn apply_directives(model: &mut SchemaModel, directives: Vec<(usize, String, String)>) {
    for (_, key, value) in directives {
        if key.eq_ignore_ascii_case("version") {
            model.version = value;
        } else {
            model.metadata.insert(key, value);
        }
    }
}

/// Verify `{}`, `()` and `[]` pair up, using a stack.
pub(crate) fn check_brackets(tokens: &[Spanned]) -> Result<(), ParseError> {
    let mut stack: Vec<&Spanned> = Vec::new();
    for tok in tokens {
        let expected_open = match tok.token {
            Token::LBrace | Token::LParen | Token::LBracket => {
                stack.push(tok);
                continue;
            }
            Token::RBrace => Token::LBrace,
            Token::RParen => Token::LParen,
            Token::RBracket => Token::LBracket,
            _ => continue,
        };
        match stack.pop() {
            Some(open) if open.token == expected_open => {}
            _ => {
                return Err(ParseError::UnmatchedBracket {
                    line: tok.line,
                    found: tok.token.describe(),
                });
            }
        }
    }
    match stack.pop() {
        Some(open) => Err(ParseError::UnclosedBracket {
            line: open.line,
            open: open.token.describe(),
        }),
        None => Ok(()),
    }
}

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    pub(crate) errors: Vec<String>,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|s| &s.token).unwrap_or(&Token::Eof)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    pub(crate) fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::Unexpected {
            line: self.line(),
            found: self.peek().describe(),
            expected,
        }
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> ParseError {
        ParseError::Invalid {
            line: self.line(),
            message: message.into(),
        }
    }

    pub(crate) fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(crate) fn expect_ident(&mut self, what: &'static str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(crate) fn check_keyword(&self, kw: &str) -> bool {
        self.peek().is_keyword(kw)
    }

    pub(crate) fn skip_newlines(&mut self) {
        while *self.peek() == Token::Newline {
            self.advance();
        }
    }

    pub(crate) fn at_line_end(&self) -> bool {
        matches!(self.peek(), Token::Newline | Token::Eof)
    }

    pub(crate) fn expect_line_end(&mut self) -> Result<(), ParseError> {
        if self.at_line_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of line"))
        }
    }

    /// Skip the rest of a broken statement, including any block it opened.
    pub(crate) fn recover_line(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Newline if depth == 0 => break,
                Token::LBrace | Token::LParen => depth += 1,
                Token::RBrace | Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip the rest of a line inside a table block without eating the
    /// closing brace.
    fn recover_in_block(&mut self) {
        while !matches!(self.peek(), Token::Newline | Token::RBrace | Token::Eof) {
            self.advance();
        }
    }

    fn expect_keyword(&mut self) -> Result<(), ParseError> {
        self.skip_newlines();
        if self.check_keyword(DIAGRAM_KEYWORD) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::MissingKeyword(self.line()))
        }
    }

    fn parse_document(&mut self) -> SchemaModel {
        let mut model = SchemaModel::new();

        loop {
            self.skip_newlines();
            if *self.peek() == Token::Eof {
                break;
            }
            if let Err(e) = self.parse_statement(&mut model) {
                self.errors.push(e.to_string());
                self.recover_line();
            }
        }

        model
    }

    fn parse_statement(&mut self, model: &mut SchemaModel) -> Result<(), ParseError> {
        let name = self.expect_ident("table name or relationship")?;

        match self.peek() {
            Token::LBrace | Token::LBracket => {
                let table = self.parse_table(name)?;
                model.tables.push(table);
                self.expect_line_end()
            }
            Token::Dot | Token::Connector(_) => {
                let rel = self.parse_relationship(name)?;
                model.relationships.push(rel);
                Ok(())
            }
            _ => Err(self.unexpected("'{' or a relationship connector")),
        }
    }

    fn parse_table(&mut self, name: String) -> Result<TableModel, ParseError> {
        let mut table = TableModel::new(name);

        if *self.peek() == Token::LBracket {
            self.advance();
            match self.peek().clone() {
                Token::Str(s) => {
                    self.advance();
                    table.description = Some(s);
                }
                _ => return Err(self.unexpected("quoted table description")),
            }
            self.expect(Token::RBracket, "']'")?;
        }
        self.expect(Token::LBrace, "'{'")?;

        loop {
            self.skip_newlines();
            match self.peek() {
                Token::RBrace => {
                    self.advance();
                    break;
                }
                Token::Eof => return Err(self.unexpected("'}'")),
                _ => {}
            }

            let result = if self.check_keyword("index") && matches!(self.peek_at(1), Token::Ident(_)) {
                self.advance();
                self.parse_index().map(|idx| table.indexes.push(idx))
            } else {
                self.parse_column().map(|col| table.columns.push(col))
            };

            if let Err(e) = result {
                self.errors.push(e.to_string());
                self.recover_in_block();
            }
        }

        Ok(table)
    }

    fn parse_column(&mut self) -> Result<ColumnModel, ParseError> {
        let type_name = self.expect_ident("column type")?;
        let data_type = DataType::from_name(&type_name);
        let params = if *self.peek() == Token::LParen {
            Some(self.parse_type_params()?)
        } else {
            None
        };

        let name = match self.peek().clone() {
            Token::Ident(s) => {
                self.advance();
                s
            }
            _ => {
                return Err(self.invalid(format!(
                    "expected column name after type '{}'",
                    type_name
                )));
            }
        };

        let mut column = ColumnModel::new(name, data_type);
        if let Some(params) = params {
            apply_type_params(&mut column, params).map_err(|m| self.invalid(m))?;
        }

        loop {
            match self.peek().clone() {
                Token::Newline | Token::RBrace | Token::Eof => break,
                Token::Comma => {
                    self.advance();
                }
                Token::Str(s) => {
                    self.advance();
                    column.description = Some(s);
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("pk") => {
                    self.advance();
                    column.is_primary_key = true;
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("fk") => {
                    self.advance();
                    column.is_foreign_key = true;
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("not") => {
                    self.advance();
                    if !self.check_keyword("null") {
                        return Err(self.unexpected("NULL after NOT"));
                    }
                    self.advance();
                    column.is_nullable = false;
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("null") => {
                    self.advance();
                    column.is_nullable = true;
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("default") => {
                    self.advance();
                    column.default_value = Some(self.parse_default_value()?);
                }
                _ => return Err(self.unexpected("PK, FK, NOT NULL, DEFAULT or a description")),
            }
        }

        if column.is_primary_key {
            column.is_nullable = false;
        }

        Ok(column)
    }

    pub(crate) fn parse_type_params(&mut self) -> Result<TypeParams, ParseError> {
        self.expect(Token::LParen, "'('")?;
        let first = match self.peek().clone() {
            Token::Num(n) => TypeParam::Num(n),
            Token::Ident(s) if s.eq_ignore_ascii_case("max") => TypeParam::Max,
            _ => return Err(self.unexpected("type parameter")),
        };
        self.advance();
        let second = if *self.peek() == Token::Comma {
            self.advance();
            match self.peek().clone() {
                Token::Num(n) => {
                    self.advance();
                    Some(n)
                }
                _ => return Err(self.unexpected("scale")),
            }
        } else {
            None
        };
        self.expect(Token::RParen, "')'")?;
        Ok(TypeParams { first, second })
    }

    pub(crate) fn parse_default_value(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            Token::Num(n) => {
                self.advance();
                Ok(n)
            }
            Token::Ident(s) => {
                self.advance();
                if *self.peek() == Token::LParen && *self.peek_at(1) == Token::RParen {
                    self.advance();
                    self.advance();
                    Ok(format!("{}()", s))
                } else {
                    Ok(s)
                }
            }
            _ => Err(self.unexpected("default value")),
        }
    }

    fn parse_index(&mut self) -> Result<IndexModel, ParseError> {
        let name = self.expect_ident("index name")?;
        let columns = self.parse_ident_list()?;
        let mut index = IndexModel::new(name, columns);

        while !matches!(self.peek(), Token::Newline | Token::RBrace | Token::Eof) {
            if self.check_keyword("unique") {
                index.is_unique = true;
            } else if self.check_keyword("clustered") {
                index.is_clustered = true;
            } else {
                return Err(self.unexpected("UNIQUE or CLUSTERED"));
            }
            self.advance();
        }

        Ok(index)
    }

    pub(crate) fn parse_ident_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(Token::LParen, "'('")?;
        let mut list = vec![self.expect_ident("column name")?];
        while *self.peek() == Token::Comma {
            self.advance();
            list.push(self.expect_ident("column name")?);
        }
        self.expect(Token::RParen, "')'")?;
        Ok(list)
    }

    fn parse_relationship(&mut self, source: String) -> Result<RelationshipModel, ParseError> {
        let source_column = self.parse_endpoint_column()?;
        let relation_type = match self.peek() {
            Token::Connector(t) => *t,
            _ => return Err(self.unexpected("relationship connector")),
        };
        self.advance();
        let target = self.expect_ident("target table")?;
        let target_column = self.parse_endpoint_column()?;

        let mut rel = RelationshipModel::new(source, target, relation_type)
            .with_columns(source_column.as_deref(), target_column.as_deref());

        if *self.peek() == Token::Colon {
            self.advance();
            match self.peek().clone() {
                Token::Str(s) | Token::Ident(s) => {
                    self.advance();
                    rel.name = s;
                }
                _ => return Err(self.unexpected("relationship label")),
            }
        }

        while self.check_keyword("on") {
            self.advance();
            let is_delete = if self.check_keyword("delete") {
                true
            } else if self.check_keyword("update") {
                false
            } else {
                return Err(self.unexpected("DELETE or UPDATE"));
            };
            self.advance();
            let action = self.parse_referential_action()?;
            if is_delete {
                rel.on_delete = action;
            } else {
                rel.on_update = action;
            }
        }

        self.expect_line_end()?;
        Ok(rel)
    }

    fn parse_endpoint_column(&mut self) -> Result<Option<String>, ParseError> {
        if *self.peek() == Token::Dot {
            self.advance();
            Ok(Some(self.expect_ident("column name")?))
        } else {
            Ok(None)
        }
    }

    fn parse_referential_action(&mut self) -> Result<ReferentialAction, ParseError> {
        let mut words = self.expect_ident("referential action")?;
        if words.eq_ignore_ascii_case("no") || words.eq_ignore_ascii_case("set") {
            words.push(' ');
            words.push_str(&self.expect_ident("referential action")?);
        }
        ReferentialAction::from_name(&words)
            .ok_or_else(|| self.invalid(format!("unknown referential action '{}'", words)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TypeParam {
    Num(String),
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TypeParams {
    pub first: TypeParam,
    pub second: Option<String>,
}

/// Assign `(length)` or `(precision,scale)` according to the column type.
pub(crate) fn apply_type_params(column: &mut ColumnModel, params: TypeParams) -> Result<(), String> {
    let type_name = column.data_type.name().to_string();
    let number = |s: &str| -> Result<u32, String> {
        s.parse::<u32>()
            .map_err(|_| format!("invalid parameter '{}' for type '{}'", s, type_name))
    };

    if column.data_type.takes_length() {
        if params.second.is_some() {
            return Err(format!("type '{}' takes a single length", type_name));
        }
        column.length = Some(match params.first {
            TypeParam::Max => MAX_LENGTH,
            TypeParam::Num(n) => i32::try_from(number(&n)?)
                .map_err(|_| format!("length {} out of range", n))?,
        });
        return Ok(());
    }

    let first = match params.first {
        TypeParam::Num(n) => number(&n)?,
        TypeParam::Max => return Err(format!("type '{}' does not accept 'max'", type_name)),
    };

    if column.data_type.is_exact_decimal() {
        column.precision = Some(first);
        column.scale = params.second.as_deref().map(number).transpose()?;
        Ok(())
    } else if column.data_type.takes_precision() && params.second.is_none() {
        column.precision = Some(first);
        Ok(())
    } else if !column.data_type.is_known() {
        // Unknown types keep their parameters positionally.
        column.precision = Some(first);
        column.scale = params.second.as_deref().map(number).transpose()?;
        Ok(())
    } else {
        Err(format!("type '{}' does not take parameters", type_name))
    }
}
