//! T-SQL lexer for DDL scripts.

use std::iter::Peekable;
use std::str::Chars;

/// SQL token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Alter,
    Add,
    Table,
    Primary,
    Key,
    Foreign,
    References,
    Not,
    Null,
    Unique,
    Default,
    On,
    Delete,
    Update,
    Cascade,
    Constraint,
    Index,
    Clustered,
    Nonclustered,
    Identity,
    Check,
    For,
    With,
    Exec,
    /// Batch separator; only recognized alone at the start of a line.
    Go,

    // Identifiers and literals
    Ident(String),
    Str(String),
    Num(String),

    // Symbols
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Eq,

    // End of input
    Eof,
}

/// SQL lexer.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current_char: Option<char>,
    line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self {
            chars,
            current_char,
            line_start: true,
        }
    }

    fn advance(&mut self) {
        self.current_char = self.chars.next();
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c == '\n' {
                self.line_start = true;
                self.advance();
            } else if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.current_char {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance(); // skip *
        while let Some(c) = self.current_char {
            if c == '*' {
                self.advance();
                if self.current_char == Some('/') {
                    self.advance();
                    break;
                }
            } else {
                self.advance();
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$') {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    /// Reads up to `close`, where a doubled `close` is a literal one.
    /// Used for `[ident]`, `"ident"` and `'string'`.
    fn read_delimited(&mut self, close: char) -> String {
        self.advance(); // skip opening delimiter
        let mut text = String::new();
        while let Some(c) = self.current_char {
            if c == close {
                if self.peek() == Some(&close) {
                    text.push(c);
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    break;
                }
            } else {
                text.push(c);
                self.advance();
            }
        }
        text
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut has_dot = false;

        if self.current_char == Some('-') {
            num.push('-');
            self.advance();
        }

        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else if c == '.' && !has_dot {
                has_dot = true;
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        num
    }

    fn keyword_or_ident(&mut self, s: &str, at_line_start: bool) -> Token {
        match s.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "ALTER" => Token::Alter,
            "ADD" => Token::Add,
            "TABLE" => Token::Table,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "NOT" => Token::Not,
            "NULL" => Token::Null,
            "UNIQUE" => Token::Unique,
            "DEFAULT" => Token::Default,
            "ON" => Token::On,
            "DELETE" => Token::Delete,
            "UPDATE" => Token::Update,
            "CASCADE" => Token::Cascade,
            "CONSTRAINT" => Token::Constraint,
            "INDEX" => Token::Index,
            "CLUSTERED" => Token::Clustered,
            "NONCLUSTERED" => Token::Nonclustered,
            "IDENTITY" => Token::Identity,
            "CHECK" => Token::Check,
            "FOR" => Token::For,
            "WITH" => Token::With,
            "EXEC" | "EXECUTE" => Token::Exec,
            "GO" if at_line_start && self.rest_of_line_is_blank() => Token::Go,
            _ => Token::Ident(s.to_string()),
        }
    }

    /// True when only whitespace, a count or a comment follows on this line.
    fn rest_of_line_is_blank(&mut self) -> bool {
        while let Some(c) = self.current_char {
            match c {
                '\n' => return true,
                '-' if self.peek() == Some(&'-') => return true,
                c if c.is_whitespace() || c.is_ascii_digit() => self.advance(),
                _ => return false,
            }
        }
        true
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let at_line_start = self.line_start;
            let current = self.current_char;

            let token = match current {
                None => return Token::Eof,

                Some('-') => {
                    if self.peek() == Some(&'-') {
                        self.skip_line_comment();
                        continue;
                    } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        Token::Num(self.read_number())
                    } else {
                        self.advance();
                        self.line_start = false;
                        continue;
                    }
                }

                Some('/') => {
                    self.advance();
                    if self.current_char == Some('*') {
                        self.skip_block_comment();
                    } else {
                        self.line_start = false;
                    }
                    continue;
                }

                Some('(') => {
                    self.advance();
                    Token::LParen
                }
                Some(')') => {
                    self.advance();
                    Token::RParen
                }
                Some(',') => {
                    self.advance();
                    Token::Comma
                }
                Some(';') => {
                    self.advance();
                    Token::Semicolon
                }
                Some('.') => {
                    self.advance();
                    Token::Dot
                }
                Some('=') => {
                    self.advance();
                    Token::Eq
                }

                Some('[') => Token::Ident(self.read_delimited(']')),
                Some('"') => Token::Ident(self.read_delimited('"')),
                Some('\'') => Token::Str(self.read_delimited('\'')),

                // N'unicode string'
                Some('N' | 'n') if self.peek() == Some(&'\'') => {
                    self.advance();
                    Token::Str(self.read_delimited('\''))
                }

                Some(c) if c.is_ascii_digit() => Token::Num(self.read_number()),

                Some(c) if c.is_alphabetic() || matches!(c, '_' | '@' | '#') => {
                    let ident = self.read_identifier();
                    self.keyword_or_ident(&ident, at_line_start)
                }

                Some(_) => {
                    self.advance();
                    self.line_start = false;
                    continue;
                }
            };
            self.line_start = false;
            return token;
        }
    }

    /// Collect all tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_create_table() {
        let sql = "CREATE TABLE [dbo].[Order] ([Id] INT);";
        let tokens = Lexer::new(sql).tokenize();

        assert_eq!(tokens[0], Token::Create);
        assert_eq!(tokens[1], Token::Table);
        assert_eq!(tokens[2], Token::Ident("dbo".to_string()));
        assert_eq!(tokens[3], Token::Dot);
        assert_eq!(tokens[4], Token::Ident("Order".to_string()));
        assert_eq!(tokens[5], Token::LParen);
        assert_eq!(tokens[6], Token::Ident("Id".to_string()));
        assert_eq!(tokens[7], Token::Ident("INT".to_string()));
        assert_eq!(tokens[8], Token::RParen);
        assert_eq!(tokens[9], Token::Semicolon);
    }

    #[test]
    fn test_quoted_identifiers_and_strings() {
        let sql = r#"[odd]]name] "Quoted Name" N'it''s' 'plain'"#;
        let tokens = Lexer::new(sql).tokenize();

        assert_eq!(tokens[0], Token::Ident("odd]name".to_string()));
        assert_eq!(tokens[1], Token::Ident("Quoted Name".to_string()));
        assert_eq!(tokens[2], Token::Str("it's".to_string()));
        assert_eq!(tokens[3], Token::Str("plain".to_string()));
    }

    #[test]
    fn test_comments() {
        let sql = "-- comment\nCREATE /* block */ TABLE t (id INT);";
        let tokens = Lexer::new(sql).tokenize();

        assert_eq!(tokens[0], Token::Create);
        assert_eq!(tokens[1], Token::Table);
    }

    #[test]
    fn test_batch_separator_only_on_its_own_line() {
        let sql = "CREATE TABLE t (id INT)\nGO\nCREATE TABLE go (id INT)\n  go -- done\n";
        let tokens = Lexer::new(sql).tokenize();

        assert_eq!(tokens.iter().filter(|t| **t == Token::Go).count(), 2);
        assert!(tokens.contains(&Token::Ident("go".to_string())));
    }

    #[test]
    fn test_parameters_and_negative_numbers() {
        let tokens = Lexer::new("@level1name = N'T' DEFAULT ((-1))").tokenize();
        assert_eq!(tokens[0], Token::Ident("@level1name".to_string()));
        assert_eq!(tokens[1], Token::Eq);
        assert_eq!(tokens[5], Token::LParen);
        assert_eq!(tokens[6], Token::Num("-1".to_string()));
    }
}
