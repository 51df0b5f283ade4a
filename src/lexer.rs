use crate::model::RelationType;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(String),
    Connector(RelationType), // ||--o{ and friends

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Eq,       // =
    Dot,      // .
    Arrow,    // ->
    Newline,

    Unknown(char),
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::Str(s) => format!("\"{}\"", s),
            Token::Num(n) => n.clone(),
            Token::Connector(t) => format!("'{}'", t.connector()),
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::Comma => "','".into(),
            Token::Colon => "':'".into(),
            Token::Eq => "'='".into(),
            Token::Dot => "'.'".into(),
            Token::Arrow => "'->'".into(),
            Token::Newline => "end of line".into(),
            Token::Unknown(c) => format!("'{}'", c),
            Token::Eof => "end of input".into(),
        }
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }
}

/// A token with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("line {0}: unterminated string")]
    UnterminatedString(usize),
}

/// Source text with comments removed. Line structure is preserved.
#[derive(Debug, Default)]
pub struct Stripped {
    pub text: String,
    /// `%% @key value` directives as `(line, key, value)`.
    pub directives: Vec<(usize, String, String)>,
}

/// Remove `%` comments (outside quoted strings) and collect `@key value`
/// directives from them.
pub fn strip_comments(input: &str) -> Stripped {
    let mut out = Stripped::default();

    for (idx, line) in input.lines().enumerate() {
        let mut in_string = false;
        let mut escaped = false;
        let mut cut = None;
        for (i, c) in line.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
            } else if c == '"' {
                in_string = true;
            } else if c == '%' {
                cut = Some(i);
                break;
            }
        }

        match cut {
            Some(i) => {
                out.text.push_str(&line[..i]);
                let comment = line[i..].trim_start_matches('%').trim();
                if let Some(directive) = comment.strip_prefix('@') {
                    let mut parts = directive.splitn(2, char::is_whitespace);
                    let key = parts.next().unwrap_or_default();
                    if !key.is_empty() {
                        let value = parts.next().unwrap_or_default().trim();
                        out.directives
                            .push((idx + 1, key.to_string(), value.to_string()));
                    }
                }
            }
            None => out.text.push_str(line),
        }
        out.text.push('\n');
    }

    out
}

const CONNECTORS: [RelationType; 4] = RelationType::ALL;

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if c != '\n' && c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_string(&mut self) -> Result<String, LexError> {
        let start_line = self.line;
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('\n') | None => return Err(LexError::UnterminatedString(start_line)),
                    Some(c) => s.push(c),
                },
                Some('\n') | None => return Err(LexError::UnterminatedString(start_line)),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_number(&mut self, first: char) -> String {
        let mut s = String::from(first);
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else if c == '.' && !seen_dot && self.peek_second().is_some_and(|d| d.is_ascii_digit()) {
                seen_dot = true;
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_connector(&mut self) -> Option<RelationType> {
        let rest = self.rest();
        let kind = CONNECTORS
            .into_iter()
            .find(|t| rest.starts_with(t.connector()))?;
        for _ in 0..kind.connector().len() {
            self.bump();
        }
        Some(kind)
    }

    pub fn next_token(&mut self) -> Result<Spanned, LexError> {
        self.skip_blanks();
        let line = self.line;

        if let Some(kind) = self.read_connector() {
            return Ok(Spanned {
                token: Token::Connector(kind),
                line,
            });
        }

        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    line,
                });
            }
        };

        let token = match c {
            '\n' => Token::Newline,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '=' => Token::Eq,
            '.' => Token::Dot,
            '-' => match self.peek() {
                Some('>') => {
                    self.bump();
                    Token::Arrow
                }
                Some(d) if d.is_ascii_digit() => Token::Num(self.read_number('-')),
                _ => Token::Unknown('-'),
            },
            '"' => Token::Str(self.read_string()?),
            c if c.is_ascii_digit() => Token::Num(self.read_number(c)),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident(c)),
            c => Token::Unknown(c),
        };

        Ok(Spanned { token, line })
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.token == Token::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}
