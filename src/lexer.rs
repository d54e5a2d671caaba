use self::Token::*;
use anyhow::{bail, Context, Result};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::Chars,
};

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Assign,
    Asterisk,
    AsteriskAssign,
    Bang,
    Break,
    Colon,
    Comma,
    Else,
    EndOfFile,
    Equal,
    False,
    Float(f64),
    For,
    Function,
    GreaterThan,
    GreaterThanOrEqual,
    Identifier(String),
    If,
    Illegal(char),
    Integer(i64),
    LeftBrace,
    LeftBracket,
    LeftParentheses,
    LessThan,
    LessThanOrEqual,
    Let,
    Minus,
    MinusAssign,
    Mut,
    NotEqual,
    Plus,
    PlusAssign,
    Return,
    RightBrace,
    RightBracket,
    RightParentheses,
    Semicolon,
    Slash,
    SlashAssign,
    StringLiteral(String),
    True,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let token = match self {
            Assign => "=".to_string(),
            Asterisk => "*".to_string(),
            AsteriskAssign => "*=".to_string(),
            Bang => "!".to_string(),
            Break => "break".to_string(),
            Colon => ":".to_string(),
            Comma => ",".to_string(),
            Else => "else".to_string(),
            EndOfFile => "end of file".to_string(),
            Equal => "==".to_string(),
            False => "false".to_string(),
            Float(value) => value.to_string(),
            For => "for".to_string(),
            Function => "fun".to_string(),
            GreaterThan => ">".to_string(),
            GreaterThanOrEqual => ">=".to_string(),
            Identifier(identifier) => identifier.to_string(),
            If => "if".to_string(),
            Illegal(c) => c.to_string(),
            Integer(value) => value.to_string(),
            LeftBrace => "{".to_string(),
            LeftBracket => "[".to_string(),
            LeftParentheses => "(".to_string(),
            LessThan => "<".to_string(),
            LessThanOrEqual => "<=".to_string(),
            Let => "let".to_string(),
            Minus => "-".to_string(),
            MinusAssign => "-=".to_string(),
            Mut => "mut".to_string(),
            NotEqual => "!=".to_string(),
            Plus => "+".to_string(),
            PlusAssign => "+=".to_string(),
            Return => "return".to_string(),
            RightBrace => "}".to_string(),
            RightBracket => "]".to_string(),
            RightParentheses => ")".to_string(),
            Semicolon => ";".to_string(),
            Slash => "/".to_string(),
            SlashAssign => "/=".to_string(),
            StringLiteral(value) => format!("\"{}\"", value),
            True => "true".to_string(),
        };
        write!(f, "{}", token)
    }
}

/// A 1-based line and column into the source text.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Lexeme {
    pub token: Token,
    pub position: Position,
}

pub const EOF_CHAR: char = '\0';

pub struct Lexer<'a> {
    chars: Chars<'a>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Self {
            chars: input.chars(),
            line: 1,
            column: 1,
        }
    }

    pub fn next_lexeme(&mut self) -> Result<Lexeme> {
        self.skip_trivia()?;
        let position = self.position();
        let first_char = self.read_char();
        let token = match first_char {
            '=' => self.next_char_or(Assign, '=', Equal),
            ';' => Semicolon,
            ':' => Colon,
            '(' => LeftParentheses,
            ')' => RightParentheses,
            ',' => Comma,
            '+' => self.next_char_or(Plus, '=', PlusAssign),
            '-' => self.next_char_or(Minus, '=', MinusAssign),
            '*' => self.next_char_or(Asterisk, '=', AsteriskAssign),
            '/' => self.next_char_or(Slash, '=', SlashAssign),
            '{' => LeftBrace,
            '}' => RightBrace,
            '[' => LeftBracket,
            ']' => RightBracket,
            '!' => self.next_char_or(Bang, '=', NotEqual),
            '<' => self.next_char_or(LessThan, '=', LessThanOrEqual),
            '>' => self.next_char_or(GreaterThan, '=', GreaterThanOrEqual),
            '"' => self.read_string(position)?,
            EOF_CHAR if self.is_eof() => EndOfFile,
            c if Self::is_letter(c) => {
                let mut identifier = c.to_string();
                identifier.push_str(&self.take_while(|c| Self::is_letter(c) || Self::is_digit(c)));
                Self::lookup_identifier(&identifier)
            }
            c if Self::is_digit(c) => self.read_number(c, position)?,
            illegal => Illegal(illegal),
        };
        Ok(Lexeme { token, position })
    }

    pub fn next_token(&mut self) -> Result<Token> {
        Ok(self.next_lexeme()?.token)
    }

    /// Lexes the whole input. The returned vector always ends with `EndOfFile`.
    pub fn tokenize(&mut self) -> Result<Vec<Lexeme>> {
        let mut lexemes = Vec::new();
        loop {
            let lexeme = self.next_lexeme()?;
            let finished = lexeme.token == EndOfFile;
            lexemes.push(lexeme);
            if finished {
                break;
            }
        }
        Ok(lexemes)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn read_char(&mut self) -> char {
        match self.chars.next() {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
                '\n'
            }
            Some(c) => {
                self.column += 1;
                c
            }
            None => EOF_CHAR,
        }
    }

    fn peek_nth(&self, n: usize) -> char {
        self.chars.clone().nth(n).unwrap_or(EOF_CHAR)
    }

    fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> String {
        let mut chars = String::new();
        while predicate(self.peek_nth(0)) && !self.is_eof() {
            chars.push(self.read_char());
        }
        chars
    }

    fn skip_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.peek_nth(0)) && !self.is_eof() {
            self.read_char();
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            self.skip_while(Self::is_whitespace);
            match (self.peek_nth(0), self.peek_nth(1)) {
                ('/', '/') => self.skip_while(|c| c != '\n'),
                ('/', '*') => {
                    let position = self.position();
                    self.read_char();
                    self.read_char();
                    while !(self.peek_nth(0) == '*' && self.peek_nth(1) == '/') {
                        if self.is_eof() {
                            bail!("Lexer error at {}: unterminated block comment", position);
                        }
                        self.read_char();
                    }
                    self.read_char();
                    self.read_char();
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_string(&mut self, position: Position) -> Result<Token> {
        let value = self.take_while(|c| c != '"');
        if self.is_eof() {
            bail!("Lexer error at {}: unterminated string", position);
        }
        self.read_char();
        Ok(StringLiteral(value))
    }

    fn read_number(&mut self, first_char: char, position: Position) -> Result<Token> {
        let mut number = first_char.to_string();
        number.push_str(&self.take_while(Self::is_digit));
        if self.peek_nth(0) == '.' {
            number.push(self.read_char());
            number.push_str(&self.take_while(Self::is_digit));
            let value = number
                .parse::<f64>()
                .with_context(|| format!("Lexer error at {}: invalid float {}", position, number))?;
            return Ok(Float(value));
        }
        let value = number
            .parse::<i64>()
            .with_context(|| format!("Lexer error at {}: invalid integer {}", position, number))?;
        Ok(Integer(value))
    }

    fn is_letter(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn is_whitespace(c: char) -> bool {
        c == ' ' || c == '\t' || c == '\n' || c == '\r'
    }

    fn lookup_identifier(identifier: &str) -> Token {
        match identifier {
            "fun" => Function,
            "let" => Let,
            "mut" => Mut,
            "true" => True,
            "false" => False,
            "return" => Return,
            "break" => Break,
            "if" => If,
            "else" => Else,
            "for" => For,
            _ => Identifier(identifier.to_string()),
        }
    }

    fn next_char_or(&mut self, default: Token, next_char: char, token: Token) -> Token {
        match self.peek_nth(0) {
            c if c == next_char => {
                self.read_char();
                token
            }
            _ => default,
        }
    }
}
