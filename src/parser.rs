use crate::{
    flatten,
    lexer::{Lexeme, Position, Token},
};
use anyhow::{bail, Result};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    slice::Iter,
    str::FromStr,
};

pub type Program = Vec<Statement>;
pub type Block = Vec<Statement>;

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub position: Position,
}

impl Statement {
    pub fn new(kind: StatementKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    Let {
        name: String,
        value: Expression,
        mutable: bool,
    },
    Assign {
        name: String,
        operator: AssignOperator,
        value: Expression,
    },
    Return(Option<Expression>),
    Break(Option<Expression>),
    Expression(Expression),
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let statement = match &self.kind {
            StatementKind::Let {
                name,
                value,
                mutable,
            } => {
                let qualifier = if *mutable { "mut " } else { "" };
                format!("let {}{} = {};", qualifier, name, value)
            }
            StatementKind::Assign {
                name,
                operator,
                value,
            } => format!("{} {} {};", name, operator, value),
            StatementKind::Return(Some(value)) => format!("return {};", value),
            StatementKind::Return(None) => "return;".to_string(),
            StatementKind::Break(Some(value)) => format!("break {};", value),
            StatementKind::Break(None) => "break;".to_string(),
            StatementKind::Expression(expression) => expression.to_string(),
        };
        write!(f, "{}", statement)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum AssignOperator {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl AssignOperator {
    pub fn of_token(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Assign => Self::Assign,
            Token::PlusAssign => Self::Add,
            Token::MinusAssign => Self::Subtract,
            Token::AsteriskAssign => Self::Multiply,
            Token::SlashAssign => Self::Divide,
            _ => return None,
        })
    }

    /// The binary operator a compound assignment applies, `None` for plain `=`.
    pub fn infix_operator(&self) -> Option<Operator> {
        match self {
            Self::Assign => None,
            Self::Add => Some(Operator::Plus),
            Self::Subtract => Some(Operator::Minus),
            Self::Multiply => Some(Operator::Multiply),
            Self::Divide => Some(Operator::Divide),
        }
    }
}

impl Display for AssignOperator {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let operator = match self {
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Subtract => "-=",
            Self::Multiply => "*=",
            Self::Divide => "/=",
        };
        write!(f, "{}", operator)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExpressionKind {
    Identifier(String),
    Literal(Literal),
    Prefix(Operator, Box<Expression>),
    Infix(Box<Expression>, Operator, Box<Expression>),
    If {
        condition: Box<Expression>,
        consequence: Block,
        alternative: Option<Block>,
    },
    For {
        condition: Box<Expression>,
        body: Block,
        alternative: Option<Block>,
    },
    Function(FunctionLiteral),
    Call(Box<Expression>, Vec<Expression>),
    Index(Box<Expression>, Box<Expression>),
}

fn block_to_string(block: &[Statement]) -> String {
    format!("{{ {} }}", flatten(block, " "))
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let expression = match &self.kind {
            ExpressionKind::Identifier(name) => name.to_string(),
            ExpressionKind::Literal(literal) => literal.to_string(),
            ExpressionKind::Prefix(operator, right) => format!("({}{})", operator, right),
            ExpressionKind::Infix(left, operator, right) => {
                format!("({} {} {})", left, operator, right)
            }
            ExpressionKind::If {
                condition,
                consequence,
                alternative,
            } => {
                let mut text = format!("if {} {}", condition, block_to_string(consequence));
                if let Some(alternative) = alternative {
                    text.push_str(&format!(" else {}", block_to_string(alternative)));
                }
                text
            }
            ExpressionKind::For {
                condition,
                body,
                alternative,
            } => {
                let mut text = format!("for {} {}", condition, block_to_string(body));
                if let Some(alternative) = alternative {
                    text.push_str(&format!(" else {}", block_to_string(alternative)));
                }
                text
            }
            ExpressionKind::Function(function) => function.to_string(),
            ExpressionKind::Call(function, arguments) => {
                format!("{}({})", function, flatten(arguments, ", "))
            }
            ExpressionKind::Index(left, index) => format!("({}[{}])", left, index),
        };
        write!(f, "{}", expression)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Not,
    Negate,
}

impl Operator {
    fn infix(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Plus => Self::Plus,
            Token::Minus => Self::Minus,
            Token::Asterisk => Self::Multiply,
            Token::Slash => Self::Divide,
            Token::Equal => Self::Equal,
            Token::NotEqual => Self::NotEqual,
            Token::LessThan => Self::LessThan,
            Token::LessThanOrEqual => Self::LessThanOrEqual,
            Token::GreaterThan => Self::GreaterThan,
            Token::GreaterThanOrEqual => Self::GreaterThanOrEqual,
            _ => return None,
        })
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let operator = match self {
            Self::Plus => "+",
            Self::Minus | Self::Negate => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Not => "!",
        };
        write!(f, "{}", operator)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Array(Vec<Expression>),
    Hash(Vec<(Expression, Expression)>),
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let literal = match self {
            Literal::Integer(x) => x.to_string(),
            Literal::Float(x) => format!("{:?}", x),
            Literal::Boolean(x) => x.to_string(),
            Literal::String(x) => format!("\"{}\"", x),
            Literal::Array(elements) => format!("[{}]", flatten(elements, ", ")),
            Literal::Hash(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect::<Vec<_>>();
                format!("{{{}}}", pairs.join(", "))
            }
        };
        write!(f, "{}", literal)
    }
}

/// Declared type of a parameter or of a function's result.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TypeName {
    Int,
    Float,
    Bool,
    Str,
    Map,
    Array,
    Fn,
    Void,
}

impl FromStr for TypeName {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name {
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "str" => Self::Str,
            "map" => Self::Map,
            "array" => Self::Array,
            "fn" => Self::Fn,
            "void" => Self::Void,
            _ => bail!("Can't find type with name {}", name),
        })
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Map => "map",
            Self::Array => "array",
            Self::Fn => "fn",
            Self::Void => "void",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Parameter {
    pub name: String,
    pub type_name: TypeName,
    pub position: Position,
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} {}", self.name, self.type_name)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionLiteral {
    pub parameters: Vec<Parameter>,
    pub return_type: TypeName,
    pub body: Block,
}

impl Display for FunctionLiteral {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "fun({}) {} {}",
            flatten(&self.parameters, ", "),
            self.return_type,
            block_to_string(&self.body)
        )
    }
}

#[derive(Debug, PartialEq, PartialOrd, Copy, Clone)]
pub enum Precedence {
    Lowest,
    Equals,
    LessThanGreaterThan,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

impl Precedence {
    pub fn of_token(token: &Token) -> Self {
        match token {
            Token::Equal => Self::Equals,
            Token::NotEqual => Self::Equals,
            Token::LessThan => Self::LessThanGreaterThan,
            Token::LessThanOrEqual => Self::LessThanGreaterThan,
            Token::GreaterThan => Self::LessThanGreaterThan,
            Token::GreaterThanOrEqual => Self::LessThanGreaterThan,
            Token::Plus => Self::Sum,
            Token::Minus => Self::Sum,
            Token::Slash => Self::Product,
            Token::Asterisk => Self::Product,
            Token::LeftParentheses => Self::Call,
            Token::LeftBracket => Self::Index,
            _ => Self::Lowest,
        }
    }
}

static END_OF_FILE: Lexeme = Lexeme {
    token: Token::EndOfFile,
    position: Position { line: 0, column: 0 },
};

pub struct Parser<'a> {
    pub lexemes: Iter<'a, Lexeme>,
}

impl<'a> Parser<'a> {
    pub fn new(lexemes: &'a [Lexeme]) -> Self {
        Self {
            lexemes: lexemes.iter(),
        }
    }

    pub fn parse(&mut self) -> Result<Program> {
        let mut program = Program::new();
        while !matches!(self.peek_nth(0), Token::EndOfFile) {
            program.push(self.parse_statement()?);
        }
        Ok(program)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let statement = match (self.peek_nth(0), self.peek_nth(1)) {
            (Token::Let, _) => self.parse_let_statement()?,
            (Token::Return, _) => self.parse_return_statement()?,
            (Token::Break, _) => self.parse_break_statement()?,
            (Token::Function, Token::Identifier(_)) => self.parse_function_statement()?,
            (Token::Identifier(_), token) if AssignOperator::of_token(token).is_some() => {
                self.parse_assign_statement()?
            }
            _ => self.parse_expression_statement()?,
        };
        if matches!(self.peek_nth(0), Token::Semicolon) {
            self.read_lexeme();
        }
        Ok(statement)
    }

    fn parse_let_statement(&mut self) -> Result<Statement> {
        let position = self.expect(Token::Let)?;

        let mutable = matches!(self.peek_nth(0), Token::Mut);
        if mutable {
            self.read_lexeme();
        }

        let (name, _) = self.expect_identifier()?;
        self.expect(Token::Assign)?;
        let value = self.parse_expression(Precedence::Lowest)?;

        Ok(Statement::new(
            StatementKind::Let {
                name,
                value,
                mutable,
            },
            position,
        ))
    }

    fn parse_assign_statement(&mut self) -> Result<Statement> {
        let (name, position) = self.expect_identifier()?;
        let lexeme = self.read_lexeme();
        let operator = match AssignOperator::of_token(&lexeme.token) {
            Some(operator) => operator,
            None => bail!(
                "Parser error at {}: expected an assignment operator, got {}",
                lexeme.position,
                lexeme.token
            ),
        };
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Statement::new(
            StatementKind::Assign {
                name,
                operator,
                value,
            },
            position,
        ))
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        let position = self.expect(Token::Return)?;
        let value = self.parse_optional_expression()?;
        Ok(Statement::new(StatementKind::Return(value), position))
    }

    fn parse_break_statement(&mut self) -> Result<Statement> {
        let position = self.expect(Token::Break)?;
        let value = self.parse_optional_expression()?;
        Ok(Statement::new(StatementKind::Break(value), position))
    }

    fn parse_optional_expression(&mut self) -> Result<Option<Expression>> {
        match self.peek_nth(0) {
            Token::Semicolon | Token::RightBrace | Token::EndOfFile => Ok(None),
            _ => Ok(Some(self.parse_expression(Precedence::Lowest)?)),
        }
    }

    /// `fun name(params) type { body }` binds the literal to `name` like a `let`.
    fn parse_function_statement(&mut self) -> Result<Statement> {
        let position = self.expect(Token::Function)?;
        let (name, _) = self.expect_identifier()?;
        let function = self.parse_function_literal()?;
        Ok(Statement::new(
            StatementKind::Let {
                name,
                value: Expression::new(ExpressionKind::Function(function), position),
                mutable: false,
            },
            position,
        ))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        let position = expression.position;
        Ok(Statement::new(StatementKind::Expression(expression), position))
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(Token::LeftBrace)?;
        let mut block = Block::new();
        loop {
            match self.peek_nth(0) {
                Token::RightBrace => break,
                Token::EndOfFile => bail!(
                    "Parser error at {}: expected }}, got end of file",
                    self.peek_position()
                ),
                _ => block.push(self.parse_statement()?),
            }
        }
        self.expect(Token::RightBrace)?;
        Ok(block)
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression> {
        let lexeme = self.read_lexeme();
        let position = lexeme.position;
        let kind = match &lexeme.token {
            Token::Identifier(name) => ExpressionKind::Identifier(name.to_string()),
            Token::Integer(value) => ExpressionKind::Literal(Literal::Integer(*value)),
            Token::Float(value) => ExpressionKind::Literal(Literal::Float(*value)),
            Token::StringLiteral(value) => {
                ExpressionKind::Literal(Literal::String(value.to_string()))
            }
            Token::True => ExpressionKind::Literal(Literal::Boolean(true)),
            Token::False => ExpressionKind::Literal(Literal::Boolean(false)),
            Token::Bang => ExpressionKind::Prefix(
                Operator::Not,
                Box::new(self.parse_expression(Precedence::Prefix)?),
            ),
            Token::Minus => ExpressionKind::Prefix(
                Operator::Negate,
                Box::new(self.parse_expression(Precedence::Prefix)?),
            ),
            Token::LeftParentheses => {
                let expression = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RightParentheses)?;
                expression.kind
            }
            Token::LeftBracket => ExpressionKind::Literal(Literal::Array(
                self.parse_expression_list(Token::RightBracket)?,
            )),
            Token::LeftBrace => ExpressionKind::Literal(Literal::Hash(self.parse_hash_pairs()?)),
            Token::If => self.parse_if_expression()?,
            Token::For => self.parse_for_expression()?,
            Token::Function => ExpressionKind::Function(self.parse_function_literal()?),
            token => bail!(
                "Parser error at {}: no prefix parse function for {} found",
                position,
                token
            ),
        };
        let mut expression = Expression::new(kind, position);

        while !matches!(self.peek_nth(0), Token::Semicolon)
            && precedence < Precedence::of_token(self.peek_nth(0))
        {
            let lexeme = self.read_lexeme();
            let kind = match &lexeme.token {
                Token::LeftParentheses => ExpressionKind::Call(
                    Box::new(expression),
                    self.parse_expression_list(Token::RightParentheses)?,
                ),
                Token::LeftBracket => {
                    let index = self.parse_expression(Precedence::Lowest)?;
                    self.expect(Token::RightBracket)?;
                    ExpressionKind::Index(Box::new(expression), Box::new(index))
                }
                token => match Operator::infix(token) {
                    Some(operator) => {
                        let right = self.parse_expression(Precedence::of_token(token))?;
                        ExpressionKind::Infix(Box::new(expression), operator, Box::new(right))
                    }
                    None => bail!(
                        "Parser error at {}: token not valid for an infix expression: {}",
                        lexeme.position,
                        token
                    ),
                },
            };
            expression = Expression::new(kind, lexeme.position);
        }
        Ok(expression)
    }

    fn parse_expression_list(&mut self, end: Token) -> Result<Vec<Expression>> {
        let mut expressions = Vec::new();
        if *self.peek_nth(0) == end {
            self.read_lexeme();
            return Ok(expressions);
        }
        loop {
            expressions.push(self.parse_expression(Precedence::Lowest)?);
            if matches!(self.peek_nth(0), Token::Comma) {
                self.read_lexeme();
                continue;
            }
            self.expect(end)?;
            return Ok(expressions);
        }
    }

    fn parse_hash_pairs(&mut self) -> Result<Vec<(Expression, Expression)>> {
        let mut pairs = Vec::new();
        while !matches!(self.peek_nth(0), Token::RightBrace) {
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect(Token::Colon)?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if !matches!(self.peek_nth(0), Token::RightBrace) {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RightBrace)?;
        Ok(pairs)
    }

    fn parse_if_expression(&mut self) -> Result<ExpressionKind> {
        let condition = self.parse_expression(Precedence::Lowest)?;
        let consequence = self.parse_block()?;
        let alternative = self.parse_else_clause()?;
        Ok(ExpressionKind::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_for_expression(&mut self) -> Result<ExpressionKind> {
        let condition = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        let alternative = self.parse_else_clause()?;
        Ok(ExpressionKind::For {
            condition: Box::new(condition),
            body,
            alternative,
        })
    }

    fn parse_else_clause(&mut self) -> Result<Option<Block>> {
        if !matches!(self.peek_nth(0), Token::Else) {
            return Ok(None);
        }
        self.read_lexeme();
        if matches!(self.peek_nth(0), Token::If) {
            let statement = self.parse_expression_statement()?;
            return Ok(Some(vec![statement]));
        }
        Ok(Some(self.parse_block()?))
    }

    /// Parses `(params) [type] { body }`; the `fun` keyword is already consumed.
    fn parse_function_literal(&mut self) -> Result<FunctionLiteral> {
        self.expect(Token::LeftParentheses)?;
        let mut parameters = Vec::new();
        if matches!(self.peek_nth(0), Token::RightParentheses) {
            self.read_lexeme();
        } else {
            loop {
                let (name, position) = self.expect_identifier()?;
                let type_name = self.parse_type_name()?;
                parameters.push(Parameter {
                    name,
                    type_name,
                    position,
                });
                if matches!(self.peek_nth(0), Token::Comma) {
                    self.read_lexeme();
                    continue;
                }
                self.expect(Token::RightParentheses)?;
                break;
            }
        }

        let return_type = match self.peek_nth(0) {
            Token::Identifier(_) => self.parse_type_name()?,
            _ => TypeName::Void,
        };
        let body = self.parse_block()?;

        Ok(FunctionLiteral {
            parameters,
            return_type,
            body,
        })
    }

    fn parse_type_name(&mut self) -> Result<TypeName> {
        let (name, position) = self.expect_identifier()?;
        match name.parse::<TypeName>() {
            Ok(type_name) => Ok(type_name),
            Err(error) => bail!("Parser error at {}: {}", position, error),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<Position> {
        let lexeme = self.read_lexeme();
        if lexeme.token != expected {
            bail!(
                "Parser error at {}: expected next token to be {}, got {} instead",
                lexeme.position,
                expected,
                lexeme.token
            );
        }
        Ok(lexeme.position)
    }

    fn expect_identifier(&mut self) -> Result<(String, Position)> {
        let lexeme = self.read_lexeme();
        match &lexeme.token {
            Token::Identifier(name) => Ok((name.to_string(), lexeme.position)),
            token => bail!(
                "Parser error at {}: expected an identifier, got {} instead",
                lexeme.position,
                token
            ),
        }
    }

    fn read_lexeme(&mut self) -> &'a Lexeme {
        self.lexemes.next().unwrap_or(&END_OF_FILE)
    }

    fn peek_nth(&self, n: usize) -> &'a Token {
        &self.lexemes.clone().nth(n).unwrap_or(&END_OF_FILE).token
    }

    fn peek_position(&self) -> Position {
        self.lexemes
            .clone()
            .next()
            .unwrap_or(&END_OF_FILE)
            .position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(input: &str) -> Result<Program> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(&tokens);
        parser.parse()
    }

    #[test]
    fn test_let_statements() -> Result<()> {
        let input = r#"
        let x = 5;
        let mut y = 10;
        let foobar = 838383;
        "#;

        let program = parse(input)?;
        assert_eq!(program.len(), 3);

        let expected = [("x", false), ("y", true), ("foobar", false)];
        for (statement, (expected_name, expected_mutable)) in program.iter().zip(expected) {
            match &statement.kind {
                StatementKind::Let { name, mutable, .. } => {
                    assert_eq!(name, expected_name);
                    assert_eq!(*mutable, expected_mutable);
                }
                _ => bail!("Expected a let statement!"),
            }
        }

        Ok(())
    }

    #[test]
    fn test_return_statements() -> Result<()> {
        let input = r#"
        return 5;
        return 10;
        return;
        "#;

        let program = parse(input)?;
        assert_eq!(program.len(), 3);
        assert!(matches!(program[0].kind, StatementKind::Return(Some(_))));
        assert!(matches!(program[2].kind, StatementKind::Return(None)));

        Ok(())
    }

    #[test]
    fn test_assign_statements() -> Result<()> {
        let tests = [
            ("x = 5;", "x", AssignOperator::Assign),
            ("x += 5;", "x", AssignOperator::Add),
            ("y -= 5;", "y", AssignOperator::Subtract),
            ("y *= 5;", "y", AssignOperator::Multiply),
            ("z /= 5;", "z", AssignOperator::Divide),
        ];

        for (input, expected_name, expected_operator) in tests {
            let program = parse(input)?;
            assert_eq!(program.len(), 1);
            match &program[0].kind {
                StatementKind::Assign { name, operator, .. } => {
                    assert_eq!(name, expected_name);
                    assert_eq!(*operator, expected_operator);
                }
                _ => bail!("Expected an assign statement for {}", input),
            }
        }

        Ok(())
    }

    #[test]
    fn test_statement_display() -> Result<()> {
        let tests = [
            ("let myVar = anotherVar;", "let myVar = anotherVar;"),
            ("let mut a = 1", "let mut a = 1;"),
            ("a += 2", "a += 2;"),
            ("return", "return;"),
            ("break 5", "break 5;"),
            ("fun add(a int, b int) int { a + b }", "let add = fun(a int, b int) int { (a + b) };"),
        ];

        for (input, expected) in tests {
            let program = parse(input)?;
            assert_eq!(program[0].to_string(), expected, "Failed for input: {}", input);
        }
        Ok(())
    }

    #[test]
    fn test_operator_precedence() -> Result<()> {
        let tests = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a * b / c", "((a * b) / c)"),
            ("a + b / c", "(a + (b / c))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 >= 4 != 3 <= 4", "((5 >= 4) != (3 <= 4))"),
            ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
            ("true == !false", "(true == (!false))"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            ("add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))", "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))"),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
            ("add(a * b[2], b[1], 2 * [1, 2][1])", "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))"),
            ("2.5 * \"s\"", "(2.5 * \"s\")"),
        ];

        for (input, expected) in tests {
            let program = parse(input)?;
            assert_eq!(program.len(), 1);
            assert_eq!(program[0].to_string(), expected, "Failed for input: {}", input);
        }
        Ok(())
    }

    #[test]
    fn test_compound_expressions() -> Result<()> {
        let tests = [
            ("if (x < y) { x }", "if (x < y) { x }"),
            ("if (x < y) { x } else { y }", "if (x < y) { x } else { y }"),
            ("if x { 1 } else if y { 2 } else { 3 }", "if x { 1 } else { if y { 2 } else { 3 } }"),
            ("for (i < 3) { i += 1; i }", "for (i < 3) { i += 1; i }"),
            ("for (false) { 1 } else { 2 }", "for false { 1 } else { 2 }"),
            ("fun() { }", "fun() void {  }"),
            ("fun(x int, y float) float { x * y }", "fun(x int, y float) float { (x * y) }"),
            ("fun(a fn) fn { a }(b)", "fun(a fn) fn { a }(b)"),
            ("{\"one\": 1, two: 2 + 2}", "{\"one\": 1, two: (2 + 2)}"),
            ("{}", "{}"),
            ("[]", "[]"),
        ];

        for (input, expected) in tests {
            let program = parse(input)?;
            assert_eq!(program.len(), 1, "Failed for input: {}", input);
            assert_eq!(program[0].to_string(), expected, "Failed for input: {}", input);
        }
        Ok(())
    }

    #[test]
    fn test_positions_are_recorded() -> Result<()> {
        let program = parse("let x = 1;\nx + y;")?;
        assert_eq!(program[0].position, Position::new(1, 1));
        match &program[1].kind {
            StatementKind::Expression(expression) => {
                assert_eq!(expression.position, Position::new(2, 3));
                match &expression.kind {
                    ExpressionKind::Infix(_, _, right) => {
                        assert_eq!(right.position, Position::new(2, 5))
                    }
                    _ => bail!("Expected an infix expression!"),
                }
            }
            _ => bail!("Expected an expression statement!"),
        }
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let inputs = [
            "let = 5;",
            "let x 5;",
            "fun(x) { x }",
            "fun(x integer) { x }",
            "if (x) { 1",
            "[1, 2",
            "{1 2}",
            "@",
            ")",
        ];

        for input in inputs {
            assert!(parse(input).is_err(), "Expected an error for input: {}", input);
        }
    }
}
