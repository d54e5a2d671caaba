use crate::{Position, TypeName};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
#[error("Error at {position}: {kind}")]
pub struct CompileError {
    pub position: Position,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(position: Position, kind: CompileErrorKind) -> Self {
        Self { position, kind }
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CompileErrorKind {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    #[error("{0} is already defined in this scope")]
    AlreadyDefined(String),

    #[error("cannot assign to immutable variable {0}")]
    Immutable(String),

    #[error("unknown operator {0}")]
    UnknownOperator(String),

    #[error("break is not supported in compiled code")]
    UnsupportedBreak,

    #[error("return is only allowed inside a function")]
    ReturnOutsideFunction,

    #[error("function must return a value of type {0}")]
    MissingReturn(TypeName),

    #[error("operand {operand} does not fit the encoding of {opcode}")]
    OperandOverflow { opcode: String, operand: usize },
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("frame overflow: more than {0} nested calls")]
    FrameOverflow(usize),

    #[error("unsupported types for {operator}: {left} {operator} {right}")]
    UnsupportedOperands {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for {operator}: {operand}")]
    UnsupportedOperand {
        operator: &'static str,
        operand: &'static str,
    },

    #[error("condition must be a BOOLEAN, got {0}")]
    NonBooleanCondition(&'static str),

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },

    #[error("parameter {index} not valid: expected {expected} but got {actual}")]
    ArgumentTypeMismatch {
        index: usize,
        expected: TypeName,
        actual: &'static str,
    },

    #[error("calling non-function: {0}")]
    NotCallable(&'static str),

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("malformed instruction at offset {0}")]
    MalformedInstruction(usize),

    #[error("undefined constant {0}")]
    UndefinedConstant(usize),

    #[error("undefined local {0}")]
    UndefinedLocal(usize),

    #[error("undefined free variable {0}")]
    UndefinedFree(usize),

    #[error("constant {0} is not a function")]
    NotAFunction(usize),

    #[error("undefined builtin {0}")]
    UnknownBuiltin(usize),

    #[error("index operator not supported: {left}[{index}]")]
    IndexNotSupported {
        left: &'static str,
        index: &'static str,
    },

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("return outside of a function")]
    ReturnOutsideFunction,
}
