use crate::{
    Compiler, Lexer, Limits, Parser, StatementKind, SymbolTable, Value, VirtualMachine,
    GLOBALS_SIZE,
};
use anyhow::Result;

/// Compiler and machine state threaded between successive inputs.
pub struct Session {
    symbol_table: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
    limits: Limits,
}

impl Default for Session {
    fn default() -> Self {
        let compiler = Compiler::new();
        Self {
            constants: compiler.constants.clone(),
            symbol_table: compiler.into_symbol_table(),
            globals: vec![Value::Void; GLOBALS_SIZE],
            limits: Limits::default(),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs one input, returning the value of its final expression statement.
    /// Inputs ending in any other statement yield void.
    /// State is only committed when the whole input succeeds.
    pub fn evaluate(&mut self, input: &str) -> Result<Value> {
        let tokens = Lexer::new(input).tokenize()?;
        let program = Parser::new(&tokens).parse()?;

        let mut compiler = Compiler::with_state(self.symbol_table.clone(), self.constants.clone());
        compiler.compile(&program)?;
        let bytecode = compiler.bytecode();

        let mut virtual_machine = VirtualMachine::new(bytecode)
            .with_globals(self.globals.clone())
            .with_limits(self.limits);
        virtual_machine.run()?;
        let result = match program.last().map(|statement| &statement.kind) {
            Some(StatementKind::Expression(_)) => virtual_machine.last_popped(),
            _ => Value::Void,
        };

        self.globals = virtual_machine.into_globals();
        self.constants = compiler.constants.clone();
        self.symbol_table = compiler.into_symbol_table();
        Ok(result)
    }
}
