use crate::{
    CompileError, CompileErrorKind, CompiledFunction, Expression, ExpressionKind,
    FunctionLiteral, Instruction, Instructions, Literal, Opcode, Operator, Position, Statement,
    StatementKind, Symbol, SymbolScope, SymbolTable, TypeName, Value, BUILTINS,
};
use std::{mem, rc::Rc};
use tracing::{debug, trace};

// Overwritten once the jump target is known.
const PLACEHOLDER: usize = 9999;

#[derive(Debug, Clone, Copy, PartialEq)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

pub struct Compiler {
    pub constants: Vec<Value>,
    pub symbol_table: SymbolTable,
    scope: CompilationScope,
    enclosing: Vec<CompilationScope>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }
        Self::with_state(symbol_table, Vec::new())
    }

    /// Resumes compilation against the symbols and constants of earlier inputs.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            constants,
            symbol_table,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
        }
    }

    pub fn compile(&mut self, program: &[Statement]) -> Result<(), CompileError> {
        for statement in program.iter() {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn into_symbol_table(self) -> SymbolTable {
        self.symbol_table
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        let position = statement.position;
        match &statement.kind {
            StatementKind::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(position, Opcode::Pop, &[])?;
            }
            StatementKind::Let {
                name,
                value,
                mutable,
            } => {
                let symbol = self
                    .symbol_table
                    .define(name, *mutable)
                    .map_err(|kind| CompileError::new(position, kind))?;
                self.compile_expression(value)?;
                self.store_symbol(position, &symbol)?;
            }
            StatementKind::Assign {
                name,
                operator,
                value,
            } => {
                let symbol = self.resolve(position, name)?;
                if !symbol.mutable {
                    return Err(CompileError::new(
                        position,
                        CompileErrorKind::Immutable(name.to_string()),
                    ));
                }

                match operator.infix_operator() {
                    Some(operator) => {
                        let target = Expression::new(ExpressionKind::Identifier(name.to_string()), position);
                        let desugared = Expression::new(
                            ExpressionKind::Infix(Box::new(target), operator, Box::new(value.clone())),
                            position,
                        );
                        self.compile_expression(&desugared)?;
                    }
                    None => self.compile_expression(value)?,
                }
                self.store_symbol(position, &symbol)?;
            }
            StatementKind::Return(value) => {
                if self.enclosing.is_empty() {
                    return Err(CompileError::new(
                        position,
                        CompileErrorKind::ReturnOutsideFunction,
                    ));
                }
                match value {
                    Some(value) => {
                        self.compile_expression(value)?;
                        self.emit(position, Opcode::ReturnValue, &[])?;
                    }
                    None => {
                        self.emit(position, Opcode::Return, &[])?;
                    }
                }
            }
            StatementKind::Break(_) => {
                return Err(CompileError::new(position, CompileErrorKind::UnsupportedBreak))
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        let position = expression.position;
        match &expression.kind {
            ExpressionKind::Identifier(name) => {
                let symbol = self.resolve(position, name)?;
                self.load_symbol(position, &symbol)?;
            }
            ExpressionKind::Literal(literal) => self.compile_literal(position, literal)?,
            ExpressionKind::Prefix(operator, right) => {
                self.compile_expression(right)?;
                let opcode = match operator {
                    Operator::Not => Opcode::Bang,
                    Operator::Negate => Opcode::Minus,
                    operator => return Err(unknown_operator(position, operator)),
                };
                self.emit(position, opcode, &[])?;
            }
            ExpressionKind::Infix(left, operator, right) => {
                self.compile_infix(position, left, *operator, right)?
            }
            ExpressionKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;
                let jump_not_true = self.emit(position, Opcode::JumpNotTrue, &[PLACEHOLDER])?;

                self.compile_block(position, consequence)?;
                let jump = self.emit(position, Opcode::Jump, &[PLACEHOLDER])?;

                let after_consequence = self.scope.instructions.len();
                self.change_operand(position, jump_not_true, Opcode::JumpNotTrue, after_consequence)?;

                self.compile_alternative(position, alternative.as_deref())?;
                let after_alternative = self.scope.instructions.len();
                self.change_operand(position, jump, Opcode::Jump, after_alternative)?;
            }
            ExpressionKind::For {
                condition,
                body,
                alternative,
            } => {
                self.compile_expression(condition)?;
                let skip_body = self.emit(position, Opcode::JumpNotTrue, &[PLACEHOLDER])?;

                let body_start = self.scope.instructions.len();
                self.compile_block(position, body)?;

                // Re-test; on true, drop this iteration's value and go again.
                self.compile_expression(condition)?;
                let exit = self.emit(position, Opcode::JumpNotTrue, &[PLACEHOLDER])?;
                self.emit(position, Opcode::Pop, &[])?;
                self.emit(position, Opcode::Jump, &[body_start])?;

                let after_body = self.scope.instructions.len();
                self.change_operand(position, skip_body, Opcode::JumpNotTrue, after_body)?;

                self.compile_alternative(position, alternative.as_deref())?;
                let after_alternative = self.scope.instructions.len();
                self.change_operand(position, exit, Opcode::JumpNotTrue, after_alternative)?;
            }
            ExpressionKind::Function(function) => self.compile_function(position, function)?,
            ExpressionKind::Call(function, arguments) => {
                self.compile_expression(function)?;
                for argument in arguments.iter() {
                    self.compile_expression(argument)?;
                }
                self.emit(position, Opcode::Call, &[arguments.len()])?;
            }
            ExpressionKind::Index(left, index) => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(position, Opcode::Index, &[])?;
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, position: Position, literal: &Literal) -> Result<(), CompileError> {
        match literal {
            Literal::Integer(value) => self.emit_constant(position, Value::Integer(*value))?,
            Literal::Float(value) => self.emit_constant(position, Value::Float(*value))?,
            Literal::String(value) => self.emit_constant(position, Value::from(value.as_str()))?,
            Literal::Boolean(true) => {
                self.emit(position, Opcode::True, &[])?;
            }
            Literal::Boolean(false) => {
                self.emit(position, Opcode::False, &[])?;
            }
            Literal::Array(elements) => {
                for element in elements.iter() {
                    self.compile_expression(element)?;
                }
                self.emit(position, Opcode::Array, &[elements.len()])?;
            }
            Literal::Hash(pairs) => {
                let mut pairs = pairs.iter().collect::<Vec<_>>();
                pairs.sort_by_cached_key(|(key, _)| key.to_string());
                for (key, value) in pairs.iter() {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(position, Opcode::Hash, &[pairs.len() * 2])?;
            }
        }
        Ok(())
    }

    fn compile_infix(
        &mut self,
        position: Position,
        left: &Expression,
        operator: Operator,
        right: &Expression,
    ) -> Result<(), CompileError> {
        let (first, second, opcode) = match operator {
            Operator::LessThan => (right, left, Opcode::GreaterThan),
            Operator::LessThanOrEqual => (right, left, Opcode::GreaterThanOrEqual),
            Operator::Plus => (left, right, Opcode::Add),
            Operator::Minus => (left, right, Opcode::Sub),
            Operator::Multiply => (left, right, Opcode::Mul),
            Operator::Divide => (left, right, Opcode::Div),
            Operator::Equal => (left, right, Opcode::Equal),
            Operator::NotEqual => (left, right, Opcode::NotEqual),
            Operator::GreaterThan => (left, right, Opcode::GreaterThan),
            Operator::GreaterThanOrEqual => (left, right, Opcode::GreaterThanOrEqual),
            Operator::Not | Operator::Negate => return Err(unknown_operator(position, &operator)),
        };
        self.compile_expression(first)?;
        self.compile_expression(second)?;
        self.emit(position, opcode, &[])?;
        Ok(())
    }

    /// Compiles an `if` or `for` block so that it leaves exactly one value.
    fn compile_block(&mut self, position: Position, block: &[Statement]) -> Result<(), CompileError> {
        for statement in block.iter() {
            self.compile_statement(statement)?;
        }

        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        } else if !self.last_instruction_is(Opcode::ReturnValue)
            && !self.last_instruction_is(Opcode::Return)
        {
            self.emit(position, Opcode::Void, &[])?;
        }
        Ok(())
    }

    fn compile_alternative(
        &mut self,
        position: Position,
        alternative: Option<&[Statement]>,
    ) -> Result<(), CompileError> {
        match alternative {
            Some(block) => self.compile_block(position, block),
            None => self.emit(position, Opcode::Void, &[]).map(|_| ()),
        }
    }

    fn compile_function(
        &mut self,
        position: Position,
        function: &FunctionLiteral,
    ) -> Result<(), CompileError> {
        self.enter_scope();
        let body = self.compile_function_body(position, function);
        let (instructions, symbol_table) = self.leave_scope();
        body?;

        let free_symbols = symbol_table.free_symbols;
        for symbol in free_symbols.iter() {
            self.load_symbol(position, symbol)?;
        }

        let compiled = CompiledFunction {
            instructions,
            num_locals: symbol_table.num_definitions,
            num_parameters: function.parameters.len(),
            parameter_types: function
                .parameters
                .iter()
                .map(|parameter| parameter.type_name)
                .collect(),
        };
        debug!(
            %position,
            num_locals = compiled.num_locals,
            num_free = free_symbols.len(),
            "compiled function"
        );

        let index = self.add_constant(Value::Function(Rc::new(compiled)));
        self.emit(position, Opcode::Closure, &[index, free_symbols.len()])?;
        Ok(())
    }

    fn compile_function_body(
        &mut self,
        position: Position,
        function: &FunctionLiteral,
    ) -> Result<(), CompileError> {
        for parameter in function.parameters.iter() {
            self.symbol_table
                .define(&parameter.name, false)
                .map_err(|kind| CompileError::new(parameter.position, kind))?;
        }

        for statement in function.body.iter() {
            self.compile_statement(statement)?;
        }

        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }

        if !self.last_instruction_is(Opcode::ReturnValue) {
            if function.return_type != TypeName::Void {
                return Err(CompileError::new(
                    position,
                    CompileErrorKind::MissingReturn(function.return_type),
                ));
            }
            if !self.last_instruction_is(Opcode::Return) {
                self.emit(position, Opcode::Return, &[])?;
            }
        }
        Ok(())
    }

    fn resolve(&mut self, position: Position, name: &str) -> Result<Symbol, CompileError> {
        self.symbol_table.resolve(name).ok_or_else(|| {
            CompileError::new(
                position,
                CompileErrorKind::UndefinedVariable(name.to_string()),
            )
        })
    }

    fn load_symbol(&mut self, position: Position, symbol: &Symbol) -> Result<(), CompileError> {
        let opcode = match symbol.scope {
            SymbolScope::Global => Opcode::GetGlobal,
            SymbolScope::Local => Opcode::GetLocal,
            SymbolScope::Free => Opcode::GetFree,
            SymbolScope::Builtin => Opcode::GetBuiltin,
        };
        self.emit(position, opcode, &[symbol.index])?;
        Ok(())
    }

    fn store_symbol(&mut self, position: Position, symbol: &Symbol) -> Result<(), CompileError> {
        let opcode = match symbol.scope {
            SymbolScope::Global => Opcode::SetGlobal,
            SymbolScope::Local => Opcode::SetLocal,
            SymbolScope::Free => Opcode::SetFree,
            SymbolScope::Builtin => {
                return Err(CompileError::new(
                    position,
                    CompileErrorKind::Immutable(symbol.name.to_string()),
                ))
            }
        };
        self.emit(position, opcode, &[symbol.index])?;
        Ok(())
    }

    fn enter_scope(&mut self) {
        self.enclosing.push(mem::take(&mut self.scope));
        let outer = mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
        debug!(depth = self.enclosing.len(), "entered scope");
    }

    fn leave_scope(&mut self) -> (Instructions, SymbolTable) {
        let enclosing = self.enclosing.pop().unwrap_or_default();
        let scope = mem::replace(&mut self.scope, enclosing);

        let mut symbol_table = mem::take(&mut self.symbol_table);
        if let Some(outer) = symbol_table.outer.take() {
            self.symbol_table = *outer;
        }
        debug!(depth = self.enclosing.len(), "left scope");
        (scope.instructions, symbol_table)
    }

    fn add_constant(&mut self, constant: Value) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    fn emit_constant(&mut self, position: Position, constant: Value) -> Result<(), CompileError> {
        let index = self.add_constant(constant);
        self.emit(position, Opcode::Constant, &[index])?;
        Ok(())
    }

    fn emit(
        &mut self,
        position: Position,
        opcode: Opcode,
        operands: &[usize],
    ) -> Result<usize, CompileError> {
        let instruction = Instruction::new(opcode, operands.to_vec());
        if !instruction.fits() {
            return Err(operand_overflow(position, &instruction));
        }

        let offset = self.scope.instructions.push(&instruction);
        trace!(offset, %instruction, "emit");
        self.scope.previous_instruction = self.scope.last_instruction.replace(EmittedInstruction {
            opcode,
            position: offset,
        });
        Ok(offset)
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.scope
            .last_instruction
            .map_or(false, |last| last.opcode == opcode)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last_instruction {
            self.scope.instructions.0.truncate(last.position);
            self.scope.last_instruction = self.scope.previous_instruction.take();
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope.last_instruction.as_mut() {
            self.scope.instructions.0[last.position] = Opcode::ReturnValue as u8;
            last.opcode = Opcode::ReturnValue;
        }
    }

    /// Backpatches the operand of the jump emitted at `offset`.
    fn change_operand(
        &mut self,
        position: Position,
        offset: usize,
        opcode: Opcode,
        operand: usize,
    ) -> Result<(), CompileError> {
        let instruction = Instruction::new(opcode, vec![operand]);
        if !instruction.fits() {
            return Err(operand_overflow(position, &instruction));
        }

        let bytes = instruction.as_bytes();
        self.scope
            .instructions
            .0
            .splice(offset..offset + bytes.len(), bytes);
        Ok(())
    }
}

fn unknown_operator(position: Position, operator: &Operator) -> CompileError {
    CompileError::new(
        position,
        CompileErrorKind::UnknownOperator(operator.to_string()),
    )
}

fn operand_overflow(position: Position, instruction: &Instruction) -> CompileError {
    CompileError::new(
        position,
        CompileErrorKind::OperandOverflow {
            opcode: format!("Op{:?}", instruction.opcode),
            operand: instruction.operands.iter().copied().max().unwrap_or_default(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Lexer, Parser};
    use anyhow::{bail, Result};
    use Opcode::*;

    enum Expected {
        Integer(i64),
        Float(f64),
        String(&'static str),
        Function(Vec<Instruction>),
    }

    fn make(opcode: Opcode, operands: &[usize]) -> Instruction {
        Instruction::new(opcode, operands.to_vec())
    }

    fn compile(input: &str) -> Result<Bytecode> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(&tokens);
        let program = parser.parse()?;

        let mut compiler = Compiler::new();
        compiler.compile(&program)?;
        Ok(compiler.bytecode())
    }

    fn check_constants(input: &str, expected: &[Expected], actual: &[Value]) -> Result<()> {
        assert_eq!(actual.len(), expected.len(), "Wrong constant count for input: {}", input);
        for (expected, actual) in expected.iter().zip(actual.iter()) {
            match (expected, actual) {
                (Expected::Integer(expected), Value::Integer(actual)) => {
                    assert_eq!(actual, expected, "Failed for input: {}", input)
                }
                (Expected::Float(expected), Value::Float(actual)) => {
                    assert_eq!(actual, expected, "Failed for input: {}", input)
                }
                (Expected::String(expected), Value::String(actual)) => {
                    assert_eq!(actual.as_ref(), *expected, "Failed for input: {}", input)
                }
                (Expected::Function(expected), Value::Function(actual)) => assert_eq!(
                    actual.instructions.to_string(),
                    Instructions::concat(expected).to_string(),
                    "Failed for input: {}",
                    input
                ),
                (_, actual) => bail!("Unexpected constant {} for input: {}", actual, input),
            }
        }
        Ok(())
    }

    fn run_compiler_tests(tests: Vec<(&str, Vec<Expected>, Vec<Instruction>)>) -> Result<()> {
        for (input, constants, instructions) in tests {
            let bytecode = compile(input)?;
            assert_eq!(
                bytecode.instructions.to_string(),
                Instructions::concat(&instructions).to_string(),
                "Failed for input: {}",
                input
            );
            check_constants(input, &constants, &bytecode.constants)?;
        }
        Ok(())
    }

    #[test]
    fn test_integer_arithmetic() -> Result<()> {
        use Expected::Integer as I;
        run_compiler_tests(vec![
            ("1 + 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(Add, &[]), make(Pop, &[])]),
            ("1; 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Pop, &[]), make(Constant, &[1]), make(Pop, &[])]),
            ("1 - 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(Sub, &[]), make(Pop, &[])]),
            ("1 * 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(Mul, &[]), make(Pop, &[])]),
            ("2 / 1", vec![I(2), I(1)], vec![make(Constant, &[0]), make(Constant, &[1]), make(Div, &[]), make(Pop, &[])]),
            ("-1", vec![I(1)], vec![make(Constant, &[0]), make(Minus, &[]), make(Pop, &[])]),
        ])
    }

    #[test]
    fn test_float_and_string_constants() -> Result<()> {
        run_compiler_tests(vec![
            ("2.5 * 2", vec![Expected::Float(2.5), Expected::Integer(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(Mul, &[]), make(Pop, &[])]),
            ("\"kol\"", vec![Expected::String("kol")], vec![make(Constant, &[0]), make(Pop, &[])]),
            ("\"ko\" + \"l\"", vec![Expected::String("ko"), Expected::String("l")], vec![make(Constant, &[0]), make(Constant, &[1]), make(Add, &[]), make(Pop, &[])]),
        ])
    }

    #[test]
    fn test_boolean_expressions() -> Result<()> {
        use Expected::Integer as I;
        run_compiler_tests(vec![
            ("true", vec![], vec![make(True, &[]), make(Pop, &[])]),
            ("false", vec![], vec![make(False, &[]), make(Pop, &[])]),
            ("1 > 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(GreaterThan, &[]), make(Pop, &[])]),
            ("1 < 2", vec![I(2), I(1)], vec![make(Constant, &[0]), make(Constant, &[1]), make(GreaterThan, &[]), make(Pop, &[])]),
            ("1 >= 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(GreaterThanOrEqual, &[]), make(Pop, &[])]),
            ("1 <= 2", vec![I(2), I(1)], vec![make(Constant, &[0]), make(Constant, &[1]), make(GreaterThanOrEqual, &[]), make(Pop, &[])]),
            ("1 == 2", vec![I(1), I(2)], vec![make(Constant, &[0]), make(Constant, &[1]), make(Equal, &[]), make(Pop, &[])]),
            ("true != false", vec![], vec![make(True, &[]), make(False, &[]), make(NotEqual, &[]), make(Pop, &[])]),
            ("!true", vec![], vec![make(True, &[]), make(Bang, &[]), make(Pop, &[])]),
        ])
    }

    #[test]
    fn test_conditionals() -> Result<()> {
        use Expected::Integer as I;
        run_compiler_tests(vec![
            (
                "if (true) { 10 }; 3333;",
                vec![I(10), I(3333)],
                vec![
                    make(True, &[]),
                    make(JumpNotTrue, &[10]),
                    make(Constant, &[0]),
                    make(Jump, &[11]),
                    make(Void, &[]),
                    make(Pop, &[]),
                    make(Constant, &[1]),
                    make(Pop, &[]),
                ],
            ),
            (
                "if (true) { 10 } else { 20 }; 3333;",
                vec![I(10), I(20), I(3333)],
                vec![
                    make(True, &[]),
                    make(JumpNotTrue, &[10]),
                    make(Constant, &[0]),
                    make(Jump, &[13]),
                    make(Constant, &[1]),
                    make(Pop, &[]),
                    make(Constant, &[2]),
                    make(Pop, &[]),
                ],
            ),
            (
                "if true { let a = 1; }",
                vec![I(1)],
                vec![
                    make(True, &[]),
                    make(JumpNotTrue, &[14]),
                    make(Constant, &[0]),
                    make(SetGlobal, &[0]),
                    make(Void, &[]),
                    make(Jump, &[15]),
                    make(Void, &[]),
                    make(Pop, &[]),
                ],
            ),
        ])
    }

    #[test]
    fn test_for_loop_layout() -> Result<()> {
        run_compiler_tests(vec![(
            "for (false) { 1 }",
            vec![Expected::Integer(1)],
            vec![
                make(False, &[]),
                make(JumpNotTrue, &[15]),
                make(Constant, &[0]),
                make(False, &[]),
                make(JumpNotTrue, &[16]),
                make(Pop, &[]),
                make(Jump, &[4]),
                make(Void, &[]),
                make(Pop, &[]),
            ],
        )])
    }

    #[test]
    fn test_global_statements() -> Result<()> {
        use Expected::Integer as I;
        run_compiler_tests(vec![
            (
                "let one = 1; let two = 2;",
                vec![I(1), I(2)],
                vec![make(Constant, &[0]), make(SetGlobal, &[0]), make(Constant, &[1]), make(SetGlobal, &[1])],
            ),
            (
                "let one = 1; one;",
                vec![I(1)],
                vec![make(Constant, &[0]), make(SetGlobal, &[0]), make(GetGlobal, &[0]), make(Pop, &[])],
            ),
            (
                "let one = 1; let two = one; two;",
                vec![I(1)],
                vec![
                    make(Constant, &[0]),
                    make(SetGlobal, &[0]),
                    make(GetGlobal, &[0]),
                    make(SetGlobal, &[1]),
                    make(GetGlobal, &[1]),
                    make(Pop, &[]),
                ],
            ),
            (
                "let mut x = 1; x = 2; x += 3;",
                vec![I(1), I(2), I(3)],
                vec![
                    make(Constant, &[0]),
                    make(SetGlobal, &[0]),
                    make(Constant, &[1]),
                    make(SetGlobal, &[0]),
                    make(GetGlobal, &[0]),
                    make(Constant, &[2]),
                    make(Add, &[]),
                    make(SetGlobal, &[0]),
                ],
            ),
        ])
    }

    #[test]
    fn test_collections() -> Result<()> {
        use Expected::Integer as I;
        run_compiler_tests(vec![
            ("[]", vec![], vec![make(Array, &[0]), make(Pop, &[])]),
            (
                "[1, 2, 3]",
                vec![I(1), I(2), I(3)],
                vec![make(Constant, &[0]), make(Constant, &[1]), make(Constant, &[2]), make(Array, &[3]), make(Pop, &[])],
            ),
            ("{}", vec![], vec![make(Hash, &[0]), make(Pop, &[])]),
            (
                "{2: 3, 1: 2}",
                vec![I(1), I(2), I(2), I(3)],
                vec![
                    make(Constant, &[0]),
                    make(Constant, &[1]),
                    make(Constant, &[2]),
                    make(Constant, &[3]),
                    make(Hash, &[4]),
                    make(Pop, &[]),
                ],
            ),
            (
                "[1, 2][0]",
                vec![I(1), I(2), I(0)],
                vec![
                    make(Constant, &[0]),
                    make(Constant, &[1]),
                    make(Array, &[2]),
                    make(Constant, &[2]),
                    make(Index, &[]),
                    make(Pop, &[]),
                ],
            ),
        ])
    }

    #[test]
    fn test_functions() -> Result<()> {
        use Expected::{Function as F, Integer as I};
        run_compiler_tests(vec![
            (
                "fun() int { return 5 + 10 }",
                vec![I(5), I(10), F(vec![make(Constant, &[0]), make(Constant, &[1]), make(Add, &[]), make(ReturnValue, &[])])],
                vec![make(Closure, &[2, 0]), make(Pop, &[])],
            ),
            (
                "fun() int { 5 + 10 }",
                vec![I(5), I(10), F(vec![make(Constant, &[0]), make(Constant, &[1]), make(Add, &[]), make(ReturnValue, &[])])],
                vec![make(Closure, &[2, 0]), make(Pop, &[])],
            ),
            (
                "fun() int { 1; 2 }",
                vec![I(1), I(2), F(vec![make(Constant, &[0]), make(Pop, &[]), make(Constant, &[1]), make(ReturnValue, &[])])],
                vec![make(Closure, &[2, 0]), make(Pop, &[])],
            ),
            (
                "fun() { }",
                vec![F(vec![make(Return, &[])])],
                vec![make(Closure, &[0, 0]), make(Pop, &[])],
            ),
            (
                "fun() { return }",
                vec![F(vec![make(Return, &[])])],
                vec![make(Closure, &[0, 0]), make(Pop, &[])],
            ),
            (
                "fun() int { let num = 55; num }",
                vec![I(55), F(vec![make(Constant, &[0]), make(SetLocal, &[0]), make(GetLocal, &[0]), make(ReturnValue, &[])])],
                vec![make(Closure, &[1, 0]), make(Pop, &[])],
            ),
        ])
    }

    #[test]
    fn test_function_calls() -> Result<()> {
        use Expected::{Function as F, Integer as I};
        run_compiler_tests(vec![
            (
                "fun() int { 24 }();",
                vec![I(24), F(vec![make(Constant, &[0]), make(ReturnValue, &[])])],
                vec![make(Closure, &[1, 0]), make(Call, &[0]), make(Pop, &[])],
            ),
            (
                "let noArg = fun() int { 24 }; noArg();",
                vec![I(24), F(vec![make(Constant, &[0]), make(ReturnValue, &[])])],
                vec![make(Closure, &[1, 0]), make(SetGlobal, &[0]), make(GetGlobal, &[0]), make(Call, &[0]), make(Pop, &[])],
            ),
            (
                "fun oneArg(a int) int { a } oneArg(24);",
                vec![F(vec![make(GetLocal, &[0]), make(ReturnValue, &[])]), I(24)],
                vec![
                    make(Closure, &[0, 0]),
                    make(SetGlobal, &[0]),
                    make(GetGlobal, &[0]),
                    make(Constant, &[1]),
                    make(Call, &[1]),
                    make(Pop, &[]),
                ],
            ),
            (
                "let f = fun(x int) int { f(x) }",
                vec![F(vec![make(GetGlobal, &[0]), make(GetLocal, &[0]), make(Call, &[1]), make(ReturnValue, &[])])],
                vec![make(Closure, &[0, 0]), make(SetGlobal, &[0])],
            ),
            (
                "len([]); push([], 1);",
                vec![I(1)],
                vec![
                    make(GetBuiltin, &[1]),
                    make(Array, &[0]),
                    make(Call, &[1]),
                    make(Pop, &[]),
                    make(GetBuiltin, &[5]),
                    make(Array, &[0]),
                    make(Constant, &[0]),
                    make(Call, &[2]),
                    make(Pop, &[]),
                ],
            ),
        ])
    }

    #[test]
    fn test_closures() -> Result<()> {
        use Expected::Function as F;
        run_compiler_tests(vec![
            (
                "fun(a int) fn { fun(b int) int { a + b } }",
                vec![
                    F(vec![make(GetFree, &[0]), make(GetLocal, &[0]), make(Add, &[]), make(ReturnValue, &[])]),
                    F(vec![make(GetLocal, &[0]), make(Closure, &[0, 1]), make(ReturnValue, &[])]),
                ],
                vec![make(Closure, &[1, 0]), make(Pop, &[])],
            ),
            (
                "fun(a int) fn { fun(b int) fn { fun(c int) int { a + b + c } } }",
                vec![
                    F(vec![
                        make(GetFree, &[0]),
                        make(GetFree, &[1]),
                        make(Add, &[]),
                        make(GetLocal, &[0]),
                        make(Add, &[]),
                        make(ReturnValue, &[]),
                    ]),
                    F(vec![make(GetFree, &[0]), make(GetLocal, &[0]), make(Closure, &[0, 2]), make(ReturnValue, &[])]),
                    F(vec![make(GetLocal, &[0]), make(Closure, &[1, 1]), make(ReturnValue, &[])]),
                ],
                vec![make(Closure, &[2, 0]), make(Pop, &[])],
            ),
            (
                "fun() fn { let mut n = 0; fun() int { n += 1; n } }",
                vec![
                    Expected::Integer(0),
                    Expected::Integer(1),
                    F(vec![
                        make(GetFree, &[0]),
                        make(Constant, &[1]),
                        make(Add, &[]),
                        make(SetFree, &[0]),
                        make(GetFree, &[0]),
                        make(ReturnValue, &[]),
                    ]),
                    F(vec![
                        make(Constant, &[0]),
                        make(SetLocal, &[0]),
                        make(GetLocal, &[0]),
                        make(Closure, &[2, 1]),
                        make(ReturnValue, &[]),
                    ]),
                ],
                vec![make(Closure, &[3, 0]), make(Pop, &[])],
            ),
        ])
    }

    #[test]
    fn test_compile_errors() -> Result<()> {
        let tests = [
            ("x", "Error at 1:1: undefined variable x"),
            ("fun() { y }", "Error at 1:9: undefined variable y"),
            ("let a = 1; let a = 2;", "Error at 1:12: a is already defined in this scope"),
            ("fun(a int, a int) { }", "Error at 1:12: a is already defined in this scope"),
            ("let a = 1; a = 2;", "Error at 1:12: cannot assign to immutable variable a"),
            ("len = 1", "Error at 1:1: cannot assign to immutable variable len"),
            ("b += 1", "Error at 1:1: undefined variable b"),
            ("break", "Error at 1:1: break is not supported in compiled code"),
            ("return 1", "Error at 1:1: return is only allowed inside a function"),
            ("fun() int { }", "Error at 1:1: function must return a value of type int"),
            ("fun f() str { return }", "Error at 1:1: function must return a value of type str"),
        ];

        for (input, expected) in tests {
            match compile(input) {
                Ok(_) => bail!("Expected a compile error for input: {}", input),
                Err(error) => assert_eq!(error.to_string(), expected, "Failed for input: {}", input),
            }
        }
        Ok(())
    }

    #[test]
    fn test_state_is_resumable() -> Result<()> {
        let mut compiler = Compiler::new();
        let tokens = Lexer::new("let a = 1;").tokenize()?;
        compiler.compile(&Parser::new(&tokens).parse()?)?;
        let constants = compiler.bytecode().constants;

        let mut compiler = Compiler::with_state(compiler.into_symbol_table(), constants);
        let tokens = Lexer::new("a + 2").tokenize()?;
        compiler.compile(&Parser::new(&tokens).parse()?)?;

        let bytecode = compiler.bytecode();
        assert_eq!(
            bytecode.instructions,
            Instructions::concat(&[make(GetGlobal, &[0]), make(Constant, &[1]), make(Add, &[]), make(Pop, &[])])
        );
        assert_eq!(bytecode.constants, vec![Value::Integer(1), Value::Integer(2)]);
        Ok(())
    }
}
