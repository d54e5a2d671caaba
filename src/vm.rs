use crate::{
    read_operand, Bytecode, Closure, CompiledFunction, Opcode, RuntimeError, Value, BUILTINS,
};
use std::{collections::BTreeMap, mem, rc::Rc};
use tracing::{debug, trace};

pub const GLOBALS_SIZE: usize = 65536;

/// Resource bounds fixed when the machine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub stack_size: usize,
    pub max_frames: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            stack_size: 2048,
            max_frames: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }
}

pub struct VirtualMachine {
    pub constants: Vec<Value>,
    pub stack: Vec<Value>,
    pub stack_pointer: usize,
    pub globals: Vec<Value>,
    pub limits: Limits,
    frame: Frame,
    callers: Vec<Frame>,
}

impl VirtualMachine {
    pub fn new(bytecode: Bytecode) -> Self {
        let main_function = CompiledFunction {
            instructions: bytecode.instructions,
            ..Default::default()
        };
        let main_closure = Rc::new(Closure::new(Rc::new(main_function), Vec::new()));
        let limits = Limits::default();

        Self {
            constants: bytecode.constants,
            stack: Vec::with_capacity(limits.stack_size),
            stack_pointer: 0,
            globals: vec![Value::Void; GLOBALS_SIZE],
            limits,
            frame: Frame::new(main_closure, 0),
            callers: Vec::new(),
        }
    }

    /// Continues from the globals left behind by an earlier run.
    pub fn with_globals(mut self, mut globals: Vec<Value>) -> Self {
        globals.resize(GLOBALS_SIZE, Value::Void);
        self.globals = globals;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The value most recently removed from the top of the stack.
    pub fn last_popped(&self) -> Value {
        self.stack
            .get(self.stack_pointer)
            .cloned()
            .unwrap_or_default()
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let ip = self.frame.ip;
            let (opcode, operands) = {
                let bytes = &self.frame.closure.function.instructions.0;
                let Some(&byte) = bytes.get(ip) else {
                    if self.callers.is_empty() {
                        break;
                    }
                    self.return_from_frame(Value::Void)?;
                    continue;
                };
                let opcode = Opcode::try_from(byte)?;

                let mut operands = [0; 2];
                let mut position = ip + 1;
                for (operand, width) in operands.iter_mut().zip(opcode.operand_widths()) {
                    *operand = read_operand(bytes, position, *width)
                        .ok_or(RuntimeError::MalformedInstruction(ip))?;
                    position += width;
                }
                self.frame.ip = position;
                (opcode, operands)
            };
            trace!(ip, sp = self.stack_pointer, ?opcode, ?operands, "dispatch");

            let [operand, second_operand] = operands;
            match opcode {
                Opcode::Constant => {
                    let constant = self
                        .constants
                        .get(operand)
                        .cloned()
                        .ok_or(RuntimeError::UndefinedConstant(operand))?;
                    self.push(constant)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(opcode)?
                }
                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,
                Opcode::Void => self.push(Value::Void)?,
                Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan
                | Opcode::GreaterThanOrEqual => self.execute_comparison(opcode)?,
                Opcode::Minus => {
                    let value = match self.pop()? {
                        Value::Integer(value) => Value::Integer(value.wrapping_neg()),
                        Value::Float(value) => Value::Float(-value),
                        other => {
                            return Err(RuntimeError::UnsupportedOperand {
                                operator: "-",
                                operand: other.type_name(),
                            })
                        }
                    };
                    self.push(value)?;
                }
                Opcode::Bang => {
                    let value = match self.pop()? {
                        Value::Boolean(value) => Value::Boolean(!value),
                        other => {
                            return Err(RuntimeError::UnsupportedOperand {
                                operator: "!",
                                operand: other.type_name(),
                            })
                        }
                    };
                    self.push(value)?;
                }
                Opcode::JumpNotTrue => match self.pop()? {
                    Value::Boolean(true) => {}
                    Value::Boolean(false) => self.frame.ip = operand,
                    other => return Err(RuntimeError::NonBooleanCondition(other.type_name())),
                },
                Opcode::Jump => self.frame.ip = operand,
                Opcode::GetGlobal => {
                    let value = self.globals[operand].clone();
                    self.push(value)?;
                }
                Opcode::SetGlobal => {
                    self.globals[operand] = self.pop()?;
                }
                Opcode::GetLocal => {
                    let slot = self.local_slot(operand)?;
                    let value = self.stack[slot].clone();
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let slot = self.local_slot(operand)?;
                    let value = self.pop()?;
                    self.stack[slot] = value;
                }
                Opcode::GetFree => {
                    let value = self
                        .frame
                        .closure
                        .free
                        .borrow()
                        .get(operand)
                        .cloned()
                        .ok_or(RuntimeError::UndefinedFree(operand))?;
                    self.push(value)?;
                }
                Opcode::SetFree => {
                    let value = self.pop()?;
                    match self.frame.closure.free.borrow_mut().get_mut(operand) {
                        Some(slot) => *slot = value,
                        None => return Err(RuntimeError::UndefinedFree(operand)),
                    }
                }
                Opcode::GetBuiltin => {
                    if operand >= BUILTINS.len() {
                        return Err(RuntimeError::UnknownBuiltin(operand));
                    }
                    self.push(Value::Builtin(operand))?;
                }
                Opcode::Array => {
                    let elements = self.pop_many(operand)?;
                    self.push(Value::from(elements))?;
                }
                Opcode::Hash => {
                    let values = self.pop_many(operand)?;
                    let mut pairs = BTreeMap::new();
                    for pair in values.chunks(2) {
                        if let [key, value] = pair {
                            pairs.insert(key.hash_key()?, value.clone());
                        }
                    }
                    self.push(Value::Hash(Rc::new(pairs)))?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index_expression(left, index)?;
                }
                Opcode::Call => self.execute_call(operand)?,
                Opcode::ReturnValue => {
                    let value = self.pop()?;
                    self.return_from_frame(value)?;
                }
                Opcode::Return => self.return_from_frame(Value::Void)?,
                Opcode::Closure => {
                    self.push_closure(operand, second_operand)?;
                }
            }
        }
        Ok(())
    }

    /// Stack index of local `index` in the current frame.
    fn local_slot(&self, index: usize) -> Result<usize, RuntimeError> {
        let slot = self.frame.base_pointer + index;
        if index >= self.frame.closure.function.num_locals || slot >= self.stack.len() {
            return Err(RuntimeError::UndefinedLocal(index));
        }
        Ok(slot)
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack_pointer >= self.limits.stack_size {
            return Err(RuntimeError::StackOverflow);
        }
        if self.stack_pointer >= self.stack.len() {
            self.stack.push(value);
        } else {
            self.stack[self.stack_pointer] = value;
        }
        self.stack_pointer += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.stack_pointer == 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.stack_pointer -= 1;
        Ok(self.stack[self.stack_pointer].clone())
    }

    /// Removes the top `count` values, preserving their push order.
    fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if count > self.stack_pointer {
            return Err(RuntimeError::StackUnderflow);
        }
        let start = self.stack_pointer - count;
        let values = self.stack[start..self.stack_pointer].to_vec();
        self.stack_pointer = start;
        Ok(values)
    }

    fn execute_binary_operation(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (&left, &right) {
            (Value::Integer(left), Value::Integer(right)) => match opcode {
                Opcode::Add => Value::Integer(left.wrapping_add(*right)),
                Opcode::Sub => Value::Integer(left.wrapping_sub(*right)),
                Opcode::Mul => Value::Integer(left.wrapping_mul(*right)),
                _ => Value::Float(*left as f64 / *right as f64),
            },
            (Value::String(left), Value::String(right)) if opcode == Opcode::Add => {
                Value::String(Rc::from(format!("{}{}", left, right)))
            }
            _ => match (left.as_number(), right.as_number()) {
                (Some(left), Some(right)) => Value::Float(match opcode {
                    Opcode::Add => left + right,
                    Opcode::Sub => left - right,
                    Opcode::Mul => left * right,
                    _ => left / right,
                }),
                _ => {
                    return Err(RuntimeError::UnsupportedOperands {
                        operator: operator_symbol(opcode),
                        left: left.type_name(),
                        right: right.type_name(),
                    })
                }
            },
        };
        self.push(result)
    }

    fn execute_comparison(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (&left, &right) {
            (Value::Integer(left), Value::Integer(right)) => match opcode {
                Opcode::Equal => left == right,
                Opcode::NotEqual => left != right,
                Opcode::GreaterThan => left > right,
                _ => left >= right,
            },
            _ => match (left.as_number(), right.as_number(), opcode) {
                (Some(left), Some(right), Opcode::Equal) => left == right,
                (Some(left), Some(right), Opcode::NotEqual) => left != right,
                (Some(left), Some(right), Opcode::GreaterThan) => left > right,
                (Some(left), Some(right), _) => left >= right,
                (_, _, Opcode::Equal) => left == right,
                (_, _, Opcode::NotEqual) => left != right,
                _ => {
                    return Err(RuntimeError::UnsupportedOperands {
                        operator: operator_symbol(opcode),
                        left: left.type_name(),
                        right: right.type_name(),
                    })
                }
            },
        };
        self.push(Value::Boolean(result))
    }

    fn execute_index_expression(&mut self, left: Value, index: Value) -> Result<(), RuntimeError> {
        let value = match (&left, &index) {
            (Value::Array(elements), Value::Integer(index)) => usize::try_from(*index)
                .ok()
                .and_then(|index| elements.get(index))
                .cloned()
                .unwrap_or_default(),
            (Value::Hash(pairs), key) => pairs.get(&key.hash_key()?).cloned().unwrap_or_default(),
            _ => {
                return Err(RuntimeError::IndexNotSupported {
                    left: left.type_name(),
                    index: index.type_name(),
                })
            }
        };
        self.push(value)
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), RuntimeError> {
        if num_args >= self.stack_pointer {
            return Err(RuntimeError::StackUnderflow);
        }
        let callee = self.stack[self.stack_pointer - 1 - num_args].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(index) => self.call_builtin(index, num_args),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> Result<(), RuntimeError> {
        let function = closure.function.clone();
        if num_args != function.num_parameters {
            return Err(RuntimeError::WrongArgumentCount {
                want: function.num_parameters,
                got: num_args,
            });
        }

        let base_pointer = self.stack_pointer - num_args;
        let arguments = &self.stack[base_pointer..self.stack_pointer];
        for (index, (expected, argument)) in function
            .parameter_types
            .iter()
            .zip(arguments.iter())
            .enumerate()
        {
            if !expected.accepts(argument) {
                return Err(RuntimeError::ArgumentTypeMismatch {
                    index: index + 1,
                    expected: *expected,
                    actual: argument.type_name(),
                });
            }
        }

        let stack_pointer = base_pointer + function.num_locals;
        if stack_pointer > self.limits.stack_size {
            return Err(RuntimeError::StackOverflow);
        }
        self.push_frame(Frame::new(closure, base_pointer))?;

        // Locals not bound to a parameter start out void.
        for slot in self.stack_pointer..stack_pointer {
            if slot < self.stack.len() {
                self.stack[slot] = Value::Void;
            } else {
                self.stack.push(Value::Void);
            }
        }
        self.stack_pointer = stack_pointer;
        Ok(())
    }

    fn call_builtin(&mut self, index: usize, num_args: usize) -> Result<(), RuntimeError> {
        let builtin = BUILTINS
            .get(index)
            .ok_or(RuntimeError::UnknownBuiltin(index))?;
        let start = self.stack_pointer - num_args;
        let result = (builtin.function)(&self.stack[start..self.stack_pointer]);
        debug!(name = builtin.name, num_args, "called builtin");

        self.stack_pointer = start - 1;
        self.push(result.unwrap_or_default())
    }

    fn push_closure(&mut self, constant_index: usize, num_free: usize) -> Result<(), RuntimeError> {
        let function = match self.constants.get(constant_index) {
            Some(Value::Function(function)) => function.clone(),
            _ => return Err(RuntimeError::NotAFunction(constant_index)),
        };
        let free = self.pop_many(num_free)?;
        self.push(Value::Closure(Rc::new(Closure::new(function, free))))
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.callers.len() + 1 >= self.limits.max_frames {
            return Err(RuntimeError::FrameOverflow(self.limits.max_frames));
        }
        let caller = mem::replace(&mut self.frame, frame);
        self.callers.push(caller);
        debug!(
            depth = self.callers.len(),
            base_pointer = self.frame.base_pointer,
            "pushed frame"
        );
        Ok(())
    }

    /// Pops the current frame, replacing the callee and its arguments with `value`.
    fn return_from_frame(&mut self, value: Value) -> Result<(), RuntimeError> {
        let caller = self
            .callers
            .pop()
            .ok_or(RuntimeError::ReturnOutsideFunction)?;
        let frame = mem::replace(&mut self.frame, caller);
        debug!(depth = self.callers.len(), "popped frame");

        self.stack_pointer = frame.base_pointer.saturating_sub(1);
        self.push(value)
    }
}

fn operator_symbol(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        Opcode::GreaterThanOrEqual => ">=",
        _ => "?",
    }
}
