use crate::RuntimeError;
use std::fmt::{self, Display, Formatter};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Constant,
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    True,
    False,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Minus,
    Bang,
    JumpNotTrue,
    Jump,
    Void,
    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    GetFree,
    SetFree,
    GetBuiltin,
    Array,
    Hash,
    Index,
    Call,
    ReturnValue,
    Return,
    Closure,
}

// Indexed by discriminant.
const OPCODES: [Opcode; 31] = [
    Opcode::Constant,
    Opcode::Pop,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::True,
    Opcode::False,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterThan,
    Opcode::GreaterThanOrEqual,
    Opcode::Minus,
    Opcode::Bang,
    Opcode::JumpNotTrue,
    Opcode::Jump,
    Opcode::Void,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::GetLocal,
    Opcode::SetLocal,
    Opcode::GetFree,
    Opcode::SetFree,
    Opcode::GetBuiltin,
    Opcode::Array,
    Opcode::Hash,
    Opcode::Index,
    Opcode::Call,
    Opcode::ReturnValue,
    Opcode::Return,
    Opcode::Closure,
];

impl Opcode {
    /// Width in bytes of each operand, big-endian on the wire.
    pub fn operand_widths(&self) -> &'static [usize] {
        match self {
            Self::Constant
            | Self::JumpNotTrue
            | Self::Jump
            | Self::GetGlobal
            | Self::SetGlobal
            | Self::Array
            | Self::Hash => &[2],
            Self::GetLocal
            | Self::SetLocal
            | Self::GetFree
            | Self::SetFree
            | Self::GetBuiltin
            | Self::Call => &[1],
            Self::Closure => &[2, 1],
            _ => &[],
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = RuntimeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OPCODES
            .get(byte as usize)
            .copied()
            .ok_or(RuntimeError::UnknownOpcode(byte))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<usize>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<usize>) -> Self {
        Self { opcode, operands }
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let operands: Vec<u8> = self
            .operands
            .iter()
            .zip(self.opcode.operand_widths())
            .flat_map(|(operand, width)| match width {
                2 => (*operand as u16).to_be_bytes().to_vec(),
                _ => vec![*operand as u8],
            })
            .collect();
        [vec![self.opcode as u8], operands].concat()
    }

    /// Whether every operand is representable in its encoded width.
    pub fn fits(&self) -> bool {
        self.operands.len() == self.opcode.operand_widths().len()
            && self
                .operands
                .iter()
                .zip(self.opcode.operand_widths())
                .all(|(operand, width)| *operand < 1usize << (8 * width))
    }

    /// Encoded length in bytes.
    pub fn width(&self) -> usize {
        1 + self.opcode.operand_widths().iter().sum::<usize>()
    }

    /// Decodes the instruction starting at `offset`.
    pub fn read(bytes: &[u8], offset: usize) -> Result<Self, RuntimeError> {
        let byte = *bytes
            .get(offset)
            .ok_or(RuntimeError::MalformedInstruction(offset))?;
        let opcode = Opcode::try_from(byte)?;

        let mut operands = Vec::with_capacity(opcode.operand_widths().len());
        let mut position = offset + 1;
        for width in opcode.operand_widths() {
            let operand = read_operand(bytes, position, *width)
                .ok_or(RuntimeError::MalformedInstruction(offset))?;
            operands.push(operand);
            position += width;
        }

        Ok(Self { opcode, operands })
    }
}

/// Reads one big-endian operand of `width` bytes at `position`.
pub fn read_operand(bytes: &[u8], position: usize, width: usize) -> Option<usize> {
    bytes
        .get(position..position + width)
        .map(|bytes| bytes.iter().fold(0usize, |operand, byte| (operand << 8) | *byte as usize))
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Op{:?}", self.opcode)?;
        for operand in self.operands.iter() {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// A flat, encoded instruction stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instructions(pub Vec<u8>);

impl Instructions {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends an instruction and returns the offset it was written at.
    pub fn push(&mut self, instruction: &Instruction) -> usize {
        let position = self.0.len();
        self.0.extend(instruction.as_bytes());
        position
    }

    pub fn concat(instructions: &[Instruction]) -> Self {
        let mut result = Self::default();
        for instruction in instructions {
            result.push(instruction);
        }
        result
    }
}

impl Display for Instructions {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut lines = Vec::new();
        let mut offset = 0;
        while offset < self.0.len() {
            match Instruction::read(&self.0, offset) {
                Ok(instruction) => {
                    lines.push(format!("{:0>4} {}", offset, instruction));
                    offset += instruction.width();
                }
                Err(error) => {
                    lines.push(format!("ERROR: {}", error));
                    break;
                }
            }
        }
        write!(f, "{}", lines.join("\n"))
    }
}
