// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::Display;

use thiserror::Error;

use crate::{instruction::Operand, mnemonic::Mnemonic};

/// A fixed-width slot of the instruction format.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Field {
    /// ModRM.mod, 2 bits
    Mod,
    /// ModRM.reg, 3 bits
    Reg,
    /// ModRM.r/m, 3 bits
    Rm,
    Disp8,
    Imm8,
    Imm32,
}

impl Field {
    /// The largest value the field can hold.
    pub fn max(&self) -> u64 {
        match self {
            Field::Mod => 0b11,
            Field::Reg | Field::Rm => 0b111,
            Field::Disp8 | Field::Imm8 => u8::MAX as u64,
            Field::Imm32 => u32::MAX as u64,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Mod => "ModRM.mod",
            Field::Reg => "ModRM.reg",
            Field::Rm => "ModRM.r/m",
            Field::Disp8 => "disp8",
            Field::Imm8 => "imm8",
            Field::Imm32 => "imm32",
        };
        f.write_str(name)
    }
}

/// Errors raised while encoding instructions.
///
/// Both kinds indicate a bug in the code generator driving the encoder
/// (or a form the encoder does not implement yet), the current
/// compilation should be abandoned.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EncodeError {
    /// The operand combination matches none of the supported forms.
    #[error("unsupported operands: {mnemonic} {}", join_operands(.operands))]
    UnsupportedOperands {
        mnemonic: Mnemonic,
        operands: Vec<Operand>,
    },

    /// A value does not fit the bit width of its field.
    #[error("invalid {field} value {value}, expected 0..={max}", max = .field.max())]
    InvalidField { field: Field, value: i64 },

    #[error("unexpected register: {0:?}")]
    UnknownRegister(String),
}

fn join_operands(operands: &[Operand]) -> String {
    operands
        .iter()
        .map(|operand| operand.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("empty instruction")]
    Empty,

    #[error("unknown mnemonic: {0:?}")]
    UnknownMnemonic(String),

    #[error("unknown register: {0:?}")]
    UnknownRegister(String),

    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("invalid operand: {0:?}")]
    InvalidOperand(String),

    #[error("too many operands, expect at most {max}, actual: {actual}")]
    TooManyOperands { max: usize, actual: usize },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EmitError {
    #[error("address {address:#x} is outside the code buffer at {base:#x} ({len} bytes)")]
    OutOfBounds {
        address: usize,
        base: usize,
        len: usize,
    },

    #[error("address {address:#x} + {offset} is beyond the address space")]
    AddressOverflow { address: usize, offset: usize },
}
