// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::Display;

use crate::{mnemonic::Mnemonic, register::Register};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic, operands: Vec<Operand>) -> Self {
        Self { mnemonic, operands }
    }

    pub fn add(dst: Operand, src: Operand) -> Self {
        Self::new(Mnemonic::Add, vec![dst, src])
    }

    pub fn mov(dst: Operand, src: Operand) -> Self {
        Self::new(Mnemonic::Mov, vec![dst, src])
    }

    pub fn ret() -> Self {
        Self::new(Mnemonic::Ret, vec![])
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (index, operand) in self.operands.iter().enumerate() {
            let separator = if index == 0 { " " } else { ", " };
            write!(f, "{}{}", separator, operand)?;
        }
        Ok(())
    }
}

/// The operand shapes, each shape selects its own addressing mode.
///
/// Immediates and displacements are kept as written by the caller,
/// the encoder narrows them to the field width (with range checks)
/// only when an instruction is assembled.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operand {
    /// e.g. `rax`, ModRM.mod = 11
    Register(Register),

    /// e.g. `[rbx]`, ModRM.mod = 00
    Indirect(Register),

    /// e.g. `[rbp+16]`, ModRM.mod = 01 (disp8)
    IndirectDisplacement(Register, i64),

    /// e.g. `0x12345678`
    Immediate(i64),
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Register(register) => write!(f, "{}", register),
            Operand::Indirect(base) => write!(f, "[{}]", base),
            Operand::IndirectDisplacement(base, disp) if *disp < 0 => {
                write!(f, "[{}-{}]", base, disp.unsigned_abs())
            }
            Operand::IndirectDisplacement(base, disp) => write!(f, "[{}+{}]", base, disp),
            Operand::Immediate(value) => {
                // small numbers in decimal, others in hex
                if (0..10).contains(value) {
                    write!(f, "{}", value)
                } else if *value < 0 {
                    write!(f, "-{:#x}", value.unsigned_abs())
                } else {
                    write!(f, "{:#x}", value)
                }
            }
        }
    }
}
