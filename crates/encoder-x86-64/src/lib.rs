// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

/* *
 * The limitations of this encoder:
 * - Only support ADD, MOV and RET
 * - Only support 64-bit (long) mode, every form carries REX.W
 * - Only support the legacy 64-bit registers (RAX..RDI),
 *   R8-R15 need REX.R/REX.B and are rejected
 * - Only support a subset of addressing modes:
 *   - register direct
 *   - [base]
 *   - [base + disp8]
 *   i.e. no SIB (index*scale), no disp32, no RIP-relative addressing,
 *   so RSP can not be a base and RBP needs a displacement.
 * - Immediates and displacements are range-checked as unsigned values,
 *   the CPU sign-extends them when the instruction executes,
 *   e.g. "add rax, 255" adds -1.
 */

pub mod emit;
pub mod encode;
pub mod error;
pub mod field;
pub mod instruction;
pub mod mnemonic;
pub mod parser;
pub mod register;

pub use emit::{CodeBuffer, MemoryWriter, RawMemory};
pub use encode::Encoder;
pub use error::{EmitError, EncodeError, ParseError};
pub use instruction::{Instruction, Operand};
pub use mnemonic::Mnemonic;
pub use register::Register;
