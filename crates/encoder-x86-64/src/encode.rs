// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use log::{debug, trace, warn};

use crate::{
    emit::{MemoryWriter, RawMemory},
    error::EncodeError,
    field::{
        self, MOD_INDIRECT, MOD_INDIRECT_DISP8, MOD_REGISTER, ModRM, REX_W, RM_RIP_RELATIVE,
        RM_SIB,
    },
    instruction::{Instruction, Operand},
    mnemonic::Mnemonic,
    register::Register,
};

/* *
 *
 * Instruction Format:
 * - REX: 0,1 byte (only REX.W is emitted)
 * - Opcode: 1 byte
 * - ModRM: 0,1 byte (Mod: 2-bit, Reg: 3-bit, R/M: 3-bit)
 * - Displacement: 0,1 byte (disp8)
 * - Immediate: 0,1,4 bytes (imm8, imm32)
 *
 * The order is fixed by the ISA, no legacy prefix and no SIB byte are
 * produced by this encoder.
 *
 * References:
 *
 * - Intel Software Developer's Manual
 *   Volume 2, Chapter 2.1 INSTRUCTION FORMAT FOR PROTECTED MODE, REAL-ADDRESS MODE, AND VIRTUAL-8086 MODE
 *   Volume 2, Section 2.2.1 REX Prefixes
 *   https://www.intel.com/content/www/us/en/developer/articles/technical/intel-sdm.html
 *
 * - x86 and amd64 instruction reference
 *   https://www.felixcloutier.com/x86/
 * - X86-64 Instruction Encoding (OSDev)
 *   https://wiki.osdev.org/X86-64_Instruction_Encoding
 *
 */

const OPCODE_ADD_RM64_IMM8: u8 = 0x83; // REX.W + 83 /0 ib
const OPCODE_MOV_RM64_IMM32: u8 = 0xc7; // REX.W + C7 /0 id
const OPCODE_MOV_RM64_R64: u8 = 0x89; // REX.W + 89 /r
const OPCODE_MOV_R64_RM64: u8 = 0x8b; // REX.W + 8B /r
const OPCODE_RET: u8 = 0xc3; // C3

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Immediate {
    Imm8(i64),
    Imm32(i64),
}

/// The canonical shape of one instruction before it becomes bytes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Insn {
    pub prefix: Option<u8>,
    pub opcode: u8,
    pub mod_rm: Option<ModRM>,
    pub disp: Option<i64>,
    pub imm: Option<Immediate>,
}

impl Insn {
    pub fn new(opcode: u8) -> Self {
        Self {
            prefix: None,
            opcode,
            mod_rm: None,
            disp: None,
            imm: None,
        }
    }

    pub fn with_prefix(mut self, prefix: u8) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn with_mod_rm(mut self, mode: u8, register: u8, reg_or_memory: u8) -> Self {
        self.mod_rm = Some(ModRM::new(mode, register, reg_or_memory));
        self
    }

    pub fn with_disp(mut self, disp: i64) -> Self {
        self.disp = Some(disp);
        self
    }

    pub fn with_imm(mut self, imm: Immediate) -> Self {
        self.imm = Some(imm);
        self
    }
}

/// Accumulates machine code until it is compiled into memory.
///
/// One encoder serves one compilation unit at a time:
/// call the mnemonic methods in program order, then `compile`
/// (or `compile_with`) to flush the bytes, the pending bytes are
/// cleared afterwards and the encoder can be reused.
#[derive(Debug, Default)]
pub struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pending (not yet compiled) bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encode(&mut self, instruction: &Instruction) -> Result<(), EncodeError> {
        match (instruction.mnemonic, instruction.operands.as_slice()) {
            (Mnemonic::Add, [dst, src]) => self.add(*dst, *src),
            (Mnemonic::Mov, [dst, src]) => self.mov(*dst, *src),
            (Mnemonic::Ret, []) => {
                self.ret();
                Ok(())
            }
            (mnemonic, operands) => Err(EncodeError::UnsupportedOperands {
                mnemonic,
                operands: operands.to_vec(),
            }),
        }
    }

    pub fn add(&mut self, dst: Operand, src: Operand) -> Result<(), EncodeError> {
        match (dst, src) {
            // ADD r/m64, imm8 (Mod 11: reg)
            (Operand::Register(dst_reg), Operand::Immediate(src_imm)) if dst_reg.is_r64() => self
                .insn(
                    Insn::new(OPCODE_ADD_RM64_IMM8)
                        .with_prefix(REX_W)
                        .with_mod_rm(MOD_REGISTER, 0, dst_reg.code())
                        .with_imm(Immediate::Imm8(src_imm)),
                ),
            (
                Operand::Register(_)
                | Operand::Indirect(_)
                | Operand::IndirectDisplacement(..)
                | Operand::Immediate(_),
                Operand::Register(_)
                | Operand::Indirect(_)
                | Operand::IndirectDisplacement(..)
                | Operand::Immediate(_),
            ) => Err(unsupported(Mnemonic::Add, dst, src)),
        }
    }

    pub fn mov(&mut self, dst: Operand, src: Operand) -> Result<(), EncodeError> {
        match (dst, src) {
            // MOV r/m64, imm32 (Mod 00: [reg])
            (Operand::Indirect(dst_reg), Operand::Immediate(src_imm))
                if dst_reg.is_r64() && is_plain_base(dst_reg, MOD_INDIRECT) =>
            {
                self.insn(
                    Insn::new(OPCODE_MOV_RM64_IMM32)
                        .with_prefix(REX_W)
                        .with_mod_rm(MOD_INDIRECT, 0, dst_reg.code())
                        .with_imm(Immediate::Imm32(src_imm)),
                )
            }
            // MOV r/m64, imm32 (Mod 11: reg)
            (Operand::Register(dst_reg), Operand::Immediate(src_imm)) if dst_reg.is_r64() => self
                .insn(
                    Insn::new(OPCODE_MOV_RM64_IMM32)
                        .with_prefix(REX_W)
                        .with_mod_rm(MOD_REGISTER, 0, dst_reg.code())
                        .with_imm(Immediate::Imm32(src_imm)),
                ),
            // MOV r/m64, r64 (Mod 01: [reg]+disp8)
            (Operand::IndirectDisplacement(dst_reg, dst_disp), Operand::Register(src_reg))
                if dst_reg.is_r64()
                    && src_reg.is_r64()
                    && is_plain_base(dst_reg, MOD_INDIRECT_DISP8) =>
            {
                self.insn(
                    Insn::new(OPCODE_MOV_RM64_R64)
                        .with_prefix(REX_W)
                        .with_mod_rm(MOD_INDIRECT_DISP8, src_reg.code(), dst_reg.code())
                        .with_disp(dst_disp),
                )
            }
            // MOV r64, r/m64 (Mod 00: [reg])
            (Operand::Register(dst_reg), Operand::Indirect(src_reg))
                if dst_reg.is_r64() && src_reg.is_r64() && is_plain_base(src_reg, MOD_INDIRECT) =>
            {
                self.insn(
                    Insn::new(OPCODE_MOV_R64_RM64)
                        .with_prefix(REX_W)
                        .with_mod_rm(MOD_INDIRECT, dst_reg.code(), src_reg.code()),
                )
            }
            // MOV r64, r/m64 (Mod 01: [reg]+disp8)
            (Operand::Register(dst_reg), Operand::IndirectDisplacement(src_reg, src_disp))
                if dst_reg.is_r64()
                    && src_reg.is_r64()
                    && is_plain_base(src_reg, MOD_INDIRECT_DISP8) =>
            {
                self.insn(
                    Insn::new(OPCODE_MOV_R64_RM64)
                        .with_prefix(REX_W)
                        .with_mod_rm(MOD_INDIRECT_DISP8, dst_reg.code(), src_reg.code())
                        .with_disp(src_disp),
                )
            }
            (
                Operand::Register(_)
                | Operand::Indirect(_)
                | Operand::IndirectDisplacement(..)
                | Operand::Immediate(_),
                Operand::Register(_)
                | Operand::Indirect(_)
                | Operand::IndirectDisplacement(..)
                | Operand::Immediate(_),
            ) => Err(unsupported(Mnemonic::Mov, dst, src)),
        }
    }

    pub fn ret(&mut self) {
        // a bare opcode has no field to validate
        self.bytes.push(OPCODE_RET);
        trace!("append [{:02x}]", OPCODE_RET);
    }

    /// Append one instruction in the order prefix, opcode, ModRM,
    /// displacement, immediate.
    ///
    /// All fields are checked before the first byte is appended,
    /// an error leaves the pending bytes as they were.
    pub fn insn(&mut self, insn: Insn) -> Result<(), EncodeError> {
        let mut bytes: Vec<u8> = Vec::with_capacity(8);

        if let Some(prefix) = insn.prefix {
            bytes.push(prefix);
        }

        bytes.push(insn.opcode);

        if let Some(mod_rm) = insn.mod_rm {
            bytes.push(mod_rm.encode()?);
        }

        if let Some(disp) = insn.disp {
            bytes.extend_from_slice(&field::disp8(disp)?);
        }

        match insn.imm {
            Some(Immediate::Imm8(value)) => bytes.extend_from_slice(&field::imm8(value)?),
            Some(Immediate::Imm32(value)) => bytes.extend_from_slice(&field::imm32(value)?),
            None => {}
        }

        trace!("append {:02x?}", bytes);
        self.bytes.extend_from_slice(&bytes);
        Ok(())
    }

    /// Write the pending bytes one by one to `address`, `address + 1`, ...
    /// and return the number of bytes written.
    ///
    /// The writer receives the start address and the offset of each byte,
    /// resolving (and range checking) the target address is up to it.
    /// The pending bytes are cleared whether the writer succeeds or not.
    pub fn compile_with<W: MemoryWriter>(
        &mut self,
        writer: &mut W,
        address: usize,
    ) -> Result<usize, W::Error> {
        let pending = PendingBytes(&mut self.bytes);
        let total = pending.0.len();

        for (offset, byte) in pending.0.iter().enumerate() {
            if let Err(error) = writer.write_byte(address, offset, *byte) {
                warn!(
                    "failed to write byte {} of {} at {:#x}, pending code discarded",
                    offset, total, address
                );
                return Err(error);
            }
        }

        debug!("compiled {} bytes at {:#x}", total, address);
        Ok(total)
    }

    /// Write the pending bytes into memory starting at `address`,
    /// returns the number of bytes written.
    ///
    /// # Safety
    ///
    /// `address` must point to at least `self.len()` writable bytes owned
    /// by the caller, e.g. a JIT code page that is not executing.
    pub unsafe fn compile(&mut self, address: usize) -> usize {
        let mut memory = unsafe { RawMemory::new() };
        let Ok(written) = self.compile_with(&mut memory, address);
        written
    }
}

/// Clears the borrowed bytes when dropped, on every exit path.
struct PendingBytes<'a>(&'a mut Vec<u8>);

impl Drop for PendingBytes<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// Whether `base` is reachable by ModRM.r/m alone under `mode`.
///
/// - r/m = 100 (RSP) means "SIB byte follows" for mod 00/01/10.
/// - r/m = 101 (RBP) means RIP + disp32 for mod 00.
fn is_plain_base(base: Register, mode: u8) -> bool {
    match base.code() {
        RM_SIB => false,
        RM_RIP_RELATIVE => mode != MOD_INDIRECT,
        _ => true,
    }
}

fn unsupported(mnemonic: Mnemonic, dst: Operand, src: Operand) -> EncodeError {
    EncodeError::UnsupportedOperands {
        mnemonic,
        operands: vec![dst, src],
    }
}
