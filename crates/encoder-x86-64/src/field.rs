// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::error::{EncodeError, Field};

/// REX prefix `0100WRXB`.
///
/// Only W (64-bit operand size) is emitted, R, X and B extend ModRM.reg,
/// SIB.index and ModRM.r/m to reach R8-R15, which are not supported.
pub const REX_BASE: u8 = 0b0100_0000;
pub const REX_W_BIT: u8 = 0b0000_1000;

/// `48`, 64-bit operand size, no register extension.
pub const REX_W: u8 = REX_BASE | REX_W_BIT;

/// ModRM.mod values.
///
/// | mod | r/m operand                               |
/// | --- | ---                                       |
/// | 00  | [base], no displacement                   |
/// | 01  | [base + disp8]                            |
/// | 10  | [base + disp32] (not implemented)         |
/// | 11  | register direct                           |
pub const MOD_INDIRECT: u8 = 0b00;
pub const MOD_INDIRECT_DISP8: u8 = 0b01;
pub const MOD_REGISTER: u8 = 0b11;

/// r/m = 100 with mod != 11 selects a SIB byte instead of RSP.
pub const RM_SIB: u8 = 0b100;

/// r/m = 101 with mod = 00 selects RIP + disp32 instead of RBP.
pub const RM_RIP_RELATIVE: u8 = 0b101;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ModRM {
    pub mode: u8,         // 2 bits
    pub register: u8,     // 3 bits, register or opcode extension
    pub reg_or_memory: u8, // 3 bits
}

impl ModRM {
    pub fn new(mode: u8, register: u8, reg_or_memory: u8) -> Self {
        Self {
            mode,
            register,
            reg_or_memory,
        }
    }

    pub fn encode(&self) -> Result<u8, EncodeError> {
        mod_rm(self.mode, self.register, self.reg_or_memory)
    }
}

/// Pack `mod:2 | reg:3 | rm:3` into one byte.
///
/// The fields are produced by the encoder itself, a value out of range
/// is an encoder bug, it is never masked.
pub fn mod_rm(mode: u8, reg: u8, rm: u8) -> Result<u8, EncodeError> {
    check_width(Field::Mod, mode)?;
    check_width(Field::Reg, reg)?;
    check_width(Field::Rm, rm)?;
    Ok((mode << 6) | (reg << 3) | rm)
}

fn check_width(field: Field, value: u8) -> Result<(), EncodeError> {
    if u64::from(value) > field.max() {
        return Err(EncodeError::InvalidField {
            field,
            value: i64::from(value),
        });
    }
    Ok(())
}

pub fn imm8(value: i64) -> Result<[u8; 1], EncodeError> {
    u8::try_from(value)
        .map(|byte| [byte])
        .map_err(|_| EncodeError::InvalidField {
            field: Field::Imm8,
            value,
        })
}

/// Little-endian, 4 bytes.
pub fn imm32(value: i64) -> Result<[u8; 4], EncodeError> {
    u32::try_from(value)
        .map(u32::to_le_bytes)
        .map_err(|_| EncodeError::InvalidField {
            field: Field::Imm32,
            value,
        })
}

pub fn disp8(value: i64) -> Result<[u8; 1], EncodeError> {
    u8::try_from(value)
        .map(|byte| [byte])
        .map_err(|_| EncodeError::InvalidField {
            field: Field::Disp8,
            value,
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use crate::error::{EncodeError, Field};

    use super::{REX_W, disp8, imm32, imm8, mod_rm};

    #[test]
    fn test_rex_w() {
        assert_eq!(REX_W, 0x48);
    }

    #[test]
    fn test_mod_rm() {
        // 11 000 000
        assert_eq!(mod_rm(0b11, 0, 0), Ok(0xc0));
        // 01 000 101
        assert_eq!(mod_rm(0b01, 0, 5), Ok(0x45));
        // 00 000 011
        assert_eq!(mod_rm(0b00, 0, 3), Ok(0x03));
        assert_eq!(mod_rm(0b11, 7, 7), Ok(0xff));

        assert_eq!(
            mod_rm(4, 0, 0),
            Err(EncodeError::InvalidField {
                field: Field::Mod,
                value: 4
            })
        );
        assert_eq!(
            mod_rm(0, 8, 0),
            Err(EncodeError::InvalidField {
                field: Field::Reg,
                value: 8
            })
        );
        assert_eq!(
            mod_rm(0, 0, 8),
            Err(EncodeError::InvalidField {
                field: Field::Rm,
                value: 8
            })
        );
    }

    #[test]
    fn test_imm8() {
        assert_eq!(imm8(0), Ok([0]));
        assert_eq!(imm8(5), Ok([5]));
        assert_eq!(imm8(255), Ok([0xff]));
        assert_eq!(
            imm8(256),
            Err(EncodeError::InvalidField {
                field: Field::Imm8,
                value: 256
            })
        );
        assert_eq!(
            imm8(-1),
            Err(EncodeError::InvalidField {
                field: Field::Imm8,
                value: -1
            })
        );
    }

    #[test]
    fn test_imm32() {
        assert_eq!(imm32(0x12345678), Ok([0x78, 0x56, 0x34, 0x12]));
        assert_eq!(imm32(0xffff_ffff), Ok([0xff, 0xff, 0xff, 0xff]));
        assert_eq!(imm32(0), Ok([0, 0, 0, 0]));
        assert_eq!(
            imm32(0x1_0000_0000),
            Err(EncodeError::InvalidField {
                field: Field::Imm32,
                value: 0x1_0000_0000
            })
        );
        assert_eq!(
            imm32(-1),
            Err(EncodeError::InvalidField {
                field: Field::Imm32,
                value: -1
            })
        );
    }

    #[test]
    fn test_disp8() {
        assert_eq!(disp8(16), Ok([0x10]));
        assert_eq!(disp8(255), Ok([0xff]));
        assert!(disp8(256).is_err());
        assert!(disp8(-8).is_err());
    }

    proptest! {
        #[test]
        fn prop_mod_rm_fields_roundtrip(mode in 0u8..4, reg in 0u8..8, rm in 0u8..8) {
            let byte = mod_rm(mode, reg, rm).unwrap();
            prop_assert_eq!(byte >> 6, mode);
            prop_assert_eq!((byte >> 3) & 0b111, reg);
            prop_assert_eq!(byte & 0b111, rm);
        }

        #[test]
        fn prop_imm8_accepts_exactly_one_byte(value in -1024i64..1024) {
            prop_assert_eq!(imm8(value).is_ok(), (0..=255).contains(&value));
        }

        #[test]
        fn prop_imm32_is_little_endian(value in 0u32..=u32::MAX) {
            let bytes = imm32(i64::from(value)).unwrap();
            prop_assert_eq!(u32::from_le_bytes(bytes), value);
        }

        #[test]
        fn prop_imm32_rejects_wide_values(value in (u32::MAX as i64 + 1)..i64::MAX) {
            prop_assert!(imm32(value).is_err());
        }
    }
}
