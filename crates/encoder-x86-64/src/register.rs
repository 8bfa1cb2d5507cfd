// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::{fmt::Display, str::FromStr};

use crate::error::EncodeError;

/* *
 * The eight low general-purpose registers, by every width-specific name.
 *
 * All names of one row are the same physical register and share the
 * 3-bit code used in ModRM.reg and ModRM.r/m:
 *
 * | Code | 64-bit | 32-bit | 16-bit | 8-bit |
 * | ---  | ---    | ---    | ---    | ---   |
 * | 000  | RAX    | EAX    | AX     | AL    |
 * | 001  | RCX    | ECX    | CX     | CL    |
 * | 010  | RDX    | EDX    | DX     | DL    |
 * | 011  | RBX    | EBX    | BX     | BL    |
 * | 100  | RSP    | ESP    | SP     | SPL   |
 * | 101  | RBP    | EBP    | BP     | BPL   |
 * | 110  | RSI    | ESI    | SI     | SIL   |
 * | 111  | RDI    | EDI    | DI     | DIL   |
 *
 * R8-R15 need REX.R/REX.B to reach the fourth bit of the register number,
 * the encoder only emits REX.W, so they are not listed.
 *
 * AH, CH, DH and BH share codes 100-111 with SPL..DIL, but they are
 * unreachable once any REX prefix is present, and every supported form
 * carries REX.W.
 *
 * See:
 * - Volume 1, Section 3.4.1.1 General-Purpose Registers in 64-Bit Mode
 * - Volume 2, Table 2-2. 32-Bit Addressing Forms with the ModR/M Byte
 */
#[rustfmt::skip]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Register {
    RAX, EAX, AX, AL,
    RCX, ECX, CX, CL,
    RDX, EDX, DX, DL,
    RBX, EBX, BX, BL,
    RSP, ESP, SP, SPL,
    RBP, EBP, BP, BPL,
    RSI, ESI, SI, SIL,
    RDI, EDI, DI, DIL,
}

#[rustfmt::skip]
const REGISTER_TABLE: [(Register, &str, u8); 32] = [
    (Register::RAX, "rax", 0), (Register::EAX, "eax", 0), (Register::AX, "ax", 0), (Register::AL, "al", 0),
    (Register::RCX, "rcx", 1), (Register::ECX, "ecx", 1), (Register::CX, "cx", 1), (Register::CL, "cl", 1),
    (Register::RDX, "rdx", 2), (Register::EDX, "edx", 2), (Register::DX, "dx", 2), (Register::DL, "dl", 2),
    (Register::RBX, "rbx", 3), (Register::EBX, "ebx", 3), (Register::BX, "bx", 3), (Register::BL, "bl", 3),
    (Register::RSP, "rsp", 4), (Register::ESP, "esp", 4), (Register::SP, "sp", 4), (Register::SPL, "spl", 4),
    (Register::RBP, "rbp", 5), (Register::EBP, "ebp", 5), (Register::BP, "bp", 5), (Register::BPL, "bpl", 5),
    (Register::RSI, "rsi", 6), (Register::ESI, "esi", 6), (Register::SI, "si", 6), (Register::SIL, "sil", 6),
    (Register::RDI, "rdi", 7), (Register::EDI, "edi", 7), (Register::DI, "di", 7), (Register::DIL, "dil", 7),
];

impl Register {
    /// All registers, in table order.
    pub fn all() -> impl Iterator<Item = Register> {
        REGISTER_TABLE.iter().map(|(register, _, _)| *register)
    }

    fn entry(&self) -> &'static (Register, &'static str, u8) {
        // the table is in declaration order
        &REGISTER_TABLE[*self as usize]
    }

    /// The lower-case assembly name, e.g. "rax".
    pub fn name(&self) -> &'static str {
        self.entry().1
    }

    /// The 3-bit register number used in ModRM.reg and ModRM.r/m.
    pub fn code(&self) -> u8 {
        self.entry().2
    }

    /// Whether this is a 64-bit register name ("r" prefixed).
    ///
    /// Every supported instruction form is gated on this predicate.
    pub fn is_r64(&self) -> bool {
        self.name().starts_with('r')
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        REGISTER_TABLE
            .iter()
            .find(|(_, table_name, _)| *table_name == name)
            .map(|(register, _, _)| *register)
            .ok_or_else(|| EncodeError::UnknownRegister(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::EncodeError;

    use super::Register;

    #[test]
    fn test_register_code() {
        assert_eq!(Register::RAX.code(), 0);
        assert_eq!(Register::ECX.code(), 1);
        assert_eq!(Register::DX.code(), 2);
        assert_eq!(Register::BL.code(), 3);
        assert_eq!(Register::RSP.code(), 4);
        assert_eq!(Register::BPL.code(), 5);
        assert_eq!(Register::ESI.code(), 6);
        assert_eq!(Register::DIL.code(), 7);

        // every width of a physical register shares the code
        for row in [
            [Register::RAX, Register::EAX, Register::AX, Register::AL],
            [Register::RBP, Register::EBP, Register::BP, Register::BPL],
            [Register::RDI, Register::EDI, Register::DI, Register::DIL],
        ] {
            assert!(row.iter().all(|r| r.code() == row[0].code()));
        }
    }

    #[test]
    fn test_register_table_order() {
        // `entry()` indexes the table by discriminant
        for (index, register) in Register::all().enumerate() {
            assert_eq!(register as usize, index);
        }
        assert_eq!(Register::all().count(), 32);
    }

    #[test]
    fn test_register_is_r64() {
        let r64: Vec<Register> = Register::all().filter(|r| r.is_r64()).collect();
        assert_eq!(
            r64,
            vec![
                Register::RAX,
                Register::RCX,
                Register::RDX,
                Register::RBX,
                Register::RSP,
                Register::RBP,
                Register::RSI,
                Register::RDI,
            ]
        );

        assert!(!Register::EAX.is_r64());
        assert!(!Register::SIL.is_r64());
    }

    #[test]
    fn test_register_from_str() {
        assert_eq!("rax".parse::<Register>(), Ok(Register::RAX));
        assert_eq!("EBX".parse::<Register>(), Ok(Register::EBX));
        assert_eq!(" dil ".parse::<Register>(), Ok(Register::DIL));

        for register in Register::all() {
            assert_eq!(register.name().parse::<Register>(), Ok(register));
            assert_eq!(register.to_string(), register.name());
        }

        assert_eq!(
            "r8".parse::<Register>(),
            Err(EncodeError::UnknownRegister("r8".to_owned()))
        );
        assert_eq!(
            "xmm0".parse::<Register>(),
            Err(EncodeError::UnknownRegister("xmm0".to_owned()))
        );
        assert_eq!(
            "ah".parse::<Register>(),
            Err(EncodeError::UnknownRegister("ah".to_owned()))
        );
    }
}
