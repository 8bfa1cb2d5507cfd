// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{
    error::ParseError,
    instruction::{Instruction, Operand},
    mnemonic::Mnemonic,
    register::Register,
};

const MAX_OPERANDS: usize = 2;

// Intel syntax, one instruction per line:
//
// <mnemonic> [<dest> [, <src>]] [; comment]
//
// e.g.
//
// ret
// add rax, 5
// mov rax, 0x12345678
// mov qword ptr [rbp + 16], rax
// mov rax, [rbx]
//
// the parser only checks the syntax, whether the operands form an
// encodable instruction is decided by the encoder.

pub fn parse(text: &str) -> Result<Instruction, ParseError> {
    let line = match text.find(';') {
        Some(index) => &text[..index],
        None => text,
    }
    .trim();

    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let (name, rest) = match line.find(char::is_whitespace) {
        Some(index) => (&line[..index], line[index..].trim()),
        None => (line, ""),
    };

    let mnemonic = name.parse::<Mnemonic>()?;

    let operands = if rest.is_empty() {
        vec![]
    } else {
        rest.split(',')
            .map(parse_operand)
            .collect::<Result<Vec<_>, _>>()?
    };

    if operands.len() > MAX_OPERANDS {
        return Err(ParseError::TooManyOperands {
            max: MAX_OPERANDS,
            actual: operands.len(),
        });
    }

    Ok(Instruction::new(mnemonic, operands))
}

pub fn parse_operand(text: &str) -> Result<Operand, ParseError> {
    let text = text.trim();

    // the operand size is always 64-bit, the keyword is accepted and ignored
    let operand = strip_keyword(strip_keyword(text, "qword"), "ptr");

    if let Some(inner) = operand.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| ParseError::InvalidOperand(text.to_owned()))?;
        return parse_memory(inner, text);
    }

    if operand.len() != text.len() {
        // `qword` on a register or an immediate
        return Err(ParseError::InvalidOperand(text.to_owned()));
    }

    match operand.chars().next() {
        None => Err(ParseError::InvalidOperand(text.to_owned())),
        Some(first) if first.is_ascii_digit() || first == '-' => {
            parse_number(operand).map(Operand::Immediate)
        }
        Some(_) => parse_register(operand).map(Operand::Register),
    }
}

/// `reg`, `reg+n` or `reg-n`, whitespace allowed anywhere.
fn parse_memory(inner: &str, text: &str) -> Result<Operand, ParseError> {
    let compact: String = inner.chars().filter(|c| !c.is_whitespace()).collect();

    match compact.find(|c: char| c == '+' || c == '-') {
        None if compact.is_empty() => Err(ParseError::InvalidOperand(text.to_owned())),
        None => parse_register(&compact).map(Operand::Indirect),
        Some(index) => {
            let base = parse_register(&compact[..index])?;
            let magnitude = &compact[index + 1..];
            if magnitude.starts_with('-') || magnitude.starts_with('+') {
                return Err(ParseError::InvalidOperand(text.to_owned()));
            }

            let value = parse_number(magnitude)?;
            let disp = if compact[index..].starts_with('-') {
                value
                    .checked_neg()
                    .ok_or_else(|| ParseError::InvalidNumber(magnitude.to_owned()))?
            } else {
                value
            };
            Ok(Operand::IndirectDisplacement(base, disp))
        }
    }
}

fn parse_register(text: &str) -> Result<Register, ParseError> {
    text.parse::<Register>()
        .map_err(|_| ParseError::UnknownRegister(text.to_owned()))
}

/// Decimal or `0x` hexadecimal, `_` separators and a leading `-` allowed.
fn parse_number(text: &str) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidNumber(text.to_owned());

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let digits = unsigned.replace('_', "");
    let (radix, digits) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex.to_owned()),
        None => (10, digits.clone()),
    };

    if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
        return Err(invalid());
    }

    let value = i64::from_str_radix(&digits, radix).map_err(|_| invalid())?;
    if negative {
        value.checked_neg().ok_or_else(invalid)
    } else {
        Ok(value)
    }
}

/// Remove a leading keyword (case-insensitive) followed by whitespace or `[`.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> &'a str {
    match text.get(..keyword.len()) {
        Some(head) if head.eq_ignore_ascii_case(keyword) => {
            let rest = &text[keyword.len()..];
            if rest.starts_with(|c: char| c.is_whitespace() || c == '[') {
                rest.trim_start()
            } else {
                text
            }
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        error::ParseError,
        instruction::{Instruction, Operand},
        mnemonic::Mnemonic,
        register::Register,
    };

    use super::{parse, parse_operand};

    #[test]
    fn test_parse_instruction() {
        assert_eq!(parse("ret"), Ok(Instruction::ret()));
        assert_eq!(parse("  RET  ; done"), Ok(Instruction::ret()));
        assert_eq!(
            parse("add rax, 5"),
            Ok(Instruction::add(
                Operand::Register(Register::RAX),
                Operand::Immediate(5)
            ))
        );
        assert_eq!(
            parse("mov rax,0x12345678"),
            Ok(Instruction::mov(
                Operand::Register(Register::RAX),
                Operand::Immediate(0x12345678)
            ))
        );
        assert_eq!(
            parse("mov qword ptr [rbp + 16], rax"),
            Ok(Instruction::mov(
                Operand::IndirectDisplacement(Register::RBP, 16),
                Operand::Register(Register::RAX)
            ))
        );
        assert_eq!(
            parse("mov rax, qword [rbx]"),
            Ok(Instruction::mov(
                Operand::Register(Register::RAX),
                Operand::Indirect(Register::RBX)
            ))
        );
        assert_eq!(
            parse("mov eax, [rbx]"),
            Ok(Instruction::mov(
                Operand::Register(Register::EAX),
                Operand::Indirect(Register::RBX)
            ))
        );
    }

    #[test]
    fn test_parse_operand() {
        assert_eq!(parse_operand("rdi"), Ok(Operand::Register(Register::RDI)));
        assert_eq!(parse_operand("[rsi]"), Ok(Operand::Indirect(Register::RSI)));
        assert_eq!(
            parse_operand("[ rbp+0x10 ]"),
            Ok(Operand::IndirectDisplacement(Register::RBP, 16))
        );
        assert_eq!(
            parse_operand("[rbp - 8]"),
            Ok(Operand::IndirectDisplacement(Register::RBP, -8))
        );
        assert_eq!(parse_operand("-1"), Ok(Operand::Immediate(-1)));
        assert_eq!(parse_operand("1_000"), Ok(Operand::Immediate(1000)));
        assert_eq!(parse_operand("0xFF"), Ok(Operand::Immediate(255)));
        assert_eq!(parse_operand("qword[rax]"), Ok(Operand::Indirect(Register::RAX)));
    }

    #[test]
    fn test_parse_display_roundtrip() {
        for text in [
            "ret",
            "add rax, 5",
            "mov rax, 0x12345678",
            "mov [rbp+16], rax",
            "mov rax, [rbx]",
            "mov rcx, [rdi+8]",
        ] {
            assert_eq!(parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   ; comment only"), Err(ParseError::Empty));
        assert_eq!(
            parse("sub rax, 1"),
            Err(ParseError::UnknownMnemonic("sub".to_owned()))
        );
        assert_eq!(
            parse("mov r8, 1"),
            Err(ParseError::UnknownRegister("r8".to_owned()))
        );
        assert_eq!(
            parse("mov rax, [r9+8]"),
            Err(ParseError::UnknownRegister("r9".to_owned()))
        );
        assert_eq!(
            parse("mov rax, 0xzz"),
            Err(ParseError::InvalidNumber("0xzz".to_owned()))
        );
        assert_eq!(
            parse("mov rax, [rbx"),
            Err(ParseError::InvalidOperand("[rbx".to_owned()))
        );
        assert_eq!(
            parse("mov rax, []"),
            Err(ParseError::InvalidOperand("[]".to_owned()))
        );
        assert_eq!(
            parse("mov rax, [rbx+-8]"),
            Err(ParseError::InvalidOperand("[rbx+-8]".to_owned()))
        );
        assert_eq!(
            parse("mov rax, "),
            Err(ParseError::InvalidOperand("".to_owned()))
        );
        assert_eq!(
            parse("mov qword rax, 1"),
            Err(ParseError::InvalidOperand("qword rax".to_owned()))
        );
        assert_eq!(
            parse("mov rax, 1, 2"),
            Err(ParseError::TooManyOperands { max: 2, actual: 3 })
        );
    }

    #[test]
    fn test_parse_does_not_check_forms() {
        // syntactically valid, rejected later by the encoder
        assert_eq!(
            parse("add rax, rbx"),
            Ok(Instruction::new(
                Mnemonic::Add,
                vec![
                    Operand::Register(Register::RAX),
                    Operand::Register(Register::RBX)
                ]
            ))
        );
    }
}
