// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::{fmt::Display, str::FromStr};

use crate::error::ParseError;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Mnemonic {
    Add,
    Mov,
    Ret,
}

impl Mnemonic {
    pub fn name(&self) -> &'static str {
        match self {
            Mnemonic::Add => "add",
            Mnemonic::Mov => "mov",
            Mnemonic::Ret => "ret",
        }
    }
}

impl Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mnemonic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Mnemonic::Add),
            "mov" => Ok(Mnemonic::Mov),
            "ret" => Ok(Mnemonic::Ret),
            _ => Err(ParseError::UnknownMnemonic(s.to_owned())),
        }
    }
}
