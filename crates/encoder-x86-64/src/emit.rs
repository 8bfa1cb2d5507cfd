// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::convert::Infallible;

use crate::error::EmitError;

/// The destination of the encoded bytes.
///
/// Bytes are always written one at a time, a bulk copy of the code
/// is not part of this interface, some host write paths treat the
/// buffer as a C string and stop at the first zero byte,
/// e.g. `mov rax, [rbx]` is `48 8b 03` but `mov [rax], 0` ends with `00 00 00 00`.
pub trait MemoryWriter {
    type Error;

    /// Write `byte` at `address + offset`, where `address` is the start
    /// of the code being emitted.
    fn write_byte(&mut self, address: usize, offset: usize, byte: u8)
    -> Result<(), Self::Error>;
}

/// Writes straight into the process address space.
#[derive(Debug)]
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// # Safety
    ///
    /// Every `address + offset` passed to `write_byte` must be valid for writes,
    /// owned by the caller (e.g. a JIT code page mapped as writable) and
    /// not accessed by anything else during the emission.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryWriter for RawMemory {
    type Error = Infallible;

    fn write_byte(
        &mut self,
        address: usize,
        offset: usize,
        byte: u8,
    ) -> Result<(), Self::Error> {
        // the caller of `RawMemory::new` vouches for the address range
        let target = (address as *mut u8).wrapping_add(offset);
        unsafe { std::ptr::write_volatile(target, byte) };
        Ok(())
    }
}

/// A slice of memory mapped at a (virtual) base address.
///
/// Useful to assemble into a plain buffer that is copied to its
/// final place later, or to inspect the emitted code.
#[derive(Debug)]
pub struct CodeBuffer<'a> {
    base: usize,
    bytes: &'a mut [u8],
}

impl<'a> CodeBuffer<'a> {
    pub fn new(base: usize, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.bytes
    }
}

impl MemoryWriter for CodeBuffer<'_> {
    type Error = EmitError;

    fn write_byte(
        &mut self,
        address: usize,
        offset: usize,
        byte: u8,
    ) -> Result<(), Self::Error> {
        let address = address
            .checked_add(offset)
            .ok_or(EmitError::AddressOverflow { address, offset })?;

        let out_of_bounds = EmitError::OutOfBounds {
            address,
            base: self.base,
            len: self.bytes.len(),
        };

        let index = address.checked_sub(self.base).ok_or(out_of_bounds.clone())?;
        let slot = self.bytes.get_mut(index).ok_or(out_of_bounds)?;
        *slot = byte;
        Ok(())
    }
}

impl MemoryWriter for Vec<u8> {
    type Error = Infallible;

    /// The vector holds the code starting at `address`, the byte lands at
    /// index `offset` (the vector grows zero-filled as needed).
    ///
    /// `address` itself is not used, the code can be copied to its final
    /// place later.
    fn write_byte(
        &mut self,
        _address: usize,
        offset: usize,
        byte: u8,
    ) -> Result<(), Self::Error> {
        if offset >= self.len() {
            self.resize(offset + 1, 0);
        }
        self[offset] = byte;
        Ok(())
    }
}
