// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

// References:
//
// - Calling Conventions
//   https://en.wikipedia.org/wiki/X86_calling_conventions
//   https://wiki.osdev.org/Calling_Conventions
//
// Usage:
//
// RUST_LOG=trace cargo run --example runner

#[cfg(all(target_arch = "x86_64", unix))]
pub fn main() {
    use jit_encoder_x86_64::{Encoder, parser::parse};
    use mmap_rs::MmapOptions;

    env_logger::init();

    // u64 increment_into(u64 *data) {
    //     data[1] = data[0] + 5;
    //     return data[1];
    // }
    let source = "
        mov rax, [rdi]       ; rdi = data
        add rax, 5
        mov [rdi + 8], rax
        ret
    ";

    let mut encoder = Encoder::new();
    for line in source.lines().filter(|line| !line.trim().is_empty()) {
        let instruction = parse(line).expect("invalid instruction");
        encoder
            .encode(&instruction)
            .expect("unsupported instruction");
    }

    println!("machine code: {:02x?}", encoder.bytes());

    let mut page = MmapOptions::new(MmapOptions::page_size())
        .expect("failed to create mmap")
        .map_mut()
        .expect("failed to map code page");

    let written = unsafe { encoder.compile(page.as_mut_ptr() as usize) };

    let code = page
        .make_exec()
        .map_err(|(_, error)| error)
        .expect("failed to make the code page executable");

    let function: extern "C" fn(*mut u64) -> u64 = unsafe { std::mem::transmute(code.as_ptr()) };

    let mut data: [u64; 2] = [37, 0];
    let result = function(data.as_mut_ptr());

    println!("{} bytes executed, result = {}, data = {:?}", written, result, data);
}

#[cfg(not(all(target_arch = "x86_64", unix)))]
pub fn main() {
    eprintln!("the runner executes x86-64 code, it only runs on x86-64 Unix hosts");
}
