// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::process;

use holofiles::error_chain;

mod cli;

fn main() {
    match cli::process() {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("Error: {}", error_chain(&error));
            process::exit(1);
        }
    }
}
