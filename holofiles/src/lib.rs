// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

pub use self::entity::Entity;
pub use self::outcome::Outcome;
pub use self::plugin::FilesPlugin;
pub use self::runtime::Runtime;

pub mod entity;
pub mod outcome;
pub mod plugin;
pub mod pm;
pub mod resource;
pub mod runtime;
pub mod scan;

/// Flatten an error and its source chain into one `: `-joined line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(error) = source.take() {
        chain.push(error.to_string());
        source = error.source();
    }
    chain.join(": ")
}
