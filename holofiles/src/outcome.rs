// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

/// What happened when one entity was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target was brought into the desired state
    Applied,
    /// The target was already in the desired state; nothing written
    AlreadyApplied,
    /// The target carries a manual edit; refused without force
    ExternallyChanged,
    /// The target was removed out-of-band; refused without force
    ExternallyDeleted,
}

impl Outcome {
    /// The line the driver expects on fd 3 for a non-applied outcome.
    /// `Applied` sends nothing.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Outcome::Applied => None,
            Outcome::AlreadyApplied => Some("not changed\n"),
            Outcome::ExternallyChanged => Some("requires --force to overwrite\n"),
            Outcome::ExternallyDeleted => Some("requires --force to restore\n"),
        }
    }
}
