// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Operation dispatch for the driver protocol.
//!
//! The driver invokes us with one operation per process and reads
//! structured output: `KEY=VALUE` lines for `info`, entity records for
//! `scan`, and on file descriptor 3 the outcome line of an apply or
//! the two NUL-terminated paths of a diff. Everything on stderr is
//! diagnostics, `!! ` for errors and `>> ` for notices.

use std::io::Write;
use std::os::fd::FromRawFd;

use clap::Parser;
use thiserror::Error;

use holofiles::{error_chain, plugin, runtime, FilesPlugin, Runtime};

#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime")]
    Runtime(#[from] runtime::Error),

    #[error("plugin")]
    Plugin(#[from] plugin::Error),
}

#[derive(Debug, Parser)]
#[command(name = "holofiles", about = "Provision configuration files from a resource repository")]
pub struct Command {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    /// Print plugin metadata for the API handshake
    Info,
    /// Enumerate all provisionable entities
    Scan,
    /// Provision one entity
    Apply { entity: String },
    /// Provision one entity, overriding manual changes
    ForceApply { entity: String },
    /// Report the file pair to diff for one entity
    Diff { entity: String },
}

/// Run one operation; the returned code becomes our exit status.
pub fn process() -> Result<i32, Error> {
    let command = Command::parse();
    let plugin = FilesPlugin::new(Runtime::from_env()?);

    let code = match command.subcommand {
        Subcommand::Info => {
            for (key, value) in plugin.info() {
                println!("{key}={value}");
            }
            0
        }
        Subcommand::Scan => {
            print_scan(&plugin)?;
            0
        }
        Subcommand::Apply { entity } => apply(&plugin, &entity, false),
        Subcommand::ForceApply { entity } => apply(&plugin, &entity, true),
        Subcommand::Diff { entity } => diff(&plugin, &entity),
    };

    plugin.runtime.clean_cache();
    Ok(code)
}

fn print_scan(plugin: &FilesPlugin) -> Result<(), Error> {
    for entity in plugin.scan()? {
        println!("ENTITY: {}", entity.id());
        for source in entity.sources() {
            println!("SOURCE: {}", source.display());
        }
        if let Some((verb, reason)) = entity.action(&plugin.runtime) {
            if reason.is_empty() {
                println!("ACTION: {verb}");
            } else {
                println!("ACTION: {verb} ({reason})");
            }
        }
        for (key, value) in entity.user_info(&plugin.runtime) {
            println!("{key}: {value}");
        }
        println!();
    }
    Ok(())
}

fn apply(plugin: &FilesPlugin, entity_id: &str, force: bool) -> i32 {
    match plugin.apply(entity_id, force) {
        Ok(outcome) => {
            if let Some(message) = outcome.message() {
                write_fd3(message.as_bytes());
            }
            0
        }
        Err(error) => {
            eprintln!("!! {}", error_chain(&error));
            1
        }
    }
}

fn diff(plugin: &FilesPlugin, entity_id: &str) -> i32 {
    let (desired, current) = match plugin.diff(entity_id) {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("!! {}", error_chain(&error));
            return 0;
        }
    };

    // absent sides read as empty via /dev/null
    let printable = |path: &std::path::Path| {
        if path.exists() {
            path.display().to_string()
        } else {
            "/dev/null".to_owned()
        }
    };
    write_fd3(format!("{}\0{}\0", printable(&desired), printable(&current)).as_bytes());
    0
}

/// The driver opens fd 3 for our structured replies before spawning
/// us. A write failure is reported but never fatal: it only occurs
/// when running outside the driver.
fn write_fd3(content: &[u8]) {
    let mut file = unsafe { std::fs::File::from_raw_fd(3) };
    if let Err(error) = file.write_all(content) {
        eprintln!("!! {error}");
    }
}
