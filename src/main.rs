//! Manage RAID storage controllers through their vendor tools

use std::{
    io::{self, Write as _},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::Parser as _;

mod backend;
mod cl;
mod facade;
mod model;
mod select;
#[cfg(test)]
mod tests;
mod tool;
mod tree;

use crate::{facade::Response, select::Context, tool::Invoker};

/// Write response as JSON to stdout, and return the process exit code
fn output<T: serde::Serialize>(response: &Response<T>) -> anyhow::Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, response).context("Failed to serialize result")?;
    writeln!(stdout).context("Failed to write result")?;
    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> anyhow::Result<ExitCode> {
    // Parse cl args
    let args = cl::Args::parse();

    // Init logger
    simple_logger::init_with_level(args.verbosity).context("Failed to init logger")?;

    let invoker = Invoker::new(*args.timeout);
    let ctx = Context::setup(args.backend, &args.pci_devices, invoker);

    match args.command {
        cl::Command::Info { controller } => output(&facade::info(&ctx, controller)),
        cl::Command::LogicalDrive { controller, drive } => {
            output(&facade::logical_drive(&ctx, controller, drive))
        }
        cl::Command::LogicalDriveByName { name } => {
            output(&facade::logical_drive_by_name(&ctx, &name))
        }
        cl::Command::LogicalDriveCreate {
            controller,
            physical_drives,
        } => output(&facade::logical_drive_create(
            &ctx,
            controller,
            &physical_drives,
        )),
        cl::Command::LogicalDriveDelete { controller, drive } => {
            output(&facade::logical_drive_delete(&ctx, controller, drive))
        }
        cl::Command::PhysicalDrive { controller, drive } => output(&facade::physical_drive(
            &ctx,
            controller,
            drive.as_deref(),
        )),
        cl::Command::Led {
            controller,
            drive,
            state,
        } => output(&facade::led(
            &ctx,
            controller,
            &drive,
            state == cl::LedState::On,
        )),
    }
}
