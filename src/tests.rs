//! Shared code for tests

#![allow(clippy::unwrap_used)]

use std::{
    fs::{self, OpenOptions},
    io::Write as _,
    os::unix::prelude::OpenOptionsExt as _,
    path::Path,
    time::Duration,
};

use crate::tool::Invoker;

/// Directory of mocked management tools
///
/// Each mocked tool replays canned outputs, one per invocation in order, and
/// records its arguments.
pub(crate) struct BinaryMock {
    /// Directory holding scripts, canned outputs and call logs
    bin_dir: tempfile::TempDir,
}

impl BinaryMock {
    /// Create an empty mock directory
    pub(crate) fn new() -> anyhow::Result<Self> {
        Ok(Self {
            bin_dir: tempfile::tempdir()?,
        })
    }

    /// Mock directory path
    pub(crate) fn path(&self) -> &Path {
        self.bin_dir.path()
    }

    /// Invoker running tools from this directory
    pub(crate) fn invoker(&self) -> Invoker {
        Invoker::with_bin_dir(Duration::from_secs(10), self.path())
    }

    /// Add a tool printing `outputs[n]` on its n-th invocation
    pub(crate) fn add(&self, name: &str, outputs: &[&[u8]]) -> anyhow::Result<()> {
        for (i, output) in outputs.iter().enumerate() {
            fs::write(self.path().join(format!("{name}.out.{i}")), output)?;
        }
        let dir = self.path().to_str().unwrap();
        self.add_script(
            name,
            &format!(
                "n=$(cat {dir}/{name}.count 2>/dev/null || echo 0)\n\
                 echo $((n + 1)) > {dir}/{name}.count\n\
                 cat {dir}/{name}.out.$n"
            ),
        )
    }

    /// Add a tool running a shell script body
    pub(crate) fn add_script(&self, name: &str, body: &str) -> anyhow::Result<()> {
        let dir = self.path().to_str().unwrap();
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o700)
            .open(self.path().join(name))?
            .write_all(
                format!("#!/bin/sh -e\necho \"$@\" >> {dir}/{name}.args\n{body}\n").as_bytes(),
            )?;
        Ok(())
    }

    /// Arguments of each invocation of a tool so far
    pub(crate) fn calls(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let path = self.path().join(format!("{name}.args"));
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(fs::read_to_string(path)?
            .lines()
            .map(ToOwned::to_owned)
            .collect())
    }
}
