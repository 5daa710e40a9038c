//! Vendor management tool invocation

use std::{
    fs::File,
    io::{self, Read as _, Seek as _},
    path::{Path, PathBuf},
    time::Duration,
};

use nix::unistd::{AccessFlags, access};
use subprocess::{Exec, NullFile, Redirection};

use crate::backend::Error;

/// Known management tools
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub(crate) enum Tool {
    /// OpenManage storage reporting
    #[strum(serialize = "omreport")]
    OmReport,
    /// OpenManage storage configuration
    #[strum(serialize = "omconfig")]
    OmConfig,
    /// 3ware command line interface
    #[strum(serialize = "tw_cli")]
    TwCli,
}

impl Tool {
    /// Installation directory
    fn install_dir(self) -> &'static Path {
        match self {
            Tool::OmReport | Tool::OmConfig => Path::new("/opt/dell/srvadmin/bin"),
            Tool::TwCli => Path::new("/usr/sbin"),
        }
    }

    /// Output text printed when the tool is run without enough privileges
    fn privilege_error(self) -> Option<&'static str> {
        match self {
            Tool::OmReport | Tool::OmConfig => {
                Some("Error! User has insufficient privileges to run command.")
            }
            Tool::TwCli => None,
        }
    }
}

/// Runs management tools and captures their output
#[derive(Clone, Debug)]
pub(crate) struct Invoker {
    /// Maximum time to wait for a tool to exit
    timeout: Duration,
    /// Replacement for the tools installation directories
    bin_dir: Option<PathBuf>,
}

impl Invoker {
    /// Build invoker for tools at their standard locations
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            bin_dir: None,
        }
    }

    /// Look up all tools in a single directory
    #[cfg(test)]
    pub(crate) fn with_bin_dir(timeout: Duration, bin_dir: &Path) -> Self {
        Self {
            timeout,
            bin_dir: Some(bin_dir.to_owned()),
        }
    }

    /// Executable path of a tool
    fn path(&self, tool: Tool) -> PathBuf {
        self.bin_dir
            .as_deref()
            .unwrap_or_else(|| tool.install_dir())
            .join(tool.to_string())
    }

    /// Run tool with whitespace separated arguments, and return its standard output
    pub(crate) fn run(&self, tool: Tool, args: &str) -> Result<String, Error> {
        let path = self.path(tool);
        access(&path, AccessFlags::X_OK).map_err(|e| Error::ToolUnavailable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let capture_failed = |reason: String| Error::CaptureFailed { tool, reason };

        let args: Vec<&str> = args.split_ascii_whitespace().collect();
        let exec = Exec::cmd(&path)
            .args(args.as_slice())
            .env("LANG", "C")
            .stdin(NullFile)
            .stderr(NullFile);
        log::debug!("{}", exec.to_cmdline_lossy());

        // Output goes to a file so a large output can not block the child on a full pipe
        let mut stdout = tempfile::tempfile().map_err(|e| capture_failed(e.to_string()))?;
        let mut child = exec
            .stdout(Redirection::File(
                stdout
                    .try_clone()
                    .map_err(|e| capture_failed(e.to_string()))?,
            ))
            .popen()
            .map_err(|e| Error::ToolUnavailable {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let Some(status) = child
            .wait_timeout(self.timeout)
            .map_err(|e| capture_failed(e.to_string()))?
        else {
            if let Err(e) = child.kill() {
                log::warn!("Failed to kill {tool}: {e}");
            }
            let _ = child.wait();
            log::warn!(
                "Killed {tool} after {}",
                humantime::format_duration(self.timeout)
            );
            return Err(Error::ToolTimeout {
                tool,
                timeout: self.timeout,
            });
        };
        log::trace!("{tool} exited with {status:?}");

        let output = Self::read_output(&mut stdout).map_err(|e| capture_failed(e.to_string()))?;
        let output = String::from_utf8(output).map_err(|e| Error::MalformedOutput {
            tool,
            reason: e.to_string(),
        })?;
        log::trace!("{output}");
        if tool
            .privilege_error()
            .is_some_and(|marker| output.contains(marker))
        {
            return Err(Error::PermissionDenied(tool));
        }
        Ok(output)
    }

    /// Read back captured output
    fn read_output(file: &mut File) -> io::Result<Vec<u8>> {
        file.rewind()?;
        let mut output = Vec::new();
        file.read_to_end(&mut output)?;
        Ok(output)
    }
}
