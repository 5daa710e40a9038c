//! Vendor controller backends

mod lsi3ware;
mod perc;
mod workflow;

use std::{collections::BTreeSet, path::PathBuf, time::Duration};

pub(crate) use lsi3ware::Lsi3ware;
pub(crate) use perc::Perc8xx;

use crate::{
    model::{Controller, ControllerId, LogicalDrive, LogicalDriveId, PhysicalDrive},
    tool::{Invoker, Tool},
};

/// Controller operation error
///
/// Each variant is a distinct failure kind reported to the caller, see
/// [`crate::facade::Response`].
#[derive(thiserror::Error, strum::IntoStaticStr, Debug)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Error {
    /// Management tool missing, not executable, or could not be started
    #[error("Management tool {path:?} is not available: {reason}")]
    ToolUnavailable {
        /// Tool path
        path: PathBuf,
        /// Cause
        reason: String,
    },
    /// Tool refused to run with our privileges
    #[error("Not enough privileges to run {0}, are you root?")]
    PermissionDenied(Tool),
    /// Tool did not complete in time
    #[error("{tool} did not complete within {}", humantime::format_duration(*.timeout))]
    ToolTimeout {
        /// Tool that was killed
        tool: Tool,
        /// Configured limit
        timeout: Duration,
    },
    /// Tool started, but waiting for it or collecting its output failed
    #[error("Failed to collect {tool} output: {reason}")]
    CaptureFailed {
        /// Tool being run
        tool: Tool,
        /// Cause
        reason: String,
    },
    /// Tool output could not be parsed
    #[error("Malformed {tool} output: {reason}")]
    MalformedOutput {
        /// Tool that produced the output
        tool: Tool,
        /// Parser diagnostic
        reason: String,
    },
    /// Expected record field is absent or invalid
    #[strum(serialize = "malformed_output")]
    #[error("Invalid or missing field {field:?} in {record:?} record")]
    InvalidField {
        /// Record node name
        record: String,
        /// Field name
        field: String,
    },
    /// Tool output lacks the expected container
    #[error("Tool output has no {0:?} section")]
    MissingSection(&'static str),
    /// Vendor code absent from the normalization table
    #[error("Unknown {field} code {code:?}")]
    UnknownStatusCode {
        /// Normalized field the code maps to
        field: &'static str,
        /// Raw vendor code
        code: String,
    },
    /// No such controller
    #[error("Controller {0} not found")]
    ControllerNotFound(ControllerId),
    /// No such logical drive
    #[error("Logical drive {drive} not found on controller {controller}")]
    LogicalDriveNotFound {
        /// Controller
        controller: ControllerId,
        /// Logical drive
        drive: LogicalDriveId,
    },
    /// No such physical drive
    #[error("Physical drive {drive} not found on controller {controller}")]
    PhysicalDriveNotFound {
        /// Controller
        controller: ControllerId,
        /// Physical drive
        drive: String,
    },
    /// Tool reported the creation failed
    #[error("Failed to create a logical drive on controller {controller} with physical drives {physical_drives}")]
    CreationFailed {
        /// Controller
        controller: ControllerId,
        /// Requested physical drives
        physical_drives: String,
    },
    /// Creation reported success but the new drive can not be identified
    #[error(
        "Problem after creating a logical drive on controller {controller} for physical drives {physical_drives}: {new_count} new logical drives, can not compute the new drive id"
    )]
    CreationAmbiguous {
        /// Controller
        controller: ControllerId,
        /// Requested physical drives
        physical_drives: String,
        /// Number of logical drives that appeared
        new_count: usize,
    },
    /// Tool reported the deletion failed
    #[error("Failed to delete logical drive {drive} on controller {controller}")]
    DeletionFailed {
        /// Controller
        controller: ControllerId,
        /// Logical drive
        drive: LogicalDriveId,
    },
    /// Tool reported the LED change failed
    #[error(
        "Unable to switch {} the indicator LED for physical drive {drive} on controller {controller}",
        led_word(*.on)
    )]
    LedOperationFailed {
        /// Controller
        controller: ControllerId,
        /// Physical drive
        drive: String,
        /// Requested LED state
        on: bool,
    },
    /// No supported controller on this host
    #[error("No supported storage controller found, controller operations are unavailable")]
    NoBackendAvailable,
    /// Caller supplied value rejected before reaching any tool
    #[error("Invalid argument {value:?}: {reason}")]
    InvalidArgument {
        /// Rejected value
        value: String,
        /// Why
        reason: &'static str,
    },
}

/// LED state as a word
fn led_word(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Management interface every vendor backend provides
pub(crate) trait Backend {
    /// Ids of all controllers on this host
    fn list_controllers(&self) -> Result<Vec<ControllerId>, Error>;

    /// Controller details
    fn controller(&self, id: ControllerId) -> Result<Controller, Error>;

    /// Ids of the logical drives currently configured, without details
    fn logical_drive_ids(
        &self,
        controller: ControllerId,
    ) -> Result<BTreeSet<LogicalDriveId>, Error>;

    /// All logical drives of a controller
    fn logical_drives(&self, controller: ControllerId) -> Result<Vec<LogicalDrive>, Error>;

    /// Single logical drive
    fn logical_drive(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<LogicalDrive, Error>;

    /// Physical drives of a controller, or only those backing a logical drive
    fn physical_drives(
        &self,
        controller: ControllerId,
        logical_drive: Option<LogicalDriveId>,
    ) -> Result<Vec<PhysicalDrive>, Error>;

    /// Single physical drive
    fn physical_drive(
        &self,
        controller: ControllerId,
        drive: &str,
    ) -> Result<PhysicalDrive, Error>;

    /// Run the vendor creation command with the backend default policy,
    /// and return the success indicator reported by the tool
    fn submit_creation(
        &self,
        controller: ControllerId,
        physical_drives: &str,
    ) -> Result<bool, Error>;

    /// Run the vendor deletion command, and return the success indicator
    fn submit_deletion(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<bool, Error>;

    /// Switch the drive bay indicator LED on or off
    fn set_indicator_led(
        &self,
        controller: ControllerId,
        drive: &str,
        on: bool,
    ) -> Result<bool, Error>;

    /// Create a logical drive from physical drives, and return it
    fn create_logical_drive(
        &self,
        controller: ControllerId,
        physical_drives: &str,
    ) -> Result<LogicalDrive, Error> {
        workflow::create_logical_drive(self, controller, physical_drives)
    }

    /// Delete a logical drive, and return its last known state
    fn delete_logical_drive(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<LogicalDrive, Error> {
        workflow::delete_logical_drive(self, controller, drive)
    }
}

/// Known backend implementations
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum BackendKind {
    /// Dell PERC 5/6/H7xx/H8xx, through OpenManage Server Administrator
    Perc8xx,
    /// LSI/AMCC 3ware 9xxx, through `tw_cli`
    Lsi3ware,
}

impl BackendKind {
    /// Build backend instance
    pub(crate) fn backend(self, invoker: Invoker) -> Box<dyn Backend> {
        match self {
            BackendKind::Perc8xx => Box::new(Perc8xx::new(invoker)),
            BackendKind::Lsi3ware => Box::new(Lsi3ware::new(invoker)),
        }
    }
}

/// Normalize a vendor code with a closed mapping table
pub(crate) fn map_code<T: Copy>(
    table: &[(&str, T)],
    field: &'static str,
    code: &str,
) -> Result<T, Error> {
    table
        .iter()
        .find_map(|(c, v)| (*c == code).then_some(*v))
        .ok_or_else(|| Error::UnknownStatusCode {
            field,
            code: code.to_owned(),
        })
}

/// Reject caller supplied values that could smuggle extra tool arguments
pub(crate) fn ensure_argument(value: &str, allowed: fn(char) -> bool) -> Result<(), Error> {
    if value.is_empty() || !value.chars().all(allowed) {
        return Err(Error::InvalidArgument {
            value: value.to_owned(),
            reason: "unexpected character",
        });
    }
    Ok(())
}
