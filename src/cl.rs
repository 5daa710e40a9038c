//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    backend::BackendKind,
    model::{ControllerId, LogicalDriveId},
    select::PCI_DEVICES,
};

/// Storctl command line arguments
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct Args {
    /// Level of logging output (TRACE, DEBUG, INFO, WARN, ERROR).
    /// Logs go to standard error, standard output only carries the JSON result.
    #[arg(short, default_value_t = log::Level::Warn)]
    pub verbosity: log::Level,

    /// Maximum time to wait for a management tool, ie. '30s', '5min'.
    #[arg(short, long, default_value = "2min")]
    pub timeout: humantime::Duration,

    /// Use this backend instead of detecting it from PCI devices (perc8xx, lsi3ware).
    #[arg(short, long)]
    pub backend: Option<BackendKind>,

    /// Kernel PCI device list used for backend detection.
    #[arg(long, default_value = PCI_DEVICES)]
    pub pci_devices: PathBuf,

    /// Operation
    #[command(subcommand)]
    pub command: Command,
}

/// Indicator LED state
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum LedState {
    /// Blinking
    On,
    /// Off
    Off,
}

/// Operation
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Show controller details, for all controllers if no id is given
    Info {
        /// Controller id
        controller: Option<ControllerId>,
    },

    /// Show logical drives of a controller, or a single one
    LogicalDrive {
        /// Controller id
        controller: ControllerId,
        /// Logical drive id
        drive: Option<LogicalDriveId>,
    },

    /// Show a logical drive from its name (ie. 'c0u1')
    LogicalDriveByName {
        /// Logical drive name
        name: String,
    },

    /// Create a logical drive, and show it
    LogicalDriveCreate {
        /// Controller id
        controller: ControllerId,
        /// Physical drive(s) to build it from, in the controller format
        /// (ie. '0:0:1,0:0:2' for PERC, 'p0:p1' for 3ware).
        physical_drives: String,
    },

    /// Delete a logical drive, and show its last state
    LogicalDriveDelete {
        /// Controller id
        controller: ControllerId,
        /// Logical drive id
        drive: LogicalDriveId,
    },

    /// Show physical drives of a controller, or a single one
    PhysicalDrive {
        /// Controller id
        controller: ControllerId,
        /// Physical drive id (ie. '0:0:1' for PERC, 'p1' for 3ware)
        drive: Option<String>,
    },

    /// Switch the indicator LED of a physical drive
    Led {
        /// Controller id
        controller: ControllerId,
        /// Physical drive id
        drive: String,
        /// LED state (on, off)
        state: LedState,
    },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser as _;

    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["storctl", "info"]).unwrap();
        assert_eq!(args.verbosity, log::Level::Warn);
        assert_eq!(*args.timeout, Duration::from_secs(120));
        assert_eq!(args.backend, None);
        assert_eq!(args.pci_devices, PathBuf::from("/proc/bus/pci/devices"));
        assert!(matches!(args.command, Command::Info { controller: None }));
    }

    #[test]
    fn commands() {
        let args = Args::try_parse_from([
            "storctl", "-v", "debug", "-t", "30s", "-b", "lsi3ware", "led", "0", "p1", "on",
        ])
        .unwrap();
        assert_eq!(args.backend, Some(BackendKind::Lsi3ware));
        assert_eq!(*args.timeout, Duration::from_secs(30));
        assert!(matches!(
            args.command,
            Command::Led { controller: 0, drive, state: LedState::On } if drive == "p1"
        ));

        let args =
            Args::try_parse_from(["storctl", "logical-drive-create", "1", "0:0:1,0:0:2"]).unwrap();
        assert!(matches!(
            args.command,
            Command::LogicalDriveCreate { controller: 1, physical_drives } if physical_drives == "0:0:1,0:0:2"
        ));

        let args = Args::try_parse_from(["storctl", "logical-drive", "0", "3"]).unwrap();
        assert!(matches!(
            args.command,
            Command::LogicalDrive {
                controller: 0,
                drive: Some(3)
            }
        ));
    }

    #[test]
    fn invalid_arguments() {
        assert!(Args::try_parse_from(["storctl", "led", "0", "p1", "blink"]).is_err());
        assert!(Args::try_parse_from(["storctl", "-b", "megaraid", "info"]).is_err());
        assert!(Args::try_parse_from(["storctl", "logical-drive", "zero"]).is_err());
    }
}
