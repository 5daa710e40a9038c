//! Controller, logical and physical drive records

use std::{fmt, str::FromStr};

/// Controller identifier, as assigned by the vendor tool
pub(crate) type ControllerId = u32;

/// Logical drive identifier, unique only within its controller
pub(crate) type LogicalDriveId = u32;

/// Physical drive identifier, in vendor format (ie. `1:0:23` or `p3`)
pub(crate) type PhysicalDriveId = String;

/// Number of bytes in a decimal terabyte
const BYTES_PER_TB: f64 = 1_000_000_000_000.0;

/// Convert a byte count reported in decimal units to terabytes
#[expect(clippy::cast_precision_loss)]
pub(crate) fn terabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_TB
}

/// Storage controller
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) struct Controller {
    /// Controller number
    pub id: ControllerId,
    /// Model name
    pub model: String,
    /// Firmware version
    pub firmware: String,
    /// PCI vendor/device id
    pub pci_id: String,
    /// PCI slot, if the tool reports it
    pub slot: Option<String>,
}

/// Normalized logical drive status
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) enum LogicalDriveStatus {
    /// Fully operational
    Online,
    /// Operational with redundancy lost or being rebuilt
    Degraded,
    /// Data unavailable
    Failed,
    /// Deleted by us
    #[serde(rename = "Successfully removed")]
    Removed,
}

/// Normalized logical drive layout
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) enum RaidType {
    /// Striping
    #[serde(rename = "RAID-0")]
    Raid0,
    /// Mirroring
    #[serde(rename = "RAID-1")]
    Raid1,
    /// Striping with parity
    #[serde(rename = "RAID-5")]
    Raid5,
    /// Striping with double parity
    #[serde(rename = "RAID-6")]
    Raid6,
    /// Striped mirrors
    #[serde(rename = "RAID-10")]
    Raid10,
    /// Striped RAID-5 sets
    #[serde(rename = "RAID-50")]
    Raid50,
    /// Single exported disk
    Single,
    /// Hot spare
    Spare,
}

/// Normalized physical drive state
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) enum PhysicalDriveState {
    /// Not part of any logical drive
    Ready,
    /// Unusable
    Failed,
    /// Member of a logical drive
    Online,
}

/// Normalized physical drive health
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub(crate) enum PhysicalDriveStatus {
    /// Healthy
    Ok,
    /// Working, but with warnings
    #[serde(rename = "Non-Critical")]
    NonCritical,
    /// Broken
    Failed,
}

/// Globally unique logical drive name, ie. `c2u35`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DriveName {
    /// Controller the drive belongs to
    pub controller: ControllerId,
    /// Drive id on that controller
    pub drive: LogicalDriveId,
}

impl fmt::Display for DriveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}u{}", self.controller, self.drive)
    }
}

impl FromStr for DriveName {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        /// Parse a non empty string of ASCII digits, without leading zeros
        fn number(s: &str) -> Result<u32, &'static str> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err("Expected a decimal number");
            }
            if s.len() > 1 && s.starts_with('0') {
                return Err("Unexpected leading zero");
            }
            s.parse().map_err(|_| "Number out of range")
        }

        let (controller, drive) = s
            .strip_prefix('c')
            .ok_or("Missing 'c' prefix")?
            .split_once('u')
            .ok_or("Missing 'u' separator")?;
        Ok(Self {
            controller: number(controller)?,
            drive: number(drive)?,
        })
    }
}

impl serde::Serialize for DriveName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Logical drive (virtual disk, unit...)
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub(crate) struct LogicalDrive {
    /// Drive id on its controller
    pub id: LogicalDriveId,
    /// Owning controller
    pub controller_id: ControllerId,
    /// Global name
    pub name: DriveName,
    /// Block device, if the tool knows it
    pub device_path: Option<String>,
    /// Current status
    pub status: LogicalDriveStatus,
    /// Layout
    #[serde(rename = "type")]
    pub raid_type: RaidType,
    /// Backing physical drives
    pub physical_drives: Vec<PhysicalDriveId>,
}

/// Physical drive attached to a controller
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub(crate) struct PhysicalDrive {
    /// Vendor formatted id
    pub id: PhysicalDriveId,
    /// Owning controller
    pub controller_id: ControllerId,
    /// Firmware revision
    pub firmware: String,
    /// Capacity in decimal terabytes
    pub size: f64,
    /// Model
    pub model: String,
    /// Serial number
    pub serial: String,
    /// Role in the controller configuration
    pub state: PhysicalDriveState,
    /// Health
    pub status: PhysicalDriveStatus,
}
