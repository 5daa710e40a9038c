//! LSI/AMCC 3ware controllers, through `tw_cli`
//!
//! `tw_cli` has no structured output mode, so its tables and `key = value`
//! attribute lines are parsed as text.

use std::collections::BTreeSet;

use itertools::Itertools as _;

use super::{Backend, Error, map_code};
use crate::{
    model::{
        Controller, ControllerId, DriveName, LogicalDrive, LogicalDriveId, LogicalDriveStatus,
        PhysicalDrive, PhysicalDriveState, PhysicalDriveStatus, RaidType, terabytes,
    },
    tool::{Invoker, Tool},
};

/// PCI vendor/device id of the 9xxx series, `tw_cli` does not report it
const PCI_ID: &str = "13C1:1004";

/// Unit `Status` column
const UNIT_STATUS: [(&str, LogicalDriveStatus); 11] = [
    ("OK", LogicalDriveStatus::Online),
    ("VERIFYING", LogicalDriveStatus::Online),
    ("VERIFY-PAUSED", LogicalDriveStatus::Online),
    ("INITIALIZING", LogicalDriveStatus::Online),
    ("INIT-PAUSED", LogicalDriveStatus::Online),
    ("MIGRATING", LogicalDriveStatus::Online),
    ("MIGRATE-PAUSED", LogicalDriveStatus::Online),
    ("DEGRADED", LogicalDriveStatus::Degraded),
    ("REBUILDING", LogicalDriveStatus::Degraded),
    ("REBUILD-PAUSED", LogicalDriveStatus::Degraded),
    ("INOPERABLE", LogicalDriveStatus::Failed),
];

/// Unit `UnitType` column
const UNIT_TYPE: [(&str, RaidType); 8] = [
    ("RAID-0", RaidType::Raid0),
    ("RAID-1", RaidType::Raid1),
    ("RAID-5", RaidType::Raid5),
    ("RAID-6", RaidType::Raid6),
    ("RAID-10", RaidType::Raid10),
    ("RAID-50", RaidType::Raid50),
    ("SINGLE", RaidType::Single),
    ("SPARE", RaidType::Spare),
];

/// Port `Status` attribute
const PORT_STATUS: [(&str, PhysicalDriveStatus); 5] = [
    ("OK", PhysicalDriveStatus::Ok),
    ("DEGRADED", PhysicalDriveStatus::NonCritical),
    ("ECC-ERROR", PhysicalDriveStatus::NonCritical),
    ("SMART-FAILURE", PhysicalDriveStatus::NonCritical),
    ("DEVICE-ERROR", PhysicalDriveStatus::Failed),
];

/// Port status of an empty bay
const NOT_PRESENT: &str = "NOT-PRESENT";

/// Unit creation policy
const CREATE_POLICY: &str = "type=raid0 stripe=64";

/// Bytes per block in capacity attributes
const BLOCK_SIZE: u64 = 512;

/// Row of a unit or port table
struct Row<'a> {
    /// Numeric part of the first column, ie. 3 for `u3`
    num: u32,
    /// Remaining columns
    columns: Vec<&'a str>,
}

/// Rows of the table whose first column is `prefix` followed by a number
fn table_rows(output: &str, prefix: char) -> impl Iterator<Item = Row<'_>> {
    output.lines().filter_map(move |l| {
        let mut tokens = l.split_ascii_whitespace();
        let num = tokens.next()?.strip_prefix(prefix)?.parse().ok()?;
        Some(Row {
            num,
            columns: tokens.collect(),
        })
    })
}

/// Value of a `/cX/pY Key = Value` attribute line
fn attribute<'a>(output: &'a str, object: &str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|l| {
        let (k, v) = l.strip_prefix(object)?.split_once(" = ")?;
        (k.trim() == key).then_some(v.trim())
    })
}

/// First error line, if the command failed
fn error_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("Error:"))
}

/// Whether a configuration command reported success
fn command_done(output: &str) -> bool {
    error_line(output).is_none() && output.contains("Done.")
}

/// Port id, ie. `p3`
fn is_port(drive: &str) -> bool {
    drive
        .strip_prefix('p')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Unit table entry
struct Unit {
    /// Unit number
    id: LogicalDriveId,
    /// Normalized status
    status: LogicalDriveStatus,
    /// Normalized type
    raid_type: RaidType,
}

/// LSI/AMCC 3ware 9xxx backend
pub(crate) struct Lsi3ware {
    /// Tool runner
    invoker: Invoker,
}

impl Lsi3ware {
    /// Build backend
    pub(crate) fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    /// Unit and port tables of a controller
    fn controller_tables(&self, controller: ControllerId) -> Result<String, Error> {
        let output = self
            .invoker
            .run(Tool::TwCli, &format!("/c{controller} show"))?;
        if let Some(err) = error_line(&output) {
            log::debug!("Controller {controller}: {err}");
            return Err(Error::ControllerNotFound(controller));
        }
        if !output
            .lines()
            .any(|l| l.starts_with("VPort") || l.starts_with("Port"))
        {
            return Err(Error::MissingSection("Port"));
        }
        Ok(output)
    }

    /// Run configuration command, and return whether it succeeded
    fn configure(&self, args: &str) -> Result<bool, Error> {
        let output = self.invoker.run(Tool::TwCli, args)?;
        if let Some(err) = error_line(&output) {
            log::warn!("tw_cli {args}: {err}");
        }
        Ok(command_done(&output))
    }
}

/// Parse unit table
fn parse_units(tables: &str) -> Result<Vec<Unit>, Error> {
    table_rows(tables, 'u')
        .map(|row| {
            let column = |i: usize| {
                row.columns
                    .get(i)
                    .copied()
                    .ok_or_else(|| Error::InvalidField {
                        record: format!("u{}", row.num),
                        field: i.to_string(),
                    })
            };
            Ok(Unit {
                id: row.num,
                raid_type: map_code(&UNIT_TYPE, "unit type", column(0)?)?,
                status: map_code(&UNIT_STATUS, "unit status", column(1)?)?,
            })
        })
        .collect()
}

/// Present ports of the port table, with the unit they belong to
fn parse_ports(tables: &str) -> Vec<(String, Option<LogicalDriveId>)> {
    table_rows(tables, 'p')
        .filter(|row| row.columns.first().is_some_and(|s| *s != NOT_PRESENT))
        .map(|row| {
            let unit = row
                .columns
                .get(1)
                .and_then(|u| u.strip_prefix('u'))
                .and_then(|u| u.parse().ok());
            (format!("p{}", row.num), unit)
        })
        .collect()
}

/// Build logical drive from a unit and the port table
fn logical_drive_from(
    controller: ControllerId,
    unit: &Unit,
    ports: &[(String, Option<LogicalDriveId>)],
) -> LogicalDrive {
    LogicalDrive {
        id: unit.id,
        controller_id: controller,
        name: DriveName {
            controller,
            drive: unit.id,
        },
        device_path: None,
        status: unit.status,
        raid_type: unit.raid_type,
        physical_drives: ports
            .iter()
            .filter(|(_, u)| *u == Some(unit.id))
            .map(|(p, _)| p.clone())
            .collect(),
    }
}

impl Backend for Lsi3ware {
    fn list_controllers(&self) -> Result<Vec<ControllerId>, Error> {
        let output = self.invoker.run(Tool::TwCli, "show")?;
        if !output.lines().any(|l| l.starts_with("Ctl")) {
            return Err(Error::MissingSection("Ctl"));
        }
        Ok(table_rows(&output, 'c').map(|row| row.num).collect())
    }

    fn controller(&self, id: ControllerId) -> Result<Controller, Error> {
        let output = self.invoker.run(Tool::TwCli, &format!("/c{id} show all"))?;
        if error_line(&output).is_some() {
            return Err(Error::ControllerNotFound(id));
        }
        let object = format!("/c{id} ");
        let attr = |key: &str| {
            attribute(&output, &object, key)
                .map(ToOwned::to_owned)
                .ok_or_else(|| Error::InvalidField {
                    record: format!("/c{id}"),
                    field: key.to_owned(),
                })
        };
        Ok(Controller {
            id,
            model: attr("Model")?,
            firmware: attr("Firmware Version")?,
            pci_id: PCI_ID.to_owned(),
            slot: None,
        })
    }

    fn logical_drive_ids(
        &self,
        controller: ControllerId,
    ) -> Result<BTreeSet<LogicalDriveId>, Error> {
        let tables = self.controller_tables(controller)?;
        Ok(table_rows(&tables, 'u').map(|row| row.num).collect())
    }

    fn logical_drives(&self, controller: ControllerId) -> Result<Vec<LogicalDrive>, Error> {
        let tables = self.controller_tables(controller)?;
        let ports = parse_ports(&tables);
        Ok(parse_units(&tables)?
            .iter()
            .map(|u| logical_drive_from(controller, u, &ports))
            .collect())
    }

    fn logical_drive(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<LogicalDrive, Error> {
        self.logical_drives(controller)?
            .into_iter()
            .find(|d| d.id == drive)
            .ok_or(Error::LogicalDriveNotFound { controller, drive })
    }

    fn physical_drives(
        &self,
        controller: ControllerId,
        logical_drive: Option<LogicalDriveId>,
    ) -> Result<Vec<PhysicalDrive>, Error> {
        let tables = self.controller_tables(controller)?;
        parse_ports(&tables)
            .iter()
            .filter(|(_, unit)| logical_drive.is_none_or(|ld| *unit == Some(ld)))
            .map(|(port, _)| self.physical_drive(controller, port))
            .collect()
    }

    fn physical_drive(
        &self,
        controller: ControllerId,
        drive: &str,
    ) -> Result<PhysicalDrive, Error> {
        if !is_port(drive) {
            return Err(Error::InvalidArgument {
                value: drive.to_owned(),
                reason: "expected a port id like p0",
            });
        }
        let object = format!("/c{controller}/{drive}");
        let output = self
            .invoker
            .run(Tool::TwCli, &format!("{object} show all"))?;
        let not_found = || Error::PhysicalDriveNotFound {
            controller,
            drive: drive.to_owned(),
        };
        if error_line(&output).is_some() {
            return Err(not_found());
        }
        let object = format!("{object} ");
        let attr = |key: &str| {
            attribute(&output, &object, key).ok_or_else(|| Error::InvalidField {
                record: object.trim_end().to_owned(),
                field: key.to_owned(),
            })
        };

        let status_word = attr("Status")?;
        if status_word == NOT_PRESENT {
            return Err(not_found());
        }
        let status = map_code(&PORT_STATUS, "port status", status_word)?;
        // ie. "931.51 GB (1953525168 Blocks)"
        let bytes = attr("Capacity")?
            .split_once('(')
            .and_then(|(_, b)| b.split_ascii_whitespace().next())
            .and_then(|b| b.parse::<u64>().ok())
            .and_then(|b| b.checked_mul(BLOCK_SIZE))
            .ok_or_else(|| Error::InvalidField {
                record: object.trim_end().to_owned(),
                field: "Capacity".to_owned(),
            })?;
        let in_unit = attribute(&output, &object, "Belongs to Unit")
            .is_some_and(|u| u.starts_with('u'));
        let state = if status == PhysicalDriveStatus::Failed {
            PhysicalDriveState::Failed
        } else if in_unit {
            PhysicalDriveState::Online
        } else {
            PhysicalDriveState::Ready
        };

        Ok(PhysicalDrive {
            id: drive.to_owned(),
            controller_id: controller,
            firmware: attr("Firmware Version")?.to_owned(),
            size: terabytes(bytes),
            model: attr("Model")?.to_owned(),
            serial: attr("Serial")?.to_owned(),
            state,
            status,
        })
    }

    fn submit_creation(
        &self,
        controller: ControllerId,
        physical_drives: &str,
    ) -> Result<bool, Error> {
        if !physical_drives.split(':').all(is_port) {
            return Err(Error::InvalidArgument {
                value: physical_drives.to_owned(),
                reason: "expected port ids like p0:p1",
            });
        }
        let ports = physical_drives
            .split(':')
            .filter_map(|p| p.strip_prefix('p'))
            .join(":");
        self.configure(&format!(
            "/c{controller} add {CREATE_POLICY} disk={ports}"
        ))
    }

    fn submit_deletion(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<bool, Error> {
        self.configure(&format!("/c{controller}/u{drive} del quiet"))
    }

    fn set_indicator_led(
        &self,
        controller: ControllerId,
        drive: &str,
        on: bool,
    ) -> Result<bool, Error> {
        if !is_port(drive) {
            return Err(Error::InvalidArgument {
                value: drive.to_owned(),
                reason: "expected a port id like p0",
            });
        }
        let value = if on { "on" } else { "off" };
        if !self.configure(&format!("/c{controller}/{drive} set identify={value}"))? {
            return Err(Error::LedOperationFailed {
                controller,
                drive: drive.to_owned(),
                on,
            });
        }
        log::info!("Identify LED of port {drive} on controller {controller}: {value}");
        Ok(true)
    }
}
