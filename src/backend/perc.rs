//! Dell PERC controllers, through OpenManage `omreport` and `omconfig`

use std::collections::BTreeSet;

use super::{Backend, Error, ensure_argument, map_code};
use crate::{
    model::{
        Controller, ControllerId, DriveName, LogicalDrive, LogicalDriveId, LogicalDriveStatus,
        PhysicalDrive, PhysicalDriveId, PhysicalDriveState, PhysicalDriveStatus, RaidType,
        terabytes,
    },
    tool::{Invoker, Tool},
    tree::Element,
};

/// Controller list container
const CONTROLLERS: &str = "Controllers";
/// Virtual disk list container
const VIRTUAL_DISKS: &str = "VirtualDisks";
/// Physical disk list container
const ARRAY_DISKS: &str = "ArrayDisks";
/// Configuration command status
const CUSTOM_STAT: &str = "CustomStat";

/// `ObjStatus` of virtual disks
const LOGICAL_DRIVE_STATUS: [(&str, LogicalDriveStatus); 2] = [
    ("2", LogicalDriveStatus::Online),
    ("4", LogicalDriveStatus::Failed),
];

/// `Layout` of virtual disks
const RAID_LAYOUT: [(&str, RaidType); 2] = [("2", RaidType::Raid0), ("4", RaidType::Raid1)];

/// `ObjState` of physical disks
const PHYSICAL_DRIVE_STATE: [(&str, PhysicalDriveState); 3] = [
    ("1", PhysicalDriveState::Ready),
    ("2", PhysicalDriveState::Failed),
    ("4", PhysicalDriveState::Online),
];

/// `ObjStatus` of physical disks
const PHYSICAL_DRIVE_STATUS: [(&str, PhysicalDriveStatus); 3] = [
    ("2", PhysicalDriveStatus::Ok),
    ("3", PhysicalDriveStatus::NonCritical),
    ("4", PhysicalDriveStatus::Failed),
];

/// Virtual disk creation policy
// TODO make policy configurable per controller, to handle OS and data drives on separate controllers
const CREATE_POLICY: &str = "raid=r0 size=max stripesize=64kb diskcachepolicy=disabled readpolicy=ara writepolicy=wb";

/// Characters allowed in physical disk ids and id lists, ie. `0:0:1,0:0:2`
fn is_pdisk_char(c: char) -> bool {
    c.is_ascii_digit() || c == ':' || c == ','
}

/// Dell PERC 5/6/H7xx/H8xx backend
pub(crate) struct Perc8xx {
    /// Tool runner
    invoker: Invoker,
}

impl Perc8xx {
    /// Build backend
    pub(crate) fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    /// Run tool and parse its XML output
    fn query(&self, tool: Tool, args: &str) -> Result<Element, Error> {
        let output = self.invoker.run(tool, &format!("{args} -fmt xml"))?;
        output.parse::<Element>().map_err(|e| Error::MalformedOutput {
            tool,
            reason: e.to_string(),
        })
    }

    /// Run `omreport` query
    fn report(&self, args: &str) -> Result<Element, Error> {
        self.query(Tool::OmReport, args)
    }

    /// Run `omconfig` command, and return whether it succeeded
    fn configure(&self, args: &str) -> Result<bool, Error> {
        let res = self.query(Tool::OmConfig, args)?;
        Ok(res.find(CUSTOM_STAT).is_some_and(|s| s.text == "0"))
    }

    /// Virtual disk records of a controller, or a single one
    fn virtual_disks(
        &self,
        controller: ControllerId,
        drive: Option<LogicalDriveId>,
    ) -> Result<Element, Error> {
        let mut args = format!("storage vdisk controller={controller}");
        if let Some(drive) = drive {
            args.push_str(&format!(" vdisk={drive}"));
        }
        let mut res = self.report(&args)?;
        take_section(&mut res, VIRTUAL_DISKS)
    }

    /// Build logical drive from its record, fetching its physical drives
    fn logical_drive_from(
        &self,
        controller: ControllerId,
        record: &Element,
    ) -> Result<LogicalDrive, Error> {
        let id: LogicalDriveId = record.parse_field("LogicalDriveNum")?;
        let physical_drives = self
            .physical_drives(controller, Some(id))?
            .into_iter()
            .map(|p| p.id)
            .collect();
        parse_logical_drive(record, controller, physical_drives)
    }
}

/// Detach a container from a response
fn take_section(res: &mut Element, name: &'static str) -> Result<Element, Error> {
    let pos = res
        .children
        .iter()
        .position(|c| c.name == name)
        .ok_or(Error::MissingSection(name))?;
    Ok(res.children.swap_remove(pos))
}

/// Record of a container whose id field has a given value
fn find_record<'a>(section: &'a Element, id_field: &str, id: u32) -> Option<&'a Element> {
    section
        .children
        .iter()
        .find(|r| r.parse_field::<u32>(id_field).is_ok_and(|v| v == id))
}

/// Parse `DCStorageObject` controller record
fn parse_controller(record: &Element) -> Result<Controller, Error> {
    Ok(Controller {
        id: record.parse_field("ControllerNum")?,
        model: record.field("Name")?.to_owned(),
        firmware: record.field("FirmwareVer")?.to_owned(),
        pci_id: record.field("PciID")?.to_owned(),
        slot: Some(record.field("PCISlot")?.to_owned()),
    })
}

/// Parse `DCStorageObject` virtual disk record
fn parse_logical_drive(
    record: &Element,
    controller: ControllerId,
    physical_drives: Vec<PhysicalDriveId>,
) -> Result<LogicalDrive, Error> {
    let id = record.parse_field("LogicalDriveNum")?;
    let device_path = record.field("DeviceName")?;
    Ok(LogicalDrive {
        id,
        controller_id: controller,
        name: DriveName {
            controller,
            drive: id,
        },
        device_path: (!device_path.is_empty()).then(|| device_path.to_owned()),
        status: map_code(
            &LOGICAL_DRIVE_STATUS,
            "logical drive status",
            record.field("ObjStatus")?,
        )?,
        raid_type: map_code(&RAID_LAYOUT, "RAID layout", record.field("Layout")?)?,
        physical_drives,
    })
}

/// Parse `DCStorageObject` array disk record
fn parse_physical_drive(
    record: &Element,
    controller: ControllerId,
) -> Result<PhysicalDrive, Error> {
    let length: u64 = record.parse_field("Length")?;
    Ok(PhysicalDrive {
        id: format!(
            "{}:0:{}",
            record.field("Channel")?,
            record.field("TargetID")?
        ),
        controller_id: controller,
        firmware: record.field("Revision")?.to_owned(),
        // Reported in decimal units
        size: terabytes(length),
        model: record.field("ProductID")?.to_owned(),
        serial: record.field("DeviceSerialNumber")?.to_owned(),
        state: map_code(
            &PHYSICAL_DRIVE_STATE,
            "physical drive state",
            record.field("ObjState")?,
        )?,
        status: map_code(
            &PHYSICAL_DRIVE_STATUS,
            "physical drive status",
            record.field("ObjStatus")?,
        )?,
    })
}

impl Backend for Perc8xx {
    fn list_controllers(&self) -> Result<Vec<ControllerId>, Error> {
        self.report("storage controller")?
            .section(CONTROLLERS)?
            .children
            .iter()
            .map(|c| c.parse_field("ControllerNum"))
            .collect()
    }

    fn controller(&self, id: ControllerId) -> Result<Controller, Error> {
        let res = self.report(&format!("storage controller controller={id}"))?;
        find_record(res.section(CONTROLLERS)?, "ControllerNum", id)
            .ok_or(Error::ControllerNotFound(id))
            .and_then(parse_controller)
    }

    fn logical_drive_ids(
        &self,
        controller: ControllerId,
    ) -> Result<BTreeSet<LogicalDriveId>, Error> {
        self.virtual_disks(controller, None)?
            .children
            .iter()
            .map(|r| r.parse_field("LogicalDriveNum"))
            .collect()
    }

    fn logical_drives(&self, controller: ControllerId) -> Result<Vec<LogicalDrive>, Error> {
        self.virtual_disks(controller, None)?
            .children
            .iter()
            .map(|r| self.logical_drive_from(controller, r))
            .collect()
    }

    fn logical_drive(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<LogicalDrive, Error> {
        let disks = self.virtual_disks(controller, Some(drive))?;
        let record = find_record(&disks, "LogicalDriveNum", drive)
            .ok_or(Error::LogicalDriveNotFound { controller, drive })?;
        self.logical_drive_from(controller, record)
    }

    fn physical_drives(
        &self,
        controller: ControllerId,
        logical_drive: Option<LogicalDriveId>,
    ) -> Result<Vec<PhysicalDrive>, Error> {
        let mut args = format!("storage pdisk controller={controller}");
        if let Some(logical_drive) = logical_drive {
            args.push_str(&format!(" vdisk={logical_drive}"));
        }
        self.report(&args)?
            .section(ARRAY_DISKS)?
            .children
            .iter()
            .map(|r| parse_physical_drive(r, controller))
            .collect()
    }

    fn physical_drive(
        &self,
        controller: ControllerId,
        drive: &str,
    ) -> Result<PhysicalDrive, Error> {
        ensure_argument(drive, is_pdisk_char)?;
        self.report(&format!("storage pdisk controller={controller} pdisk={drive}"))?
            .section(ARRAY_DISKS)?
            .children
            .first()
            .ok_or_else(|| Error::PhysicalDriveNotFound {
                controller,
                drive: drive.to_owned(),
            })
            .and_then(|r| parse_physical_drive(r, controller))
    }

    fn submit_creation(
        &self,
        controller: ControllerId,
        physical_drives: &str,
    ) -> Result<bool, Error> {
        ensure_argument(physical_drives, is_pdisk_char)?;
        self.configure(&format!(
            "storage controller controller={controller} action=createvdisk pdisk={physical_drives} {CREATE_POLICY}"
        ))
    }

    fn submit_deletion(
        &self,
        controller: ControllerId,
        drive: LogicalDriveId,
    ) -> Result<bool, Error> {
        self.configure(&format!(
            "storage vdisk controller={controller} vdisk={drive} action=deletevdisk"
        ))
    }

    fn set_indicator_led(
        &self,
        controller: ControllerId,
        drive: &str,
        on: bool,
    ) -> Result<bool, Error> {
        ensure_argument(drive, is_pdisk_char)?;
        let action = if on { "blink" } else { "unblink" };
        if !self.configure(&format!(
            "storage pdisk action={action} controller={controller} pdisk={drive}"
        ))? {
            return Err(Error::LedOperationFailed {
                controller,
                drive: drive.to_owned(),
                on,
            });
        }
        log::info!(
            "Indicator LED of physical drive {drive} on controller {controller}: {action}"
        );
        Ok(true)
    }
}
