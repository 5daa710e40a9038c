//! Logical drive creation and deletion on top of the raw vendor commands

use std::collections::BTreeSet;

use itertools::Itertools as _;

use super::{Backend, Error};
use crate::model::{ControllerId, LogicalDrive, LogicalDriveId, LogicalDriveStatus};

/// Find the single id present in `after` but not in `before`
///
/// Returns the number of new ids if it is not exactly one.
pub(crate) fn new_drive_id(
    before: &BTreeSet<LogicalDriveId>,
    after: &BTreeSet<LogicalDriveId>,
) -> Result<LogicalDriveId, usize> {
    after
        .difference(before)
        .copied()
        .exactly_one()
        .map_err(Iterator::count)
}

/// Create a logical drive and identify it
///
/// Vendor tools only report whether the creation succeeded, so the new drive
/// is found by comparing the drive ids before and after. A concurrent change
/// on the same controller makes this fail, never return the wrong drive.
pub(crate) fn create_logical_drive<B>(
    backend: &B,
    controller: ControllerId,
    physical_drives: &str,
) -> Result<LogicalDrive, Error>
where
    B: Backend + ?Sized,
{
    let before = backend.logical_drive_ids(controller)?;
    log::debug!(
        "Logical drives on controller {controller} before creation: {}",
        before.iter().join(", ")
    );

    if !backend.submit_creation(controller, physical_drives)? {
        return Err(Error::CreationFailed {
            controller,
            physical_drives: physical_drives.to_owned(),
        });
    }

    let after = backend.logical_drive_ids(controller)?;
    log::debug!(
        "Logical drives on controller {controller} after creation: {}",
        after.iter().join(", ")
    );
    let id = new_drive_id(&before, &after).map_err(|new_count| Error::CreationAmbiguous {
        controller,
        physical_drives: physical_drives.to_owned(),
        new_count,
    })?;

    let drive = backend.logical_drive(controller, id)?;
    log::info!(
        "Created logical drive {} from physical drives {physical_drives}",
        drive.name
    );
    Ok(drive)
}

/// Delete a logical drive, and return its state captured just before
pub(crate) fn delete_logical_drive<B>(
    backend: &B,
    controller: ControllerId,
    drive: LogicalDriveId,
) -> Result<LogicalDrive, Error>
where
    B: Backend + ?Sized,
{
    let mut removed = backend.logical_drive(controller, drive)?;
    if !backend.submit_deletion(controller, drive)? {
        return Err(Error::DeletionFailed { controller, drive });
    }
    log::info!("Deleted logical drive {}", removed.name);
    removed.status = LogicalDriveStatus::Removed;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::model::{Controller, DriveName, PhysicalDrive, RaidType};

    fn ids(v: &[LogicalDriveId]) -> BTreeSet<LogicalDriveId> {
        v.iter().copied().collect()
    }

    #[test]
    fn single_new_id() {
        assert_eq!(new_drive_id(&ids(&[1, 2]), &ids(&[1, 2, 3])), Ok(3));
        assert_eq!(new_drive_id(&ids(&[]), &ids(&[0])), Ok(0));
        // A drive removed concurrently does not matter
        assert_eq!(new_drive_id(&ids(&[1, 2]), &ids(&[2, 7])), Ok(7));
    }

    #[test]
    fn ambiguous_new_ids() {
        assert_eq!(new_drive_id(&ids(&[1, 2]), &ids(&[1, 2])), Err(0));
        assert_eq!(new_drive_id(&ids(&[1, 2]), &ids(&[1, 2, 3, 4])), Err(2));
        assert_eq!(new_drive_id(&ids(&[1, 2]), &ids(&[1])), Err(0));
    }

    /// In memory controller replaying id snapshots
    struct FakeBackend {
        /// Successive results of `logical_drive_ids`
        snapshots: RefCell<Vec<BTreeSet<LogicalDriveId>>>,
        /// Creation/deletion command success indicator
        command_ok: bool,
        /// Commands run
        commands: RefCell<Vec<String>>,
    }

    impl FakeBackend {
        fn new(snapshots: &[&[LogicalDriveId]], command_ok: bool) -> Self {
            Self {
                snapshots: RefCell::new(snapshots.iter().rev().map(|s| ids(s)).collect()),
                command_ok,
                commands: RefCell::new(Vec::new()),
            }
        }
    }

    impl Backend for FakeBackend {
        fn list_controllers(&self) -> Result<Vec<ControllerId>, Error> {
            Ok(vec![0])
        }

        fn controller(&self, id: ControllerId) -> Result<Controller, Error> {
            Err(Error::ControllerNotFound(id))
        }

        fn logical_drive_ids(
            &self,
            _controller: ControllerId,
        ) -> Result<BTreeSet<LogicalDriveId>, Error> {
            Ok(self.snapshots.borrow_mut().pop().unwrap())
        }

        fn logical_drives(&self, _controller: ControllerId) -> Result<Vec<LogicalDrive>, Error> {
            Ok(Vec::new())
        }

        fn logical_drive(
            &self,
            controller: ControllerId,
            drive: LogicalDriveId,
        ) -> Result<LogicalDrive, Error> {
            Ok(LogicalDrive {
                id: drive,
                controller_id: controller,
                name: DriveName { controller, drive },
                device_path: Some("/dev/sdb".to_owned()),
                status: LogicalDriveStatus::Online,
                raid_type: RaidType::Raid0,
                physical_drives: vec!["0:0:1".to_owned()],
            })
        }

        fn physical_drives(
            &self,
            _controller: ControllerId,
            _logical_drive: Option<LogicalDriveId>,
        ) -> Result<Vec<PhysicalDrive>, Error> {
            Ok(Vec::new())
        }

        fn physical_drive(
            &self,
            controller: ControllerId,
            drive: &str,
        ) -> Result<PhysicalDrive, Error> {
            Err(Error::PhysicalDriveNotFound {
                controller,
                drive: drive.to_owned(),
            })
        }

        fn submit_creation(
            &self,
            _controller: ControllerId,
            physical_drives: &str,
        ) -> Result<bool, Error> {
            self.commands
                .borrow_mut()
                .push(format!("create {physical_drives}"));
            Ok(self.command_ok)
        }

        fn submit_deletion(
            &self,
            _controller: ControllerId,
            drive: LogicalDriveId,
        ) -> Result<bool, Error> {
            self.commands.borrow_mut().push(format!("delete {drive}"));
            Ok(self.command_ok)
        }

        fn set_indicator_led(
            &self,
            _controller: ControllerId,
            _drive: &str,
            _on: bool,
        ) -> Result<bool, Error> {
            Ok(true)
        }
    }

    #[test]
    fn create_finds_new_drive() {
        let backend = FakeBackend::new(&[&[1, 2], &[1, 2, 3]], true);
        let drive = backend.create_logical_drive(0, "0:0:1").unwrap();
        assert_eq!(drive.id, 3);
        assert_eq!(drive.name.to_string(), "c0u3");
        assert_eq!(*backend.commands.borrow(), vec!["create 0:0:1"]);
    }

    #[test]
    fn create_without_new_drive() {
        let backend = FakeBackend::new(&[&[1, 2], &[1, 2]], true);
        assert!(matches!(
            backend.create_logical_drive(0, "0:0:1"),
            Err(Error::CreationAmbiguous { new_count: 0, .. })
        ));
    }

    #[test]
    fn create_with_concurrent_creation() {
        let backend = FakeBackend::new(&[&[1, 2], &[1, 2, 3, 4]], true);
        assert!(matches!(
            backend.create_logical_drive(0, "0:0:1"),
            Err(Error::CreationAmbiguous { new_count: 2, .. })
        ));
    }

    #[test]
    fn create_failure_stops_early() {
        let backend = FakeBackend::new(&[&[1, 2]], false);
        assert!(matches!(
            backend.create_logical_drive(0, "0:0:1"),
            Err(Error::CreationFailed { controller: 0, physical_drives }) if physical_drives == "0:0:1"
        ));
        // Second snapshot never taken
        assert!(backend.snapshots.borrow().is_empty());
    }

    #[test]
    fn delete_overwrites_status_only() {
        let backend = FakeBackend::new(&[], true);
        let before = backend.logical_drive(1, 4).unwrap();
        let removed = backend.delete_logical_drive(1, 4).unwrap();
        assert_eq!(removed.status, LogicalDriveStatus::Removed);
        assert_eq!(
            LogicalDrive {
                status: before.status,
                ..removed
            },
            before
        );
        assert_eq!(*backend.commands.borrow(), vec!["delete 4"]);
    }

    #[test]
    fn delete_failure() {
        let backend = FakeBackend::new(&[], false);
        assert!(matches!(
            backend.delete_logical_drive(1, 4),
            Err(Error::DeletionFailed {
                controller: 1,
                drive: 4
            })
        ));
    }
}
