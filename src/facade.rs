//! Uniform operations for the automation agent
//!
//! Every operation returns a [`Response`], errors never go past this module.

use crate::{
    backend::Error,
    model::{Controller, ControllerId, DriveName, LogicalDrive, LogicalDriveId, PhysicalDrive},
    select::Context,
};

/// Normalized operation result
#[derive(Debug, serde::Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub(crate) enum Response<T> {
    /// Operation succeeded
    Success {
        /// Payload
        data: T,
    },
    /// Operation failed
    Failure {
        /// Error kind, ie. `controller_not_found`
        kind: &'static str,
        /// Human readable diagnostic
        message: String,
    },
}

impl<T> Response<T> {
    /// Whether the operation succeeded
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }
}

impl<T> From<Result<T, Error>> for Response<T> {
    fn from(res: Result<T, Error>) -> Self {
        match res {
            Ok(data) => Response::Success { data },
            Err(err) => {
                log::warn!("{err}");
                Response::Failure {
                    kind: (&err).into(),
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Single record or full listing
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    /// Requested record
    One(T),
    /// All records
    Many(Vec<T>),
}

/// Controller details, for all controllers if none is given
pub(crate) fn info(
    ctx: &Context,
    controller: Option<ControllerId>,
) -> Response<OneOrMany<Controller>> {
    ctx.backend()
        .and_then(|b| match controller {
            Some(id) => b.controller(id).map(OneOrMany::One),
            None => b
                .list_controllers()?
                .into_iter()
                .map(|id| b.controller(id))
                .collect::<Result<_, _>>()
                .map(OneOrMany::Many),
        })
        .into()
}

/// Logical drive details, for all drives of the controller if none is given
pub(crate) fn logical_drive(
    ctx: &Context,
    controller: ControllerId,
    drive: Option<LogicalDriveId>,
) -> Response<OneOrMany<LogicalDrive>> {
    ctx.backend()
        .and_then(|b| match drive {
            Some(drive) => b.logical_drive(controller, drive).map(OneOrMany::One),
            None => b.logical_drives(controller).map(OneOrMany::Many),
        })
        .into()
}

/// Logical drive details from its global name, ie. `c2u35`
pub(crate) fn logical_drive_by_name(ctx: &Context, name: &str) -> Response<LogicalDrive> {
    ctx.backend()
        .and_then(|b| {
            let name: DriveName = name.parse().map_err(|reason| Error::InvalidArgument {
                value: name.to_owned(),
                reason,
            })?;
            b.logical_drive(name.controller, name.drive)
        })
        .into()
}

/// Create a logical drive from physical drives
pub(crate) fn logical_drive_create(
    ctx: &Context,
    controller: ControllerId,
    physical_drives: &str,
) -> Response<LogicalDrive> {
    ctx.backend()
        .and_then(|b| b.create_logical_drive(controller, physical_drives))
        .into()
}

/// Delete a logical drive
pub(crate) fn logical_drive_delete(
    ctx: &Context,
    controller: ControllerId,
    drive: LogicalDriveId,
) -> Response<LogicalDrive> {
    ctx.backend()
        .and_then(|b| b.delete_logical_drive(controller, drive))
        .into()
}

/// Physical drive details, for all drives of the controller if none is given
pub(crate) fn physical_drive(
    ctx: &Context,
    controller: ControllerId,
    drive: Option<&str>,
) -> Response<OneOrMany<PhysicalDrive>> {
    ctx.backend()
        .and_then(|b| match drive {
            Some(drive) => b.physical_drive(controller, drive).map(OneOrMany::One),
            None => b.physical_drives(controller, None).map(OneOrMany::Many),
        })
        .into()
}

/// Switch a physical drive indicator LED
pub(crate) fn led(
    ctx: &Context,
    controller: ControllerId,
    drive: &str,
    on: bool,
) -> Response<bool> {
    ctx.backend()
        .and_then(|b| b.set_indicator_led(controller, drive, on))
        .into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{backend::Perc8xx, tests::BinaryMock};

    const CONTROLLERS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<OMA cli="true">
<Controllers>
<DCStorageObject>
<ControllerNum>0</ControllerNum>
<Name>PERC H710P Mini</Name>
<FirmwareVer>21.3.0-0009</FirmwareVer>
<PciID>1000:5B:1028:1F34</PciID>
<PCISlot>Embedded</PCISlot>
</DCStorageObject>
</Controllers>
</OMA>
"#;

    fn perc_context(mock: &BinaryMock) -> Context {
        Context::with_backend(Some(Box::new(Perc8xx::new(mock.invoker()))))
    }

    #[test]
    fn unavailable_backend() {
        let ctx = Context::with_backend(None);
        let responses = [
            serde_json::to_value(info(&ctx, None)).unwrap(),
            serde_json::to_value(logical_drive(&ctx, 0, None)).unwrap(),
            serde_json::to_value(logical_drive_by_name(&ctx, "c0u1")).unwrap(),
            serde_json::to_value(logical_drive_create(&ctx, 0, "0:0:1")).unwrap(),
            serde_json::to_value(logical_drive_delete(&ctx, 0, 1)).unwrap(),
            serde_json::to_value(physical_drive(&ctx, 0, Some("0:0:1"))).unwrap(),
            serde_json::to_value(led(&ctx, 0, "0:0:1", true)).unwrap(),
        ];
        for response in responses {
            assert_eq!(response["result"], "failure");
            assert_eq!(response["kind"], "no_backend_available");
            assert!(
                response["message"]
                    .as_str()
                    .unwrap()
                    .contains("unavailable")
            );
        }
    }

    #[serial_test::serial]
    #[test]
    fn info_success() {
        let mock = BinaryMock::new().unwrap();
        mock.add(
            "omreport",
            &[
                CONTROLLERS_XML.as_bytes(),
                CONTROLLERS_XML.as_bytes(),
                CONTROLLERS_XML.as_bytes(),
            ],
        )
        .unwrap();
        let ctx = perc_context(&mock);

        let controller = json!({
            "id": 0,
            "model": "PERC H710P Mini",
            "firmware": "21.3.0-0009",
            "pci_id": "1000:5B:1028:1F34",
            "slot": "Embedded",
        });
        let all = info(&ctx, None);
        assert!(all.is_success());
        assert_eq!(
            serde_json::to_value(all).unwrap(),
            json!({"result": "success", "data": [controller.clone()]})
        );
        assert_eq!(
            serde_json::to_value(info(&ctx, Some(0))).unwrap(),
            json!({"result": "success", "data": controller})
        );
    }

    #[serial_test::serial]
    #[test]
    fn distinct_failure_kinds() {
        let mock = BinaryMock::new().unwrap();
        mock.add("omreport", &[CONTROLLERS_XML.as_bytes(), b"not xml"])
            .unwrap();
        let ctx = perc_context(&mock);

        let missing = info(&ctx, Some(3));
        assert!(!missing.is_success());
        assert_eq!(
            serde_json::to_value(missing).unwrap(),
            json!({
                "result": "failure",
                "kind": "controller_not_found",
                "message": "Controller 3 not found",
            })
        );
        assert_eq!(
            serde_json::to_value(info(&ctx, Some(0))).unwrap()["kind"],
            "malformed_output"
        );
        assert_eq!(
            serde_json::to_value(logical_drive_by_name(&ctx, "c0x1")).unwrap()["kind"],
            "invalid_argument"
        );
        // Name is rejected before any tool runs
        assert_eq!(mock.calls("omreport").unwrap().len(), 2);
    }

    #[serial_test::serial]
    #[test]
    fn logical_drive_listing() {
        let vdisks = r#"<OMA cli="true">
<VirtualDisks>
<DCStorageObject>
<LogicalDriveNum>1</LogicalDriveNum>
<DeviceName>/dev/sdb</DeviceName>
<ObjStatus>2</ObjStatus>
<Layout>4</Layout>
</DCStorageObject>
</VirtualDisks>
</OMA>
"#;
        let pdisks = r#"<OMA cli="true">
<ArrayDisks>
<DCStorageObject>
<Channel>0</Channel>
<TargetID>3</TargetID>
<Revision>GS0D</Revision>
<Length>4000787030016</Length>
<ProductID>ST4000NM0023</ProductID>
<DeviceSerialNumber>Z1Z2ABCD</DeviceSerialNumber>
<ObjState>4</ObjState>
<ObjStatus>2</ObjStatus>
</DCStorageObject>
</ArrayDisks>
</OMA>
"#;
        let mock = BinaryMock::new().unwrap();
        mock.add("omreport", &[vdisks.as_bytes(), pdisks.as_bytes()])
            .unwrap();
        let ctx = perc_context(&mock);

        assert_eq!(
            serde_json::to_value(logical_drive(&ctx, 0, None)).unwrap(),
            json!({
                "result": "success",
                "data": [{
                    "id": 1,
                    "controller_id": 0,
                    "name": "c0u1",
                    "device_path": "/dev/sdb",
                    "status": "Online",
                    "type": "RAID-1",
                    "physical_drives": ["0:0:3"],
                }],
            })
        );
    }

    #[serial_test::serial]
    #[test]
    fn missing_tool() {
        let mock = BinaryMock::new().unwrap();
        let ctx = perc_context(&mock);
        assert_eq!(
            serde_json::to_value(physical_drive(&ctx, 0, None)).unwrap()["kind"],
            "tool_unavailable"
        );
    }
}
