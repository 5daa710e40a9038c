//! Backend selection from detected PCI hardware

use std::{fs, path::Path};

use crate::{
    backend::{Backend, BackendKind, Error},
    tool::Invoker,
};

/// Default kernel PCI device list
pub(crate) const PCI_DEVICES: &str = "/proc/bus/pci/devices";

/// Supported controllers, by concatenated PCI vendor and device ids
const SUPPORTED_MODELS: [(&str, BackendKind); 3] = [
    ("10000079", BackendKind::Perc8xx),
    ("1000005b", BackendKind::Perc8xx),
    ("13c11004", BackendKind::Lsi3ware),
];

/// Find the backend of the first supported device in a PCI device list
///
/// Each line is tab separated, the second column holds the vendor and device ids.
fn match_pci_ids(devices: &str) -> Option<BackendKind> {
    devices.lines().find_map(|l| {
        let id = l.split('\t').nth(1)?;
        SUPPORTED_MODELS
            .iter()
            .find_map(|(m, k)| m.eq_ignore_ascii_case(id).then_some(*k))
    })
}

/// Detect backend kind from the PCI devices file
pub(crate) fn detect(pci_devices: &Path) -> Option<BackendKind> {
    let devices = match fs::read_to_string(pci_devices) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Unable to read PCI devices from {pci_devices:?}: {e}");
            return None;
        }
    };
    let kind = match_pci_ids(&devices);
    match kind {
        Some(k) => log::debug!("Detected {k} controller"),
        None => log::info!("No supported storage controller in {pci_devices:?}"),
    }
    kind
}

/// Selected backend, or its absence, for the duration of a run
pub(crate) struct Context {
    /// Backend, if supported hardware was found
    backend: Option<Box<dyn Backend>>,
}

impl Context {
    /// Select backend, either forced or detected from hardware
    pub(crate) fn setup(
        forced: Option<BackendKind>,
        pci_devices: &Path,
        invoker: Invoker,
    ) -> Self {
        let kind = forced.or_else(|| detect(pci_devices));
        Self {
            backend: kind.map(|k| k.backend(invoker)),
        }
    }

    /// Context with a given backend
    #[cfg(test)]
    pub(crate) fn with_backend(backend: Option<Box<dyn Backend>>) -> Self {
        Self { backend }
    }

    /// Selected backend
    pub(crate) fn backend(&self) -> Result<&dyn Backend, Error> {
        self.backend.as_deref().ok_or(Error::NoBackendAvailable)
    }
}
