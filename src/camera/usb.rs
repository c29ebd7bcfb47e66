//! USB camera validation.
//!
//! A USB camera is named by its device node (`video8` or `/dev/video8`).
//! The node must exist. The sysfs `name` attribute is read as a best-effort
//! identity check: UVC devices usually report "UVC Camera", but some real
//! webcams report their product name, so a mismatch is only logged.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{DeviceIdentity, ResolvedPath};
use crate::error::{ProvisionError, Result};

pub const DEFAULT_DEVICE_ROOT: &str = "/dev";
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/video4linux";
pub const UVC_VENDOR_MARKER: &str = "UVC Camera";

/// Where device nodes and their sysfs attributes live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceNamespace {
    pub device_root: PathBuf,
    pub sysfs_root: PathBuf,
}

impl Default for DeviceNamespace {
    fn default() -> Self {
        Self {
            device_root: PathBuf::from(DEFAULT_DEVICE_ROOT),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }
}

impl DeviceNamespace {
    pub fn new(device_root: impl Into<PathBuf>, sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            device_root: device_root.into(),
            sysfs_root: sysfs_root.into(),
        }
    }

    pub fn device_node(&self, node_name: &str) -> PathBuf {
        self.device_root.join(node_name)
    }

    fn name_attribute(&self, node_name: &str) -> PathBuf {
        self.sysfs_root.join(node_name).join("name")
    }

    /// Reduce `video8` or `<device_root>/video8` to `video8`.
    fn node_name<'a>(&self, requested: &'a str) -> Result<&'a str> {
        let requested = requested.trim();
        if requested.is_empty() {
            return Err(ProvisionError::invalid_argument(
                "USB camera node name is empty",
            ));
        }
        let name = match Path::new(requested).strip_prefix(&self.device_root) {
            Ok(rest) => rest.to_str().unwrap_or(requested),
            Err(_) => requested,
        };
        let mut components = Path::new(name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || name.contains('/') {
            return Err(ProvisionError::invalid_argument(format!(
                "'{requested}' is not a device node under {}",
                self.device_root.display()
            )));
        }
        Ok(name)
    }
}

/// Validate a USB camera and resolve it to its device node.
pub fn create_usb_device(namespace: &DeviceNamespace, node_name: &str) -> Result<DeviceIdentity> {
    let name = namespace.node_name(node_name)?;
    let node = namespace.device_node(name);
    if !node.exists() {
        return Err(ProvisionError::not_found(format!(
            "device file '{}' not found",
            node.display()
        )));
    }
    if node.is_dir() {
        return Err(ProvisionError::invalid_argument(format!(
            "'{}' is a directory, not a device node",
            node.display()
        )));
    }
    log::debug!("device file '{}' found", node.display());

    verify_vendor_marker(namespace, name);

    Ok(DeviceIdentity::UsbDevice(ResolvedPath::new(node)?))
}

fn verify_vendor_marker(namespace: &DeviceNamespace, name: &str) {
    let attribute = namespace.name_attribute(name);
    match fs::read_to_string(&attribute) {
        Ok(contents) => {
            let reported = contents.lines().next().unwrap_or("").trim();
            if reported.contains(UVC_VENDOR_MARKER) {
                log::debug!("USB camera '{name}' verified ({reported})");
            } else {
                log::warn!("cannot verify USB camera '{name}' (reports '{reported}'), continuing");
            }
        }
        Err(err) => {
            log::warn!(
                "cannot read {} for USB camera '{name}': {err}",
                attribute.display()
            );
        }
    }
}
