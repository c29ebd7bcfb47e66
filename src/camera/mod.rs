//! Camera source classification.
//!
//! This module turns configuration inputs into validated device identities:
//! - On-board (MIPI) sensors, after platform link bring-up (`platform`)
//! - USB video devices named by their device node (`usb`)
//! - Pre-recorded fallback videos discovered in a directory (`fallback`)
//!
//! Every constructor either returns a fully resolved `DeviceIdentity` or a
//! tagged `ProvisionError`. A failed candidate never aborts allocation; the
//! caller moves on to the next one.

pub mod fallback;
pub mod platform;
pub mod usb;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};

pub use fallback::{
    create_fallback_source, enumerate_fallback_candidates, FallbackCandidates, FallbackScan,
};
pub use platform::{
    init_on_board_sensor, platform_supports_on_board_sensor, LinkControl, Platform,
    ShellLinkControl,
};
pub use usb::{create_usb_device, DeviceNamespace};

/// Source kind of a camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraKind {
    OnBoardSensor,
    UsbDevice,
    FallbackFile,
    Unknown,
}

impl CameraKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraKind::OnBoardSensor => "MIPI camera",
            CameraKind::UsbDevice => "USB camera",
            CameraKind::FallbackFile => "fallback video",
            CameraKind::Unknown => "unknown camera",
        }
    }
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An absolute filesystem path that has been checked at construction time.
///
/// Only this crate can build one, so a `DeviceIdentity` can never carry a
/// bare handle name such as `video8`:
///
/// ```compile_fail
/// use std::path::PathBuf;
/// use rtsp_camera_hub::camera::{DeviceIdentity, ResolvedPath};
///
/// let id = DeviceIdentity::UsbDevice(ResolvedPath(PathBuf::from("video8")));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub(crate) fn new(path: PathBuf) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(ProvisionError::invalid_argument("empty path"));
        }
        if !path.is_absolute() {
            return Err(ProvisionError::invalid_argument(format!(
                "'{}' is not an absolute path",
                path.display()
            )));
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One validated camera source. The variant fixes how the path is read.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceIdentity {
    /// Capture device node of the on-board sensor (e.g. `/dev/video4`).
    OnBoardSensor(ResolvedPath),
    /// USB video device node (e.g. `/dev/video8`).
    UsbDevice(ResolvedPath),
    /// Absolute path of a pre-recorded video.
    FallbackFile(ResolvedPath),
}

impl DeviceIdentity {
    pub fn kind(&self) -> CameraKind {
        match self {
            DeviceIdentity::OnBoardSensor(_) => CameraKind::OnBoardSensor,
            DeviceIdentity::UsbDevice(_) => CameraKind::UsbDevice,
            DeviceIdentity::FallbackFile(_) => CameraKind::FallbackFile,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DeviceIdentity::OnBoardSensor(path)
            | DeviceIdentity::UsbDevice(path)
            | DeviceIdentity::FallbackFile(path) => path.as_path(),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type: {}; ID: {}", self.kind(), self.path().display())
    }
}
