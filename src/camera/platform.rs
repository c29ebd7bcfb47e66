//! On-board sensor support.
//!
//! MIPI sensors are only usable on a fixed set of boards. Support is decided
//! by comparing the host name against that set; it is a gate, not a probe.
//! Bring-up runs the board's `media-ctl` link commands in order and stops at
//! the first non-zero exit status.

use std::path::PathBuf;
use std::process::Command;

use super::{DeviceIdentity, ResolvedPath};
use crate::error::{ProvisionError, Result};

/// A board with a supported MIPI capture path.
#[derive(Debug)]
pub struct Platform {
    /// Host name the board reports.
    pub name: &'static str,
    pub soc: &'static str,
    /// Capture node that becomes usable once the links are configured.
    pub capture_node: &'static str,
    /// Link-control commands, executed in order.
    pub link_steps: &'static [&'static str],
    /// Encoder bitrate (bits/s) the board sustains for the MIPI sensor.
    pub sensor_bitrate: u32,
    /// Encoder bitrate (bits/s) the board sustains for USB cameras.
    pub usb_bitrate: u32,
}

const RZG2E_LINK_STEPS: &[&str] = &[
    "media-ctl -d /dev/media0 -r",
    "media-ctl -d /dev/media0 -l \"'rcar_csi2 feaa0000.csi2':1 -> 'VIN4 output':0 [1]\"",
    "media-ctl -d /dev/media0 -V \"'rcar_csi2 feaa0000.csi2':1 [fmt:UYVY8_2X8/1280x960 field:none]\"",
    "media-ctl -d /dev/media0 -V \"'ov5645 3-003c':0 [fmt:UYVY8_2X8/1280x960 field:none]\"",
];

const RZG2MN_LINK_STEPS: &[&str] = &[
    "media-ctl -d /dev/media0 -r",
    "media-ctl -d /dev/media0 -l \"'rcar_csi2 fea80000.csi2':1 -> 'VIN4 output':0 [1]\"",
    "media-ctl -d /dev/media0 -V \"'rcar_csi2 fea80000.csi2':1 [fmt:UYVY8_2X8/1280x960 field:none]\"",
    "media-ctl -d /dev/media0 -V \"'ov5645 2-003c':0 [fmt:UYVY8_2X8/1280x960 field:none]\"",
];

pub const SUPPORTED_PLATFORMS: &[Platform] = &[
    Platform {
        name: "ek874",
        soc: "RZ/G2E",
        capture_node: "/dev/video0",
        link_steps: RZG2E_LINK_STEPS,
        sensor_bitrate: 2_500_000,
        usb_bitrate: 2_000_000,
    },
    Platform {
        name: "hihope-rzg2m",
        soc: "RZ/G2M",
        capture_node: "/dev/video4",
        link_steps: RZG2MN_LINK_STEPS,
        sensor_bitrate: 4_000_000,
        usb_bitrate: 4_000_000,
    },
    Platform {
        name: "hihope-rzg2n",
        soc: "RZ/G2N",
        capture_node: "/dev/video4",
        link_steps: RZG2MN_LINK_STEPS,
        sensor_bitrate: 4_000_000,
        usb_bitrate: 4_000_000,
    },
];

/// Look up a board by host name (exact match).
pub fn lookup(host: &str) -> Option<&'static Platform> {
    SUPPORTED_PLATFORMS.iter().find(|platform| platform.name == host)
}

pub fn platform_supports_on_board_sensor(host: &str) -> bool {
    lookup(host).is_some()
}

/// Kernel host name of the running machine.
#[cfg(target_os = "linux")]
pub fn host_name() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for `buf.len()` bytes and gethostname writes at most that many.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok()
}

#[cfg(not(target_os = "linux"))]
pub fn host_name() -> Option<String> {
    None
}

/// Runs one link-control command and reports its exit status.
///
/// `Ok(None)` means the command ended without an exit code (killed by a
/// signal). Calls block until the command finishes.
pub trait LinkControl {
    fn execute(&mut self, command: &str) -> std::io::Result<Option<i32>>;
}

/// Runs link-control commands through `sh -c`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellLinkControl;

impl LinkControl for ShellLinkControl {
    fn execute(&mut self, command: &str) -> std::io::Result<Option<i32>> {
        let status = Command::new("sh").arg("-c").arg(command).status()?;
        Ok(status.code())
    }
}

/// Bring up the on-board sensor of `host`.
///
/// All-or-nothing: the first command that fails (or cannot be spawned)
/// aborts the sequence and no identity is returned.
pub fn init_on_board_sensor(host: &str, link: &mut dyn LinkControl) -> Result<DeviceIdentity> {
    let platform = lookup(host).ok_or_else(|| {
        ProvisionError::unsupported(format!("MIPI camera is not supported on '{host}'"))
    })?;

    log::debug!(
        "initializing MIPI camera on {} ({})",
        platform.name,
        platform.soc
    );
    for command in platform.link_steps {
        log::debug!("link-control: {command}");
        let status = match link.execute(command) {
            Ok(status) => status,
            Err(err) => {
                log::warn!("link-control: cannot run '{command}': {err}");
                None
            }
        };
        if status != Some(0) {
            return Err(ProvisionError::ExternalToolFailure {
                command: command.to_string(),
                status,
            });
        }
    }

    let path = ResolvedPath::new(PathBuf::from(platform.capture_node))?;
    log::info!("MIPI camera initialized at {}", platform.capture_node);
    Ok(DeviceIdentity::OnBoardSensor(path))
}
