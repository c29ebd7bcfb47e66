use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::camera::fallback::supported_extension;
use crate::error::{ProvisionError, Result};
use crate::pipeline::Resolution;
use crate::slots::CAMERA_SLOTS;

const DEFAULT_VIDEO_DIR: &str = "/home/root";
const DEFAULT_VIDEO_EXT: &str = "mp4";
const DEFAULT_RTSP_PORT: u32 = 5001;
pub const DEFAULT_MOUNT_PATH: &str = "/camera";

pub const REGISTERED_PORT_MIN: u32 = 1024;
pub const REGISTERED_PORT_MAX: u32 = 49151;

pub const CONFIG_PATH_ENV: &str = "CAMERA_HUB_CONFIG";

#[derive(Debug, Deserialize, Default)]
struct HubConfigFile {
    video_dir: Option<PathBuf>,
    video_ext: Option<String>,
    platform: Option<String>,
    rtsp: Option<RtspConfigFile>,
    cameras: Option<CamerasConfigFile>,
    resolution: Option<ResolutionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RtspConfigFile {
    port: Option<u32>,
    ports: Option<Vec<u32>>,
    mount_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CamerasConfigFile {
    mipi: Option<bool>,
    usb: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ResolutionConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub video_dir: Option<PathBuf>,
    pub video_ext: Option<String>,
    pub rtsp_port: Option<u32>,
    pub usb_cameras: Vec<String>,
    pub mipi: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub platform: Option<String>,
}

/// Validated settings for one run, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Absolute, existing directory holding fallback videos.
    pub video_dir: PathBuf,
    /// Lowercase fallback video extension.
    pub video_ext: String,
    /// One RTSP port per slot, by position.
    pub ports: [u16; CAMERA_SLOTS],
    /// Mount path shared by every endpoint.
    pub mount_path: String,
    /// USB device nodes in request order.
    pub usb_cameras: Vec<String>,
    pub mipi_enabled: bool,
    pub resolution: Option<Resolution>,
    /// Host name override used to select the board.
    pub platform: Option<String>,
}

/// Settings gathered from every layer, before validation.
#[derive(Debug, Clone)]
struct RawSettings {
    video_dir: PathBuf,
    video_ext: String,
    base_port: u32,
    explicit_ports: Option<Vec<u32>>,
    mount_path: String,
    usb_cameras: Vec<String>,
    mipi_enabled: bool,
    width: Option<u32>,
    height: Option<u32>,
    platform: Option<String>,
}

impl HubConfig {
    /// Defaults with the given fallback directory. Not validated.
    pub fn with_video_dir(video_dir: impl Into<PathBuf>) -> Self {
        Self {
            video_dir: video_dir.into(),
            video_ext: DEFAULT_VIDEO_EXT.to_string(),
            ports: ports_from_base(DEFAULT_RTSP_PORT as u16),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            usb_cameras: Vec::new(),
            mipi_enabled: false,
            resolution: None,
            platform: None,
        }
    }

    /// Load from the optional config file, then environment, then CLI.
    pub fn load(cli: &CliOverrides) -> Result<Self> {
        let config_path = cli.config_path.clone().or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
        });
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut raw = RawSettings::from_file(file_cfg.unwrap_or_default());
        raw.apply_env()?;
        raw.apply_cli(cli);
        raw.validate()
    }

    pub fn base_port(&self) -> u16 {
        self.ports[0]
    }

    /// Print the effective settings.
    pub fn log_summary(&self) {
        log::info!("video directory: {}", self.video_dir.display());
        for (index, port) in self.ports.iter().enumerate() {
            log::info!("RTSP server port {}: {}", index + 1, port);
        }
        log::info!("mount path: {}", self.mount_path);
        log::info!(
            "use MIPI camera: {}",
            if self.mipi_enabled { "yes" } else { "no" }
        );
        if !self.usb_cameras.is_empty() {
            log::info!("USB cameras: {}", self.usb_cameras.join(", "));
        }
        log::info!("fallback video extension: {}", self.video_ext);
        if let Some(resolution) = self.resolution {
            log::info!("requested resolution: {resolution}");
        }
    }
}

impl RawSettings {
    fn from_file(file: HubConfigFile) -> Self {
        let rtsp = file.rtsp.unwrap_or_default();
        let cameras = file.cameras.unwrap_or_default();
        let resolution = file.resolution.unwrap_or_default();
        Self {
            video_dir: file
                .video_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_DIR)),
            video_ext: file
                .video_ext
                .unwrap_or_else(|| DEFAULT_VIDEO_EXT.to_string()),
            base_port: rtsp.port.unwrap_or(DEFAULT_RTSP_PORT),
            explicit_ports: rtsp.ports,
            mount_path: rtsp
                .mount_path
                .unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
            usb_cameras: cameras.usb.unwrap_or_default(),
            mipi_enabled: cameras.mipi.unwrap_or(false),
            width: resolution.width,
            height: resolution.height,
            platform: file.platform,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = env_value("CAMERA_HUB_VIDEO_DIR") {
            self.video_dir = PathBuf::from(dir);
        }
        if let Some(ext) = env_value("CAMERA_HUB_VIDEO_EXT") {
            self.video_ext = ext;
        }
        if let Some(port) = env_value("CAMERA_HUB_RTSP_PORT") {
            self.base_port = port.trim().parse().map_err(|_| {
                ProvisionError::invalid_argument(format!(
                    "CAMERA_HUB_RTSP_PORT must be a port number (got '{port}')"
                ))
            })?;
            self.explicit_ports = None;
        }
        if let Some(usb) = env_value("CAMERA_HUB_USB_CAMS") {
            let parsed = split_csv(&usb);
            if !parsed.is_empty() {
                self.usb_cameras = parsed;
            }
        }
        if let Some(mipi) = env_value("CAMERA_HUB_MIPI") {
            self.mipi_enabled = parse_flag(&mipi).ok_or_else(|| {
                ProvisionError::invalid_argument(format!(
                    "CAMERA_HUB_MIPI must be a boolean (got '{mipi}')"
                ))
            })?;
        }
        if let Some(platform) = env_value("CAMERA_HUB_PLATFORM") {
            self.platform = Some(platform);
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(dir) = &cli.video_dir {
            self.video_dir = dir.clone();
        }
        if let Some(ext) = &cli.video_ext {
            self.video_ext = ext.clone();
        }
        if let Some(port) = cli.rtsp_port {
            self.base_port = port;
            self.explicit_ports = None;
        }
        if !cli.usb_cameras.is_empty() {
            self.usb_cameras = cli.usb_cameras.clone();
        }
        if cli.mipi {
            self.mipi_enabled = true;
        }
        if cli.width.is_some() {
            self.width = cli.width;
        }
        if cli.height.is_some() {
            self.height = cli.height;
        }
        if let Some(platform) = &cli.platform {
            self.platform = Some(platform.clone());
        }
    }

    fn validate(self) -> Result<HubConfig> {
        if !self.video_dir.is_absolute() {
            return Err(ProvisionError::invalid_argument(format!(
                "'{}' is not an absolute path (video directory)",
                self.video_dir.display()
            )));
        }
        if !self.video_dir.is_dir() {
            return Err(ProvisionError::not_found(format!(
                "directory '{}' does not exist (video directory)",
                self.video_dir.display()
            )));
        }

        let video_ext = supported_extension(self.video_ext.trim()).ok_or_else(|| {
            ProvisionError::invalid_argument(format!(
                "video extension '{}' is not supported",
                self.video_ext
            ))
        })?;

        let ports = match &self.explicit_ports {
            Some(ports) => explicit_ports(ports)?,
            None => ports_from_base(validate_port(self.base_port)?),
        };

        let mount_path = self.mount_path.trim().to_string();
        if !mount_path.starts_with('/') || mount_path.len() < 2 {
            return Err(ProvisionError::invalid_argument(format!(
                "mount path '{}' must start with '/' and name a stream",
                self.mount_path
            )));
        }

        let mut usb_cameras = Vec::with_capacity(self.usb_cameras.len());
        for name in &self.usb_cameras {
            let name = name.trim();
            if name.is_empty() {
                return Err(ProvisionError::invalid_argument(
                    "USB camera node name is empty",
                ));
            }
            usb_cameras.push(name.to_string());
        }

        let resolution = match (self.width, self.height) {
            (None, None) => None,
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(Resolution::new(width, height))
            }
            (Some(width), Some(height)) => {
                return Err(ProvisionError::invalid_argument(format!(
                    "resolution {width}x{height} must be non-zero"
                )))
            }
            _ => {
                return Err(ProvisionError::invalid_argument(
                    "--width and --height must be given together",
                ))
            }
        };

        Ok(HubConfig {
            video_dir: self.video_dir,
            video_ext: video_ext.to_string(),
            ports,
            mount_path,
            usb_cameras,
            mipi_enabled: self.mipi_enabled,
            resolution,
            platform: self
                .platform
                .map(|platform| platform.trim().to_string())
                .filter(|platform| !platform.is_empty()),
        })
    }
}

fn validate_port(port: u32) -> Result<u16> {
    if !(REGISTERED_PORT_MIN..=REGISTERED_PORT_MAX).contains(&port) {
        return Err(ProvisionError::invalid_argument(format!(
            "RTSP port {port} is outside the registered range {REGISTERED_PORT_MIN}-{REGISTERED_PORT_MAX}"
        )));
    }
    Ok(port as u16)
}

fn ports_from_base(base: u16) -> [u16; CAMERA_SLOTS] {
    std::array::from_fn(|index| base + index as u16)
}

fn explicit_ports(ports: &[u32]) -> Result<[u16; CAMERA_SLOTS]> {
    if ports.len() != CAMERA_SLOTS {
        return Err(ProvisionError::invalid_argument(format!(
            "rtsp.ports must list exactly {CAMERA_SLOTS} ports (got {})",
            ports.len()
        )));
    }
    let mut out = [0u16; CAMERA_SLOTS];
    for (index, port) in ports.iter().enumerate() {
        let port = validate_port(*port)?;
        if out[..index].contains(&port) {
            return Err(ProvisionError::invalid_argument(format!(
                "RTSP port {port} is listed twice"
            )));
        }
        out[index] = port;
    }
    Ok(out)
}

fn read_config_file(path: &Path) -> Result<HubConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ProvisionError::io(path.display().to_string(), err))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        toml::from_str(&raw).map_err(|err| {
            ProvisionError::invalid_argument(format!(
                "invalid config file {}: {}",
                path.display(),
                err
            ))
        })
    } else {
        serde_json::from_str(&raw).map_err(|err| {
            ProvisionError::invalid_argument(format!(
                "invalid config file {}: {}",
                path.display(),
                err
            ))
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
