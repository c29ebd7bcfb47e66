//! Media pipeline descriptions.
//!
//! Each slot is served from a textual GStreamer launch description that the
//! RTSP media factory parses: capture, colorspace conversion, hardware H.264
//! encode and RTP packetization. This module only produces and validates the
//! text; it never touches pixels.
//!
//! Without a requested resolution a kind uses its fixed default template.
//! A requested resolution must be one of the kind's supported sizes. Fallback
//! videos are already encoded and ignore resolution entirely.

use std::fmt;

use crate::camera::platform::Platform;
use crate::camera::{fallback, CameraKind, DeviceIdentity};
use crate::error::{ProvisionError, Result};

/// A capture resolution, formatted as `WxH`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

const SENSOR_RESOLUTIONS: &[Resolution] = &[
    Resolution::new(640, 480),
    Resolution::new(800, 600),
    Resolution::new(1280, 960),
];

const USB_RESOLUTIONS: &[Resolution] = &[
    Resolution::new(640, 480),
    Resolution::new(800, 600),
    Resolution::new(1280, 720),
];

pub const DEFAULT_BITRATE: u32 = 4_000_000;

/// Caps of the encoded stream produced by every template.
pub const ENCODED_FORMAT: &str = "video/x-h264, profile=high";

const PAYLOADER: &str = "h264parse ! video/x-h264, stream-format=avc, alignment=au \
                         ! rtph264pay pt=96 name=pay0 config-interval=3";

/// Capture sizes a kind accepts. Fallback videos have none.
pub fn supported_resolutions(kind: CameraKind) -> &'static [Resolution] {
    match kind {
        CameraKind::OnBoardSensor => SENSOR_RESOLUTIONS,
        CameraKind::UsbDevice => USB_RESOLUTIONS,
        CameraKind::FallbackFile | CameraKind::Unknown => &[],
    }
}

/// Comma-separated list of the supported sizes, for error reporting.
pub fn describe_supported(kind: CameraKind) -> String {
    supported_resolutions(kind)
        .iter()
        .map(Resolution::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Encoder bitrates, in bits per second, per live camera kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    pub sensor_bitrate: u32,
    pub usb_bitrate: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            sensor_bitrate: DEFAULT_BITRATE,
            usb_bitrate: DEFAULT_BITRATE,
        }
    }
}

impl EncoderSettings {
    /// Bitrates the given board can sustain; defaults when the board is unknown.
    pub fn for_platform(platform: Option<&Platform>) -> Self {
        match platform {
            Some(platform) => Self {
                sensor_bitrate: platform.sensor_bitrate,
                usb_bitrate: platform.usb_bitrate,
            },
            None => Self::default(),
        }
    }
}

/// A validated pipeline for one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineDescriptor {
    identity: DeviceIdentity,
    resolution: Option<Resolution>,
    bitrate: Option<u32>,
    launch: String,
}

impl PipelineDescriptor {
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn kind(&self) -> CameraKind {
        self.identity.kind()
    }

    /// Requested resolution, if one was validated. `None` for default
    /// templates and fallback videos.
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Target encoder bitrate. `None` when nothing is re-encoded.
    pub fn bitrate(&self) -> Option<u32> {
        self.bitrate
    }

    pub fn encoded_format(&self) -> &'static str {
        ENCODED_FORMAT
    }

    /// Launch description in `gst-launch` syntax.
    pub fn launch(&self) -> &str {
        &self.launch
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineBuilder {
    encoder: EncoderSettings,
}

impl PipelineBuilder {
    pub fn new(encoder: EncoderSettings) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> EncoderSettings {
        self.encoder
    }

    pub fn build(
        &self,
        identity: &DeviceIdentity,
        requested: Option<Resolution>,
    ) -> Result<PipelineDescriptor> {
        let kind = identity.kind();
        let device = identity.path().display().to_string();

        let (launch, resolution, bitrate) = match kind {
            CameraKind::FallbackFile => (fallback_launch(&device), None, None),
            CameraKind::OnBoardSensor | CameraKind::UsbDevice => {
                let resolution = match requested {
                    Some(resolution) => Some(validate_resolution(kind, resolution)?),
                    None => None,
                };
                let bitrate = if kind == CameraKind::OnBoardSensor {
                    self.encoder.sensor_bitrate
                } else {
                    self.encoder.usb_bitrate
                };
                let launch = match (kind, resolution) {
                    (CameraKind::OnBoardSensor, None) => sensor_default_launch(&device, bitrate),
                    (CameraKind::OnBoardSensor, Some(res)) => sensor_launch(&device, res, bitrate),
                    (_, None) => usb_default_launch(&device, bitrate),
                    (_, Some(res)) => usb_launch(&device, res, bitrate),
                };
                (launch, resolution, Some(bitrate))
            }
            CameraKind::Unknown => {
                return Err(ProvisionError::unsupported(format!(
                    "cannot build a pipeline for {}",
                    identity
                )))
            }
        };

        log::debug!("pipeline of {}: \"{}\"", identity, launch);
        Ok(PipelineDescriptor {
            identity: identity.clone(),
            resolution,
            bitrate,
            launch,
        })
    }
}

/// Build a pipeline with the default encoder settings.
pub fn build_pipeline(
    identity: &DeviceIdentity,
    requested: Option<Resolution>,
) -> Result<PipelineDescriptor> {
    PipelineBuilder::default().build(identity, requested)
}

fn validate_resolution(kind: CameraKind, requested: Resolution) -> Result<Resolution> {
    if supported_resolutions(kind).contains(&requested) {
        return Ok(requested);
    }
    Err(ProvisionError::invalid_argument(format!(
        "{requested} is an unsupported resolution for {kind}; try one of: {}",
        describe_supported(kind)
    )))
}

fn sensor_default_launch(device: &str, bitrate: u32) -> String {
    format!(
        "( v4l2src device=\"{device}\" io-mode=dmabuf-import \
         ! video/x-raw, format=YUY2, width=1280, height=960, framerate=30/1 \
         ! vspfilter ! video/x-raw, format=NV12 \
         ! omxh264enc target-bitrate={bitrate} quant-p-frames=0 \
         ! {ENCODED_FORMAT} ! {PAYLOADER} )"
    )
}

fn sensor_launch(device: &str, res: Resolution, bitrate: u32) -> String {
    format!(
        "( v4l2src name=capture_{res} device=\"{device}\" io-mode=dmabuf-import \
         ! video/x-raw, format=YUY2, width=1280, height=960, framerate=30/1 \
         ! vspfilter ! video/x-raw, format=NV12, width={}, height={} \
         ! omxh264enc target-bitrate={bitrate} quant-p-frames=0 \
         ! {ENCODED_FORMAT} ! {PAYLOADER} )",
        res.width, res.height
    )
}

fn usb_default_launch(device: &str, bitrate: u32) -> String {
    format!(
        "( v4l2src device=\"{device}\" io-mode=dmabuf \
         ! video/x-raw, format=YUY2, width=1280, height=720 \
         ! vspmfilter dmabuf-use=true ! video/x-raw, format=NV12 \
         ! omxh264enc target-bitrate={bitrate} quant-p-frames=0 \
         ! {ENCODED_FORMAT} ! {PAYLOADER} )"
    )
}

fn usb_launch(device: &str, res: Resolution, bitrate: u32) -> String {
    format!(
        "( v4l2src name=capture_{res} device=\"{device}\" \
         ! video/x-raw, format=YUY2, width={}, height={} \
         ! videoconvert ! video/x-raw, format=NV12 \
         ! omxh264enc target-bitrate={bitrate} quant-p-frames=0 \
         ! {ENCODED_FORMAT} ! {PAYLOADER} )",
        res.width, res.height
    )
}

/// MP4 containers need demuxing; raw `.h264` files go straight to the parser.
fn fallback_launch(path: &str) -> String {
    let demux = if fallback::file_extension(path).eq_ignore_ascii_case("h264") {
        ""
    } else {
        "! qtdemux "
    };
    format!("( filesrc location=\"{path}\" {demux}! {PAYLOADER} )")
}
