//! RTSP camera hub
//!
//! This crate arbitrates the cameras of an RZ/G2 board and serves each one as
//! an RTSP stream.
//!
//! # Architecture
//!
//! Startup runs strictly in sequence:
//!
//! 1. **Configuration**: `HubConfig` is built once from file, environment and
//!    command line, validated, and passed by reference from then on.
//! 2. **Classification**: candidate sources become `DeviceIdentity` values or
//!    a tagged `ProvisionError`.
//! 3. **Allocation**: a fixed table of `CAMERA_SLOTS` slots is filled in
//!    precedence order (on-board sensor, USB cameras, fallback videos).
//!    An incomplete table is fatal.
//! 4. **Provisioning**: one RTSP server per slot, each on its own port, all
//!    attached to one event loop.
//!
//! # Module Structure
//!
//! - `camera`: source classification (MIPI sensor, USB devices, fallback files)
//! - `pipeline`: launch descriptions and supported resolutions
//! - `slots`: slot table and allocation policy
//! - `provision`: provisioning plan, backend seam, GStreamer backend
//!   (feature: rtsp-server)

pub mod camera;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provision;
pub mod slots;

pub use camera::{CameraKind, DeviceIdentity, DeviceNamespace, LinkControl, ShellLinkControl};
pub use config::{CliOverrides, HubConfig, DEFAULT_MOUNT_PATH};
pub use error::{ErrorKind, ProvisionError, Result};
pub use pipeline::{
    build_pipeline, supported_resolutions, EncoderSettings, PipelineBuilder, PipelineDescriptor,
    Resolution,
};
pub use provision::{EndpointSpec, Orchestrator, ProvisionPlan, StreamBackend, StreamEndpoint};
pub use slots::{
    allocate_slots, Allocation, AllocationState, SlotAllocator, SlotTable, CAMERA_SLOTS,
};

#[cfg(feature = "rtsp-server")]
pub use provision::GstRtspBackend;

/// Release tag reported by `--version`.
pub const HUB_VERSION: &str = "v1.0.0";
