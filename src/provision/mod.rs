//! Stream provisioning.
//!
//! Provisioning turns a complete slot table into running RTSP endpoints in
//! two phases:
//! - `ProvisionPlan::build` derives every pipeline and port binding up front
//! - `Orchestrator::start` hands each plan entry to a `StreamBackend`
//!
//! A plan that fails to build creates no server at all. Every endpoint uses
//! the same mount path and is told apart by its port only.

#[cfg(feature = "rtsp-server")]
pub mod gst;

use std::path::PathBuf;

use crate::camera::CameraKind;
use crate::config::HubConfig;
use crate::error::{ProvisionError, Result};
use crate::pipeline::PipelineBuilder;
use crate::slots::SlotTable;

#[cfg(feature = "rtsp-server")]
pub use gst::GstRtspBackend;

/// Everything a backend needs to serve one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSpec {
    pub slot: usize,
    pub port: u16,
    pub mount_path: String,
    pub launch: String,
    /// Viewers share one capture and encode pipeline.
    pub shared: bool,
    pub kind: CameraKind,
    pub device: PathBuf,
}

impl EndpointSpec {
    pub fn url(&self, host: &str) -> String {
        format!("rtsp://{}:{}{}", host, self.port, self.mount_path)
    }
}

/// Pipelines and ports for every slot, in slot order.
#[derive(Clone, Debug, Default)]
pub struct ProvisionPlan {
    endpoints: Vec<EndpointSpec>,
}

impl ProvisionPlan {
    pub fn build(table: &SlotTable, config: &HubConfig, builder: &PipelineBuilder) -> Result<Self> {
        if !table.is_complete() {
            return Err(ProvisionError::CapacityExhausted {
                filled: table.filled(),
                capacity: table.capacity(),
            });
        }

        let mut endpoints = Vec::with_capacity(table.capacity());
        for (slot, identity) in table.occupied() {
            let descriptor = builder.build(identity, config.resolution)?;
            let port = config.ports.get(slot).copied().ok_or_else(|| {
                ProvisionError::invalid_argument(format!("no RTSP port configured for slot {}", slot + 1))
            })?;
            endpoints.push(EndpointSpec {
                slot,
                port,
                mount_path: config.mount_path.clone(),
                launch: descriptor.launch().to_string(),
                shared: true,
                kind: descriptor.kind(),
                device: identity.path().to_path_buf(),
            });
        }
        Ok(Self { endpoints })
    }

    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// A streaming framework that can serve launch descriptions over RTSP.
pub trait StreamBackend {
    /// Create a server on `endpoint.port` and attach it to the event loop.
    fn serve(&mut self, endpoint: &EndpointSpec) -> Result<()>;

    /// Block in the shared event loop until it is told to quit.
    fn run(&mut self) -> Result<()>;
}

/// An endpoint that has been handed to the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub spec: EndpointSpec,
    pub url: String,
}

pub struct Orchestrator<B: StreamBackend> {
    backend: B,
    host: String,
    endpoints: Vec<StreamEndpoint>,
}

impl<B: StreamBackend> Orchestrator<B> {
    /// `host` only appears in the advertised URLs.
    pub fn new(backend: B, host: impl Into<String>) -> Self {
        Self {
            backend,
            host: host.into(),
            endpoints: Vec::new(),
        }
    }

    /// Serve every plan entry in slot order. Stops at the first backend error.
    pub fn start(&mut self, plan: &ProvisionPlan) -> Result<&[StreamEndpoint]> {
        for spec in plan.endpoints() {
            self.backend.serve(spec)?;
            let url = spec.url(&self.host);
            log::info!("Stream is ready at {url}");
            self.endpoints.push(StreamEndpoint {
                spec: spec.clone(),
                url,
            });
        }
        Ok(&self.endpoints)
    }

    pub fn endpoints(&self) -> &[StreamEndpoint] {
        &self.endpoints
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn run(&mut self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(ProvisionError::server("no stream endpoints are running"));
        }
        self.backend.run()
    }
}
