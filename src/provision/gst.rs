//! GStreamer RTSP server backend.

use gstreamer::glib;
use gstreamer_rtsp_server::prelude::*;
use gstreamer_rtsp_server::{RTSPMediaFactory, RTSPServer};

use super::{EndpointSpec, StreamBackend};
use crate::error::{ProvisionError, Result};

/// One `RTSPServer` per endpoint, all attached to the default main context.
pub struct GstRtspBackend {
    main_loop: glib::MainLoop,
    servers: Vec<(RTSPServer, glib::SourceId)>,
}

impl GstRtspBackend {
    pub fn new() -> Result<Self> {
        gstreamer::init()
            .map_err(|err| ProvisionError::server(format!("initialize gstreamer: {err}")))?;
        Ok(Self {
            main_loop: glib::MainLoop::new(None, false),
            servers: Vec::new(),
        })
    }

    /// Handle that stops `run` when `quit` is called on it.
    pub fn main_loop(&self) -> glib::MainLoop {
        self.main_loop.clone()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }
}

impl StreamBackend for GstRtspBackend {
    fn serve(&mut self, endpoint: &EndpointSpec) -> Result<()> {
        let server = RTSPServer::new();
        server.set_service(&endpoint.port.to_string());

        let mounts = server.mount_points().ok_or_else(|| {
            ProvisionError::server(format!("no mount points on port {}", endpoint.port))
        })?;
        let factory = RTSPMediaFactory::new();
        factory.set_launch(&endpoint.launch);
        factory.set_shared(endpoint.shared);
        mounts.add_factory(&endpoint.mount_path, factory);

        let source = server.attach(None).map_err(|err| {
            ProvisionError::server(format!(
                "attach RTSP server on port {}: {err}",
                endpoint.port
            ))
        })?;
        log::debug!(
            "slot {} serving {} on port {}",
            endpoint.slot + 1,
            endpoint.device.display(),
            endpoint.port
        );
        self.servers.push((server, source));
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.main_loop.run();
        log::info!("main loop stopped");
        Ok(())
    }
}
