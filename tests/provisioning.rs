use std::fs;

use tempfile::TempDir;

use rtsp_camera_hub::camera::{create_fallback_source, create_usb_device};
use rtsp_camera_hub::{
    CameraKind, DeviceNamespace, EncoderSettings, EndpointSpec, ErrorKind, HubConfig,
    Orchestrator, PipelineBuilder, ProvisionError, ProvisionPlan, Resolution, SlotTable,
    StreamBackend,
};

/// Records what would have been served instead of opening sockets.
#[derive(Default)]
struct RecordingBackend {
    served: Vec<EndpointSpec>,
    runs: usize,
}

impl StreamBackend for RecordingBackend {
    fn serve(&mut self, endpoint: &EndpointSpec) -> rtsp_camera_hub::Result<()> {
        if self.served.iter().any(|spec| spec.port == endpoint.port) {
            return Err(ProvisionError::server(format!(
                "port {} already bound",
                endpoint.port
            )));
        }
        self.served.push(endpoint.clone());
        Ok(())
    }

    fn run(&mut self) -> rtsp_camera_hub::Result<()> {
        self.runs += 1;
        Ok(())
    }
}

fn usb_and_fallback_table() -> (TempDir, SlotTable) {
    let root = TempDir::new().expect("tempdir");
    let dev = root.path().join("dev");
    let sys = root.path().join("sys");
    fs::create_dir_all(&dev).expect("dev");
    fs::create_dir_all(&sys).expect("sys");
    fs::write(dev.join("video8"), b"").expect("node");
    let namespace = DeviceNamespace::new(dev, sys);

    let mut table = SlotTable::new();
    table
        .occupy(create_usb_device(&namespace, "video8").expect("usb"))
        .expect("slot");
    for clip in ["clip1.mp4", "clip2.mp4", "clip3.mp4"] {
        let path = root.path().join(clip);
        table
            .occupy(create_fallback_source(&path).expect("fallback"))
            .expect("slot");
    }
    (root, table)
}

#[test]
fn one_shared_endpoint_per_slot() -> anyhow::Result<()> {
    let (root, table) = usb_and_fallback_table();
    let config = HubConfig::with_video_dir(root.path());
    let plan = ProvisionPlan::build(&table, &config, &PipelineBuilder::default())?;

    let mut orchestrator = Orchestrator::new(RecordingBackend::default(), "ek874");
    let endpoints = orchestrator.start(&plan)?;
    assert_eq!(endpoints.len(), 4);
    assert_eq!(endpoints[0].url, "rtsp://ek874:5001/camera");
    assert_eq!(endpoints[3].url, "rtsp://ek874:5004/camera");

    let served = &orchestrator.backend().served;
    let ports: Vec<u16> = served.iter().map(|spec| spec.port).collect();
    assert_eq!(ports, vec![5001, 5002, 5003, 5004]);
    assert!(served.iter().all(|spec| spec.shared && spec.mount_path == "/camera"));
    assert_eq!(served[0].kind, CameraKind::UsbDevice);
    assert!(served[0].launch.contains("v4l2src device="));
    assert!(served[1..].iter().all(|spec| spec.launch.contains("filesrc location=")));

    orchestrator.run()?;
    assert_eq!(orchestrator.backend().runs, 1);
    Ok(())
}

#[test]
fn each_launch_names_its_own_source_once() -> anyhow::Result<()> {
    let (root, table) = usb_and_fallback_table();
    let config = HubConfig::with_video_dir(root.path());
    let plan = ProvisionPlan::build(&table, &config, &PipelineBuilder::default())?;

    for spec in plan.endpoints() {
        let device = spec.device.display().to_string();
        assert_eq!(spec.launch.matches(device.as_str()).count(), 1, "{}", spec.launch);
    }
    Ok(())
}

#[test]
fn platform_bitrate_reaches_usb_pipeline() -> anyhow::Result<()> {
    let (root, table) = usb_and_fallback_table();
    let config = HubConfig::with_video_dir(root.path());
    let board = rtsp_camera_hub::camera::platform::lookup("ek874");
    let builder = PipelineBuilder::new(EncoderSettings::for_platform(board));
    let plan = ProvisionPlan::build(&table, &config, &builder)?;
    assert!(plan.endpoints()[0].launch.contains("target-bitrate=2000000"));
    Ok(())
}

#[test]
fn unsupported_resolution_creates_no_endpoint() {
    let (root, table) = usb_and_fallback_table();
    let mut config = HubConfig::with_video_dir(root.path());
    config.resolution = Some(Resolution::new(1920, 1080));

    let mut orchestrator = Orchestrator::new(RecordingBackend::default(), "ek874");
    let err = ProvisionPlan::build(&table, &config, &PipelineBuilder::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(orchestrator.backend().served.is_empty());
    assert_eq!(
        orchestrator.run().unwrap_err().kind(),
        ErrorKind::Server
    );
}

#[test]
fn supported_resolution_is_embedded() -> anyhow::Result<()> {
    let (root, table) = usb_and_fallback_table();
    let mut config = HubConfig::with_video_dir(root.path());
    config.resolution = Some(Resolution::new(800, 600));

    let plan = ProvisionPlan::build(&table, &config, &PipelineBuilder::default())?;
    assert!(plan.endpoints()[0].launch.contains("800x600"));
    assert!(!plan.endpoints()[1].launch.contains("800x600"));
    Ok(())
}

#[test]
fn explicit_ports_follow_slot_order() -> anyhow::Result<()> {
    let (root, table) = usb_and_fallback_table();
    let mut config = HubConfig::with_video_dir(root.path());
    config.ports = [8554, 8555, 9554, 9555];

    let plan = ProvisionPlan::build(&table, &config, &PipelineBuilder::default())?;
    let mut orchestrator = Orchestrator::new(RecordingBackend::default(), "localhost");
    orchestrator.start(&plan)?;
    let urls: Vec<&str> = orchestrator
        .endpoints()
        .iter()
        .map(|endpoint| endpoint.url.as_str())
        .collect();
    assert_eq!(
        urls,
        vec![
            "rtsp://localhost:8554/camera",
            "rtsp://localhost:8555/camera",
            "rtsp://localhost:9554/camera",
            "rtsp://localhost:9555/camera"
        ]
    );
    Ok(())
}
