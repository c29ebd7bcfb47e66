use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rtsp_camera_hub::{
    allocate_slots, AllocationState, CameraKind, DeviceNamespace, ErrorKind, HubConfig,
    LinkControl, PipelineBuilder, ProvisionPlan, Resolution, SlotAllocator, CAMERA_SLOTS,
};

/// Link control that answers every command with the same status.
struct FakeLink {
    status: Option<i32>,
    commands: Vec<String>,
}

impl FakeLink {
    fn succeeding() -> Self {
        Self {
            status: Some(0),
            commands: Vec::new(),
        }
    }

    fn failing() -> Self {
        Self {
            status: Some(1),
            commands: Vec::new(),
        }
    }
}

impl LinkControl for FakeLink {
    fn execute(&mut self, command: &str) -> std::io::Result<Option<i32>> {
        self.commands.push(command.to_string());
        Ok(self.status)
    }
}

/// A fake `/dev`, sysfs tree and video directory.
struct Rig {
    _root: TempDir,
    namespace: DeviceNamespace,
    videos: PathBuf,
}

impl Rig {
    fn new(usb_nodes: &[&str], videos: &[&str]) -> Self {
        let root = TempDir::new().expect("tempdir");
        let dev = root.path().join("dev");
        let sys = root.path().join("sys");
        let video_dir = root.path().join("videos");
        for dir in [&dev, &sys, &video_dir] {
            fs::create_dir_all(dir).expect("create dir");
        }
        for node in usb_nodes {
            fs::write(dev.join(node), b"").expect("device node");
            fs::create_dir_all(sys.join(node)).expect("sysfs dir");
            fs::write(sys.join(node).join("name"), "UVC Camera (046d:0825)\n").expect("name");
        }
        for video in videos {
            fs::write(video_dir.join(video), b"").expect("video");
        }
        Self {
            _root: root,
            namespace: DeviceNamespace::new(dev, sys),
            videos: video_dir,
        }
    }

    fn config(&self, usb: &[&str], mipi: bool) -> HubConfig {
        let mut config = HubConfig::with_video_dir(&self.videos);
        config.usb_cameras = usb.iter().map(|name| name.to_string()).collect();
        config.mipi_enabled = mipi;
        config
    }

    fn node(&self, name: &str) -> PathBuf {
        self.namespace.device_root.join(name)
    }
}

#[test]
fn sources_are_placed_in_precedence_order() {
    let rig = Rig::new(&["video8", "video9"], &["z.mp4", "a.mp4", "m.mp4"]);
    let config = rig.config(&["video8", "video9"], true);
    let mut link = FakeLink::succeeding();

    let allocation = SlotAllocator::new(&config, &rig.namespace, "ek874", &mut link).allocate();
    assert_eq!(allocation.state, AllocationState::Complete);
    assert!(allocation.sensor_enabled);
    assert!(!link.commands.is_empty());

    let table = allocation.into_complete().expect("complete table");
    let kinds: Vec<CameraKind> = table.occupied().map(|(_, id)| id.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            CameraKind::OnBoardSensor,
            CameraKind::UsbDevice,
            CameraKind::UsbDevice,
            CameraKind::FallbackFile
        ]
    );
    assert_eq!(table.get(0).expect("slot 1").path(), Path::new("/dev/video0"));
    assert_eq!(table.get(1).expect("slot 2").path(), rig.node("video8"));
    assert_eq!(table.get(2).expect("slot 3").path(), rig.node("video9"));
    assert_eq!(table.get(3).expect("slot 4").path().parent(), Some(rig.videos.as_path()));
}

#[test]
fn failed_sensor_bring_up_is_demoted() {
    let rig = Rig::new(&["video8"], &["a.mp4", "b.mp4", "c.mp4"]);
    let config = rig.config(&["video8"], true);
    let mut link = FakeLink::failing();

    let allocation = SlotAllocator::new(&config, &rig.namespace, "hihope-rzg2m", &mut link).allocate();
    assert!(!allocation.sensor_enabled);
    assert_eq!(link.commands.len(), 1);
    assert_eq!(allocation.state, AllocationState::Complete);
    assert_eq!(
        allocation.table.get(0).map(|id| id.kind()),
        Some(CameraKind::UsbDevice)
    );
}

#[test]
fn unsupported_platform_never_runs_link_commands() {
    let rig = Rig::new(&[], &["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
    let config = rig.config(&[], true);
    let mut link = FakeLink::succeeding();

    let allocation = SlotAllocator::new(&config, &rig.namespace, "raspberrypi", &mut link).allocate();
    assert!(link.commands.is_empty());
    assert!(!allocation.sensor_enabled);
    assert!(allocation
        .table
        .occupied()
        .all(|(_, id)| id.kind() == CameraKind::FallbackFile));
}

#[test]
fn invalid_usb_camera_is_skipped() {
    let rig = Rig::new(&["video9"], &["a.mp4", "b.mp4", "c.mp4"]);
    let config = rig.config(&["video8", "video9"], false);
    let mut link = FakeLink::succeeding();

    let table = allocate_slots(&config, &rig.namespace, "", &mut link).expect("complete");
    assert_eq!(table.get(0).expect("slot 1").path(), rig.node("video9"));
    assert_eq!(table.filled(), CAMERA_SLOTS);
}

#[test]
fn no_sources_is_capacity_exhausted() {
    let rig = Rig::new(&[], &[]);
    let config = rig.config(&["video8"], true);
    let mut link = FakeLink::failing();

    let err = allocate_slots(&config, &rig.namespace, "ek874", &mut link).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExhausted);
    assert_eq!(err.to_string(), "not enough cameras: filled 0 of 4 slots");
}

#[test]
fn fallback_files_with_other_extensions_are_ignored() {
    let rig = Rig::new(&[], &["a.h264", "b.H264", "c.mp4", "d.txt", "e.h264"]);
    let mut config = rig.config(&[], false);
    config.video_ext = "h264".to_string();
    let mut link = FakeLink::succeeding();

    let allocation = SlotAllocator::new(&config, &rig.namespace, "", &mut link).allocate();
    assert_eq!(allocation.state, AllocationState::Incomplete);
    assert_eq!(allocation.table.filled(), 3);
    assert!(allocation.table.occupied().all(|(_, id)| {
        id.path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("h264"))
            .unwrap_or(false)
    }));
}

#[test]
fn scenario_a_too_few_sources_is_fatal() {
    let rig = Rig::new(&["video8"], &["clip1.mp4", "clip2.mp4"]);
    let config = rig.config(&["video8"], false);
    let mut link = FakeLink::succeeding();

    let allocation = SlotAllocator::new(&config, &rig.namespace, "", &mut link).allocate();
    assert_eq!(allocation.state, AllocationState::Incomplete);
    assert_eq!(allocation.table.get(0).expect("slot 1").path(), rig.node("video8"));
    let clip = allocation.table.get(1).expect("slot 2").path().to_path_buf();
    assert!(clip == rig.videos.join("clip1.mp4") || clip == rig.videos.join("clip2.mp4"));
    assert!(allocation.table.get(3).is_none());

    let err = allocation.into_complete().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExhausted);
}

#[test]
fn scenario_b_fills_every_slot_and_binds_ports() {
    let rig = Rig::new(&["video8"], &["clip1.mp4", "clip2.mp4", "clip3.mp4"]);
    let config = rig.config(&["video8"], false);
    let mut link = FakeLink::succeeding();

    let table = allocate_slots(&config, &rig.namespace, "", &mut link).expect("complete");
    let plan = ProvisionPlan::build(&table, &config, &PipelineBuilder::default()).expect("plan");
    let urls: Vec<String> = plan.endpoints().iter().map(|spec| spec.url("board")).collect();
    assert_eq!(
        urls,
        vec![
            "rtsp://board:5001/camera",
            "rtsp://board:5002/camera",
            "rtsp://board:5003/camera",
            "rtsp://board:5004/camera"
        ]
    );
}

#[test]
fn scenario_c_unsupported_resolution_has_no_plan() {
    let rig = Rig::new(&["video8"], &["clip1.mp4", "clip2.mp4", "clip3.mp4"]);
    let mut config = rig.config(&["video8"], false);
    config.resolution = Some(Resolution::new(1920, 1080));
    let mut link = FakeLink::succeeding();

    let table = allocate_slots(&config, &rig.namespace, "", &mut link).expect("complete");
    let err = ProvisionPlan::build(&table, &config, &PipelineBuilder::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let message = err.to_string();
    assert!(message.contains("1920x1080"));
    assert!(message.contains("1280x720"));
}
