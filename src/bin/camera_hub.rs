//! camera_hub - RTSP camera hub daemon
//!
//! This daemon:
//! 1. Loads and validates configuration (file, environment, command line)
//! 2. Brings up the on-board MIPI sensor when requested and supported
//! 3. Fills four stream slots from MIPI, USB and fallback video sources
//! 4. Serves one RTSP stream per slot until interrupted

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use rtsp_camera_hub::{
    camera::platform, config::CONFIG_PATH_ENV, CliOverrides, DeviceNamespace, EncoderSettings,
    HubConfig, PipelineBuilder, ProvisionPlan, ShellLinkControl, SlotAllocator, HUB_VERSION,
};

#[derive(Parser, Debug)]
#[command(
    name = "camera_hub",
    version = HUB_VERSION,
    about = "Serve up to four cameras (MIPI, USB or fallback videos) over RTSP"
)]
struct Args {
    /// Directory holding fallback videos (absolute path).
    #[arg(short = 'd', long = "video-dir", value_name = "DIR")]
    video_dir: Option<PathBuf>,

    /// First RTSP port; slots 2-4 use the following ports.
    #[arg(short = 'p', long = "rtsp-port", value_name = "PORT")]
    rtsp_port: Option<u32>,

    /// USB camera device node (e.g. video8). Repeatable.
    #[arg(short = 'u', long = "usb-cam", value_name = "NODE")]
    usb_cam: Vec<String>,

    /// Use the on-board MIPI camera.
    #[arg(short = 'm', long = "mipi-cam")]
    mipi_cam: bool,

    /// Fallback video extension (mp4 or h264).
    #[arg(short = 'e', long = "video-ext", value_name = "EXT")]
    video_ext: Option<String>,

    #[arg(long, value_name = "PIXELS", requires = "height")]
    width: Option<u32>,

    #[arg(long, value_name = "PIXELS", requires = "width")]
    height: Option<u32>,

    /// Board name to use instead of the host name.
    #[arg(long, value_name = "NAME")]
    platform: Option<String>,

    /// Config file (.toml or JSON).
    #[arg(long, value_name = "PATH", env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Allocate slots and print the streams without serving them.
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            video_dir: self.video_dir.clone(),
            video_ext: self.video_ext.clone(),
            rtsp_port: self.rtsp_port,
            usb_cameras: self.usb_cam.clone(),
            mipi: self.mipi_cam,
            width: self.width,
            height: self.height,
            platform: self.platform.clone(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = HubConfig::load(&args.overrides()).context("invalid configuration")?;
    cfg.log_summary();

    let host = cfg
        .platform
        .clone()
        .or_else(platform::host_name)
        .unwrap_or_default();
    let board = platform::lookup(&host);
    match board {
        Some(board) => log::info!("platform: {} ({})", board.name, board.soc),
        None => log::info!("platform: '{host}' (no MIPI support)"),
    }

    let namespace = DeviceNamespace::default();
    let mut link = ShellLinkControl;
    let allocation = SlotAllocator::new(&cfg, &namespace, &host, &mut link).allocate();
    if cfg.mipi_enabled && !allocation.sensor_enabled {
        log::warn!("MIPI camera disabled for this run");
    }
    let table = allocation
        .into_complete()
        .context("cannot fill every stream slot")?;

    let builder = PipelineBuilder::new(EncoderSettings::for_platform(board));
    let plan =
        ProvisionPlan::build(&table, &cfg, &builder).context("cannot build stream pipelines")?;

    let url_host = if host.is_empty() { "localhost" } else { host.as_str() };
    if args.dry_run {
        for spec in plan.endpoints() {
            println!("{}  {} {}", spec.url(url_host), spec.kind, spec.device.display());
            println!("    {}", spec.launch);
        }
        return Ok(());
    }

    serve(&plan, url_host)
}

#[cfg(feature = "rtsp-server")]
fn serve(plan: &ProvisionPlan, url_host: &str) -> Result<()> {
    use rtsp_camera_hub::{GstRtspBackend, Orchestrator};

    let backend = GstRtspBackend::new()?;
    let main_loop = backend.main_loop();
    ctrlc::set_handler(move || {
        main_loop.quit();
    })
    .context("error setting Ctrl-C handler")?;

    let mut orchestrator = Orchestrator::new(backend, url_host);
    orchestrator
        .start(plan)
        .context("cannot start RTSP servers")?;
    log::info!("camera_hub serving {} streams (Ctrl-C to stop)", plan.len());
    orchestrator.run()?;
    log::info!("shutdown signal received, exiting");
    Ok(())
}

#[cfg(not(feature = "rtsp-server"))]
fn serve(_plan: &ProvisionPlan, _url_host: &str) -> Result<()> {
    anyhow::bail!("serving RTSP streams requires the rtsp-server feature (use --dry-run to inspect the plan)")
}
