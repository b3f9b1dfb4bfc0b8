//! Multi-camera pose-rate diagnostic: opens a pose-only stream on every
//! attached tracking module, busy-polls the sessions round-robin, and prints
//! a per-device sample rate once per report window until killed.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tm2_rs::protocol::{
    SIXDOF_MODE_ENABLE_MAPPING, SIXDOF_MODE_ENABLE_RELOCALIZATION, SIXDOF_MODE_NORMAL,
};
use tm2_rs::{Error, Firmware, RateMeter, TrackerEvent, TrackerManager};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tm2-multicam-pose", about = "Per-device pose-rate diagnostic for TM2 tracking modules")]
struct Args {
    /// Firmware image (.mvcmd) used to boot modules found in bootloader mode
    #[arg(long)]
    firmware: Option<PathBuf>,

    /// Report window in seconds
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// 6DOF tracking mode
    #[arg(long, value_enum, default_value_t = Mode::Relocalization)]
    mode: Mode,
}

#[derive(Copy, Clone, ValueEnum)]
enum Mode {
    /// Tracking only
    Normal,
    /// Tracking with map building
    Mapping,
    /// Tracking with map building and relocalization
    Relocalization,
}

impl Mode {
    fn flags(self) -> u8 {
        match self {
            Mode::Normal => SIXDOF_MODE_NORMAL,
            Mode::Mapping => SIXDOF_MODE_ENABLE_MAPPING,
            Mode::Relocalization => SIXDOF_MODE_ENABLE_MAPPING | SIXDOF_MODE_ENABLE_RELOCALIZATION,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match &err {
                Error::Usb { .. } | Error::CommandFailed { .. } => {
                    eprintln!("tracking module error: {err}")
                }
                other => eprintln!("{other}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> tm2_rs::Result<()> {
    let mut manager = TrackerManager::new()?;

    let serials = match &args.firmware {
        Some(path) => {
            let firmware = Firmware::load(path)?;
            manager.discover_devices_with_firmware(&firmware)?
        }
        None => manager.discover_devices()?,
    };

    if serials.is_empty() {
        eprintln!("no tracking modules found");
        return Ok(());
    }

    for serial in &serials {
        if let Some(device) = manager.device(serial) {
            println!("{} (pid {:04x})", serial, device.product_id());
        }
    }

    manager.set_all_device_modes(args.mode.flags())?;
    let streams = manager.start_pose_streams()?;
    println!("streaming poses from {} device(s)", streams.len());

    let window = Duration::from_secs(args.interval);
    let mut meters: Vec<RateMeter> = streams.iter().map(|_| RateMeter::new(window)).collect();

    // Round-robin busy poll over all sessions, one fetch per session per
    // pass, until the process is killed. A session dying (device stopped or
    // USB failure) ends the program via the ? below.
    loop {
        for (stream, meter) in streams.iter().zip(meters.iter_mut()) {
            if let Some(event) = stream.poll()? {
                match event {
                    TrackerEvent::Pose(_) => meter.record_pose(),
                    TrackerEvent::Relocalization { .. }
                    | TrackerEvent::SlamError { .. }
                    | TrackerEvent::TemperatureWarning => meter.record_aux(),
                }
            }

            if let Some(report) = meter.sample() {
                println!(
                    "{}: pose rate: {:.1} Hz (aux events: {})",
                    stream.serial(),
                    report.pose_hz(),
                    report.aux
                );
            }
        }
    }
}
