//! Userspace driver for Intel TM2 tracking modules (the T265's internal
//! module), speaking the TM2 USB protocol directly through rusb. Supports
//! enumerating every attached module, booting modules stuck in the Movidius
//! bootloader, and streaming 6DOF pose samples from each device.

mod device;
mod error;
mod events;
mod firmware;
mod manager;
mod pose;
pub mod protocol;
mod rate;
mod stream;

pub use device::TrackerDevice;
pub use error::{Error, Result};
pub use events::TrackerEvent;
pub use firmware::{Firmware, FIRMWARE_0_2_0_951_SHA1};
pub use manager::TrackerManager;
pub use pose::{Confidence, PoseSample, TrackerState};
pub use rate::{RateMeter, RateReport};
pub use stream::PoseStream;
