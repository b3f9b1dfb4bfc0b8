//! TM2 USB wire protocol: endpoints, message IDs, and packed message layouts.
//!
//! Layouts follow the TM2 host interface as implemented by libtm/librealsense.
//! All multi-byte fields are little-endian, which matches every host this
//! crate targets; structs are `#[repr(C, packed)]` and read with
//! `bytemuck::pod_read_unaligned`.

use bytemuck::{Pod, Zeroable};
use std::time::Duration;

pub const ENDPOINT_CONTROL_OUT: u8 = 0x02;
pub const ENDPOINT_CONTROL_IN: u8 = 0x82;
pub const ENDPOINT_INTERRUPT_IN: u8 = 0x83;

/// Endpoint the Movidius bootloader accepts firmware on.
pub const ENDPOINT_BOOTLOADER_OUT: u8 = 0x01;

pub const TM2_VID: u16 = 0x8087;
pub const TM2_PID: u16 = 0x0B37;

/// VID/PID the module enumerates as before firmware has been uploaded.
pub const TM2_BOOT_VID: u16 = 0x03E7;
pub const TM2_BOOT_PID: u16 = 0x2150;

pub const USB_TIMEOUT: Duration = Duration::from_millis(10_000);

// Control and interrupt message IDs.
pub const DEV_GET_TIME: u16 = 0x0002;
pub const DEV_START: u16 = 0x0012;
pub const DEV_STOP: u16 = 0x0013;
pub const DEV_STATUS: u16 = 0x0014;
pub const DEV_GET_POSE: u16 = 0x0015;
pub const SLAM_SET_6DOF_INTERRUPT_RATE: u16 = 0x1005;
pub const SLAM_6DOF_CONTROL: u16 = 0x1006;
pub const SLAM_RELOCALIZATION_EVENT: u16 = 0x100E;
pub const DEV_ERROR: u16 = 0x8000;
pub const SLAM_ERROR: u16 = 0x9000;

// Wire status codes.
pub const SUCCESS: u16 = 0x0000;
pub const DEVICE_BUSY: u16 = 0x0008;
pub const DEVICE_STOPPED: u16 = 0x000C;
pub const TEMPERATURE_WARNING: u16 = 0x0010;

// 6DOF tracking modes, OR-able.
pub const SIXDOF_MODE_NORMAL: u8 = 0x00;
pub const SIXDOF_MODE_ENABLE_MAPPING: u8 = 0x02;
pub const SIXDOF_MODE_ENABLE_RELOCALIZATION: u8 = 0x04;
pub const SIXDOF_MODE_DISABLE_JUMPING: u8 = 0x08;

pub const INTERRUPT_RATE_NONE: u8 = 0x0;
pub const INTERRUPT_RATE_FISHEYE: u8 = 0x1;
pub const INTERRUPT_RATE_IMU: u8 = 0x2;

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RequestHeader {
    pub length: u32,
    pub message_id: u16,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ResponseHeader {
    pub length: u32,
    pub message_id: u16,
    pub status: u16,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InterruptHeader {
    pub length: u32,
    pub message_id: u16,
}

/// 6DOF pose payload as delivered on the interrupt endpoint.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PoseData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub qi: f32,
    pub qj: f32,
    pub qk: f32,
    pub qr: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub vax: f32,
    pub vay: f32,
    pub vaz: f32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub aax: f32,
    pub aay: f32,
    pub aaz: f32,
    pub nanoseconds: u64,
    pub tracker_confidence: u32,
    pub mapper_confidence: u32,
    pub tracker_state: u32,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InterruptPose {
    pub header: InterruptHeader,
    pub index: u8,
    pub reserved: u8,
    pub pose: PoseData,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InterruptStatus {
    pub header: InterruptHeader,
    pub status: u16,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InterruptRelocalization {
    pub header: InterruptHeader,
    pub nanoseconds: u64,
    pub session_id: u16,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Request6DofControl {
    pub header: RequestHeader,
    pub enable: u8,
    pub mode: u8,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Response6DofControl {
    pub header: ResponseHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Request6DofInterruptRate {
    pub header: RequestHeader,
    pub interrupt_rate: u8,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Response6DofInterruptRate {
    pub header: ResponseHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RequestStart {
    pub header: RequestHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ResponseStart {
    pub header: ResponseHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RequestStop {
    pub header: RequestHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ResponseStop {
    pub header: ResponseHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RequestGetTime {
    pub header: RequestHeader,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ResponseGetTime {
    pub header: ResponseHeader,
    pub nanoseconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    // The firmware rejects requests whose length field disagrees with the
    // transfer, so the packed layouts must match the wire exactly.
    #[test]
    fn packed_sizes_match_wire_layout() {
        assert_eq!(size_of::<RequestHeader>(), 6);
        assert_eq!(size_of::<ResponseHeader>(), 8);
        assert_eq!(size_of::<InterruptHeader>(), 6);
        assert_eq!(size_of::<PoseData>(), 96);
        assert_eq!(size_of::<InterruptPose>(), 104);
        assert_eq!(size_of::<InterruptStatus>(), 8);
        assert_eq!(size_of::<InterruptRelocalization>(), 16);
        assert_eq!(size_of::<Request6DofControl>(), 8);
        assert_eq!(size_of::<Request6DofInterruptRate>(), 7);
        assert_eq!(size_of::<RequestStart>(), 6);
        assert_eq!(size_of::<ResponseGetTime>(), 16);
    }

    #[test]
    fn pose_payload_roundtrips_through_bytes() {
        let mut pose = PoseData::zeroed();
        pose.x = 1.5;
        pose.qr = 1.0;
        pose.nanoseconds = 123_456_789;
        pose.tracker_state = 0x4;

        let bytes = bytemuck::bytes_of(&pose).to_vec();
        let back: PoseData = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!({ back.x }, 1.5);
        assert_eq!({ back.qr }, 1.0);
        assert_eq!({ back.nanoseconds }, 123_456_789);
        assert_eq!({ back.tracker_state }, 0x4);
    }
}
