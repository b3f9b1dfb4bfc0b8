//! Decoding of raw interrupt transfers into typed packets.
//!
//! Kept free of any USB handle so the framing logic can be tested against
//! crafted buffers.

use crate::error::{Error, Result};
use crate::pose::PoseSample;
use crate::protocol::{
    InterruptHeader, InterruptPose, InterruptRelocalization, InterruptStatus, PoseData, DEV_ERROR,
    DEV_GET_POSE, DEV_STATUS, SLAM_ERROR, SLAM_RELOCALIZATION_EVENT,
};

/// Event delivered by a running [`PoseStream`](crate::PoseStream).
///
/// Fatal conditions (device stopped, hard device errors, USB failures) end
/// the stream instead of appearing here.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Pose(PoseSample),
    /// The tracker recovered its position, within the current session
    /// (`session_id == 0`) or from a previously stored map.
    Relocalization { timestamp_ns: u64, session_id: u16 },
    /// Non-fatal SLAM error reported by the module.
    SlamError { status: u16 },
    TemperatureWarning,
}

/// One framed message from the interrupt endpoint, before any per-device
/// interpretation (clock offset, serial) is applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InterruptPacket {
    Pose(PoseData),
    Status(u16),
    DeviceError(u16),
    SlamError(u16),
    Relocalization { timestamp_ns: u64, session_id: u16 },
    Unknown(u16),
}

fn read_payload<T: bytemuck::Pod>(buf: &[u8]) -> Result<T> {
    let expected = std::mem::size_of::<T>();
    if buf.len() < expected {
        return Err(Error::MessageTooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok(bytemuck::pod_read_unaligned(&buf[..expected]))
}

/// Decode one interrupt transfer. Unknown message IDs are not an error; the
/// firmware emits messages this crate does not care about.
pub(crate) fn decode_interrupt(buf: &[u8]) -> Result<InterruptPacket> {
    let header: InterruptHeader = read_payload(buf)?;

    match header.message_id {
        DEV_GET_POSE => {
            let msg: InterruptPose = read_payload(buf)?;
            Ok(InterruptPacket::Pose(msg.pose))
        }
        DEV_STATUS => {
            let msg: InterruptStatus = read_payload(buf)?;
            Ok(InterruptPacket::Status(msg.status))
        }
        DEV_ERROR => {
            let msg: InterruptStatus = read_payload(buf)?;
            Ok(InterruptPacket::DeviceError(msg.status))
        }
        SLAM_ERROR => {
            let msg: InterruptStatus = read_payload(buf)?;
            Ok(InterruptPacket::SlamError(msg.status))
        }
        SLAM_RELOCALIZATION_EVENT => {
            let msg: InterruptRelocalization = read_payload(buf)?;
            Ok(InterruptPacket::Relocalization {
                timestamp_ns: msg.nanoseconds,
                session_id: msg.session_id,
            })
        }
        other => Ok(InterruptPacket::Unknown(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DEVICE_STOPPED, TEMPERATURE_WARNING};
    use bytemuck::Zeroable;

    fn pose_transfer(ns: u64) -> Vec<u8> {
        let mut msg = InterruptPose::zeroed();
        msg.header.length = std::mem::size_of::<InterruptPose>() as u32;
        msg.header.message_id = DEV_GET_POSE;
        msg.pose.nanoseconds = ns;
        msg.pose.tracker_state = 0x4;
        bytemuck::bytes_of(&msg).to_vec()
    }

    fn status_transfer(message_id: u16, status: u16) -> Vec<u8> {
        let mut msg = InterruptStatus::zeroed();
        msg.header.length = std::mem::size_of::<InterruptStatus>() as u32;
        msg.header.message_id = message_id;
        msg.status = status;
        bytemuck::bytes_of(&msg).to_vec()
    }

    #[test]
    fn decodes_pose_transfer() {
        let buf = pose_transfer(42);
        match decode_interrupt(&buf) {
            Ok(InterruptPacket::Pose(pose)) => assert_eq!({ pose.nanoseconds }, 42),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_status_and_error_transfers() {
        assert_eq!(
            decode_interrupt(&status_transfer(DEV_STATUS, DEVICE_STOPPED)).unwrap(),
            InterruptPacket::Status(DEVICE_STOPPED)
        );
        assert_eq!(
            decode_interrupt(&status_transfer(DEV_STATUS, TEMPERATURE_WARNING)).unwrap(),
            InterruptPacket::Status(TEMPERATURE_WARNING)
        );
        assert_eq!(
            decode_interrupt(&status_transfer(DEV_ERROR, 0x0003)).unwrap(),
            InterruptPacket::DeviceError(0x0003)
        );
        assert_eq!(
            decode_interrupt(&status_transfer(SLAM_ERROR, 0x0001)).unwrap(),
            InterruptPacket::SlamError(0x0001)
        );
    }

    #[test]
    fn decodes_relocalization_transfer() {
        let mut msg = InterruptRelocalization::zeroed();
        msg.header.length = std::mem::size_of::<InterruptRelocalization>() as u32;
        msg.header.message_id = SLAM_RELOCALIZATION_EVENT;
        msg.nanoseconds = 9_999;
        msg.session_id = 7;
        let buf = bytemuck::bytes_of(&msg).to_vec();

        assert_eq!(
            decode_interrupt(&buf).unwrap(),
            InterruptPacket::Relocalization {
                timestamp_ns: 9_999,
                session_id: 7
            }
        );
    }

    #[test]
    fn truncated_pose_is_rejected() {
        let buf = pose_transfer(1);
        let err = decode_interrupt(&buf[..20]).unwrap_err();
        match err {
            Error::MessageTooShort { expected, actual } => {
                assert_eq!(expected, std::mem::size_of::<InterruptPose>());
                assert_eq!(actual, 20);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn transfer_shorter_than_header_is_rejected() {
        assert!(matches!(
            decode_interrupt(&[0u8; 3]),
            Err(Error::MessageTooShort { .. })
        ));
    }

    #[test]
    fn unknown_message_id_is_not_an_error() {
        let buf = status_transfer(0x7777, 0);
        assert_eq!(
            decode_interrupt(&buf).unwrap(),
            InterruptPacket::Unknown(0x7777)
        );
    }
}
