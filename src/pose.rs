use crate::protocol::PoseData;

/// A single 6DOF sample from the module's on-device tracking.
///
/// Timestamps are device nanoseconds shifted onto the host clock by the
/// offset measured during [`sync_time`](crate::TrackerDevice).
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSample {
    /// Position in meters, device start frame.
    pub translation: [f32; 3],
    /// Orientation quaternion as [i, j, k, r].
    pub rotation: [f32; 4],
    /// Linear velocity in m/s.
    pub velocity: [f32; 3],
    /// Angular velocity in rad/s.
    pub angular_velocity: [f32; 3],
    /// Linear acceleration in m/s^2.
    pub acceleration: [f32; 3],
    /// Angular acceleration in rad/s^2.
    pub angular_acceleration: [f32; 3],
    pub timestamp_ns: u64,
    pub tracker_confidence: Confidence,
    // Mapper confidence tends to report Failed even when mapping works.
    pub mapper_confidence: Confidence,
    pub tracker_state: TrackerState,
    /// Serial of the module that produced the sample.
    pub serial: String,
}

impl PoseSample {
    pub(crate) fn from_wire(data: &PoseData, time_offset_ns: i64, serial: &str) -> Self {
        PoseSample {
            translation: [data.x, data.y, data.z],
            rotation: [data.qi, data.qj, data.qk, data.qr],
            velocity: [data.vx, data.vy, data.vz],
            angular_velocity: [data.vax, data.vay, data.vaz],
            acceleration: [data.ax, data.ay, data.az],
            angular_acceleration: [data.aax, data.aay, data.aaz],
            timestamp_ns: ({ data.nanoseconds } as i64 + time_offset_ns) as u64,
            tracker_confidence: Confidence::from(data.tracker_confidence),
            mapper_confidence: Confidence::from(data.mapper_confidence),
            tracker_state: TrackerState::from(data.tracker_state),
            serial: serial.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Failed = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl From<u32> for Confidence {
    fn from(value: u32) -> Self {
        match value & 0x3 {
            1 => Confidence::Low,
            2 => Confidence::Medium,
            3 => Confidence::High,
            _ => Confidence::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Inactive,
    Active3Dof,
    Active6Dof,
    InertialOnly3Dof,
    Unknown,
}

impl From<u32> for TrackerState {
    fn from(value: u32) -> Self {
        match value {
            0x0 => TrackerState::Inactive,
            0x3 => TrackerState::Active3Dof,
            0x4 => TrackerState::Active6Dof,
            0x7 => TrackerState::InertialOnly3Dof,
            _ => TrackerState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[test]
    fn confidence_uses_low_two_bits() {
        assert_eq!(Confidence::from(0), Confidence::Failed);
        assert_eq!(Confidence::from(1), Confidence::Low);
        assert_eq!(Confidence::from(2), Confidence::Medium);
        assert_eq!(Confidence::from(3), Confidence::High);
        // Upper bits are reserved and must not affect the mapping.
        assert_eq!(Confidence::from(0x7), Confidence::High);
        assert_eq!(Confidence::from(0x10), Confidence::Failed);
    }

    #[test]
    fn tracker_state_known_and_unknown_values() {
        assert_eq!(TrackerState::from(0x0), TrackerState::Inactive);
        assert_eq!(TrackerState::from(0x3), TrackerState::Active3Dof);
        assert_eq!(TrackerState::from(0x4), TrackerState::Active6Dof);
        assert_eq!(TrackerState::from(0x7), TrackerState::InertialOnly3Dof);
        assert_eq!(TrackerState::from(0x5), TrackerState::Unknown);
    }

    #[test]
    fn from_wire_applies_clock_offset() {
        let mut data = PoseData::zeroed();
        data.x = 0.25;
        data.qr = 1.0;
        data.nanoseconds = 1_000;
        data.tracker_confidence = 3;
        data.tracker_state = 0x4;

        let sample = PoseSample::from_wire(&data, 500, "905312110000");
        assert_eq!(sample.translation, [0.25, 0.0, 0.0]);
        assert_eq!(sample.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(sample.timestamp_ns, 1_500);
        assert_eq!(sample.tracker_confidence, Confidence::High);
        assert_eq!(sample.tracker_state, TrackerState::Active6Dof);
        assert_eq!(sample.serial, "905312110000");
    }

    #[test]
    fn from_wire_negative_offset() {
        let mut data = PoseData::zeroed();
        data.nanoseconds = 10_000;
        let sample = PoseSample::from_wire(&data, -4_000, "s");
        assert_eq!(sample.timestamp_ns, 6_000);
    }
}
