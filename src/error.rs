use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("USB {op} failed: {source}")]
    Usb {
        op: &'static str,
        #[source]
        source: rusb::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device not found")]
    DeviceNotFound,

    #[error("device busy")]
    DeviceBusy,

    #[error("device stopped")]
    DeviceStopped,

    #[error("device temperature warning")]
    TemperatureWarning,

    #[error("{op} failed with status {status:#06x}")]
    CommandFailed { op: &'static str, status: u16 },

    #[error("message too short: expected {expected} bytes, got {actual}")]
    MessageTooShort { expected: usize, actual: usize },

    #[error("pose stream closed")]
    StreamClosed,

    #[error("firmware digest mismatch: expected {expected}, got {actual}")]
    FirmwareDigest { expected: String, actual: String },
}

impl Error {
    pub(crate) fn usb(op: &'static str, source: rusb::Error) -> Self {
        Error::Usb { op, source }
    }

    /// Map a non-success wire status to the matching error for `op`.
    pub(crate) fn from_status(op: &'static str, status: u16) -> Self {
        match status {
            crate::protocol::DEVICE_BUSY => Error::DeviceBusy,
            crate::protocol::DEVICE_STOPPED => Error::DeviceStopped,
            crate::protocol::TEMPERATURE_WARNING => Error::TemperatureWarning,
            _ => Error::CommandFailed { op, status },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DEVICE_BUSY;

    #[test]
    fn status_maps_to_specific_errors() {
        assert!(matches!(
            Error::from_status("SLAM_6DOF_CONTROL", DEVICE_BUSY),
            Error::DeviceBusy
        ));
        match Error::from_status("DEV_START", 0x0042) {
            Error::CommandFailed { op, status } => {
                assert_eq!(op, "DEV_START");
                assert_eq!(status, 0x0042);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn command_failure_names_the_command() {
        let e = Error::CommandFailed {
            op: "DEV_STOP",
            status: 0x0008,
        };
        assert_eq!(e.to_string(), "DEV_STOP failed with status 0x0008");
    }
}
