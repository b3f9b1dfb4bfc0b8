use crate::error::{Error, Result};
use crate::events::TrackerEvent;
use std::sync::mpsc;
use std::time::Duration;

/// One streaming session: the event side of a started per-device pose stream.
///
/// The reader thread owned by [`TrackerDevice`](crate::TrackerDevice) feeds
/// this; when that thread exits (device stopped, hard error, USB failure) the
/// stream reports [`Error::StreamClosed`] on the next fetch.
pub struct PoseStream {
    serial: String,
    rx: mpsc::Receiver<TrackerEvent>,
}

impl PoseStream {
    pub(crate) fn new(serial: String, rx: mpsc::Receiver<TrackerEvent>) -> Self {
        PoseStream { serial, rx }
    }

    /// Serial of the device this session streams from.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Non-blocking fetch of the next queued event. `Ok(None)` means nothing
    /// has arrived since the last call.
    pub fn poll(&self) -> Result<Option<TrackerEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(Error::StreamClosed),
        }
    }

    /// Blocking fetch with a timeout; `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<TrackerEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::StreamClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_is_non_blocking_and_ordered() {
        let (tx, rx) = mpsc::channel();
        let stream = PoseStream::new("abc123".into(), rx);

        assert_eq!(stream.serial(), "abc123");
        assert!(stream.poll().unwrap().is_none());

        tx.send(TrackerEvent::TemperatureWarning).unwrap();
        tx.send(TrackerEvent::SlamError { status: 0x1 }).unwrap();

        assert_eq!(
            stream.poll().unwrap(),
            Some(TrackerEvent::TemperatureWarning)
        );
        assert_eq!(
            stream.poll().unwrap(),
            Some(TrackerEvent::SlamError { status: 0x1 })
        );
        assert!(stream.poll().unwrap().is_none());
    }

    #[test]
    fn dropped_reader_closes_the_stream() {
        let (tx, rx) = mpsc::channel();
        let stream = PoseStream::new("abc123".into(), rx);

        tx.send(TrackerEvent::TemperatureWarning).unwrap();
        drop(tx);

        // Queued events drain before the closure is reported.
        assert!(stream.poll().unwrap().is_some());
        assert!(matches!(stream.poll(), Err(Error::StreamClosed)));
    }

    #[test]
    fn recv_timeout_returns_none_on_timeout() {
        let (_tx, rx) = mpsc::channel::<TrackerEvent>();
        let stream = PoseStream::new("abc123".into(), rx);
        assert!(stream
            .recv_timeout(Duration::from_millis(5))
            .unwrap()
            .is_none());
    }
}
