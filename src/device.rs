use crate::error::{Error, Result};
use crate::events::{decode_interrupt, InterruptPacket, TrackerEvent};
use crate::pose::PoseSample;
use crate::protocol::{
    Request6DofControl, Request6DofInterruptRate, RequestGetTime, RequestHeader, RequestStart,
    RequestStop, Response6DofControl, Response6DofInterruptRate, ResponseGetTime, ResponseHeader,
    ResponseStart, ResponseStop, DEVICE_STOPPED, DEV_GET_TIME, DEV_START, DEV_STOP,
    ENDPOINT_CONTROL_IN, ENDPOINT_CONTROL_OUT, ENDPOINT_INTERRUPT_IN, SIXDOF_MODE_ENABLE_MAPPING,
    SIXDOF_MODE_ENABLE_RELOCALIZATION, SLAM_6DOF_CONTROL, SLAM_SET_6DOF_INTERRUPT_RATE, SUCCESS,
    TEMPERATURE_WARNING, USB_TIMEOUT,
};
use crate::stream::PoseStream;
use rusb::{DeviceHandle, GlobalContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// An open TM2 module: control channel plus at most one pose stream.
pub struct TrackerDevice {
    handle: Arc<DeviceHandle<GlobalContext>>,
    serial: String,
    product_id: u16,
    time_offset_ns: i64,
    streaming: Arc<AtomicBool>,
    mode: u8,
}

impl TrackerDevice {
    pub(crate) fn new(handle: DeviceHandle<GlobalContext>, serial: String, product_id: u16) -> Self {
        Self {
            handle: Arc::new(handle),
            serial,
            product_id,
            time_offset_ns: 0,
            streaming: Arc::new(AtomicBool::new(false)),
            mode: SIXDOF_MODE_ENABLE_MAPPING | SIXDOF_MODE_ENABLE_RELOCALIZATION,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// USB product ID read during enumeration.
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Set the 6DOF mode used by the next [`start_pose_stream`](Self::start_pose_stream).
    pub fn set_mode(&mut self, mode: u8) {
        self.mode = mode;
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    fn bulk_request<Req: bytemuck::Pod, Resp: bytemuck::Pod>(
        &self,
        op: &'static str,
        request: &Req,
    ) -> Result<Resp> {
        self.handle
            .write_bulk(ENDPOINT_CONTROL_OUT, bytemuck::bytes_of(request), USB_TIMEOUT)
            .map_err(|e| Error::usb(op, e))?;

        let mut resp_buf = vec![0u8; 1024];
        let size = self
            .handle
            .read_bulk(ENDPOINT_CONTROL_IN, &mut resp_buf, USB_TIMEOUT)
            .map_err(|e| Error::usb(op, e))?;

        if size < std::mem::size_of::<Resp>() {
            return Err(Error::MessageTooShort {
                expected: std::mem::size_of::<Resp>(),
                actual: size,
            });
        }

        // Every response this crate reads starts with the common header.
        if std::mem::size_of::<Resp>() >= std::mem::size_of::<ResponseHeader>() {
            let header: ResponseHeader = bytemuck::pod_read_unaligned(
                &resp_buf[..std::mem::size_of::<ResponseHeader>()],
            );
            if header.status != SUCCESS {
                return Err(Error::from_status(op, header.status));
            }
        }

        Ok(bytemuck::pod_read_unaligned(
            &resp_buf[..std::mem::size_of::<Resp>()],
        ))
    }

    pub(crate) fn enable_6dof(&mut self, mode: u8) -> Result<()> {
        let req = Request6DofControl {
            header: RequestHeader {
                length: 9,
                message_id: SLAM_6DOF_CONTROL,
            },
            enable: 1,
            mode,
        };
        let _resp: Response6DofControl = self.bulk_request("SLAM_6DOF_CONTROL", &req)?;
        self.mode = mode;
        Ok(())
    }

    /// Select which sensor class drives the pose interrupt rate.
    pub fn set_interrupt_rate(&self, rate: u8) -> Result<()> {
        let req = Request6DofInterruptRate {
            header: RequestHeader {
                length: 5,
                message_id: SLAM_SET_6DOF_INTERRUPT_RATE,
            },
            interrupt_rate: rate,
        };
        let _resp: Response6DofInterruptRate =
            self.bulk_request("SLAM_SET_6DOF_INTERRUPT_RATE", &req)?;
        Ok(())
    }

    pub(crate) fn start_streaming(&self) -> Result<()> {
        let req = RequestStart {
            header: RequestHeader {
                length: 4,
                message_id: DEV_START,
            },
        };
        let _resp: ResponseStart = self.bulk_request("DEV_START", &req)?;
        Ok(())
    }

    pub(crate) fn stop_streaming(&self) -> Result<()> {
        let req = RequestStop {
            header: RequestHeader {
                length: 4,
                message_id: DEV_STOP,
            },
        };
        let _resp: ResponseStop = self.bulk_request("DEV_STOP", &req)?;
        Ok(())
    }

    /// Measure the host/device clock offset with a DEV_GET_TIME round trip.
    /// The device timestamp is assumed to land at the midpoint of the
    /// request, which keeps multi-device timestamps comparable.
    pub(crate) fn sync_time(&mut self) -> Result<()> {
        let host_start = Instant::now();
        let wall_start = SystemTime::now();

        let req = RequestGetTime {
            header: RequestHeader {
                length: 6,
                message_id: DEV_GET_TIME,
            },
        };
        let resp: ResponseGetTime = self.bulk_request("DEV_GET_TIME", &req)?;

        let roundtrip = host_start.elapsed();
        let host_mid_ns = wall_start
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::Io(std::io::Error::other("system clock before unix epoch")))?
            .as_nanos() as i64
            + (roundtrip / 2).as_nanos() as i64;

        self.time_offset_ns = host_mid_ns - { resp.nanoseconds } as i64;
        debug!(
            serial = %self.serial,
            offset_ns = self.time_offset_ns,
            roundtrip_us = roundtrip.as_micros() as u64,
            "clock synced"
        );
        Ok(())
    }

    /// Enable 6DOF tracking, start the device, and spawn the interrupt
    /// reader. Returns the session's event side.
    pub(crate) fn start_pose_stream(&mut self) -> Result<PoseStream> {
        self.enable_6dof(self.mode)?;
        self.start_streaming()?;

        let (tx, rx) = mpsc::channel();
        let handle = Arc::clone(&self.handle);
        let serial = self.serial.clone();
        let time_offset_ns = self.time_offset_ns;
        let streaming = Arc::clone(&self.streaming);
        streaming.store(true, Ordering::SeqCst);

        std::thread::spawn(move || {
            let mut buffer = vec![0u8; 128];

            while streaming.load(Ordering::SeqCst) {
                let size = match handle.read_interrupt(
                    ENDPOINT_INTERRUPT_IN,
                    &mut buffer,
                    Duration::from_millis(1000),
                ) {
                    Ok(size) => size,
                    Err(rusb::Error::Timeout) => continue,
                    Err(e) => {
                        error!(serial = %serial, error = %e, "interrupt read failed");
                        break;
                    }
                };

                let packet = match decode_interrupt(&buffer[..size]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(serial = %serial, error = %e, "dropping malformed interrupt");
                        continue;
                    }
                };

                let event = match packet {
                    InterruptPacket::Pose(data) => {
                        TrackerEvent::Pose(PoseSample::from_wire(&data, time_offset_ns, &serial))
                    }
                    InterruptPacket::Status(DEVICE_STOPPED) => {
                        if streaming.load(Ordering::SeqCst) {
                            debug!(serial = %serial, "ignoring stale STOPPED status");
                            continue;
                        }
                        info!(serial = %serial, "device stopped");
                        break;
                    }
                    InterruptPacket::Status(TEMPERATURE_WARNING) => {
                        warn!(serial = %serial, "temperature warning");
                        TrackerEvent::TemperatureWarning
                    }
                    InterruptPacket::Status(status) => {
                        warn!(serial = %serial, status = %format_args!("{status:#06x}"), "unknown device status");
                        continue;
                    }
                    InterruptPacket::DeviceError(status) => {
                        error!(serial = %serial, status = %format_args!("{status:#06x}"), "device error");
                        break;
                    }
                    InterruptPacket::SlamError(status) => {
                        warn!(serial = %serial, status = %format_args!("{status:#06x}"), "SLAM error");
                        TrackerEvent::SlamError { status }
                    }
                    InterruptPacket::Relocalization {
                        timestamp_ns,
                        session_id,
                    } => {
                        info!(serial = %serial, session_id, "relocalized");
                        TrackerEvent::Relocalization {
                            timestamp_ns,
                            session_id,
                        }
                    }
                    InterruptPacket::Unknown(message_id) => {
                        debug!(serial = %serial, message_id = %format_args!("{message_id:#06x}"), "skipping unknown interrupt");
                        continue;
                    }
                };

                if tx.send(event).is_err() {
                    debug!(serial = %serial, "stream receiver dropped");
                    break;
                }
            }
        });

        Ok(PoseStream::new(self.serial.clone(), rx))
    }

    pub(crate) fn stop_pose_stream(&mut self) -> Result<()> {
        if !self.streaming.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.streaming.store(false, Ordering::SeqCst);
        // Let the reader observe the flag and finish its last transfer.
        std::thread::sleep(Duration::from_millis(200));
        self.stop_streaming()
    }
}

impl Drop for TrackerDevice {
    fn drop(&mut self) {
        let _ = self.stop_pose_stream();
    }
}
