use crate::device::TrackerDevice;
use crate::error::{Error, Result};
use crate::firmware::Firmware;
use crate::protocol::{TM2_BOOT_PID, TM2_BOOT_VID, TM2_PID, TM2_VID};
use crate::stream::PoseStream;
use rusb::{DeviceDescriptor, DeviceHandle, GlobalContext, UsbContext};
use std::time::Duration;
use tracing::{info, warn};

/// Enumerates TM2 modules on the bus and owns the open devices.
pub struct TrackerManager {
    devices: Vec<TrackerDevice>,
    context: GlobalContext,
}

impl TrackerManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            devices: Vec::new(),
            context: GlobalContext::default(),
        })
    }

    /// Enumerate and open every attached module. Modules still sitting in
    /// bootloader mode are reported and skipped; use
    /// [`discover_devices_with_firmware`](Self::discover_devices_with_firmware)
    /// to boot them. Returns the serials of the opened devices.
    pub fn discover_devices(&mut self) -> Result<Vec<String>> {
        self.devices.clear();
        let unbooted = self.scan()?;
        if unbooted > 0 {
            warn!(
                count = unbooted,
                "skipping device(s) in bootloader mode; no firmware image configured"
            );
        }
        Ok(self.serials())
    }

    /// Like [`discover_devices`](Self::discover_devices), but uploads
    /// `firmware` to any module found in bootloader mode and re-enumerates
    /// once the module has booted.
    pub fn discover_devices_with_firmware(&mut self, firmware: &Firmware) -> Result<Vec<String>> {
        self.devices.clear();
        let unbooted = self.scan()?;

        if unbooted > 0 {
            self.boot_pending(firmware)?;
            info!("re-enumerating after firmware boot");
            // Drop the handles opened on the first pass before rescanning.
            self.devices.clear();
            std::thread::sleep(Duration::from_secs(2));
            let still_unbooted = self.scan()?;
            if still_unbooted > 0 {
                warn!(count = still_unbooted, "device(s) did not leave bootloader mode");
            }
        }

        Ok(self.serials())
    }

    /// One enumeration pass: open every TM2 module, return the number of
    /// devices seen in bootloader mode.
    fn scan(&mut self) -> Result<usize> {
        let mut unbooted = 0;

        for device in self
            .context
            .devices()
            .map_err(|e| Error::usb("devices", e))?
            .iter()
        {
            let desc = device
                .device_descriptor()
                .map_err(|e| Error::usb("device_descriptor", e))?;

            if desc.vendor_id() == TM2_BOOT_VID && desc.product_id() == TM2_BOOT_PID {
                unbooted += 1;
                continue;
            }
            if desc.vendor_id() != TM2_VID || desc.product_id() != TM2_PID {
                continue;
            }

            let handle = device.open().map_err(|e| Error::usb("open", e))?;
            let serial = read_serial(&handle, &desc, self.devices.len());
            handle
                .claim_interface(0)
                .map_err(|e| Error::usb("claim_interface", e))?;

            info!(serial = %serial, "opened tracking module");
            self.devices
                .push(TrackerDevice::new(handle, serial, desc.product_id()));
        }

        Ok(unbooted)
    }

    /// Upload firmware to every device currently in bootloader mode.
    fn boot_pending(&mut self, firmware: &Firmware) -> Result<()> {
        for device in self
            .context
            .devices()
            .map_err(|e| Error::usb("devices", e))?
            .iter()
        {
            let desc = device
                .device_descriptor()
                .map_err(|e| Error::usb("device_descriptor", e))?;
            if desc.vendor_id() != TM2_BOOT_VID || desc.product_id() != TM2_BOOT_PID {
                continue;
            }

            let handle = device.open().map_err(|e| Error::usb("open", e))?;
            handle
                .claim_interface(0)
                .map_err(|e| Error::usb("claim_interface", e))?;
            info!(
                bus = device.bus_number(),
                address = device.address(),
                "booting device"
            );
            firmware.upload(&handle)?;
        }
        Ok(())
    }

    /// Open a single module by serial without a full discovery pass.
    pub fn open_device(&mut self, serial: &str) -> Result<()> {
        for device in self
            .context
            .devices()
            .map_err(|e| Error::usb("devices", e))?
            .iter()
        {
            let desc = device
                .device_descriptor()
                .map_err(|e| Error::usb("device_descriptor", e))?;
            if desc.vendor_id() != TM2_VID || desc.product_id() != TM2_PID {
                continue;
            }

            let handle = device.open().map_err(|e| Error::usb("open", e))?;
            if read_serial(&handle, &desc, self.devices.len()) != serial {
                continue;
            }

            handle
                .claim_interface(0)
                .map_err(|e| Error::usb("claim_interface", e))?;
            self.devices
                .push(TrackerDevice::new(handle, serial.to_string(), desc.product_id()));
            return Ok(());
        }

        Err(Error::DeviceNotFound)
    }

    pub fn device(&self, serial: &str) -> Option<&TrackerDevice> {
        self.devices.iter().find(|d| d.serial() == serial)
    }

    pub fn device_mut(&mut self, serial: &str) -> Option<&mut TrackerDevice> {
        self.devices.iter_mut().find(|d| d.serial() == serial)
    }

    pub fn devices(&self) -> &[TrackerDevice] {
        &self.devices
    }

    fn serials(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.serial().to_string()).collect()
    }

    /// Set the 6DOF mode for one device. Must precede the stream start.
    pub fn set_device_mode(&mut self, serial: &str, mode: u8) -> Result<()> {
        let device = self.device_mut(serial).ok_or(Error::DeviceNotFound)?;
        device.set_mode(mode);
        Ok(())
    }

    /// Set the 6DOF mode for all devices. Must precede the stream starts.
    pub fn set_all_device_modes(&mut self, mode: u8) -> Result<()> {
        for device in &mut self.devices {
            device.set_mode(mode);
        }
        Ok(())
    }

    /// Start a pose stream on one device.
    pub fn start_pose_stream(&mut self, serial: &str) -> Result<PoseStream> {
        let device = self.device_mut(serial).ok_or(Error::DeviceNotFound)?;
        device.sync_time()?;
        device.start_pose_stream()
    }

    /// Start one pose stream per discovered device. Clocks are synced before
    /// any stream starts so samples across devices share a timebase.
    pub fn start_pose_streams(&mut self) -> Result<Vec<PoseStream>> {
        for device in &mut self.devices {
            device.sync_time()?;
        }

        let mut streams = Vec::with_capacity(self.devices.len());
        for device in &mut self.devices {
            streams.push(device.start_pose_stream()?);
        }
        Ok(streams)
    }

    pub fn stop_all_pose_streams(&mut self) -> Result<()> {
        for device in &mut self.devices {
            device.stop_pose_stream()?;
        }
        Ok(())
    }
}

fn read_serial(
    handle: &DeviceHandle<GlobalContext>,
    desc: &DeviceDescriptor,
    fallback_index: usize,
) -> String {
    let timeout = Duration::from_secs(1);
    handle
        .read_languages(timeout)
        .ok()
        .and_then(|languages| languages.first().copied())
        .and_then(|lang| handle.read_serial_number_string(lang, desc, timeout).ok())
        .unwrap_or_else(|| format!("unknown_{fallback_index}"))
}

impl Drop for TrackerManager {
    fn drop(&mut self) {
        let _ = self.stop_all_pose_streams();
    }
}
