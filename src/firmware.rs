//! Bootloader recovery. A TM2 module without firmware enumerates as a
//! Movidius bootloader and does nothing until an `.mvcmd` image is pushed to
//! it over bulk OUT.

use crate::error::{Error, Result};
use crate::protocol::ENDPOINT_BOOTLOADER_OUT;
use rusb::{DeviceHandle, GlobalContext};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// SHA-1 of the last firmware Intel shipped for the T265 (v0.2.0.951).
pub const FIRMWARE_0_2_0_951_SHA1: &str = "c3940ccbb0e3045603e4aceaa2d73427f96e24bc";

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// A firmware image loaded from disk, ready for upload.
pub struct Firmware {
    data: Vec<u8>,
    digest: String,
}

impl Firmware {
    pub fn from_image(data: Vec<u8>) -> Self {
        let digest = sha1_hex(&data);
        Firmware { data, digest }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_image(std::fs::read(path)?))
    }

    /// Load an image and reject it unless its SHA-1 matches `expected`.
    pub fn load_verified(path: &Path, expected: &str) -> Result<Self> {
        let fw = Self::load(path)?;
        fw.verify_digest(expected)?;
        Ok(fw)
    }

    pub fn verify_digest(&self, expected: &str) -> Result<()> {
        if self.digest != expected {
            return Err(Error::FirmwareDigest {
                expected: expected.to_string(),
                actual: self.digest.clone(),
            });
        }
        Ok(())
    }

    /// Lowercase hex SHA-1 of the image.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Push the image to a device in bootloader mode. The module drops off
    /// the bus and re-enumerates with the TM2 VID/PID a few seconds later.
    pub(crate) fn upload(&self, handle: &DeviceHandle<GlobalContext>) -> Result<()> {
        info!(bytes = self.data.len(), digest = %self.digest, "uploading firmware");

        for chunk in self.data.chunks(UPLOAD_CHUNK_SIZE) {
            handle
                .write_bulk(ENDPOINT_BOOTLOADER_OUT, chunk, UPLOAD_TIMEOUT)
                .map_err(|e| Error::usb("firmware write_bulk", e))?;
        }

        // Boot time before the module re-enumerates.
        std::thread::sleep(Duration::from_secs(3));
        Ok(())
    }
}

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_hex_known_vectors() {
        assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn verify_digest_accepts_matching_image() {
        let fw = Firmware::from_image(b"abc".to_vec());
        assert_eq!(fw.digest(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert!(fw
            .verify_digest("a9993e364706816aba3e25717850c26c9cd0d89d")
            .is_ok());
    }

    #[test]
    fn verify_digest_rejects_mismatch() {
        let fw = Firmware::from_image(b"abc".to_vec());
        match fw.verify_digest(FIRMWARE_0_2_0_951_SHA1) {
            Err(Error::FirmwareDigest { expected, actual }) => {
                assert_eq!(expected, FIRMWARE_0_2_0_951_SHA1);
                assert_eq!(actual, fw.digest());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
