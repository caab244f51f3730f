//! Hardware capability seams.
//!
//! The encryption core never touches registers or the softdevice directly.
//! It is handed three read-only capabilities: the device identifier
//! registers, the BLE stack readiness gate, and the ECB block-encrypt
//! engine. On target these wrap the FICR block and the softdevice call;
//! on a host they are implemented by fakes.

use aes::Aes128;
use aes::cipher::{BlockEncrypt, KeyInit};

use crate::constants::{BLOCK_SIZE, DEVICE_ID_SIZE, DEVICE_ID_WORDS, KEY_SIZE};
use crate::error::EcbFault;

/// 128-bit hardware-unique device identifier.
///
/// Burned into the device at manufacture; read-only for the lifetime of the
/// unit. Exposed to callers as four little-endian 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    bytes: [u8; DEVICE_ID_SIZE],
}

impl DeviceId {
    pub fn from_bytes(bytes: [u8; DEVICE_ID_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; DEVICE_ID_SIZE] {
        &self.bytes
    }

    /// 32-bit word at `index` within the identifier register block.
    ///
    /// Out-of-range indices (negative or above the last word) select word 0.
    pub fn word(&self, index: i32) -> u32 {
        let index = if index < 0 || index as usize >= DEVICE_ID_WORDS {
            0
        } else {
            index as usize
        };
        let offset = index * 4;
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.bytes))
    }
}

/// Access to the device identifier registers. Pure and infallible.
pub trait DeviceRegisters {
    fn device_id(&self) -> DeviceId;
}

/// Readiness gate for the radio stack.
///
/// The ECB peripheral is reached through the softdevice, so encryption must
/// refuse to run while the stack is down.
pub trait BleStack {
    fn is_enabled(&self) -> bool;
}

/// The block-encrypt primitive: one 16-byte block in, one out.
///
/// Treated as a black box with a single failure mode. ECB has no chaining,
/// so a call never depends on the outcome of a previous one.
pub trait EcbEngine {
    fn encrypt_block(
        &self,
        key: &[u8; KEY_SIZE],
        cleartext: &[u8; BLOCK_SIZE],
    ) -> Result<[u8; BLOCK_SIZE], EcbFault>;
}

/// Software ECB engine backed by the `aes` crate. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftEcb;

impl EcbEngine for SoftEcb {
    fn encrypt_block(
        &self,
        key: &[u8; KEY_SIZE],
        cleartext: &[u8; BLOCK_SIZE],
    ) -> Result<[u8; BLOCK_SIZE], EcbFault> {
        let cipher = Aes128::new(key.into());
        let mut block = *cleartext;
        cipher.encrypt_block((&mut block).into());
        Ok(block)
    }
}
