//! Device-identity-keyed ECB encryption.
//!
//! The cipher key is derived from the hardware-unique device identifier:
//! the low 8 bytes of the identifier, duplicated into both key halves. The
//! matching unpack tooling on the receiving side recovers the key from the
//! device identifier the payload announces, so the key is deliberately
//! device-recoverable rather than secret.
//!
//! Cleartext is processed in 16-byte strides. The final partial block is
//! zero-padded; padding is never stripped because there is no decrypt path
//! on the device. Each block goes through the ECB engine independently, so
//! identical plaintext blocks yield identical ciphertext blocks.

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::constants::{BLOCK_SIZE, KEY_SIZE};
use crate::device::{BleStack, DeviceId, DeviceRegisters, EcbEngine};
use crate::error::EspError;

/// Derive the AES-128 key from the device identifier.
///
/// Uses only identifier bytes 0..8, repeated to fill the key. Same
/// identifier, same key; there is no randomness or counter involved.
pub fn derive_key(id: &DeviceId) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    key[..8].copy_from_slice(&id.as_bytes()[..8]);
    key[8..].copy_from_slice(&id.as_bytes()[..8]);
    key
}

/// How cleartext bytes are copied into the zero-filled input block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CopyStyle {
    /// Copy exactly the available bytes of the chunk. Embedded zero bytes
    /// are transmitted faithfully.
    #[default]
    Binary,
    /// strncpy semantics: the copy stops at the first zero byte inside the
    /// 16-byte window and the remainder stays padding. Under-copies binary
    /// payloads that contain zero bytes; kept for wire parity with deployed
    /// firmware.
    NulTerminated,
}

/// Ciphertext accumulator.
///
/// Grows only through [`push_block`](Self::push_block), so the recorded
/// length is a multiple of the block size by construction.
#[derive(Debug, Default)]
pub struct CiphertextBuffer {
    data: BytesMut,
}

impl CiphertextBuffer {
    pub fn with_capacity(blocks: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(blocks * BLOCK_SIZE),
        }
    }

    pub fn push_block(&mut self, block: &[u8; BLOCK_SIZE]) {
        self.data.extend_from_slice(block);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.data.len() / BLOCK_SIZE
    }

    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}

/// Encryption facade over the injected hardware capabilities.
///
/// Mirrors the two operations the device exposes to scripts: reading a
/// word of the device identifier and encrypting a payload.
pub struct DeviceCrypto<R, B, E> {
    registers: R,
    ble: B,
    ecb: E,
    copy_style: CopyStyle,
}

impl<R, B, E> DeviceCrypto<R, B, E>
where
    R: DeviceRegisters,
    B: BleStack,
    E: EcbEngine,
{
    pub fn new(registers: R, ble: B, ecb: E) -> Self {
        Self {
            registers,
            ble,
            ecb,
            copy_style: CopyStyle::default(),
        }
    }

    pub fn with_copy_style(mut self, copy_style: CopyStyle) -> Self {
        self.copy_style = copy_style;
        self
    }

    /// One little-endian 32-bit word of the device identifier.
    ///
    /// Out-of-range indices select word 0.
    pub fn device_id_word(&self, index: i32) -> u32 {
        self.registers.device_id().word(index)
    }

    /// Encrypt `cleartext`, returning an empty buffer on any failure.
    ///
    /// Thin wrapper over [`try_encrypt`](Self::try_encrypt) for callers
    /// without an error channel.
    pub fn encrypt(&self, cleartext: &[u8]) -> Bytes {
        match self.try_encrypt(cleartext) {
            Ok(ciphertext) => ciphertext,
            Err(error) => {
                warn!("encryption aborted: {error}");
                Bytes::new()
            }
        }
    }

    /// Encrypt `cleartext` block by block.
    ///
    /// Refuses to run while the BLE stack is down. A single engine failure
    /// aborts the whole run; partial ciphertext is never returned. On
    /// success the output length is the cleartext length rounded up to a
    /// whole number of blocks, with empty input producing one fully padded
    /// zero block.
    pub fn try_encrypt(&self, cleartext: &[u8]) -> Result<Bytes, EspError> {
        if !self.ble.is_enabled() {
            return Err(EspError::PlatformUnavailable);
        }

        let key = derive_key(&self.registers.device_id());
        let block_count = cleartext.len().div_ceil(BLOCK_SIZE).max(1);
        let mut buffer = CiphertextBuffer::with_capacity(block_count);

        for i in 0..block_count {
            let offset = i * BLOCK_SIZE;
            let end = cleartext.len().min(offset + BLOCK_SIZE);
            let mut block = [0u8; BLOCK_SIZE];
            fill_block(&mut block, &cleartext[offset..end], self.copy_style);

            let ciphertext = self
                .ecb
                .encrypt_block(&key, &block)
                .map_err(|_| EspError::BlockEncrypt { block: i })?;
            buffer.push_block(&ciphertext);
        }

        Ok(buffer.freeze())
    }
}

/// Copy a chunk of cleartext into a zero-filled input block.
fn fill_block(block: &mut [u8; BLOCK_SIZE], chunk: &[u8], copy_style: CopyStyle) {
    let len = match copy_style {
        CopyStyle::Binary => chunk.len(),
        CopyStyle::NulTerminated => chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len()),
    };
    block[..len].copy_from_slice(&chunk[..len]);
}
