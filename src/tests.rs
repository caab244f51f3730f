//! Cross-module tests: the encrypted-telemetry flow from device identifier
//! to the bytes that leave the wifi module.

use aes::Aes128;
use aes::cipher::{BlockDecrypt, KeyInit};

use crate::constants::{BLOCK_SIZE, DEVICE_ID_SIZE, KEY_SIZE};
use crate::crypto::{DeviceCrypto, derive_key};
use crate::device::{BleStack, DeviceId, DeviceRegisters, SoftEcb};
use crate::serial::tests::FakeUart;
use crate::serial::{BaudRate, SerialPin};
use crate::wifi::Esp8266;

struct FixedRegisters([u8; DEVICE_ID_SIZE]);

impl DeviceRegisters for FixedRegisters {
    fn device_id(&self) -> DeviceId {
        DeviceId::from_bytes(self.0)
    }
}

struct Ble(bool);

impl BleStack for Ble {
    fn is_enabled(&self) -> bool {
        self.0
    }
}

const TEST_ID: [u8; DEVICE_ID_SIZE] = [
    0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6, 0x07, 0x18, 0x29, 0x3A, 0x4B, 0x5C, 0x6D, 0x7E, 0x8F,
    0x90,
];

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn decrypt(ciphertext: &[u8], key: &[u8; KEY_SIZE]) -> Vec<u8> {
    assert!(ciphertext.len().is_multiple_of(BLOCK_SIZE));
    let cipher = Aes128::new(key.into());
    let mut output = ciphertext.to_vec();
    for chunk in output.chunks_mut(BLOCK_SIZE) {
        cipher.decrypt_block(chunk.into());
    }
    output
}

/// The receiving side knows only the device identifier and recovers the
/// payload from it: the key is device-recoverable by design.
#[test]
fn test_receiver_recovers_payload_from_device_id() {
    init_tracing();
    let crypto = DeviceCrypto::new(FixedRegisters(TEST_ID), Ble(true), SoftEcb);
    let payload = b"{\"temperature\":23.5}";
    let ciphertext = crypto.encrypt(payload);
    assert_eq!(ciphertext.len(), 32);

    let key = derive_key(&DeviceId::from_bytes(TEST_ID));
    let recovered = decrypt(&ciphertext, &key);
    assert_eq!(&recovered[..payload.len()], payload);
    // the rest of the final block is zero padding, never stripped
    assert!(recovered[payload.len()..].iter().all(|&b| b == 0));
}

#[test]
fn test_encrypted_payload_goes_out_over_udp() {
    init_tracing();
    let crypto = DeviceCrypto::new(FixedRegisters(TEST_ID), Ble(true), SoftEcb);
    let ciphertext = crypto.encrypt(b"light:50");
    assert_eq!(ciphertext.len(), BLOCK_SIZE);

    let mut esp = Esp8266::new(
        FakeUart::with_input("OK\r\nOK\r\n>SEND OK\r\nOK\r\n"),
        SerialPin::C17,
        SerialPin::C16,
        BaudRate::Baud115200,
    );
    esp.send_udp("46.23.86.61", 9090, &ciphertext).unwrap();

    let sent = &esp.modem_mut().port_mut().uart_mut().output;
    let announced = format!("AT+CIPSEND={}\r\n", ciphertext.len());
    assert!(
        String::from_utf8_lossy(sent).contains(&announced),
        "length announcement missing"
    );
    assert!(
        sent.windows(ciphertext.len())
            .any(|window| window == ciphertext),
        "ciphertext bytes never left the port"
    );
}

#[test]
fn test_no_telemetry_without_ble_stack() {
    init_tracing();
    let crypto = DeviceCrypto::new(FixedRegisters(TEST_ID), Ble(false), SoftEcb);
    let ciphertext = crypto.encrypt(b"light:50");
    // nothing to send: the caller sees an empty buffer, not partial data
    assert!(ciphertext.is_empty());
}

#[test]
fn test_announced_device_id_matches_key_material() {
    let crypto = DeviceCrypto::new(FixedRegisters(TEST_ID), Ble(true), SoftEcb);
    // a payload header announces words 0 and 1; together they are exactly
    // the identifier bytes the key is derived from
    let mut announced = Vec::new();
    announced.extend_from_slice(&crypto.device_id_word(0).to_le_bytes());
    announced.extend_from_slice(&crypto.device_id_word(1).to_le_bytes());

    let key = derive_key(&DeviceId::from_bytes(TEST_ID));
    assert_eq!(&key[..8], &announced[..]);
    assert_eq!(&key[8..], &announced[..]);
}
