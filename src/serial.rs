//! Serial-port convenience layer.
//!
//! Thin helpers over an injected [`Uart`] port: receive-buffer sizing,
//! busy polling, reset back to the USB console and delimiter-based blocking
//! reads. Pure I/O plumbing, no protocol knowledge.

use std::thread;
use std::time::Duration;

use num_enum::IntoPrimitive;
use tracing::debug;

use crate::constants::MAX_RX_BUFFER_SIZE;
use crate::error::EspError;

/// Pins a serial port can be redirected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialPin {
    UsbTx,
    UsbRx,
    P0,
    P1,
    P2,
    C16,
    C17,
}

/// Supported baud rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u32)]
pub enum BaudRate {
    Baud9600 = 9600,
    Baud38400 = 38400,
    Baud57600 = 57600,
    Baud115200 = 115_200,
}

/// Baud rate of the USB console.
pub const DEFAULT_BAUD: BaudRate = BaudRate::Baud115200;

/// The hardware serial port the convenience layer drives.
///
/// `read_byte` blocks until a byte arrives and returns `None` once the port
/// will yield no further data.
pub trait Uart {
    fn redirect(&mut self, tx: SerialPin, rx: SerialPin, baud: BaudRate) -> Result<(), EspError>;
    fn set_rx_buffer_size(&mut self, size: usize);
    fn write(&mut self, data: &[u8]);
    fn read_byte(&mut self) -> Option<u8>;
    fn tx_in_use(&self) -> bool;
}

pub struct SerialPort<U> {
    uart: U,
}

impl<U: Uart> SerialPort<U> {
    pub fn new(uart: U) -> Self {
        Self { uart }
    }

    /// Set the receive buffer size, clamped to 254 bytes.
    ///
    /// The hardware locks up on a 255-byte allocation.
    pub fn set_receive_buffer_size(&mut self, size: usize) {
        let size = size.min(MAX_RX_BUFFER_SIZE);
        self.uart.set_rx_buffer_size(size);
    }

    /// Whether a transmission is currently in progress.
    pub fn busy(&self) -> bool {
        self.uart.tx_in_use()
    }

    pub fn redirect(
        &mut self,
        tx: SerialPin,
        rx: SerialPin,
        baud: BaudRate,
    ) -> Result<(), EspError> {
        debug!("redirect to {tx:?}/{rx:?} at {} baud", u32::from(baud));
        self.uart.redirect(tx, rx, baud)
    }

    /// Redirect back to the USB console pins at the default baud rate,
    /// retrying while the port reports it is in use.
    pub fn reset(&mut self) {
        while self
            .uart
            .redirect(SerialPin::UsbTx, SerialPin::UsbRx, DEFAULT_BAUD)
            .is_err()
        {
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Read until any byte of `delimiters` arrives, consuming the delimiter.
    ///
    /// Returns the collected text without the delimiter, or `None` once the
    /// port yields no data at all.
    pub fn read_until(&mut self, delimiters: &str) -> Option<String> {
        let mut line = Vec::new();
        loop {
            match self.uart.read_byte() {
                Some(byte) if delimiters.as_bytes().contains(&byte) => {
                    break;
                }
                Some(byte) => line.push(byte),
                None if line.is_empty() => return None,
                None => break,
            }
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        debug!("serial read: {line:?}");
        Some(line)
    }

    pub fn write_str(&mut self, text: &str) {
        self.uart.write(text.as_bytes());
    }

    pub fn write_line(&mut self, text: &str) {
        self.uart.write(text.as_bytes());
        self.uart.write(b"\r\n");
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }
}
