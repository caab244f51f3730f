//! AT-command modem layer.
//!
//! Sends `AT` commands over the serial layer and collects response lines
//! until a terminating line arrives. Console logging temporarily redirects
//! the port to the USB console and back, so it is slow and only used when
//! debug is enabled.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::constants::{AT_LINE_DELIMITERS, MODEM_RX_BUFFER_SIZE};
use crate::serial::{BaudRate, SerialPin, SerialPort, Uart};

/// Settle time before each command round-trip.
const COMMAND_PAUSE: Duration = Duration::from_millis(100);

pub struct Modem<U> {
    port: SerialPort<U>,
    tx: SerialPin,
    rx: SerialPin,
    baud: BaudRate,
    debug: bool,
}

impl<U: Uart> Modem<U> {
    /// Attach to the modem on the given pins and baud rate.
    pub fn new(uart: U, tx: SerialPin, rx: SerialPin, baud: BaudRate) -> Self {
        let mut port = SerialPort::new(uart);
        let _ = port.redirect(tx, rx, baud);
        port.set_receive_buffer_size(MODEM_RX_BUFFER_SIZE);
        Self {
            port,
            tx,
            rx,
            baud,
            debug: false,
        }
    }

    /// Send an AT command without waiting for any response.
    ///
    /// Provide the bare command, not the `AT` prefix: `push_at("+RST")`.
    pub fn push_at(&mut self, command: &str) {
        if self.debug {
            self.log("+++", &format!("AT{command}"));
        }
        self.port.write_str(&format!("AT{command}\r\n"));
    }

    /// Send an AT command and collect lines until `OK` or `ERROR` arrives.
    pub fn send_at(&mut self, command: &str) -> Vec<String> {
        thread::sleep(COMMAND_PAUSE);
        if self.debug {
            self.log("+++", &format!("AT{command}"));
        }
        self.port.write_str(&format!("AT{command}\r\n"));
        self.receive_response(|line| line == "OK" || line == "ERROR")
    }

    /// Collect non-empty response lines until one satisfies `cond`.
    ///
    /// Stops early if the port yields no further data.
    pub fn receive_response(&mut self, cond: impl Fn(&str) -> bool) -> Vec<String> {
        let mut received = Vec::new();
        while let Some(line) = self.port.read_until(AT_LINE_DELIMITERS) {
            if line.is_empty() {
                continue;
            }
            let done = cond(&line);
            received.push(line);
            if done {
                break;
            }
        }
        if self.debug {
            self.log_array("---", &received);
        }
        received
    }

    /// Send an AT command and report whether it ended with `OK`.
    pub fn expect_ok(&mut self, command: &str) -> bool {
        let response = self.send_at(command);
        response.last().map(String::as_str) == Some("OK")
    }

    /// Follow the AT flow on the USB console. Slows every command down.
    pub fn enable_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Log a line to the USB console, then restore the modem port.
    pub fn log(&mut self, prefix: &str, message: &str) {
        debug!("{prefix} {message}");
        thread::sleep(COMMAND_PAUSE);
        self.port.reset();
        self.port.write_line(&format!("{prefix} {message}"));
        while self.port.busy() {
            thread::sleep(Duration::from_millis(10));
        }
        let _ = self.port.redirect(self.tx, self.rx, self.baud);
        thread::sleep(COMMAND_PAUSE);
    }

    /// Log a batch of lines to the USB console with their lengths.
    pub fn log_array(&mut self, prefix: &str, messages: &[String]) {
        thread::sleep(COMMAND_PAUSE);
        self.port.reset();
        for message in messages {
            debug!("{prefix} ({}) {message}", message.len());
            self.port
                .write_line(&format!("{prefix} ({}) {message}", message.len()));
        }
        while self.port.busy() {
            thread::sleep(Duration::from_millis(10));
        }
        let _ = self.port.redirect(self.tx, self.rx, self.baud);
        thread::sleep(COMMAND_PAUSE);
    }

    pub fn port_mut(&mut self) -> &mut SerialPort<U> {
        &mut self.port
    }
}
