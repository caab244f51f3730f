//! ESP8266 wifi module driver.
//!
//! Drives the module through its AT command set: joining and leaving a
//! network and pushing a single TCP or UDP message per connection.

use std::thread;
use std::time::Duration;

use tracing::info;

use crate::constants::MAX_RX_BUFFER_SIZE;
use crate::error::EspError;
use crate::modem::Modem;
use crate::serial::{BaudRate, SerialPin, Uart};

/// Settle time after resetting the module.
const RESET_PAUSE: Duration = Duration::from_millis(1500);

/// Transport used for [`Esp8266::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

pub struct Esp8266<U> {
    modem: Modem<U>,
}

impl<U: Uart> Esp8266<U> {
    /// Attach to the module on the given pins and baud rate.
    ///
    /// Call [`init`](Self::init) afterwards to bring the module into a known
    /// state.
    pub fn new(uart: U, tx: SerialPin, rx: SerialPin, baud: BaudRate) -> Self {
        Self {
            modem: Modem::new(uart, tx, rx, baud),
        }
    }

    /// Reset the module and fix the UART at 115200 8N1.
    pub fn init(&mut self) {
        // allocate as much receive buffer as possible, or we will lose data
        self.modem
            .port_mut()
            .set_receive_buffer_size(MAX_RX_BUFFER_SIZE);
        self.modem.push_at("+UART=115200,8,1,0,0");
        self.modem.push_at("+RST");
        thread::sleep(RESET_PAUSE);
    }

    /// Join the wifi network.
    pub fn attach(&mut self, ssid: &str, password: &str) -> Result<(), EspError> {
        if !self.modem.expect_ok("+CWMODE=1") {
            return Err(EspError::Modem("station mode not accepted".into()));
        }
        self.modem
            .push_at(&format!("+CWJAP=\"{ssid}\",\"{password}\""));
        let lines = self.modem.receive_response(|line| {
            line == "OK" || line == "ERROR" || line.starts_with("+CWJAP:")
        });
        match lines.last().map(String::as_str) {
            Some("OK") => {
                info!("joined wifi network {ssid}");
                Ok(())
            }
            Some(other) => Err(EspError::UnexpectedResponse(other.into())),
            None => Err(EspError::PortClosed),
        }
    }

    /// Leave the wifi network.
    pub fn detach(&mut self) -> Result<(), EspError> {
        self.command("+CWQAP")
    }

    pub fn send_tcp(&mut self, address: &str, port: u16, message: &[u8]) -> Result<(), EspError> {
        self.send(Protocol::Tcp, address, port, message)
    }

    pub fn send_udp(&mut self, address: &str, port: u16, message: &[u8]) -> Result<(), EspError> {
        self.send(Protocol::Udp, address, port, message)
    }

    /// Open a connection, push one message and close the connection again.
    pub fn send(
        &mut self,
        protocol: Protocol,
        address: &str,
        port: u16,
        message: &[u8],
    ) -> Result<(), EspError> {
        self.command("+CIPMODE=0")?;
        self.command(&format!(
            "+CIPSTART=\"{}\",\"{address}\",{port}",
            protocol.as_str()
        ))?;

        self.modem.push_at(&format!("+CIPSEND={}", message.len()));
        // the module answers the length announcement with a `>` prompt
        self.modem
            .port_mut()
            .read_until(">")
            .ok_or(EspError::PortClosed)?;
        self.modem.port_mut().uart_mut().write(message);

        let lines = self.modem.receive_response(|line| line == "SEND OK");
        if lines.last().map(String::as_str) != Some("SEND OK") {
            return Err(EspError::Modem("module did not confirm send".into()));
        }

        self.command("+CIPCLOSE")?;
        info!("sent {} bytes over {}", message.len(), protocol.as_str());
        Ok(())
    }

    pub fn modem_mut(&mut self) -> &mut Modem<U> {
        &mut self.modem
    }

    fn command(&mut self, command: &str) -> Result<(), EspError> {
        if self.modem.expect_ok(command) {
            Ok(())
        } else {
            Err(EspError::Modem(format!("AT{command} failed")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::tests::FakeUart;

    fn esp8266(input: &str) -> Esp8266<FakeUart> {
        Esp8266::new(
            FakeUart::with_input(input),
            SerialPin::C17,
            SerialPin::C16,
            BaudRate::Baud115200,
        )
    }

    #[test]
    fn test_attach_joins_network() {
        let mut esp = esp8266("OK\r\nWIFI CONNECTED\r\nWIFI GOT IP\r\nOK\r\n");
        esp.attach("TEST", "TEST1234").unwrap();
        let sent = esp.modem.port_mut().uart_mut().output_str();
        assert!(sent.contains("AT+CWMODE=1\r\n"));
        assert!(sent.contains("AT+CWJAP=\"TEST\",\"TEST1234\"\r\n"));
    }

    #[test]
    fn test_attach_reports_join_failure() {
        let mut esp = esp8266("OK\r\n+CWJAP:1\r\n");
        match esp.attach("TEST", "wrong") {
            Err(EspError::UnexpectedResponse(line)) => assert_eq!(line, "+CWJAP:1"),
            other => panic!("expected join failure, got {other:?}"),
        }
    }

    #[test]
    fn test_attach_requires_station_mode() {
        let mut esp = esp8266("ERROR\r\n");
        assert!(matches!(
            esp.attach("TEST", "TEST1234"),
            Err(EspError::Modem(_))
        ));
        // the join command was never sent
        assert!(
            !esp.modem
                .port_mut()
                .uart_mut()
                .output_str()
                .contains("+CWJAP")
        );
    }

    #[test]
    fn test_send_waits_for_prompt_before_payload() {
        let mut esp = esp8266("OK\r\nOK\r\n>SEND OK\r\nOK\r\n");
        esp.send_udp("46.23.86.61", 9090, b"{\"light\":50}").unwrap();

        let sent = esp.modem.port_mut().uart_mut().output_str();
        assert!(sent.contains("AT+CIPMODE=0\r\n"));
        assert!(sent.contains("AT+CIPSTART=\"UDP\",\"46.23.86.61\",9090\r\n"));
        assert!(sent.contains("AT+CIPSEND=12\r\n"));
        assert!(sent.contains("{\"light\":50}"));
        assert!(sent.contains("AT+CIPCLOSE\r\n"));

        // payload goes out after the length announcement
        let announce = sent.find("AT+CIPSEND=12").unwrap();
        let payload = sent.find("{\"light\":50}").unwrap();
        assert!(announce < payload);
    }

    #[test]
    fn test_send_tcp_uses_tcp_connection() {
        let mut esp = esp8266("OK\r\nOK\r\n>SEND OK\r\nOK\r\n");
        esp.send_tcp("example.org", 80, b"ping").unwrap();
        let sent = esp.modem.port_mut().uart_mut().output_str();
        assert!(sent.contains("AT+CIPSTART=\"TCP\",\"example.org\",80\r\n"));
    }

    #[test]
    fn test_send_fails_without_confirmation() {
        let mut esp = esp8266("OK\r\nOK\r\n>ERROR\r\n");
        assert!(matches!(
            esp.send_udp("46.23.86.61", 9090, b"x"),
            Err(EspError::Modem(_))
        ));
    }

    #[test]
    fn test_detach_leaves_network() {
        let mut esp = esp8266("OK\r\n");
        esp.detach().unwrap();
        assert!(
            esp.modem
                .port_mut()
                .uart_mut()
                .output_str()
                .contains("AT+CWQAP\r\n")
        );
    }
}
