use thiserror::Error;

/// The primary error type for the `esp8266-rs` library.
#[derive(Error, Debug)]
pub enum EspError {
    #[error("BLE stack not enabled, encryption unavailable")]
    PlatformUnavailable,

    #[error("ECB peripheral failed at block {block}")]
    BlockEncrypt { block: usize },

    #[error("serial port is in use")]
    PortInUse,

    #[error("serial port closed before a response arrived")]
    PortClosed,

    #[error("modem error: {0}")]
    Modem(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Failure reported by the hardware ECB block-encrypt primitive.
///
/// The peripheral has exactly one failure mode; it is not classified further.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("ECB block encrypt rejected by the peripheral")]
pub struct EcbFault;
