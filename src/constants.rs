// Hardware and protocol constants for the ESP8266 module driver

/// Size of a cipher block (16 bytes, AES-128 ECB)
pub const BLOCK_SIZE: usize = 16;

/// Size of the cipher key (16 bytes, AES-128)
pub const KEY_SIZE: usize = 16;

/// Size of the hardware-unique device identifier (128 bits)
pub const DEVICE_ID_SIZE: usize = 16;

/// Number of 32-bit words in the device identifier register block
pub const DEVICE_ID_WORDS: usize = 4;

/// Largest receive buffer the serial hardware accepts without locking up
pub const MAX_RX_BUFFER_SIZE: usize = 254;

/// Receive buffer size used for AT command traffic
pub const MODEM_RX_BUFFER_SIZE: usize = 100;

/// Line delimiters for AT command responses
pub const AT_LINE_DELIMITERS: &str = "\r\n";
