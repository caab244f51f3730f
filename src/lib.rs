pub mod constants;
pub mod crypto;
pub mod device;
pub mod error;
pub mod modem;
pub mod serial;
pub mod wifi;

#[cfg(test)]
mod tests;

// Re-export the main entry points for easy access
pub use crypto::DeviceCrypto;
pub use error::EspError;
pub use wifi::Esp8266;
