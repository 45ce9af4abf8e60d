pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Byte-oriented transport to a device addressed by 16-bit registers.
///
/// A `write` sends the register address followed by the payload bytes in one
/// bus transaction; a `read` addresses the register and then reads
/// `buf.len()` bytes, the device auto-incrementing the register address for
/// every byte after the first. Implementations must not cache: several
/// registers (status, results) are mutated by the device itself between
/// calls.
///
/// Transport failures (NACK, bus timeout) cross this boundary as boxed
/// errors; `ranger_core` maps them into its typed taxonomy.
pub trait RegisterBus {
    fn write(
        &mut self,
        reg: u16,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn read(
        &mut self,
        reg: u16,
        buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
