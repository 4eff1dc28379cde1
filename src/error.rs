//! Driver errors.

use core::fmt;

/// The wait that ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the AES state register to report done.
    Accelerator,
    /// Waiting for the DMA engine to hand the inbound descriptor back.
    DmaInbound,
}

/// Faults reported by the DMA engine or found in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaFault {
    /// The inbound descriptor came back with `err_eof` set.
    ErrorEndOfFrame,
    /// The engine flagged an inbound or outbound descriptor error.
    Descriptor,
    FifoOverflow,
    FifoUnderflow,
    /// Bytes were still sitting in the inbound FIFO after the frame ended.
    FifoNotDrained { count: u8 },
    /// Plaintext bytes never left the outbound FIFO.
    OutfifoNotDrained { count: u8 },
    /// The inbound frame ended before the expected number of bytes arrived.
    ShortFrame { received: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested length does not fit the 12-bit descriptor fields or the
    /// buffers handed in.
    InvalidLength,
    HardwareTimeout(Stage),
    DmaFault(DmaFault),
}

impl From<DmaFault> for Error {
    fn from(fault: DmaFault) -> Self {
        Error::DmaFault(fault)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Accelerator => f.write_str("AES accelerator"),
            Stage::DmaInbound => f.write_str("inbound DMA descriptor"),
        }
    }
}

impl fmt::Display for DmaFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmaFault::ErrorEndOfFrame => f.write_str("error end of frame"),
            DmaFault::Descriptor => f.write_str("descriptor error"),
            DmaFault::FifoOverflow => f.write_str("FIFO overflow"),
            DmaFault::FifoUnderflow => f.write_str("FIFO underflow"),
            DmaFault::FifoNotDrained { count } => {
                write!(f, "{} bytes left in the inbound FIFO", count)
            }
            DmaFault::OutfifoNotDrained { count } => {
                write!(f, "{} bytes left in the outbound FIFO", count)
            }
            DmaFault::ShortFrame { received } => {
                write!(f, "inbound frame ended after {} bytes", received)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidLength => f.write_str("length does not fit a DMA descriptor"),
            Error::HardwareTimeout(stage) => write!(f, "timed out waiting for the {}", stage),
            Error::DmaFault(fault) => write!(f, "DMA fault: {}", fault),
        }
    }
}
