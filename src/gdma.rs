//! General DMA controller (GDMA).
//!
//! Only single-descriptor transfers between memory and a peripheral are
//! driven from here: one inbound (peripheral to memory) and one outbound
//! (memory to peripheral) descriptor per channel.

use {
    crate::{
        csr::{Csr, Field, Register, RegisterBus},
        error::DmaFault,
    },
    bitflags::bitflags,
};

pub const HW_GDMA_BASE: u32 = 0x6003_F000;

/// Distance between the configuration blocks of two channels.
const CHANNEL_STRIDE: u32 = 0xC0;
/// Distance between the interrupt blocks of two channels.
const INT_STRIDE: u32 = 0x10;

// Interrupt block, relative to `INT_STRIDE * n`.
const INT_RAW: Register = Register::new(0x00);
const INT_CLR: Register = Register::new(0x0C);

// Channel block, relative to `CHANNEL_STRIDE * n`.
const IN_CONF0: Register = Register::new(0x70);
const IN_RST: Field = Field::new(1, 0, IN_CONF0);
const INFIFO_STATUS: Register = Register::new(0x78);
const IN_LINK: Register = Register::new(0x80);
const INLINK_ADDR: Field = Field::new(20, 0, IN_LINK);
const INLINK_START: Field = Field::new(1, 22, IN_LINK);
const IN_STATE: Register = Register::new(0x84);
const IN_SUC_EOF_DES_ADDR: Register = Register::new(0x88);
const IN_PERI_SEL: Register = Register::new(0xA0);

const OUT_CONF0: Register = Register::new(0xD0);
const OUT_RST: Field = Field::new(1, 0, OUT_CONF0);
const OUTFIFO_STATUS: Register = Register::new(0xD8);
const OUT_LINK: Register = Register::new(0xE0);
const OUTLINK_ADDR: Field = Field::new(20, 0, OUT_LINK);
const OUTLINK_START: Field = Field::new(1, 21, OUT_LINK);
const OUT_STATE: Register = Register::new(0xE4);
const OUT_EOF_DES_ADDR: Register = Register::new(0xE8);
const OUT_PERI_SEL: Register = Register::new(0x100);

const FIFO_FULL: u32 = 1 << 0;
const FIFO_EMPTY: u32 = 1 << 1;
const FIFO_CNT_SHIFT: u32 = 2;
const FIFO_CNT_MASK: u32 = 0x3F;

/// Link address registers only hold the low 20 bits of a descriptor address.
pub const LINK_ADDR_MASK: u32 = 0xF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaChannel {
    Channel0 = 0,
    Channel1 = 1,
    Channel2 = 2,
}

impl DmaChannel {
    fn conf_offset(self) -> u32 {
        self as u32 * CHANNEL_STRIDE
    }

    fn int_offset(self) -> u32 {
        self as u32 * INT_STRIDE
    }
}

/// Peripheral a channel is connected to, as written to `PERI_SEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaPeripheral {
    Spi2 = 0,
    Uhci0 = 2,
    I2s = 3,
    Aes = 6,
    Sha = 7,
    Adc = 8,
}

bitflags! {
    /// Raw interrupt status of a channel. Interrupts stay disabled; the raw
    /// bits are still latched and are what fault detection looks at.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DmaInterrupts: u32 {
        const IN_DONE        = 1 << 0;
        const IN_SUC_EOF     = 1 << 1;
        const IN_ERR_EOF     = 1 << 2;
        const OUT_DONE       = 1 << 3;
        const OUT_EOF        = 1 << 4;
        const IN_DSCR_ERR    = 1 << 5;
        const OUT_DSCR_ERR   = 1 << 6;
        const IN_DSCR_EMPTY  = 1 << 7;
        const OUT_TOTAL_EOF  = 1 << 8;
        const INFIFO_OVF     = 1 << 9;
        const INFIFO_UDF     = 1 << 10;
        const OUTFIFO_OVF    = 1 << 11;
        const OUTFIFO_UDF    = 1 << 12;
    }
}

impl DmaInterrupts {
    /// The first fault latched in these bits, if any.
    pub fn fault(&self) -> Option<DmaFault> {
        if self.contains(Self::IN_ERR_EOF) {
            Some(DmaFault::ErrorEndOfFrame)
        } else if self.intersects(Self::IN_DSCR_ERR | Self::OUT_DSCR_ERR) {
            Some(DmaFault::Descriptor)
        } else if self.intersects(Self::INFIFO_OVF | Self::OUTFIFO_OVF) {
            Some(DmaFault::FifoOverflow)
        } else if self.intersects(Self::INFIFO_UDF | Self::OUTFIFO_UDF) {
            Some(DmaFault::FifoUnderflow)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoStatus {
    pub full: bool,
    pub empty: bool,
    /// Bytes currently held.
    pub count: u8,
}

impl FifoStatus {
    fn from_bits(bits: u32) -> Self {
        Self {
            full: bits & FIFO_FULL != 0,
            empty: bits & FIFO_EMPTY != 0,
            count: ((bits >> FIFO_CNT_SHIFT) & FIFO_CNT_MASK) as u8,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.empty && !self.full && self.count == 0
    }
}

/// Everything worth looking at when a transfer misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub interrupts: DmaInterrupts,
    pub infifo: FifoStatus,
    pub outfifo: FifoStatus,
    pub in_state: u32,
    pub out_state: u32,
    /// Address of the last inbound descriptor that completed a frame.
    pub in_suc_eof_desc: u32,
    /// Address of the last outbound descriptor that reached end of frame.
    pub out_eof_desc: u32,
}

pub struct Gdma {
    base_addr: u32,
}

impl Default for Gdma {
    fn default() -> Self {
        Gdma::new()
    }
}

impl Gdma {
    pub fn new() -> Self {
        Self {
            base_addr: HW_GDMA_BASE,
        }
    }

    /// Creates a GDMA instance with a different base address.
    pub fn with_alt_base_addr(base_addr: u32) -> Self {
        Self { base_addr }
    }

    fn channel_csr<'a, B: RegisterBus>(&self, bus: &'a mut B, channel: DmaChannel) -> Csr<'a, B> {
        Csr::new(bus, self.base_addr + channel.conf_offset())
    }

    fn int_csr<'a, B: RegisterBus>(&self, bus: &'a mut B, channel: DmaChannel) -> Csr<'a, B> {
        Csr::new(bus, self.base_addr + channel.int_offset())
    }

    /// Pulses the reset of both directions of `channel`, flushing the FIFOs and
    /// the link state machines.
    pub fn reset<B: RegisterBus>(&self, bus: &mut B, channel: DmaChannel) {
        let mut dma_csr = self.channel_csr(bus, channel);
        dma_csr.rmwf(IN_RST, 1);
        dma_csr.rmwf(OUT_RST, 1);
        dma_csr.rmwf(IN_RST, 0);
        dma_csr.rmwf(OUT_RST, 0);
    }

    pub fn interrupts_raw<B: RegisterBus>(&self, bus: &mut B, channel: DmaChannel) -> DmaInterrupts {
        let mut int_csr = self.int_csr(bus, channel);
        DmaInterrupts::from_bits_truncate(int_csr.r(INT_RAW))
    }

    pub fn clear_interrupts<B: RegisterBus>(
        &self,
        bus: &mut B,
        channel: DmaChannel,
        interrupts: DmaInterrupts,
    ) {
        let mut int_csr = self.int_csr(bus, channel);
        int_csr.wo(INT_CLR, interrupts.bits());
    }

    pub fn infifo_status<B: RegisterBus>(&self, bus: &mut B, channel: DmaChannel) -> FifoStatus {
        let mut dma_csr = self.channel_csr(bus, channel);
        FifoStatus::from_bits(dma_csr.r(INFIFO_STATUS))
    }

    pub fn outfifo_status<B: RegisterBus>(&self, bus: &mut B, channel: DmaChannel) -> FifoStatus {
        let mut dma_csr = self.channel_csr(bus, channel);
        FifoStatus::from_bits(dma_csr.r(OUTFIFO_STATUS))
    }

    pub fn status<B: RegisterBus>(&self, bus: &mut B, channel: DmaChannel) -> ChannelStatus {
        let interrupts = self.interrupts_raw(bus, channel);
        let mut dma_csr = self.channel_csr(bus, channel);
        ChannelStatus {
            interrupts,
            infifo: FifoStatus::from_bits(dma_csr.r(INFIFO_STATUS)),
            outfifo: FifoStatus::from_bits(dma_csr.r(OUTFIFO_STATUS)),
            in_state: dma_csr.r(IN_STATE),
            out_state: dma_csr.r(OUT_STATE),
            in_suc_eof_desc: dma_csr.r(IN_SUC_EOF_DES_ADDR),
            out_eof_desc: dma_csr.r(OUT_EOF_DES_ADDR),
        }
    }

    /// Connects `channel` to `peripheral` and starts moving data: `output` is
    /// read from memory and fed to the peripheral, `input` receives what the
    /// peripheral produces.
    ///
    /// `input` and `output` are DMA addresses of descriptors that are already
    /// owned by the DMA engine. Every step is its own register write and the
    /// order matters.
    pub fn start<B: RegisterBus>(
        &self,
        bus: &mut B,
        channel: DmaChannel,
        input: u32,
        output: u32,
        peripheral: DmaPeripheral,
    ) {
        // Start from clean FIFOs even if the last transfer was aborted.
        self.reset(bus, channel);

        // Forget faults latched by earlier transfers.
        self.clear_interrupts(bus, channel, DmaInterrupts::all());

        let mut dma_csr = self.channel_csr(bus, channel);

        // Load the inlink and outlink.
        dma_csr.rmwf(INLINK_ADDR, input & LINK_ADDR_MASK);
        dma_csr.rmwf(OUTLINK_ADDR, output & LINK_ADDR_MASK);

        // Select the peripheral on both directions.
        dma_csr.wo(IN_PERI_SEL, peripheral as u32);
        dma_csr.wo(OUT_PERI_SEL, peripheral as u32);

        // Hand the links to the engine.
        dma_csr.rmwf(INLINK_START, 1);
        dma_csr.rmwf(OUTLINK_START, 1);

        log::trace!(
            "{:?} started: inlink {:#07x}, outlink {:#07x}, {:?}",
            channel,
            input & LINK_ADDR_MASK,
            output & LINK_ADDR_MASK,
            peripheral
        );
    }
}
