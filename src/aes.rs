//! AES accelerator, driven in DMA mode.

use crate::csr::{Csr, Register, RegisterBus};

pub const HW_AES_BASE: u32 = 0x6003_A000;

pub const AES_BLOCK_SIZE: usize = 16;

const KEY_BASE: Register = Register::new(0x00);
const MODE: Register = Register::new(0x40);
const TRIGGER: Register = Register::new(0x48);
const STATE: Register = Register::new(0x4C);
const IV_BASE: Register = Register::new(0x50);
const DMA_ENABLE: Register = Register::new(0x90);
const BLOCK_MODE: Register = Register::new(0x94);
const BLOCK_NUM: Register = Register::new(0x98);
const INC_SEL: Register = Register::new(0x9C);
const INT_CLR: Register = Register::new(0xAC);
const INT_ENA: Register = Register::new(0xB0);
const DMA_EXIT: Register = Register::new(0xB8);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Key(pub [u8; 16]);

/// Initial counter block: a 96-bit nonce followed by a 32-bit big-endian
/// block counter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Iv(pub [u8; 16]);

impl Iv {
    pub fn from_nonce_counter(nonce: [u8; 12], counter: u32) -> Self {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&nonce);
        iv[12..].copy_from_slice(&counter.to_be_bytes());
        Self(iv)
    }

    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([self.0[12], self.0[13], self.0[14], self.0[15]])
    }

    /// The counter block `blocks` blocks further into the key stream. Only the
    /// low 32 bits count, wrapping like the accelerator's increment.
    pub fn advanced(&self, blocks: u32) -> Self {
        let mut iv = self.0;
        iv[12..].copy_from_slice(&self.counter().wrapping_add(blocks).to_be_bytes());
        Self(iv)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AesMode {
    Encrypt128 = 0,
}

/// Block cipher mode used in DMA mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockMode {
    Ctr = 3,
}

/// Counter increment applied between CTR blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IncrementFunction {
    /// Increment the low 32 bits, big-endian.
    Inc32 = 0,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AesState {
    Idle,
    Busy,
    Done,
    /// A value the datasheet does not define.
    Unknown(u32),
}

impl From<u32> for AesState {
    fn from(value: u32) -> Self {
        match value {
            0 => AesState::Idle,
            1 => AesState::Busy,
            2 => AesState::Done,
            other => AesState::Unknown(other),
        }
    }
}

/// Splits 16 bytes into the four words written to the key and IV registers.
/// The accelerator expects each word in memory byte order.
fn words(bytes: &[u8; 16]) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

pub struct Aes {
    base_addr: u32,
}

impl Default for Aes {
    fn default() -> Self {
        Aes::new()
    }
}

impl Aes {
    pub fn new() -> Self {
        Self {
            base_addr: HW_AES_BASE,
        }
    }

    /// Creates an AES instance with a different base address.
    pub fn with_alt_base_addr(base_addr: u32) -> Self {
        Self { base_addr }
    }

    /// Feed the accelerator from the DMA engine instead of the text
    /// registers.
    pub fn set_dma_enabled<B: RegisterBus>(&self, bus: &mut B, enabled: bool) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(DMA_ENABLE, enabled as u32);
    }

    pub fn set_interrupt<B: RegisterBus>(&self, bus: &mut B, enabled: bool) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(INT_ENA, enabled as u32);
    }

    pub fn clear_interrupt<B: RegisterBus>(&self, bus: &mut B) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(INT_CLR, 1);
    }

    pub fn set_mode<B: RegisterBus>(&self, bus: &mut B, mode: AesMode) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(MODE, mode as u32);
    }

    pub fn write_key<B: RegisterBus>(&self, bus: &mut B, key: &Key) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo_words(KEY_BASE, &words(&key.0));
    }

    pub fn set_block_mode<B: RegisterBus>(&self, bus: &mut B, mode: BlockMode) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(BLOCK_MODE, mode as u32);
    }

    /// Number of 16-byte blocks the next DMA operation processes.
    pub fn set_block_count<B: RegisterBus>(&self, bus: &mut B, blocks: u32) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(BLOCK_NUM, blocks);
    }

    pub fn set_increment<B: RegisterBus>(&self, bus: &mut B, inc: IncrementFunction) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(INC_SEL, inc as u32);
    }

    pub fn write_iv<B: RegisterBus>(&self, bus: &mut B, iv: &Iv) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo_words(IV_BASE, &words(&iv.0));
    }

    pub fn trigger<B: RegisterBus>(&self, bus: &mut B) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(TRIGGER, 1);
    }

    pub fn state<B: RegisterBus>(&self, bus: &mut B) -> AesState {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        AesState::from(aes_csr.r(STATE))
    }

    /// Leaves DMA mode after an operation so the next one can be configured.
    pub fn exit_dma<B: RegisterBus>(&self, bus: &mut B) {
        let mut aes_csr = Csr::new(bus, self.base_addr);
        aes_csr.wo(DMA_EXIT, 0);
    }

    /// Programs an AES-128 CTR encryption of `blocks` blocks without starting
    /// it.
    pub fn configure<B: RegisterBus>(&self, bus: &mut B, key: &Key, iv: &Iv, blocks: u32) {
        self.set_dma_enabled(bus, true);
        // Completion is polled.
        self.set_interrupt(bus, false);
        self.set_mode(bus, AesMode::Encrypt128);
        self.write_key(bus, key);
        self.set_block_mode(bus, BlockMode::Ctr);
        self.set_block_count(bus, blocks);
        self.set_increment(bus, IncrementFunction::Inc32);
        self.write_iv(bus, iv);
    }

    /// Programs an AES-128 CTR encryption of `blocks` blocks and starts it.
    /// Data flows through whatever GDMA channel is connected to the
    /// accelerator, so that channel must already be running.
    pub fn configure_and_trigger<B: RegisterBus>(
        &self,
        bus: &mut B,
        key: &Key,
        iv: &Iv,
        blocks: u32,
    ) {
        self.configure(bus, key, iv, blocks);
        self.trigger(bus);
    }
}
