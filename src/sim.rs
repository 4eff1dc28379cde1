//! Register file that behaves like the SYSTEM, GDMA and AES blocks closely
//! enough to run the driver on the host.
//!
//! Registers are plain storage except for a few with side effects: writing
//! the AES trigger starts an operation, reading the AES state advances it,
//! writing GDMA `INT_CLR` clears raw interrupt bits and writing AES
//! `DMA_EXIT` returns the accelerator to idle. An operation only completes if
//! the accelerator and one GDMA channel are configured the way the hardware
//! needs; otherwise the accelerator stays busy forever.

use {
    crate::{aes::HW_AES_BASE, gdma::HW_GDMA_BASE, lldesc::Owner},
    ::aes::{
        cipher::{BlockEncrypt, KeyInit},
        Aes128,
        Block,
    },
    std::{collections::HashMap, vec::Vec},
};

const AES_KEY: u32 = HW_AES_BASE;
const AES_TRIGGER: u32 = HW_AES_BASE + 0x48;
const AES_STATE: u32 = HW_AES_BASE + 0x4C;
const AES_IV: u32 = HW_AES_BASE + 0x50;
const AES_MODE: u32 = HW_AES_BASE + 0x40;
const AES_DMA_ENABLE: u32 = HW_AES_BASE + 0x90;
const AES_BLOCK_MODE: u32 = HW_AES_BASE + 0x94;
const AES_BLOCK_NUM: u32 = HW_AES_BASE + 0x98;
const AES_INC_SEL: u32 = HW_AES_BASE + 0x9C;
const AES_DMA_EXIT: u32 = HW_AES_BASE + 0xB8;

const STATE_IDLE: u32 = 0;
const STATE_BUSY: u32 = 1;
const STATE_DONE: u32 = 2;

const GDMA_CHANNELS: u32 = 3;
const PERI_SEL_AES: u32 = 6;

const INT_IN_DONE: u32 = 1 << 0;
const INT_IN_SUC_EOF: u32 = 1 << 1;
const INT_IN_ERR_EOF: u32 = 1 << 2;
const INT_IN_DSCR_ERR: u32 = 1 << 5;
const INT_OUT_DONE: u32 = 1 << 3;
const INT_OUT_EOF: u32 = 1 << 4;
const INT_OUT_TOTAL_EOF: u32 = 1 << 8;
const INT_INFIFO_OVF: u32 = 1 << 9;

const FIFO_EMPTY: u32 = 1 << 1;

/// Where handed-out DMA addresses start. Only the low 20 bits survive the
/// link registers, so they have to be unique on their own.
const SRAM_BASE: u32 = 0x3FC8_0000;
const REGION_STRIDE: u32 = 0x100;

fn gdma_int_raw(ch: u32) -> u32 {
    HW_GDMA_BASE + 0x10 * ch
}

fn gdma_int_clr(ch: u32) -> u32 {
    HW_GDMA_BASE + 0x10 * ch + 0x0C
}

fn gdma_reg(ch: u32, offset: u32) -> u32 {
    HW_GDMA_BASE + 0xC0 * ch + offset
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Faults {
    /// The accelerator never leaves the busy state.
    pub stall_aes: bool,
    /// The accelerator finishes but the inbound descriptor is never returned.
    pub stall_dma: bool,
    /// The inbound descriptor gets `suc_eof` but stays owned by the engine.
    pub suc_eof_owner_dma: bool,
    /// The inbound descriptor is handed back without any end of frame.
    pub owner_cpu_no_eof: bool,
    /// The engine flags a descriptor error as soon as the accelerator starts.
    pub descriptor_error: bool,
    /// The inbound frame ends with `err_eof`.
    pub err_eof: bool,
    /// The inbound FIFO overflows during the transfer.
    pub fifo_overflow: bool,
    /// Bytes left in the inbound FIFO after the frame.
    pub leftover_fifo: u8,
    /// Bytes left in the outbound FIFO after the frame.
    pub leftover_outfifo: u8,
    /// The last block never reaches memory.
    pub short_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Inbound,
    Outbound,
}

/// A descriptor as the engine read it when the accelerator was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeenDescriptor {
    pub size: usize,
    pub length: usize,
    pub suc_eof: bool,
    pub owner: Owner,
    pub next: u32,
}

impl SeenDescriptor {
    fn decode(words: [u32; 3]) -> Self {
        Self {
            size: (words[0] & 0xFFF) as usize,
            length: ((words[0] >> 12) & 0xFFF) as usize,
            suc_eof: words[0] & (1 << 30) != 0,
            owner: if words[0] & (1 << 31) != 0 {
                Owner::Dma
            } else {
                Owner::Cpu
            },
            next: words[2],
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SimBus {
    regs: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    regions: Vec<usize>,
    /// Channel carrying the running operation.
    running: Option<u32>,
    busy_left: u32,
    transfers: u32,
    seen: [Option<SeenDescriptor>; 2],
    /// State reads answered with "busy" before an operation completes.
    pub busy_reads: u32,
    pub faults: Faults,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a register without side effects.
    pub fn peek(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    /// Sets a register without side effects or logging.
    pub fn poke(&mut self, addr: u32, value: u32) {
        self.regs.insert(addr, value);
    }

    /// Every write made through the bus, in order.
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    /// Number of operations that ran to completion.
    pub fn transfers(&self) -> u32 {
        self.transfers
    }

    pub fn descriptor_seen(&self, direction: Direction) -> Option<SeenDescriptor> {
        self.seen[direction as usize]
    }

    fn resolve(&self, addr: u32) -> Option<*mut u8> {
        let offset = (addr & 0xF_FFFF).checked_sub(SRAM_BASE & 0xF_FFFF)?;
        let index = (offset / REGION_STRIDE).checked_sub(1)?;
        self.regions.get(index as usize).map(|p| *p as *mut u8)
    }

    fn read_descriptor(&self, addr: u32) -> Option<(*mut u32, [u32; 3])> {
        let ptr = self.resolve(addr)? as *mut u32;
        let words = unsafe {
            [
                ptr.read_volatile(),
                ptr.add(1).read_volatile(),
                ptr.add(2).read_volatile(),
            ]
        };
        Some((ptr, words))
    }

    fn words(&self, base: u32) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&self.peek(base + 4 * i as u32).to_le_bytes());
        }
        bytes
    }

    /// The channel the accelerator can stream through, if any.
    fn connected_channel(&self) -> Option<u32> {
        (0..GDMA_CHANNELS).find(|&ch| {
            self.peek(gdma_reg(ch, 0xA0)) == PERI_SEL_AES
                && self.peek(gdma_reg(ch, 0x100)) == PERI_SEL_AES
                && self.peek(gdma_reg(ch, 0x70)) & 1 == 0
                && self.peek(gdma_reg(ch, 0xD0)) & 1 == 0
                && self.peek(gdma_reg(ch, 0x80)) & (1 << 22) != 0
                && self.peek(gdma_reg(ch, 0xE0)) & (1 << 21) != 0
        })
    }

    fn trigger(&mut self) {
        self.regs.insert(AES_STATE, STATE_BUSY);
        self.busy_left = self.busy_reads;

        let configured = self.peek(AES_DMA_ENABLE) == 1
            && self.peek(AES_MODE) == 0
            && self.peek(AES_BLOCK_MODE) == 3
            && self.peek(AES_INC_SEL) == 0;
        self.running = self.connected_channel().filter(|_| configured);

        if let Some(ch) = self.running {
            if self.faults.descriptor_error {
                let raw = self.peek(gdma_int_raw(ch));
                self.regs.insert(gdma_int_raw(ch), raw | INT_IN_DSCR_ERR);
            }
            let inlink = self.read_descriptor(self.peek(gdma_reg(ch, 0x80)));
            let outlink = self.read_descriptor(self.peek(gdma_reg(ch, 0xE0)));
            self.seen = [
                inlink.map(|(_, w)| SeenDescriptor::decode(w)),
                outlink.map(|(_, w)| SeenDescriptor::decode(w)),
            ];
        }
    }

    fn complete(&mut self, ch: u32) {
        let (Some((in_desc, in_words)), Some((out_desc, out_words))) = (
            self.read_descriptor(self.peek(gdma_reg(ch, 0x80))),
            self.read_descriptor(self.peek(gdma_reg(ch, 0xE0))),
        ) else {
            return;
        };
        let (Some(src), Some(dst)) = (self.resolve(out_words[1]), self.resolve(in_words[1])) else {
            return;
        };

        let available = ((out_words[0] >> 12) & 0xFFF) as usize;
        let capacity = (in_words[0] & 0xFFF) as usize;
        let mut len = (self.peek(AES_BLOCK_NUM) as usize * 16)
            .min(available)
            .min(capacity);
        if self.faults.short_frame {
            len = len.saturating_sub(16);
        }

        let cipher = Aes128::new(&self.words(AES_KEY).into());
        let iv = self.words(AES_IV);
        let counter = u32::from_be_bytes([iv[12], iv[13], iv[14], iv[15]]);
        let src = unsafe { core::slice::from_raw_parts(src as *const u8, len) };
        let mut out = Vec::with_capacity(len);
        for (i, chunk) in src.chunks(16).enumerate() {
            let mut block = Block::from(iv);
            block[12..].copy_from_slice(&counter.wrapping_add(i as u32).to_be_bytes());
            cipher.encrypt_block(&mut block);
            out.extend(chunk.iter().zip(block.iter()).map(|(p, k)| p ^ k));
        }
        unsafe { core::ptr::copy_nonoverlapping(out.as_ptr(), dst, len) };

        // The outbound side always drains.
        unsafe { out_desc.write_volatile(out_words[0] & !(1 << 31)) };
        let mut raw = self.peek(gdma_int_raw(ch)) | INT_OUT_DONE | INT_OUT_EOF | INT_OUT_TOTAL_EOF;

        if self.faults.fifo_overflow {
            raw |= INT_INFIFO_OVF;
        }
        if self.faults.leftover_fifo > 0 {
            self.regs
                .insert(gdma_reg(ch, 0x78), (self.faults.leftover_fifo as u32) << 2);
        } else {
            self.regs.insert(gdma_reg(ch, 0x78), FIFO_EMPTY);
        }
        if self.faults.leftover_outfifo > 0 {
            self.regs.insert(
                gdma_reg(ch, 0xD8),
                (self.faults.leftover_outfifo as u32) << 2,
            );
        } else {
            self.regs.insert(gdma_reg(ch, 0xD8), FIFO_EMPTY);
        }

        let received = (in_words[0] & 0xFFF) | ((len as u32) << 12);
        if self.faults.err_eof {
            unsafe { in_desc.write_volatile(received | (1 << 28)) };
            raw |= INT_IN_ERR_EOF;
        } else if self.faults.suc_eof_owner_dma {
            unsafe { in_desc.write_volatile(received | (1 << 30) | (1 << 31)) };
        } else if self.faults.owner_cpu_no_eof {
            unsafe { in_desc.write_volatile(received) };
        } else if !self.faults.stall_dma {
            unsafe { in_desc.write_volatile(received | (1 << 30)) };
            raw |= INT_IN_DONE | INT_IN_SUC_EOF;
        }
        self.regs.insert(gdma_int_raw(ch), raw);

        self.regs.insert(AES_STATE, STATE_DONE);
        self.running = None;
        self.transfers += 1;
    }

    fn read_state(&mut self) -> u32 {
        if self.peek(AES_STATE) == STATE_BUSY && !self.faults.stall_aes {
            if let Some(ch) = self.running {
                if self.busy_left == 0 {
                    self.complete(ch);
                } else {
                    self.busy_left -= 1;
                }
            }
        }
        self.peek(AES_STATE)
    }
}

impl crate::csr::RegisterBus for SimBus {
    fn read(&mut self, addr: u32) -> u32 {
        if addr == AES_STATE {
            self.read_state()
        } else {
            self.peek(addr)
        }
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.writes.push((addr, value));

        if addr == AES_TRIGGER {
            if value & 1 != 0 {
                self.trigger();
            }
        } else if addr == AES_DMA_EXIT {
            self.running = None;
            self.regs.insert(AES_STATE, STATE_IDLE);
        } else if let Some(ch) = (0..GDMA_CHANNELS).find(|&ch| addr == gdma_int_clr(ch)) {
            let raw = self.peek(gdma_int_raw(ch));
            self.regs.insert(gdma_int_raw(ch), raw & !value);
        } else {
            self.regs.insert(addr, value);
        }
    }

    fn dma_addr(&mut self, ptr: *const u8) -> u32 {
        let index = match self.regions.iter().position(|p| *p == ptr as usize) {
            Some(index) => index,
            None => {
                self.regions.push(ptr as usize);
                self.regions.len() - 1
            }
        };
        SRAM_BASE + (index as u32 + 1) * REGION_STRIDE
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::csr::RegisterBus};

    #[test]
    fn dma_addresses_survive_the_link_mask() {
        let mut bus = SimBus::new();
        let a = [0u8; 4];
        let b = [0u8; 4];
        let addr_a = bus.dma_addr(a.as_ptr());
        let addr_b = bus.dma_addr(b.as_ptr());
        assert_ne!(addr_a & 0xF_FFFF, addr_b & 0xF_FFFF);
        assert_eq!(bus.dma_addr(a.as_ptr()), addr_a);
        assert_eq!(bus.resolve(addr_a & 0xF_FFFF), Some(a.as_ptr() as *mut u8));
        assert_eq!(bus.resolve(0), None);
    }

    #[test]
    fn unconfigured_trigger_stays_busy() {
        let mut bus = SimBus::new();
        bus.write(AES_TRIGGER, 1);
        for _ in 0..10 {
            assert_eq!(bus.read(AES_STATE), STATE_BUSY);
        }
        bus.write(AES_DMA_EXIT, 0);
        assert_eq!(bus.read(AES_STATE), STATE_IDLE);
        assert_eq!(bus.transfers(), 0);
    }

    #[test]
    fn int_clr_clears_raw_bits() {
        let mut bus = SimBus::new();
        bus.poke(gdma_int_raw(1), 0b1111);
        bus.write(gdma_int_clr(1), 0b0101);
        assert_eq!(bus.peek(gdma_int_raw(1)), 0b1010);
        assert_eq!(bus.peek(gdma_int_clr(1)), 0);
    }
}
