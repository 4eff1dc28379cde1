//! Register access.
//!
//! Every peripheral driver in this crate talks to the hardware through a
//! [`RegisterBus`]. On the chip that is [`Mmio`]; tests plug in a simulated
//! register file instead.

/// A register at a fixed byte offset from a peripheral base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    offset: u32,
}

impl Register {
    pub const fn new(offset: u32) -> Self {
        Self { offset }
    }

    pub const fn offset(&self) -> u32 {
        self.offset
    }
}

/// A bit field inside a [`Register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    mask: u32,
    shift: u32,
    register: Register,
}

impl Field {
    pub const fn new(width: u32, shift: u32, register: Register) -> Self {
        assert!(width > 0 && width + shift <= 32);
        let mask = if width == 32 { u32::MAX } else { (1 << width) - 1 };
        Self {
            mask,
            shift,
            register,
        }
    }

    pub const fn mask(&self) -> u32 {
        self.mask
    }

    pub const fn shift(&self) -> u32 {
        self.shift
    }

    pub const fn register(&self) -> Register {
        self.register
    }
}

/// Word-sized access to memory-mapped registers.
pub trait RegisterBus {
    fn read(&mut self, addr: u32) -> u32;

    fn write(&mut self, addr: u32, value: u32);

    /// Translates a CPU pointer into the address the DMA engine uses to reach
    /// the same memory.
    fn dma_addr(&mut self, ptr: *const u8) -> u32;
}

/// Volatile access to the physical register space of the chip.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only one `Mmio` may drive a given set of peripherals at a time, and the
    /// addresses it is used with must be valid device registers.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    fn read(&mut self, addr: u32) -> u32 {
        unsafe { (addr as usize as *const u32).read_volatile() }
    }

    fn write(&mut self, addr: u32, value: u32) {
        unsafe { (addr as usize as *mut u32).write_volatile(value) }
    }

    fn dma_addr(&mut self, ptr: *const u8) -> u32 {
        // The C3 has no MMU in front of internal SRAM, so the DMA view is the
        // CPU view.
        ptr as usize as u32
    }
}

/// A peripheral's register block as seen through a bus.
pub struct Csr<'a, B: RegisterBus> {
    bus: &'a mut B,
    base: u32,
}

impl<'a, B: RegisterBus> Csr<'a, B> {
    pub fn new(bus: &'a mut B, base: u32) -> Self {
        Self { bus, base }
    }

    /// Reads a whole register.
    pub fn r(&mut self, reg: Register) -> u32 {
        self.bus.read(self.base + reg.offset())
    }

    /// Writes a whole register.
    pub fn wo(&mut self, reg: Register, value: u32) {
        self.bus.write(self.base + reg.offset(), value)
    }

    /// Reads a field.
    pub fn rf(&mut self, field: Field) -> u32 {
        (self.r(field.register()) >> field.shift()) & field.mask()
    }

    /// Writes a field, zeroing every other bit of the register.
    pub fn wfo(&mut self, field: Field, value: u32) {
        self.wo(field.register(), self.ms(field, value))
    }

    /// Read-modify-write of a single field.
    pub fn rmwf(&mut self, field: Field, value: u32) {
        let reg = field.register();
        let old = self.r(reg) & !(field.mask() << field.shift());
        self.wo(reg, old | self.ms(field, value))
    }

    /// Shifts and masks `value` into position for `field`.
    pub fn ms(&self, field: Field, value: u32) -> u32 {
        (value & field.mask()) << field.shift()
    }

    pub fn set_bits(&mut self, reg: Register, bits: u32) {
        let old = self.r(reg);
        self.wo(reg, old | bits)
    }

    pub fn clear_bits(&mut self, reg: Register, bits: u32) {
        let old = self.r(reg);
        self.wo(reg, old & !bits)
    }

    /// Reads `out.len()` consecutive registers starting at `reg`.
    pub fn r_words(&mut self, reg: Register, out: &mut [u32]) {
        for (i, word) in out.iter_mut().enumerate() {
            *word = self.bus.read(self.base + reg.offset() + 4 * i as u32);
        }
    }

    /// Writes consecutive registers starting at `reg`.
    pub fn wo_words(&mut self, reg: Register, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.bus.write(self.base + reg.offset() + 4 * i as u32, *word);
        }
    }
}
