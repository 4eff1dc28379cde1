//! System registers: peripheral clock gates and reset lines.

use {
    crate::csr::{Csr, Register, RegisterBus},
    bitflags::bitflags,
};

pub const HW_SYSTEM_BASE: u32 = 0x600C_0000;

const PERIP_CLK_EN1: Register = Register::new(0x14);
const PERIP_RST_EN1: Register = Register::new(0x1C);

bitflags! {
    /// Peripherals controlled by `PERIP_CLK_EN1` / `PERIP_RST_EN1`. Both
    /// registers share the same bit positions.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Peripherals1: u32 {
        const AES  = 1 << 1;
        const SHA  = 1 << 2;
        const RSA  = 1 << 3;
        /// Digital signature. Its reset also gates the AES reset line.
        const DS   = 1 << 4;
        const HMAC = 1 << 5;
        const DMA  = 1 << 6;
    }
}

pub struct System {
    base_addr: u32,
}

impl Default for System {
    fn default() -> Self {
        System::new()
    }
}

impl System {
    pub fn new() -> Self {
        Self {
            base_addr: HW_SYSTEM_BASE,
        }
    }

    /// Creates a System instance with a different base address.
    pub fn with_alt_base_addr(base_addr: u32) -> Self {
        Self { base_addr }
    }

    /// Turns on the clock of every peripheral in `peripherals`.
    pub fn enable_peripheral_clock<B: RegisterBus>(&self, bus: &mut B, peripherals: Peripherals1) {
        let mut system_csr = Csr::new(bus, self.base_addr);
        system_csr.set_bits(PERIP_CLK_EN1, peripherals.bits());
    }

    /// Turns off the clock of every peripheral in `peripherals`.
    pub fn disable_peripheral_clock<B: RegisterBus>(&self, bus: &mut B, peripherals: Peripherals1) {
        let mut system_csr = Csr::new(bus, self.base_addr);
        system_csr.clear_bits(PERIP_CLK_EN1, peripherals.bits());
    }

    /// Holds the peripherals in reset.
    pub fn assert_reset<B: RegisterBus>(&self, bus: &mut B, peripherals: Peripherals1) {
        let mut system_csr = Csr::new(bus, self.base_addr);
        system_csr.set_bits(PERIP_RST_EN1, peripherals.bits());
    }

    /// Takes the peripherals out of reset.
    pub fn release_reset<B: RegisterBus>(&self, bus: &mut B, peripherals: Peripherals1) {
        let mut system_csr = Csr::new(bus, self.base_addr);
        system_csr.clear_bits(PERIP_RST_EN1, peripherals.bits());
    }

    pub fn enabled_clocks<B: RegisterBus>(&self, bus: &mut B) -> Peripherals1 {
        let mut system_csr = Csr::new(bus, self.base_addr);
        Peripherals1::from_bits_truncate(system_csr.r(PERIP_CLK_EN1))
    }

    pub fn held_in_reset<B: RegisterBus>(&self, bus: &mut B) -> Peripherals1 {
        let mut system_csr = Csr::new(bus, self.base_addr);
        Peripherals1::from_bits_truncate(system_csr.r(PERIP_RST_EN1))
    }

    /// Clocks the AES accelerator and the GDMA engine and takes both out of
    /// reset. The DS reset has to be released too or AES stays in reset.
    pub fn enable_crypto_dma<B: RegisterBus>(&self, bus: &mut B) {
        self.enable_peripheral_clock(bus, Peripherals1::AES | Peripherals1::DMA);
        self.release_reset(
            bus,
            Peripherals1::AES | Peripherals1::DS | Peripherals1::DMA,
        );
    }
}
