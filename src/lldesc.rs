// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GDMA linked-list descriptor.
//!
//! Layout of the first word, LSB first:
//!
//! | bits  | field    |
//! |-------|----------|
//! | 0-11  | size     |
//! | 12-23 | length   |
//! | 24-27 | reserved |
//! | 28    | err_eof  |
//! | 29    | reserved |
//! | 30    | suc_eof  |
//! | 31    | owner    |
//!
//! The second word is the buffer address and the third the address of the next
//! descriptor, or 0 for the last one.

use {crate::error::Error, core::cell::UnsafeCell};

const SIZE_BITS: u32 = 12;
const LENGTH_BITS: u32 = 12;
const RESERVED_1_BITS: u32 = 4;
const ERR_EOF_BITS: u32 = 1;
const RESERVED_2_BITS: u32 = 1;
const SUC_EOF_BITS: u32 = 1;
const OWNER_BITS: u32 = 1;

const SIZE_SHIFT: u32 = 0;
const LENGTH_SHIFT: u32 = SIZE_SHIFT + SIZE_BITS;
const ERR_EOF_SHIFT: u32 = LENGTH_SHIFT + LENGTH_BITS + RESERVED_1_BITS;
const SUC_EOF_SHIFT: u32 = ERR_EOF_SHIFT + ERR_EOF_BITS + RESERVED_2_BITS;
const OWNER_SHIFT: u32 = SUC_EOF_SHIFT + SUC_EOF_BITS;

const SIZE_MASK: u32 = (1 << SIZE_BITS) - 1;
const LENGTH_MASK: u32 = (1 << LENGTH_BITS) - 1;

/// Largest value `size` and `length` can hold.
pub const MAX_BUFFER_LEN: usize = (1 << LENGTH_BITS) - 1;

/// Value of the next-descriptor word for the last descriptor of a chain.
pub const EMPTY: u32 = 0;

const _: () = {
    assert!(
        SIZE_BITS
            + LENGTH_BITS
            + RESERVED_1_BITS
            + ERR_EOF_BITS
            + RESERVED_2_BITS
            + SUC_EOF_BITS
            + OWNER_BITS
            == 32
    );
    assert!(OWNER_SHIFT == 31);
    assert!(core::mem::size_of::<DmaDescriptor>() == 12);
    assert!(core::mem::align_of::<DmaDescriptor>() == 4);
};

/// Who may touch the buffer a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Cpu = 0,
    Dma = 1,
}

#[repr(C, align(4))]
pub struct DmaDescriptor {
    flags: UnsafeCell<u32>,
    buf: UnsafeCell<u32>,
    next: UnsafeCell<u32>,
}

impl Default for DmaDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for DmaDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DmaDescriptor")
            .field("size", &self.size())
            .field("length", &self.length())
            .field("err_eof", &self.err_eof())
            .field("suc_eof", &self.suc_eof())
            .field("owner", &self.owner())
            .field("buf", &format_args!("{:#010x}", self.buffer()))
            .field("next", &format_args!("{:#010x}", self.next()))
            .finish()
    }
}

impl DmaDescriptor {
    /// An unused descriptor.
    pub const fn new() -> Self {
        Self {
            flags: UnsafeCell::new(0),
            buf: UnsafeCell::new(0),
            next: UnsafeCell::new(EMPTY),
        }
    }

    fn flags(&self) -> u32 {
        unsafe { self.flags.get().read_volatile() }
    }

    fn set_flags(&mut self, value: u32) {
        unsafe { self.flags.get().write_volatile(value) }
    }

    fn set_bit(&mut self, shift: u32, value: bool) {
        let flags = self.flags() & !(1 << shift);
        self.set_flags(flags | ((value as u32) << shift));
    }

    fn bit(&self, shift: u32) -> bool {
        (self.flags() >> shift) & 1 == 1
    }

    pub fn size(&self) -> usize {
        ((self.flags() >> SIZE_SHIFT) & SIZE_MASK) as usize
    }

    /// Capacity of the buffer.
    pub fn set_size(&mut self, size: usize) -> Result<(), Error> {
        if size > MAX_BUFFER_LEN {
            return Err(Error::InvalidLength);
        }
        let flags = self.flags() & !(SIZE_MASK << SIZE_SHIFT);
        self.set_flags(flags | ((size as u32) << SIZE_SHIFT));
        Ok(())
    }

    pub fn length(&self) -> usize {
        ((self.flags() >> LENGTH_SHIFT) & LENGTH_MASK) as usize
    }

    /// Number of valid bytes in the buffer. Must not exceed [`size`](Self::size).
    pub fn set_length(&mut self, length: usize) -> Result<(), Error> {
        if length > MAX_BUFFER_LEN || length > self.size() {
            return Err(Error::InvalidLength);
        }
        let flags = self.flags() & !(LENGTH_MASK << LENGTH_SHIFT);
        self.set_flags(flags | ((length as u32) << LENGTH_SHIFT));
        Ok(())
    }

    pub fn err_eof(&self) -> bool {
        self.bit(ERR_EOF_SHIFT)
    }

    pub fn suc_eof(&self) -> bool {
        self.bit(SUC_EOF_SHIFT)
    }

    pub fn set_suc_eof(&mut self, eof: bool) {
        self.set_bit(SUC_EOF_SHIFT, eof)
    }

    pub fn owner(&self) -> Owner {
        if self.bit(OWNER_SHIFT) {
            Owner::Dma
        } else {
            Owner::Cpu
        }
    }

    pub fn set_owner(&mut self, owner: Owner) {
        self.set_bit(OWNER_SHIFT, owner == Owner::Dma)
    }

    pub fn buffer(&self) -> u32 {
        unsafe { self.buf.get().read_volatile() }
    }

    pub fn set_buffer(&mut self, addr: u32) {
        unsafe { self.buf.get().write_volatile(addr) }
    }

    pub fn next(&self) -> u32 {
        unsafe { self.next.get().read_volatile() }
    }

    /// Marks this descriptor as the last of its chain.
    pub fn set_last(&mut self) {
        unsafe { self.next.get().write_volatile(EMPTY) }
    }

    /// Hardware has handed the descriptor back.
    pub fn is_done(&self) -> bool {
        self.owner() == Owner::Cpu
    }

    /// Hardware has written back a successful end of frame.
    pub fn frame_complete(&self) -> bool {
        self.suc_eof()
    }

    pub fn is_unused(&self) -> bool {
        self.buffer() == 0 && self.is_done()
    }

    /// Sets up a memory-to-peripheral descriptor holding `len` bytes at `addr`
    /// as a complete frame.
    pub fn prepare_outbound(&mut self, addr: u32, len: usize) -> Result<(), Error> {
        if len > MAX_BUFFER_LEN {
            return Err(Error::InvalidLength);
        }
        self.set_flags(0);
        self.set_size(len)?;
        self.set_length(len)?;
        self.set_suc_eof(true);
        self.set_buffer(addr);
        self.set_last();
        self.set_owner(Owner::Dma);
        Ok(())
    }

    /// Sets up a peripheral-to-memory descriptor with room for `capacity`
    /// bytes at `addr`.
    pub fn prepare_inbound(&mut self, addr: u32, capacity: usize) -> Result<(), Error> {
        if capacity > MAX_BUFFER_LEN {
            return Err(Error::InvalidLength);
        }
        self.set_flags(0);
        self.set_size(capacity)?;
        self.set_buffer(addr);
        self.set_last();
        self.set_owner(Owner::Dma);
        Ok(())
    }

    /// Drops the buffer and returns the descriptor to software.
    pub fn release(&mut self) {
        self.set_flags(0);
        self.set_buffer(0);
        self.set_last();
    }

    /// Pointer to the first word, used when handing the descriptor to the DMA
    /// engine.
    pub fn as_ptr(&self) -> *const u8 {
        self as *const Self as *const u8
    }
}
