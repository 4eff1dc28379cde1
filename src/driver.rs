//! AES-128 CTR through the accelerator and GDMA.
//!
//! One call runs one transfer: the plaintext goes out through a single
//! outbound descriptor, the ciphertext comes back through a single inbound
//! descriptor, and the CPU polls until both the accelerator and the DMA engine
//! are finished.

use {
    crate::{
        aes::{Aes, AesState, Iv, Key, AES_BLOCK_SIZE},
        csr::RegisterBus,
        error::{DmaFault, Error, Stage},
        gdma::{ChannelStatus, DmaChannel, DmaPeripheral, Gdma},
        lldesc::{DmaDescriptor, MAX_BUFFER_LEN},
        poll::PollConfig,
        system::System,
    },
    embedded_hal::blocking::delay::DelayUs,
};

/// Most blocks a single transfer can carry.
pub const MAX_BLOCKS_PER_TRANSFER: usize = MAX_BUFFER_LEN / AES_BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub channel: DmaChannel,
    pub poll: PollConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            channel: DmaChannel::Channel0,
            poll: PollConfig::default(),
        }
    }
}

/// Where a transfer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ClockEnabled,
    DmaArmed,
    KeyProgrammed,
    Triggered,
    AwaitingDma,
    Done,
    Released,
}

pub struct AesDmaDriver<B: RegisterBus, D: DelayUs<u32>> {
    bus: B,
    delay: D,
    config: DriverConfig,
    system: System,
    gdma: Gdma,
    aes: Aes,
    /// Receives from AES.
    inlink: DmaDescriptor,
    /// Transmits to AES.
    outlink: DmaDescriptor,
    phase: Phase,
}

impl<B: RegisterBus, D: DelayUs<u32>> AesDmaDriver<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_config(bus, delay, DriverConfig::default())
    }

    pub fn with_config(bus: B, delay: D, config: DriverConfig) -> Self {
        Self::with_peripherals(bus, delay, config, System::new(), Gdma::new(), Aes::new())
    }

    /// Uses peripheral instances created with alternate base addresses.
    pub fn with_peripherals(
        bus: B,
        delay: D,
        config: DriverConfig,
        system: System,
        gdma: Gdma,
        aes: Aes,
    ) -> Self {
        Self {
            bus,
            delay,
            config,
            system,
            gdma,
            aes,
            inlink: DmaDescriptor::new(),
            outlink: DmaDescriptor::new(),
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The phase the last transfer reached. After an error this is where it
    /// stopped.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Gives the bus and the delay source back.
    pub fn free(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Snapshot of the DMA channel and both descriptors, logged at debug
    /// level.
    pub fn dma_status(&mut self) -> ChannelStatus {
        let status = self.gdma.status(&mut self.bus, self.config.channel);
        log::debug!("{:?}: {:?}", self.config.channel, status);
        log::debug!("inlink: {:?}", self.inlink);
        log::debug!("outlink: {:?}", self.outlink);
        status
    }

    fn enter(&mut self, phase: Phase) {
        log::trace!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Encrypts `block_count` blocks of `plaintext` into `ciphertext` with
    /// AES-128 in CTR mode, starting from the counter block `iv`.
    ///
    /// At most 4095 bytes fit in a descriptor, so `block_count` is limited to
    /// [`MAX_BLOCKS_PER_TRANSFER`]. Both buffers must hold at least
    /// `block_count * 16` bytes and live in memory the DMA engine can reach.
    /// Zero blocks is a no-op that never touches the hardware.
    pub fn encrypt_ctr(
        &mut self,
        key: &Key,
        iv: &Iv,
        plaintext: &[u8],
        ciphertext: &mut [u8],
        block_count: u32,
    ) -> Result<(), Error> {
        if block_count == 0 {
            return Ok(());
        }

        let len = (block_count as usize)
            .checked_mul(AES_BLOCK_SIZE)
            .ok_or(Error::InvalidLength)?;
        if len > MAX_BUFFER_LEN || plaintext.len() < len || ciphertext.len() < len {
            log::warn!(
                "rejecting {} blocks ({} byte input, {} byte output)",
                block_count,
                plaintext.len(),
                ciphertext.len()
            );
            return Err(Error::InvalidLength);
        }

        log::debug!("AES-CTR over {:?}: {} blocks", self.config.channel, block_count);

        self.phase = Phase::Idle;
        let result = self.transfer(
            key,
            iv,
            &plaintext[..len],
            &mut ciphertext[..len],
            block_count,
        );
        if let Err(err) = result {
            log::warn!("AES-CTR failed in {:?}: {}", self.phase, err);
            self.dma_status();
            self.abort();
        }

        self.inlink.release();
        self.outlink.release();
        result
    }

    /// CTR decryption is the same operation as encryption.
    pub fn decrypt_ctr(
        &mut self,
        key: &Key,
        iv: &Iv,
        ciphertext: &[u8],
        plaintext: &mut [u8],
        block_count: u32,
    ) -> Result<(), Error> {
        self.encrypt_ctr(key, iv, ciphertext, plaintext, block_count)
    }

    /// Runs `input` through the key stream into `output`, splitting it into as
    /// many transfers as needed. `input` must be a whole number of blocks.
    pub fn apply_keystream(
        &mut self,
        key: &Key,
        iv: &Iv,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), Error> {
        if input.len() % AES_BLOCK_SIZE != 0 || output.len() < input.len() {
            return Err(Error::InvalidLength);
        }

        const CHUNK: usize = MAX_BLOCKS_PER_TRANSFER * AES_BLOCK_SIZE;
        let mut iv = *iv;
        for (src, dst) in input.chunks(CHUNK).zip(output.chunks_mut(CHUNK)) {
            let blocks = (src.len() / AES_BLOCK_SIZE) as u32;
            self.encrypt_ctr(key, &iv, src, dst, blocks)?;
            iv = iv.advanced(blocks);
        }
        Ok(())
    }

    fn transfer(
        &mut self,
        key: &Key,
        iv: &Iv,
        plaintext: &[u8],
        ciphertext: &mut [u8],
        block_count: u32,
    ) -> Result<(), Error> {
        let channel = self.config.channel;
        let poll = self.config.poll;
        let len = plaintext.len();

        self.system.enable_crypto_dma(&mut self.bus);
        self.enter(Phase::ClockEnabled);

        let out_buf = self.bus.dma_addr(plaintext.as_ptr());
        let in_buf = self.bus.dma_addr(ciphertext.as_mut_ptr() as *const u8);
        self.outlink.prepare_outbound(out_buf, len)?;
        self.inlink.prepare_inbound(in_buf, len)?;
        let inlink = self.bus.dma_addr(self.inlink.as_ptr());
        let outlink = self.bus.dma_addr(self.outlink.as_ptr());
        self.gdma
            .start(&mut self.bus, channel, inlink, outlink, DmaPeripheral::Aes);
        self.enter(Phase::DmaArmed);

        self.aes.configure(&mut self.bus, key, iv, block_count);
        self.enter(Phase::KeyProgrammed);
        self.aes.trigger(&mut self.bus);
        self.enter(Phase::Triggered);

        let polls = poll.poll(&mut self.delay, Stage::Accelerator, || {
            if let Some(fault) = self.gdma.interrupts_raw(&mut self.bus, channel).fault() {
                return Err(fault.into());
            }
            Ok(self.aes.state(&mut self.bus) == AesState::Done)
        })?;
        log::trace!("AES done after {} polls", polls);
        self.enter(Phase::AwaitingDma);

        // The descriptor is only finished once the engine has handed it back
        // and written a successful end of frame.
        let polls = poll.poll(&mut self.delay, Stage::DmaInbound, || {
            if self.inlink.err_eof() {
                return Err(DmaFault::ErrorEndOfFrame.into());
            }
            if let Some(fault) = self.gdma.interrupts_raw(&mut self.bus, channel).fault() {
                return Err(fault.into());
            }
            Ok(self.inlink.is_done() && self.inlink.frame_complete())
        })?;
        log::trace!("inlink returned after {} polls", polls);

        let infifo = self.gdma.infifo_status(&mut self.bus, channel);
        if !infifo.is_drained() {
            return Err(DmaFault::FifoNotDrained {
                count: infifo.count,
            }
            .into());
        }
        let outfifo = self.gdma.outfifo_status(&mut self.bus, channel);
        if !outfifo.is_drained() {
            return Err(DmaFault::OutfifoNotDrained {
                count: outfifo.count,
            }
            .into());
        }
        if self.inlink.length() != len {
            return Err(DmaFault::ShortFrame {
                received: self.inlink.length() as u16,
            }
            .into());
        }
        self.enter(Phase::Done);

        self.aes.exit_dma(&mut self.bus);
        self.enter(Phase::Released);
        Ok(())
    }

    /// Stops the channel and takes the accelerator out of DMA mode so the
    /// buffers are no longer touched once the call returns.
    fn abort(&mut self) {
        self.gdma.reset(&mut self.bus, self.config.channel);
        self.aes.exit_dma(&mut self.bus);
    }
}
