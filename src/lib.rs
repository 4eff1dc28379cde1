// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-128 CTR on the ESP32-C3 crypto accelerator, fed by the general DMA
//! engine and driven by polling.

#![cfg_attr(not(test), no_std)]

pub mod aes;
pub mod csr;
pub mod driver;
pub mod error;
pub mod gdma;
pub mod lldesc;
#[cfg(feature = "logging")]
pub mod logging;
pub mod poll;
#[cfg(test)]
mod sim;
pub mod system;

pub use {
    crate::aes::{Iv, Key},
    driver::{AesDmaDriver, DriverConfig, Phase, MAX_BLOCKS_PER_TRANSFER},
    error::{DmaFault, Error, Stage},
    poll::PollConfig,
};
