use std::path::Path;

use log::error;

use crate::Cycle;
use crate::config::{ConfigError, CtrlConfig, DeviceConfig};

use super::channel::Channel;
use super::command::IssueRecord;
use super::transaction::Transaction;

/// Why [`MemorySystem::add_tx`] handed a transaction back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The transaction is longer than the channel interleave granularity.
    /// Retrying will never help.
    TooLong,
    /// The owning channel's transaction queue is full; retry next cycle.
    QueueFull,
}

/// A transaction the memory system could not accept, with ownership
/// returned to the caller.
#[derive(Debug)]
pub struct RejectedTx {
    pub tx: Transaction,
    pub reason: RejectReason,
}

/// The whole memory system: routes transactions to their owning channel
/// by the interleave bits and drives the global clock.
pub struct MemorySystem {
    cycle: Cycle,

    /// Controller frequency, unit: MHz.
    freq: u64,

    num_chan: u32,
    chan_itlv_bit: u32,

    channels: Vec<Channel>,
}

impl MemorySystem {
    /// Load configurations from disk and build the system.
    ///
    /// `dev_paths` holds one device configuration per channel; when fewer
    /// files than channels are given the last one is broadcast. `sizes_mb`
    /// is either one total capacity split evenly across channels or one
    /// capacity per channel.
    pub fn new(
        ctrl_path: &Path,
        dev_paths: &[impl AsRef<Path>],
        sizes_mb: &[u64],
    ) -> Result<Self, ConfigError> {
        let ctrl = CtrlConfig::load(ctrl_path)?;
        let num_chan = ctrl.num_chan as usize;

        if dev_paths.is_empty() || dev_paths.len() > num_chan {
            return Err(ConfigError::Invalid(format!(
                "{} device configurations given for a {num_chan}-channel system",
                dev_paths.len()
            )));
        }
        if sizes_mb.len() != 1 && sizes_mb.len() != num_chan {
            return Err(ConfigError::Invalid(format!(
                "{} capacity settings given for a {num_chan}-channel system",
                sizes_mb.len()
            )));
        }
        if sizes_mb.len() == 1 && sizes_mb[0] % num_chan as u64 != 0 {
            return Err(ConfigError::Invalid(format!(
                "{}MB cannot be evenly divided across a {num_chan}-channel system",
                sizes_mb[0]
            )));
        }

        let mut dev_cfgs = Vec::with_capacity(num_chan);
        for i in 0..num_chan {
            let path = dev_paths[i.min(dev_paths.len() - 1)].as_ref();
            let mut dev = DeviceConfig::load(path)?;
            let size = if sizes_mb.len() == 1 {
                sizes_mb[0] / num_chan as u64
            } else {
                sizes_mb[i]
            };
            dev.derive(size, &ctrl)?;
            dev_cfgs.push(dev);
        }

        Self::from_configs(ctrl, dev_cfgs)
    }

    /// Build the system from already-derived configurations (one device
    /// configuration per channel).
    pub fn from_configs(
        ctrl: CtrlConfig,
        dev_cfgs: Vec<DeviceConfig>,
    ) -> Result<Self, ConfigError> {
        assert_eq!(
            dev_cfgs.len(),
            ctrl.num_chan as usize,
            "one device configuration per channel"
        );
        let channels = dev_cfgs
            .iter()
            .enumerate()
            .map(|(i, dev)| Channel::new(i as u16, &ctrl, dev))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cycle: 0,
            freq: u64::from(ctrl.ctrl_freq),
            num_chan: ctrl.num_chan,
            chan_itlv_bit: ctrl.chan_itlv_bit,
            channels,
        })
    }

    /// Controller frequency in MHz.
    pub fn freq(&self) -> u64 {
        self.freq
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Whether any channel still holds in-flight work.
    pub fn busy(&self) -> bool {
        self.channels.iter().any(Channel::busy)
    }

    /// The channel owning a transaction's address.
    pub fn find_chan_id(&self, tx: &Transaction) -> u32 {
        if self.num_chan == 1 {
            return 0;
        }
        let mask = (1u64 << self.num_chan.ilog2()) - 1;
        ((tx.addr() >> self.chan_itlv_bit) & mask) as u32
    }

    /// Route a transaction to its owning channel.
    pub fn add_tx(&mut self, tx: Transaction) -> Result<(), RejectedTx> {
        if u64::from(tx.len()) > (1u64 << self.chan_itlv_bit) {
            error!(
                "transaction {} is longer than the channel interleaving granularity",
                tx.id()
            );
            return Err(RejectedTx {
                tx,
                reason: RejectReason::TooLong,
            });
        }
        let chan = self.find_chan_id(&tx) as usize;
        self.channels[chan].add_tx(tx).map_err(|tx| RejectedTx {
            tx,
            reason: RejectReason::QueueFull,
        })
    }

    /// Advance the whole system one cycle, returning the commands issued
    /// (at most one per channel).
    pub fn step(&mut self) -> Vec<IssueRecord> {
        self.cycle += 1;
        self.channels.iter_mut().filter_map(Channel::step).collect()
    }
}
