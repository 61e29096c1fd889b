//! The memory-system core: transactions, bus commands, address decoding,
//! bank state machines, command scheduling, and channel plumbing.

mod addr_map;
mod bank;
mod channel;
mod command;
mod scheduler;
mod stats;
mod system;
mod transaction;

pub use addr_map::{AddressMap, DramAddr};
pub use bank::{Bank, BankState};
pub use channel::Channel;
pub use command::{CmdKind, Command, IssueRecord};
pub use scheduler::Scheduler;
pub use stats::ChannelStats;
pub use system::{MemorySystem, RejectReason, RejectedTx};
pub use transaction::{Transaction, TxKind};

/// Align `(addr, len)` outward to `gran`-sized boundaries. `gran` must be
/// a power of two and `len` nonzero.
pub(crate) fn align(addr: u64, len: u32, gran: u32) -> (u64, u32) {
    let log_gran = gran.ilog2();
    let start = (addr >> log_gran) << log_gran;
    let end = (((addr + u64::from(len) - 1) >> log_gran) << log_gran) + u64::from(gran);
    (start, (end - start) as u32)
}
