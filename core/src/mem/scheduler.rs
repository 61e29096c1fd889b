use std::collections::BTreeSet;

use log::debug;

use crate::Cycle;

use super::addr_map::AddressMap;
use super::align;
use super::bank::Bank;
use super::command::{CmdKind, Command};
use super::transaction::{Transaction, TxKind};

/// Breaks transactions into bus commands and issues them in priority
/// order, subject to the per-bank timing state.
///
/// The command queue is an ordered set over the `Command` total order
/// (priority desc, age asc), so the scan in [`Scheduler::step`] always
/// sees the most urgent command first. The scheduler owns nothing but the
/// queue: the bank table is borrowed in each cycle, and completions are
/// returned to the owning channel instead of calling back into it.
#[derive(Debug)]
pub struct Scheduler {
    cycle: Cycle,
    next_cmd_id: u64,
    max_cmd_queue_depth: usize,
    cmd_queue: BTreeSet<Command>,
}

impl Scheduler {
    pub fn new(max_cmd_queue_depth: usize) -> Self {
        Self {
            cycle: 0,
            next_cmd_id: 0,
            max_cmd_queue_depth,
            cmd_queue: BTreeSet::new(),
        }
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn queue_len(&self) -> usize {
        self.cmd_queue.len()
    }

    /// Break a transaction into bus commands and queue them.
    ///
    /// `need_act` marks anything but a page hit; `need_pre` further marks
    /// a page conflict. Returns false (leaving the queue untouched) when
    /// the commands would not fit. The required slot count is doubled to
    /// reserve headroom for a follow-on ACTIVATE per READ/WRITE.
    pub fn add_tx(
        &mut self,
        tx: &Transaction,
        mapper: &AddressMap,
        mal: u32,
        need_act: bool,
        need_pre: bool,
    ) -> bool {
        let (addr, len) = align(tx.addr(), tx.len(), mal);
        // Only MAL-sized transactions are supported.
        assert_eq!(len, mal, "transaction crosses a minimum-access boundary");

        let slots = (1 + usize::from(need_act) + usize::from(need_pre)) * 2;
        if self.cmd_queue.len() + slots > self.max_cmd_queue_depth {
            return false;
        }

        let a = mapper.map(addr);

        if need_pre {
            self.push(CmdKind::Precharge, a.chan, a.rank, a.bank, 0, 0, tx);
        }
        if need_act {
            self.push(CmdKind::Activate, a.chan, a.rank, a.bank, a.row, 0, tx);
        }
        let rw = match tx.kind() {
            TxKind::Read => CmdKind::Read,
            TxKind::Write => CmdKind::Write,
        };
        self.push(rw, a.chan, a.rank, a.bank, a.row, a.col, tx);

        debug!("transaction {} successfully scheduled", tx.id());
        true
    }

    fn push(
        &mut self,
        kind: CmdKind,
        chan: u32,
        rank: u32,
        bank: u32,
        row: u32,
        col: u32,
        tx: &Transaction,
    ) {
        let cmd = Command {
            id: self.next_cmd_id,
            birth: self.cycle,
            kind,
            chan,
            rank,
            bank,
            row,
            col,
            priority: tx.priority(),
            tx_id: tx.id(),
            tx_kind: tx.kind(),
        };
        self.next_cmd_id += 1;
        debug!("@{}: command added: {cmd}", self.cycle);
        self.cmd_queue.insert(cmd);
    }

    /// The first command in queue order whose bank timing allows issue
    /// this cycle.
    fn schedule(&self, banks: &[Vec<Bank>]) -> Option<Command> {
        self.cmd_queue
            .iter()
            .find(|&cmd| banks[cmd.rank as usize][cmd.bank as usize].next(cmd) <= self.cycle)
            .copied()
    }

    /// Apply an issued command to every bank on the channel. The flags
    /// propagate per-rank constraints (tRRD, tCCD, cross-rank bus
    /// lockout) without a separate rank object.
    fn execute(cmd: &Command, banks: &mut [Vec<Bank>]) {
        for (r, rank_banks) in banks.iter_mut().enumerate() {
            for (b, bank) in rank_banks.iter_mut().enumerate() {
                let this_rank = r == cmd.rank as usize;
                let this_bank = this_rank && b == cmd.bank as usize;
                bank.operate(cmd, this_bank, this_rank);
            }
        }
    }

    /// Issue at most one command, apply its effects, and advance one
    /// cycle. The issued command is returned so the channel can emit the
    /// trace record and, for READ/WRITE, retire the parent transaction.
    pub fn step(&mut self, banks: &mut [Vec<Bank>]) -> Option<Command> {
        let issued = self.schedule(banks);
        if let Some(cmd) = &issued {
            debug!("@{}: command issued: {cmd}", self.cycle);
            Self::execute(cmd, banks);
            self.cmd_queue.remove(cmd);
        }
        self.cycle += 1;
        issued
    }
}
