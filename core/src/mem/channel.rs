use std::collections::VecDeque;

use log::debug;

use crate::config::{ConfigError, CtrlConfig, DeviceConfig};
use crate::{Cycle, MAX_CYCLE};

use super::addr_map::AddressMap;
use super::bank::{Bank, BankState};
use super::command::{CmdKind, Command, IssueRecord};
use super::scheduler::Scheduler;
use super::stats::ChannelStats;
use super::transaction::{Transaction, TxKind};

/// One memory channel: the transaction queues, the FR-FCFS dispatcher,
/// the write-drain policy, and the owned scheduler and bank table.
///
/// Reads are served ahead of writes until either the write queue
/// saturates or the read queue runs dry while writes remain; the channel
/// then drains writes until the write queue empties (write-drain
/// hysteresis).
///
/// Ownership is a tree: the channel owns its scheduler, banks, and
/// queues. The scheduler hands issued commands back instead of calling
/// into the channel, and READ/WRITE completions retire the parent
/// transaction from the matching response queue.
pub struct Channel {
    id: u16,
    cycle: Cycle,

    /// Minimum access length, unit: byte.
    mal: u32,
    max_rd_queue_depth: usize,
    max_wr_queue_depth: usize,

    mapper: AddressMap,
    banks: Vec<Vec<Bank>>,
    sched: Scheduler,

    rd_queue: VecDeque<Transaction>,
    rd_resp_queue: VecDeque<Transaction>,
    wr_queue: VecDeque<Transaction>,
    wr_resp_queue: VecDeque<Transaction>,

    /// Set while writes are preferentially drained.
    wr_draining: bool,

    stats: ChannelStats,
}

impl Channel {
    /// Build a channel from a derived device configuration.
    pub fn new(id: u16, ctrl: &CtrlConfig, dev: &DeviceConfig) -> Result<Self, ConfigError> {
        let mapper = AddressMap::new(ctrl, dev)?;
        debug!("channel {id} address mapping:");
        mapper.log_layout();

        let timings = dev.timings();
        let banks = (0..dev.num_rank)
            .map(|_| (0..dev.num_bank).map(|_| Bank::new(timings)).collect())
            .collect();

        Ok(Self {
            id,
            cycle: 0,
            mal: dev.mal,
            max_rd_queue_depth: ctrl.max_rd_queue_depth,
            max_wr_queue_depth: ctrl.max_wr_queue_depth,
            mapper,
            banks,
            sched: Scheduler::new(ctrl.max_cmd_queue_depth),
            rd_queue: VecDeque::new(),
            rd_resp_queue: VecDeque::new(),
            wr_queue: VecDeque::new(),
            wr_resp_queue: VecDeque::new(),
            wr_draining: false,
            stats: ChannelStats::default(),
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn wr_draining(&self) -> bool {
        self.wr_draining
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Whether any transaction or command is still in flight.
    pub fn busy(&self) -> bool {
        !self.rd_queue.is_empty()
            || !self.wr_queue.is_empty()
            || !self.rd_resp_queue.is_empty()
            || !self.wr_resp_queue.is_empty()
            || self.sched.queue_len() != 0
    }

    /// Admit a transaction into the proper queue, or hand it back when
    /// the queue (counting in-flight responses) is full.
    pub fn add_tx(&mut self, tx: Transaction) -> Result<(), Transaction> {
        match tx.kind() {
            TxKind::Read => {
                if self.rd_queue.len() + self.rd_resp_queue.len() < self.max_rd_queue_depth {
                    self.stats.reads_admitted += 1;
                    self.rd_queue.push_back(tx);
                    Ok(())
                } else {
                    Err(tx)
                }
            }
            TxKind::Write => {
                if self.wr_queue.len() + self.wr_resp_queue.len() < self.max_wr_queue_depth {
                    self.stats.writes_admitted += 1;
                    self.wr_queue.push_back(tx);
                    // A saturated write buffer turns on draining.
                    if self.wr_queue.len() == self.max_wr_queue_depth {
                        self.wr_draining = true;
                    }
                    Ok(())
                } else {
                    Err(tx)
                }
            }
        }
    }

    /// Advance one cycle: drive the scheduler, step every bank, then try
    /// to dispatch one transaction into the scheduler. Returns the trace
    /// record of the command issued this cycle, if any.
    pub fn step(&mut self) -> Option<IssueRecord> {
        let issue_cycle = self.sched.cycle();
        let issued = self.sched.step(&mut self.banks);
        let record = issued.map(|cmd| {
            if matches!(cmd.kind, CmdKind::Read | CmdKind::Write) {
                self.process(&cmd);
            }
            self.stats.count_issued(&cmd);
            IssueRecord {
                chan: self.id,
                cycle: issue_cycle,
                cmd,
            }
        });

        for rank_banks in &mut self.banks {
            for bank in rank_banks {
                bank.step();
            }
        }
        self.cycle += 1;

        self.dispatch_transaction();
        record
    }

    /// Pick the queue to dispatch from. Reads win unless the channel is
    /// draining writes.
    fn dispatch_transaction(&mut self) -> bool {
        if self.rd_queue.is_empty() && self.wr_queue.is_empty() {
            return false;
        }
        if !self.rd_queue.is_empty() && !self.wr_draining {
            self.dispatch_read()
        } else {
            self.dispatch_write()
        }
    }

    /// FR-FCFS selection: the transaction whose target bank allows the
    /// earliest issue wins; ties go to the first seen in queue order.
    /// Returns `(queue index, rank, bank, row)` of the winner.
    fn select_candidate(&self, kind: TxKind) -> Option<(usize, usize, usize, u32)> {
        let queue = match kind {
            TxKind::Read => &self.rd_queue,
            TxKind::Write => &self.wr_queue,
        };
        let mut selected = None;
        let mut issue_cycle = MAX_CYCLE;
        for (idx, tx) in queue.iter().enumerate() {
            // Only MAL-sized transactions are supported.
            assert_eq!(tx.len(), self.mal, "transaction length is not one access");
            let a = self.mapper.map(tx.addr());
            assert_eq!(
                a.chan,
                u32::from(self.id),
                "transaction routed to the wrong channel"
            );
            let bank = &self.banks[a.rank as usize][a.bank as usize];
            let this_issue_cycle = bank.earliest_cycle(a.row, tx.is_read());
            if this_issue_cycle < issue_cycle {
                issue_cycle = this_issue_cycle;
                selected = Some((idx, a.rank as usize, a.bank as usize, a.row));
            }
        }
        selected
    }

    fn dispatch_read(&mut self) -> bool {
        debug_assert!(!self.rd_queue.is_empty());
        let Some((idx, rank, bank, row)) = self.select_candidate(TxKind::Read) else {
            // Every candidate's bank is in use; nothing can be issued.
            return false;
        };

        let (need_act, need_pre) = self.page_relation(rank, bank, row);
        if !self
            .sched
            .add_tx(&self.rd_queue[idx], &self.mapper, self.mal, need_act, need_pre)
        {
            // The command queue lacks space; retry next cycle.
            return false;
        }

        self.note_page_relation(need_act, need_pre);
        let tx = self.rd_queue.remove(idx).expect("selected index in range");
        self.rd_resp_queue.push_back(tx);
        self.banks[rank][bank].use_bank();

        // Reads just ran dry with writes still pending: start draining.
        if self.rd_queue.is_empty() && !self.wr_queue.is_empty() {
            self.wr_draining = true;
        }
        true
    }

    fn dispatch_write(&mut self) -> bool {
        debug_assert!(!self.wr_queue.is_empty());
        let Some((idx, rank, bank, row)) = self.select_candidate(TxKind::Write) else {
            return false;
        };

        let (need_act, need_pre) = self.page_relation(rank, bank, row);
        if !self
            .sched
            .add_tx(&self.wr_queue[idx], &self.mapper, self.mal, need_act, need_pre)
        {
            return false;
        }

        self.note_page_relation(need_act, need_pre);
        let tx = self.wr_queue.remove(idx).expect("selected index in range");
        self.wr_resp_queue.push_back(tx);
        self.banks[rank][bank].use_bank();

        // The write queue fully drained: back to serving reads.
        if self.wr_queue.is_empty() {
            self.wr_draining = false;
        }
        true
    }

    /// Classify the target bank's page relation into the `(need_act,
    /// need_pre)` pair the scheduler expands from.
    fn page_relation(&self, rank: usize, bank: usize, row: u32) -> (bool, bool) {
        let target = &self.banks[rank][bank];
        if target.state() == BankState::Active {
            if target.open_row() == row {
                (false, false) // page hit
            } else {
                (true, true) // page conflict
            }
        } else {
            (true, false) // page miss
        }
    }

    fn note_page_relation(&mut self, need_act: bool, need_pre: bool) {
        match (need_act, need_pre) {
            (false, false) => self.stats.page_hits += 1,
            (true, true) => self.stats.page_conflicts += 1,
            _ => self.stats.page_misses += 1,
        }
    }

    /// Retire the parent transaction of a completed READ/WRITE command
    /// and release its bank.
    fn process(&mut self, cmd: &Command) {
        let queue = match cmd.tx_kind {
            TxKind::Read => &mut self.rd_resp_queue,
            TxKind::Write => &mut self.wr_resp_queue,
        };
        let pos = queue
            .iter()
            .position(|tx| tx.id() == cmd.tx_id)
            .expect("completed command has no transaction in the response queue");
        queue.remove(pos);
        match cmd.tx_kind {
            TxKind::Read => self.stats.reads_completed += 1,
            TxKind::Write => self.stats.writes_completed += 1,
        }
        self.banks[cmd.rank as usize][cmd.bank as usize].release();
    }
}
