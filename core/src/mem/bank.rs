use crate::config::Timings;
use crate::{Cycle, MAX_CYCLE};

use super::command::{CmdKind, Command};

/// States of the per-bank state machine.
///
/// `Activating`, `Precharging`, and `Refreshing` are transient: they carry
/// a countdown and decay to their steady state (`Active` or `Idle`) when
/// it reaches zero. The power modes are reserved hooks; no policy drives
/// them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankState {
    Idle,
    Activating,
    Active,
    Precharging,
    Refreshing,
    PowerDown,
    DeepPowerDown,
    SelfRefreshing,
}

/// A single DRAM bank: the state machine plus the earliest-allowed-cycle
/// counter for every command class.
///
/// Commands to *other* banks still constrain this one (tRRD across banks
/// of a rank, tCCD and bus turnaround across ranks), so every command on
/// the channel is applied to every bank with `(this_bank, this_rank)`
/// flags describing its relation to the command's target. The `next_*`
/// counters only ever move forward.
#[derive(Debug, Clone)]
pub struct Bank {
    state: BankState,

    /// Row latched in the row buffer; only meaningful while `Active`.
    open_row: u32,

    /// Set while a scheduled transaction owns this bank, keeping the
    /// dispatcher from targeting it concurrently.
    in_use: bool,

    // Earliest cycle each command class becomes legal.
    next_rd: Cycle,
    next_wr: Cycle,
    next_act: Cycle,
    next_pre: Cycle,
    next_pd: Cycle,
    next_pu: Cycle,

    /// Cycles remaining in a transient state.
    countdown: Cycle,

    cycle: Cycle,
    t: Timings,
}

impl Bank {
    pub fn new(timings: Timings) -> Self {
        Self {
            state: BankState::Idle,
            open_row: 0,
            in_use: false,
            next_rd: 0,
            next_wr: 0,
            next_act: 0,
            next_pre: 0,
            next_pd: 0,
            next_pu: 0,
            countdown: 0,
            cycle: 0,
            t: timings,
        }
    }

    pub fn state(&self) -> BankState {
        self.state
    }

    pub fn open_row(&self) -> u32 {
        self.open_row
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// Reserve the bank for a scheduled-but-unfinished transaction.
    pub fn use_bank(&mut self) {
        self.in_use = true;
    }

    pub fn release(&mut self) {
        self.in_use = false;
    }

    /// Advance one cycle, decaying a transient state when its countdown
    /// expires.
    pub fn step(&mut self) {
        if self.countdown > 0 {
            self.countdown -= 1;
            if self.countdown == 0 {
                self.state = match self.state {
                    BankState::Activating => BankState::Active,
                    BankState::Precharging | BankState::Refreshing => BankState::Idle,
                    state => panic!("bank counting down in steady state {state:?}"),
                };
            }
        }
        self.cycle += 1;
    }

    /// Apply an ACTIVATE on this channel.
    ///
    /// The target bank opens `row`; sibling banks of the rank only take
    /// the tRRD activate-to-activate penalty.
    pub fn activate(&mut self, row: u32, this_bank: bool, this_rank: bool) {
        if this_bank {
            assert_eq!(self.state, BankState::Idle, "activate on a non-idle bank");
            self.state = BankState::Activating;
            self.open_row = row;
            self.countdown = self.t.trcd;

            self.next_rd = self.next_rd.max(self.cycle + self.t.act_to_rw);
            self.next_wr = self.next_wr.max(self.cycle + self.t.act_to_rw);
            self.next_act = self.next_act.max(self.cycle + self.t.trc);
            self.next_pre = self.next_pre.max(self.cycle + self.t.tras);
        } else if this_rank {
            self.next_act = self.next_act.max(self.cycle + self.t.trrd);
        }
    }

    /// Apply a PRECHARGE on this channel.
    pub fn precharge(&mut self, this_bank: bool, _this_rank: bool) {
        if this_bank {
            assert_eq!(
                self.state,
                BankState::Active,
                "precharge on a non-active bank"
            );
            self.state = BankState::Precharging;
            self.countdown = self.t.trp;

            self.next_act = self.next_act.max(self.cycle + self.t.trp);
            self.next_rd = self.next_rd.max(self.next_act + self.t.trcd);
            self.next_wr = self.next_wr.max(self.next_act + self.t.trcd);
            self.next_pre = self.next_pre.max(self.next_act + self.t.tras);
        }
    }

    /// Apply a READ on this channel.
    ///
    /// Same-rank banks take the tCCD column gap; other ranks take the
    /// bus-occupancy gap plus one turnaround cycle. Every bank takes the
    /// read-to-write penalty because the data bus is shared.
    pub fn read(&mut self, this_bank: bool, this_rank: bool) {
        if this_bank {
            assert_eq!(self.state, BankState::Active, "read on a non-active bank");
        }
        if this_rank {
            self.next_rd = self.next_rd.max(self.cycle + self.t.tccd);
        } else {
            self.next_rd = self.next_rd.max(self.cycle + self.t.burst + 1);
        }
        self.next_wr = self.next_wr.max(self.cycle + self.t.rd_to_wr);
        if this_bank {
            self.next_pre = self.next_pre.max(self.cycle + self.t.rd_to_pre);
            self.next_act = self.next_act.max(self.next_pre + self.t.trp);
        }
        // Power-down hooks; no policy issues these yet.
        self.next_pd = self.next_pd.max(self.cycle);
        self.next_pu = self.next_pu.max(self.cycle);
    }

    /// Apply a WRITE on this channel; symmetric with [`Bank::read`].
    pub fn write(&mut self, this_bank: bool, this_rank: bool) {
        if this_bank {
            assert_eq!(self.state, BankState::Active, "write on a non-active bank");
        }
        let wr_to_rd = if this_rank {
            self.t.wr_to_rd_same
        } else {
            self.t.wr_to_rd_diff
        };
        self.next_rd = self.next_rd.max(self.cycle + wr_to_rd);
        if this_rank {
            self.next_wr = self.next_wr.max(self.cycle + self.t.tccd);
        } else {
            self.next_wr = self.next_wr.max(self.cycle + self.t.burst + 1);
        }
        if this_bank {
            self.next_pre = self.next_pre.max(self.cycle + self.t.wr_to_pre);
            self.next_act = self.next_act.max(self.next_pre + self.t.trp);
        }
        self.next_pd = self.next_pd.max(self.cycle);
        self.next_pu = self.next_pu.max(self.cycle);
    }

    /// Apply a command's effect given its relation to this bank.
    pub fn operate(&mut self, cmd: &Command, this_bank: bool, this_rank: bool) {
        match cmd.kind {
            CmdKind::Activate => self.activate(cmd.row, this_bank, this_rank),
            CmdKind::Precharge => self.precharge(this_bank, this_rank),
            CmdKind::Read => self.read(this_bank, this_rank),
            CmdKind::Write => self.write(this_bank, this_rank),
            // Refresh and power-mode commands are reserved.
            _ => {}
        }
    }

    /// Earliest cycle `cmd` becomes legal on this bank, or [`MAX_CYCLE`]
    /// if the current state forbids it outright.
    pub fn next(&self, cmd: &Command) -> Cycle {
        match cmd.kind {
            CmdKind::Read => {
                if self.state == BankState::Active && self.open_row == cmd.row {
                    self.next_rd
                } else {
                    MAX_CYCLE
                }
            }
            CmdKind::Write => {
                if self.state == BankState::Active && self.open_row == cmd.row {
                    self.next_wr
                } else {
                    MAX_CYCLE
                }
            }
            CmdKind::Activate => {
                if self.state == BankState::Idle {
                    self.next_act
                } else {
                    MAX_CYCLE
                }
            }
            CmdKind::Precharge => {
                if self.state == BankState::Active {
                    self.next_pre
                } else {
                    MAX_CYCLE
                }
            }
            _ => MAX_CYCLE,
        }
    }

    /// Earliest cycle a *transaction* targeting `row` could issue its
    /// column command, assuming the dispatcher schedules the page-opening
    /// commands it needs. `_is_read` is reserved for write-specific
    /// selection policies.
    pub fn earliest_cycle(&self, row: u32, _is_read: bool) -> Cycle {
        if self.in_use {
            // The bank already belongs to another transaction.
            return MAX_CYCLE;
        }
        match self.state {
            BankState::Active => {
                if self.open_row == row {
                    // Page hit.
                    self.next_rd
                } else {
                    // Page conflict.
                    self.next_act + self.t.trcd
                }
            }
            // Page miss.
            BankState::Idle => self.next_act + self.t.trcd,
            // Power modes are not fully modelled.
            _ => self.cycle,
        }
    }
}
