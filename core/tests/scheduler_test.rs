mod common;

use ferrite_core::Cycle;
use ferrite_core::config::{CtrlConfig, DeviceConfig};
use ferrite_core::mem::{AddressMap, Bank, CmdKind, Command, Scheduler, Transaction, TxKind};

fn setup() -> (CtrlConfig, DeviceConfig, AddressMap, Vec<Vec<Bank>>) {
    let ctrl = common::test_ctrl();
    let dev = common::test_dev(&ctrl, 1024);
    let mapper = AddressMap::new(&ctrl, &dev).unwrap();
    let timings = dev.timings();
    let banks: Vec<Vec<Bank>> = (0..dev.num_rank)
        .map(|_| (0..dev.num_bank).map(|_| Bank::new(timings)).collect())
        .collect();
    (ctrl, dev, mapper, banks)
}

fn read_tx(id: u64, addr: u64) -> Transaction {
    Transaction::new(id, addr, 64, TxKind::Read)
}

/// Drive the scheduler like a channel does: one scheduler step, then one
/// bank step, per cycle. Collects every issued command with its cycle.
fn drive(sched: &mut Scheduler, banks: &mut Vec<Vec<Bank>>, cycles: u64) -> Vec<(Cycle, Command)> {
    let mut issued = Vec::new();
    for _ in 0..cycles {
        let cycle = sched.cycle();
        if let Some(cmd) = sched.step(banks) {
            issued.push((cycle, cmd));
        }
        for rank_banks in banks.iter_mut() {
            for bank in rank_banks {
                bank.step();
            }
        }
    }
    issued
}

fn kinds(issued: &[(Cycle, Command)]) -> Vec<CmdKind> {
    issued.iter().map(|(_, c)| c.kind).collect()
}

// ---- Command expansion ----

#[test]
fn page_miss_expands_to_act_then_rw() {
    let (ctrl, dev, mapper, mut banks) = setup();
    let mut sched = Scheduler::new(ctrl.max_cmd_queue_depth);

    let tx = read_tx(0, common::compose_addr(5, 0, 0));
    assert!(sched.add_tx(&tx, &mapper, dev.mal, true, false));
    assert_eq!(sched.queue_len(), 2);

    let issued = drive(&mut sched, &mut banks, 100);
    assert_eq!(kinds(&issued), vec![CmdKind::Activate, CmdKind::Read]);
    assert_eq!(sched.queue_len(), 0);

    // The column command waits out tRCD.
    let timings = dev.timings();
    assert_eq!(issued[1].0 - issued[0].0, timings.trcd);
}

#[test]
fn page_conflict_expands_to_pre_act_rw() {
    let (ctrl, dev, mapper, mut banks) = setup();
    let mut sched = Scheduler::new(ctrl.max_cmd_queue_depth);

    // Open a different row first so the PRE and ACT are legal.
    banks[0][0].activate(9, true, true);
    assert!(drive(&mut sched, &mut banks, 1).is_empty());

    let tx = Transaction::new(0, common::compose_addr(5, 0, 0), 64, TxKind::Write);
    assert!(sched.add_tx(&tx, &mapper, dev.mal, true, true));
    assert_eq!(sched.queue_len(), 3);

    let issued = drive(&mut sched, &mut banks, 200);
    assert_eq!(
        kinds(&issued),
        vec![CmdKind::Precharge, CmdKind::Activate, CmdKind::Write]
    );
}

// ---- Back-pressure ----

#[test]
fn full_queue_rejects_without_mutation() {
    let (_, dev, mapper, _) = setup();
    // Depth 4: one page miss (2 commands, 4 reserved slots) fits exactly.
    let mut sched = Scheduler::new(4);

    let first = read_tx(0, common::compose_addr(5, 0, 0));
    assert!(sched.add_tx(&first, &mapper, dev.mal, true, false));
    assert_eq!(sched.queue_len(), 2);

    let second = read_tx(1, common::compose_addr(6, 1, 0));
    assert!(!sched.add_tx(&second, &mapper, dev.mal, true, false));
    assert_eq!(sched.queue_len(), 2);
}

#[test]
fn slot_reservation_doubles_command_count() {
    let (_, dev, mapper, _) = setup();
    // A page conflict wants 3 commands but reserves 6 slots.
    let mut sched = Scheduler::new(5);
    let tx = read_tx(0, common::compose_addr(5, 0, 0));
    assert!(!sched.add_tx(&tx, &mapper, dev.mal, true, true));
    assert_eq!(sched.queue_len(), 0);
}

// ---- Ordering ----

#[test]
fn higher_priority_issues_first() {
    let (ctrl, dev, mapper, mut banks) = setup();
    let mut sched = Scheduler::new(ctrl.max_cmd_queue_depth);

    // Open row 5 so both transactions are page hits with identical timing.
    banks[0][0].activate(5, true, true);
    drive(&mut sched, &mut banks, 20);

    let mut low = read_tx(0, common::compose_addr(5, 0, 0));
    low.set_priority(1);
    let mut high = read_tx(1, common::compose_addr(5, 0, 32));
    high.set_priority(5);

    // Insertion order must not matter.
    assert!(sched.add_tx(&low, &mapper, dev.mal, false, false));
    assert!(sched.add_tx(&high, &mapper, dev.mal, false, false));

    let issued = drive(&mut sched, &mut banks, 100);
    assert_eq!(issued.len(), 2);
    assert_eq!(issued[0].1.tx_id, 1);
    assert_eq!(issued[0].1.priority, 5);
    assert_eq!(issued[1].1.tx_id, 0);
}

#[test]
fn equal_priority_issues_in_age_order() {
    let (ctrl, dev, mapper, mut banks) = setup();
    let mut sched = Scheduler::new(ctrl.max_cmd_queue_depth);

    banks[0][0].activate(5, true, true);
    drive(&mut sched, &mut banks, 20);

    let first = read_tx(0, common::compose_addr(5, 0, 0));
    let second = read_tx(1, common::compose_addr(5, 0, 32));
    assert!(sched.add_tx(&first, &mapper, dev.mal, false, false));
    assert!(sched.add_tx(&second, &mapper, dev.mal, false, false));

    let issued = drive(&mut sched, &mut banks, 100);
    assert_eq!(issued.len(), 2);
    assert_eq!(issued[0].1.tx_id, 0);
    assert_eq!(issued[1].1.tx_id, 1);
}

// ---- Inter-command spacing ----

#[test]
fn consecutive_reads_on_a_rank_respect_tccd() {
    let (ctrl, dev, mapper, mut banks) = setup();
    let timings = dev.timings();
    let mut sched = Scheduler::new(ctrl.max_cmd_queue_depth);

    banks[0][0].activate(5, true, true);
    drive(&mut sched, &mut banks, 20);

    for id in 0..3u64 {
        let tx = read_tx(id, common::compose_addr(5, 0, id * 32));
        assert!(sched.add_tx(&tx, &mapper, dev.mal, false, false));
    }

    let issued = drive(&mut sched, &mut banks, 100);
    assert_eq!(issued.len(), 3);
    for pair in issued.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= timings.tccd);
    }
}

#[test]
fn activates_across_banks_of_a_rank_respect_trrd() {
    let (ctrl, dev, mapper, mut banks) = setup();
    let timings = dev.timings();
    let mut sched = Scheduler::new(ctrl.max_cmd_queue_depth);

    // Two page misses to different banks of rank 0.
    let tx0 = read_tx(0, common::compose_addr(5, 0, 0));
    let tx1 = read_tx(1, common::compose_addr(7, 1, 0));
    assert!(sched.add_tx(&tx0, &mapper, dev.mal, true, false));
    assert!(sched.add_tx(&tx1, &mapper, dev.mal, true, false));

    let issued = drive(&mut sched, &mut banks, 200);
    let acts: Vec<Cycle> = issued
        .iter()
        .filter(|(_, c)| c.kind == CmdKind::Activate)
        .map(|(cycle, _)| *cycle)
        .collect();
    assert_eq!(acts.len(), 2);
    assert!(acts[1] - acts[0] >= timings.trrd);

    let reads: Vec<Cycle> = issued
        .iter()
        .filter(|(_, c)| c.kind == CmdKind::Read)
        .map(|(cycle, _)| *cycle)
        .collect();
    assert_eq!(reads.len(), 2);
    assert!(reads[1] - reads[0] >= timings.tccd);
}
