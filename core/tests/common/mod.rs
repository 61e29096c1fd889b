#![allow(dead_code)]

use ferrite_core::config::{CtrlConfig, DeviceConfig, Timing};

/// Controller configuration used across the integration tests: one
/// channel, 64-bit data bus, default queue depths.
pub fn test_ctrl() -> CtrlConfig {
    let mut ctrl = CtrlConfig::default();
    ctrl.chan_width = 64;
    ctrl.addr_map = "row,bank,rank,col".to_string();
    ctrl
}

/// A DDR3-flavoured x16 device with hand-checkable timing (tCK 1.25 ns):
/// 8 banks x 16384 rows x 1024 columns makes a 1024 MB rank at a 64-bit
/// channel width.
///
/// Effective cycle values: tRCD 10, tRP 10, tRPab 12, tRAS 28, tRC 40,
/// tCCD 4, tRRD 5, burst 4, RdToPre 4, WrToPre 20, RdToWr 9,
/// WrToRd(same) 15, WrToRd(diff) 3.
pub fn test_dev(ctrl: &CtrlConfig, size_mb: u64) -> DeviceConfig {
    let mut dev = DeviceConfig::default();
    dev.num_bank = 8;
    dev.num_row = 16384;
    dev.num_col = 1024;
    dev.width = 16;
    dev.tck = 1.25;
    dev.trefi = 7800.0;
    dev.bl = 8;
    dev.rl = 8;
    dev.wl = 6;
    dev.tccd = Timing::from_cycles(4);
    dev.trtp = Timing::from_cycles(4);
    dev.trcd = Timing::from_cycles(10);
    dev.trppb = Timing::from_cycles(10);
    dev.trpab = Timing::from_cycles(12);
    dev.tras = Timing::from_cycles(28);
    dev.twr = Timing::from_cycles(10);
    dev.twtr = Timing::from_cycles(5);
    dev.trrd = Timing::from_cycles(5);
    dev.tfaw = Timing::from_cycles(24);
    dev.tdqsck = Timing::from_cycles(2);
    dev.trfcab = Timing::from_cycles(88);
    dev.trfcpb = Timing::from_cycles(60);
    dev.tcmd = Timing::from_cycles(1);
    dev.derive(size_mb, ctrl).expect("test configuration derives");
    dev
}

/// Compose an address that decodes to `(row, bank, col)` under
/// `test_ctrl`'s single-channel `"row,bank,rank,col"` mapping: column
/// bits sit at 1..=10, bank bits at 11..=13, row bits at 14..=27.
pub fn compose_addr(row: u64, bank: u64, col: u64) -> u64 {
    (row << 14) | (bank << 11) | (col << 1)
}
