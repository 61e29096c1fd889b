use log::debug;

use crate::config::{ConfigError, CtrlConfig, DeviceConfig};

/// A decoded physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramAddr {
    pub chan: u32,
    pub rank: u32,
    pub bank: u32,
    pub row: u32,
    pub col: u32,
}

/// Decodes physical addresses into (channel, rank, bank, row, column).
///
/// Each dimension is a sequence of bit positions in the 64-bit address,
/// recorded least-significant-first. The channel bits are a contiguous run
/// starting at the controller's interleave bit; the low `log2(BL)` column
/// bits sit directly above the intra-device byte offset because DRAM is
/// accessed in bursts. The remaining positions are handed out by the
/// `ADDR_MAP` pattern string, parsed right to left.
///
/// After construction the mapping is a pure function: `map` allocates
/// nothing and only gathers bits.
#[derive(Debug, Clone)]
pub struct AddressMap {
    chan_bits: Vec<u32>,
    rank_bits: Vec<u32>,
    bank_bits: Vec<u32>,
    row_bits: Vec<u32>,
    col_bits: Vec<u32>,
}

/// Integer log2 for dimension counts; a count of 1 (or 0) takes no bits.
fn log2(n: u32) -> u32 {
    if n <= 1 { 0 } else { n.ilog2() }
}

/// Advance a bit position by one, skipping over the contiguous channel run
/// if it is entered.
fn increment(pos: &mut u32, chan_bits: &[u32]) {
    loop {
        *pos += 1;
        let in_chan_run = match (chan_bits.first(), chan_bits.last()) {
            (Some(&lo), Some(&hi)) => *pos >= lo && *pos <= hi,
            _ => false,
        };
        if !in_chan_run {
            break;
        }
    }
}

/// Take `count` fresh positions for one dimension.
fn fill(bits: &mut Vec<u32>, count: usize, pos: &mut u32, chan_bits: &[u32]) {
    for _ in 0..count {
        bits.push(*pos);
        increment(pos, chan_bits);
    }
}

impl AddressMap {
    /// Build the bit-position sequences from the controller's mapping
    /// string and the device geometry.
    pub fn new(ctrl: &CtrlConfig, dev: &DeviceConfig) -> Result<Self, ConfigError> {
        if dev.width % 8 != 0 {
            return Err(ConfigError::AddrMap(
                "device width must be a multiple of a byte".to_string(),
            ));
        }

        let mut chan_bits = Vec::new();
        let mut rank_bits = Vec::new();
        let mut bank_bits = Vec::new();
        let mut row_bits = Vec::new();
        let mut col_bits = Vec::new();

        // Skip the intra-device byte offset.
        let mut cur_pos = log2(dev.width / 8);

        // Assign the channel bits as one contiguous run at the interleave
        // bit, stepping cur_pos past any collision.
        let mut chan_bit = ctrl.chan_itlv_bit;
        for _ in 0..log2(ctrl.num_chan) {
            if cur_pos == chan_bit {
                cur_pos += 1;
            }
            chan_bits.push(chan_bit);
            chan_bit += 1;
        }

        // The low column bits address beats within a burst.
        fill(&mut col_bits, log2(dev.bl) as usize, &mut cur_pos, &chan_bits);

        // Parse the mapping scheme from right to left.
        for pattern in ctrl.addr_map.rsplit(',') {
            let (name, log_count, bits) = if pattern.starts_with("rank") {
                ("rank", log2(dev.num_rank), &mut rank_bits)
            } else if pattern.starts_with("bank") {
                ("bank", log2(dev.num_bank), &mut bank_bits)
            } else if pattern.starts_with("row") {
                ("row", log2(dev.num_row), &mut row_bits)
            } else if pattern.starts_with("col") {
                ("col", log2(dev.num_col), &mut col_bits)
            } else {
                // Unrecognized patterns are skipped silently.
                continue;
            };

            let remaining = (log_count as usize).saturating_sub(bits.len());
            let suffix = &pattern[name.len()..];
            let to_fill = if suffix.is_empty() {
                remaining
            } else {
                let count: usize = suffix.parse().map_err(|_| {
                    ConfigError::AddrMap(format!("{name} bit pattern '{pattern}' is not valid"))
                })?;
                if count > remaining {
                    return Err(ConfigError::AddrMap(format!(
                        "specified number of {name} bits is too large"
                    )));
                }
                count
            };
            fill(bits, to_fill, &mut cur_pos, &chan_bits);
        }

        for (name, bits) in [
            ("channel", &chan_bits),
            ("rank", &rank_bits),
            ("bank", &bank_bits),
            ("row", &row_bits),
            ("column", &col_bits),
        ] {
            if bits.len() > 32 {
                return Err(ConfigError::AddrMap(format!(
                    "the {name} segment is beyond the 32-bit design limit"
                )));
            }
        }

        Ok(Self {
            chan_bits,
            rank_bits,
            bank_bits,
            row_bits,
            col_bits,
        })
    }

    /// Decode a physical address into its memory address segments.
    pub fn map(&self, addr: u64) -> DramAddr {
        DramAddr {
            chan: extract(addr, &self.chan_bits),
            rank: extract(addr, &self.rank_bits),
            bank: extract(addr, &self.bank_bits),
            row: extract(addr, &self.row_bits),
            col: extract(addr, &self.col_bits),
        }
    }

    /// Log the recorded bit positions of every dimension.
    pub fn log_layout(&self) {
        for (name, bits) in [
            ("channel", &self.chan_bits),
            ("rank", &self.rank_bits),
            ("bank", &self.bank_bits),
            ("row", &self.row_bits),
            ("column", &self.col_bits),
        ] {
            if !bits.is_empty() {
                debug!("  {name} bits: {bits:?}");
            }
        }
    }
}

/// Gather the bits at `positions` into a value, `positions[0]` as the LSB.
fn extract(addr: u64, positions: &[u32]) -> u32 {
    let mut ret = 0u32;
    for &pos in positions.iter().rev() {
        ret = (ret << 1) | ((addr >> pos) & 1) as u32;
    }
    ret
}
