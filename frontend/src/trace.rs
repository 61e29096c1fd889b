//! Trace-file parsing.
//!
//! A trace is one whitespace-separated record per line:
//!
//! ```text
//! <timestamp_ps> <R|W> 0x<addr_hex> <len> <priority> [opaque data ...]
//! ```
//!
//! Blank lines and `#` comments are skipped; malformed records are logged
//! and skipped. Timestamps are picoseconds and convert to controller
//! cycles through the controller frequency.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

use ferrite_core::mem::{Transaction, TxKind};
use ferrite_core::Cycle;
use log::warn;

/// One parsed trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub timestamp_ps: u64,
    pub kind: TxKind,
    pub addr: u64,
    pub len: u32,
    pub priority: u16,
}

/// Parse one trace line. Blank lines and comments return `None` silently;
/// malformed records warn and return `None`.
pub fn parse_record(line: &str) -> Option<TraceRecord> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let mut fields = trimmed.split_whitespace();

    let Some(timestamp_ps) = fields.next().and_then(|f| f.parse().ok()) else {
        warn!("failed to parse timestamp in '{line}'");
        return None;
    };

    let kind = match fields.next() {
        Some(rw) if rw.eq_ignore_ascii_case("r") => TxKind::Read,
        Some(rw) if rw.eq_ignore_ascii_case("w") => TxKind::Write,
        Some(rw) => {
            warn!("failed to parse R/W field '{rw}' in '{line}'");
            return None;
        }
        None => {
            warn!("insufficient fields in '{line}'");
            return None;
        }
    };

    let addr = match fields.next() {
        Some(hex) => {
            let Some(digits) = hex.strip_prefix("0x") else {
                warn!("address should be hex (starting with 0x) in '{line}'");
                return None;
            };
            match u64::from_str_radix(digits, 16) {
                Ok(addr) => addr,
                Err(_) => {
                    warn!("failed to parse starting address in '{line}'");
                    return None;
                }
            }
        }
        None => {
            warn!("insufficient fields in '{line}'");
            return None;
        }
    };

    let Some(len) = fields.next().and_then(|f| f.parse().ok()) else {
        warn!("failed to parse transaction size in '{line}'");
        return None;
    };

    let Some(priority) = fields.next().and_then(|f| f.parse().ok()) else {
        warn!("failed to parse priority level in '{line}'");
        return None;
    };

    // Remaining fields are opaque data; the simulator models no bytes.

    Some(TraceRecord {
        timestamp_ps,
        kind,
        addr,
        len,
        priority,
    })
}

/// Streams transactions out of a trace file, stamping each with a
/// monotonic id and its arrival cycle.
pub struct TraceReader {
    lines: Lines<BufReader<File>>,
    freq_mhz: u64,
    next_id: u64,
    done: bool,
}

impl TraceReader {
    pub fn open(path: &Path, freq_mhz: u64) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            freq_mhz,
            next_id: 0,
            done: false,
        })
    }

    /// Whether the trace has been fully consumed.
    pub fn done(&self) -> bool {
        self.done
    }

    /// The next transaction and the cycle it arrives on, skipping
    /// malformed lines.
    pub fn next_tx(&mut self) -> Option<(Cycle, Transaction)> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    warn!("trace read error: {err}");
                    continue;
                }
                None => {
                    self.done = true;
                    return None;
                }
            };
            let Some(record) = parse_record(&line) else {
                continue;
            };
            // Timestamp in picoseconds, frequency in MHz.
            let arrival = (record.timestamp_ps as f64 / 1e6 * self.freq_mhz as f64) as Cycle;
            let mut tx = Transaction::new(self.next_id, record.addr, record.len, record.kind);
            self.next_id += 1;
            if record.priority != 0 {
                tx.set_priority(record.priority);
            }
            return Some((arrival, tx));
        }
    }
}
