use std::collections::BTreeSet;
use std::path::Path;

use log::info;

use super::{ConfigError, SetResult, check_extension, read_file};

/// Memory-controller configuration, read from a `.ctrl` file.
///
/// Recognised keys: `CTRL_FREQ`, `NUM_CHAN`, `CHAN_INTERLEAVE_BIT`,
/// `DATA_BUS_BIT`, `READ_TRANS_QUEUE`, `WRITE_TRANS_QUEUE`, `CMD_QUEUE`,
/// `ADDR_MAP`. `DATA_BUS_BIT` and `ADDR_MAP` have no defaults and must be
/// present in the file.
#[derive(Debug, Clone)]
pub struct CtrlConfig {
    /// Controller frequency, unit: MHz.
    pub ctrl_freq: u32,

    /// Number of channels.
    pub num_chan: u32,

    /// Channel interleave bit (LSB). Bit 10 = 2 KiB interleaving.
    pub chan_itlv_bit: u32,

    /// Channel data-bus width, unit: bit.
    pub chan_width: u32,

    /// Max transaction queue depths.
    pub max_rd_queue_depth: usize,
    pub max_wr_queue_depth: usize,

    /// Max command queue depth.
    pub max_cmd_queue_depth: usize,

    /// Address mapping scheme, a comma-separated pattern list parsed right
    /// to left (e.g. `"row,bank,rank,col"`).
    pub addr_map: String,

    filled: BTreeSet<&'static str>,
}

/// Every key the parser recognises; all of them must end up filled
/// (defaults count as filled).
const PARAMS: &[&str] = &[
    "CTRL_FREQ",
    "NUM_CHAN",
    "CHAN_INTERLEAVE_BIT",
    "DATA_BUS_BIT",
    "READ_TRANS_QUEUE",
    "WRITE_TRANS_QUEUE",
    "CMD_QUEUE",
    "ADDR_MAP",
];

impl Default for CtrlConfig {
    fn default() -> Self {
        Self {
            ctrl_freq: 800,
            num_chan: 1,
            chan_itlv_bit: 10,
            chan_width: 0,
            max_rd_queue_depth: 8,
            max_wr_queue_depth: 8,
            max_cmd_queue_depth: 16,
            addr_map: String::new(),
            filled: BTreeSet::from([
                "CTRL_FREQ",
                "NUM_CHAN",
                "CHAN_INTERLEAVE_BIT",
                "READ_TRANS_QUEUE",
                "WRITE_TRANS_QUEUE",
                "CMD_QUEUE",
            ]),
        }
    }
}

impl CtrlConfig {
    /// Read a controller configuration from a `.ctrl` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("reading controller configuration from {}", path.display());
        check_extension(path, "ctrl")?;
        let mut cfg = Self::default();
        read_file(path, |key, value| cfg.apply(key, value))?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    fn apply(&mut self, key: &str, value: &str) -> SetResult {
        macro_rules! parse {
            ($field:expr) => {
                match value.parse() {
                    Ok(v) => $field = v,
                    Err(_) => return SetResult::BadValue,
                }
            };
        }
        match key {
            "CTRL_FREQ" => parse!(self.ctrl_freq),
            "NUM_CHAN" => parse!(self.num_chan),
            "CHAN_INTERLEAVE_BIT" => parse!(self.chan_itlv_bit),
            "DATA_BUS_BIT" => parse!(self.chan_width),
            "READ_TRANS_QUEUE" => parse!(self.max_rd_queue_depth),
            "WRITE_TRANS_QUEUE" => parse!(self.max_wr_queue_depth),
            "CMD_QUEUE" => parse!(self.max_cmd_queue_depth),
            "ADDR_MAP" => self.addr_map = value.to_string(),
            _ => return SetResult::UnknownKey,
        }
        if let Some(name) = PARAMS.iter().copied().find(|p| *p == key) {
            self.filled.insert(name);
        }
        SetResult::Ok
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        for &name in PARAMS {
            if !self.filled.contains(name) {
                return Err(ConfigError::MissingParam {
                    path: path.to_path_buf(),
                    name,
                });
            }
        }
        if !self.num_chan.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "NUM_CHAN must be a power of two, got {}",
                self.num_chan
            )));
        }
        Ok(())
    }
}
