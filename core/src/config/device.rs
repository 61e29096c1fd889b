use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{ConfigError, SetResult, Timing, check_extension, read_file};
use crate::Cycle;
use crate::config::CtrlConfig;

/// DRAM device configuration, read from a `.spec` file.
///
/// The `.spec` file carries the device geometry and the JEDEC timing set.
/// It further names an IDD model and an I/O model; `"default"` resolves to
/// `idd/default/<MEM_TYPE>_default.idd` and `io/default/<MEM_TYPE>_default.io`
/// relative to the working directory. The power-model values are parsed and
/// stored but not consumed by the simulation core, so a missing auxiliary
/// file is a warning rather than an error.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Memory type, e.g. "ddr3", "lpddr2".
    pub mem_type: String,

    /// Geometry: banks, rows, columns per bank, device width in bits.
    pub num_bank: u32,
    pub num_row: u32,
    pub num_col: u32,
    pub width: u32,

    /// Clock period, unit: ns.
    pub tck: f64,

    /// Refresh interval, unit: ns.
    pub trefi: f64,

    /// Burst length.
    pub bl: u32,

    /// Data rate: 1 = SDR, 2 = DDR.
    pub data_rate: u32,

    /// Read, write, and additive (posted-CAS) latency, unit: cycles.
    pub rl: u32,
    pub wl: u32,
    pub al: u32,

    // JEDEC timing parameters.
    pub tccd: Timing,
    pub trtp: Timing,
    pub trcd: Timing,
    pub trppb: Timing,
    pub trpab: Timing,
    pub tras: Timing,
    pub twr: Timing,
    pub twtr: Timing,
    pub trrd: Timing,
    pub tfaw: Timing,
    pub tdqsck: Timing,
    pub tdqss: Timing,
    pub trfcab: Timing,
    pub trfcpb: Timing,
    pub tcmd: Timing,

    /// Supply voltages. The second set is only meaningful for parts with a
    /// split rail (e.g. LPDDRx).
    pub vdd: f64,
    pub vdd_2: f64,

    /// IDD / I/O model file names ("default" selects a per-MEM_TYPE file).
    pub idd_model: String,
    pub io_model: String,

    // IDD current values, one set per supply rail.
    pub idd0: f64,
    pub idd1: f64,
    pub idd2p: f64,
    pub idd2n: f64,
    pub idd3p: f64,
    pub idd3n: f64,
    pub idd4r: f64,
    pub idd4w: f64,
    pub idd5: f64,
    pub idd6: f64,
    pub idd7: f64,
    pub idd0_2: f64,
    pub idd1_2: f64,
    pub idd2p_2: f64,
    pub idd2n_2: f64,
    pub idd3p_2: f64,
    pub idd3n_2: f64,
    pub idd4r_2: f64,
    pub idd4w_2: f64,
    pub idd5_2: f64,
    pub idd6_2: f64,
    pub idd7_2: f64,

    // I/O power-model parameters.
    pub dq_per_strobe: u32,
    pub num_cmd_bit: u32,
    pub num_addr_bit: u32,
    pub vdd_io: f64,
    pub c_line: f64,
    pub c_mem_dq: f64,
    pub c_mem_cmd: f64,
    pub c_mem_addr: f64,
    pub c_mem_clk: f64,
    pub c_ctrl_dq: f64,
    pub c_ctrl_cmd: f64,
    pub c_ctrl_addr: f64,
    pub c_ctrl_clk: f64,

    // Derived by `derive()` once the channel capacity is known.
    /// Number of ranks on the channel.
    pub num_rank: u32,
    /// Number of devices per rank.
    pub num_device: u32,
    /// Minimum access length, unit: byte.
    pub mal: u32,

    filled: BTreeSet<&'static str>,
}

/// Parameters that must be filled before the simulation can run. Keys with
/// defaults count as filled; power-model values are optional.
const REQUIRED: &[&str] = &[
    "MEM_TYPE",
    "NUM_BANK",
    "NUM_ROW",
    "NUM_COL",
    "DEVICE_WIDTH",
    "TCK",
    "TREFI",
    "BL",
    "DATA_RATE",
    "RL",
    "WL",
    "AL",
    "TCCD",
    "TRTP",
    "TRCD",
    "TRPPB",
    "TRPAB",
    "TRAS",
    "TWR",
    "TWTR",
    "TRRD",
    "TFAW",
    "TDQSCK",
    "TDQSS",
    "TRFCAB",
    "TRFCPB",
    "TCMD",
];

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mem_type: "ddr3".to_string(),
            num_bank: 0,
            num_row: 0,
            num_col: 0,
            width: 0,
            tck: 0.0,
            trefi: 0.0,
            bl: 0,
            data_rate: 2,
            rl: 0,
            wl: 0,
            al: 0,
            tccd: Timing::default(),
            trtp: Timing::default(),
            trcd: Timing::default(),
            trppb: Timing::default(),
            trpab: Timing::default(),
            tras: Timing::default(),
            twr: Timing::default(),
            twtr: Timing::default(),
            trrd: Timing::default(),
            tfaw: Timing::default(),
            tdqsck: Timing::default(),
            tdqss: Timing::from_cycles(0),
            trfcab: Timing::default(),
            trfcpb: Timing::default(),
            tcmd: Timing::default(),
            vdd: 0.0,
            vdd_2: 0.0,
            idd_model: "default".to_string(),
            io_model: "default".to_string(),
            idd0: 0.0,
            idd1: 0.0,
            idd2p: 0.0,
            idd2n: 0.0,
            idd3p: 0.0,
            idd3n: 0.0,
            idd4r: 0.0,
            idd4w: 0.0,
            idd5: 0.0,
            idd6: 0.0,
            idd7: 0.0,
            idd0_2: 0.0,
            idd1_2: 0.0,
            idd2p_2: 0.0,
            idd2n_2: 0.0,
            idd3p_2: 0.0,
            idd3n_2: 0.0,
            idd4r_2: 0.0,
            idd4w_2: 0.0,
            idd5_2: 0.0,
            idd6_2: 0.0,
            idd7_2: 0.0,
            dq_per_strobe: 0,
            num_cmd_bit: 0,
            num_addr_bit: 0,
            vdd_io: 0.0,
            c_line: 0.0,
            c_mem_dq: 0.0,
            c_mem_cmd: 0.0,
            c_mem_addr: 0.0,
            c_mem_clk: 0.0,
            c_ctrl_dq: 0.0,
            c_ctrl_cmd: 0.0,
            c_ctrl_addr: 0.0,
            c_ctrl_clk: 0.0,
            num_rank: 0,
            num_device: 0,
            mal: 0,
            filled: BTreeSet::from(["MEM_TYPE", "DATA_RATE", "AL", "TDQSS"]),
        }
    }
}

impl DeviceConfig {
    /// Read a device configuration from a `.spec` file, then pull in the
    /// IDD and I/O model files it names.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("reading device configuration from {}", path.display());
        check_extension(path, "spec")?;
        let mut cfg = Self::default();
        read_file(path, |key, value| cfg.apply(key, value))?;

        let idd_path = cfg.aux_path("idd", &cfg.idd_model);
        if let Err(err) = read_file(&idd_path, |key, value| cfg.apply(key, value)) {
            warn!("skipping IDD model: {err}");
        }
        let io_path = cfg.aux_path("io", &cfg.io_model);
        if let Err(err) = read_file(&io_path, |key, value| cfg.apply(key, value)) {
            warn!("skipping I/O model: {err}");
        }

        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Resolve an auxiliary model file name under `dir` ("idd" or "io").
    fn aux_path(&self, dir: &str, model: &str) -> PathBuf {
        if model == "default" {
            PathBuf::from(dir)
                .join("default")
                .join(format!("{}_default.{dir}", self.mem_type.to_ascii_uppercase()))
        } else {
            PathBuf::from(dir).join(model)
        }
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
        macro_rules! timing {
            ($field:expr) => {
                match Timing::parse(value) {
                    Some(t) => $field = t,
                    None => return SetResult::BadValue,
                }
            };
        }
        match key {
            "MEM_TYPE" => self.mem_type = value.to_string(),
            "NUM_BANK" => parse!(self.num_bank),
            "NUM_ROW" => parse!(self.num_row),
            "NUM_COL" => parse!(self.num_col),
            "DEVICE_WIDTH" => parse!(self.width),
            "TCK" => parse!(self.tck),
            "TREFI" => parse!(self.trefi),
            "BL" => parse!(self.bl),
            "DATA_RATE" => parse!(self.data_rate),
            "RL" => parse!(self.rl),
            "WL" => parse!(self.wl),
            "AL" => parse!(self.al),
            "TCCD" => timing!(self.tccd),
            "TRTP" => timing!(self.trtp),
            "TRCD" => timing!(self.trcd),
            "TRPPB" => timing!(self.trppb),
            "TRPAB" => timing!(self.trpab),
            "TRAS" => timing!(self.tras),
            "TWR" => timing!(self.twr),
            "TWTR" => timing!(self.twtr),
            "TRRD" => timing!(self.trrd),
            "TFAW" => timing!(self.tfaw),
            "TDQSCK" => timing!(self.tdqsck),
            "TDQSS" => timing!(self.tdqss),
            "TRFCAB" => timing!(self.trfcab),
            "TRFCPB" => timing!(self.trfcpb),
            "TCMD" => timing!(self.tcmd),
            "VDD" => parse!(self.vdd),
            "VDD_2" => parse!(self.vdd_2),
            "IDD_MODEL" => self.idd_model = value.to_string(),
            "IO_MODEL" => self.io_model = value.to_string(),
            "IDD0" => parse!(self.idd0),
            "IDD1" => parse!(self.idd1),
            "IDD2P" => parse!(self.idd2p),
            "IDD2N" => parse!(self.idd2n),
            "IDD3P" => parse!(self.idd3p),
            "IDD3N" => parse!(self.idd3n),
            "IDD4R" => parse!(self.idd4r),
            "IDD4W" => parse!(self.idd4w),
            "IDD5" => parse!(self.idd5),
            "IDD6" => parse!(self.idd6),
            "IDD7" => parse!(self.idd7),
            "IDD0_2" => parse!(self.idd0_2),
            "IDD1_2" => parse!(self.idd1_2),
            "IDD2P_2" => parse!(self.idd2p_2),
            "IDD2N_2" => parse!(self.idd2n_2),
            "IDD3P_2" => parse!(self.idd3p_2),
            "IDD3N_2" => parse!(self.idd3n_2),
            "IDD4R_2" => parse!(self.idd4r_2),
            "IDD4W_2" => parse!(self.idd4w_2),
            "IDD5_2" => parse!(self.idd5_2),
            "IDD6_2" => parse!(self.idd6_2),
            "IDD7_2" => parse!(self.idd7_2),
            "DQ_PER_STROBE" => parse!(self.dq_per_strobe),
            "NUM_CMD_BIT" => parse!(self.num_cmd_bit),
            "NUM_ADDR_BIT" => parse!(self.num_addr_bit),
            "VDD_IO" => parse!(self.vdd_io),
            "C_LINE" => parse!(self.c_line),
            "C_MEM_DQ" => parse!(self.c_mem_dq),
            "C_MEM_CMD" => parse!(self.c_mem_cmd),
            "C_MEM_ADDR" => parse!(self.c_mem_addr),
            "C_MEM_CLK" => parse!(self.c_mem_clk),
            "C_CTRL_DQ" => parse!(self.c_ctrl_dq),
            "C_CTRL_CMD" => parse!(self.c_ctrl_cmd),
            "C_CTRL_ADDR" => parse!(self.c_ctrl_addr),
            "C_CTRL_CLK" => parse!(self.c_ctrl_clk),
            _ => return SetResult::UnknownKey,
        }
        if let Some(name) = REQUIRED.iter().copied().find(|p| *p == key) {
            self.filled.insert(name);
        }
        SetResult::Ok
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        for &name in REQUIRED {
            if !self.filled.contains(name) {
                return Err(ConfigError::MissingParam {
                    path: path.to_path_buf(),
                    name,
                });
            }
        }
        for (name, value) in [
            ("NUM_BANK", self.num_bank),
            ("NUM_ROW", self.num_row),
            ("NUM_COL", self.num_col),
            ("BL", self.bl),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a power of two, got {value}"
                )));
            }
        }
        if self.data_rate == 0 || self.tck <= 0.0 {
            return Err(ConfigError::Invalid(
                "DATA_RATE and tCK must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Derive the per-channel parameters once the channel capacity is
    /// known: the minimum access length, the rank count that fills
    /// `size_mb`, and the number of devices forming the channel width.
    pub fn derive(&mut self, size_mb: u64, ctrl: &CtrlConfig) -> Result<(), ConfigError> {
        let mal_bits = ctrl.chan_width * self.bl;
        if mal_bits % 8 != 0 {
            return Err(ConfigError::Invalid(
                "minimum access length has to be a whole number of bytes".to_string(),
            ));
        }
        self.mal = mal_bits / 8;

        let rank_bytes = u64::from(self.num_row)
            * u64::from(self.num_col)
            * u64::from(self.num_bank)
            * u64::from(ctrl.chan_width)
            / 8;
        let rank_mb = rank_bytes >> 20;
        if rank_mb == 0 || size_mb % rank_mb != 0 {
            return Err(ConfigError::Invalid(format!(
                "channel capacity of {size_mb}MB cannot be partitioned into {rank_mb}MB ranks"
            )));
        }
        self.num_rank = (size_mb / rank_mb) as u32;

        if ctrl.chan_width % self.width != 0 {
            return Err(ConfigError::Invalid(format!(
                "channel width of {} cannot be formed from {}-bit devices",
                ctrl.chan_width, self.width
            )));
        }
        self.num_device = ctrl.chan_width / self.width;

        Ok(())
    }

    /// Snapshot the effective cycle counts the bank state machines need.
    pub fn timings(&self) -> Timings {
        let tck = self.tck;
        let burst = Cycle::from(self.bl / self.data_rate);
        let al = Cycle::from(self.al);
        let rl = Cycle::from(self.rl);
        let wl = Cycle::from(self.wl);
        // tCCD can never be shorter than the burst occupies the bus.
        let tccd = self.tccd.cycles(tck).max(burst);
        let trtp = self.trtp.cycles(tck);
        let trcd = self.trcd.cycles(tck);
        let trp = self.trppb.cycles(tck);
        let trpab = self.trpab.cycles(tck);
        let tras = self.tras.cycles(tck);
        let twr = self.twr.cycles(tck);
        let twtr = self.twtr.cycles(tck);
        let tdqsck = self.tdqsck.cycles(tck);
        let tdqss = self.tdqss.cycles(tck);

        Timings {
            trcd,
            trp,
            tras,
            trc: tras + trpab,
            trrd: self.trrd.cycles(tck),
            tccd,
            burst,
            act_to_rw: trcd.saturating_sub(al),
            rd_to_pre: al + burst + trtp.max(tccd) - tccd,
            wr_to_pre: wl + burst + twr + tdqss,
            rd_to_wr: (rl + burst + 1 + tdqsck).max(wl) - wl,
            wr_to_rd_same: wl + burst + twtr + tdqss,
            wr_to_rd_diff: (wl + burst + 1).max(rl) - rl + tdqss,
        }
    }
}

/// Effective cycle counts derived from a [`DeviceConfig`], snapshotted once
/// at init and copied into every bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Row-to-column delay.
    pub trcd: Cycle,
    /// Per-bank row precharge.
    pub trp: Cycle,
    /// Row active time.
    pub tras: Cycle,
    /// Row cycle: tRAS + tRPab.
    pub trc: Cycle,
    /// Activate-to-activate, different banks of one rank.
    pub trrd: Cycle,
    /// Column-to-column, same rank.
    pub tccd: Cycle,
    /// Bus beats of one burst: BL / data rate.
    pub burst: Cycle,
    /// ACTIVATE to first READ/WRITE: tRCD - AL.
    pub act_to_rw: Cycle,
    /// READ to PRECHARGE on the same bank.
    pub rd_to_pre: Cycle,
    /// WRITE to PRECHARGE on the same bank.
    pub wr_to_pre: Cycle,
    /// READ to WRITE turnaround.
    pub rd_to_wr: Cycle,
    /// WRITE to READ turnaround, same rank.
    pub wr_to_rd_same: Cycle,
    /// WRITE to READ turnaround, across ranks.
    pub wr_to_rd_diff: Cycle,
}
