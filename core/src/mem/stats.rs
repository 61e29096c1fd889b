use super::command::{CmdKind, Command};

/// Aggregate per-channel counters, written out as one CSV row per channel
/// at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelStats {
    pub reads_admitted: u64,
    pub writes_admitted: u64,
    pub reads_completed: u64,
    pub writes_completed: u64,

    /// Page relation observed for each successfully dispatched transaction.
    pub page_hits: u64,
    pub page_misses: u64,
    pub page_conflicts: u64,

    /// Commands issued on the bus, by kind.
    pub read_cmds: u64,
    pub write_cmds: u64,
    pub act_cmds: u64,
    pub pre_cmds: u64,
}

impl ChannelStats {
    /// CSV column names matching [`ChannelStats::csv_row`].
    pub const CSV_HEADER: &'static str = "channel,reads_admitted,writes_admitted,\
        reads_completed,writes_completed,page_hits,page_misses,page_conflicts,\
        read_cmds,write_cmds,act_cmds,pre_cmds";

    pub(crate) fn count_issued(&mut self, cmd: &Command) {
        match cmd.kind {
            CmdKind::Read => self.read_cmds += 1,
            CmdKind::Write => self.write_cmds += 1,
            CmdKind::Activate => self.act_cmds += 1,
            CmdKind::Precharge => self.pre_cmds += 1,
            _ => {}
        }
    }

    /// Render one CSV row for channel `chan`.
    pub fn csv_row(&self, chan: u16) -> String {
        format!(
            "{chan},{},{},{},{},{},{},{},{},{},{},{}",
            self.reads_admitted,
            self.writes_admitted,
            self.reads_completed,
            self.writes_completed,
            self.page_hits,
            self.page_misses,
            self.page_conflicts,
            self.read_cmds,
            self.write_cmds,
            self.act_cmds,
            self.pre_cmds
        )
    }
}
