use crate::Cycle;

/// A JEDEC timing parameter, given in nanoseconds, clock cycles, or both.
///
/// Spec files write these as `"15ns"`, `"10"`, or `"15ns,10"`. The
/// effective constraint is the stricter of the two representations:
/// `max(cycles, ceil(ns / tCK))`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    ns: f64,
    cycles: u32,
    set: bool,
}

impl Timing {
    /// Build a timing from an explicit cycle count (used by tests and defaults).
    pub const fn from_cycles(cycles: u32) -> Self {
        Self {
            ns: 0.0,
            cycles,
            set: true,
        }
    }

    /// Build a timing from a nanosecond value.
    pub const fn from_ns(ns: f64) -> Self {
        Self {
            ns,
            cycles: 0,
            set: true,
        }
    }

    /// Parse a spec-file value. Each comma-separated field is a cycle count
    /// unless it carries an `ns` suffix; at most two fields are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let fields: Vec<&str> = value.split(',').collect();
        if fields.len() > 2 {
            return None;
        }
        let mut timing = Self::default();
        for field in fields {
            if let Some(ns) = field.strip_suffix("ns") {
                timing.ns = ns.parse().ok()?;
            } else {
                timing.cycles = field.parse().ok()?;
            }
        }
        timing.set = true;
        Some(timing)
    }

    /// Whether a value has ever been assigned.
    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Effective cycle count for a clock period `tck` (nanoseconds).
    pub fn cycles(&self, tck: f64) -> Cycle {
        let from_ns = (self.ns / tck).ceil() as Cycle;
        Cycle::from(self.cycles).max(from_ns)
    }
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.set {
            write!(f, "N/A")
        } else if self.ns != 0.0 && self.cycles != 0 {
            write!(f, "{}ns,{}", self.ns, self.cycles)
        } else if self.ns != 0.0 {
            write!(f, "{}ns", self.ns)
        } else {
            write!(f, "{}", self.cycles)
        }
    }
}
