//! Firmware version parsing and ordering.
//!
//! FortiOS reports versions as strings like `v5.6.3,build1547`. The
//! concurrent-session metric moved to a nested field in releases after 5.6,
//! so the comparison has to be semantic over the numeric components, never a
//! lexical string compare.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parses `"5.6"`, `"v5.6.3"`, or `"v5.6.3,build1547"`. Missing
    /// components default to zero.
    pub fn parse(raw: &str) -> Option<Self> {
        let numeric = raw.trim().trim_start_matches(['v', 'V']);
        let numeric = numeric.split([',', '-', '+']).next()?;
        let mut parts = numeric.split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.trim().parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.trim().parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor, patch })
    }

    /// Post-5.6 firmware nests the concurrent-session count under
    /// `session.current_usage`. 5.6 itself still reports the legacy
    /// top-level field; only strictly newer releases use the nested one.
    pub fn uses_nested_session_field(self) -> bool {
        self > Self::new(5, 6, 0)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
