//! Debug info level policy

use std::fmt;

bitflags::bitflags! {
    /// Debug metadata a backend is asked to embed in a compiled module.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DebugInfoFlags: u8 {
        /// Full source text (and filename, if known) in the source record
        const EMBED_SOURCE = 1 << 0;
        /// Per-instruction line mapping
        const LINE_INFO = 1 << 1;
        /// Record of the processing steps the backend performed
        const PROCESSING_HISTORY = 1 << 2;
    }
}

/// How much debug info ends up in a compiled module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugInfoLevel {
    #[default]
    None,
    SourceAndLine,
}

impl DebugInfoLevel {
    /// Map a level string.
    ///
    /// Empty and `"0"` give no debug info, anything else gives source and
    /// line info. Strings other than `"1"` are accepted with a warning.
    pub fn resolve(level: &str) -> DebugInfoLevel {
        match level {
            "" | "0" => DebugInfoLevel::None,
            "1" => DebugInfoLevel::SourceAndLine,
            other => {
                log::warn!(
                    "Unrecognized debug info level {:?}, treating it as 1",
                    other
                );
                DebugInfoLevel::SourceAndLine
            }
        }
    }

    pub fn flags(self) -> DebugInfoFlags {
        match self {
            DebugInfoLevel::None => DebugInfoFlags::empty(),
            DebugInfoLevel::SourceAndLine => DebugInfoFlags::all(),
        }
    }
}

impl fmt::Display for DebugInfoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugInfoLevel::None => f.write_str("0"),
            DebugInfoLevel::SourceAndLine => f.write_str("1"),
        }
    }
}
