//! Output-to-progress mapping for PyInstaller runs.
//!
//! PyInstaller has no machine-readable progress, so progress is inferred from
//! a few words it prints while working. If a future PyInstaller stops printing
//! them, progress stays at [`DISPATCHED`] until the run finishes.

/// Worker has started.
pub const LAUNCHED: u8 = 10;
/// Command line built and handed to the OS.
pub const DISPATCHED: u8 = 20;
/// Process exited cleanly and the artifact was found.
pub const VERIFIED: u8 = 100;

/// A substring to look for in an output line and the percentage it maps to.
pub type Trigger = (&'static str, u8);

/// Checked in order; the first match wins.
pub const PYINSTALLER_TRIGGERS: &[Trigger] = &[
    ("Analyzing", 40),
    ("Processing", 60),
    ("Copying", 80),
    ("Building", 90),
];

/// Map one output line to a checkpoint using a trigger table.
///
/// Matching is case-sensitive.
pub fn match_trigger(triggers: &[Trigger], line: &str) -> Option<u8> {
    triggers
        .iter()
        .find(|(needle, _)| line.contains(needle))
        .map(|&(_, percent)| percent)
}

/// Keeps reported progress monotonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    percent: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported percentage.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Move to `percent` if that is ahead of the current value.
    ///
    /// Returns the new value when it changed, `None` otherwise.
    pub fn advance(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        if percent > self.percent {
            self.percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_trigger() {
        let table = PYINSTALLER_TRIGGERS;
        assert_eq!(match_trigger(table, "123 INFO: Analyzing base_library.zip"), Some(40));
        assert_eq!(match_trigger(table, "INFO: Processing module hooks..."), Some(60));
        assert_eq!(match_trigger(table, "INFO: Copying bootloader EXE"), Some(80));
        assert_eq!(match_trigger(table, "INFO: Building EXE from EXE-00.toc"), Some(90));
        assert_eq!(match_trigger(table, "INFO: PyInstaller: 6.1.0"), None);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert_eq!(match_trigger(PYINSTALLER_TRIGGERS, "analyzing lowercase"), None);
        assert_eq!(match_trigger(PYINSTALLER_TRIGGERS, "BUILDING"), None);
    }

    #[test]
    fn test_first_trigger_wins() {
        assert_eq!(
            match_trigger(PYINSTALLER_TRIGGERS, "Building after Analyzing"),
            Some(40)
        );
    }

    #[test]
    fn test_custom_table() {
        let table: &[Trigger] = &[("Compiling", 50)];
        assert_eq!(match_trigger(table, "Compiling foo"), Some(50));
        assert_eq!(match_trigger(table, "Analyzing foo"), None);
    }

    #[test]
    fn test_tracker_never_goes_back() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.advance(LAUNCHED), Some(10));
        assert_eq!(tracker.advance(DISPATCHED), Some(20));
        assert_eq!(tracker.advance(80), Some(80));
        assert_eq!(tracker.advance(40), None);
        assert_eq!(tracker.advance(80), None);
        assert_eq!(tracker.percent(), 80);
        assert_eq!(tracker.advance(250), Some(100));
    }
}
