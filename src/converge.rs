//! Fixed-point driver for the rewrite rules.
//!
//! Runs passes until one produces no change, with a hard cap so that a
//! pathological rule interaction can never loop forever.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::models::{CleaningResult, TextKind};
use crate::normalize::{run_pass, PassOutcome};

/// Maximum passes per input string.
pub const MAX_PASSES: u32 = 10;

/// Stem used when a file name cleans down to nothing.
pub const UNKNOWN_TRACK: &str = "Unknown Track";

/// Album used when the tag is missing, blank, or cleans down to nothing.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Drives a pass function to a fixed point.
pub struct Converger<F> {
    pass: F,
    max_passes: u32,
}

impl<F> Converger<F>
where
    F: Fn(&str) -> PassOutcome,
{
    pub fn new(pass: F) -> Self {
        Self {
            pass,
            max_passes: MAX_PASSES,
        }
    }

    pub fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Always runs at least one pass.
    pub fn run(&self, input: &str) -> CleaningResult {
        let mut current = input.to_string();
        let mut changed = false;
        let mut extracted_tokens = FxHashSet::default();
        let mut passes_run = 0;
        let mut converged = false;

        while passes_run < self.max_passes {
            passes_run += 1;
            let outcome = (self.pass)(&current);
            extracted_tokens.extend(outcome.extracted_tokens);
            if !outcome.changed {
                converged = true;
                break;
            }
            debug!(pass = passes_run, fired = ?outcome.fired, output = %outcome.text, "rules fired");
            changed = true;
            current = outcome.text;
        }

        if !converged {
            warn!(input, output = %current, passes = passes_run, "cleaning did not converge");
        }

        CleaningResult {
            final_text: current,
            changed,
            passes_run,
            extracted_tokens,
        }
    }
}

/// Clean a string with the standard rules.
pub fn clean_text(input: &str, kind: TextKind) -> CleaningResult {
    Converger::new(|s: &str| run_pass(s, kind)).run(input)
}

/// Clean a file stem; the result is never empty.
pub fn clean_file_stem(stem: &str) -> CleaningResult {
    with_placeholder(clean_text(stem, TextKind::FileName), UNKNOWN_TRACK)
}

/// Clean an album title into a grouping key and folder name; never empty.
pub fn clean_album_name(album: &str) -> CleaningResult {
    with_placeholder(clean_text(album, TextKind::AlbumFolder), UNKNOWN_ALBUM)
}

fn with_placeholder(mut result: CleaningResult, placeholder: &str) -> CleaningResult {
    if result.final_text.is_empty() {
        result.final_text = placeholder.to_string();
        result.changed = true;
    }
    result
}
