//! Parameters structure for the autonomous sequencer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Script executed on entry to autonomous. A relative path is relative to the software root.
    pub script_path: PathBuf,

    /// Scripts longer than this fail to load.
    pub max_script_lines: usize,

    /// Granularity of every wait while paused.
    ///
    /// Units: seconds
    pub pause_poll_s: f64,

    /// Granularity of the DELAY statement.
    ///
    /// Units: seconds
    pub delay_step_s: f64,

    /// How often a round trip checks whether it should be abandoned.
    ///
    /// Units: seconds
    pub response_poll_s: f64,

    // ---- DEFAULT TIMEOUTS ----
    /// Units: seconds
    pub mmove_timeout_s: f64,

    /// Units: seconds
    pub turn_timeout_s: f64,

    /// Units: seconds
    pub search_timeout_s: f64,

    /// Units: seconds
    pub range_timeout_s: f64,

    /// Units: seconds
    pub intake_timeout_s: f64,

    /// Duration given to STARTDRIVEFWD/BCK, which drive until told otherwise.
    ///
    /// Units: seconds
    pub drive_forever_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("scripts/auto.txt"),
            max_script_lines: 150,
            pause_poll_s: 0.02,
            delay_step_s: 0.01,
            response_poll_s: 0.01,
            mmove_timeout_s: 5.0,
            turn_timeout_s: 3.0,
            search_timeout_s: 4.0,
            range_timeout_s: 4.0,
            intake_timeout_s: 3.0,
            drive_forever_s: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::auto::token::match_token;
    use util::script::{Line, Script};

    #[test]
    fn test_shipped_files() {
        let params: Params =
            util::params::parse(include_str!("../../../params/autonomous.toml")).unwrap();
        assert_eq!(params.script_path, PathBuf::from("scripts/auto.txt"));

        // Every statement in the shipped script is in the vocabulary
        let script = Script::from_text(
            include_str!("../../../scripts/auto.txt"),
            params.max_script_lines,
        )
        .unwrap();
        let mut num_statements = 0;
        for idx in 0..script.len() {
            if let Some(Line::Tokens(tokens)) = script.line(idx) {
                assert!(match_token(tokens[0]).is_some(), "{:?}", tokens);
                num_statements += 1;
            }
        }
        assert!(num_statements > 0);
    }
}
