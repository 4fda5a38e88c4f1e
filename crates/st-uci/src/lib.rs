//! External collaborators that talk to processes: the engine itself (option
//! discovery over UCI) and cutechess-cli (match evaluation).

pub mod cutechess;
pub mod discovery;

pub use cutechess::{parse_score_line, CutechessEvaluator};
pub use discovery::{parse_uci_options, UciDiscovery, DEFAULT_DISCOVERY_TIMEOUT};
