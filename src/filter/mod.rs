//! Candidate file filtering
//!
//! A candidate is a file URL plus the visible text of the link that pointed
//! at it. Rules are combined with AND and evaluated cheapest first:
//! extension, excluded site, exclusion terms, inclusion terms, and finally
//! the declared-size probe, which is the only rule that touches the network.

mod probe;
mod rules;

pub use probe::{HttpSizeProbe, NoSizeProbe, SizeProbe};
pub use rules::{FilterRules, Rejection};
