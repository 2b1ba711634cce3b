//! Rollcall core library — roster domain types and the pure reconciliation
//! logic.
//!
//! - [`types`] — members, team labels, OVR values, output rows
//! - [`catalog`] — national/club allow-lists and role prefixes
//! - [`roster`] — name cleaning, role classification, merge + dedup
//! - [`reference`] — reference worksheet window parsing

pub mod catalog;
pub mod reference;
pub mod roster;
pub mod types;

pub use catalog::TeamCatalog;
pub use reference::{ReferenceTable, ReferenceWindow};
pub use roster::{build_rows, classify_roles, clean_username, RosterStats};
pub use types::{Member, OutputRow, Ovr, RawMember, TeamLabel, TeamRecord, Username};
