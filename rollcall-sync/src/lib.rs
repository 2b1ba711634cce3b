//! # rollcall-sync
//!
//! One reconciliation pass: read the reference worksheet, fetch the guild
//! roster, merge, and write the output columns back.
//!
//! Call [`run_pass`] with a [`RosterSource`] and a [`SheetBackend`].
//! [`sheets::GoogleSheets`] is the production backend.

pub mod error;
pub mod layout;
pub mod pass;
pub mod sheets;
pub mod source;

pub use error::{SheetError, SourceError, SyncError};
pub use layout::{OutputColumn, OutputField, SheetLayout};
pub use pass::{run_pass, PassMode, PassReport, WriteResult};
pub use sheets::{SheetBackend, SheetTarget};
pub use source::RosterSource;
