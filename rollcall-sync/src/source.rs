//! Roster source seam: whatever can list the guild's members.

use async_trait::async_trait;

use rollcall_core::RawMember;

use crate::error::SourceError;

/// Supplies the current member list of one guild.
///
/// Implementations return members in platform order with each member's role
/// names in platform order; the extractor's tie-break depends on it.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_members(&self) -> Result<Vec<RawMember>, SourceError>;
}
