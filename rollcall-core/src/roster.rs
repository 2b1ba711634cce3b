//! Roster extraction: name cleaning, role classification, and the merge that
//! turns platform members plus reference OVRs into output rows.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::TeamCatalog;
use crate::reference::ReferenceTable;
use crate::types::{Member, OutputRow, RawMember, TeamLabel, Username};

pub const UNKNOWN_USERNAME: &str = "Unknown";

static PAREN_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\(.*?\)").expect("static parenthesised-suffix pattern")
});

/// Strip every parenthesised segment (and the whitespace before it), then trim.
///
/// `"Alex (EU)"` becomes `"Alex"`. Missing names, and names that are nothing
/// but parenthesised segments, become `"Unknown"`.
pub fn clean_username(name: Option<&str>) -> Username {
    let cleaned = name
        .map(|raw| PAREN_SUFFIX.replace_all(raw, "").trim().to_string())
        .unwrap_or_default();
    if cleaned.is_empty() {
        Username::from(UNKNOWN_USERNAME)
    } else {
        Username(cleaned)
    }
}

/// First qualifying national and club role, in platform order.
pub fn classify_roles<S: AsRef<str>>(roles: &[S], catalog: &TeamCatalog) -> TeamLabel {
    let national = roles
        .iter()
        .find_map(|role| catalog.national_team(role.as_ref()))
        .map(str::to_string);
    let club = roles
        .iter()
        .find_map(|role| catalog.club_team(role.as_ref()))
        .map(str::to_string);
    TeamLabel::from_matches(national, club)
}

/// Counters describing what [`build_rows`] dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterStats {
    pub bots_skipped: usize,
    pub duplicates_dropped: usize,
}

/// Clean every non-bot member. Order is preserved.
pub fn extract_members(raw: &[RawMember]) -> (Vec<Member>, usize) {
    let mut bots = 0usize;
    let members = raw
        .iter()
        .filter(|member| {
            if member.bot {
                bots += 1;
            }
            !member.bot
        })
        .map(|member| Member {
            raw_name: member.display_name().map(str::to_string),
            username: clean_username(member.display_name()),
            roles: member.roles.clone(),
        })
        .collect();
    (members, bots)
}

/// Merge members with the reference table into output rows.
///
/// Usernames are deduplicated case-insensitively; the first occurrence wins
/// and later ones are dropped.
pub fn build_rows(
    raw: &[RawMember],
    catalog: &TeamCatalog,
    reference: &ReferenceTable,
) -> (Vec<OutputRow>, RosterStats) {
    let (members, bots_skipped) = extract_members(raw);
    let mut stats = RosterStats {
        bots_skipped,
        ..RosterStats::default()
    };

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.username.key()) {
            stats.duplicates_dropped += 1;
            continue;
        }
        let label = classify_roles(&member.roles, catalog);
        let ovr = reference.ovr_for(&member.username.0);
        rows.push(OutputRow {
            username: member.username,
            label,
            ovr,
        });
    }

    (rows, stats)
}
