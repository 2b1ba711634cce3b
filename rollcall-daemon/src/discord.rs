//! Discord adapter: REST roster reads and gateway member events.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ApplicationId, Client, Context, EventHandler, GatewayIntents, GuildId, GuildMemberUpdateEvent,
    Http, Member, Ready, RoleId, User, UserId,
};
use tokio::sync::{mpsc, watch};

use rollcall_core::RawMember;
use rollcall_sync::{RosterSource, SourceError};

use crate::config::DaemonConfig;
use crate::error::DaemonError;

/// Discord's maximum page size for the guild member list.
const MEMBER_PAGE_SIZE: u64 = 1000;

/// Reads the configured guild's members over the REST API.
#[derive(Clone)]
pub struct DiscordRoster {
    http: Arc<Http>,
    guild_id: GuildId,
}

impl DiscordRoster {
    pub fn new(http: Arc<Http>, guild_id: u64) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
        }
    }

    /// Role id → name, plus a sort key matching the guild's hierarchy.
    async fn role_names(&self) -> Result<HashMap<RoleId, (u16, String)>, SourceError> {
        let roles = self
            .guild_id
            .roles(&self.http)
            .await
            .map_err(|err| self.source_error(err))?;
        Ok(roles
            .into_iter()
            .map(|(id, role)| (id, (role.position, role.name)))
            .collect())
    }

    fn source_error(&self, err: serenity::Error) -> SourceError {
        if let serenity::Error::Http(http_err) = &err {
            if let Some(status) = http_err.status_code() {
                if matches!(status.as_u16(), 403 | 404) {
                    return SourceError::GuildNotFound {
                        guild_id: self.guild_id.get(),
                    };
                }
            }
        }
        SourceError::Platform(err.to_string())
    }
}

#[async_trait]
impl RosterSource for DiscordRoster {
    async fn fetch_members(&self) -> Result<Vec<RawMember>, SourceError> {
        let roles = self.role_names().await?;

        let mut members = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let page = self
                .guild_id
                .members(&self.http, Some(MEMBER_PAGE_SIZE), after)
                .await
                .map_err(|err| self.source_error(err))?;
            let page_len = page.len();
            after = page.last().map(|member| member.user.id);
            members.extend(page.iter().map(|member| to_raw_member(member, &roles)));
            if (page_len as u64) < MEMBER_PAGE_SIZE {
                break;
            }
        }

        tracing::debug!("fetched {} members of guild {}", members.len(), self.guild_id);
        Ok(members)
    }
}

fn to_raw_member(member: &Member, roles: &HashMap<RoleId, (u16, String)>) -> RawMember {
    let mut known: Vec<(RoleId, &(u16, String))> = member
        .roles
        .iter()
        .filter_map(|id| roles.get(id).map(|role| (*id, role)))
        .collect();
    known.sort_by(|a, b| compare_roles((a.1 .0, a.0.get()), (b.1 .0, b.0.get())));

    RawMember {
        nick: member.nick.clone(),
        name: Some(member.user.name.clone()),
        bot: member.user.bot,
        roles: known.into_iter().map(|(_, (_, name))| name.clone()).collect(),
    }
}

/// Lowest position first, ties broken by id.
fn compare_roles(a: (u16, u64), b: (u16, u64)) -> Ordering {
    a.cmp(&b)
}

/// A membership change in the configured guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEvent {
    Updated { user_id: u64 },
    Joined { user_id: u64 },
    Left { user_id: u64 },
}

/// Gateway event handler: flags readiness and forwards member events.
pub struct GatewayBridge {
    guild_id: GuildId,
    events: mpsc::UnboundedSender<MemberEvent>,
    ready: watch::Sender<bool>,
}

impl GatewayBridge {
    pub fn new(
        guild_id: u64,
        events: mpsc::UnboundedSender<MemberEvent>,
        ready: watch::Sender<bool>,
    ) -> Self {
        Self {
            guild_id: GuildId::new(guild_id),
            events,
            ready,
        }
    }

    fn forward(&self, guild_id: GuildId, event: MemberEvent) {
        if guild_id != self.guild_id {
            tracing::trace!(guild = %guild_id, ?event, "ignoring event from other guild");
            return;
        }
        if self.events.send(event).is_err() {
            tracing::warn!("member event dropped: runtime is shutting down");
        }
    }
}

#[async_trait]
impl EventHandler for GatewayBridge {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!("logged in as {}", ready.user.name);
        self.ready.send_replace(true);
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        _old: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        tracing::info!("member updated: {}", event.user.name);
        self.forward(
            event.guild_id,
            MemberEvent::Updated {
                user_id: event.user.id.get(),
            },
        );
    }

    async fn guild_member_addition(&self, _ctx: Context, member: Member) {
        tracing::info!("member joined: {}", member.user.name);
        self.forward(
            member.guild_id,
            MemberEvent::Joined {
                user_id: member.user.id.get(),
            },
        );
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        tracing::info!("member left: {}", user.name);
        self.forward(
            guild_id,
            MemberEvent::Left {
                user_id: user.id.get(),
            },
        );
    }
}

/// Gateway client with the intents the roster and member events require.
pub async fn build_client(
    config: &DaemonConfig,
    bridge: GatewayBridge,
) -> Result<Client, DaemonError> {
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let client = Client::builder(&config.bot_token, intents)
        .event_handler(bridge)
        .application_id(ApplicationId::new(config.application_id))
        .await?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_sort_by_position_then_id() {
        let mut roles = vec![(3u16, 10u64), (1, 99), (1, 5), (2, 1)];
        roles.sort_by(|a, b| compare_roles(*a, *b));
        assert_eq!(roles, [(1, 5), (1, 99), (2, 1), (3, 10)]);
    }

    fn member(json: serde_json::Value) -> Member {
        let mut base = serde_json::json!({
            "guild_id": "42",
            "user": {
                "id": "1001",
                "username": "alex_1999",
                "global_name": "Alex Global",
                "discriminator": "0",
                "avatar": null,
                "bot": false
            },
            "nick": null,
            "roles": [],
            "joined_at": "2024-01-01T00:00:00.000000+00:00",
            "premium_since": null,
            "deaf": false,
            "mute": false,
            "flags": 0,
            "pending": false
        });
        if let (Some(base), Some(overrides)) = (base.as_object_mut(), json.as_object()) {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(base).expect("member json")
    }

    fn guild_roles() -> HashMap<RoleId, (u16, String)> {
        HashMap::from([
            (RoleId::new(30), (5, "UCL | Chelsea".to_string())),
            (RoleId::new(20), (2, "WC | Brazil".to_string())),
            (RoleId::new(10), (2, "Moderators".to_string())),
        ])
    }

    #[test]
    fn account_username_backs_missing_nickname() {
        let raw = to_raw_member(&member(serde_json::json!({})), &guild_roles());

        assert_eq!(raw.nick, None);
        assert_eq!(raw.name.as_deref(), Some("alex_1999"));
        assert_eq!(raw.display_name(), Some("alex_1999"));
    }

    #[test]
    fn nickname_wins_over_account_username() {
        let raw = to_raw_member(
            &member(serde_json::json!({ "nick": "Alex (ST)" })),
            &guild_roles(),
        );

        assert_eq!(raw.nick.as_deref(), Some("Alex (ST)"));
        assert_eq!(raw.display_name(), Some("Alex (ST)"));
    }

    #[test]
    fn member_roles_follow_guild_hierarchy_and_drop_unknown_ids() {
        let raw = to_raw_member(
            &member(serde_json::json!({ "roles": ["30", "999", "20", "10"] })),
            &guild_roles(),
        );

        assert_eq!(raw.roles, ["Moderators", "WC | Brazil", "UCL | Chelsea"]);
    }

    #[test]
    fn bot_flag_carries_over() {
        let mut bot = member(serde_json::json!({}));
        bot.user.bot = true;

        assert!(to_raw_member(&bot, &guild_roles()).bot);
        assert!(!to_raw_member(&member(serde_json::json!({})), &guild_roles()).bot);
    }

    #[tokio::test]
    async fn bridge_drops_events_from_other_guilds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (ready_tx, _ready_rx) = watch::channel(false);
        let bridge = GatewayBridge::new(42, tx, ready_tx);

        bridge.forward(GuildId::new(7), MemberEvent::Joined { user_id: 1 });
        bridge.forward(GuildId::new(42), MemberEvent::Left { user_id: 2 });

        assert_eq!(rx.recv().await, Some(MemberEvent::Left { user_id: 2 }));
        assert!(rx.try_recv().is_err());
    }
}
