//! Topology registry: owns every session and game.
//!
//! Games own their groups; groups and sessions refer to each other by
//! identifier only (`SessionId`, `ProductCode`, `GroupName`). All
//! creation and destruction goes through this type, which is what keeps
//! the cross-references consistent.

use std::net::Ipv4Addr;
use std::time::Instant;

use adhoc_protocol::{
    ChatMessage, GroupName, LoginRequest, Nickname, Opcode, ProductCode, ServerPacket,
};
use indexmap::IndexMap;
use tracing::info;

use crate::directory::ProductDirectory;
use crate::error::{Refusal, Violation};
use crate::game::Game;
use crate::messages::{LogoutReason, Output};
use crate::session::{Session, SessionId, SessionState};
use crate::snapshot::{GameSnapshot, GroupSnapshot, TopologySnapshot};

#[derive(Debug)]
pub struct Topology {
    sessions: IndexMap<SessionId, Session>,
    games: IndexMap<ProductCode, Game>,
    max_sessions: usize,
    /// Bumped on every structural change (sessions, games, groups).
    revision: u64,
}

impl Topology {
    pub fn new(max_sessions: usize) -> Self {
        Topology {
            sessions: IndexMap::new(),
            games: IndexMap::new(),
            max_sessions,
            revision: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn game(&self, code: &ProductCode) -> Option<&Game> {
        self.games.get(code)
    }

    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Register a freshly accepted connection.
    pub fn create_session(
        &mut self,
        id: SessionId,
        ip: Ipv4Addr,
        now: Instant,
    ) -> Result<(), Refusal> {
        if self.sessions.len() >= self.max_sessions {
            return Err(Refusal::ServerFull);
        }
        if self.sessions.values().any(|s| s.ip == ip) {
            return Err(Refusal::DuplicateIp);
        }
        self.sessions.insert(id, Session::new(id, ip, now));
        self.revision += 1;
        Ok(())
    }

    /// Canonical code for `code`, creating an empty game for it if needed.
    pub fn resolve_or_create_game<D: ProductDirectory + ?Sized>(
        &mut self,
        code: ProductCode,
        directory: &mut D,
    ) -> ProductCode {
        let canonical = directory.resolve_canonical_product(code);
        if !self.games.contains_key(&canonical) {
            // Newest game first, as listed in the status report.
            self.games.shift_insert(0, canonical, Game::new(canonical));
            self.revision += 1;
        }
        canonical
    }

    /// Attach an already validated login to the session and count it as a
    /// player of its game.
    pub fn login<D: ProductDirectory + ?Sized>(
        &mut self,
        id: SessionId,
        request: &LoginRequest,
        directory: &mut D,
    ) -> Option<ProductCode> {
        if !self.sessions.contains_key(&id) {
            return None;
        }
        let code = self.resolve_or_create_game(request.product, directory);
        let game = self.games.get_mut(&code)?;
        game.add_player();

        let session = self.sessions.get_mut(&id)?;
        session.mac = request.mac;
        session.nickname = request.nickname;
        session.game = Some(code);
        self.revision += 1;

        info!("{} started playing {}", session, code);
        Some(code)
    }

    /// Log a session out: leave its group, release its game and drop it.
    ///
    /// Ends with `Output::Close` for the session. Unknown ids yield
    /// nothing.
    pub fn destroy_session(&mut self, id: SessionId, reason: LogoutReason) -> Vec<Output> {
        if !self.sessions.contains_key(&id) {
            return Vec::new();
        }

        let mut out = self.unlink_from_group(id);

        if let Some(session) = self.sessions.shift_remove(&id) {
            if let Some(code) = session.game {
                if let Some(game) = self.games.get_mut(&code) {
                    game.remove_player();
                    if game.player_count() == 0 {
                        self.games.shift_remove(&code);
                    }
                }
                info!("{} stopped playing {}", session, code);
            }
            info!("dropped connection {} from {} ({})", id, session.ip, reason);
        }
        self.revision += 1;

        out.push(Output::close(id, reason));
        out
    }

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    /// Join (or found) `name` under the session's game.
    ///
    /// Existing members are walked newest to oldest; each one is told about
    /// the joiner and the joiner is told about it. The joiner then gets the
    /// host address: its own for a new group, otherwise the founder's.
    pub fn join_group(&mut self, id: SessionId, name: GroupName) -> Result<Vec<Output>, Violation> {
        let session = self.sessions.get(&id).ok_or(Violation::NotGrouped)?;
        if session.is_grouped() {
            return Err(Violation::AlreadyGrouped);
        }
        let code = session.game.ok_or(Violation::UnexpectedOpcode {
            state: SessionState::Waiting,
            opcode: Opcode::Connect as u8,
        })?;
        if !name.is_valid() {
            return Err(Violation::InvalidGroupName);
        }
        let joined = ServerPacket::PeerJoined {
            nickname: session.nickname,
            mac: session.mac,
            ip: session.ip,
        };
        let mut host = session.mac;

        let game = self
            .games
            .get_mut(&code)
            .ok_or(Violation::InvalidLogin)?;
        let group = game.group_or_create(&name);

        let mut out = Vec::with_capacity(group.member_count() * 2 + 1);
        for member_id in group.members() {
            let Some(member) = self.sessions.get(&member_id) else {
                continue;
            };
            out.push(Output::send(member_id, joined.clone()));
            out.push(Output::send(
                id,
                ServerPacket::PeerJoined {
                    nickname: member.nickname,
                    mac: member.mac,
                    ip: member.ip,
                },
            ));
            host = member.mac;
        }
        group.push_front(id);

        if let Some(session) = self.sessions.get_mut(&id) {
            session.group = Some(name);
            info!("{} joined {} group {}", session, code, name);
        }
        self.revision += 1;

        out.push(Output::send(id, ServerPacket::ConnectBssid { host }));
        Ok(out)
    }

    /// Leave the current group, notifying the members that remain.
    pub fn leave_group(&mut self, id: SessionId) -> Result<Vec<Output>, Violation> {
        match self.sessions.get(&id) {
            Some(s) if s.is_grouped() => Ok(self.unlink_from_group(id)),
            _ => Err(Violation::NotGrouped),
        }
    }

    fn unlink_from_group(&mut self, id: SessionId) -> Vec<Output> {
        let Some(session) = self.sessions.get_mut(&id) else {
            return Vec::new();
        };
        let (Some(code), Some(name)) = (session.game, session.group.take()) else {
            return Vec::new();
        };
        let ip = session.ip;
        info!("{} left {} group {}", session, code, name);

        let Some(game) = self.games.get_mut(&code) else {
            return Vec::new();
        };
        let mut remaining = Vec::new();
        if let Some(group) = game.group_mut(&name) {
            group.remove(id);
            remaining.extend(group.members());
            if group.is_empty() {
                game.remove_group(&name);
            }
        }
        self.revision += 1;

        remaining
            .into_iter()
            .map(|member| Output::send(member, ServerPacket::PeerLeft { ip }))
            .collect()
    }

    /// One row per group of the caller's game, then `ScanComplete`.
    pub fn scan(&self, id: SessionId) -> Result<Vec<Output>, Violation> {
        let session = self.sessions.get(&id).ok_or(Violation::NotGrouped)?;
        if session.is_grouped() {
            return Err(Violation::AlreadyGrouped);
        }

        let mut out = Vec::new();
        if let Some(game) = session.game.and_then(|code| self.games.get(&code)) {
            for group in game.groups() {
                let host = group
                    .founder()
                    .and_then(|f| self.sessions.get(&f))
                    .map(|f| f.mac)
                    .unwrap_or_default();
                out.push(Output::send(
                    id,
                    ServerPacket::ScanEntry {
                        group: *group.name(),
                        host,
                    },
                ));
            }
            info!(
                "{} requested information on {} {} groups",
                session,
                game.group_count(),
                game.product()
            );
        }
        out.push(Output::send(id, ServerPacket::ScanComplete));
        Ok(out)
    }

    /// Relay a chat line to every other member of the sender's group.
    pub fn chat(&self, id: SessionId, message: ChatMessage) -> Result<Vec<Output>, Violation> {
        let session = self.sessions.get(&id).ok_or(Violation::NotGrouped)?;
        let (Some(code), Some(name)) = (session.game, session.group) else {
            return Err(Violation::NotGrouped);
        };
        let Some(group) = self.games.get(&code).and_then(|g| g.group(&name)) else {
            return Err(Violation::NotGrouped);
        };

        let packet = ServerPacket::Chat {
            sender: session.nickname,
            message,
        };
        let out: Vec<Output> = group
            .members()
            .filter(|&m| m != id)
            .map(|m| Output::send(m, packet.clone()))
            .collect();

        info!(
            "{} sent \"{}\" to {} players in {} group {}",
            session,
            message,
            out.len(),
            code,
            name
        );
        Ok(out)
    }

    /// Server notice to every grouped session, with an empty sender.
    pub fn broadcast_notice(&self, message: ChatMessage) -> Vec<Output> {
        if self.sessions.is_empty() {
            return Vec::new();
        }
        let packet = ServerPacket::Chat {
            sender: Nickname::EMPTY,
            message,
        };
        self.games
            .values()
            .flat_map(|game| game.groups())
            .flat_map(|group| group.members())
            .map(|m| Output::send(m, packet.clone()))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    pub fn snapshot<D: ProductDirectory + ?Sized>(&self, directory: &D) -> TopologySnapshot {
        let games = self
            .games
            .values()
            .map(|game| GameSnapshot {
                product: *game.product(),
                name: directory
                    .display_name(game.product())
                    .unwrap_or_else(|| game.product().to_string()),
                player_count: game.player_count(),
                groups: game
                    .groups()
                    .iter()
                    .map(|group| GroupSnapshot {
                        name: *group.name(),
                        members: group
                            .members()
                            .filter_map(|m| self.sessions.get(&m))
                            .map(|s| s.nickname.to_string())
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        TopologySnapshot {
            user_count: self.sessions.len(),
            games,
        }
    }

    /// Verify every cross-reference. Returns the first inconsistency.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (code, game) in &self.games {
            let players = self
                .sessions
                .values()
                .filter(|s| s.game.as_ref() == Some(code))
                .count();
            if game.player_count() != players {
                return Err(format!(
                    "game {}: player_count {} but {} sessions reference it",
                    code,
                    game.player_count(),
                    players
                ));
            }
            if game.player_count() == 0 {
                return Err(format!("game {} has no players", code));
            }
            for group in game.groups() {
                if group.is_empty() {
                    return Err(format!("game {}: empty group {}", code, group.name()));
                }
                for member in group.members() {
                    let Some(s) = self.sessions.get(&member) else {
                        return Err(format!("group {}: unknown member {}", group.name(), member));
                    };
                    if s.group.as_ref() != Some(group.name()) || s.game.as_ref() != Some(code) {
                        return Err(format!(
                            "group {}: member {} points elsewhere",
                            group.name(),
                            member
                        ));
                    }
                }
            }
        }

        for s in self.sessions.values() {
            match (s.game, s.group) {
                (None, Some(_)) => return Err(format!("session {} grouped without a game", s.id)),
                (Some(code), group) => {
                    let Some(game) = self.games.get(&code) else {
                        return Err(format!("session {}: missing game {}", s.id, code));
                    };
                    if let Some(name) = group {
                        if !game.group(&name).is_some_and(|g| g.contains(s.id)) {
                            return Err(format!("session {}: not listed in group {}", s.id, name));
                        }
                    }
                }
                (None, None) => {}
            }
            if self.sessions.values().filter(|o| o.ip == s.ip).count() > 1 {
                return Err(format!("duplicate ip {}", s.ip));
            }
        }
        Ok(())
    }
}
