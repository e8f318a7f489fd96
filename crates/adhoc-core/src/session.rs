//! One connected console.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use adhoc_protocol::{ConnectionBuffer, GroupName, MacAddress, Nickname, ProductCode};

/// Opaque per-connection identifier, assigned by the listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Protocol state, derived from liveness and login status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Accepted, not logged in yet.
    Waiting,
    /// Logged in to a game. May or may not be in a group.
    LoggedIn,
    /// Idle for longer than the timeout. Terminal.
    TimedOut,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Waiting => "waiting",
            SessionState::LoggedIn => "logged in",
            SessionState::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub nickname: Nickname,
    pub last_activity: Instant,
    pub buffer: ConnectionBuffer,
    /// Canonical product code of the game, once logged in.
    pub game: Option<ProductCode>,
    pub group: Option<GroupName>,
}

impl Session {
    pub fn new(id: SessionId, ip: Ipv4Addr, now: Instant) -> Self {
        Session {
            id,
            ip,
            mac: MacAddress::default(),
            nickname: Nickname::EMPTY,
            last_activity: now,
            buffer: ConnectionBuffer::new(),
            game: None,
            group: None,
        }
    }

    pub fn state(&self, now: Instant, timeout: Duration) -> SessionState {
        if now.saturating_duration_since(self.last_activity) >= timeout {
            SessionState::TimedOut
        } else if self.game.is_none() {
            SessionState::Waiting
        } else {
            SessionState::LoggedIn
        }
    }

    /// Mark the session as alive.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_logged_in(&self) -> bool {
        self.game.is_some()
    }

    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }
}

/// `nick (MAC: .. - IP: ..)`, the form used in lifecycle log lines.
impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (MAC: {} - IP: {})", self.nickname, self.mac, self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(15);

    #[test]
    fn state_follows_liveness_then_login() {
        let t0 = Instant::now();
        let mut s = Session::new(SessionId(1), Ipv4Addr::new(10, 0, 0, 1), t0);
        assert_eq!(s.state(t0, TIMEOUT), SessionState::Waiting);

        s.game = ProductCode::parse("ULUS10041");
        assert_eq!(s.state(t0 + Duration::from_secs(14), TIMEOUT), SessionState::LoggedIn);
        assert_eq!(s.state(t0 + TIMEOUT, TIMEOUT), SessionState::TimedOut);

        s.touch(t0 + TIMEOUT);
        assert_eq!(s.state(t0 + TIMEOUT, TIMEOUT), SessionState::LoggedIn);
    }

    #[test]
    fn display_for_logs() {
        let mut s = Session::new(SessionId(7), Ipv4Addr::new(192, 168, 1, 20), Instant::now());
        s.nickname = Nickname::new("Zelda");
        s.mac = MacAddress([1, 2, 3, 4, 5, 6]);
        assert_eq!(
            s.to_string(),
            "Zelda (MAC: 01:02:03:04:05:06 - IP: 192.168.1.20)"
        );
        assert_eq!(SessionId(7).to_string(), "#7");
    }
}
