use std::fmt;

/// Relay services the browser can be routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    ScrapeOps,
    ScraperApi,
    ZenRows,
    /// Any plain HTTP/SOCKS proxy.
    Generic,
}

impl RelayKind {
    /// Metered relays fail hard past their plan's concurrency ceiling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            RelayKind::ScrapeOps | RelayKind::ScraperApi | RelayKind::ZenRows
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayKind::ScrapeOps => "scrapeops",
            RelayKind::ScraperApi => "scraperapi",
            RelayKind::ZenRows => "zenrows",
            RelayKind::Generic => "generic",
        }
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved network route for the browser.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum ConnectionPath {
    #[default]
    Direct,
    Relay {
        kind: RelayKind,
        server: String,
        username: Option<String>,
        password: Option<String>,
    },
}

impl ConnectionPath {
    /// True when detail concurrency must be forced down to one.
    pub fn is_rate_limited_relay(&self) -> bool {
        match self {
            ConnectionPath::Direct => false,
            ConnectionPath::Relay { kind, .. } => kind.is_rate_limited(),
        }
    }

    pub fn server(&self) -> Option<&str> {
        match self {
            ConnectionPath::Direct => None,
            ConnectionPath::Relay { server, .. } => Some(server),
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self {
            ConnectionPath::Relay {
                username: Some(u),
                password,
                ..
            } => Some((u.as_str(), password.as_deref().unwrap_or(""))),
            _ => None,
        }
    }
}

// Credentials never reach logs.
impl fmt::Debug for ConnectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPath::Direct => write!(f, "Direct"),
            ConnectionPath::Relay {
                kind,
                server,
                username,
                ..
            } => f
                .debug_struct("Relay")
                .field("kind", kind)
                .field("server", server)
                .field("username", &username.as_ref().map(|_| "***"))
                .finish_non_exhaustive(),
        }
    }
}

impl fmt::Display for ConnectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPath::Direct => write!(f, "direct"),
            ConnectionPath::Relay { kind, server, .. } => write!(f, "{kind} via {server}"),
        }
    }
}
