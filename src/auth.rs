//! AuthGate & tool-surface filter (C12, §4.10).
//!
//! Deliberately thin: the core does not own user identities (no password
//! hashes, no sessions) — it only needs a `user_id` to partition memories
//! by and a yes/no answer to "is this caller remote" to decide which tools
//! a `TransportAdapter` may advertise.

use crate::config::CoreConfig;

/// Capability context a `TransportAdapter` builds once per request and
/// passes through to `AuthGate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// stdio / in-process caller — trusted, full tool surface.
    Local,
    /// HTTP(S) caller — subject to the remote tool denylist.
    Remote,
}

/// Resolved identity + capability for a single request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub origin: Origin,
}

impl AuthContext {
    pub fn is_remote(&self) -> bool {
        self.origin == Origin::Remote
    }
}

/// Tool name prefixes denied to remote callers (§6.1). The core ships no
/// tools under these prefixes today, but a host embedding it might
/// register some — the filter exists so `tools/list` never advertises
/// them, and `tools/call` rejects them even if invoked directly.
const REMOTE_DENYLIST_PREFIXES: &[&str] = &["file_", "dir_", "shell_", "media_open_"];

/// Extracts a `user_id` / `Origin` pair from an opaque bearer credential and
/// an optional override header, falling back to `config.default_user_id` when
/// no credential is present (§4.10).
pub struct AuthGate {
    default_user_id: String,
}

impl AuthGate {
    pub fn new(config: &CoreConfig) -> Self {
        Self { default_user_id: config.default_user_id.clone() }
    }

    /// `credential` is an opaque bearer token (e.g. the `Authorization:
    /// Bearer <token>` value with the scheme stripped); this core does not
    /// validate it beyond non-emptiness — token issuance/verification is a
    /// host concern. `user_override` models `X-User-ID` (§6.2 headers),
    /// which always wins when present.
    pub fn authenticate(
        &self,
        credential: Option<&str>,
        user_override: Option<&str>,
        origin: Origin,
    ) -> AuthContext {
        let user_id = user_override
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .or_else(|| credential.filter(|s| !s.is_empty()).map(|s| s.to_string()))
            .unwrap_or_else(|| self.default_user_id.clone());
        AuthContext { user_id, origin }
    }

    /// Whether `tool_name` is visible/callable for `ctx` (§4.10, §6.1).
    /// Evaluated once per request by the transport, both when building the
    /// `tools/list` response and when dispatching `tools/call`.
    pub fn allows_tool(&self, ctx: &AuthContext, tool_name: &str) -> bool {
        if !ctx.is_remote() {
            return true;
        }
        !REMOTE_DENYLIST_PREFIXES
            .iter()
            .any(|prefix| tool_name.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AuthGate {
        AuthGate::new(&CoreConfig::default())
    }

    #[test]
    fn falls_back_to_default_user_when_unauthenticated() {
        let ctx = gate().authenticate(None, None, Origin::Local);
        assert_eq!(ctx.user_id, CoreConfig::default().default_user_id);
    }

    #[test]
    fn user_override_wins_over_credential() {
        let ctx = gate().authenticate(Some("tok-abc"), Some("alice"), Origin::Remote);
        assert_eq!(ctx.user_id, "alice");
    }

    #[test]
    fn credential_used_absent_override() {
        let ctx = gate().authenticate(Some("bob"), None, Origin::Remote);
        assert_eq!(ctx.user_id, "bob");
    }

    #[test]
    fn local_origin_allows_everything() {
        let ctx = gate().authenticate(None, None, Origin::Local);
        assert!(gate().allows_tool(&ctx, "shell_exec"));
    }

    #[test]
    fn remote_origin_denies_listed_prefixes() {
        let ctx = gate().authenticate(None, None, Origin::Remote);
        let g = gate();
        assert!(!g.allows_tool(&ctx, "file_read"));
        assert!(!g.allows_tool(&ctx, "dir_list"));
        assert!(!g.allows_tool(&ctx, "shell_exec"));
        assert!(!g.allows_tool(&ctx, "media_open_image"));
        assert!(g.allows_tool(&ctx, "memory_store"));
    }
}
