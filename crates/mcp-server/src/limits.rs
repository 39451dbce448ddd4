//! Response-size budgets and per-client token-limit presets.
//!
//! The size gate compares a forwarded response against
//! `min(MAX_RESPONSE_BYTES_CAP, tokens x BYTES_PER_TOKEN)`. The token limit
//! comes from the preset table when the client announced a known name at
//! `initialize`, otherwise from configuration.

/// Token budget assumed for clients without a preset or explicit override.
pub const DEFAULT_MAX_TOKENS: u64 = 25_000;

/// Rough bytes-per-token factor used to turn a token budget into bytes.
pub const BYTES_PER_TOKEN: u64 = 4;

/// Hard protocol ceiling: no response larger than this is ever returned
/// directly, regardless of the client's token budget.
pub const MAX_RESPONSE_BYTES_CAP: u64 = 900_000;

const CLIENT_PRESETS: &[(&str, u64)] = &[
    ("claude-ai", 25_000),
    ("claude-code", 25_000),
    ("claude-desktop", 25_000),
    ("cline", 20_000),
    ("cursor", 30_000),
    ("windsurf", 25_000),
];

/// Byte budget a directly returned response must fit in.
pub fn response_budget_bytes(max_tokens: u64) -> usize {
    MAX_RESPONSE_BYTES_CAP.min(max_tokens.saturating_mul(BYTES_PER_TOKEN)) as usize
}

/// Preset token limit for a client name as announced at `initialize`.
///
/// Names are normalized (lowercase, spaces and underscores to dashes) and
/// matched exactly or as a dash-separated prefix, so "Claude Code" and
/// "claude-code-1.x" both resolve to the `claude-code` preset.
pub fn token_limit_for_client(name: &str) -> Option<u64> {
    let normalized = name.trim().to_ascii_lowercase().replace([' ', '_'], "-");
    CLIENT_PRESETS.iter().find_map(|(known, limit)| {
        let matches =
            normalized == *known || normalized.strip_prefix(known).is_some_and(|rest| rest.starts_with('-'));
        matches.then_some(*limit)
    })
}
