//! Config schema types (server, transport, endpoints, relay, normalizer,
//! command catalog, archive sink).

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotlineConfig {
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    /// Ordered candidate responders; the first entry is the primary.
    pub endpoints: Vec<EndpointConfig>,
    pub relay: RelayConfig,
    pub normalizer: NormalizerConfig,
    pub commands: Vec<CommandConfig>,
    pub archive: ArchiveConfig,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 8080.
    pub port: u16,
    /// Public base URL used when building attachment links. When unset,
    /// `http://{bind}:{port}` is used.
    pub public_url: Option<String>,
    /// Directory attachment files are written to.
    pub downloads_dir: String,
}

impl ServerConfig {
    /// Base URL that attachment links are built against, without a trailing
    /// slash.
    pub fn resolved_public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind, self.port),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            public_url: None,
            downloads_dir: "downloads".into(),
        }
    }
}

/// Telegram transport configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to getUpdates, in seconds.
    pub poll_timeout_secs: u64,

    /// HTTP client timeout; must exceed the long-polling timeout so the
    /// client doesn't abort the request before the API responds.
    pub client_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            client_timeout_secs: 45,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// One candidate responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Stable endpoint name referenced by command catalog entries.
    pub id: String,
    /// Chat id the transport delivers commands to.
    pub chat_id: i64,
}

/// Correlation / failover timing and aggregation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Per-attempt deadline for every candidate except the last, in seconds.
    pub short_timeout_secs: u64,
    /// Deadline for the final candidate, in seconds.
    pub total_timeout_secs: u64,
    /// How long a silent endpoint stays excluded, in hours.
    pub cooldown_hours: u64,
    /// Capacity of the generic inbox for unclaimed replies.
    pub inbox_capacity: usize,
    /// Separator joining reply texts in the aggregated result.
    pub separator: String,
    /// Field names promoted from the merged field map to the result top level.
    pub promote_fields: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            short_timeout_secs: 25,
            total_timeout_secs: 40,
            cooldown_hours: 6,
            inbox_capacity: 2000,
            separator: "\n---\n".into(),
            promote_fields: vec!["dni".into()],
        }
    }
}

/// One named field-extraction rule: `pattern` must contain a single capture
/// group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRuleConfig {
    pub name: String,
    pub pattern: String,
}

/// Reply text cleanup and field extraction rules.
///
/// Defaults target the upstream lookup bots the service was written against;
/// deployments pointing at different responders override them wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Regex whose first occurrence is rewritten to `rewrite_with` (brand
    /// replacement in the reply banner).
    pub rewrite_pattern: Option<String>,
    pub rewrite_with: String,
    /// Patterns removed from the reply text, applied in order.
    pub strip_patterns: Vec<String>,
    /// Field extraction rules applied to the cleaned text.
    pub fields: Vec<FieldRuleConfig>,
    /// Extracted field used as the correlation subject id.
    pub subject_field: String,
    /// Extracted field used to tag attachments in the same message.
    pub tag_field: String,
    /// Substrings marking a reply as a terminal remote-side rejection.
    pub rejection_markers: Vec<String>,
    /// Substrings marking the final reply of an `until_terminator` command.
    pub terminator_markers: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            rewrite_pattern: Some(r"(?i)^\[\#LEDER_BOT\]".into()),
            rewrite_with: "[BOTLINE]".into(),
            strip_patterns: vec![
                // Header banner: "[TAG] → … [TAG]" plus trailing newlines.
                r"(?is)^\[.*?\]\s*→\s*.*?\[.*?\](\r?\n){1,2}".into(),
                // Footer: pagination, credits, format warnings.
                r"(?is)((\r?\n){1,2}\[|Página\s*\d+/\d+.*|(\r?\n){1,2}Por favor, usa el formato correcto.*|↞ Anterior|Siguiente ↠.*|Credits\s*:.+|Wanted for\s*:.+)".into(),
                // Separator runs.
                r"-{3,}".into(),
            ],
            fields: vec![
                FieldRuleConfig {
                    name: "dni".into(),
                    pattern: r"(?i)DNI\s*:\s*(\d{8})".into(),
                },
                FieldRuleConfig {
                    name: "photo_type".into(),
                    pattern: r"(?i)Foto\s*:\s*(rostro|huella|firma|adverso|reverso)".into(),
                },
            ],
            subject_field: "dni".into(),
            tag_field: "photo_type".into(),
            rejection_markers: vec!["Por favor, usa el formato correcto".into()],
            terminator_markers: Vec::new(),
        }
    }
}

/// When a pending command is considered complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPolicy {
    /// First matching reply resolves the command.
    #[default]
    Single,
    /// Wait for a fixed number of reply messages.
    Count(u32),
    /// Accumulate until a terminator-marker reply arrives.
    UntilTerminator,
}

/// One entry of the command catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Command name; the sent text is "/{name} {subject}".
    pub name: String,
    #[serde(default)]
    pub policy: CommandPolicy,
    /// Whether the HTTP surface must be given a subject parameter.
    #[serde(default)]
    pub requires_subject: bool,
    /// Validation pattern for the subject (full match). A subject matching
    /// this pattern is also used as the correlation filter.
    #[serde(default)]
    pub subject_pattern: Option<String>,
    /// Candidate endpoint ids in failover order; empty means all configured
    /// endpoints in config order.
    #[serde(default)]
    pub candidates: Vec<String>,
    /// Archive classification appended to the sink URL.
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "general".into()
}

/// Fire-and-forget archival sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    /// Base URL; the command's `kind` is appended as a path segment.
    pub url: String,
    /// Request timeout, kept short so a slow sink never backs up anything.
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BotlineConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.relay.short_timeout_secs, 25);
        assert_eq!(cfg.relay.total_timeout_secs, 40);
        assert_eq!(cfg.relay.cooldown_hours, 6);
        assert_eq!(cfg.relay.inbox_capacity, 2000);
        assert!(cfg.endpoints.is_empty());
        assert!(cfg.commands.is_empty());
        assert!(!cfg.archive.enabled);
        assert_eq!(cfg.normalizer.subject_field, "dni");
    }

    #[test]
    fn public_url_falls_back_to_bind() {
        let server = ServerConfig::default();
        assert_eq!(server.resolved_public_url(), "http://127.0.0.1:8080");

        let server = ServerConfig {
            public_url: Some("https://botline.example.org/".into()),
            ..Default::default()
        };
        assert_eq!(
            server.resolved_public_url(),
            "https://botline.example.org"
        );
    }

    #[test]
    fn parse_command_policies_from_toml() {
        let raw = r#"
            [[endpoints]]
            id = "primary"
            chat_id = 1122334455

            [[commands]]
            name = "dni"
            requires_subject = true
            subject_pattern = '\d{8}'
            kind = "persona"

            [[commands]]
            name = "dnif"
            policy = { count = 4 }
            requires_subject = true
            kind = "persona"

            [[commands]]
            name = "tra"
            policy = "until_terminator"
        "#;
        let cfg: BotlineConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.commands.len(), 3);
        assert_eq!(cfg.commands[0].policy, CommandPolicy::Single);
        assert_eq!(cfg.commands[1].policy, CommandPolicy::Count(4));
        assert_eq!(cfg.commands[2].policy, CommandPolicy::UntilTerminator);
        assert_eq!(cfg.commands[2].kind, "general");
        assert_eq!(cfg.endpoints[0].chat_id, 1_122_334_455);
    }

    #[test]
    fn telegram_debug_redacts_token() {
        let cfg = TelegramConfig {
            token: Secret::new("123:ABC".into()),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("123:ABC"));
    }

    #[test]
    fn telegram_deserialize_applies_defaults() {
        let cfg: TelegramConfig = serde_json::from_str(r#"{"token": "123:ABC"}"#).unwrap();
        assert_eq!(cfg.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.poll_timeout_secs, 30);
        assert_eq!(cfg.client_timeout_secs, 45);
    }
}
