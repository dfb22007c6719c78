use std::{collections::HashMap, num::NonZeroUsize};

use {anyhow::Context, regex::Regex};

use {
    botline_common::types::EndpointId,
    botline_config::schema::{CommandConfig, CommandPolicy},
    botline_relay::CompletionPolicy,
};

/// One resolved catalog entry: how a named command is sent, correlated, and
/// archived.
pub struct CommandSpec {
    pub name: String,
    pub policy: CompletionPolicy,
    pub requires_subject: bool,
    /// Full-match validation pattern; a matching argument also becomes the
    /// correlation filter.
    subject_pattern: Option<Regex>,
    /// Failover order for this command.
    pub candidates: Vec<EndpointId>,
    /// Archive classification.
    pub kind: String,
}

impl CommandSpec {
    /// Full command text sent into the chat.
    pub fn command_text(&self, argument: Option<&str>) -> String {
        match argument {
            Some(arg) => format!("/{} {arg}", self.name),
            None => format!("/{}", self.name),
        }
    }

    /// Check the argument against this command's requirements.
    pub fn validate(&self, argument: Option<&str>) -> Result<(), String> {
        match argument {
            None if self.requires_subject => Err(format!(
                "parameter 'subject' is required for /{}",
                self.name
            )),
            Some(arg) if self.requires_subject => match &self.subject_pattern {
                Some(pattern) if !pattern.is_match(arg) => Err(format!(
                    "invalid subject {arg:?} for /{}",
                    self.name
                )),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Correlation filter for this call: the argument, when it looks like a
    /// subject id. Commands without a pattern filter only when a subject is
    /// mandatory; free-form queries correlate by endpoint alone.
    pub fn correlation_filter(&self, argument: Option<&str>) -> Option<String> {
        let arg = argument?;
        match &self.subject_pattern {
            Some(pattern) => pattern.is_match(arg).then(|| arg.to_string()),
            None => self.requires_subject.then(|| arg.to_string()),
        }
    }
}

/// The command catalog: explicit per-command policy and routing, built from
/// config at startup.
pub struct CommandCatalog {
    commands: HashMap<String, CommandSpec>,
}

impl CommandCatalog {
    pub fn from_config(
        commands: &[CommandConfig],
        endpoints: &[EndpointId],
    ) -> anyhow::Result<Self> {
        let mut map = HashMap::new();
        for cfg in commands {
            let policy = match cfg.policy {
                CommandPolicy::Single => CompletionPolicy::Single,
                CommandPolicy::Count(count) => CompletionPolicy::Count(
                    NonZeroUsize::new(count as usize)
                        .with_context(|| format!("command {}: count must be at least 1", cfg.name))?,
                ),
                CommandPolicy::UntilTerminator => CompletionPolicy::UntilTerminator,
            };

            let candidates = if cfg.candidates.is_empty() {
                endpoints.to_vec()
            } else {
                let mut resolved = Vec::with_capacity(cfg.candidates.len());
                for id in &cfg.candidates {
                    let endpoint = EndpointId::from(id.as_str());
                    anyhow::ensure!(
                        endpoints.contains(&endpoint),
                        "command {}: unknown endpoint {id:?}",
                        cfg.name
                    );
                    resolved.push(endpoint);
                }
                resolved
            };

            let subject_pattern = cfg
                .subject_pattern
                .as_deref()
                .map(|pattern| Regex::new(&format!("^(?:{pattern})$")))
                .transpose()
                .with_context(|| format!("command {}: invalid subject pattern", cfg.name))?;

            let previous = map.insert(
                cfg.name.clone(),
                CommandSpec {
                    name: cfg.name.clone(),
                    policy,
                    requires_subject: cfg.requires_subject,
                    subject_pattern,
                    candidates,
                    kind: cfg.kind.clone(),
                },
            );
            anyhow::ensure!(previous.is_none(), "duplicate command {:?}", cfg.name);
        }
        Ok(Self { commands: map })
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Command names, sorted for stable display.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
