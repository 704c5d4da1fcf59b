//! The fixed set of invokable commands.
//!
//! Definitions are plain data resolved once at startup and shared by
//! reference. Validation is a cheap syntactic gate; it does not guarantee
//! the backend will accept the command.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `POST /browser/navigate` — completes with the REST response.
    Navigate,
    /// Local — enumerates this registry, no network call.
    ListActions,
    /// `POST /agent/run` — starts an asynchronous interaction.
    Prompt,
}

#[derive(Debug)]
pub struct CommandDefinition {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub input_placeholder: &'static str,
    pub running_label: &'static str,
    pub kind: CommandKind,
}

impl CommandDefinition {
    pub fn validate(&self, text: &str) -> bool {
        let text = text.trim();
        match self.kind {
            CommandKind::Navigate => looks_like_url(text),
            CommandKind::ListActions => !text.is_empty(),
            CommandKind::Prompt => !text.is_empty(),
        }
    }
}

const COMMANDS: &[CommandDefinition] = &[
    CommandDefinition {
        id: "navigate",
        display_name: "Navigate",
        description: "Open a URL in the remote browser",
        input_placeholder: "example.com or https://example.com/page",
        running_label: "Navigating…",
        kind: CommandKind::Navigate,
    },
    CommandDefinition {
        id: "list-actions",
        display_name: "List actions",
        description: "List the available commands (* for all)",
        input_placeholder: "filter text, or *",
        running_label: "Listing actions…",
        kind: CommandKind::ListActions,
    },
    CommandDefinition {
        id: "prompt",
        display_name: "Prompt",
        description: "Ask the agent to drive the browser",
        input_placeholder: "Describe what the agent should do",
        running_label: "Agent is working…",
        kind: CommandKind::Prompt,
    },
];

pub fn all() -> &'static [CommandDefinition] {
    COMMANDS
}

pub fn find(id: &str) -> Option<&'static CommandDefinition> {
    COMMANDS.iter().find(|c| c.id == id)
}

/// The command plain text submits to when nothing is armed.
pub fn default_command() -> &'static CommandDefinition {
    find("prompt").expect("prompt command must be registered")
}

/// Case-insensitive substring match over id and display name. An empty
/// filter or `*` matches everything.
pub fn matching(filter: &str) -> Vec<&'static CommandDefinition> {
    let filter = filter.trim().to_lowercase();
    if filter.is_empty() || filter == "*" {
        return COMMANDS.iter().collect();
    }
    COMMANDS
        .iter()
        .filter(|c| {
            c.id.contains(&filter) || c.display_name.to_lowercase().contains(&filter)
        })
        .collect()
}

/// Accepts bare hosts ("example.com") and absolute http(s) URLs.
fn looks_like_url(text: &str) -> bool {
    if text.is_empty() || text.contains(char::is_whitespace) {
        return false;
    }
    let candidate = if text.contains("://") {
        text.to_string()
    } else {
        format!("https://{}", text)
    };
    match url::Url::parse(&candidate) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed
                    .host_str()
                    .map(|h| h.contains('.') || h == "localhost")
                    .unwrap_or(false)
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_complete() {
        assert!(find("navigate").is_some());
        assert!(find("list-actions").is_some());
        assert!(find("prompt").is_some());
        assert!(find("nonexistent").is_none());
        assert_eq!(default_command().id, "prompt");
    }

    #[test]
    fn test_navigate_validation() {
        let cmd = find("navigate").unwrap();
        assert!(cmd.validate("example.com"));
        assert!(cmd.validate("https://example.com/path?q=1"));
        assert!(cmd.validate("http://localhost:8000"));
        assert!(!cmd.validate(""));
        assert!(!cmd.validate("not a url"));
        assert!(!cmd.validate("ftp://example.com"));
        assert!(!cmd.validate("justaword"));
    }

    #[test]
    fn test_prompt_validation() {
        let cmd = find("prompt").unwrap();
        assert!(cmd.validate("summarize this page"));
        assert!(!cmd.validate("   "));
    }

    #[test]
    fn test_matching_filters() {
        assert_eq!(matching("*").len(), COMMANDS.len());
        assert_eq!(matching("").len(), COMMANDS.len());
        let nav = matching("nav");
        assert_eq!(nav.len(), 1);
        assert_eq!(nav[0].id, "navigate");
        assert!(matching("zzz").is_empty());
    }
}
