use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Installed AI CLI used as the vision provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Claude,
    Codex,
    Gemini,
}

impl AiProvider {
    pub fn command_name(&self) -> &'static str {
        match self {
            AiProvider::Claude => "claude",
            AiProvider::Codex => "codex",
            AiProvider::Gemini => "gemini",
        }
    }

    /// Arguments for a one-shot, non-interactive prompt
    pub fn prompt_args(&self, prompt: &str) -> Vec<String> {
        match self {
            AiProvider::Claude => vec![
                "-p".to_string(),
                prompt.to_string(),
                "--output-format".to_string(),
                "text".to_string(),
            ],
            AiProvider::Codex => vec!["exec".to_string(), prompt.to_string()],
            AiProvider::Gemini => vec!["-p".to_string(), prompt.to_string()],
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_args() {
        let args = AiProvider::Claude.prompt_args("look");
        assert_eq!(args, vec!["-p", "look", "--output-format", "text"]);
        assert_eq!(AiProvider::Codex.prompt_args("look")[0], "exec");
    }

    #[test]
    fn test_display_is_command_name() {
        assert_eq!(AiProvider::Gemini.to_string(), "gemini");
    }
}
