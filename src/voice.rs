use crate::config::Config;
use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};
use tracing::info;

/// A source of spoken messages, already transcribed to text.
pub trait VoiceInput {
    fn listen(&self) -> Result<String>;
}

/// Runs an external speech-to-text command and uses its stdout as the
/// transcript.
pub struct CommandVoiceInput {
    command: String,
}

impl CommandVoiceInput {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl VoiceInput for CommandVoiceInput {
    fn listen(&self) -> Result<String> {
        info!(command = %self.command, "listening for voice input");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to run voice command: {}", self.command))?;

        if !output.status.success() {
            bail!("Voice command exited with {}", output.status);
        }

        let transcript = String::from_utf8(output.stdout)
            .context("Voice command produced non UTF-8 output")?
            .trim()
            .to_string();
        if transcript.is_empty() {
            bail!("No speech recognized");
        }

        Ok(transcript)
    }
}

/// Voice input is only available when a speech-to-text command is configured.
pub fn detect(config: &Config) -> Option<Box<dyn VoiceInput>> {
    config
        .voice_command
        .as_deref()
        .map(str::trim)
        .filter(|command| !command.is_empty())
        .map(|command| Box::new(CommandVoiceInput::new(command)) as Box<dyn VoiceInput>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_without_command() {
        let config = Config {
            voice_command: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(detect(&config).is_none());
        assert!(detect(&Config::default()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn transcript_is_command_stdout() {
        let config = Config {
            voice_command: Some("echo '  hello coach  '".to_string()),
            ..Config::default()
        };
        let voice = detect(&config).expect("voice available");
        assert_eq!(voice.listen().expect("transcript"), "hello coach");
    }

    #[cfg(unix)]
    #[test]
    fn empty_or_failing_command_is_an_error() {
        assert!(CommandVoiceInput::new("true").listen().is_err());
        assert!(CommandVoiceInput::new("exit 3").listen().is_err());
    }
}
