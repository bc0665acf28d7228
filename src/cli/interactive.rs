use crate::ai::LanguageModel;
use crate::domain::coach::{ChatMessage, send_to_coach};
use crate::domain;
use crate::domain::journal::{EveningReflection, JournalEntry, Reflection, reflection_prompts};
use crate::session::Session;
use crate::voice::VoiceInput;
use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};
use tracing::warn;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "bye"];

/// Sends one message, or runs a conversation until an exit word or an
/// empty line.
pub fn run_coach(
    session: &Session,
    model: &dyn LanguageModel,
    message: Option<String>,
    mood: Option<String>,
    voice: Option<&dyn VoiceInput>,
) -> Result<()> {
    if let Some(message) = message {
        let reply = send_to_coach(session.store(), model, &message, mood)?;
        print_reply(&reply);
        return Ok(());
    }

    let theme = ColorfulTheme::default();
    println!("Talk to your coach. Type `exit` or leave empty to stop.");

    loop {
        let text = match voice {
            Some(voice) => {
                println!("(listening...)");
                match voice.listen() {
                    Ok(text) => {
                        println!("you> {text}");
                        text
                    }
                    Err(error) => {
                        println!("Voice input failed: {error}");
                        break;
                    }
                }
            }
            None => Input::with_theme(&theme)
                .with_prompt("you")
                .allow_empty(true)
                .interact_text()
                .context("Failed to read message")?,
        };

        if is_exit(&text) {
            break;
        }

        match send_to_coach(session.store(), model, &text, mood.clone()) {
            Ok(reply) => print_reply(&reply),
            Err(error) => {
                warn!(error = %error, "coach turn failed");
                println!("! {error}");
            }
        }
    }

    Ok(())
}

pub fn run_reflection(session: &Session, model: &dyn LanguageModel) -> Result<JournalEntry> {
    let theme = ColorfulTheme::default();
    let date = domain::today();

    println!("Evening reflection for {date}");
    let mood: String = Input::with_theme(&theme)
        .with_prompt("How are you feeling tonight?")
        .interact_text()
        .context("Failed to read mood")?;

    let prompts = reflection_prompts(session.store(), model, &mood, date)?;
    println!("\nSome questions to think about:");
    for prompt in &prompts {
        println!("  - {prompt}");
    }
    println!();

    let wins = read_list(&theme, "What went well today? (comma separated)")?;
    let challenges = read_list(&theme, "What was hard today? (comma separated)")?;
    let lessons_learned: String = Input::with_theme(&theme)
        .with_prompt("What did you learn?")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read lessons")?;

    let reflection = Reflection {
        wins,
        challenges,
        mood,
        lessons_learned,
    };

    println!("\nWriting your journal entry...");
    let entry =
        EveningReflection::prepare(session.store(), date, reflection)?.run(session.store(), model)?;

    println!("\n{}\n", entry.content);
    println!("Saved to your journal ({}).", domain::short_id(&entry.id));
    Ok(entry)
}

fn read_list(theme: &ColorfulTheme, prompt: &str) -> Result<Vec<String>> {
    let raw: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read answer: {prompt}"))?;

    Ok(split_list(&raw))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_exit(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || EXIT_WORDS.iter().any(|word| text.eq_ignore_ascii_case(word))
}

fn print_reply(reply: &ChatMessage) {
    println!("coach> {}\n", reply.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_answers() {
        assert_eq!(
            split_list(" shipped the report,, went for a run ,"),
            vec!["shipped the report".to_string(), "went for a run".to_string()]
        );
        assert!(split_list("   ").is_empty());
    }

    #[test]
    fn exit_words_end_the_conversation() {
        assert!(is_exit(""));
        assert!(is_exit(" Quit "));
        assert!(!is_exit("I quit sugar today"));
    }
}
