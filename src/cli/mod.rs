pub mod interactive;
pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "justly",
    about = "AI life coach for habits, daily tasks and evening reflection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Signup {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    Logout,
    Whoami,
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    Onboard,
    /// Today's habits and tasks
    Home,
    /// Morning prep: AI suggested tasks for today
    Prep {
        #[arg(long)]
        mood: Option<String>,
    },
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Talk to the coach; without a message starts a conversation
    Coach {
        message: Option<String>,
        #[arg(long)]
        mood: Option<String>,
        #[arg(long, default_value_t = false)]
        voice: bool,
    },
    /// Evening reflection, saved as a journal entry
    Reflect,
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    Achievements,
    Summary {
        #[arg(long)]
        date: Option<String>,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
    Doctor,
    /// Local API server plus the morning and evening scheduler
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = false)]
        password: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum HabitCommands {
    Add {
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "daily")]
        frequency: String,
    },
    List,
    Toggle {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommands {
    Add {
        title: String,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    List {
        #[arg(long)]
        date: Option<String>,
    },
    Toggle {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GoalCommands {
    Add {
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List,
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum JournalCommands {
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommands {
    Show,
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "justly", "habit", "add", "Drink water", "--category", "health",
        ])
        .expect("parse");

        match cli.command {
            Commands::Habit {
                command:
                    HabitCommands::Add {
                        title,
                        category,
                        frequency,
                        ..
                    },
            } => {
                assert_eq!(title, "Drink water");
                assert_eq!(category, "health");
                assert_eq!(frequency, "daily");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn coach_message_is_optional() {
        let cli = Cli::try_parse_from(["justly", "coach", "--voice"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Coach {
                message: None,
                voice: true,
                ..
            }
        ));
    }
}
