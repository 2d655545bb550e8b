use clap::Subcommand;
use quizalarm_core::Config;

use super::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting
    Get {
        /// Setting path such as "scheduler.poll_interval_secs" or "audio.backend"
        key: String,
    },
    /// Change one setting and write config.toml
    Set {
        key: String,
        value: String,
    },
    /// Print the whole configuration, or one section of it, as JSON
    #[command(alias = "list")]
    Show {
        /// scheduler, quiz, audio, defaults or logging
        section: Option<String>,
    },
    /// Print where config.toml lives
    Path,
    /// Overwrite config.toml with the built-in defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("no such setting: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            // Echo what was stored, after type coercion.
            let stored = config.get(&key).unwrap_or(value);
            println!("{key} = {stored}");
        }
        ConfigAction::Show { section } => {
            let tree = serde_json::to_value(Config::load()?)?;
            let shown = match section.as_deref() {
                None => &tree,
                Some(name) => tree
                    .get(name)
                    .ok_or_else(|| format!("no such section: {name}"))?,
            };
            println!("{}", serde_json::to_string_pretty(shown)?);
        }
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            let path = Config::path()?;
            Config::default().save_to(&path)?;
            println!("defaults written to {}", path.display());
        }
    }
    Ok(())
}
