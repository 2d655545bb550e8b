//! Alarm management commands for CLI.

use chrono::{Local, NaiveDateTime};
use clap::Subcommand;
use quizalarm_core::storage::{export_alarms, import_alarms};
use quizalarm_core::{should_trigger, Alarm, AlarmStore, AlarmTime, Config, Difficulty, Weekday};

use super::{open_store, split_list, CliResult};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// List alarms
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one alarm as JSON
    Show {
        /// Alarm ID
        id: String,
    },
    /// Create an alarm
    Add {
        /// Time of day, "HH:MM"
        time: String,
        /// Comma-separated weekdays (e.g. "mon,wed,fri"); default every day
        #[arg(long)]
        days: Option<String>,
        #[arg(long, default_value = "")]
        label: String,
        /// Comma-separated problem sets (default: config defaults.problem_sets)
        #[arg(long)]
        sets: Option<String>,
        /// easy, medium or hard (default: config defaults.difficulty)
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Sound file path
        #[arg(long)]
        sound: Option<String>,
        /// Volume 0.0..=1.0 (default: config defaults.volume)
        #[arg(long)]
        volume: Option<f64>,
        /// Play the sound once instead of looping
        #[arg(long)]
        no_loop: bool,
        /// Disable snoozing
        #[arg(long)]
        no_snooze: bool,
        /// Snooze length in seconds
        #[arg(long)]
        snooze_secs: Option<u64>,
        /// Snoozes allowed per activation, 0 for unlimited
        #[arg(long)]
        snooze_max: Option<u32>,
    },
    /// Delete an alarm
    Remove {
        /// Alarm ID
        id: String,
    },
    /// Enable an alarm
    Enable {
        /// Alarm ID
        id: String,
    },
    /// Disable an alarm
    Disable {
        /// Alarm ID
        id: String,
    },
    /// Import alarms from a JSON file
    Import {
        /// Path to a JSON array of alarms
        file: String,
    },
    /// Export all alarms as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
    /// Show which alarms would fire at a given time
    Check {
        /// Local time "YYYY-MM-DDTHH:MM:SS" (default: now)
        #[arg(long)]
        at: Option<String>,
    },
}

pub fn run(action: AlarmAction) -> CliResult {
    let store = open_store()?;

    match action {
        AlarmAction::List { json } => {
            let alarms = store.load_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&alarms)?);
            } else if alarms.is_empty() {
                println!("No alarms");
            } else {
                for alarm in &alarms {
                    println!("{}", summary(alarm));
                }
            }
        }
        AlarmAction::Show { id } => {
            let alarm = store.load(&id)?.ok_or(format!("Alarm not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&alarm)?);
        }
        AlarmAction::Add {
            time,
            days,
            label,
            sets,
            difficulty,
            sound,
            volume,
            no_loop,
            no_snooze,
            snooze_secs,
            snooze_max,
        } => {
            let config = Config::load_or_default();
            let defaults = &config.defaults;
            let time: AlarmTime = time.parse()?;
            let days = match days {
                Some(list) => split_list(&list)
                    .iter()
                    .map(|d| d.parse::<Weekday>())
                    .collect::<Result<Vec<_>, _>>()?,
                None => Weekday::ALL.to_vec(),
            };

            let mut alarm = Alarm::new(time, days);
            alarm.label = label;
            alarm.problem_sets = sets
                .map(|s| split_list(&s))
                .unwrap_or_else(|| defaults.problem_sets.clone());
            alarm.difficulty = difficulty.unwrap_or(defaults.difficulty);
            if let Some(file) = sound {
                alarm.sound.file = file;
            }
            alarm.sound.volume = volume.unwrap_or(defaults.volume);
            alarm.sound.looping = !no_loop;
            alarm.snooze.enabled = !no_snooze;
            alarm.snooze.duration = snooze_secs.unwrap_or(defaults.snooze_duration_secs);
            alarm.snooze.max_count = snooze_max.unwrap_or(defaults.snooze_max_count);

            store.save(&alarm)?;
            println!("Alarm created: {}", alarm.id);
            println!("{}", serde_json::to_string_pretty(&alarm)?);
        }
        AlarmAction::Remove { id } => {
            if !store.delete(&id)? {
                return Err(format!("Alarm not found: {id}").into());
            }
            println!("Alarm deleted: {id}");
        }
        AlarmAction::Enable { id } => set_enabled(&store, &id, true)?,
        AlarmAction::Disable { id } => set_enabled(&store, &id, false)?,
        AlarmAction::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let report = import_alarms(&store, &json)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AlarmAction::Export { output } => {
            let json = export_alarms(&store)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported to {path}");
                }
                None => println!("{json}"),
            }
        }
        AlarmAction::Check { at } => {
            let now = match at {
                Some(s) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")?,
                None => Local::now().naive_local(),
            };
            let due: Vec<_> = store
                .load_all()?
                .into_iter()
                .map(|alarm| {
                    serde_json::json!({
                        "id": alarm.id,
                        "time": alarm.time.to_string(),
                        "due": should_trigger(&alarm, now),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
    }
    Ok(())
}

fn set_enabled(store: &dyn AlarmStore, id: &str, enabled: bool) -> CliResult {
    let mut alarm = store.load(id)?.ok_or(format!("Alarm not found: {id}"))?;
    alarm.enabled = enabled;
    store.save(&alarm)?;
    println!("Alarm {}: {id}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn summary(alarm: &Alarm) -> String {
    let days: Vec<&str> = alarm.days.iter().map(|d| &d.as_str()[..3]).collect();
    format!(
        "{}  {}  [{}]  {:<8}  {}  {}",
        alarm.id,
        alarm.time,
        days.join(","),
        if alarm.enabled { "enabled" } else { "disabled" },
        alarm.difficulty,
        alarm.label,
    )
}
