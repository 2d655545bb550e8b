//! Problem set inspection commands for CLI.

use clap::Subcommand;
use quizalarm_core::problem::ProblemType;
use quizalarm_core::{Config, Difficulty};

use super::{problem_repository, CliResult};

#[derive(Subcommand)]
pub enum ProblemsAction {
    /// List available problem sets with their problem counts
    Sets,
    /// List problems of a set
    List {
        /// Set name (file stem under <problems_dir>/quiz/)
        set: String,
        /// Only problems of this difficulty
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },
    /// Validate set files and report skipped records
    Validate {
        /// Set name; all sets when omitted
        set: Option<String>,
    },
}

pub fn run(action: ProblemsAction) -> CliResult {
    let config = Config::load_or_default();
    let repo = problem_repository(&config)?;

    match action {
        ProblemsAction::Sets => {
            let sets: Vec<_> = repo
                .available_sets()
                .into_iter()
                .map(|name| {
                    let count = repo.load_problem_set(&name).len();
                    serde_json::json!({ "set": name, "problems": count })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&sets)?);
        }
        ProblemsAction::List { set, difficulty } => {
            let report = repo.load_set(&set)?;
            let rows: Vec<_> = report
                .problems
                .iter()
                .filter(|p| difficulty.map_or(true, |d| p.difficulty == d))
                .map(|p| {
                    serde_json::json!({
                        "id": p.id,
                        "type": p.problem_type().as_str(),
                        "difficulty": p.difficulty,
                        "title": p.title,
                        "playable": p.problem_type() == ProblemType::Quiz,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        ProblemsAction::Validate { set } => {
            let sets = match set {
                Some(name) => vec![name],
                None => repo.available_sets(),
            };
            let mut invalid = 0;
            for name in sets {
                let report = repo.load_set(&name)?;
                invalid += report.skipped.len();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "set": report.set_name,
                        "valid": report.problems.len(),
                        "skipped": report.skipped,
                    }))?
                );
            }
            if invalid > 0 {
                return Err(format!("{invalid} invalid problem record(s)").into());
            }
        }
    }
    Ok(())
}
