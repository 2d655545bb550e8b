//! Foreground runner: scheduler plus dismissal gate, driven from stdin.
//!
//! Every gate event and command result is printed to stdout as one JSON
//! line. Commands:
//!
//! ```text
//! select <option>      toggle an option of the current problem
//! answer <id>[,<id>]   submit an answer
//! snooze | stop | status
//! trigger <alarm-id>   ring a stored alarm now
//! quit
//! ```

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use clap::Args;
use quizalarm_core::{
    data_dir, gateway_for, AlarmScheduler, AlarmStore, AudioBackend, Config, DismissalGate, Event,
    GateHandle,
};
use serde::Serialize;
use serde_json::json;

use super::{open_store, problem_repository, split_list, CliResult};

#[derive(Args)]
pub struct RunArgs {
    /// Do not play sounds
    #[arg(long)]
    pub silent: bool,
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to serialize output"),
    }
}

pub fn run(args: RunArgs) -> CliResult {
    let config = Config::load()?;
    let base = data_dir()?;
    let store: Arc<dyn AlarmStore> = Arc::new(open_store()?);
    let repository = Arc::new(problem_repository(&config)?);

    let backend = if args.silent {
        AudioBackend::Silent
    } else {
        config.audio.backend
    };
    let audio = gateway_for(backend, base.join(&config.audio.fallback_sound));

    let mut gate = DismissalGate::spawn(audio, repository, config.gate_settings())?;
    let events = gate.subscribe();
    let printer = thread::spawn(move || {
        for event in events {
            emit(&event);
        }
    });

    let trigger_handle = gate.handle();
    let scheduler = AlarmScheduler::new(Arc::clone(&store), move |alarm| {
        emit(&Event::AlarmTriggered {
            alarm_id: alarm.id.clone(),
            label: alarm.label.clone(),
            at: Utc::now(),
        });
        trigger_handle.activate(alarm.clone());
    })
    .with_interval(config.poll_interval());
    scheduler.start()?;

    let handle = gate.handle();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if !dispatch(line.trim(), &handle, store.as_ref()) {
            break;
        }
    }

    scheduler.stop();
    gate.shutdown();
    if printer.join().is_err() {
        tracing::warn!("event printer panicked");
    }
    Ok(())
}

/// Handle one stdin command. Returns false on `quit`.
fn dispatch(line: &str, gate: &GateHandle, store: &dyn AlarmStore) -> bool {
    let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();

    match command {
        "" => {}
        "select" => emit(&json!({ "command": "select", "option": arg, "ok": gate.toggle_option(arg) })),
        "answer" => emit(&gate.submit_answer(split_list(arg))),
        "snooze" => emit(&gate.snooze()),
        "stop" => {
            gate.stop();
            emit(&json!({ "command": "stop", "ok": true }));
        }
        "status" => emit(&gate.snapshot()),
        "trigger" => match store.load(arg) {
            Ok(Some(alarm)) => {
                emit(&json!({ "command": "trigger", "ok": gate.activate(alarm) }));
            }
            Ok(None) => emit(&json!({ "command": "trigger", "error": format!("alarm not found: {arg}") })),
            Err(e) => emit(&json!({ "command": "trigger", "error": e.to_string() })),
        },
        "quit" | "exit" => return false,
        other => emit(&json!({ "error": format!("unknown command: {other}") })),
    }
    true
}
