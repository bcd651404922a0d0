//! CLI probe entry point.
//!
//! # Responsibility
//! - Verify `petprogress_core` linkage without the host runtime.
//! - Print today's tasks and the next display entries for a given store file.
//!
//! Usage: `petprogress_cli [STATE_PATH] [HOURS] [LOG_DIR]`
//!
//! With `LOG_DIR` the probe logs as the display process.

use chrono::Local;
use petprogress_core::{
    default_log_level, init_logging_as, FileStateStore, PetEvolutionEngine, ProcessRole,
    TaskService, TimelineScheduler,
};
use std::process::ExitCode;

const DEFAULT_HOURS: usize = 6;

fn main() -> ExitCode {
    println!("petprogress_core ping={}", petprogress_core::ping());
    println!("petprogress_core version={}", petprogress_core::core_version());

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        return ExitCode::SUCCESS;
    };
    let hours = args
        .next()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HOURS);
    if let Some(log_dir) = args.next() {
        if let Err(err) = init_logging_as(ProcessRole::Display, default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let now = Local::now();
    let service = TaskService::new(FileStateStore::new(&path), PetEvolutionEngine::default());
    let snapshot = match service.current_tasks(&now) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("failed to load {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "day={} stage={} ({}) xp={} grace={}m",
        snapshot.day_key,
        snapshot.pet.stage_index,
        snapshot.stage_name,
        snapshot.pet.stage_xp,
        snapshot.grace_minutes
    );
    for task in snapshot
        .active
        .iter()
        .filter(|task| task.day_key != snapshot.day_key)
    {
        println!("[*] {} {} {} ({})", task.day_key, task.time, task.title, task.instance_id);
    }
    for task in &snapshot.tasks {
        let marker = if task.is_completed {
            "x"
        } else if snapshot.active.contains(task) {
            "*"
        } else {
            " "
        };
        println!("[{marker}] {} {} ({})", task.time, task.title, task.instance_id);
    }

    let scheduler = TimelineScheduler::new(FileStateStore::new(&path), PetEvolutionEngine::default())
        .with_entry_count(hours);
    match scheduler.build(&now) {
        Ok(timeline) => {
            for entry in &timeline.entries {
                println!(
                    "{} day={} active={} stage={}",
                    entry.timestamp.format("%Y-%m-%d %H:%M %:z"),
                    entry.day_key,
                    entry.active.len(),
                    entry.stage_name
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to build timeline: {err}");
            ExitCode::FAILURE
        }
    }
}
