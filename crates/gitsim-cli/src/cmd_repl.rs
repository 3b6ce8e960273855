use crate::render;
use anyhow::{Context, Result};
use gitsim_conductor::pipeline::parser::load_pipeline;
use gitsim_conductor::{InstantDelay, Simulator, TokioDelay};
use gitsim_core::{EngineError, LedgerOutcome, SimConfig};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

const HELP: &str = "\
commands:
  commit [msg]   commit locally
  push           publish local commits
  remote [msg]   simulate a teammate push
  pull           fetch remote commits
  deploy         run the feature deployment pipeline
  rollback       run the rollback pipeline
  status | files | log | history | json
  reset          restore the seeded session
  quit
Ctrl-C cancels a running pipeline.";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Commit(Option<String>),
    Push,
    Remote(Option<String>),
    Pull,
    Deploy,
    Rollback,
    Status,
    Files,
    Log,
    History,
    Reset,
    Json,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, Some(r.trim().to_string()).filter(|r| !r.is_empty())),
        None => (line, None),
    };
    let cmd = match word {
        "commit" => ReplCommand::Commit(rest),
        "remote" => ReplCommand::Remote(rest),
        other if rest.is_some() => return Err(format!("{other} takes no arguments")),
        "push" => ReplCommand::Push,
        "pull" => ReplCommand::Pull,
        "deploy" => ReplCommand::Deploy,
        "rollback" => ReplCommand::Rollback,
        "status" => ReplCommand::Status,
        "files" => ReplCommand::Files,
        "log" => ReplCommand::Log,
        "history" => ReplCommand::History,
        "reset" => ReplCommand::Reset,
        "json" => ReplCommand::Json,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(Some(cmd))
}

/// Execute `gitsim repl`
pub fn execute(config: SimConfig, real_delays: bool, pipelines: &[PathBuf]) -> Result<()> {
    let mut builder = Simulator::builder(config).with_notifier(Arc::new(render::ConsoleNotifier));
    builder = if real_delays {
        builder.with_delay(Arc::new(TokioDelay))
    } else {
        builder.with_delay(Arc::new(InstantDelay::new()))
    };
    for path in pipelines {
        builder = builder.with_pipeline(load_pipeline(path)?);
    }
    let sim = builder.build()?;

    // Ctrl-C cancels a run; with nothing running it exits.
    let handle = sim.clone();
    ctrlc::set_handler(move || {
        if !handle.cancel_run() {
            std::process::exit(130);
        }
    })
    .context("installing Ctrl-C handler")?;

    let rt = crate::runtime()?;
    println!("gitsim repl. Type `help` for commands.");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("gitsim> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };
        if cmd == ReplCommand::Quit {
            break;
        }
        tracing::debug!(?cmd, "repl command");
        match dispatch(&sim, &rt, cmd) {
            Ok(()) => {}
            Err(e) => match e.downcast_ref::<EngineError>() {
                Some(engine) if engine.is_rejection() => println!("rejected: {engine}"),
                _ => return Err(e),
            },
        }
    }
    Ok(())
}

fn dispatch(sim: &Simulator, rt: &tokio::runtime::Runtime, cmd: ReplCommand) -> Result<()> {
    match cmd {
        ReplCommand::Commit(msg) => {
            let c = sim.commit_local(msg.as_deref(), None)?;
            println!("{} {}  ({})", c.id, c.message, render::counts(&sim.counts()));
        }
        ReplCommand::Remote(msg) => {
            let c = sim.simulate_remote_push(msg.as_deref(), None)?;
            println!("{} {}  ({})", c.id, c.message, render::counts(&sim.counts()));
        }
        ReplCommand::Push => outcome("push", sim.push()?, sim),
        ReplCommand::Pull => outcome("pull", sim.pull()?, sim),
        ReplCommand::Deploy => {
            let report = rt.block_on(sim.run_feature_deployment())?;
            println!("{}", render::report(&report));
        }
        ReplCommand::Rollback => {
            let report = rt.block_on(sim.run_rollback())?;
            println!("{}", render::report(&report));
        }
        ReplCommand::Status => print!("{}", render::status(&sim.snapshot())),
        ReplCommand::Files => print!("{}", render::files(&sim.file_statuses())),
        ReplCommand::Log => print!("{}", render::log(&sim.log())),
        ReplCommand::History => print!("{}", render::history(&sim.history())),
        ReplCommand::Reset => {
            sim.reset()?;
            println!("session reset");
        }
        ReplCommand::Json => println!("{}", serde_json::to_string_pretty(&sim.snapshot())?),
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => {}
    }
    Ok(())
}

fn outcome(action: &str, outcome: LedgerOutcome, sim: &Simulator) {
    match outcome {
        LedgerOutcome::Applied { count } => {
            println!("{action}: {count} commit(s)  ({})", render::counts(&sim.counts()))
        }
        LedgerOutcome::NoOp => println!("{action}: nothing to do"),
    }
}
