use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use auricle_engine::{Engine, EngineConfig, EngineState, Framework};
use auricle_sdk::Registry;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const EXIT_POLL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(author, version, about = "Real-time host for chains of audio processing modules")]
struct Cli {
    /// Engine settings (JSON). Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Read further commands from standard input, one per line.
    #[arg(long)]
    interactive: bool,
    /// Control commands, executed in order: `name=value`, `name?`,
    /// `?read:file`.
    commands: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load engine settings {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut framework = build_framework(config)?;
    let stdout = io::stdout();
    run_commands(&mut framework, &cli.commands, &mut stdout.lock())?;

    if cli.interactive {
        let stdin = io::stdin();
        interact(&mut framework, stdin.lock(), &mut stdout.lock())?;
    } else {
        wait_for_exit(&framework);
    }

    framework
        .engine()
        .quit()
        .context("failed to shut down the engine")
}

fn build_framework(config: EngineConfig) -> Result<Framework> {
    let mut registry = Registry::new();
    auricle_io::register(&mut registry);
    auricle_plugins::register(&mut registry);
    tracing::debug!(
        modules = ?registry.module_names(),
        drivers = ?registry.driver_names(),
        "static registry ready"
    );
    let engine = Engine::new(config, Arc::new(registry));
    Framework::new(engine).context("failed to create the control variables")
}

/// Executes command-line commands. The first failing one aborts the run.
fn run_commands(
    framework: &mut Framework,
    commands: &[String],
    out: &mut impl Write,
) -> Result<()> {
    for command in commands {
        let reply = framework
            .parse(command)
            .with_context(|| format!("command \"{command}\" failed"))?;
        print_reply(out, &reply)?;
        if framework.exit_requested() {
            break;
        }
    }
    Ok(())
}

/// Reads commands line by line until input ends or the engine exits.
/// Failing commands are reported and the loop continues.
fn interact(framework: &mut Framework, input: impl BufRead, out: &mut impl Write) -> Result<()> {
    for line in input.lines() {
        if framework.exit_requested() {
            break;
        }
        let line = line.context("failed to read from standard input")?;
        let command = line.trim();
        if command.is_empty() || command.starts_with('#') {
            continue;
        }
        match framework.parse(command) {
            Ok(reply) => {
                print_reply(out, &reply)?;
                writeln!(out, "(ok)")?;
            }
            Err(err) => {
                tracing::debug!(%command, %err, "command failed");
                writeln!(out, "{err}")?;
                writeln!(out, "(failure)")?;
            }
        }
        out.flush()?;
    }
    Ok(())
}

fn print_reply(out: &mut impl Write, reply: &str) -> io::Result<()> {
    if reply.is_empty() {
        return Ok(());
    }
    writeln!(out, "{reply}")
}

/// Keeps a started stream alive until the driver ends it or a command
/// requested the exit.
fn wait_for_exit(framework: &Framework) {
    let engine = framework.engine();
    while !engine.exit_requested()
        && matches!(
            engine.state(),
            EngineState::Starting | EngineState::Running | EngineState::Stopping
        )
    {
        thread::sleep(EXIT_POLL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn framework() -> Framework {
        build_framework(EngineConfig::default()).expect("framework")
    }

    #[test]
    fn command_line_replies_are_printed() {
        let mut framework = framework();
        let mut out = Vec::new();
        let commands = ["fragsize=64".to_owned(), "fragsize?".to_owned()];
        run_commands(&mut framework, &commands, &mut out).expect("commands");
        assert_eq!(String::from_utf8(out).expect("utf8"), "64\n");
    }

    #[test]
    fn failing_command_line_aborts() {
        let mut framework = framework();
        let mut out = Vec::new();
        let commands = ["cmd=start".to_owned(), "fragsize?".to_owned()];
        let err = run_commands(&mut framework, &commands, &mut out).expect_err("no library");
        assert_eq!(err.to_string(), "command \"cmd=start\" failed");
        assert!(out.is_empty());
    }

    #[test]
    fn interactive_failures_do_not_end_the_session() {
        let mut framework = framework();
        let mut out = Vec::new();
        let input = "# comment\nvolume=3\n\nmhalib=gain\nplugins?\ncmd=quit\nfragsize?\n";
        interact(&mut framework, input.as_bytes(), &mut out).expect("session");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "Invalid variable name \"volume\".\n(failure)\n(ok)\n[gain]\n(ok)\n(ok)\n"
        );
        assert!(framework.exit_requested());
    }
}
