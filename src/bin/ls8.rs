use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ls8_ensemble::err::Error as _;
use ls8_ensemble::parse::parse_program;
use ls8_ensemble::sim::device::{ChannelKeyboard, NullDevice, StdoutDisplay, TerminalKeyboard};
use ls8_ensemble::sim::mem::MachineInitStrategy;
use ls8_ensemble::sim::{SimErr, SimFlags, Simulator};

/// Where key presses come from.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KeyboardKind {
    /// Individual key presses from the terminal (raw mode, Ctrl-C stops the machine).
    Terminal,
    /// Bytes read from stdin on a background thread.
    Stdin,
    /// No keyboard is attached.
    None,
}

#[derive(Parser, Debug)]
#[command(name = "ls8")]
#[command(about = "Loads and runs an LS-8 program", long_about = None)]
struct Args {
    /// Path to the program (`.ls8` text, one binary byte per line)
    program: PathBuf,

    /// Load the program file as raw bytes instead of `.ls8` text
    #[arg(long)]
    raw: bool,

    /// Stop after executing this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Keyboard device to attach
    #[arg(long, value_enum, default_value_t = KeyboardKind::Terminal)]
    keyboard: KeyboardKind,

    /// Timer interrupt interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    timer_ms: u64,

    /// Disable the timer interrupt
    #[arg(long)]
    no_timer: bool,

    /// Fill memory and registers with random bytes from this seed before loading
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter (e.g. `info`, `ls8_ensemble=debug`), overrides RUST_LOG
    #[arg(long)]
    log: Option<String>,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,
}

/// How a run ended.
enum Outcome {
    Halted,
    Stopped(&'static str),
    Failed(SimErr),
}

fn init_logging(args: &Args) -> Result<()> {
    let mut filter = match &args.log {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log filter {level:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    if args.trace {
        filter = filter.add_directive("ls8_ensemble::trace=trace".parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load(args: &Args) -> Result<Vec<u8>> {
    let path = args.program.display();
    if args.raw {
        return std::fs::read(&args.program).with_context(|| format!("could not read {path}"));
    }

    let src = std::fs::read_to_string(&args.program).with_context(|| format!("could not read {path}"))?;
    parse_program(&src).map_err(|e| {
        let help = e.help().map(|h| format!(" (help: {h})")).unwrap_or_default();
        anyhow::anyhow!("{path}: {e}{help}")
    })
}

fn simulate(args: &Args, program: &[u8]) -> Result<Outcome> {
    let machine_init = match args.seed {
        Some(seed) => MachineInitStrategy::Seeded { seed },
        None => MachineInitStrategy::default(),
    };
    let mut sim = Simulator::new(SimFlags { machine_init, ..Default::default() });

    sim.device_handler.timer.interval = Duration::from_millis(args.timer_ms);
    sim.device_handler.timer.enabled = !args.no_timer;

    // Piped stdin is read as bytes, not as terminal key presses.
    let keyboard = match args.keyboard {
        KeyboardKind::Terminal if !std::io::stdin().is_terminal() => KeyboardKind::Stdin,
        kind => kind,
    };
    let mut raw_mode = false;
    match keyboard {
        KeyboardKind::Terminal => match TerminalKeyboard::new(sim.mcr().clone()) {
            Ok(kb) => {
                sim.device_handler.set_keyboard(kb);
                raw_mode = true;
            },
            Err(e) => {
                tracing::warn!("could not open terminal keyboard ({e}), reading stdin instead");
                sim.device_handler.set_keyboard(ChannelKeyboard::stdin());
            },
        },
        KeyboardKind::Stdin => sim.device_handler.set_keyboard(ChannelKeyboard::stdin()),
        KeyboardKind::None => sim.device_handler.set_keyboard(NullDevice),
    }
    let display = StdoutDisplay::new(raw_mode).stop_on_error(sim.mcr().clone());
    sim.device_handler.set_display(display);

    if let Err(e) = sim.load_program(program) {
        return Ok(Outcome::Failed(e));
    }

    let result = match args.max_steps {
        Some(n) => sim.run_with_limit(n),
        None => sim.run(),
    };

    // The simulator owns the terminal keyboard, so dropping it here leaves raw mode
    // before anything is reported.
    let outcome = match result {
        Err(e) => Outcome::Failed(e),
        Ok(()) if sim.hit_halt() => Outcome::Halted,
        Ok(()) if sim.hit_mcr_off() => Outcome::Stopped("machine stopped before halting"),
        Ok(()) => Outcome::Stopped("step limit reached"),
    };
    drop(sim);

    Ok(outcome)
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    let outcome = load(&args).and_then(|program| simulate(&args, &program));
    match outcome {
        Ok(Outcome::Halted) => ExitCode::SUCCESS,
        Ok(Outcome::Stopped(reason)) => {
            eprintln!("{reason}");
            ExitCode::from(2)
        },
        Ok(Outcome::Failed(e)) => {
            eprintln!("error: {e}");
            if let Some(help) = e.help() {
                eprintln!("help: {help}");
            }
            ExitCode::FAILURE
        },
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
