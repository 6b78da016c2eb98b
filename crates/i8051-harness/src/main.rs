use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use tracing::Level;

use i8051_harness::finalize::DEFAULT_SNAPSHOT;
use i8051_harness::{Driver, HarnessError, Outcome, Target, Trace};

#[derive(Parser)]
#[command(name = "emu8051", version, about)]
struct Args {
    /// Memory map and UART wiring to emulate
    #[arg(value_enum, value_name = "TARGET")]
    target: Target,

    /// Intel HEX object file to load
    #[arg(value_name = "OBJECT_FILE")]
    object_file: PathBuf,

    /// Trace every instruction to stdout
    #[arg(short, long)]
    trace: bool,

    /// Start tracing the first time PC reaches this address (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_addr, conflicts_with = "trace")]
    trace_from: Option<u16>,

    /// Where to write the 32K code snapshot
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SNAPSHOT)]
    dump: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<(), HarnessError> {
    let trace = match (args.trace, args.trace_from) {
        (true, _) => Trace::Always,
        (false, Some(addr)) => Trace::From(addr),
        (false, None) => Trace::Off,
    };

    let profile = args.target.profile();
    let mut driver = Driver::new(&profile, io::stdin().lock(), io::stdout().lock())?.with_trace(trace);
    driver.load(&args.object_file)?;

    let outcome = driver.run()?;
    match outcome {
        Outcome::Halted => tracing::info!("halted"),
        Outcome::EndOfInput => tracing::info!("end of input"),
        Outcome::IllegalOpcode { pc, opcode } => {
            tracing::info!("illegal opcode {opcode:02X} at {pc:04X}");
        }
    }
    if outcome.finalizes() {
        driver.finalize(&args.dump, &mut io::stderr().lock())
    } else {
        driver.flush()
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = io::stdout().flush();
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn addresses_are_hex() {
        assert_eq!(parse_addr("0x1F00"), Ok(0x1F00));
        assert_eq!(parse_addr("ff"), Ok(0xFF));
        assert!(parse_addr("10000").is_err());
        assert!(parse_addr("zz").is_err());
    }
}
