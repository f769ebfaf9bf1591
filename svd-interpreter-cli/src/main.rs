mod text;

use std::{
    io::{self, Write},
    path,
};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::warn;
use svd_interpreter::{parse_assignment, parse_int_literal, to_json, BaseValue, Device};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = None,
    author = clap::crate_authors!(),
    subcommand_required = true
)]
struct Cli {
    /// CMSIS-SVD source file, optionally compressed with LZMA (`.lzma` or `.xz`)
    #[arg(long, global = true, env = "SVD_FILE")]
    svd: Option<path::PathBuf>,

    /// Print machine-readable JSON instead of a report
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show device name, vendor, version and CPU information
    DeviceInfo,
    /// List all peripherals with their base addresses, grouped by peripheral group
    LsPeriph,
    /// Show details and bit fields of a register
    FindRegister { peripheral: String, register: String },
    /// Find registers whose name contains a pattern, ignoring case
    Search { pattern: String },
    /// Find the register(s) at a memory address
    FindByAddress {
        /// Hexadecimal (0x...) or decimal address
        address: String,
    },
    /// Find all registers between two addresses, both inclusive
    FindInRange { start: String, end: String },
    /// Calculate the absolute address of a register, or of all registers of a peripheral
    CalcAddress {
        peripheral: String,
        register: Option<String>,
    },
    /// Break a register value down into its bit fields
    Decode {
        /// PERIPHERAL.REGISTER or the address of the register
        register: String,
        value: String,
    },
    /// Compute a register value from bit field assignments
    ///
    /// Fields are assigned as FIELD=VALUE where VALUE is a number or the name of an enumerated
    /// value, e.g., `ENABLE=1 MODE=PERIODIC`.
    Encode {
        /// PERIPHERAL.REGISTER or the address of the register
        register: String,
        assignments: Vec<String>,
        /// Value to start from, or `reset` for the reset value of the register
        #[arg(long, default_value = "0")]
        base: String,
    },
}

fn parse_address(text: &str) -> anyhow::Result<u64> {
    parse_int_literal(text).with_context(|| format!("Invalid address format: {text}"))
}

fn print_json(out: &mut impl Write, value: &json::JsonValue) -> io::Result<()> {
    writeln!(out, "{}", to_json::pretty(value))
}

/// Run `command` on `device`, writing the report or JSON document to `out`
///
/// Returns an error for anything that should end the program with a failure status. An
/// invalid encoding is only an error for the text report, the JSON document carries its own
/// `valid` flag.
fn run(command: &Command, json: bool, device: &Device, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::DeviceInfo => {
            if json {
                print_json(out, &to_json::device_info(device))?;
            } else {
                text::device_info(out, device)?;
            }
        }
        Command::LsPeriph => {
            if json {
                print_json(out, &to_json::peripherals(device))?;
            } else {
                text::peripherals(out, device)?;
            }
        }
        Command::FindRegister {
            peripheral,
            register,
        } => {
            let r = device.find_register(peripheral, register).ok_or_else(|| {
                anyhow!("Register {register} not found in peripheral {peripheral}")
            })?;
            if json {
                print_json(out, &to_json::register(&r))?;
            } else {
                text::register(out, &r)?;
            }
        }
        Command::Search { pattern } => {
            let results = device.search_registers(pattern);
            if results.is_empty() {
                writeln!(out, "No registers found matching pattern: {pattern}")?;
            } else if json {
                print_json(out, &to_json::search_results(&results))?;
            } else {
                text::search_results(out, pattern, &results)?;
            }
        }
        Command::FindByAddress { address } => {
            let address = parse_address(address)?;
            let matches = device.registers_at(address);
            if json {
                print_json(out, &to_json::registers_at(address, &matches))?;
            } else {
                text::registers_at(out, address, &matches)?;
            }
        }
        Command::FindInRange { start, end } => {
            let (start, end) = (parse_address(start)?, parse_address(end)?);
            let matches = device.registers_in_range(start, end)?;
            if json {
                print_json(
                    out,
                    &to_json::registers_in_range(start, end, &matches),
                )?;
            } else {
                text::registers_in_range(out, start, end, &matches)?;
            }
        }
        Command::CalcAddress {
            peripheral,
            register,
        } => {
            let p = device
                .peripheral(peripheral)
                .ok_or_else(|| anyhow!("Peripheral {peripheral} not found"))?;
            match register {
                Some(register) => {
                    let r = device.find_register(peripheral, register).ok_or_else(|| {
                        anyhow!("Register {register} not found in peripheral {peripheral}")
                    })?;
                    if json {
                        print_json(out, &to_json::register_address(&r))?;
                    } else {
                        text::register_address(out, &r)?;
                    }
                }
                None => {
                    if json {
                        print_json(out, &to_json::peripheral_addresses(p))?;
                    } else {
                        text::peripheral_addresses(out, p)?;
                    }
                }
            }
        }
        Command::Decode { register, value } => {
            let value = parse_int_literal(value)
                .with_context(|| format!("Invalid value format: {value}"))?;
            let r = device
                .resolve(register)
                .ok_or_else(|| anyhow!("Register '{register}' not found"))?;
            let fields = svd_interpreter::decode(r.register, value);
            if json {
                print_json(out, &to_json::decoded(&r, value, &fields))?;
            } else {
                text::decoded(out, &r, value, &fields)?;
            }
        }
        Command::Encode {
            register,
            assignments,
            base,
        } => {
            let base: BaseValue = base
                .parse()
                .with_context(|| format!("Invalid base value: {base}"))?;
            let assignments = assignments
                .iter()
                .filter_map(|a| {
                    let assignment = parse_assignment(a);
                    if assignment.is_none() {
                        warn!("ignoring {a:?}, expected FIELD=VALUE");
                    }
                    assignment
                })
                .collect::<Vec<_>>();
            let r = device
                .resolve(register)
                .ok_or_else(|| anyhow!("Register '{register}' not found"))?;
            let encoding = svd_interpreter::encode(r.register, base, &assignments);
            if json {
                print_json(out, &to_json::encoded(&r, &encoding))?;
            } else {
                text::encoded(out, &r, &encoding)?;
                if !encoding.is_valid() {
                    bail!(
                        "{} of the field assignments could not be applied",
                        encoding.errors.len()
                    );
                }
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let svd = cli
        .svd
        .as_deref()
        .context("no SVD file given, use --svd or set SVD_FILE")?;
    let device =
        Device::load(svd).with_context(|| format!("could not load {}", svd.display()))?;
    run(&cli.command, cli.json, &device, &mut io::stdout().lock())
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn encode_accepts_base_in_either_form() {
    let cli = Cli::try_parse_from([
        "svdi",
        "--svd",
        "dev.svd",
        "encode",
        "TIMER0.CTRL",
        "ENABLE=1",
        "MODE=PERIODIC",
        "--base=reset",
        "--json",
    ])
    .unwrap();
    assert!(cli.json);
    match cli.command {
        Command::Encode {
            register,
            assignments,
            base,
        } => {
            assert_eq!(register, "TIMER0.CTRL");
            assert_eq!(assignments, ["ENABLE=1", "MODE=PERIODIC"]);
            assert_eq!(base, "reset");
        }
        _ => panic!("expected encode"),
    }
}

#[test]
fn svd_file_can_follow_the_subcommand() {
    let cli =
        Cli::try_parse_from(["svdi", "decode", "--svd", "dev.svd", "GPIO.OUT", "0x1"]).unwrap();
    assert_eq!(cli.svd, Some(path::PathBuf::from("dev.svd")));
}
