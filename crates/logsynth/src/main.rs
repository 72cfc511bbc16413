mod config;

use clap::{Parser, Subcommand};
use config::{Config, LineFormat};
use logsynth_core::stats::{goodness_of_fit, GoodnessOfFit};
use logsynth_core::{weblog, Event, EventError, LogGenerator, WeightedKeySampler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// logsynth: synthetic user-activity logs with long-tailed popularity.
#[derive(Parser)]
#[command(name = "logsynth", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write generated events to stdout, one per line.
    Generate {
        /// TOML config file (defaults to ./logsynth.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of events, overrides the config file
        #[arg(long)]
        count: Option<u64>,

        /// RNG seed, overrides the config file
        #[arg(long)]
        seed: Option<u64>,

        /// Line format, overrides the config file
        #[arg(long, value_enum)]
        format: Option<LineFormat>,
    },

    /// Draw keys from a rank sampler and report how well they fit.
    Check {
        /// Number of distinct keys
        #[arg(long, default_value_t = 1_000)]
        size: u64,

        /// Zipfian skew in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        skew: f64,

        /// Number of draws
        #[arg(long, default_value_t = 100_000)]
        samples: u64,

        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate events read from stdin.
    Parse {
        /// Line format of the input
        #[arg(long, value_enum, default_value_t = LineFormat::Compact)]
        format: LineFormat,

        /// Abort on the first malformed line instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Re-emit valid events to stdout in compact form
        #[arg(long)]
        emit: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Generate {
            config,
            count,
            seed,
            format,
        } => generate(config, count, seed, format),
        Command::Check {
            size,
            skew,
            samples,
            seed,
            json,
        } => check(size, skew, samples, seed, json),
        Command::Parse {
            format,
            strict,
            emit,
        } => parse(format, strict, emit),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "logsynth failed");
            ExitCode::FAILURE
        }
    }
}

fn generate(
    path: Option<PathBuf>,
    count: Option<u64>,
    seed: Option<u64>,
    format: Option<LineFormat>,
) -> Result<(), Box<dyn Error>> {
    let mut config = Config::resolve(path.as_deref())?;
    if seed.is_some() {
        config.generator.seed = seed;
    }
    let count = count.unwrap_or(config.output.count);
    let format = format.unwrap_or(config.output.format);

    tracing::info!(
        count,
        users = config.generator.users.size,
        addresses = config.generator.addresses.size,
        operations = config.generator.operations.tokens.len(),
        seed = ?config.generator.seed,
        ?format,
        "generating events"
    );

    let start = Instant::now();
    let mut gen = LogGenerator::from_config(config.generator)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for ev in gen.events().take(count as usize) {
        let written = match format {
            LineFormat::Compact => ev.write_to(&mut out),
            LineFormat::Weblog => {
                let line = weblog::format(&ev).ok_or_else(|| {
                    format!("timestamp {} cannot be rendered", ev.timestamp_millis())
                })?;
                writeln!(out, "{line}")
            }
        };
        match written {
            Ok(()) => {}
            // downstream closed early, e.g. `| head`
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    if let Err(e) = out.flush() {
        if e.kind() != io::ErrorKind::BrokenPipe {
            return Err(e.into());
        }
    }

    tracing::info!(
        emitted = gen.emitted(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "done"
    );
    Ok(())
}

fn check(
    size: u64,
    skew: f64,
    samples: u64,
    seed: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut sampler = WeightedKeySampler::new(size, skew, rng)?;
    let table = sampler.table().clone();
    let fit = goodness_of_fit(&table, sampler.rng_mut(), samples);

    if json {
        println!("{}", serde_json::to_string_pretty(&fit)?);
    } else {
        print_fit(&fit, skew);
    }
    Ok(())
}

fn print_fit(fit: &GoodnessOfFit, skew: f64) {
    println!("keys              {}", fit.keys);
    println!("skew              {skew}");
    println!("samples           {}", fit.samples);
    println!("chi-squared       {:.2}", fit.chi_squared);
    println!("chi-squared / dof {:.4}", fit.chi_squared_ratio);
    println!("relative entropy  {:.6}", fit.relative_entropy);
    println!("entropy (bits)    {:.4}", fit.entropy_bits);
}

fn parse(format: LineFormat, strict: bool, emit: bool) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let mut out = BufWriter::new(io::stdout().lock());
    let mut valid = 0u64;
    let mut invalid = 0u64;

    for (index, raw) in stdin.lock().split(b'\n').enumerate() {
        let raw = raw.map_err(EventError::from)?;
        let parsed = match String::from_utf8(raw) {
            Ok(line) => {
                let line = line.strip_suffix('\r').unwrap_or(&line);
                match format {
                    LineFormat::Compact => line.parse::<Event>().map_err(Box::<dyn Error>::from),
                    LineFormat::Weblog => weblog::parse(line).map_err(Box::<dyn Error>::from),
                }
            }
            Err(e) => Err(format!("line is not valid UTF-8: {e}").into()),
        };
        match parsed {
            Ok(ev) => {
                valid += 1;
                if emit {
                    ev.write_to(&mut out)?;
                }
            }
            Err(e) if strict => return Err(e),
            Err(e) => {
                invalid += 1;
                tracing::warn!(line = index + 1, error = %e, "skipping malformed event");
            }
        }
    }
    tracing::info!(valid, invalid, "parsed events");
    if !emit {
        writeln!(out, "valid {valid}")?;
        writeln!(out, "invalid {invalid}")?;
    }
    out.flush()?;
    Ok(())
}
