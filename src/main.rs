// hexpat: run a pattern file against a binary file and print the pattern tree

use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use tracing_subscriber::EnvFilter;

use hexpat::config::{parse_c_integer, RuntimeConfig};
use hexpat::console::LogLevel;
use hexpat::memory::data_source::MemoryDataSource;
use hexpat::memory::Endian;
use hexpat::parser::preprocessor::FsIncludeResolver;
use hexpat::pattern::PatternData;
use hexpat::PatternLanguage;

struct Options {
    pattern: PathBuf,
    data: PathBuf,
    config: RuntimeConfig,
    include_paths: Vec<PathBuf>,
}

fn usage(program_name: &str) -> ! {
    eprintln!("Usage: {} [options] <pattern.hexpat> <data.bin>", program_name);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --endian <little|big>     default byte order");
    eprintln!("  --eval-depth <n>          recursion limit");
    eprintln!("  --base-address <addr>     base address of the data");
    eprintln!("  -I <dir>                  add an include search path");
    std::process::exit(1);
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut config = RuntimeConfig::default();
    let mut include_paths = Vec::new();
    let mut positional = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        let mut value = |flag: &str| iter.next().cloned().ok_or_else(|| format!("missing value for '{}'", flag));
        match arg {
            "--endian" => {
                let value = value(arg)?;
                let endian = Endian::from_pragma(&value).ok_or_else(|| format!("invalid endian '{}'", value))?;
                config = config.with_endian(endian);
            }
            "--eval-depth" => {
                let value = value(arg)?;
                let depth = parse_c_integer(&value)
                    .and_then(|depth| u32::try_from(depth).ok())
                    .filter(|depth| *depth > 0)
                    .ok_or_else(|| format!("invalid evaluation depth '{}'", value))?;
                config = config.with_recursion_limit(depth);
            }
            "--base-address" => {
                let value = value(arg)?;
                let address = parse_c_integer(&value)
                    .and_then(|address| u64::try_from(address).ok())
                    .ok_or_else(|| format!("invalid base address '{}'", value))?;
                config = config.with_base_address(address);
            }
            "-I" => include_paths.push(PathBuf::from(value(arg)?)),
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            path => positional.push(PathBuf::from(path)),
        }
    }

    match <[PathBuf; 2]>::try_from(positional) {
        Ok([pattern, data]) => Ok(Options {
            pattern,
            data,
            config,
            include_paths,
        }),
        Err(_) => Err("expected a pattern file and a data file".to_string()),
    }
}

fn print_pattern(out: &mut impl Write, pattern: &PatternData, depth: usize) -> io::Result<()> {
    let [_, r, g, b] = pattern.color.to_be_bytes();
    queue!(
        out,
        Print("  ".repeat(depth)),
        SetForegroundColor(Color::Rgb { r, g, b }),
        Print("■ "),
        ResetColor,
        Print(format!("{}\n", pattern))
    )?;
    for child in &pattern.children {
        print_pattern(out, child, depth + 1)?;
    }
    Ok(())
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Debug => Color::DarkGrey,
        LogLevel::Info => Color::Reset,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("hexpat");

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            usage(program_name);
        }
    };

    let bytes = match std::fs::read(&options.data) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", options.data.display(), e);
            std::process::exit(1);
        }
    };
    let mut source = MemoryDataSource::new(bytes);

    let mut include_paths = options.include_paths;
    if let Some(dir) = options.pattern.parent() {
        include_paths.push(dir.to_path_buf());
    }

    let mut runtime = PatternLanguage::with_config(options.config);
    runtime.set_include_resolver(Box::new(FsIncludeResolver::new(include_paths)));

    let patterns = runtime.execute_file(&mut source, &options.pattern);

    let mut stdout = io::stdout().lock();
    if let Some(patterns) = &patterns {
        for pattern in patterns {
            print_pattern(&mut stdout, pattern, 0)?;
        }
    }

    for (level, message) in runtime.console_log() {
        queue!(
            stdout,
            SetForegroundColor(level_color(*level)),
            Print(format!("[{}] ", level)),
            ResetColor,
            Print(format!("{}\n", message))
        )?;
    }
    stdout.flush()?;

    if let Some(err) = runtime.error() {
        eprintln!("{}", err);
        std::process::exit(1);
    }

    Ok(())
}
