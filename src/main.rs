use clap::Parser as _;
use std::io::{self, Read as _};
use std::path::PathBuf;

use p2c::driver::{self, Mode, Settings};

#[derive(clap::Parser, Debug)]
#[command(name = "p2c", about = "Pascal-subset to C translator")]
struct Args {
    /// Input source file. When omitted, stdin carries a mode byte and a
    /// colorize byte followed by the source.
    input: Option<PathBuf>,

    /// Artifact to write to stdout
    #[arg(short, long, value_enum, default_value_t = Emit::Code)]
    emit: Emit,

    /// Colorize the parse-tree dump
    #[arg(long)]
    color: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Emit {
    /// Token dump
    Tokens,
    /// Parse-tree dump
    Tree,
    /// Translated C source
    Code,
}

impl From<Emit> for Mode {
    fn from(emit: Emit) -> Self {
        match emit {
            Emit::Tokens => Mode::Tokens,
            Emit::Tree => Mode::ParseTree,
            Emit::Code => Mode::CCode,
        }
    }
}

/// Splits the stdin protocol: a header line holding the mode number and the
/// colorize flag, then the source text.
fn parse_protocol(input: &str) -> (Mode, bool, &str) {
    let (header, source) = input.split_once('\n').unwrap_or((input, ""));
    let mut fields = header.split_whitespace();
    let mode = match fields.next().and_then(|f| f.parse::<u8>().ok()) {
        Some(0) => Mode::Tokens,
        Some(1) => Mode::ParseTree,
        _ => Mode::CCode,
    };
    let colorize = fields.next().and_then(|f| f.parse::<u8>().ok()).unwrap_or(0) != 0;
    (mode, colorize, source)
}

fn main() {
    let args = Args::parse();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    let code = match &args.input {
        Some(path) => {
            let mut settings = Settings {
                mode: args.emit.into(),
                colorize: args.color,
                out: &mut stdout,
                diag: &mut stderr,
            };
            match driver::compile_file(path, &mut settings) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("{e}");
                    1
                }
            }
        }
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => {
                    let (mode, colorize, source) = parse_protocol(&buffer);
                    let mut settings = Settings {
                        mode,
                        colorize,
                        out: &mut stdout,
                        diag: &mut stderr,
                    };
                    driver::run_source(source, &mut settings)
                }
                Err(e) => {
                    eprintln!("io error: {e}");
                    1
                }
            }
        }
    };
    std::process::exit(code);
}
