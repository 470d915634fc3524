use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;
use snafu::ResultExt;

use rminic::error::{ReadSourceSnafu, WriteArtifactSnafu};
use rminic::{CompileOptions, CompileResult, Generator, Session};

/// Compile a source file to x86-64 assembly.
#[derive(Parser)]
#[command(name = "rminic", version)]
struct Cli {
  /// Source file to compile
  #[arg(value_name = "SOURCE")]
  source: PathBuf,

  /// Where to write the assembly (default: SOURCE with a `.s` extension)
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,
}

fn run(cli: &Cli) -> CompileResult<PathBuf> {
  let source = fs::read_to_string(&cli.source).context(ReadSourceSnafu {
    path: cli.source.clone(),
  })?;

  let mut session = Session::with_options(CompileOptions {
    echo_diagnostics: true,
  });
  let asm = Generator::new(&mut session).run(&source)?;

  let output = cli
    .output
    .clone()
    .unwrap_or_else(|| cli.source.with_extension("s"));
  fs::write(&output, asm).context(WriteArtifactSnafu {
    path: output.clone(),
  })?;
  Ok(output)
}

fn main() {
  env_logger::init();
  let cli = Cli::parse();

  match run(&cli) {
    Ok(output) => info!("wrote {}", output.display()),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
