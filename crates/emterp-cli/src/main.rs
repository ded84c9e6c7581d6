use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use emterp::module::SourceModule;
use emterp::opcode::Opcode;
use emterp::CompileOptions;

/// On-disk shape of `<infile>`: the candidate functions/bodies plus the
/// native program text they get spliced back into. The module itself
/// never carries the program's full source, since most of a real program
/// has nothing to do with interpretation.
#[derive(Deserialize)]
struct CliInput {
    module: SourceModule,
    native_text: String,
}

#[derive(Parser)]
#[command(name = "emterp")]
#[command(about = "Lowers interpreted-candidate functions to bytecode and splices in a generated interpreter")]
struct Cli {
    /// JSON description of the module and the native source it calls into.
    infile: PathBuf,
    /// Where the rewritten source is written.
    outfile: PathBuf,
    /// Overrides the default `<outfile>.mem` path for the memory image.
    mem_file: Option<PathBuf>,
    /// Path to a JSON array of extra function names to exclude from interpretation.
    extra_blacklist: Option<PathBuf>,
    /// Gives the generated interpreter a two-tier decode loop: opcodes at
    /// or below this one (by name, e.g. "CONDD") get a tight inner loop.
    #[arg(long)]
    inner_terpreter_last_opcode: Option<String>,
}

fn parse_inner_terpreter_opt(name: Option<&str>) -> Result<Option<Opcode>> {
    let Some(name) = name else { return Ok(None) };
    emterp::opcode::OPCODE_TABLE
        .iter()
        .find(|op| op.name() == name)
        .copied()
        .map(Some)
        .with_context(|| format!("unknown opcode name {name:?} for --inner-terpreter-last-opcode"))
}

fn log_emterpreter_code(module: &SourceModule) {
    if std::env::var_os("EMCC_LOG_EMTERPRETER_CODE").is_none() {
        return;
    }
    for f in &module.functions {
        let mnemonics: Vec<&str> = f.body.iter().map(emterp::instr::Instr::mnemonic).collect();
        tracing::info!(
            function = %f.name,
            instructions = f.body.len(),
            code = %mnemonics.join(" "),
            "emterpreter bytecode"
        );
    }
}

fn load_extra_blacklist(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else { return Ok(Vec::new()) };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading extra blacklist file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing extra blacklist JSON in {}", path.display()))
}

fn run(cli: &Cli) -> Result<()> {
    let raw = fs::read(&cli.infile)
        .with_context(|| format!("reading input module {}", cli.infile.display()))?;

    let orig_path = append_ext(&cli.infile, "orig.js");
    fs::write(&orig_path, &raw)
        .with_context(|| format!("preserving original at {}", orig_path.display()))?;

    let input: CliInput = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing {} as a module description", cli.infile.display()))?;

    log_emterpreter_code(&input.module);

    let extra_blacklist = load_extra_blacklist(cli.extra_blacklist.as_deref())?;
    let inner_terpreter_last_opcode =
        parse_inner_terpreter_opt(cli.inner_terpreter_last_opcode.as_deref())?;
    let options = CompileOptions {
        extra_blacklist,
        stack_max: None,
        mem_init_override: None,
        inner_terpreter_last_opcode,
    };

    let output = emterp::compile(&input.module, &input.native_text, &options)
        .context("lowering module to bytecode")?;

    let mem_path = cli.mem_file.clone().unwrap_or_else(|| append_ext(&cli.outfile, "mem"));

    fs::write(&cli.outfile, &output.rewritten.source)
        .with_context(|| format!("writing {}", cli.outfile.display()))?;
    fs::write(&mem_path, &output.rewritten.mem_init)
        .with_context(|| format!("writing {}", mem_path.display()))?;

    tracing::info!(
        interpreted = output.interpreted.len(),
        stack_start = output.link.stack_start,
        "module lowered"
    );
    Ok(())
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("emterp: {err:#}");
            ExitCode::FAILURE
        }
    }
}
