//! GLSL validator / SPIR-V converter
//!
//! Usage:
//!   glsl_convert validate shader.frag
//!   glsl_convert convert shader.comp shader.spv --output-version vulkan1.1
//!   glsl_convert convert lighting.glsl lighting.spv --stage fragment \
//!       --input-version "450 core" -D MAX_LIGHTS=8 -g 1
//!   glsl_convert --backend naga validate shader.vert
//!
//! Exits with 1 if the shader is rejected or conversion fails.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use glsl_converter::{
    Backend, BackendRuntime, Configuration, Format, GlslConverter, NagaBackend, Stage,
    TargetEnvironment,
};

const DEFAULT_BACKEND: &str = if cfg!(feature = "shaderc") { "shaderc" } else { "naga" };

#[derive(Parser, Debug)]
#[command(name = "glsl_convert")]
#[command(about = "Validate GLSL shaders and convert them to SPIR-V", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Shader stage (vertex, fragment, compute, ...); detected from the
    /// filename if omitted
    #[arg(long, global = true, default_value = "unspecified")]
    stage: Stage,

    /// Force a GLSL version, e.g. "450 core" or "310 es"
    #[arg(long, global = true)]
    input_version: Option<String>,

    /// Target environment, e.g. "vulkan1.1" or "opengl4.5 spv1.2"
    #[arg(long, global = true)]
    output_version: Option<String>,

    /// Preprocessor definition NAME[=VALUE]
    #[arg(short = 'D', global = true, value_name = "NAME[=VALUE]")]
    define: Vec<String>,

    /// Debug info level: 0 for none, 1 to embed source and line info
    #[arg(short = 'g', long, global = true)]
    debug_info: Option<String>,

    /// JSON configuration document with converter defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Compiler backend
    #[arg(long, global = true, default_value = DEFAULT_BACKEND, value_parser = ["shaderc", "naga"])]
    backend: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a GLSL shader without compiling it
    Validate { input: PathBuf },

    /// Compile a GLSL shader to a SPIR-V module
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(cli.verbose)))
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool, String> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Configuration::new(),
    };

    let mut converter = GlslConverter::with_configuration(make_backend(&cli.backend)?, &config)
        .map_err(|e| e.to_string())?;

    if let Some(version) = &cli.input_version {
        converter
            .set_input_format(Format::Glsl, version)
            .map_err(|e| e.to_string())?;
    }
    if !cli.define.is_empty() {
        let definitions = cli.define.iter().map(|d| d.split_once('=').unwrap_or((d.as_str(), "")));
        converter.set_definitions(definitions).map_err(|e| e.to_string())?;
    }
    if let Some(level) = &cli.debug_info {
        converter.set_debug_info_level(level);
    }

    let _runtime = BackendRuntime::initialize();

    match &cli.command {
        Command::Validate { input } => {
            if let Some(version) = &cli.output_version {
                converter
                    .set_output_format(Format::Unspecified, version)
                    .map_err(|e| e.to_string())?;
            }

            let report = converter.validate_file(cli.stage, input);
            if !report.diagnostics.is_empty() {
                eprintln!("{}", report.diagnostics);
            }
            if report.accepted {
                println!("{}: OK", input.display());
            } else {
                println!("{}: FAILED", input.display());
            }
            Ok(report.accepted)
        }
        Command::Convert { input, output } => {
            let target = output_target(cli.output_version.as_deref(), converter.target());
            converter
                .set_output_format(Format::Spirv, &target)
                .map_err(|e| e.to_string())?;

            // The error carries the backend diagnostics, main prints it
            let module = converter.compile_file(cli.stage, input).map_err(|e| e.to_string())?;
            fs::write(output, module.as_bytes())
                .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;

            println!("Wrote {}", output.display());
            println!("  Stage:   {}", module.stage);
            println!("  Size:    {} bytes", module.as_bytes().len());
            println!("  SPIR-V:  {}", module.spirv_version);
            println!("  Id:      {}", module.id());
            Ok(true)
        }
    }
}

fn make_backend(name: &str) -> Result<Box<dyn Backend>, String> {
    match name {
        #[cfg(feature = "shaderc")]
        "shaderc" => glsl_converter::ShadercBackend::new()
            .map(|backend| Box::new(backend) as Box<dyn Backend>)
            .ok_or_else(|| "Failed to create a shaderc compiler".to_string()),
        #[cfg(not(feature = "shaderc"))]
        "shaderc" => Err("Built without shaderc support, use --backend naga".to_string()),
        "naga" => Ok(Box::new(NagaBackend::new())),
        other => Err(format!("Unknown backend {:?}", other)),
    }
}

/// Filter used when `RUST_LOG` isn't set.
fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Target for `convert`: the command line flag, else the configured one.
fn output_target(flag: Option<&str>, configured: TargetEnvironment) -> String {
    flag.map_or_else(|| configured.to_string(), str::to_string)
}

fn load_config(path: &Path) -> Result<Configuration, String> {
    let document = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Configuration::from_json_str(&document).map_err(|e| format!("{}: {}", path.display(), e))
}
