//! extgen command-line entry point
//!
//! Loads one or more registry XML files and a driver declaration, resolves
//! the extension table and writes the C header/source pair.

use anyhow::{Context, Result};
use clap::Parser;
use extgen::build::{run, BuildError, GenerateRequest, OutputPaths};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "extgen")]
#[command(about = "Generate Vulkan driver extension tables from the API registry")]
#[command(version)]
struct Args {
    /// Vulkan API XML file (repeatable; merged in order)
    #[arg(long = "xml", value_name = "PATH", required = true)]
    xml_files: Vec<PathBuf>,

    /// Driver declaration file (TOML)
    #[arg(long, value_name = "PATH")]
    declaration: PathBuf,

    /// Output C file
    #[arg(long, value_name = "PATH")]
    out_c: PathBuf,

    /// Output H file
    #[arg(long, value_name = "PATH")]
    out_h: PathBuf,

    /// Override the declaration's maximum API version
    #[arg(long, value_name = "VERSION")]
    max_api_version: Option<String>,

    /// Override the declaration's symbol prefix
    #[arg(long, value_name = "IDENT")]
    prefix: Option<String>,

    /// Also write the resolved table as JSON
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Disable presentation extensions owned by the OS loader
    #[arg(long, env = "EXTGEN_OS_OWNED_PRESENTATION")]
    os_owned_presentation: bool,

    /// Suppress every extension carrying this platform tag, or `wsi` for
    /// every presentation extension (repeatable)
    #[arg(long = "suppress-platform", value_name = "TAG")]
    suppress_platforms: Vec<String>,

    /// Extra header for the generated source to include (repeatable)
    #[arg(long = "include", value_name = "HEADER")]
    includes: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn request(&self) -> Result<GenerateRequest> {
        let header_name = self
            .out_h
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("--out-h has no file name: {}", self.out_h.display()))?;

        let mut request = GenerateRequest::new(&self.xml_files, &self.declaration)
            .os_owned_presentation(self.os_owned_presentation)
            .header_name(header_name);
        request.max_api_version = self.max_api_version.clone();
        request.prefix = self.prefix.clone();
        request.suppress_platforms = self.suppress_platforms.clone();
        request.includes = self.includes.clone();
        request.manifest = self.manifest.is_some();
        Ok(request)
    }

    fn outputs(&self) -> OutputPaths {
        OutputPaths {
            header: self.out_h.clone(),
            source: self.out_c.clone(),
            manifest: self.manifest.clone(),
        }
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("EXTGEN_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn generate(args: &Args) -> Result<()> {
    let request = args.request()?;
    let paths = args.outputs();
    run(&request, &paths)?;
    info!(
        header = %paths.header.display(),
        source = %paths.source.display(),
        "extgen.done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(args.verbose);

    match generate(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<BuildError>()
                .map(BuildError::kind)
                .unwrap_or("Error");
            eprintln!("extgen: {}: {:#}", kind, err);
            ExitCode::FAILURE
        }
    }
}
