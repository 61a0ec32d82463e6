use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

const MODES: [&str; 3] = ["per-draw", "host", "device"];

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for spinfield")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Run the benchmark harnesses
    Bench,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Headless run of every transform mode through spinfield-cli
    Smoke {
        /// Frames per mode
        #[arg(long, default_value = "30")]
        frames: u32,
        /// Instances per mode
        #[arg(short = 'n', long, default_value = "2000")]
        instances: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            cargo("test", &["test", "--workspace"])?;
            doc()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Bench => cargo("bench", &["bench", "--workspace"])?,
        Commands::Doc => doc()?,
        Commands::Build => cargo("build", &["build", "--workspace"])?,
        Commands::Smoke { frames, instances } => smoke(frames, instances)?,
    }

    Ok(())
}

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {step} failed");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

fn smoke(frames: u32, instances: u32) -> Result<()> {
    let frames = frames.to_string();
    let instances = instances.to_string();
    for mode in MODES {
        cargo(
            "run",
            &[
                "run",
                "--release",
                "-p",
                "spinfield-cli",
                "--",
                "run",
                "--interval-ms",
                "0",
                "--frames",
                &frames,
                "-n",
                &instances,
                "--mode",
                mode,
            ],
        )?;
    }
    Ok(())
}
