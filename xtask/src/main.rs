//! Build automation for astra
//!
//! Usage: cargo xtask <command>
//!
//! Available commands:
//! - build: Build the binary
//! - test: Run unit and CLI tests
//! - dist: Package a release tarball
//! - install: Install the binary
//! - completions: Write shell completion scripts
//! - ci: Run CI checks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

const BIN: &str = "astra";
const SHELLS: [&str; 4] = ["bash", "zsh", "fish", "powershell"];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for astra")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the binary
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Only the tests under tests/
        #[arg(long)]
        integration: bool,
    },
    /// Package a release tarball with completions
    Dist {
        /// Target triple (e.g., x86_64-unknown-linux-gnu)
        #[arg(long)]
        target: Option<String>,
    },
    /// Install to system
    Install {
        #[arg(long, default_value = "/usr/local")]
        prefix: String,
    },
    /// Write completion scripts for every supported shell
    Completions {
        #[arg(long, default_value = "dist/completions")]
        out: PathBuf,
    },
    /// Run CI checks (format, clippy, test)
    Ci,
    /// Format code
    #[command(alias = "fmt")]
    Format {
        #[arg(long)]
        check: bool,
    },
    #[command(alias = "lint")]
    Clippy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    sh.change_dir(project_root()?);

    match cli.command {
        Commands::Build { release } => build(&sh, release),
        Commands::Test { integration } => test(&sh, integration),
        Commands::Dist { target } => dist(&sh, target),
        Commands::Install { prefix } => install(&sh, &prefix),
        Commands::Completions { out } => completions(&sh, &binary(None)?, &out),
        Commands::Ci => ci(&sh),
        Commands::Format { check } => format(&sh, check),
        Commands::Clippy => clippy(&sh),
    }
}

/// Release binary, built for `target` when given.
fn binary(target: Option<&str>) -> Result<PathBuf> {
    let root = project_root()?;
    Ok(match target {
        Some(triple) => root.join(format!("target/{}/release/{}", triple, BIN)),
        None => root.join(format!("target/release/{}", BIN)),
    })
}

fn git_commit(sh: &Shell) -> String {
    cmd!(sh, "git rev-parse --short HEAD")
        .quiet()
        .read()
        .unwrap_or_else(|_| "unknown".to_string())
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building {}...", BIN);
    let _commit = sh.push_env("ASTRA_GIT_COMMIT", git_commit(sh));

    if release {
        cmd!(sh, "cargo build --release --bin {BIN}").run()?;
        println!("✅ Release build completed: target/release/{}", BIN);
    } else {
        cmd!(sh, "cargo build --bin {BIN}").run()?;
        println!("✅ Debug build completed: target/debug/{}", BIN);
    }
    Ok(())
}

fn test(sh: &Shell, integration: bool) -> Result<()> {
    println!("🧪 Running tests...");
    // Keep the consent prompt and the telemetry upload out of test runs.
    let _consent = sh.push_env("astra_TRACKING_CONSENT", "no");
    let _telemetry = sh.push_env("astra_DISABLE_TELEMETRY", "true");

    if integration {
        cmd!(sh, "cargo test --test '*'").run()?;
    } else {
        cmd!(sh, "cargo test --workspace").run()?;
    }

    println!("✅ All tests passed");
    Ok(())
}

fn completions(sh: &Shell, binary: &Path, out: &Path) -> Result<()> {
    sh.create_dir(out)?;
    for shell in SHELLS {
        let script = cmd!(sh, "{binary} completion {shell}")
            .read()
            .with_context(|| format!("Failed to generate {} completion", shell))?;
        sh.write_file(out.join(format!("{}.{}", BIN, shell)), script)?;
    }
    println!("✅ Completions written to {}", out.display());
    Ok(())
}

fn dist(sh: &Shell, target: Option<String>) -> Result<()> {
    println!("📦 Creating distribution package...");
    let _commit = sh.push_env("ASTRA_GIT_COMMIT", git_commit(sh));

    if let Some(ref triple) = target {
        cmd!(sh, "cargo build --release --bin {BIN} --target {triple}").run()?;
    } else {
        cmd!(sh, "cargo build --release --bin {BIN}").run()?;
    }

    let dist_dir = project_root()?.join("dist");
    sh.remove_path(&dist_dir)?;
    sh.create_dir(&dist_dir)?;

    let binary_src = binary(target.as_deref())?;
    sh.copy_file(&binary_src, dist_dir.join(BIN))?;
    completions(sh, &binary_src, &dist_dir.join("completions"))?;

    let version = env!("CARGO_PKG_VERSION");
    let archive_name = match target {
        Some(triple) => format!("{}-{}-{}.tar.gz", BIN, version, triple),
        None => format!("{}-{}.tar.gz", BIN, version),
    };

    cmd!(sh, "tar -czf {archive_name} -C dist {BIN} completions")
        .run()
        .context("Failed to create tarball")?;

    println!("✅ Distribution package created: {}", archive_name);
    Ok(())
}

fn install(sh: &Shell, prefix: &str) -> Result<()> {
    println!("📥 Installing {} to {}...", BIN, prefix);

    let binary = binary(None)?;
    if !binary.exists() {
        println!("Building release binary first...");
        build(sh, true)?;
    }

    let bin_dir = Path::new(prefix).join("bin");
    sh.create_dir(&bin_dir)?;

    let install_path = bin_dir.join(BIN);
    sh.copy_file(&binary, &install_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&install_path, std::fs::Permissions::from_mode(0o755))?;
    }

    println!("✅ Installed to: {}", install_path.display());
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔍 Running CI checks...");

    println!("\n📝 Checking formatting...");
    format(sh, true)?;

    println!("\n🔧 Running clippy...");
    clippy(sh)?;

    println!("\n🧪 Running tests...");
    test(sh, false)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    if check {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Code formatting is correct");
    } else {
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Code formatted");
    }
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("✅ Clippy checks passed");
    Ok(())
}

fn project_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask is not inside the workspace")
}
