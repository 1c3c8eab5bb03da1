use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the Hello API demo workspace",
    long_about = "Provisions, exercises, and tears down the Hello API demo deployment,\n\
                  packages the Rust backend function, and runs CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the demo deployment (arguments are passed to the provision binary)
    Provision {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Delete everything recorded in the state file
    Decommission {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Log in through the browser and call the deployed API
    FetchTokens {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Cross-build the Rust backend function and zip it as `bootstrap`
    PackageFunction {
        /// Compilation target triple; the function runs on arm64
        #[arg(long, default_value = FUNCTION_TARGET)]
        target: String,
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        #[arg(long, default_value = "dist/hello_api_function.zip")]
        output: PathBuf,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

const FUNCTION_TARGET: &str = "aarch64-unknown-linux-gnu";
const FUNCTION_PACKAGE: &str = "hello_api_function";
const FUNCTION_BINARY: &str = "bootstrap";

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Workspace tests
    Test,
    /// Lint and test
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo<S: AsRef<str>>(args: &[S]) -> ExitStatus {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(&args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo<S: AsRef<str>>(args: &[S]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_binary(package: &str, bin: &str, passthrough: &[String]) {
    let mut args = vec![
        "run".to_string(),
        "-p".to_string(),
        package.to_string(),
        "--bin".to_string(),
        bin.to_string(),
    ];
    if !passthrough.is_empty() {
        args.push("--".to_string());
        args.extend(passthrough.iter().cloned());
    }
    run_cargo(&args);
}

fn package_function(target: &str, profile: BuildProfile, output: &Path) {
    ensure_rust_target_installed(target);
    warn_on_missing_cross_linker(target);

    step("Build backend function");
    let mut cargo_args = vec![
        "build",
        "-p",
        FUNCTION_PACKAGE,
        "--target",
        target,
        "--bin",
        FUNCTION_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package function zip");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(FUNCTION_BINARY);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).expect("failed to create output directory");
    }
    write_bootstrap_zip(&binary_path, output);

    let output = output.display();
    eprintln!(
        "\nPackaged artifact:\n- {output}\nDeploy it with `cargo run -p xtask -- provision --function-zip {output}`"
    );
}

fn ensure_rust_target_installed(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && !installed.lines().any(|line| line.trim() == target) {
        eprintln!(
            "required rust target `{target}` is not installed; install it with `rustup target add {target}`"
        );
        exit(1);
    }
}

/// Cross-building to arm64 Linux from another host needs a C linker for the
/// target unless cargo has been told about one.
fn warn_on_missing_cross_linker(target: &str) {
    if cfg!(all(target_os = "linux", target_arch = "aarch64")) || !target.starts_with("aarch64") {
        return;
    }
    let linker_key = format!(
        "CARGO_TARGET_{}_LINKER",
        target.replace('-', "_").to_uppercase()
    );
    if std::env::var_os(&linker_key).is_some() || tool_works("aarch64-linux-gnu-gcc") {
        return;
    }
    eprintln!(
        "warning: no cross-linker found for `{target}`; install `aarch64-linux-gnu-gcc` or set {linker_key}"
    );
}

fn tool_works(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn write_bootstrap_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        eprintln!("expected function binary at '{}'", binary_path.display());
        exit(1);
    }

    let binary = fs::read(binary_path).expect("failed to read function binary");
    let file = fs::File::create(zip_path).expect("failed to create function zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(FUNCTION_BINARY, options)
        .expect("failed to start bootstrap entry");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish function zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    for package in [
        "hello_api_core",
        "hello_api_provisioning",
        "hello_api_tokens",
        FUNCTION_PACKAGE,
    ] {
        step(&format!("Test {package}"));
        run_cargo(&["test", "-p", package]);
    }
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Provision { args } => run_binary("hello_api_provisioning", "provision", &args),
        Commands::Decommission { args } => {
            run_binary("hello_api_provisioning", "decommission", &args)
        }
        Commands::FetchTokens { args } => run_binary("hello_api_tokens", "fetch_tokens", &args),
        Commands::PackageFunction {
            target,
            profile,
            output,
        } => package_function(&target, profile, &output),
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::Check => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
