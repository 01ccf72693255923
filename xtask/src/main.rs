use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use memory_harvest_core::orchestration::state_machine_definition;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const RUNTIME_PACKAGE: &str = "memory_harvest_lambda";
const DIST_DIR: &str = "infra/lambda_memory_harvest/dist";

/// Binaries deployed as Lambda functions, packaged as `bootstrap` zips.
const LAMBDA_BINARIES: [&str; 2] = ["enumerator_lambda", "worker_lambda"];

/// Long-running binaries, copied next to the zips as-is.
const SERVICE_BINARIES: [&str; 2] = ["orchestrator", "queue_dispatcher"];

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the lambda memory harvest workspace",
    long_about = "Packages the harvest binaries for deployment, renders the\n\
                  orchestration state machine and runs CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the harvest binaries and package deployment artifacts
    ServerlessPackage {
        /// Compilation target triple for the binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Print the Amazon States Language definition of the orchestration loop
    StateMachine {
        /// Name or ARN of the deployed enumerator function
        #[arg(long, env = "ENUMERATOR_FUNCTION_NAME")]
        enumerator_function: String,
        /// Write the definition to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and all tests
    Check,
    /// Only the runtime crate's end-to-end tests
    Integration,
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

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_harvest_binaries(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);

    step("Build harvest binaries");
    let mut cargo_args = vec!["build", "-p", RUNTIME_PACKAGE, "--target", target];
    for bin in LAMBDA_BINARIES.iter().chain(SERVICE_BINARIES.iter()) {
        cargo_args.extend(["--bin", *bin]);
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package deployment artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let mut artifacts = Vec::new();
    for bin in LAMBDA_BINARIES {
        let zip_path = dist_dir.join(format!("{bin}.zip"));
        package_lambda_zip(&target_dir.join(binary_name(bin, target)), &zip_path);
        artifacts.push(zip_path);
    }
    for bin in SERVICE_BINARIES {
        let file_name = binary_name(bin, target);
        let destination = dist_dir.join(&file_name);
        fs::copy(target_dir.join(&file_name), &destination)
            .unwrap_or_else(|error| panic!("failed to copy '{file_name}' into dist: {error}"));
        artifacts.push(destination);
    }

    eprintln!("\nPackaged artifacts:");
    for artifact in artifacts {
        eprintln!("- {}", artifact.display());
    }
}

/// Fails early when the cross-compilation target for the harvest binaries is
/// missing, instead of halfway through the build.
fn ensure_rust_target_installed(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) => output,
        Err(error) => {
            eprintln!("warning: could not query installed targets via rustup ({error}); building for {target} anyway");
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "rustup could not list installed targets while preparing the harvest binaries: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if installed.lines().all(|line| line.trim() != target) {
        panic!(
            "the harvest binaries are built for `{target}`, which is not installed; add it with `rustup target add {target}` or pass `--target` with an installed triple"
        );
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// Wraps one harvest binary as the `bootstrap` entry the provided.al2023
/// runtime expects.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    let binary = fs::read(binary_path).unwrap_or_else(|error| {
        panic!(
            "harvest binary '{}' is missing or unreadable: {error}",
            binary_path.display()
        )
    });

    let archive = fs::File::create(zip_path)
        .unwrap_or_else(|error| panic!("cannot create '{}': {error}", zip_path.display()));
    let mut zip = ZipWriter::new(archive);
    let bootstrap = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", bootstrap)
        .and_then(|()| zip.write_all(&binary).map_err(Into::into))
        .and_then(|()| zip.finish().map(|_| ()))
        .unwrap_or_else(|error| panic!("cannot write '{}': {error}", zip_path.display()));
}

fn write_state_machine(enumerator_function: &str, output: Option<&Path>) {
    let definition = serde_json::to_string_pretty(&state_machine_definition(enumerator_function))
        .expect("state machine definition should serialize");

    match output {
        Some(path) => {
            fs::write(path, definition + "\n").unwrap_or_else(|error| {
                panic!("failed to write '{}': {error}", path.display())
            });
            eprintln!("Wrote state machine definition to {}", path.display());
        }
        None => println!("{definition}"),
    }
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test memory_harvest_core");
    run_cargo(&["test", "-p", "memory_harvest_core"]);

    step("Test memory_harvest_lambda");
    run_cargo(&["test", "-p", RUNTIME_PACKAGE]);
}

fn ci_integration() {
    for suite in [
        "integration_pipeline_end_to_end_tests",
        "integration_redelivery_tests",
    ] {
        step(&format!("Integration suite {suite}"));
        run_cargo(&["test", "-p", RUNTIME_PACKAGE, "--test", suite]);
    }
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Integration => ci_integration(),
            }
            eprintln!("\nCI job passed.");
        }
        Commands::ServerlessPackage { target, profile } => {
            package_harvest_binaries(&target, profile);
        }
        Commands::StateMachine {
            enumerator_function,
            output,
        } => {
            write_state_machine(&enumerator_function, output.as_deref());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn lambda_zip_holds_executable_bootstrap() {
        let dir = std::env::temp_dir().join(format!("xtask-zip-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let binary_path = dir.join("worker_lambda");
        let zip_path = dir.join("worker_lambda.zip");
        fs::write(&binary_path, b"\x7fELF-harvest").unwrap();

        package_lambda_zip(&binary_path, &zip_path);

        let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_name("bootstrap").unwrap();
        assert_eq!(entry.unix_mode().map(|mode| mode & 0o777), Some(0o755));
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"\x7fELF-harvest");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[should_panic(expected = "harvest binary")]
    fn missing_binary_names_the_harvest_artifact() {
        let dir = std::env::temp_dir().join(format!("xtask-missing-{}", std::process::id()));
        package_lambda_zip(&dir.join("absent"), &dir.join("absent.zip"));
    }
}
