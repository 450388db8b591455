//! Custom cargo commands for mailsift.
//!
//! Usage:
//!   cargo xtask verify             - Run full verification suite
//!   cargo xtask test               - Run all tests
//!   cargo xtask check              - Quick check (check + test + clippy)
//!   cargo xtask conform            - Run the conformance matrix on the fixture
//!   cargo xtask fuzz <TARGET> [S]  - Fuzz one target for S seconds (default 60)

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Fixture account and seed the conformance run uses.
const FIXTURE: &str = "fixtures/mailbox.json";
const FIXTURE_ACCOUNT: &str = "acct-demo";
const FIXTURE_SEED: &str = "em-1001";

const FUZZ_TARGETS: &[&str] = &[
    "posting_key_decode",
    "posting_key_roundtrip",
    "filter_classify",
];

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let task = args.next();
    match task.as_deref() {
        Some("verify") => verify()?,
        Some("test") => test()?,
        Some("check") => check()?,
        Some("bench") => bench()?,
        Some("conform") => conform()?,
        Some("fuzz") => {
            let target = args.next();
            let seconds = args.next();
            fuzz(target.as_deref(), seconds.as_deref())?
        }
        _ => print_help(),
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        r#"
cargo xtask <COMMAND>

Commands:
  verify    Run full verification suite (tests + clippy + fixture conformance)
  test      Run all Rust tests
  check     Quick check (cargo check + test + clippy)
  bench     Run benchmarks
  conform   Run the 12-scenario conformance matrix against the fixture mailbox
  fuzz      Fuzz one target: cargo xtask fuzz <TARGET> [SECONDS]

Fuzz targets: {}
"#,
        FUZZ_TARGETS.join(", ")
    );
}

/// Full verification suite
fn verify() -> Result<()> {
    println!("==========================================");
    println!("mailsift Verification Suite");
    println!("==========================================\n");

    println!("[1/3] Running Rust tests...");
    run_cargo(&["test", "--quiet"])?;
    println!("✓ All Rust tests passed\n");

    println!("[2/3] Running clippy...");
    run_cargo(&["clippy", "--quiet", "--all-targets", "--", "-D", "warnings"])?;
    println!("✓ Clippy passed\n");

    println!("[3/3] Running conformance matrix on {}...", FIXTURE);
    conform()?;
    println!("✓ Fixture conforms\n");

    println!("==========================================");
    println!("✓ ALL VERIFICATION CHECKS PASSED");
    println!("==========================================");

    Ok(())
}

/// Run all tests
fn test() -> Result<()> {
    run_cargo(&["test"])
}

/// Quick check
fn check() -> Result<()> {
    println!("Running quick checks...\n");

    println!("[1/3] cargo check...");
    run_cargo(&["check", "--all-targets"])?;

    println!("[2/3] cargo test...");
    run_cargo(&["test", "--quiet"])?;

    println!("[3/3] cargo clippy...");
    run_cargo(&["clippy", "--quiet", "--", "-D", "warnings"])?;

    println!("\n✓ Quick checks passed");
    Ok(())
}

/// Run benchmarks
fn bench() -> Result<()> {
    run_cargo(&["bench"])
}

/// The binary exits non-zero when any scenario fails.
fn conform() -> Result<()> {
    run_cargo(&[
        "run",
        "--quiet",
        "--",
        "conform",
        "--fixture",
        FIXTURE,
        FIXTURE_ACCOUNT,
        FIXTURE_SEED,
    ])
}

fn fuzz(target: Option<&str>, seconds: Option<&str>) -> Result<()> {
    let Some(target) = target else {
        bail!("missing fuzz target (one of: {})", FUZZ_TARGETS.join(", "));
    };
    if !FUZZ_TARGETS.contains(&target) {
        bail!(
            "unknown fuzz target '{}' (one of: {})",
            target,
            FUZZ_TARGETS.join(", ")
        );
    }
    let seconds: u64 = match seconds {
        Some(s) => s
            .parse()
            .with_context(|| format!("invalid duration '{}'", s))?,
        None => 60,
    };

    let max_time = format!("-max_total_time={}", seconds);
    let status = Command::new("cargo")
        .args(["+nightly", "fuzz", "run", target, "--", &max_time])
        .current_dir(project_root()?)
        .status()
        .context("Failed to run cargo fuzz (is cargo-fuzz installed?)")?;

    if !status.success() {
        bail!("fuzz target {} failed", target);
    }
    Ok(())
}

// ============================================================================
// Helper functions
// ============================================================================

fn project_root() -> Result<PathBuf> {
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir().context("no current directory")?,
    };

    // xtask is in project_root/xtask, so go up one level
    let root = manifest_dir.parent().unwrap_or(&manifest_dir);
    Ok(root.to_path_buf())
}

fn run_cargo(args: &[&str]) -> Result<()> {
    let root = project_root()?;

    let status = Command::new("cargo")
        .args(args)
        .current_dir(&root)
        .status()
        .with_context(|| format!("Failed to run cargo {:?}", args))?;

    if !status.success() {
        bail!("cargo {:?} failed", args);
    }

    Ok(())
}
