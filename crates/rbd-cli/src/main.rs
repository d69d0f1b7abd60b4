/// `rbd-apply-diff` — replay an `rbd export-diff` stream onto a file or
/// block device, writing only the regions that changed.
///
/// ```text
/// rbd export-diff --from-snap monday pool/image@tuesday - \
///     | rbd-apply-diff > /dev/sdX
/// ```
///
/// The diff is read from stdin and applied to stdout, which must be
/// seekable (a regular file or a device, not a pipe). A progress line is
/// redrawn on stderr.
///
/// # Environment
///
/// | Variable                     | Effect                                  |
/// |------------------------------|-----------------------------------------|
/// | `RBD_APPLY_DIFF_NO_PROGRESS` | Any non-empty value hides the progress line |
/// | `RUST_LOG`                   | `tracing` filter (default `warn`)        |
///
/// # Exit codes
///
/// | Code | Meaning                                         |
/// |------|-------------------------------------------------|
/// | 0    | End marker reached, every chunk applied         |
/// | 1    | Malformed stream, truncated stream, or I/O error |
/// | 2    | Usage error (arguments were given)              |
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use rbd_apply::{ApplyConfig, DiffApplier};
use tracing_subscriber::EnvFilter;

// ── CLI definition ──────────────────────────────────────────────────────

const NO_PROGRESS_ENV: &str = "RBD_APPLY_DIFF_NO_PROGRESS";

/// Apply an rbd diff from stdin to the file or device on stdout.
///
/// Takes no arguments.
#[derive(Parser, Debug)]
#[command(name = "rbd-apply-diff", version)]
struct Cli {}

// ── Entry point ─────────────────────────────────────────────────────────

fn main() {
    let _cli = Cli::parse();
    init_tracing();

    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<()> {
    let config = config_from(std::env::var_os(NO_PROGRESS_ENV));
    let target = stdout_target().context("cannot use stdout as the target")?;

    let mut applier = DiffApplier::new(io::stdin().lock(), target, io::stderr(), &config);
    let result = applier.run();
    if result.is_err() {
        tracing::warn!(stats = ?applier.stats(), "stopped part way; target is partially updated");
    }
    let stats = result.context("failed to apply diff")?;

    tracing::debug!(?stats, "done");
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn config_from(no_progress: Option<OsString>) -> ApplyConfig {
    ApplyConfig {
        progress: no_progress.is_none_or(|v| v.is_empty()),
        ..ApplyConfig::default()
    }
}

/// Reopen stdout as a [`File`] so the applier can seek it.
#[cfg(unix)]
fn stdout_target() -> io::Result<File> {
    use std::os::fd::AsFd;

    let stdout = io::stdout();
    let fd = stdout.as_fd().try_clone_to_owned()?;
    Ok(File::from(fd))
}

#[cfg(windows)]
fn stdout_target() -> io::Result<File> {
    use std::os::windows::io::AsHandle;

    let stdout = io::stdout();
    let handle = stdout.as_handle().try_clone_to_owned()?;
    Ok(File::from(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn no_arguments_parse() {
        Cli::try_parse_from(["rbd-apply-diff"]).unwrap();
    }

    #[test]
    fn any_argument_is_a_usage_error() {
        let err = Cli::try_parse_from(["rbd-apply-diff", "/dev/sdb"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert_eq!(err.exit_code(), 2);

        assert!(Cli::try_parse_from(["rbd-apply-diff", "--force"]).is_err());
    }

    #[test]
    fn progress_env_toggles_progress() {
        assert!(config_from(None).progress);
        assert!(config_from(Some(OsString::new())).progress);
        assert!(!config_from(Some(OsString::from("1"))).progress);
    }
}
