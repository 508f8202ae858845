//! `chapterize` -- adds ID3v2 chapter frames to OverDrive MP3 audiobooks.
//!
//! ```text
//! chapterize [OPTIONS] <PATH>
//! ```
//!
//! | Option                | Description                                            |
//! |-----------------------|--------------------------------------------------------|
//! | `--overwrite`         | Rebuild chapters from markers even if the file has some |
//! | `--prefer-existing`   | Keep existing chapter frames, use markers otherwise    |
//! | `-r`, `--recursive`   | Descend into sub-directories                           |
//! | `-n`, `--dry-run`     | Report what would be written, write nothing            |
//! | `-l`, `--list`        | Print each file's chapters, write nothing              |
//! | `--json`              | Print the report as JSON                               |
//!
//! `CHAPTERIZE_POLICY` (`prefer`, `skip`, `overwrite`) and
//! `CHAPTERIZE_RECURSIVE` set defaults; `RUST_LOG` controls log output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chapterize::batch::{BatchReport, FileStatus, process_path};
use chapterize::chapters::format_chapter_list;
use chapterize::{Config, ExistingChapters};

const USAGE: &str = "Usage: chapterize [--overwrite | --prefer-existing] [-r] [-n] [-l] [--json] <PATH>";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chapterize=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config, target) = match parse_args(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{:#}\n{}", err, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(&config, &target) {
        Ok(report) if report.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config, target: &Path) -> anyhow::Result<BatchReport> {
    let report = process_path(target, config)?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    for file in &report.files {
        let status = match &file.status {
            FileStatus::Written { chapters } => format!("wrote {} chapters", chapters),
            FileStatus::Unchanged => "unchanged".to_owned(),
            FileStatus::Cleared => "removed chapters".to_owned(),
            FileStatus::Skipped { reason } => format!("skipped ({})", reason),
            FileStatus::Failed { error } => format!("FAILED: {}", error),
        };
        println!("{}: {}", file.path.display(), status);

        if config.list && !file.chapters.is_empty() {
            print!("{}", format_chapter_list(&file.chapters));
        }
    }

    println!(
        "{} written, {} skipped, {} failed",
        report.count(|s| matches!(s, FileStatus::Written { .. } | FileStatus::Cleared)),
        report.count(|s| matches!(s, FileStatus::Skipped { .. } | FileStatus::Unchanged)),
        report.count(|s| matches!(s, FileStatus::Failed { .. })),
    );

    Ok(report)
}

/// `Ok(None)` when help was asked for.
fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<Option<(Config, PathBuf)>> {
    let mut config = Config::from_env()?;
    let mut target = None;

    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--overwrite" => config.policy = ExistingChapters::Overwrite,
            "--prefer-existing" => config.policy = ExistingChapters::Prefer,
            "-r" | "--recursive" => config.recursive = true,
            "-n" | "--dry-run" => config.dry_run = true,
            "-l" | "--list" => config.list = true,
            "--json" => config.json = true,
            flag if flag.starts_with('-') => anyhow::bail!("Unknown option {}", flag),
            path if target.is_none() => target = Some(PathBuf::from(path)),
            extra => anyhow::bail!("Unexpected argument {}", extra),
        }
    }

    let target = target.context("Missing target path")?;
    Ok(Some((config, target)))
}
