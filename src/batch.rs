//! Runs the load → save cycle over every MP3 file under a path.
//!
//! Files are processed one after another; a failure is recorded against its
//! file and the run carries on with the next one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::chapters::Chapter;
use crate::config::Config;
use crate::file::find_mp3_files;
use crate::reconciler::{ChapterSource, LoadOutcome, SaveOutcome};
use crate::session::FileSession;
use crate::tag_store::TagStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Written {
        #[serde(rename = "written")]
        chapters: usize,
    },
    Unchanged,
    Cleared,
    /// Nothing written; `reason` says why.
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    pub source: Option<ChapterSource>,
    pub chapters: Vec<Chapter>,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileReport {
    fn failed(path: &Path, err: &anyhow::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            duration: None,
            source: None,
            chapters: Vec::new(),
            status: FileStatus::Failed {
                error: format!("{:#}", err),
            },
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn count(&self, predicate: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| predicate(&f.status)).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(|status| matches!(status, FileStatus::Failed { .. })) > 0
    }
}

pub fn process_path(target: impl AsRef<Path>, config: &Config) -> Result<BatchReport> {
    let files = find_mp3_files(target.as_ref(), config.recursive)?;
    log::info!(
        "Found {} mp3 file(s) in {}",
        files.len(),
        target.as_ref().display()
    );

    let mut report = BatchReport::default();
    for path in files {
        let file_report = FileSession::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))
            .and_then(|mut session| process_session(&mut session, config));

        let file_report = match file_report {
            Ok(file_report) => file_report,
            Err(err) => {
                log::error!("{:#}", err);
                FileReport::failed(&path, &err)
            }
        };
        report.files.push(file_report);
    }

    Ok(report)
}

/// Load chapters per the configured policy and save them unless the run is
/// dry, the file is skipped, or there is nothing to write.
pub fn process_session<S: TagStore>(
    session: &mut FileSession<S>,
    config: &Config,
) -> Result<FileReport> {
    let path = session.path().to_path_buf();

    let loaded = session
        .load(config.policy)
        .with_context(|| format!("Failed to read chapters from {}", path.display()))?;

    let status = match loaded {
        LoadOutcome::Skipped => FileStatus::Skipped {
            reason: "already has chapter metadata".to_owned(),
        },
        LoadOutcome::Loaded(ChapterSource::Empty) => FileStatus::Skipped {
            reason: "no chapter markers".to_owned(),
        },
        LoadOutcome::Loaded(_) if config.list => FileStatus::Skipped {
            reason: "listing only".to_owned(),
        },
        LoadOutcome::Loaded(_) if config.dry_run => FileStatus::Skipped {
            reason: "dry run".to_owned(),
        },
        LoadOutcome::Loaded(_) => {
            let saved = session
                .save()
                .with_context(|| format!("Failed to write chapters to {}", path.display()))?;
            match saved {
                SaveOutcome::Written { chapters } => FileStatus::Written { chapters },
                SaveOutcome::Cleared => FileStatus::Cleared,
                SaveOutcome::Unchanged => FileStatus::Unchanged,
            }
        }
    };

    if let FileStatus::Skipped { reason } = &status {
        log::info!("Skipping {}: {}", path.display(), reason);
    }

    Ok(FileReport {
        path,
        duration: Some(Duration::from_millis(session.duration_ms())),
        source: session.source(),
        chapters: session.chapters().to_vec(),
        status,
    })
}
