use std::path::{Path, PathBuf};

use crate::chapters::{Chapter, ChapterField};
use crate::config::ExistingChapters;
use crate::error::ChapterResult;
use crate::id3_store::Id3TagStore;
use crate::reconciler::{ChapterSource, FrameReconciler, LoadOutcome, ReconcilerState, SaveOutcome};
use crate::tag_store::TagStore;

/// One audio file, its tag store and its chapter list.
pub struct FileSession<S: TagStore = Id3TagStore> {
    path: PathBuf,
    store: S,
    reconciler: FrameReconciler,
}

impl FileSession<Id3TagStore> {
    pub fn open(path: impl AsRef<Path>) -> ChapterResult<Self> {
        let store = Id3TagStore::open(path.as_ref())?;
        Ok(Self::with_store(path, store))
    }
}

impl<S: TagStore> FileSession<S> {
    pub fn with_store(path: impl AsRef<Path>, store: S) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            store,
            reconciler: FrameReconciler::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_ms(&self) -> u64 {
        self.store.duration_ms()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn chapters(&self) -> &[Chapter] {
        self.reconciler.chapters()
    }

    pub fn state(&self) -> ReconcilerState {
        self.reconciler.state()
    }

    pub fn source(&self) -> Option<ChapterSource> {
        self.reconciler.source()
    }

    pub fn has_chapter_metadata(&self) -> bool {
        self.store.has_chapter_metadata()
    }

    pub fn load(&mut self, policy: ExistingChapters) -> ChapterResult<LoadOutcome> {
        let outcome = self.reconciler.load(&self.store, policy)?;
        log::debug!("{}: {:?}", self.path.display(), outcome);
        Ok(outcome)
    }

    pub fn insert_chapter(&mut self, index: usize, chapter: Chapter) -> ChapterResult<()> {
        self.reconciler.insert_at(index, chapter)
    }

    pub fn push_chapter(&mut self, chapter: Chapter) -> ChapterResult<()> {
        self.reconciler.push(chapter)
    }

    pub fn remove_chapter(&mut self, index: usize) -> ChapterResult<Chapter> {
        self.reconciler.remove_at(index)
    }

    pub fn set_chapter_field(&mut self, index: usize, field: ChapterField) -> ChapterResult<()> {
        self.reconciler.set_field(index, field)
    }

    pub fn save(&mut self) -> ChapterResult<SaveOutcome> {
        let outcome = self.reconciler.save(&mut self.store)?;
        match outcome {
            SaveOutcome::Written { chapters } => {
                log::info!("Wrote {} chapters to {}", chapters, self.path.display())
            }
            SaveOutcome::Cleared => {
                log::info!("Removed chapter metadata from {}", self.path.display())
            }
            SaveOutcome::Unchanged => log::debug!("{} is up to date", self.path.display()),
        }
        Ok(outcome)
    }
}
