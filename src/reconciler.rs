//! Keeps the in-memory chapter list and a file's chapter/TOC frames in step.
//!
//! Loading picks the chapter source (existing frames or OverDrive markers)
//! according to [`ExistingChapters`]. Saving is a full replace: the complete
//! new frame set is planned in memory first, then every old chapter and TOC
//! frame is removed, the planned frames are created and the store commits.
//! If any step fails the store's pending frames are put back the way they
//! were and the chapter list is left untouched, so the save can be retried.

use serde::Serialize;

use crate::chapters::{Chapter, ChapterField, chapters_from_frames, chapters_from_markers};
use crate::config::ExistingChapters;
use crate::error::{ChapterError, ChapterResult};
use crate::markers::{MEDIA_MARKERS_FRAME, parse_media_markers};
use crate::tag_store::{ChapterFrame, FrameSet, TagStore, TocFrame};

pub const TOC_ID: &str = "toc";
pub const TOC_DESCRIPTION: &str = "Table of Contents";

/// Frame id of the chapter at zero-based `index`: `ch1`, `ch2`, ...
pub fn chapter_frame_id(index: usize) -> String {
    format!("ch{}", index + 1)
}

/// Where the loaded chapters came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterSource {
    /// The file's own chapter/TOC frames; also the state after a save.
    Frames,
    Markers,
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilerState {
    Unloaded,
    Clean,
    Dirty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(ChapterSource),
    /// The file already carries chapter metadata and the policy says leave it.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { chapters: usize },
    /// All chapter metadata was removed and none written back.
    Cleared,
    /// The frames already match the chapter list.
    Unchanged,
}

#[derive(Debug)]
pub struct FrameReconciler {
    chapters: Vec<Chapter>,
    state: ReconcilerState,
    source: Option<ChapterSource>,
}

impl Default for FrameReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReconciler {
    pub fn new() -> Self {
        Self {
            chapters: Vec::new(),
            state: ReconcilerState::Unloaded,
            source: None,
        }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    pub fn source(&self) -> Option<ChapterSource> {
        self.source
    }

    pub fn is_dirty(&self) -> bool {
        self.state == ReconcilerState::Dirty
    }

    pub fn load<S: TagStore + ?Sized>(
        &mut self,
        store: &S,
        policy: ExistingChapters,
    ) -> ChapterResult<LoadOutcome> {
        let (chapters, source, skipped) = match policy {
            ExistingChapters::Prefer => match chapters_from_store_frames(store)? {
                Some(chapters) => (chapters, ChapterSource::Frames, false),
                None => with_source(chapters_from_store_markers(store)?, ChapterSource::Markers),
            },
            ExistingChapters::Skip if store.has_chapter_metadata() => {
                let chapters = chapters_from_store_frames(store)?.unwrap_or_default();
                (chapters, ChapterSource::Frames, true)
            }
            ExistingChapters::Skip => {
                with_source(chapters_from_store_markers(store)?, ChapterSource::Markers)
            }
            ExistingChapters::Overwrite => {
                let from_markers = chapters_from_store_markers(store)?;
                if !from_markers.is_empty() {
                    (from_markers, ChapterSource::Markers, false)
                } else {
                    match chapters_from_store_frames(store)? {
                        Some(chapters) => (chapters, ChapterSource::Frames, false),
                        None => (Vec::new(), ChapterSource::Empty, false),
                    }
                }
            }
        };

        log::debug!(
            "Loaded {} chapter(s) from {:?} (policy {})",
            chapters.len(),
            source,
            policy
        );

        self.chapters = chapters;
        self.source = Some(source);
        self.state = ReconcilerState::Clean;

        Ok(if skipped {
            LoadOutcome::Skipped
        } else {
            LoadOutcome::Loaded(source)
        })
    }

    pub fn insert_at(&mut self, index: usize, chapter: Chapter) -> ChapterResult<()> {
        self.ensure_loaded()?;
        if index > self.chapters.len() {
            return Err(ChapterError::InvalidIndex {
                index,
                len: self.chapters.len(),
            });
        }
        self.chapters.insert(index, chapter);
        self.state = ReconcilerState::Dirty;
        Ok(())
    }

    pub fn push(&mut self, chapter: Chapter) -> ChapterResult<()> {
        self.insert_at(self.chapters.len(), chapter)
    }

    pub fn remove_at(&mut self, index: usize) -> ChapterResult<Chapter> {
        self.ensure_loaded()?;
        self.check_index(index)?;
        let removed = self.chapters.remove(index);
        self.state = ReconcilerState::Dirty;
        Ok(removed)
    }

    pub fn set_field(&mut self, index: usize, field: ChapterField) -> ChapterResult<()> {
        self.ensure_loaded()?;
        self.check_index(index)?;
        field.apply(&mut self.chapters[index]);
        self.state = ReconcilerState::Dirty;
        Ok(())
    }

    pub fn save<S: TagStore + ?Sized>(&mut self, store: &mut S) -> ChapterResult<SaveOutcome> {
        self.ensure_loaded()?;
        if self.state == ReconcilerState::Clean && self.source == Some(ChapterSource::Frames) {
            return Ok(SaveOutcome::Unchanged);
        }

        let planned = plan_frames(&self.chapters);
        let previous = FrameSet {
            tocs: store.toc_frames().to_vec(),
            chapters: store.chapter_frames().to_vec(),
        };

        let result = replace_frames(store, &planned).and_then(|()| store.commit());
        if let Err(err) = result {
            log::error!("Saving chapters failed, restoring previous frames: {}", err);
            if let Err(restore_err) = replace_frames(store, &previous) {
                log::error!("Restoring previous frames failed: {}", restore_err);
            }
            return Err(into_persistence(err));
        }

        self.state = ReconcilerState::Clean;
        self.source = Some(ChapterSource::Frames);

        Ok(if self.chapters.is_empty() {
            SaveOutcome::Cleared
        } else {
            SaveOutcome::Written {
                chapters: self.chapters.len(),
            }
        })
    }

    fn ensure_loaded(&self) -> ChapterResult<()> {
        match self.state {
            ReconcilerState::Unloaded => Err(ChapterError::NotLoaded),
            _ => Ok(()),
        }
    }

    fn check_index(&self, index: usize) -> ChapterResult<()> {
        if index >= self.chapters.len() {
            return Err(ChapterError::InvalidIndex {
                index,
                len: self.chapters.len(),
            });
        }
        Ok(())
    }
}

/// The canonical frame layout for `chapters`: one top-level `toc` listing
/// `ch1..chN` in chapter order. No chapters, no frames.
pub fn plan_frames(chapters: &[Chapter]) -> FrameSet {
    if chapters.is_empty() {
        return FrameSet::default();
    }

    let mut toc = TocFrame::new(TOC_ID, true, TOC_DESCRIPTION);
    let frames = chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| {
            let id = chapter_frame_id(index);
            toc.append_child(id.clone());
            ChapterFrame {
                id,
                start_ms: chapter.start.to_milliseconds(),
                end_ms: chapter.end.to_milliseconds(),
                title: chapter.title.clone(),
            }
        })
        .collect();

    FrameSet {
        tocs: vec![toc],
        chapters: frames,
    }
}

fn with_source(chapters: Vec<Chapter>, source: ChapterSource) -> (Vec<Chapter>, ChapterSource, bool) {
    if chapters.is_empty() {
        (chapters, ChapterSource::Empty, false)
    } else {
        (chapters, source, false)
    }
}

fn chapters_from_store_frames<S: TagStore + ?Sized>(store: &S) -> ChapterResult<Option<Vec<Chapter>>> {
    match store.toc_frames().iter().find(|toc| toc.top_level) {
        Some(toc) => chapters_from_frames(toc, store.chapter_frames()).map(Some),
        None => Ok(None),
    }
}

fn chapters_from_store_markers<S: TagStore + ?Sized>(store: &S) -> ChapterResult<Vec<Chapter>> {
    match store.text_frame(MEDIA_MARKERS_FRAME) {
        Some(xml) => {
            let markers = parse_media_markers(&xml)?;
            Ok(chapters_from_markers(&markers, store.duration_ms()))
        }
        None => Ok(Vec::new()),
    }
}

/// Removes every chapter and TOC frame, then creates `target`'s frames.
fn replace_frames<S: TagStore + ?Sized>(store: &mut S, target: &FrameSet) -> ChapterResult<()> {
    let chapter_ids: Vec<String> = store.chapter_frames().iter().map(|f| f.id.clone()).collect();
    for id in &chapter_ids {
        store.remove_chapter_frame(id)?;
    }

    let toc_ids: Vec<String> = store.toc_frames().iter().map(|t| t.id.clone()).collect();
    for id in &toc_ids {
        store.remove_toc_frame(id)?;
    }

    for toc in &target.tocs {
        let created = store.create_toc_frame(
            &toc.id,
            toc.top_level,
            toc.description.as_deref().unwrap_or_default(),
        )?;
        created.description = toc.description.clone();
        for child in &toc.child_ids {
            created.append_child(child.clone());
        }
    }

    for chapter in &target.chapters {
        store.create_chapter_frame(chapter.clone())?;
    }

    Ok(())
}

fn into_persistence(err: ChapterError) -> ChapterError {
    match err {
        ChapterError::Persistence(_) => err,
        other => ChapterError::Persistence(other.to_string()),
    }
}
