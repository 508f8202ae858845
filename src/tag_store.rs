use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ChapterError, ChapterResult};

/// A table-of-contents frame listing chapter frame ids in playback order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocFrame {
    pub id: String,
    pub top_level: bool,
    pub description: Option<String>,
    pub child_ids: Vec<String>,
}

impl TocFrame {
    pub fn new(id: impl Into<String>, top_level: bool, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            top_level,
            description: Some(description.into()),
            child_ids: Vec::new(),
        }
    }

    pub fn append_child(&mut self, id: impl Into<String>) {
        self.child_ids.push(id.into());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFrame {
    pub id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub title: String,
}

/// Chapter and TOC frames of one file, in storage order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSet {
    pub tocs: Vec<TocFrame>,
    pub chapters: Vec<ChapterFrame>,
}

impl FrameSet {
    pub fn is_empty(&self) -> bool {
        self.tocs.is_empty() && self.chapters.is_empty()
    }

    pub fn remove_toc(&mut self, id: &str) -> bool {
        let before = self.tocs.len();
        self.tocs.retain(|toc| toc.id != id);
        self.tocs.len() != before
    }

    pub fn remove_chapter(&mut self, id: &str) -> bool {
        let before = self.chapters.len();
        self.chapters.retain(|chapter| chapter.id != id);
        self.chapters.len() != before
    }

    /// Inserts a TOC frame, replacing one with the same id in place.
    pub fn upsert_toc(&mut self, toc: TocFrame) -> &mut TocFrame {
        match self.tocs.iter().position(|existing| existing.id == toc.id) {
            Some(index) => {
                self.tocs[index] = toc;
                &mut self.tocs[index]
            }
            None => {
                self.tocs.push(toc);
                let last = self.tocs.len() - 1;
                &mut self.tocs[last]
            }
        }
    }

    /// Inserts a chapter frame, replacing one with the same id in place.
    pub fn upsert_chapter(&mut self, chapter: ChapterFrame) {
        match self.chapters.iter_mut().find(|existing| existing.id == chapter.id) {
            Some(existing) => *existing = chapter,
            None => self.chapters.push(chapter),
        }
    }
}

/// Frame-level access to one audio file's metadata container.
///
/// Frame operations change pending state only; nothing reaches the file until
/// [`TagStore::commit`] succeeds, and a failed commit leaves the file as it was.
pub trait TagStore {
    fn duration_ms(&self) -> u64;

    /// Value of the user text frame with the given description.
    fn text_frame(&self, description: &str) -> Option<String>;

    fn toc_frames(&self) -> &[TocFrame];

    fn chapter_frames(&self) -> &[ChapterFrame];

    fn remove_toc_frame(&mut self, id: &str) -> ChapterResult<()>;

    fn remove_chapter_frame(&mut self, id: &str) -> ChapterResult<()>;

    fn create_toc_frame(
        &mut self,
        id: &str,
        top_level: bool,
        description: &str,
    ) -> ChapterResult<&mut TocFrame>;

    fn create_chapter_frame(&mut self, frame: ChapterFrame) -> ChapterResult<()>;

    fn commit(&mut self) -> ChapterResult<()>;

    fn has_chapter_metadata(&self) -> bool {
        !self.toc_frames().is_empty() || !self.chapter_frames().is_empty()
    }
}

/// A [`TagStore`] that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    duration_ms: u64,
    text_frames: HashMap<String, String>,
    committed: FrameSet,
    pending: FrameSet,
    commits: usize,
    fail_commits: bool,
}

impl MemoryTagStore {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..Default::default()
        }
    }

    pub fn with_text_frame(mut self, description: impl Into<String>, value: impl Into<String>) -> Self {
        self.text_frames.insert(description.into(), value.into());
        self
    }

    /// Start from frames that are already committed.
    pub fn with_frames(mut self, frames: FrameSet) -> Self {
        self.committed = frames.clone();
        self.pending = frames;
        self
    }

    pub fn committed(&self) -> &FrameSet {
        &self.committed
    }

    pub fn pending(&self) -> &FrameSet {
        &self.pending
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Make every following commit fail until switched off again.
    pub fn set_fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }
}

impl TagStore for MemoryTagStore {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn text_frame(&self, description: &str) -> Option<String> {
        self.text_frames.get(description).cloned()
    }

    fn toc_frames(&self) -> &[TocFrame] {
        &self.pending.tocs
    }

    fn chapter_frames(&self) -> &[ChapterFrame] {
        &self.pending.chapters
    }

    fn remove_toc_frame(&mut self, id: &str) -> ChapterResult<()> {
        self.pending.remove_toc(id);
        Ok(())
    }

    fn remove_chapter_frame(&mut self, id: &str) -> ChapterResult<()> {
        self.pending.remove_chapter(id);
        Ok(())
    }

    fn create_toc_frame(
        &mut self,
        id: &str,
        top_level: bool,
        description: &str,
    ) -> ChapterResult<&mut TocFrame> {
        Ok(self.pending.upsert_toc(TocFrame::new(id, top_level, description)))
    }

    fn create_chapter_frame(&mut self, frame: ChapterFrame) -> ChapterResult<()> {
        self.pending.upsert_chapter(frame);
        Ok(())
    }

    fn commit(&mut self) -> ChapterResult<()> {
        if self.fail_commits {
            return Err(ChapterError::Persistence(
                "commit rejected by memory store".to_owned(),
            ));
        }
        self.committed = self.pending.clone();
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str) -> ChapterFrame {
        ChapterFrame {
            id: id.to_owned(),
            start_ms: 0,
            end_ms: 1,
            title: id.to_uppercase(),
        }
    }

    #[test]
    fn upsert_replaces_frames_in_place() {
        let mut frames = FrameSet::default();
        frames.upsert_chapter(chapter("ch1"));
        frames.upsert_chapter(chapter("ch2"));
        frames.upsert_chapter(ChapterFrame {
            title: "Renamed".into(),
            ..chapter("ch1")
        });

        assert_eq!(frames.chapters.len(), 2);
        assert_eq!(frames.chapters[0].title, "Renamed");

        frames.upsert_toc(TocFrame::new("toc", true, "a")).append_child("ch1");
        frames.upsert_toc(TocFrame::new("toc", true, "b"));
        assert_eq!(frames.tocs.len(), 1);
        assert!(frames.tocs[0].child_ids.is_empty());
    }

    #[test]
    fn memory_store_only_commits_on_request() {
        let mut store = MemoryTagStore::new(1_000);
        store.create_chapter_frame(chapter("ch1")).unwrap();
        assert!(store.committed().is_empty());
        assert!(store.has_chapter_metadata());

        store.commit().unwrap();
        assert_eq!(store.committed().chapters.len(), 1);
        assert_eq!(store.commit_count(), 1);

        store.set_fail_commits(true);
        store.remove_chapter_frame("ch1").unwrap();
        assert!(matches!(store.commit(), Err(ChapterError::Persistence(_))));
        assert_eq!(store.committed().chapters.len(), 1);
    }
}
