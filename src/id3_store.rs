use std::{
    fs::File,
    path::{Path, PathBuf},
};

use id3::{
    Frame, Tag, TagLike, Version,
    frame::{Chapter as Id3Chapter, TableOfContents},
};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ChapterError, ChapterResult};
use crate::tag_store::{ChapterFrame, FrameSet, TagStore, TocFrame};
use crate::temp::copy_to_temp_beside;

const TITLE_FRAME: &str = "TIT2";

// ID3 marks unused byte offsets in CHAP frames with all bits set.
const UNUSED_OFFSET: u32 = u32::MAX;

/// [`TagStore`] over the ID3v2 tag of an MP3 file.
pub struct Id3TagStore {
    path: PathBuf,
    tag: Tag,
    pending: FrameSet,
    duration_ms: u64,
}

impl Id3TagStore {
    /// Reads the tag and works out the audio duration.
    ///
    /// Duration comes from the audio stream; when the stream does not report
    /// its length the tag's `TLEN` frame is used instead. A file with no
    /// recognizable audio stream is unreadable whatever its tag says.
    pub fn open(path: impl AsRef<Path>) -> ChapterResult<Self> {
        let path = path.as_ref();
        let tag = read_tag(path)?;

        let unreadable = |reason: String| ChapterError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };

        let duration_ms = match probe_duration_ms(path).map_err(unreadable)? {
            Some(duration_ms) => duration_ms,
            None => match tag.duration() {
                Some(tlen) => {
                    log::warn!(
                        "Audio stream of {} does not report its length, using TLEN",
                        path.display()
                    );
                    u64::from(tlen)
                }
                None => {
                    return Err(unreadable(
                        "audio stream does not report its length and there is no TLEN frame"
                            .to_owned(),
                    ));
                }
            },
        };

        Ok(Self::from_tag(path, tag, duration_ms))
    }

    /// Reads the tag but takes the duration as given instead of probing audio.
    pub fn open_with_duration(path: impl AsRef<Path>, duration_ms: u64) -> ChapterResult<Self> {
        let path = path.as_ref();
        let tag = read_tag(path)?;
        Ok(Self::from_tag(path, tag, duration_ms))
    }

    fn from_tag(path: &Path, tag: Tag, duration_ms: u64) -> Self {
        let pending = frames_from_tag(&tag);
        log::debug!(
            "{}: {} TOC frame(s), {} chapter frame(s), {} ms",
            path.display(),
            pending.tocs.len(),
            pending.chapters.len(),
            duration_ms
        );

        Self {
            path: path.to_path_buf(),
            tag,
            pending,
            duration_ms,
        }
    }

    /// The tag as it will be written: every non-chapter frame untouched,
    /// chapter and TOC frames replaced by the pending set.
    fn build_tag(&self) -> ChapterResult<Tag> {
        let mut tag = self.tag.clone();
        tag.remove("CTOC");
        tag.remove("CHAP");

        for toc in &self.pending.tocs {
            tag.add_frame(TableOfContents {
                element_id: toc.id.clone(),
                top_level: toc.top_level,
                ordered: true,
                elements: toc.child_ids.clone(),
                frames: title_frames(toc.description.as_deref().unwrap_or_default()),
            });
        }

        for chapter in &self.pending.chapters {
            tag.add_frame(Id3Chapter {
                element_id: chapter.id.clone(),
                start_time: to_id3_time(chapter.start_ms, &chapter.id)?,
                end_time: to_id3_time(chapter.end_ms, &chapter.id)?,
                start_offset: UNUSED_OFFSET,
                end_offset: UNUSED_OFFSET,
                frames: title_frames(&chapter.title),
            });
        }

        Ok(tag)
    }
}

impl TagStore for Id3TagStore {
    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn text_frame(&self, description: &str) -> Option<String> {
        self.tag
            .extended_texts()
            .find(|text| text.description == description)
            .map(|text| text.value.clone())
    }

    fn toc_frames(&self) -> &[TocFrame] {
        &self.pending.tocs
    }

    fn chapter_frames(&self) -> &[ChapterFrame] {
        &self.pending.chapters
    }

    fn remove_toc_frame(&mut self, id: &str) -> ChapterResult<()> {
        if !self.pending.remove_toc(id) {
            log::debug!("No TOC frame {:?} to remove", id);
        }
        Ok(())
    }

    fn remove_chapter_frame(&mut self, id: &str) -> ChapterResult<()> {
        if !self.pending.remove_chapter(id) {
            log::debug!("No chapter frame {:?} to remove", id);
        }
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
        to_id3_time(frame.start_ms, &frame.id)?;
        to_id3_time(frame.end_ms, &frame.id)?;
        self.pending.upsert_chapter(frame);
        Ok(())
    }

    /// Writes the tag into a copy of the file and renames the copy over the
    /// original, so the file either has the complete new tag or its old one.
    fn commit(&mut self) -> ChapterResult<()> {
        let tag = self.build_tag()?;

        // CHAP/CTOC need ID3v2.3 or later
        let version = match self.tag.version() {
            Version::Id3v22 => Version::Id3v23,
            version => version,
        };

        let temp = copy_to_temp_beside(&self.path).map_err(|e| {
            ChapterError::Persistence(format!("copying {}: {}", self.path.display(), e))
        })?;

        tag.write_to_path(temp.path(), version)
            .map_err(|e| ChapterError::Persistence(format!("writing tag: {}", e)))?;

        temp.persist(&self.path).map_err(|e| {
            ChapterError::Persistence(format!("replacing {}: {}", self.path.display(), e.error))
        })?;

        self.tag = tag;
        Ok(())
    }
}

fn read_tag(path: &Path) -> ChapterResult<Tag> {
    if !path.exists() {
        return Err(ChapterError::NotFound(path.to_path_buf()));
    }

    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(err) if matches!(err.kind, id3::ErrorKind::NoTag) => Ok(Tag::new()),
        Err(err) => Err(ChapterError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}

fn frames_from_tag(tag: &Tag) -> FrameSet {
    let tocs = tag
        .tables_of_contents()
        .map(|toc| TocFrame {
            id: toc.element_id.clone(),
            top_level: toc.top_level,
            description: title_of(&toc.frames),
            child_ids: toc.elements.clone(),
        })
        .collect();

    let chapters = tag
        .chapters()
        .map(|chapter| ChapterFrame {
            id: chapter.element_id.clone(),
            start_ms: u64::from(chapter.start_time),
            end_ms: u64::from(chapter.end_time),
            title: title_of(&chapter.frames).unwrap_or_default(),
        })
        .collect();

    FrameSet { tocs, chapters }
}

fn title_of(frames: &[Frame]) -> Option<String> {
    frames
        .iter()
        .find(|frame| frame.id() == TITLE_FRAME)
        .and_then(|frame| frame.content().text())
        .map(str::to_owned)
}

fn title_frames(title: &str) -> Vec<Frame> {
    if title.is_empty() {
        Vec::new()
    } else {
        vec![Frame::text(TITLE_FRAME, title)]
    }
}

fn to_id3_time(milliseconds: u64, id: &str) -> ChapterResult<u32> {
    u32::try_from(milliseconds).map_err(|_| {
        ChapterError::Persistence(format!(
            "chapter {:?} time {} ms does not fit an ID3 chapter frame",
            id, milliseconds
        ))
    })
}

/// `Ok(None)` when an audio track was found but it does not carry a frame
/// count or time base.
fn probe_duration_ms(path: &Path) -> Result<Option<u64>, String> {
    let src = File::open(path).map_err(|e| format!("failed to open media: {}", e))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| format!("unsupported format: {}", e))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no supported audio tracks".to_owned())?;

    let (Some(n_frames), Some(time_base)) =
        (track.codec_params.n_frames, track.codec_params.time_base)
    else {
        return Ok(None);
    };

    let time = time_base.calc_time(n_frames);
    Ok(Some(time.seconds * 1000 + (time.frac * 1000.0) as u64))
}

#[cfg(test)]
mod tests {
    use id3::frame::ExtendedText;

    use super::*;
    use crate::markers::MEDIA_MARKERS_FRAME;

    fn tagged_file(dir: &Path, tag: &Tag) -> PathBuf {
        let path = dir.join("book.mp3");
        std::fs::write(&path, [0u8; 512]).unwrap();
        tag.write_to_path(&path, Version::Id3v24).unwrap();
        path
    }

    #[test]
    fn reads_marker_text_and_chapter_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut tag = Tag::new();
        tag.add_frame(ExtendedText {
            description: MEDIA_MARKERS_FRAME.to_owned(),
            value: "<Markers/>".to_owned(),
        });
        tag.add_frame(Id3Chapter {
            element_id: "chp0".to_owned(),
            start_time: 0,
            end_time: 1_500,
            start_offset: UNUSED_OFFSET,
            end_offset: UNUSED_OFFSET,
            frames: vec![Frame::text(TITLE_FRAME, "Opening")],
        });
        let path = tagged_file(dir.path(), &tag);

        let store = Id3TagStore::open_with_duration(&path, 9_000).unwrap();
        assert_eq!(store.duration_ms(), 9_000);
        assert_eq!(store.text_frame(MEDIA_MARKERS_FRAME).as_deref(), Some("<Markers/>"));
        assert_eq!(store.text_frame("Something else"), None);
        assert_eq!(
            store.chapter_frames(),
            &[ChapterFrame {
                id: "chp0".into(),
                start_ms: 0,
                end_ms: 1_500,
                title: "Opening".into(),
            }]
        );
        assert!(store.toc_frames().is_empty());
    }

    #[test]
    fn commit_writes_frames_and_keeps_other_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut tag = Tag::new();
        tag.set_title("Book Title");
        let path = tagged_file(dir.path(), &tag);

        let mut store = Id3TagStore::open_with_duration(&path, 60_000).unwrap();
        store
            .create_toc_frame("toc", true, "Table of Contents")
            .unwrap()
            .append_child("ch1");
        store
            .create_chapter_frame(ChapterFrame {
                id: "ch1".into(),
                start_ms: 0,
                end_ms: 60_000,
                title: "Whole".into(),
            })
            .unwrap();
        store.commit().unwrap();

        let written = Tag::read_from_path(&path).unwrap();
        assert_eq!(written.title(), Some("Book Title"));
        let toc = written.tables_of_contents().next().unwrap();
        assert_eq!(toc.element_id, "toc");
        assert!(toc.top_level);
        assert_eq!(toc.elements, vec!["ch1".to_owned()]);
        let chapter = written.chapters().next().unwrap();
        assert_eq!((chapter.start_time, chapter.end_time), (0, 60_000));
        assert_eq!(title_of(&chapter.frames).as_deref(), Some("Whole"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn oversized_times_are_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = tagged_file(dir.path(), &Tag::new());

        let mut store = Id3TagStore::open_with_duration(&path, 0).unwrap();
        let err = store
            .create_chapter_frame(ChapterFrame {
                id: "ch1".into(),
                start_ms: 0,
                end_ms: u64::from(u32::MAX) + 1,
                title: "Too long".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ChapterError::Persistence(_)));
        assert!(store.chapter_frames().is_empty());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = Id3TagStore::open(dir.path().join("missing.mp3"));
        assert!(matches!(result, Err(ChapterError::NotFound(_))));
    }

    #[test]
    fn file_without_audio_or_tlen_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let result = Id3TagStore::open(&path);
        assert!(matches!(result, Err(ChapterError::Unreadable { .. })));
    }

    #[test]
    fn tlen_does_not_rescue_a_file_without_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp3");
        std::fs::write(&path, b"plain text, no audio frames here").unwrap();
        let mut tag = Tag::new();
        tag.set_duration(123_000);
        tag.write_to_path(&path, Version::Id3v24).unwrap();

        let result = Id3TagStore::open(&path);
        assert!(matches!(result, Err(ChapterError::Unreadable { .. })));
    }
}
