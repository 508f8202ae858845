use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ChapterError, ChapterResult};
use crate::markers::MediaMarker;
use crate::tag_store::{ChapterFrame, TocFrame};
use crate::timestamp::Timestamp;

/// A named interval of an audio file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start: Timestamp, end: Timestamp) -> Self {
        Self {
            title: title.into(),
            start,
            end,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end
            .to_milliseconds()
            .saturating_sub(self.start.to_milliseconds())
    }
}

/// A single editable column of a chapter.
#[derive(Clone, Debug, PartialEq)]
pub enum ChapterField {
    Title(String),
    Start(Timestamp),
    End(Timestamp),
}

impl ChapterField {
    pub fn apply(self, chapter: &mut Chapter) {
        match self {
            ChapterField::Title(title) => chapter.title = title,
            ChapterField::Start(start) => chapter.start = start,
            ChapterField::End(end) => chapter.end = end,
        }
    }
}

/// Each marker opens a chapter that runs until the next marker; the last one
/// runs until the end of the file.
pub fn chapters_from_markers(markers: &[MediaMarker], duration_ms: u64) -> Vec<Chapter> {
    let Some(last) = markers.last() else {
        return Vec::new();
    };

    let mut chapters: Vec<Chapter> = markers
        .windows(2)
        .map(|pair| Chapter::new(pair[0].name.clone(), pair[0].time, pair[1].time))
        .collect();

    chapters.push(Chapter::new(
        last.name.clone(),
        last.time,
        Timestamp::from_milliseconds(duration_ms),
    ));

    chapters
}

/// Resolve the table of contents' child ids, in their recorded order.
pub fn chapters_from_frames(toc: &TocFrame, frames: &[ChapterFrame]) -> ChapterResult<Vec<Chapter>> {
    let by_id: HashMap<&str, &ChapterFrame> =
        frames.iter().map(|frame| (frame.id.as_str(), frame)).collect();

    toc.child_ids
        .iter()
        .map(|id| {
            let frame = by_id.get(id.as_str()).ok_or_else(|| ChapterError::Integrity {
                toc: toc.id.clone(),
                id: id.clone(),
            })?;

            Ok(Chapter::new(
                frame.title.clone(),
                Timestamp::from_milliseconds(frame.start_ms),
                Timestamp::from_milliseconds(frame.end_ms),
            ))
        })
        .collect()
}

pub fn format_chapter_list(chapters: &[Chapter]) -> String {
    chapters
        .iter()
        .map(|chapter| {
            format!(
                "Start: {:<14} End: {:<14} Title: {}\n",
                chapter.start.to_string(),
                chapter.end.to_string(),
                chapter.title
            )
        })
        .collect()
}
