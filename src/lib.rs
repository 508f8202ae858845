/*

<Markers>
  <Marker>
    <Name>Chapter 1</Name>
    <Time>0:00.000</Time>
  </Marker>
  <Marker>
    <Name>Chapter 2</Name>
    <Time>21:07.520</Time>
  </Marker>
</Markers>

  -> CTOC "toc" [ch1, ch2]
     CHAP "ch1" 0 .. 1267520 ms  "Chapter 1"
     CHAP "ch2" 1267520 .. end   "Chapter 2"

*/

pub mod batch;
pub mod chapters;
pub mod config;
pub mod error;
pub mod file;
pub mod id3_store;
pub mod markers;
pub mod reconciler;
pub mod session;
pub mod tag_store;
pub mod temp;
pub mod timestamp;

pub use chapters::{Chapter, ChapterField};
pub use config::{Config, ExistingChapters};
pub use error::{ChapterError, ChapterResult};
pub use markers::{MEDIA_MARKERS_FRAME, MediaMarker};
pub use reconciler::{ChapterSource, FrameReconciler, LoadOutcome, ReconcilerState, SaveOutcome};
pub use session::FileSession;
pub use tag_store::{ChapterFrame, FrameSet, MemoryTagStore, TagStore, TocFrame};
pub use timestamp::Timestamp;
