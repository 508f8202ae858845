//! OverDrive `MediaMarkers` parsing.
//!
//! OverDrive audiobooks ship their chapter starts as XML inside a user text
//! frame:
//!
//! ```xml
//! <Markers>
//!   <Marker>
//!     <Name>Chapter 1</Name>
//!     <Time>0:00.000</Time>
//!   </Marker>
//!   <Marker>
//!     <Name>Chapter 2</Name>
//!     <Time>12:41.230</Time>
//!   </Marker>
//! </Markers>
//! ```

use crate::error::{ChapterError, ChapterResult};
use crate::timestamp::Timestamp;

/// Description of the user text frame holding the marker XML.
pub const MEDIA_MARKERS_FRAME: &str = "OverDrive MediaMarkers";

/// A named chapter start.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaMarker {
    pub name: String,
    pub time: Timestamp,
}

impl MediaMarker {
    pub fn new(name: impl Into<String>, time: Timestamp) -> Self {
        Self {
            name: name.into(),
            time,
        }
    }
}

/// Parse every `<Marker>` element of the document, in document order.
///
/// Markers without both a `<Name>` and a `<Time>` child are skipped. A `<Time>`
/// that is present but malformed is an error.
pub fn parse_media_markers(xml: &str) -> ChapterResult<Vec<MediaMarker>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ChapterError::Syntax(format!("XML parse error: {}", e)))?;

    let mut markers = Vec::new();

    for marker in doc.descendants().filter(|n| n.has_tag_name("Marker")) {
        let name = child_element(&marker, "Name");
        let time = child_element(&marker, "Time");

        let (Some(name), Some(time)) = (name, time) else {
            log::debug!(
                "Skipping marker without Name or Time at byte {}",
                marker.range().start
            );
            continue;
        };

        let time = Timestamp::parse(time.text().unwrap_or_default())?;
        markers.push(MediaMarker::new(name.text().unwrap_or_default(), time));
    }

    Ok(markers)
}

fn child_element<'a, 'input>(
    node: &roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_markers_in_document_order() {
        let xml = r#"<Markers>
            <Marker><Name>Intro</Name><Time>0:00.000</Time></Marker>
            <Marker><Name>Chapter 1</Name><Time>5:00.500</Time></Marker>
            <Marker><Name>Chapter 2</Name><Time>1:02:03</Time></Marker>
        </Markers>"#;

        let markers = parse_media_markers(xml).unwrap();
        let names: Vec<&str> = markers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Intro", "Chapter 1", "Chapter 2"]);
        assert_eq!(markers[1].time, Timestamp::new(0, 5, 0.5).unwrap());
        assert_eq!(markers[2].time, Timestamp::new(1, 2, 3.0).unwrap());
    }

    #[test]
    fn skips_markers_missing_name_or_time() {
        let xml = "<Markers><Marker><Name>A</Name></Marker>\
                   <Marker><Name>B</Name><Time>0:01:00</Time></Marker>\
                   <Marker><Time>0:02:00</Time></Marker></Markers>";

        let markers = parse_media_markers(xml).unwrap();
        assert_eq!(markers, vec![MediaMarker::new("B", Timestamp::new(0, 1, 0.0).unwrap())]);
    }

    #[test]
    fn finds_nested_markers() {
        let xml = "<OverDrive><Book><Markers>\
                   <Marker><Name>Deep</Name><Time>10</Time></Marker>\
                   </Markers></Book></OverDrive>";

        let markers = parse_media_markers(xml).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "Deep");
    }

    #[test]
    fn empty_document_yields_no_markers() {
        assert!(parse_media_markers("<Markers/>").unwrap().is_empty());
        assert!(parse_media_markers("<Other><Name>x</Name></Other>").unwrap().is_empty());
    }

    #[test]
    fn empty_name_is_kept_as_empty_title() {
        let markers =
            parse_media_markers("<Markers><Marker><Name/><Time>3</Time></Marker></Markers>")
                .unwrap();
        assert_eq!(markers[0].name, "");
    }

    #[test]
    fn malformed_time_is_a_format_error() {
        let xml = "<Markers><Marker><Name>A</Name><Time>soon</Time></Marker></Markers>";
        assert!(matches!(
            parse_media_markers(xml),
            Err(ChapterError::Format { .. })
        ));
    }

    #[test]
    fn malformed_xml_is_a_syntax_error() {
        assert!(matches!(
            parse_media_markers("<Markers><Marker>"),
            Err(ChapterError::Syntax(_))
        ));
    }
}
