//! Stop-tag detection
//!
//! Watches the accumulating output for role tags. A role tag in the output
//! means the model has started writing another speaker's turn.

/// Tags that end a generation, matched case-insensitively
pub const STOP_TAGS: [&str; 8] = [
    "<assistant>",
    "<human>",
    "<npc>",
    "<system>",
    "</assistant>",
    "</human>",
    "</npc>",
    "</system>",
];

const LONGEST_TAG: usize = {
    let mut longest = 0;
    let mut i = 0;
    while i < STOP_TAGS.len() {
        if STOP_TAGS[i].len() > longest {
            longest = STOP_TAGS[i].len();
        }
        i += 1;
    }
    longest
};

/// Where a stop tag was found in the accumulated output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopMatch {
    /// Byte offset of the tag in the accumulated text
    pub offset: usize,
    pub tag: &'static str,
}

/// Accumulates fragments and cuts the text at the first stop tag.
///
/// Matching runs on an ASCII-lowercased shadow copy. ASCII folding never
/// changes byte lengths, so offsets in the copy are valid in the original.
#[derive(Debug, Default)]
pub struct StopTagDetector {
    text: String,
    folded: String,
    hit: Option<StopMatch>,
}

impl StopTagDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` and reports the earliest stop tag, if one is now present.
    ///
    /// When one fragment completes several tags, the one starting first in the
    /// text wins, not the one listed first in [`STOP_TAGS`]. Cutting at the
    /// earliest offset keeps no role-tagged text in the response.
    ///
    /// On a match the text is truncated at the tag. Once stopped, further fragments
    /// are ignored and the original match is returned again.
    pub fn push(&mut self, fragment: &str) -> Option<StopMatch> {
        if self.hit.is_some() {
            return self.hit;
        }

        // A tag may straddle the previous fragment boundary.
        let scan_from = floor_char_boundary(
            &self.folded,
            self.folded.len().saturating_sub(LONGEST_TAG - 1),
        );

        self.text.push_str(fragment);
        self.folded.push_str(&fragment.to_ascii_lowercase());

        let window = &self.folded[scan_from..];
        let hit = STOP_TAGS
            .into_iter()
            .filter_map(|tag| {
                window.find(tag).map(|pos| StopMatch {
                    offset: scan_from + pos,
                    tag,
                })
            })
            .min_by_key(|m| m.offset)?;

        self.text.truncate(hit.offset);
        self.folded.truncate(hit.offset);
        self.hit = Some(hit);
        Some(hit)
    }

    pub fn is_stopped(&self) -> bool {
        self.hit.is_some()
    }

    pub fn stop_match(&self) -> Option<StopMatch> {
        self.hit
    }

    /// Text accumulated so far, excluding any stop tag and what followed it
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_tag() {
        assert_eq!(LONGEST_TAG, "</assistant>".len());
    }

    #[test]
    fn test_no_tag() {
        let mut detector = StopTagDetector::new();
        assert_eq!(detector.push("Hello"), None);
        assert_eq!(detector.push(" world"), None);
        assert!(!detector.is_stopped());
        assert_eq!(detector.text(), "Hello world");
    }

    #[test]
    fn test_tag_in_single_fragment() {
        let mut detector = StopTagDetector::new();
        detector.push("Hello there");
        let hit = detector.push(" friend<human>: next").unwrap();

        assert_eq!(hit.tag, "<human>");
        assert_eq!(hit.offset, "Hello there friend".len());
        assert_eq!(detector.text(), "Hello there friend");
    }

    #[test]
    fn test_tag_split_across_fragments() {
        let mut detector = StopTagDetector::new();
        assert_eq!(detector.push("Sure.\n<assis"), None);
        let hit = detector.push("tant>: more").unwrap();

        assert_eq!(hit.tag, "<assistant>");
        assert_eq!(detector.text(), "Sure.\n");
    }

    #[test]
    fn test_case_insensitive_preserves_original_case() {
        let mut detector = StopTagDetector::new();
        let hit = detector.push("KEEP This </SYSTEM> gone").unwrap();

        assert_eq!(hit.tag, "</system>");
        assert_eq!(detector.text(), "KEEP This ");
    }

    #[test]
    fn test_earliest_offset_wins_over_tag_list_order() {
        // "<assistant>" is listed before "</human>" but appears later.
        let mut detector = StopTagDetector::new();
        let hit = detector.push("a</human>b<assistant>").unwrap();

        assert_eq!(hit.tag, "</human>");
        assert_eq!(hit.offset, 1);
        assert_eq!(detector.text(), "a");
    }

    #[test]
    fn test_npc_tag() {
        let mut detector = StopTagDetector::new();
        assert!(detector.push("ok <NPC> hi").is_some());
        assert_eq!(detector.text(), "ok ");
    }

    #[test]
    fn test_ignores_fragments_after_stop() {
        let mut detector = StopTagDetector::new();
        let first = detector.push("x<human>");
        let again = detector.push("more text");

        assert_eq!(first, again);
        assert_eq!(detector.into_text(), "x");
    }

    #[test]
    fn test_multibyte_text_before_split_tag() {
        let mut detector = StopTagDetector::new();
        assert_eq!(detector.push("héllo wörld ñ"), None);
        assert_eq!(detector.push("</"), None);
        let hit = detector.push("npc>").unwrap();

        assert_eq!(hit.tag, "</npc>");
        assert_eq!(detector.text(), "héllo wörld ñ");
    }

    #[test]
    fn test_partial_tag_is_not_a_match() {
        let mut detector = StopTagDetector::new();
        assert_eq!(detector.push("a < b and <human"), None);
        assert_eq!(detector.text(), "a < b and <human");
    }
}
