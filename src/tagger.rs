use crate::record::{FunctionTag, FunctionTags};

/// Keyword → tag table. A track id matching several keywords gets every tag.
const KEYWORDS: &[(&str, FunctionTag)] = &[
    ("complete", FunctionTag::Victory),
    ("game_over", FunctionTag::GameOver),
    ("lost_life", FunctionTag::GameOver),
    ("theme", FunctionTag::Background),
    ("effect", FunctionTag::Effect),
    ("hurry", FunctionTag::Hurry),
];

/// Tag a track with its in-game function(s) from its identifier.
///
/// Case-insensitive substring match against a fixed keyword table. Unmatched
/// ids get the empty set, which is a valid result.
pub fn tag_functions(track_id: &str) -> FunctionTags {
    let id_lower = track_id.to_lowercase();
    KEYWORDS
        .iter()
        .filter(|(keyword, _)| id_lower.contains(keyword))
        .map(|&(_, tag)| tag)
        .collect()
}
