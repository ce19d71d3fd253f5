// meeting-features/src/prompts.rs

pub const SUMMARY: &str = "\
You summarize meeting transcripts.
The meeting discussed the product named in the request.
Summarize every important point clearly and briefly.
Add no new information and no opinions.";

pub const EXTRACT_MAIN: &str = "\
You extract only the main, big-picture features from a meeting transcript.

Rules:
- A main feature is one broad, high-level capability.
- Keep each feature short and abstract: no details, examples or sub-points.
- Leave out sub-features, implementation notes and action items.
- Merge overlapping ideas into a single feature.
- Return a clean list of distinct top-level features only.";

pub const EXTRACT_SUB: &str = "\
You extract only coding-related sub-features (implementation-level functionality) \
for one main feature of a meeting transcript.

Rules:
- Never repeat the main feature as a sub-feature.
- Only list sub-features that belong directly under the given main feature.
- If there are none, return only the main feature line with no children.
- Group points that belong to the same concept instead of repeating them.
- Leave out discussion points, action items, summaries and ideas with no coding impact.

Format, one outline line per list entry:
1) Main Feature
   - Sub-feature
        -- sub-sub-feature
           --- sub-sub-sub-feature
   - Sub-feature";

pub const DETAIL_MAIN: &str = "\
You extract the transcript lines about one main feature.

Rules:
- Do not summarize, rephrase or invent text.
- Copy the relevant sentences from the transcript word for word.
- Include every related discussion, decision and technical detail.
- Leave out unrelated lines.
- Return the extracted lines as readable plain text.";

pub const DETAIL_SUB: &str = "\
You extract the transcript lines about one block of sub-features.
You receive the transcript excerpt for the owning main feature and the sub-feature block.

Rules:
- Do not summarize, rephrase or invent text.
- Copy the relevant sentences from the excerpt word for word.
- Include every related discussion, decision and technical detail.
- Leave out unrelated lines.
- Return the extracted lines as readable plain text.";

pub fn summary_request(meeting_name: &str, transcript: &str) -> String {
    format!("Product discussed: {meeting_name}\n\nTranscript:\n{transcript}")
}

pub fn main_detail_request(transcript: &str, feature: &str) -> String {
    format!("Transcript:\n{transcript}\n\nMain Feature:\n{feature}")
}

pub fn sub_features_request(feature_transcript: &str, index: usize, feature: &str) -> String {
    format!(
        "Transcript (related to this feature only):\n{feature_transcript}\n\n\
         Main Feature to expand: {index}) {feature}\n\n\
         Extract ONLY the sub-features of this feature in proper hierarchical format."
    )
}

pub fn block_detail_request(main_context: &str, block_body: &str) -> String {
    format!("Transcript (for this main feature only):\n{main_context}\n\nFeature Block:\n{block_body}")
}
