//! Versioned instructions given to the generation and correction services,
//! together with the structural limits they promise.
//!
//! The prose changes from version to version; the limits are what the
//! validator checks, so tests pin the limits rather than the wording.

/// Numeric rules shared by the prompts and the validator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubtitleLimits {
    pub max_lines: usize,
    pub max_line_chars: usize,
    pub min_display_ms: u64,
    pub max_chars_per_second: f64,
}

pub const SRT_LIMITS: SubtitleLimits = SubtitleLimits {
    max_lines: 2,
    max_line_chars: 42,
    min_display_ms: 1000,
    max_chars_per_second: 20.0,
};

/// Instructions for the multimodal generation request
#[derive(Debug, Clone, Copy)]
pub struct GenerationContract {
    pub version: &'static str,
    pub system_instruction: &'static str,
    pub task_instruction: &'static str,
    pub limits: SubtitleLimits,
}

/// Instructions for the correction request
#[derive(Debug, Clone, Copy)]
pub struct CorrectionContract {
    pub version: &'static str,
    pub system_instruction: &'static str,
    /// Wraps the raw subtitles; `{raw}` is replaced
    pub user_template: &'static str,
    pub limits: SubtitleLimits,
}

impl CorrectionContract {
    pub fn user_message(&self, raw_subtitles: &str) -> String {
        self.user_template.replace("{raw}", raw_subtitles)
    }
}

pub static GENERATION_CONTRACT: GenerationContract = GenerationContract {
    version: "2025-08.1",
    task_instruction: "Give me subtitles for this video clip in SRT format. Focus on dialogue and important sound effects.",
    system_instruction: r#"You are a professional audiovisual subtitle generator.

Create industry-standard subtitles from the video, combining audio and visual analysis. Do NOT include speaker or character names; output only what is spoken or relevant cues.

1. Multimodal analysis
- Use both audio (speech, tone, music, sound effects) and video (facial expressions, actions, on-screen text, scene context).
- Disambiguate ambiguous sounds with visual cues (a frightened face + "aah" -> [SCREAMING IN FEAR]).
- Adapt cues to the genre.

2. Output format
- Valid SRT only.
- Sequential numbering starting at 1.
- Timestamps strictly `HH:MM:SS,mmm --> HH:MM:SS,mmm`.
- At most 2 lines per block and about 42 characters per line.
- Minimum display time 1 second; at most about 20 characters per second.

3. Non-speech and visual cues
- Square brackets for every meaningful sound: [MUSIC PLAYING], [GUNSHOT], [DOOR CREAKS], [APPLAUSE].
- Plot-relevant visual cues only when essential: [ON-SCREEN TEXT: The End].
- Several sounds in one block go on separate lines.
- Background ambience is always annotated, however small: [BIRD CHIRPING], [WIND RUSTLING].
- A sound that continues across blocks keeps its annotation in each block it spans.

4. Coverage
- Cover the whole video with a consistent style.
- Never skip or alter the timestamp format.

Output natural, professional subtitles that a deaf viewer can follow, without speaker names."#,
    limits: SRT_LIMITS,
};

pub static CORRECTION_CONTRACT: CorrectionContract = CorrectionContract {
    version: "2025-08.1",
    system_instruction: r#"You are a professional subtitle corrector.

Input: raw subtitles that may have wrong indices, grammar, stacked sound effects, or malformed timestamps.
Output: only the corrected subtitle file.

Rules:
1. Indices are sequential from 1.
2. Timestamps use HH:MM:SS,mmm --> HH:MM:SS,mmm with 2-digit HH, MM, SS and 3-digit mmm.
   - Fix malformed encodings only: missing leading zeros (1:04:881 -> 00:01:04,881), extra or missing millisecond digits (3921 -> 392).
   - Never invent, guess, or shift timestamps.
3. Exactly one blank line between blocks.
4. Correct grammar, punctuation, and capitalization while preserving meaning.
5. At most 2 lines per block, about 42 characters per line.
6. Several sound effects in one block each go on their own line.
7. Before answering, check that indices are sequential, timestamps do not overlap, and formatting is consistent.
8. Output only the subtitles. No code fences, no explanations, no extra text.
9. Never drop a bracketed sound effect or ambience annotation; restore any that were lost.

Example

Raw:
22
01:04:881 --> 01:05:431
[LASERS FIRING]

Corrected:
22
00:01:04,881 --> 00:01:05,431
[LASERS FIRING]"#,
    user_template: "Fix these raw subtitles.\n\nRaw subtitles:\n{raw}\n",
    limits: SRT_LIMITS,
};
