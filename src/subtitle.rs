use std::fmt;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::error::{Result, JimakuError};

/// Structural problems found in SRT text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SrtError {
    #[error("document contains no subtitle blocks")]
    Empty,

    #[error("line {line}: expected a block index, found '{found}'")]
    BadIndex { line: usize, found: String },

    #[error("line {line}: expected 'HH:MM:SS,mmm --> HH:MM:SS,mmm', found '{found}'")]
    BadTiming { line: usize, found: String },

    #[error("line {line}: more than one blank line between blocks")]
    ExtraBlankLine { line: usize },

    #[error("block {index}: no text lines")]
    NoText { index: u32 },

    #[error("block {index}: {count} text lines, at most {max} allowed")]
    TooManyLines { index: u32, count: usize, max: usize },

    #[error("block {position}: index {found}, expected {expected}")]
    OutOfSequence { position: usize, found: u32, expected: u32 },

    #[error("block {index}: start {start} is not before end {end}")]
    EmptyInterval { index: u32, start: Timestamp, end: Timestamp },

    #[error("block {index}: starts at {start}, before the previous block's start {previous}")]
    StartsBackwards { index: u32, start: Timestamp, previous: Timestamp },

    #[error("block {index}: starts at {start}, overlapping the previous block ending at {previous_end}")]
    Overlap { index: u32, start: Timestamp, previous_end: Timestamp },
}

impl From<SrtError> for JimakuError {
    fn from(e: SrtError) -> Self {
        JimakuError::MalformedGenerationResponse(e.to_string())
    }
}

/// Millisecond offset into the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Parse exactly `HH:MM:SS,mmm`; anything looser is rejected
    pub fn parse(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() != 12 || bytes[2] != b':' || bytes[5] != b':' || bytes[8] != b',' {
            return None;
        }

        let field = |range: std::ops::Range<usize>| -> Option<u64> {
            let digits = &text[range];
            if digits.bytes().all(|b| b.is_ascii_digit()) {
                digits.parse().ok()
            } else {
                None
            }
        };

        let hours = field(0..2)?;
        let minutes = field(3..5)?;
        let seconds = field(6..8)?;
        let millis = field(9..12)?;
        if minutes > 59 || seconds > 59 {
            return None;
        }

        Some(Self(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_srt_time(self.0))
    }
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleBlock {
    pub index: u32,
    pub start: Timestamp,
    pub end: Timestamp,
    pub lines: Vec<String>,
}

impl SubtitleBlock {
    pub fn duration_ms(&self) -> u64 {
        self.end.as_millis().saturating_sub(self.start.as_millis())
    }

    /// Visible characters, not counting line breaks
    pub fn char_count(&self) -> usize {
        self.lines.iter().map(|l| l.chars().count()).sum()
    }
}

/// Ordered subtitle blocks. `parse` checks the grammar; `validate` checks
/// numbering and timing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtitleDocument {
    blocks: Vec<SubtitleBlock>,
}

impl SubtitleDocument {
    pub fn new(blocks: Vec<SubtitleBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[SubtitleBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn parse(text: &str) -> std::result::Result<Self, SrtError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .map(|(n, l)| (n + 1, l.trim_end()))
            .collect();

        // Leading and trailing blank lines carry no structure
        let first = lines.iter().position(|(_, l)| !l.is_empty());
        let last = lines.iter().rposition(|(_, l)| !l.is_empty());
        let body = match (first, last) {
            (Some(first), Some(last)) => &lines[first..=last],
            _ => return Err(SrtError::Empty),
        };

        let mut blocks = Vec::new();
        let mut chunk: Vec<(usize, &str)> = Vec::new();
        let mut previous_blank = false;

        for &(number, line) in body {
            if line.is_empty() {
                if previous_blank {
                    return Err(SrtError::ExtraBlankLine { line: number });
                }
                previous_blank = true;
                blocks.push(Self::parse_block(&chunk)?);
                chunk.clear();
            } else {
                previous_blank = false;
                chunk.push((number, line));
            }
        }
        blocks.push(Self::parse_block(&chunk)?);

        Ok(Self { blocks })
    }

    fn parse_block(chunk: &[(usize, &str)]) -> std::result::Result<SubtitleBlock, SrtError> {
        let (index_line, index_text) = chunk[0];
        let index: u32 = index_text
            .trim()
            .parse()
            .ok()
            .filter(|i| *i >= 1)
            .ok_or_else(|| SrtError::BadIndex { line: index_line, found: index_text.to_string() })?;

        let &(timing_line, timing_text) = chunk.get(1).ok_or(SrtError::NoText { index })?;
        let bad_timing = || SrtError::BadTiming { line: timing_line, found: timing_text.to_string() };
        let (start, end) = timing_text.trim().split_once(" --> ").ok_or_else(bad_timing)?;
        let start = Timestamp::parse(start).ok_or_else(bad_timing)?;
        let end = Timestamp::parse(end).ok_or_else(bad_timing)?;

        let lines: Vec<String> = chunk[2..].iter().map(|(_, l)| l.to_string()).collect();
        if lines.is_empty() {
            return Err(SrtError::NoText { index });
        }

        Ok(SubtitleBlock { index, start, end, lines })
    }

    /// Check numbering, line counts and timing across the whole document
    pub fn validate(&self, max_lines: usize) -> std::result::Result<(), SrtError> {
        if self.blocks.is_empty() {
            return Err(SrtError::Empty);
        }

        let mut previous: Option<&SubtitleBlock> = None;
        for (position, block) in self.blocks.iter().enumerate() {
            let expected = position as u32 + 1;
            if block.index != expected {
                return Err(SrtError::OutOfSequence {
                    position: position + 1,
                    found: block.index,
                    expected,
                });
            }
            if block.lines.is_empty() {
                return Err(SrtError::NoText { index: block.index });
            }
            if block.lines.len() > max_lines {
                return Err(SrtError::TooManyLines {
                    index: block.index,
                    count: block.lines.len(),
                    max: max_lines,
                });
            }
            if block.start >= block.end {
                return Err(SrtError::EmptyInterval { index: block.index, start: block.start, end: block.end });
            }
            if let Some(prev) = previous {
                if block.start < prev.start {
                    return Err(SrtError::StartsBackwards {
                        index: block.index,
                        start: block.start,
                        previous: prev.start,
                    });
                }
                if block.start < prev.end {
                    return Err(SrtError::Overlap {
                        index: block.index,
                        start: block.start,
                        previous_end: prev.end,
                    });
                }
            }
            previous = Some(block);
        }

        Ok(())
    }

    /// Serialize with exactly one blank line after every block
    pub fn to_srt(&self) -> String {
        let mut srt_content = String::new();

        for block in &self.blocks {
            srt_content.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                block.index,
                block.start,
                block.end,
                block.lines.join("\n")
            ));
        }

        srt_content
    }
}

/// Write subtitle text to disk. The file appears only once fully written.
pub fn write_srt<P: AsRef<Path>>(content: &str, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing SRT file: {}", output_path.display());

    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&dir)?;

    let mut staging = tempfile::NamedTempFile::new_in(&dir)?;
    staging.write_all(content.as_bytes())?;
    staging.flush()?;
    staging
        .persist(output_path)
        .map_err(|e| JimakuError::Io(e.error))?;

    info!("SRT file written successfully");
    Ok(())
}
