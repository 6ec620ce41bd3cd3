use std::fmt;

use crate::contract::SubtitleLimits;
use crate::subtitle::SubtitleDocument;

/// A readability problem that does not make the document invalid
#[derive(Debug, Clone, PartialEq)]
pub enum QualityIssue {
    LineTooLong { index: u32, chars: usize, max: usize },
    ReadingRateTooHigh { index: u32, cps: f64, max: f64 },
    DisplayTooShort { index: u32, millis: u64, min: u64 },
    LongGap { after: u32, seconds: f64 },
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineTooLong { index, chars, max } => {
                write!(f, "block {}: line of {} characters exceeds {}", index, chars, max)
            }
            Self::ReadingRateTooHigh { index, cps, max } => {
                write!(f, "block {}: {:.1} characters per second exceeds {:.0}", index, cps, max)
            }
            Self::DisplayTooShort { index, millis, min } => {
                write!(f, "block {}: displayed for {} ms, under {} ms", index, millis, min)
            }
            Self::LongGap { after, seconds } => {
                write!(f, "{:.1}s without subtitles after block {}", seconds, after)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
    pub blocks: usize,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks the soft limits of the subtitle contract: line length, reading
/// speed, display time, coverage gaps
pub struct QualityValidator {
    limits: SubtitleLimits,
    max_gap_secs: f64,
}

impl QualityValidator {
    pub fn new(limits: SubtitleLimits, max_gap_secs: f64) -> Self {
        Self { limits, max_gap_secs }
    }

    pub fn assess(&self, document: &SubtitleDocument) -> QualityReport {
        let mut issues = Vec::new();
        let blocks = document.blocks();

        for block in blocks {
            for line in &block.lines {
                let chars = line.chars().count();
                if chars > self.limits.max_line_chars {
                    issues.push(QualityIssue::LineTooLong {
                        index: block.index,
                        chars,
                        max: self.limits.max_line_chars,
                    });
                }
            }

            let millis = block.duration_ms();
            if millis < self.limits.min_display_ms {
                issues.push(QualityIssue::DisplayTooShort {
                    index: block.index,
                    millis,
                    min: self.limits.min_display_ms,
                });
            }

            if millis > 0 {
                let cps = block.char_count() as f64 / (millis as f64 / 1000.0);
                if cps > self.limits.max_chars_per_second {
                    issues.push(QualityIssue::ReadingRateTooHigh {
                        index: block.index,
                        cps,
                        max: self.limits.max_chars_per_second,
                    });
                }
            }
        }

        for pair in blocks.windows(2) {
            let gap_ms = pair[1].start.as_millis().saturating_sub(pair[0].end.as_millis());
            let seconds = gap_ms as f64 / 1000.0;
            if seconds > self.max_gap_secs {
                issues.push(QualityIssue::LongGap { after: pair[0].index, seconds });
            }
        }

        QualityReport { issues, blocks: blocks.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::SRT_LIMITS;

    fn validator() -> QualityValidator {
        QualityValidator::new(SRT_LIMITS, 10.0)
    }

    #[test]
    fn test_clean_document() {
        let doc = SubtitleDocument::parse(
            "1\n00:00:01,000 --> 00:00:03,000\n[RAIN FALLING]\n\n2\n00:00:03,500 --> 00:00:05,000\nLet's go inside.\n",
        )
        .unwrap();

        let report = validator().assess(&doc);
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.blocks, 2);
    }

    #[test]
    fn test_soft_limit_violations() {
        let doc = SubtitleDocument::parse(
            "1\n00:00:01,000 --> 00:00:01,500\nThis line is definitely far longer than forty-two characters\n\n2\n00:00:30,000 --> 00:00:32,000\n[SILENCE]\n",
        )
        .unwrap();

        let report = validator().assess(&doc);

        assert!(report.issues.iter().any(|i| matches!(i, QualityIssue::LineTooLong { index: 1, .. })));
        assert!(report.issues.iter().any(|i| matches!(i, QualityIssue::DisplayTooShort { index: 1, millis: 500, .. })));
        assert!(report.issues.iter().any(|i| matches!(i, QualityIssue::ReadingRateTooHigh { index: 1, .. })));
        assert!(report.issues.iter().any(|i| matches!(i, QualityIssue::LongGap { after: 1, .. })));
    }
}
