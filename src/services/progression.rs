//! Per-user progression state machine.
//!
//! Everything here is pure: inbound text classification, the grade /
//! day-count transition rules and the 12-week wrap-around are plain
//! functions over value types, so the whole decision core is unit
//! testable without a database or a LINE channel.

/// Weeks in one content cycle. Week 12 wraps back to 1.
pub const WEEKS_PER_CYCLE: i32 = 12;

/// Self-reported foot-health grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Accepts half-width and full-width letters, either case.
    pub fn parse(c: char) -> Option<Self> {
        match c {
            'a' | 'A' | 'ａ' | 'Ａ' => Some(Grade::A),
            'b' | 'B' | 'ｂ' | 'Ｂ' => Some(Grade::B),
            'c' | 'C' | 'ｃ' | 'Ｃ' => Some(Grade::C),
            'd' | 'D' | 'ｄ' | 'Ｄ' => Some(Grade::D),
            _ => None,
        }
    }

    /// Parses a whole message as a grade: exactly one character.
    pub fn from_text(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::parse(first)
    }

    /// Normalized half-width uppercase form, as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    /// A/B and C/D share one content track each.
    pub fn bucket(self) -> GradeBucket {
        match self {
            Grade::A | Grade::B => GradeBucket::Ab,
            Grade::C | Grade::D => GradeBucket::Cd,
        }
    }
}

/// Content track selector. A/B users and C/D users never see each
/// other's video set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBucket {
    Ab,
    Cd,
}

/// Coarse weekly exercise-count classification. Stored as the bucket
/// midpoint (0 / 2 / 5 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBucket {
    /// 0 times.
    Zero,
    /// 1-3 times.
    Low,
    /// 4-7 times.
    High,
}

impl DayBucket {
    pub fn from_days(n: u32) -> Option<Self> {
        match n {
            0 => Some(DayBucket::Zero),
            1..=3 => Some(DayBucket::Low),
            4..=7 => Some(DayBucket::High),
            _ => None,
        }
    }

    /// Midpoint persisted in `last_response_days` and the history table.
    pub fn days(self) -> i32 {
        match self {
            DayBucket::Zero => 0,
            DayBucket::Low => 2,
            DayBucket::High => 5,
        }
    }
}

/// The three inbound categories. Every message falls in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    Grade(Grade),
    DayCount,
    Other,
}

/// Classifies inbound text. A single A-D character (any case/width) is
/// a grade; text containing the day-count marker 回 or a bare digit
/// 0-7 is a day-count answer; everything else falls through.
pub fn classify(text: &str) -> Inbound {
    let text = text.trim();
    if let Some(grade) = Grade::from_text(text) {
        return Inbound::Grade(grade);
    }
    if text.contains('回') {
        return Inbound::DayCount;
    }
    if is_bare_digits(text) {
        if let Ok(n) = text.parse::<u32>() {
            if n <= 7 {
                return Inbound::DayCount;
            }
        }
    }
    Inbound::Other
}

fn is_bare_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Maps a day-count answer to its bucket. Bare digits are bucketed
/// numerically; quick-reply texts ("0回", "1~3回", "4~7回") and free
/// variants fall back to substring matching, "0" checked first so
/// "10回" counts as zero. `None` is the classification anomaly: logged
/// upstream, reply suppressed, no state change.
pub fn day_bucket(text: &str) -> Option<DayBucket> {
    let text = text.trim();
    if is_bare_digits(text) {
        return text.parse::<u32>().ok().and_then(DayBucket::from_days);
    }
    if text.contains('0') {
        Some(DayBucket::Zero)
    } else if text.contains('1') || text.contains('3') {
        Some(DayBucket::Low)
    } else if text.contains('4') || text.contains('7') {
        Some(DayBucket::High)
    } else {
        None
    }
}

/// The progression fields a transition decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub grade: Option<Grade>,
    pub current_week: i32,
}

/// Result of a grade submission. Accepted from any prior state:
/// re-grading always resets progression to week 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeReset {
    pub grade: Grade,
    pub current_week: i32,
}

pub fn on_grade(grade: Grade) -> GradeReset {
    GradeReset {
        grade,
        current_week: 0,
    }
}

/// Result of a day-count answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCountOutcome {
    /// No grade on record: prompt for one, mutate nothing.
    NeedGradeFirst,
    /// Unrecognized day-count text: log it, suppress the reply.
    Anomalous,
    /// Deliver the `week_sent` package and store `next_week`.
    Advance {
        grade: Grade,
        bucket: DayBucket,
        week_sent: i32,
        next_week: i32,
    },
}

pub fn on_day_count(state: &StateSnapshot, text: &str) -> DayCountOutcome {
    let Some(grade) = state.grade else {
        return DayCountOutcome::NeedGradeFirst;
    };
    let Some(bucket) = day_bucket(text) else {
        return DayCountOutcome::Anomalous;
    };
    // Week 0 (just graded) advances to week 1 on the first answer.
    let week_sent = if state.current_week <= 0 {
        1
    } else {
        state.current_week
    };
    let next_week = week_sent % WEEKS_PER_CYCLE + 1;
    DayCountOutcome::Advance {
        grade,
        bucket,
        week_sent,
        next_week,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_accepts_all_widths_and_cases() {
        for (c, expected) in [
            ('a', Grade::A),
            ('A', Grade::A),
            ('ａ', Grade::A),
            ('Ａ', Grade::A),
            ('b', Grade::B),
            ('Ｂ', Grade::B),
            ('c', Grade::C),
            ('ｃ', Grade::C),
            ('d', Grade::D),
            ('Ｄ', Grade::D),
        ] {
            assert_eq!(Grade::parse(c), Some(expected), "char {c:?}");
        }
        assert_eq!(Grade::parse('e'), None);
        assert_eq!(Grade::from_text("ab"), None);
        assert_eq!(Grade::from_text(""), None);
    }

    #[test]
    fn grade_buckets_split_ab_from_cd() {
        assert_eq!(Grade::A.bucket(), GradeBucket::Ab);
        assert_eq!(Grade::B.bucket(), GradeBucket::Ab);
        assert_eq!(Grade::C.bucket(), GradeBucket::Cd);
        assert_eq!(Grade::D.bucket(), GradeBucket::Cd);
    }

    #[test]
    fn classify_covers_the_three_categories() {
        assert_eq!(classify(" b "), Inbound::Grade(Grade::B));
        assert_eq!(classify("Ｄ"), Inbound::Grade(Grade::D));
        assert_eq!(classify("0回"), Inbound::DayCount);
        assert_eq!(classify("1~3回"), Inbound::DayCount);
        assert_eq!(classify("2"), Inbound::DayCount);
        assert_eq!(classify("7"), Inbound::DayCount);
        assert_eq!(classify("8"), Inbound::Other);
        assert_eq!(classify("こんにちは"), Inbound::Other);
        assert_eq!(classify(""), Inbound::Other);
    }

    #[test]
    fn day_bucket_maps_digits_numerically() {
        assert_eq!(day_bucket("0"), Some(DayBucket::Zero));
        assert_eq!(day_bucket("2"), Some(DayBucket::Low));
        assert_eq!(day_bucket("3"), Some(DayBucket::Low));
        assert_eq!(day_bucket("4"), Some(DayBucket::High));
        assert_eq!(day_bucket("7"), Some(DayBucket::High));
        assert_eq!(day_bucket("8"), None);
    }

    #[test]
    fn day_bucket_matches_quick_reply_texts() {
        assert_eq!(day_bucket("0回"), Some(DayBucket::Zero));
        assert_eq!(day_bucket("1~3回"), Some(DayBucket::Low));
        assert_eq!(day_bucket("1-3回"), Some(DayBucket::Low));
        assert_eq!(day_bucket("4~7回"), Some(DayBucket::High));
        // "10回" contains a zero, checked first.
        assert_eq!(day_bucket("10回"), Some(DayBucket::Zero));
        assert_eq!(day_bucket("毎日回した"), None);
    }

    #[test]
    fn bucket_midpoints() {
        assert_eq!(DayBucket::Zero.days(), 0);
        assert_eq!(DayBucket::Low.days(), 2);
        assert_eq!(DayBucket::High.days(), 5);
    }

    #[test]
    fn grade_submission_resets_to_week_zero() {
        let reset = on_grade(Grade::C);
        assert_eq!(reset.grade, Grade::C);
        assert_eq!(reset.current_week, 0);
    }

    #[test]
    fn day_count_without_grade_only_prompts() {
        let state = StateSnapshot {
            grade: None,
            current_week: 0,
        };
        assert_eq!(on_day_count(&state, "2"), DayCountOutcome::NeedGradeFirst);
    }

    #[test]
    fn first_answer_advances_week_zero_to_one() {
        let state = StateSnapshot {
            grade: Some(Grade::B),
            current_week: 0,
        };
        assert_eq!(
            on_day_count(&state, "2"),
            DayCountOutcome::Advance {
                grade: Grade::B,
                bucket: DayBucket::Low,
                week_sent: 1,
                next_week: 2,
            }
        );
    }

    #[test]
    fn week_twelve_wraps_to_one() {
        let state = StateSnapshot {
            grade: Some(Grade::A),
            current_week: 12,
        };
        match on_day_count(&state, "4~7回") {
            DayCountOutcome::Advance {
                week_sent,
                next_week,
                ..
            } => {
                assert_eq!(week_sent, 12);
                assert_eq!(next_week, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn anomalous_day_count_is_a_no_op() {
        let state = StateSnapshot {
            grade: Some(Grade::D),
            current_week: 3,
        };
        assert_eq!(on_day_count(&state, "毎日回した"), DayCountOutcome::Anomalous);
    }
}
