use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Focus,
    Break,
    /// Bookkeeping label for progress accrued while the clock is stopped.
    /// Never part of a plan.
    Pause,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Focus => "focus",
            SegmentType::Break => "break",
            SegmentType::Pause => "pause",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "focus" => Some(SegmentType::Focus),
            "break" => Some(SegmentType::Break),
            "pause" => Some(SegmentType::Pause),
            _ => None,
        }
    }
}

impl std::fmt::Display for SegmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSegment {
    pub segment_type: SegmentType,
    /// Duration in minutes.
    pub duration_min: u64,
}

impl PlanSegment {
    pub fn focus(duration_min: u64) -> Self {
        Self {
            segment_type: SegmentType::Focus,
            duration_min,
        }
    }

    pub fn rest(duration_min: u64) -> Self {
        Self {
            segment_type: SegmentType::Break,
            duration_min,
        }
    }

    /// Get segment duration in seconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_secs(&self) -> u64 {
        self.duration_min.saturating_mul(60)
    }
}

/// An ordered sequence of alternating focus and break segments.
///
/// Always starts and ends with focus; adjacent segments never share a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationPlan {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub segments: Vec<PlanSegment>,
}

impl DurationPlan {
    /// Create a validated plan.
    pub fn new(name: impl Into<String>, segments: Vec<PlanSegment>) -> Result<Self, ValidationError> {
        let plan = Self {
            id: None,
            name: name.into(),
            segments,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Build a plan from a list of minute lengths, alternating from focus.
    ///
    /// `[25, 5, 25]` becomes focus 25, break 5, focus 25.
    pub fn from_minutes(name: impl Into<String>, minutes: &[u64]) -> Result<Self, ValidationError> {
        let segments = minutes
            .iter()
            .enumerate()
            .map(|(i, &min)| {
                if i % 2 == 0 {
                    PlanSegment::focus(min)
                } else {
                    PlanSegment::rest(min)
                }
            })
            .collect();
        Self::new(name, segments)
    }

    /// Parse a comma separated minute list such as `"25,5,25"`.
    pub fn parse_minutes(name: impl Into<String>, list: &str) -> Result<Self, ValidationError> {
        let minutes = list
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u64>()
                    .map_err(|_| ValidationError::InvalidValue {
                        field: "segments".into(),
                        message: format!("'{}' is not a whole number of minutes", part.trim()),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_minutes(name, &minutes)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let first = self
            .segments
            .first()
            .ok_or_else(|| ValidationError::EmptyCollection("duration segments".into()))?;
        let last = self.segments.last().unwrap_or(first);

        if first.segment_type != SegmentType::Focus || last.segment_type != SegmentType::Focus {
            return Err(invalid("a duration must start and end with focus"));
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if segment.segment_type == SegmentType::Pause {
                return Err(invalid("pause is not a plannable segment type"));
            }
            if segment.duration_min == 0 {
                return Err(invalid(&format!("segment {} has zero length", i + 1)));
            }
        }
        if self
            .segments
            .windows(2)
            .any(|pair| pair[0].segment_type == pair[1].segment_type)
        {
            return Err(invalid("adjacent segments must alternate focus and break"));
        }
        Ok(())
    }

    pub fn total_duration_min(&self) -> u64 {
        self.segments.iter().map(|s| s.duration_min).sum()
    }

    pub fn focus_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.segment_type == SegmentType::Focus)
            .count()
    }

    /// Short human form, e.g. `25/5/25`.
    pub fn summary(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.duration_min.to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn invalid(message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: "segments".into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_minutes_alternates_starting_with_focus() {
        let plan = DurationPlan::from_minutes("classic", &[25, 5, 25]).unwrap();
        assert_eq!(plan.segments.len(), 3);
        assert_eq!(plan.segments[0].segment_type, SegmentType::Focus);
        assert_eq!(plan.segments[1].segment_type, SegmentType::Break);
        assert_eq!(plan.focus_count(), 2);
        assert_eq!(plan.total_duration_min(), 55);
        assert_eq!(plan.summary(), "25/5/25");
    }

    #[test]
    fn rejects_plan_ending_with_break() {
        assert!(DurationPlan::from_minutes("bad", &[25, 5]).is_err());
    }

    #[test]
    fn rejects_empty_and_zero_length() {
        assert!(matches!(
            DurationPlan::new("empty", vec![]),
            Err(ValidationError::EmptyCollection(_))
        ));
        assert!(DurationPlan::from_minutes("zero", &[25, 0, 25]).is_err());
    }

    #[test]
    fn rejects_adjacent_same_type() {
        let segments = vec![PlanSegment::focus(10), PlanSegment::focus(10)];
        assert!(DurationPlan::new("double", segments).is_err());
    }

    #[test]
    fn rejects_pause_segments() {
        let segments = vec![
            PlanSegment::focus(10),
            PlanSegment {
                segment_type: SegmentType::Pause,
                duration_min: 5,
            },
            PlanSegment::focus(10),
        ];
        assert!(DurationPlan::new("paused", segments).is_err());
    }

    #[test]
    fn parse_minutes_reports_bad_numbers() {
        let plan = DurationPlan::parse_minutes("p", " 50, 10 ,50").unwrap();
        assert_eq!(plan.summary(), "50/10/50");
        assert!(DurationPlan::parse_minutes("p", "25,five,25").is_err());
    }

    #[test]
    fn segment_type_string_roundtrip() {
        for t in [SegmentType::Focus, SegmentType::Break, SegmentType::Pause] {
            assert_eq!(SegmentType::parse(t.as_str()), Some(t));
        }
        assert_eq!(SegmentType::parse("nap"), None);
    }
}
