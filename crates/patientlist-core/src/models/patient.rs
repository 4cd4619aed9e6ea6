use serde::{Deserialize, Serialize};

use crate::utils::{contains_ignore_case, eq_ignore_case};

/// A patient entry as delivered by a `PatientSource`.
///
/// Records are treated as immutable once loaded. `service` and `rank` are kept
/// exactly as received and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub rank: String,
}

impl PatientRecord {
    pub fn new(
        id: i64,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        service: impl Into<String>,
        rank: impl Into<String>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            service: service.into(),
            rank: rank.into(),
        }
    }

    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "Last, First" for list display
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn service_display(&self) -> &'static str {
        Service::parse(&self.service).display_name()
    }

    /// Rank formatted as a pay grade when it parses as one, otherwise as given
    pub fn rank_display(&self) -> String {
        match PayGrade::parse(&self.rank) {
            Some(grade) => grade.to_string(),
            None => self.rank.clone(),
        }
    }

    /// Check the record against a service and rank constraint.
    /// `None` means unconstrained.
    pub fn matches_filters(&self, service: Option<&str>, rank: Option<&str>) -> bool {
        service.map_or(true, |s| eq_ignore_case(&self.service, s))
            && rank.map_or(true, |r| eq_ignore_case(&self.rank, r))
    }

    /// Check whether the first name, last name, or "first last" contains `term`.
    /// An empty term matches every record.
    pub fn matches_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        contains_ignore_case(&self.first_name, term)
            || contains_ignore_case(&self.last_name, term)
            || contains_ignore_case(&self.full_name(), term)
    }
}

/// Service affiliation, for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Army,
    Navy,
    AirForce,
    Marines,
    CoastGuard,
    SpaceForce,
    Other,
}

impl Service {
    /// Parse a service tag.
    /// Handles variations like "ARMY", "usmc", "air-force", "US Coast Guard".
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_lowercase().replace(['-', '_'], " ");
        if lower.contains("army") {
            Service::Army
        } else if lower.contains("navy") || lower == "usn" {
            Service::Navy
        } else if lower.contains("air force") || lower == "usaf" {
            Service::AirForce
        } else if lower.contains("marine") || lower == "usmc" {
            Service::Marines
        } else if lower.contains("coast guard") || lower == "uscg" {
            Service::CoastGuard
        } else if lower.contains("space force") || lower == "ussf" {
            Service::SpaceForce
        } else {
            Service::Other
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Army => "Army",
            Service::Navy => "Navy",
            Service::AirForce => "Air Force",
            Service::Marines => "Marines",
            Service::CoastGuard => "Coast Guard",
            Service::SpaceForce => "Space Force",
            Service::Other => "Other",
        }
    }
}

/// Pay grade category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GradeKind {
    Enlisted,
    Warrant,
    Officer,
}

impl GradeKind {
    fn prefix(&self) -> char {
        match self {
            GradeKind::Enlisted => 'E',
            GradeKind::Warrant => 'W',
            GradeKind::Officer => 'O',
        }
    }
}

/// A parsed rank code such as "e-5" or "O3".
/// Orders enlisted below warrant below officer, then by level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PayGrade {
    pub kind: GradeKind,
    pub level: u8,
}

impl PayGrade {
    /// Maximum level across all categories (O-10)
    const MAX_LEVEL: u8 = 10;

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let kind = match chars.next()?.to_ascii_lowercase() {
            'e' => GradeKind::Enlisted,
            'w' => GradeKind::Warrant,
            'o' => GradeKind::Officer,
            _ => return None,
        };
        let rest = chars.as_str().trim_start_matches('-');
        let level: u8 = rest.parse().ok()?;
        if level == 0 || level > Self::MAX_LEVEL {
            return None;
        }
        Some(Self { kind, level })
    }
}

impl std::fmt::Display for PayGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn john() -> PatientRecord {
        PatientRecord::new(1, "John", "Doe", "army", "e-5")
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"id":2,"firstName":"Jane","lastName":"Smith","service":"navy","rank":"o-3"}"#;
        let record: PatientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, PatientRecord::new(2, "Jane", "Smith", "navy", "o-3"));
    }

    #[test]
    fn test_deserialize_missing_service_and_rank() {
        let json = r#"{"id":3,"firstName":"Al","lastName":"Bo"}"#;
        let record: PatientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.service, "");
        assert_eq!(record.rank, "");
    }

    #[test]
    fn test_matches_filters_case_insensitive() {
        let record = john();
        assert!(record.matches_filters(None, None));
        assert!(record.matches_filters(Some("ARMY"), None));
        assert!(record.matches_filters(None, Some("E-5")));
        assert!(record.matches_filters(Some("army"), Some("e-5")));
        assert!(!record.matches_filters(Some("navy"), None));
        assert!(!record.matches_filters(Some("army"), Some("o-3")));
    }

    #[test]
    fn test_matches_search() {
        let record = john();
        assert!(record.matches_search(""));
        assert!(record.matches_search("jo"));
        assert!(record.matches_search("DOE"));
        assert!(record.matches_search("n d"));
        assert!(!record.matches_search("jane"));
    }

    #[test]
    fn test_service_parse() {
        assert_eq!(Service::parse("army"), Service::Army);
        assert_eq!(Service::parse("US ARMY"), Service::Army);
        assert_eq!(Service::parse("usmc"), Service::Marines);
        assert_eq!(Service::parse("air-force"), Service::AirForce);
        assert_eq!(Service::parse("Coast Guard"), Service::CoastGuard);
        assert_eq!(Service::parse("other"), Service::Other);
        assert_eq!(Service::parse(""), Service::Other);
    }

    #[test]
    fn test_pay_grade_parse() {
        assert_eq!(
            PayGrade::parse("e-5"),
            Some(PayGrade { kind: GradeKind::Enlisted, level: 5 })
        );
        assert_eq!(
            PayGrade::parse("O3"),
            Some(PayGrade { kind: GradeKind::Officer, level: 3 })
        );
        assert_eq!(PayGrade::parse("w-2").map(|g| g.to_string()), Some("W-2".to_string()));
        assert_eq!(PayGrade::parse("e-0"), None);
        assert_eq!(PayGrade::parse("o-11"), None);
        assert_eq!(PayGrade::parse("captain"), None);
        assert_eq!(PayGrade::parse(""), None);
    }

    #[test]
    fn test_pay_grade_ordering() {
        let e9 = PayGrade::parse("e-9").unwrap();
        let w1 = PayGrade::parse("w-1").unwrap();
        let o1 = PayGrade::parse("o-1").unwrap();
        let o3 = PayGrade::parse("o-3").unwrap();
        assert!(e9 < w1);
        assert!(w1 < o1);
        assert!(o1 < o3);
    }

    #[test]
    fn test_display_helpers() {
        let record = john();
        assert_eq!(record.full_name(), "John Doe");
        assert_eq!(record.display_name(), "Doe, John");
        assert_eq!(record.service_display(), "Army");
        assert_eq!(record.rank_display(), "E-5");

        let odd = PatientRecord::new(9, "A", "B", "", "cadet");
        assert_eq!(odd.rank_display(), "cadet");
    }
}
