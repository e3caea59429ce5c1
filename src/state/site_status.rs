use std::fmt;

/// Status of a domain in the site ledger
///
/// The crawler creates entries as `Active`; the other states are set by
/// downstream tooling and are preserved across ledger updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SiteStatus {
    #[default]
    Active,
    Exhausted,
    Blocked,
}

impl SiteStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Exhausted => "exhausted",
            Self::Blocked => "blocked",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "exhausted" => Some(Self::Exhausted),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_status_roundtrip() {
        for status in &[SiteStatus::Active, SiteStatus::Exhausted, SiteStatus::Blocked] {
            assert_eq!(SiteStatus::from_db_string(status.to_db_string()), Some(*status));
        }
    }

    #[test]
    fn test_default_is_active() {
        assert_eq!(SiteStatus::default(), SiteStatus::Active);
        assert_eq!(SiteStatus::from_db_string("gone"), None);
    }
}
