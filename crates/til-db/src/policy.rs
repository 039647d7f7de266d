use std::fmt;
use std::str::FromStr;

/// What the store does about foreign keys that point at deleted rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferentialIntegrity {
    /// Foreign keys are not checked. Deleting a user leaves its acronyms
    /// behind with a dangling `creator_id`; deleting an acronym leaves its
    /// pivot rows behind.
    #[default]
    Unenforced,
    /// Foreign keys are checked. Inserts with unknown references and deletes
    /// of referenced rows fail with a constraint violation.
    Restrict,
    /// Foreign keys are checked, and deleting a row first deletes every row
    /// that references it.
    Cascade,
}

impl ReferentialIntegrity {
    pub fn enforces_foreign_keys(self) -> bool {
        !matches!(self, Self::Unenforced)
    }
}

impl FromStr for ReferentialIntegrity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unenforced" | "none" | "off" => Ok(Self::Unenforced),
            "restrict" => Ok(Self::Restrict),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!(
                "unknown referential integrity mode '{}' (expected unenforced, restrict or cascade)",
                other
            )),
        }
    }
}

impl fmt::Display for ReferentialIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unenforced => "unenforced",
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
        };
        f.write_str(s)
    }
}

/// Integrity rules the schema itself leaves open. The default is
/// permissive: nothing beyond column types is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrityPolicy {
    pub referential: ReferentialIntegrity,
    /// Reject saving a user whose username belongs to another user.
    pub enforce_unique_usernames: bool,
    /// Attaching an already attached category returns the existing pivot row.
    pub dedupe_category_links: bool,
}

impl fmt::Display for IntegrityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "references={}, unique_usernames={}, dedupe_category_links={}",
            self.referential, self.enforce_unique_usernames, self.dedupe_category_links
        )
    }
}
