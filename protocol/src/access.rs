//! Tool access levels.

use serde::Deserialize;
use serde::Serialize;

/// Three-tier permission gate applied per tool call.
///
/// A process started in a constrained mode carries a ceiling; a tool whose
/// required level exceeds it is rejected with an error result rather than
/// executed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub fn allows(&self, required: AccessLevel) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_read_write_admin() {
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert!(AccessLevel::Write < AccessLevel::Admin);
        assert!(AccessLevel::Admin.allows(AccessLevel::Read));
        assert!(!AccessLevel::Read.allows(AccessLevel::Write));
    }
}
