use serde::{Deserialize, Serialize};

/// Permission policy for a room. There is no owner identity — whoever holds
/// the code operates under whatever mode is currently set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    FullAccess,
    ReadOnly,
    DropOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

impl AccessMode {
    /// Pure permission table. No state, no time, no caller identity.
    pub fn permits(self, op: OperationKind) -> bool {
        match (self, op) {
            (AccessMode::FullAccess, _) => true,
            (AccessMode::ReadOnly, OperationKind::Read) => true,
            (AccessMode::ReadOnly, OperationKind::Write) => false,
            (AccessMode::DropOnly, OperationKind::Read) => false,
            (AccessMode::DropOnly, OperationKind::Write) => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::FullAccess => "full_access",
            AccessMode::ReadOnly => "read_only",
            AccessMode::DropOnly => "drop_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full_access" => Some(AccessMode::FullAccess),
            "read_only" => Some(AccessMode::ReadOnly),
            "drop_only" => Some(AccessMode::DropOnly),
            _ => None,
        }
    }
}
