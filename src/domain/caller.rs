use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "notifications:write")]
    NotificationsWrite,
    #[serde(rename = "receivers:test")]
    ReceiversTest,
    #[serde(rename = "receivers:read")]
    ReceiversRead,
    #[serde(rename = "receivers:read-secrets")]
    ReceiversReadSecrets,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::NotificationsWrite => write!(f, "notifications:write"),
            Permission::ReceiversTest => write!(f, "receivers:test"),
            Permission::ReceiversRead => write!(f, "receivers:read"),
            Permission::ReceiversReadSecrets => write!(f, "receivers:read-secrets"),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "notifications:write" => Ok(Permission::NotificationsWrite),
            "receivers:test" => Ok(Permission::ReceiversTest),
            "receivers:read" => Ok(Permission::ReceiversRead),
            "receivers:read-secrets" => Ok(Permission::ReceiversReadSecrets),
            _ => Err(format!("invalid permission: {}", s)),
        }
    }
}

/// Authenticated principal on whose behalf a test runs. Everything it touches is
/// scoped to `org_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub subject: String,
    pub org_id: i64,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Caller {
    pub fn new(subject: impl Into<String>, org_id: i64, permissions: Vec<Permission>) -> Self {
        Self {
            subject: subject.into(),
            org_id,
            permissions,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has(*p))
    }

    pub fn can_test_receivers(&self) -> bool {
        self.has_any(&[Permission::NotificationsWrite, Permission::ReceiversTest])
    }

    pub fn can_read_receivers(&self) -> bool {
        self.has_any(&[
            Permission::ReceiversRead,
            Permission::ReceiversTest,
            Permission::NotificationsWrite,
        ])
    }
}
