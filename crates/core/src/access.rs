//! Static credential table, roles and capability checks.
//!
//! Authentication here is a fixed username/password table mapped onto three
//! roles; it gates which operations a caller may reach, nothing more.
//! Every gated operation receives the caller's [`Session`] explicitly and
//! calls [`authorize`] before doing any work.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
    Guest,
}

/// A named permission gating one category of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    GenerateCode,
    Scan,
    Query,
    Download,
    Admin,
}

impl Capability {
    /// Capabilities that can be exercised without a session.
    pub fn is_public(self) -> bool {
        self == Capability::Scan
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::GenerateCode => "generate_code",
            Capability::Scan => "scan",
            Capability::Query => "query",
            Capability::Download => "download",
            Capability::Admin => "admin",
        };
        f.write_str(s)
    }
}

impl Role {
    pub fn permissions(self) -> &'static [Capability] {
        match self {
            Role::Admin => &[
                Capability::GenerateCode,
                Capability::Scan,
                Capability::Query,
                Capability::Download,
                Capability::Admin,
            ],
            Role::Operator => &[
                Capability::GenerateCode,
                Capability::Scan,
                Capability::Query,
                Capability::Download,
            ],
            Role::Viewer => &[Capability::Query, Capability::Download],
            Role::Guest => &[Capability::Scan],
        }
    }

    pub fn allows(self, capability: Capability) -> bool {
        self.permissions().contains(&capability)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller. Lives as long as the request or login that
/// created it; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
}

impl Session {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Session {
            username: username.into(),
            role,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("authentication required to {0}")]
    Unauthenticated(Capability),

    #[error("role '{role}' is not permitted to {capability}")]
    Forbidden { role: Role, capability: Capability },
}

/// Check that `session` may exercise `capability`.
///
/// Public capabilities pass without a session.
pub fn authorize(session: Option<&Session>, capability: Capability) -> Result<(), AccessError> {
    if capability.is_public() {
        return Ok(());
    }
    match session {
        None => Err(AccessError::Unauthenticated(capability)),
        Some(s) if s.can(capability) => Ok(()),
        Some(s) => Err(AccessError::Forbidden {
            role: s.role,
            capability,
        }),
    }
}

/// Hex SHA-256 of a password.
pub fn password_digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub role: Role,
    pub password_sha256: String,
}

#[derive(Debug, Clone)]
pub struct CredentialTable {
    accounts: Vec<Account>,
}

impl CredentialTable {
    /// The three built-in accounts: admin, operator, viewer.
    pub fn builtin() -> Self {
        let account = |username: &str, role, digest: &str| Account {
            username: username.to_string(),
            role,
            password_sha256: digest.to_string(),
        };
        CredentialTable {
            accounts: vec![
                account(
                    "admin",
                    Role::Admin,
                    "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9",
                ),
                account(
                    "operator",
                    Role::Operator,
                    "2a1cb6840030d199917ca4e3915aabce5a94a75a940ca00e0f798344526fc488",
                ),
                account(
                    "viewer",
                    Role::Viewer,
                    "4767d20b69e73793e2075c2597afca0d17cdbda245843e854d2e258232c36abf",
                ),
            ],
        }
    }

    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        CredentialTable { accounts }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<Role> {
        let digest = password_digest(password);
        self.accounts
            .iter()
            .find(|a| a.username == username && a.password_sha256.eq_ignore_ascii_case(&digest))
            .map(|a| a.role)
    }

    pub fn login(&self, username: &str, password: &str) -> Option<Session> {
        self.authenticate(username, password)
            .map(|role| Session::new(username, role))
    }
}

impl Default for CredentialTable {
    fn default() -> Self {
        Self::builtin()
    }
}
