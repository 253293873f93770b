use std::collections::BTreeSet;
use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Permission class attached to a profile.
///
/// The set is closed: any role string the portals do not know parses to
/// [`Role::Unrecognized`], which is never granted implicitly and routes to the
/// login page.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    /// Teaching and administrative staff. `teacher` is an alias.
    Staff,
    Parent,
    Student,
    SuperAdmin,
    /// A role string outside the known set, kept verbatim for logging.
    Unrecognized(String),
}

impl Role {
    /// All recognized roles, in portal order.
    pub const KNOWN: [Role; 5] = [
        Role::Admin,
        Role::Staff,
        Role::Parent,
        Role::Student,
        Role::SuperAdmin,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Parent => "parent",
            Role::Student => "student",
            Role::SuperAdmin => "super_admin",
            Role::Unrecognized(raw) => raw,
        }
    }

    /// Human-readable label shown in the portal header.
    pub fn label(&self) -> &str {
        match self {
            Role::Admin => "Administrator",
            Role::Staff => "Teacher",
            Role::Parent => "Parent",
            Role::Student => "Student",
            Role::SuperAdmin => "Super Administrator",
            Role::Unrecognized(_) => "User",
        }
    }

    /// Title of the portal this role lands in.
    pub fn portal_title(&self) -> &'static str {
        match self {
            Role::Admin => "Admin Portal",
            Role::Staff => "Staff Portal",
            Role::Parent => "Parent Portal",
            Role::Student => "Student Portal",
            Role::SuperAdmin => "Super Admin Portal",
            Role::Unrecognized(_) => "Portal",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "staff" | "teacher" => Role::Staff,
            "parent" => Role::Parent,
            "student" => Role::Student,
            "super_admin" | "super-admin" | "superadmin" => Role::SuperAdmin,
            _ => Role::Unrecognized(s.to_string()),
        };
        Ok(role)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles permitted on a protected page, fixed when the guard is composed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowedRoles(BTreeSet<Role>);

impl AllowedRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    /// Build from role names, e.g. `AllowedRoles::from_names(["admin", "teacher"])`.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self(names.into_iter().map(Role::from).collect())
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl FromIterator<Role> for AllowedRoles {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<const N: usize> From<[Role; N]> for AllowedRoles {
    fn from(roles: [Role; N]) -> Self {
        Self::new(roles)
    }
}
