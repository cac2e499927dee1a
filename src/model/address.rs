//! Decoded email addresses (RFC 5322 §3.4).

use serde::{Deserialize, Serialize};

/// A single mailbox.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    /// Decoded display name (may be empty).
    pub name: String,
    /// The bare address (`user@domain`), may be empty for name-only entries.
    pub address: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        match (self.name.is_empty(), self.address.is_empty()) {
            (true, _) => self.address.clone(),
            (false, true) => self.name.clone(),
            (false, false) => format!("{} <{}>", self.name, self.address),
        }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// An entry of an address list header: a mailbox or a named group.
///
/// Group members are plain mailboxes; nested groups are flattened into their
/// parent while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Mailbox(Mailbox),
    Group { name: String, group: Vec<Mailbox> },
}

impl Address {
    /// Display name of the mailbox or group.
    pub fn name(&self) -> &str {
        match self {
            Self::Mailbox(mailbox) => &mailbox.name,
            Self::Group { name, .. } => name,
        }
    }

    /// The address of a mailbox; `None` for groups.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Mailbox(mailbox) => Some(&mailbox.address),
            Self::Group { .. } => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }

    /// Flatten a list into plain mailboxes, replacing each group by its members.
    pub fn flatten(list: &[Address]) -> Vec<Mailbox> {
        let mut result = Vec::with_capacity(list.len());
        for entry in list {
            match entry {
                Self::Mailbox(mailbox) => result.push(mailbox.clone()),
                Self::Group { group, .. } => result.extend(group.iter().cloned()),
            }
        }
        result
    }

    /// Format for display. Groups render as `Name: a, b;`.
    pub fn display(&self) -> String {
        match self {
            Self::Mailbox(mailbox) => mailbox.display(),
            Self::Group { name, group } => {
                let members: Vec<String> = group.iter().map(Mailbox::display).collect();
                format!("{name}: {};", members.join(", "))
            }
        }
    }
}

impl From<Mailbox> for Address {
    fn from(mailbox: Mailbox) -> Self {
        Self::Mailbox(mailbox)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
