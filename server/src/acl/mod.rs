//! Users, passwords, and the rule-based permission model ACL-aware commands
//! are checked against.
//!
//! The table shape (a lock-guarded map of user id to [`User`]) follows the
//! teacher's `AuthProvider`, but the permission model itself is new: rather
//! than a single root key, each user carries an ordered list of
//! [`Permissions`] selectors plus a root selector, and a command is allowed
//! if any selector in order grants it — the first matching `CommandRule`
//! wins, so later, more specific rules can override earlier, broader ones.

use std::collections::HashMap;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::util::error::ServerError;

pub type PasswordHash = [u8; 32];

pub fn hash_password(password: &[u8]) -> PasswordHash {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone)]
pub struct KeyPattern {
    pub mode: KeyMode,
    pub pattern: String,
}

impl KeyPattern {
    pub fn allows(&self, key: &[u8], want: KeyMode) -> bool {
        let mode_ok = match (self.mode, want) {
            (KeyMode::ReadWrite, _) => true,
            (KeyMode::Read, KeyMode::Read) => true,
            (KeyMode::Write, KeyMode::Write) => true,
            _ => false,
        };
        mode_ok && crate::util::glob::glob_match(self.pattern.as_bytes(), key)
    }
}

#[derive(Debug, Clone)]
pub enum CommandRule {
    /// `+@category` / `-@category`
    Category { allow: bool, category: String },
    /// `+cmd` / `-cmd`
    Command { allow: bool, name: String },
    AllCommands(bool),
}

#[derive(Debug, Clone, Default)]
pub struct Permissions {
    pub key_patterns: Vec<KeyPattern>,
    pub command_rules: Vec<CommandRule>,
    pub all_keys: bool,
}

impl Permissions {
    /// Evaluates command rules in insertion order; the first rule whose
    /// predicate matches decides the outcome. No match at all denies.
    /// `categories` is every ACL category tag the command carries (its
    /// container tag plus `read`/`write`), since a command rule may name
    /// either kind of category.
    pub fn command_allowed(&self, name: &str, categories: &[&str]) -> Option<bool> {
        for rule in &self.command_rules {
            match rule {
                CommandRule::AllCommands(allow) => return Some(*allow),
                CommandRule::Category { allow, category: c } if categories.iter().any(|cat| c.eq_ignore_ascii_case(cat)) => {
                    return Some(*allow)
                }
                CommandRule::Command { allow, name: n } if n.eq_ignore_ascii_case(name) => return Some(*allow),
                _ => {}
            }
        }
        None
    }

    pub fn key_allowed(&self, key: &[u8], want: KeyMode) -> bool {
        if self.all_keys {
            return true;
        }
        self.key_patterns.iter().any(|p| p.allows(key, want))
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub enabled: bool,
    pub nopass: bool,
    pub password_hashes: Vec<PasswordHash>,
    /// Selectors in declaration order; evaluated first-match-wins within
    /// [`Permissions::command_allowed`], and the user is allowed if *any*
    /// selector grants the command and key.
    pub selectors: Vec<Permissions>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            nopass: false,
            password_hashes: Vec::new(),
            selectors: vec![Permissions::default()],
        }
    }

    pub fn check_password(&self, password: &[u8]) -> bool {
        if self.nopass {
            return true;
        }
        let hash = hash_password(password);
        self.password_hashes.iter().any(|h| *h == hash)
    }

    pub fn can_run(&self, name: &str, categories: &[&str], keys: &[(&[u8], KeyMode)]) -> bool {
        matches!(self.check(name, categories, keys), PermCheck::Allowed)
    }

    /// Like [`User::can_run`] but distinguishes *why* a denial happened, so
    /// callers can surface the two distinct `NOPERM` messages the wire
    /// protocol requires: one for "not allowed to run this command at all",
    /// another for "allowed to run it, but not against this key".
    pub fn check(&self, name: &str, categories: &[&str], keys: &[(&[u8], KeyMode)]) -> PermCheck {
        let mut any_command_allowed = false;
        for selector in &self.selectors {
            let cmd_ok = selector.command_allowed(name, categories).unwrap_or(false);
            if !cmd_ok {
                continue;
            }
            any_command_allowed = true;
            if keys.iter().all(|(k, mode)| selector.key_allowed(k, *mode)) {
                return PermCheck::Allowed;
            }
        }
        if any_command_allowed {
            PermCheck::NoKey
        } else {
            PermCheck::NoCommand
        }
    }
}

/// The outcome of [`User::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermCheck {
    Allowed,
    /// No selector permits running this command at all.
    NoCommand,
    /// At least one selector permits the command, but none permit every key
    /// in the mode requested.
    NoKey,
}

pub struct AclTable {
    users: RwLock<HashMap<String, User>>,
}

impl AclTable {
    pub fn with_default_user() -> Self {
        let mut root = User::new("default");
        root.enabled = true;
        root.nopass = true;
        root.selectors = vec![Permissions {
            all_keys: true,
            command_rules: vec![CommandRule::AllCommands(true)],
            key_patterns: Vec::new(),
        }];
        let mut users = HashMap::new();
        users.insert(root.name.clone(), root);
        Self { users: RwLock::new(users) }
    }

    pub fn get(&self, name: &str) -> Option<User> {
        self.users.read().get(name).cloned()
    }

    pub fn upsert(&self, user: User) {
        self.users.write().insert(user.name.clone(), user);
    }

    pub fn delete(&self, name: &str) -> bool {
        if name == "default" {
            return false;
        }
        self.users.write().remove(name).is_some()
    }

    pub fn list_names(&self) -> Vec<String> {
        self.users.read().keys().cloned().collect()
    }

    pub fn authenticate(&self, name: &str, password: &[u8]) -> Result<(), ServerError> {
        let user = self.users.read().get(name).cloned().ok_or_else(ServerError::wrong_pass)?;
        if !user.enabled || !user.check_password(password) {
            return Err(ServerError::wrong_pass());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_user_runs_anything() {
        let table = AclTable::with_default_user();
        let user = table.get("default").unwrap();
        assert!(user.can_run("get", &["string", "read"], &[(b"any", KeyMode::Read)]));
    }

    #[test]
    fn restricted_user_denies_unlisted_command() {
        let mut user = User::new("limited");
        user.enabled = true;
        user.nopass = true;
        user.selectors = vec![Permissions {
            all_keys: true,
            command_rules: vec![CommandRule::Command { allow: true, name: "get".into() }],
            key_patterns: Vec::new(),
        }];
        assert!(user.can_run("get", &["string", "read"], &[(b"k", KeyMode::Read)]));
        assert!(!user.can_run("set", &["string", "write"], &[(b"k", KeyMode::Write)]));
    }

    #[test]
    fn key_pattern_restricts_by_mode() {
        let mut user = User::new("ro");
        user.enabled = true;
        user.nopass = true;
        user.selectors = vec![Permissions {
            all_keys: false,
            command_rules: vec![CommandRule::AllCommands(true)],
            key_patterns: vec![KeyPattern { mode: KeyMode::Read, pattern: "*".into() }],
        }];
        assert!(user.can_run("get", &["string", "read"], &[(b"k", KeyMode::Read)]));
        assert!(!user.can_run("set", &["string", "write"], &[(b"k", KeyMode::Write)]));
    }
}
