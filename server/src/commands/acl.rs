//! `ACL` administration: creating and inspecting users and their selectors.

use bytes::Bytes;

use crate::acl::{hash_password, CommandRule, KeyMode, KeyPattern, Permissions, User};
use crate::client::Client;
use crate::context::ServerContext;
use crate::params::ArgReader;
use crate::protocol::Reply;
use crate::util::error::ServerError;

use super::DispatchResult;

/// Applies one `ACL SETUSER` rule token to `user`, following the same
/// left-to-right, order-sensitive accumulation real ACL rule strings use.
/// `target` names which selector in `user.selectors` a key-pattern or
/// command-rule token lands on: index 0 (the root permission) for naked
/// tokens, or the selector just opened by a `(...)` group. User-identity
/// tokens (`on`/`off`/passwords) always apply to the user regardless of
/// `target`, matching real ACL syntax forbidding those inside a selector.
fn apply_rule(user: &mut User, token: &str, target: usize) -> Result<(), ServerError> {
    if token == "on" {
        user.enabled = true;
    } else if token == "off" {
        user.enabled = false;
    } else if token == "nopass" {
        user.nopass = true;
        user.password_hashes.clear();
    } else if token == "resetpass" {
        user.nopass = false;
        user.password_hashes.clear();
    } else if token == "reset" {
        *user = User::new(user.name.clone());
    } else if token == "resetkeys" {
        for sel in &mut user.selectors {
            sel.all_keys = false;
            sel.key_patterns.clear();
        }
    } else if token == "allkeys" || token == "~*" {
        user.selectors[target].all_keys = true;
    } else if token == "allcommands" || token == "+@all" {
        user.selectors[target].command_rules.push(CommandRule::AllCommands(true));
    } else if token == "nocommands" || token == "-@all" {
        user.selectors[target].command_rules.push(CommandRule::AllCommands(false));
    } else if let Some(pass) = token.strip_prefix('>') {
        user.nopass = false;
        user.password_hashes.push(hash_password(pass.as_bytes()));
    } else if let Some(pass) = token.strip_prefix('<') {
        let hash = hash_password(pass.as_bytes());
        user.password_hashes.retain(|h| *h != hash);
    } else if let Some(hash_hex) = token.strip_prefix('#') {
        let bytes = hex_decode(hash_hex).ok_or_else(|| ServerError::generic("Error in ACL SETUSER modifier '#...': invalid hash"))?;
        user.nopass = false;
        user.password_hashes.push(bytes);
    } else if let Some(cat) = token.strip_prefix("+@") {
        user.selectors[target].command_rules.push(CommandRule::Category { allow: true, category: cat.to_string() });
    } else if let Some(cat) = token.strip_prefix("-@") {
        user.selectors[target].command_rules.push(CommandRule::Category { allow: false, category: cat.to_string() });
    } else if let Some(name) = token.strip_prefix('+') {
        user.selectors[target].command_rules.push(CommandRule::Command { allow: true, name: name.to_string() });
    } else if let Some(name) = token.strip_prefix('-') {
        user.selectors[target].command_rules.push(CommandRule::Command { allow: false, name: name.to_string() });
    } else if let Some(pattern) = token.strip_prefix("~") {
        user.selectors[target].key_patterns.push(KeyPattern { mode: KeyMode::ReadWrite, pattern: pattern.to_string() });
    } else if let Some(pattern) = token.strip_prefix("%RW~").or_else(|| token.strip_prefix("%rw~")) {
        user.selectors[target].key_patterns.push(KeyPattern { mode: KeyMode::ReadWrite, pattern: pattern.to_string() });
    } else if let Some(pattern) = token.strip_prefix("%R~").or_else(|| token.strip_prefix("%r~")) {
        user.selectors[target].key_patterns.push(KeyPattern { mode: KeyMode::Read, pattern: pattern.to_string() });
    } else if let Some(pattern) = token.strip_prefix("%W~").or_else(|| token.strip_prefix("%w~")) {
        user.selectors[target].key_patterns.push(KeyPattern { mode: KeyMode::Write, pattern: pattern.to_string() });
    } else {
        return Err(ServerError::generic(format!("Error in ACL SETUSER modifier '{token}': syntax error")));
    }
    Ok(())
}

/// Splits a raw `ACL SETUSER` token stream on `(...)` selector groups.
/// Each argv token is whitespace-delimited already, so a selector group
/// spans from a token starting with `(` to the token ending with `)`
/// (inclusive, possibly the same token); everything outside a group is a
/// root-selector (or user-identity) token. Parens are stripped before the
/// individual modifier tokens inside a group are split on whitespace.
fn apply_setuser_tokens(user: &mut User, tokens: &[String]) -> Result<(), ServerError> {
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        if let Some(rest) = tok.strip_prefix('(') {
            user.selectors.push(Permissions::default());
            let target = user.selectors.len() - 1;
            let mut group = String::new();
            let mut closed = false;
            if let Some(inner) = rest.strip_suffix(')') {
                group.push_str(inner);
                closed = true;
            } else {
                group.push_str(rest);
            }
            i += 1;
            while !closed && i < tokens.len() {
                let t = &tokens[i];
                if let Some(inner) = t.strip_suffix(')') {
                    group.push(' ');
                    group.push_str(inner);
                    closed = true;
                } else {
                    group.push(' ');
                    group.push_str(t);
                }
                i += 1;
            }
            if !closed {
                return Err(ServerError::generic("Unmatched parenthesis in selector specification"));
            }
            for word in group.split_whitespace() {
                apply_rule(user, word, target)?;
            }
            continue;
        }
        apply_rule(user, tok, 0)?;
        i += 1;
    }
    Ok(())
}

fn hex_decode(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out[i] = ((hi << 4) | lo) as u8;
    }
    Some(out)
}

fn describe_user(user: &User) -> Reply {
    let mut flags = vec![if user.enabled { "on" } else { "off" }.to_string()];
    if user.nopass {
        flags.push("nopass".to_string());
    }
    let keys: String = user
        .selectors
        .iter()
        .flat_map(|s| {
            if s.all_keys {
                vec!["~*".to_string()]
            } else {
                s.key_patterns
                    .iter()
                    .map(|p| {
                        let prefix = match p.mode {
                            KeyMode::Read => "%R~",
                            KeyMode::Write => "%W~",
                            KeyMode::ReadWrite => "~",
                        };
                        format!("{prefix}{}", p.pattern)
                    })
                    .collect()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let commands: String = user
        .selectors
        .iter()
        .flat_map(|s| {
            s.command_rules.iter().map(|r| match r {
                CommandRule::AllCommands(true) => "+@all".to_string(),
                CommandRule::AllCommands(false) => "-@all".to_string(),
                CommandRule::Category { allow: true, category } => format!("+@{category}"),
                CommandRule::Category { allow: false, category } => format!("-@{category}"),
                CommandRule::Command { allow: true, name } => format!("+{name}"),
                CommandRule::Command { allow: false, name } => format!("-{name}"),
            })
        })
        .collect::<Vec<_>>()
        .join(" ");
    Reply::Map(vec![
        (Reply::bulk_str("flags"), Reply::Array(flags.into_iter().map(Reply::bulk_str).collect())),
        (Reply::bulk_str("passwords"), Reply::Array(user.password_hashes.iter().map(|h| Reply::bulk_str(hex_encode(h))).collect())),
        (Reply::bulk_str("commands"), Reply::bulk_str(if commands.is_empty() { "-@all".to_string() } else { commands })),
        (Reply::bulk_str("keys"), Reply::bulk_str(keys)),
        (Reply::bulk_str("channels"), Reply::bulk_str("")),
        (Reply::bulk_str("selectors"), Reply::Array(vec![])),
    ])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One `ACL LIST` line's modifiers, in the `on/off nopass ~keys +cmds` shape.
fn acl_line(user: &User) -> String {
    let mut parts = vec![if user.enabled { "on" } else { "off" }.to_string()];
    if user.nopass {
        parts.push("nopass".to_string());
    } else {
        parts.extend(user.password_hashes.iter().map(|h| format!("#{}", hex_encode(h))));
    }
    for sel in &user.selectors {
        if sel.all_keys {
            parts.push("~*".to_string());
        }
        for rule in &sel.command_rules {
            parts.push(match rule {
                CommandRule::AllCommands(true) => "+@all".to_string(),
                CommandRule::AllCommands(false) => "-@all".to_string(),
                CommandRule::Category { allow: true, category } => format!("+@{category}"),
                CommandRule::Category { allow: false, category } => format!("-@{category}"),
                CommandRule::Command { allow: true, name } => format!("+{name}"),
                CommandRule::Command { allow: false, name } => format!("-{name}"),
            });
        }
    }
    parts.join(" ")
}

pub fn acl(ctx: &ServerContext, c: &mut Client, args: &[Bytes]) -> DispatchResult {
    let mut r = ArgReader::new("acl", args);
    let sub = r.next_string()?.to_ascii_uppercase();
    match sub.as_str() {
        "WHOAMI" => Ok(Reply::bulk_str(c.authenticated_user.clone())),
        "LIST" => {
            let lines: Vec<Reply> = ctx
                .acl
                .list_names()
                .into_iter()
                .filter_map(|n| ctx.acl.get(&n))
                .map(|u| Reply::bulk_str(format!("user {} {}", u.name, acl_line(&u))))
                .collect();
            Ok(Reply::Array(lines))
        }
        "USERS" => Ok(Reply::Array(ctx.acl.list_names().into_iter().map(Reply::bulk_str).collect())),
        "CAT" => Ok(Reply::Array(
            ["read", "write", "keyspace", "string", "list", "hash", "set", "sortedset", "stream", "connection", "transaction", "admin", "scripting"]
                .iter()
                .map(|c| Reply::bulk_str(*c))
                .collect(),
        )),
        "GETUSER" => {
            let name = r.next_string()?;
            r.expect_end()?;
            match ctx.acl.get(&name) {
                Some(u) => Ok(describe_user(&u)),
                None => Ok(Reply::Nil),
            }
        }
        "DELUSER" => {
            let mut deleted = 0i64;
            while !r.is_empty() {
                let name = r.next_string()?;
                if ctx.acl.delete(&name) {
                    deleted += 1;
                }
            }
            Ok(Reply::Integer(deleted))
        }
        "SETUSER" => {
            let name = r.next_string()?;
            let mut user = ctx.acl.get(&name).unwrap_or_else(|| User::new(name.clone()));
            let mut tokens = Vec::new();
            while !r.is_empty() {
                tokens.push(r.next_string()?);
            }
            apply_setuser_tokens(&mut user, &tokens)?;
            if user.selectors.is_empty() {
                user.selectors.push(Permissions::default());
            }
            ctx.acl.upsert(user);
            Ok(Reply::ok())
        }
        _ => Err(ServerError::syntax()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::KeyMode;

    #[test]
    fn setuser_selector_groups_restrict_independently() {
        let mut user = User::new("u");
        let tokens: Vec<String> = "on nopass -@all (+get ~read:*) (+set ~write:*)"
            .split_whitespace()
            .map(str::to_string)
            .collect();
        apply_setuser_tokens(&mut user, &tokens).unwrap();

        assert!(user.enabled);
        assert!(user.nopass);
        assert!(user.can_run("get", &["string", "read"], &[(b"read:x", KeyMode::Read)]));
        assert!(!user.can_run("get", &["string", "read"], &[(b"write:x", KeyMode::Read)]));
        assert!(user.can_run("set", &["string", "write"], &[(b"write:x", KeyMode::Write)]));
        assert!(!user.can_run("ping", &["connection"], &[]));
    }

    #[test]
    fn naked_tokens_outside_groups_hit_root_selector() {
        let mut user = User::new("u");
        let tokens: Vec<String> = "on nopass allkeys +get".split_whitespace().map(str::to_string).collect();
        apply_setuser_tokens(&mut user, &tokens).unwrap();
        assert!(user.can_run("get", &["string", "read"], &[(b"anything", KeyMode::Read)]));
        assert!(!user.can_run("set", &["string", "write"], &[(b"anything", KeyMode::Write)]));
    }
}
