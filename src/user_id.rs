use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("no user id given, use -U/--user")]
    Empty,
    #[error("invalid user id {0:?}: must start with '@'")]
    MissingSigil(String),
    #[error("invalid user id {0:?}: expected @localpart:domain")]
    MissingServerName(String),
    #[error("invalid user id {0:?}: server name must be a hostname or IP literal with an optional port")]
    InvalidServerName(String),
}

/// A Matrix user id of the form `@localpart:server_name`.
///
/// The server name is everything after the first `:`: a DNS name, IPv4
/// address or bracketed IPv6 literal, optionally followed by `:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    raw: String,
    colon: usize,
}

impl UserId {
    pub fn parse(input: &str) -> Result<Self, UserIdError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(UserIdError::Empty);
        }
        if !raw.starts_with('@') {
            return Err(UserIdError::MissingSigil(raw.to_string()));
        }
        let colon = raw
            .find(':')
            .ok_or_else(|| UserIdError::MissingServerName(raw.to_string()))?;
        if colon == 1 || colon + 1 == raw.len() {
            return Err(UserIdError::MissingServerName(raw.to_string()));
        }
        if !is_server_name(&raw[colon + 1..]) {
            return Err(UserIdError::InvalidServerName(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            colon,
        })
    }

    #[cfg(test)]
    pub fn localpart(&self) -> &str {
        &self.raw[1..self.colon]
    }

    pub fn server_name(&self) -> &str {
        &self.raw[self.colon + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

const MAX_SERVER_NAME: usize = 255;

fn is_server_name(name: &str) -> bool {
    if name.len() > MAX_SERVER_NAME {
        return false;
    }
    let (host, port) = match name.strip_prefix('[') {
        Some(rest) => match rest.split_once(']') {
            Some((literal, port)) if is_ipv6_literal(literal) => (None, port),
            _ => return false,
        },
        None => match name.split_once(':') {
            Some((host, port)) => (Some(host), &name[host.len()..]),
            None => (Some(name), ""),
        },
    };
    if host.is_some_and(|host| !is_dns_name(host)) {
        return false;
    }
    match port {
        "" => true,
        port => port
            .strip_prefix(':')
            .is_some_and(|digits| (1..=5).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Also accepts dotted IPv4 addresses, which are a subset.
fn is_dns_name(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
}

fn is_ipv6_literal(literal: &str) -> bool {
    literal.contains(':')
        && literal
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || b == b':' || b == b'.')
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
