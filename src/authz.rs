//! Path-based page authorization.
//!
//! Every request path resolves to one [`Policy`] through [`POLICY_TABLE`]; the longest
//! prefix that matches on a segment boundary wins, compared case-insensitively.
//! [`decide`] then turns the policy and the caller's claims into a [`Decision`].

use crate::models::{identity::ADMIN_ROLE, UserClaims};

/// Access requirement attached to a path prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Anonymous,
    Authenticated,
    Role(&'static str),
}

/// Outcome of the gate for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No valid session: send the caller to the login page
    RedirectToLogin,
    /// Signed in, but missing the required role
    Forbidden,
}

pub const LOGIN_PATH: &str = "/Identity/Account/Login";

pub static POLICY_TABLE: &[(&str, Policy)] = &[
    ("/Books/Index", Policy::Anonymous),
    ("/Books/Details", Policy::Anonymous),
    ("/Books", Policy::Authenticated),
    ("/Borrowings", Policy::Authenticated),
    ("/Members", Policy::Role(ADMIN_ROLE)),
    ("/Publishers", Policy::Role(ADMIN_ROLE)),
    ("/Categories", Policy::Role(ADMIN_ROLE)),
    ("/Authors", Policy::Role(ADMIN_ROLE)),
    ("/Identity/Account/Manage", Policy::Authenticated),
    ("/Identity", Policy::Anonymous),
    ("/health", Policy::Anonymous),
    ("/ready", Policy::Anonymous),
];

/// `path` starts with `prefix` and the match ends at a `/` or at the end of the path
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if path.len() < prefix.len() || !path.is_char_boundary(prefix.len()) {
        return false;
    }
    let (head, rest) = path.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix) && (rest.is_empty() || rest.starts_with('/'))
}

/// Policy for a request path; unlisted paths are public
pub fn policy_for(path: &str) -> Policy {
    POLICY_TABLE
        .iter()
        .filter(|(prefix, _)| matches_prefix(path, prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, policy)| *policy)
        .unwrap_or(Policy::Anonymous)
}

pub fn decide(policy: Policy, claims: Option<&UserClaims>) -> Decision {
    match (policy, claims) {
        (Policy::Anonymous, _) => Decision::Allow,
        (_, None) => Decision::RedirectToLogin,
        (Policy::Authenticated, Some(_)) => Decision::Allow,
        (Policy::Role(role), Some(claims)) if claims.has_role(role) => Decision::Allow,
        (Policy::Role(_), Some(_)) => Decision::Forbidden,
    }
}

/// Login redirect target carrying the page the caller asked for
pub fn login_location(return_url: &str) -> String {
    let mut encoded = String::with_capacity(return_url.len());
    for byte in return_url.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    format!("{}?ReturnUrl={}", LOGIN_PATH, encoded)
}
