//! Built-in disposable domains and role-based local parts.

use std::collections::HashSet;

/// Throwaway mailbox providers.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "20minutemail.com",
    "33mail.com",
    "dispostable.com",
    "emailondeck.com",
    "fakeinbox.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "guerrillamailblock.com",
    "maildrop.cc",
    "mailinator.com",
    "mailinator.net",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "moakt.com",
    "sharklasers.com",
    "spamgourmet.com",
    "temp-mail.org",
    "tempail.com",
    "tempmail.com",
    "tempr.email",
    "throwawaymail.com",
    "trashmail.com",
    "yopmail.com",
    "yopmail.net",
];

/// Local parts that address a function rather than a person.
const ROLE_PREFIXES: &[&str] = &[
    "abuse",
    "admin",
    "billing",
    "contact",
    "careers",
    "help",
    "hello",
    "hostmaster",
    "info",
    "jobs",
    "marketing",
    "noreply",
    "no-reply",
    "office",
    "postmaster",
    "press",
    "sales",
    "security",
    "support",
    "team",
    "webmaster",
];

/// Lowercased lookup sets, built-ins plus configured extras.
#[derive(Debug, Clone)]
pub struct DomainLists {
    disposable: HashSet<String>,
    roles: HashSet<String>,
}

impl DomainLists {
    pub fn new(extra_disposable: &[String], extra_roles: &[String]) -> Self {
        let normalize = |s: &str| s.trim().to_lowercase();
        Self {
            disposable: DISPOSABLE_DOMAINS
                .iter()
                .copied()
                .chain(extra_disposable.iter().map(String::as_str))
                .map(normalize)
                .collect(),
            roles: ROLE_PREFIXES
                .iter()
                .copied()
                .chain(extra_roles.iter().map(String::as_str))
                .map(normalize)
                .collect(),
        }
    }

    /// Whether `domain` or any parent domain is a disposable provider.
    pub fn is_disposable(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        let mut candidate = domain.as_str();
        loop {
            if self.disposable.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return false,
            }
        }
    }

    /// Whether the local part names a role. `+tags` are ignored.
    pub fn is_role_based(&self, local: &str) -> bool {
        let local = local.to_lowercase();
        let base = local.split('+').next().unwrap_or(&local);
        self.roles.contains(base)
    }
}

impl Default for DomainLists {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposable_matches_subdomains() {
        let lists = DomainLists::default();
        assert!(lists.is_disposable("mailinator.com"));
        assert!(lists.is_disposable("MX.Mailinator.com"));
        assert!(!lists.is_disposable("acme.io"));
        assert!(!lists.is_disposable("com"));
    }

    #[test]
    fn role_ignores_tags_and_case() {
        let lists = DomainLists::default();
        assert!(lists.is_role_based("Info"));
        assert!(lists.is_role_based("sales+eu"));
        assert!(!lists.is_role_based("jane.doe"));
    }

    #[test]
    fn extras_extend_builtins() {
        let lists = DomainLists::new(&["Burner.example".into()], &[" recruiting ".into()]);
        assert!(lists.is_disposable("burner.example"));
        assert!(lists.is_role_based("recruiting"));
        assert!(lists.is_disposable("yopmail.com"));
    }
}
