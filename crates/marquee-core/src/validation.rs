//! Field-level input validation.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap_or_else(|e| panic!("email pattern is a valid regex: {e}"))
});

/// Length in characters of a token plaintext (16 bytes, base32, no padding).
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// Accumulates one message per failing field. The first failure for a field wins.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(EMAIL_RX.is_match(email), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= 300, "name", "must not be more than 300 bytes long");
}

pub fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(
        token.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

/// Name, email and password rules applied at registration.
pub fn validate_registration(v: &mut Validator, name: &str, email: &str, password: &str) {
    validate_name(v, name);
    validate_email(v, email);
    validate_password_plaintext(v, password);
}
