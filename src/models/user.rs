//! `user` table: accounts administered through the system endpoints.

use crate::config::{ColumnDecl, ColumnType, StoreKind, TableDecl};
use crate::error::{AppError, RespCode};
use crate::schema::EnumDef;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

pub const TABLE: &str = "user";

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_USER: &str = "User";

pub fn table() -> TableDecl {
    TableDecl::new(
        TABLE,
        StoreKind::Row,
        vec![
            ColumnDecl::new("id", ColumnType::Text),
            ColumnDecl::new("role", ColumnType::Text),
            ColumnDecl::nullable("email", ColumnType::Text),
            ColumnDecl::nullable("phone", ColumnType::Text),
            ColumnDecl::nullable("username", ColumnType::Text),
            ColumnDecl::new("account", ColumnType::Text),
            ColumnDecl::new("password", ColumnType::Text),
            ColumnDecl::new("valid", ColumnType::Bool),
            ColumnDecl::new("created_at", ColumnType::DateTime),
            ColumnDecl::nullable("updated_at", ColumnType::DateTime),
        ],
    )
    .with_unique("account")
}

pub fn role_enum() -> EnumDef {
    EnumDef::new(
        "Role",
        vec![(ROLE_ADMIN, json!("Administrator")), (ROLE_USER, json!("User"))],
    )
}

/// Letters, digits, `_` and `-`; at most 50 characters.
pub fn valid_account(account: &str) -> bool {
    !account.is_empty()
        && account.len() <= 50
        && account.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 8 to 16 characters from letters, digits and `(~!@$%^&*.)`, mixing at least two of those classes.
pub fn valid_password(password: &str) -> bool {
    const SPECIAL: &str = "(~!@$%^&*.)";
    if !(8..=16).contains(&password.chars().count()) {
        return false;
    }
    let (mut letter, mut digit, mut special) = (false, false, false);
    for c in password.chars() {
        if c.is_ascii_alphabetic() {
            letter = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else if SPECIAL.contains(c) {
            special = true;
        } else {
            return false;
        }
    }
    [letter, digit, special].iter().filter(|f| **f).count() >= 2
}

pub fn valid_username(username: &str) -> bool {
    username.chars().count() <= 25
}

pub fn valid_phone(phone: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(?:\+86)?1[3-9]\d{9}|1[3-9]\d-\d{4}-\d{4}|1[3-9]\d-\d{3}-\d{5})\b").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(phone))
}

pub fn valid_email(mail: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(mail))
}

/// Argon2id PHC string for a raw password.
pub fn hash_password(raw: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::with_message(RespCode::Error, format!("password hashing failed: {}", e)))
}

pub fn verify_password(raw: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(raw.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
