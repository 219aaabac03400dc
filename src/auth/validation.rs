//! Declarative field rules shared by registration and the interactive
//! field-check endpoint.

use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date, OffsetDateTime};

use crate::error::FieldError;

pub const FIELD_NAME: &str = "nombre";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_PHONE: &str = "telefono";
pub const FIELD_BIRTH_DATE: &str = "fecha_nacimiento";
pub const FIELD_PASSWORD: &str = "password_hash";

pub const MIN_AGE: i32 = 18;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PHONE_LENGTH: usize = 10;

/// One predicate over a single form field.
pub struct FieldRule {
    pub field: &'static str,
    pub check: fn(&str) -> bool,
    pub message: &'static str,
}

pub static SCHEMA: &[FieldRule] = &[
    FieldRule {
        field: FIELD_NAME,
        check: has_first_and_last_name,
        message: "full name must include first and last name",
    },
    FieldRule {
        field: FIELD_EMAIL,
        check: is_valid_email,
        message: "invalid email",
    },
    FieldRule {
        field: FIELD_PHONE,
        check: is_valid_phone,
        message: "phone must have exactly 10 digits",
    },
    FieldRule {
        field: FIELD_BIRTH_DATE,
        check: is_valid_birth_date,
        message: "invalid birth date",
    },
    FieldRule {
        field: FIELD_BIRTH_DATE,
        check: is_adult,
        message: "must be 18 or older",
    },
    FieldRule {
        field: FIELD_PASSWORD,
        check: is_strong_password,
        message: "password needs 8+ characters with upper and lower case letters and a digit",
    },
];

/// Runs every rule registered for `field` against `value`.
pub fn check_field(field: &str, value: &str) -> Vec<FieldError> {
    SCHEMA
        .iter()
        .filter(|rule| rule.field == field && !(rule.check)(value))
        .map(|rule| FieldError {
            field: rule.field,
            message: rule.message,
        })
        .collect()
}

/// Runs the schema over every `(field, value)` pair, in order.
pub fn check_fields<'a, I>(fields: I) -> Vec<FieldError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    fields
        .into_iter()
        .flat_map(|(field, value)| check_field(field, value))
        .collect()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn has_first_and_last_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == PHONE_LENGTH && phone.bytes().all(|b| b.is_ascii_digit())
}

fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LENGTH
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

fn is_valid_birth_date(value: &str) -> bool {
    parse_birth_date(value).is_some()
}

// An unparsable date is reported by `is_valid_birth_date` alone.
fn is_adult(value: &str) -> bool {
    match parse_birth_date(value) {
        Some(birth) => age_on(birth, OffsetDateTime::now_utc().date()) >= MIN_AGE,
        None => true,
    }
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn parse_birth_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: Date, today: Date) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        age -= 1;
    }
    age
}
