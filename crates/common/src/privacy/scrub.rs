//! Deterministic identifier scrubbing for anonymised records
//!
//! Substitutions are fixed, so scrubbing the same text always yields the same
//! output and scrubbing twice is a no-op.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

pub const SSN_MASK: &str = "XXX-XX-XXXX";
pub const DATE_MASK: &str = "XX/XX/XXXX";
pub const PHONE_MASK: &str = "XXX-XXX-XXXX";
pub const EMAIL_MASK: &str = "[EMAIL]";

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?u)\b[\p{L}\p{N}._%+-]+@[\p{L}\p{N}.-]+\.[\p{L}]{2,}\b")
        .expect("EMAIL_REGEX should compile - this is a bug")
});

static SSN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("SSN_REGEX should compile - this is a bug")
});

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").expect("DATE_REGEX should compile - this is a bug")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\(\d{3}\)\s*|\b\d{3}[-.\s])\d{3}[-.\s]\d{4}\b|\b\d{10}\b")
        .expect("PHONE_REGEX should compile - this is a bug")
});

/// Replace e-mail addresses, SSNs, dates and phone numbers with fixed masks.
pub fn scrub_identifiers(text: &str) -> String {
    let scrubbed = EMAIL_REGEX.replace_all(text, EMAIL_MASK);
    let scrubbed = replace(scrubbed, &SSN_REGEX, SSN_MASK);
    let scrubbed = replace(scrubbed, &DATE_REGEX, DATE_MASK);
    replace(scrubbed, &PHONE_REGEX, PHONE_MASK).into_owned()
}

fn replace<'a>(text: Cow<'a, str>, regex: &Regex, mask: &str) -> Cow<'a, str> {
    match regex.replace_all(&text, mask) {
        Cow::Borrowed(_) => text,
        Cow::Owned(replaced) => Cow::Owned(replaced),
    }
}
