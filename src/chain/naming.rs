use chrono::{DateTime, Local};
use const_format::concatcp;
use lazy_static::lazy_static;
use regex::Regex;

const SECOND_PRECISION_NAME_FORMAT: &str = "%Y.%m.%d-%H:%M:%S";
const SECOND_PRECISION_NAME_REGEX: &str = r"\d{4}\.\d{2}\.\d{2}-\d{2}:\d{2}:\d{2}";

// Tests create several backup sets per second
#[cfg(test)] const HIGH_PRECISION_NAME_FORMAT: &str = concatcp!(SECOND_PRECISION_NAME_FORMAT, ".%3f");
#[cfg(test)] const HIGH_PRECISION_NAME_REGEX: &str = concatcp!(SECOND_PRECISION_NAME_REGEX, r"\.\d{3}");

#[cfg(not(test))] const SET_NAME_FORMAT: &str = SECOND_PRECISION_NAME_FORMAT;
#[cfg(test)] const SET_NAME_FORMAT: &str = HIGH_PRECISION_NAME_FORMAT;

#[cfg(not(test))] const SET_NAME_REGEX: &str = SECOND_PRECISION_NAME_REGEX;
#[cfg(test)] const SET_NAME_REGEX: &str = HIGH_PRECISION_NAME_REGEX;

// In-flight and failed backups live under temporary names which are never selected as a chain base
pub const TEMPORARY_PREFIX: &str = ".";

lazy_static! {
    static ref SET_NAME_RE: Regex = Regex::new(concatcp!("^", SET_NAME_REGEX, "$")).unwrap();
}

pub fn new_set_name(time: DateTime<Local>) -> String {
    time.format(SET_NAME_FORMAT).to_string()
}

pub fn temporary_set_name(name: &str) -> String {
    format!("{}{}", TEMPORARY_PREFIX, name)
}

pub fn is_set_name(name: &str) -> bool {
    SET_NAME_RE.is_match(name)
}

pub fn is_temporary_name(name: &str) -> bool {
    name.starts_with(TEMPORARY_PREFIX)
}
