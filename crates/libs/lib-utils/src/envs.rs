//! # Environment Variables
//!
//! Utilities for reading and parsing environment variables.

use std::env;
use std::str::FromStr;

/// Get an environment variable by name.
pub fn get_env(name: &'static str) -> Result<String, Error> {
    env::var(name).map_err(|_| Error::MissingEnv(name))
}

/// Get and parse an environment variable.
pub fn get_env_parse<T: FromStr>(name: &'static str) -> Result<T, Error> {
    let val = get_env(name)?;
    val.parse::<T>().map_err(|_| Error::WrongFormat(name))
}

/// Parse an environment variable, falling back to `default` when missing or malformed.
pub fn get_env_or<T: FromStr>(name: &'static str, default: T) -> T {
    get_env_parse(name).unwrap_or(default)
}

/// Read a comma-separated list. Empty entries are skipped.
pub fn get_env_list(name: &'static str) -> Result<Vec<String>, Error> {
    let val = get_env(name)?;
    Ok(val
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

// region:    --- Error
#[derive(Debug)]
pub enum Error {
    MissingEnv(&'static str),
    WrongFormat(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
// endregion: --- Error

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env() {
        assert!(matches!(
            get_env("LIB_UTILS_TEST_SURELY_MISSING"),
            Err(Error::MissingEnv("LIB_UTILS_TEST_SURELY_MISSING"))
        ));
        assert_eq!(get_env_or("LIB_UTILS_TEST_SURELY_MISSING", 7u32), 7);
    }

    #[test]
    fn test_env_list() {
        env::set_var("LIB_UTILS_TEST_LIST", " a, b ,,c ");
        assert_eq!(get_env_list("LIB_UTILS_TEST_LIST").unwrap(), vec!["a", "b", "c"]);
        env::remove_var("LIB_UTILS_TEST_LIST");
    }

    #[test]
    fn test_wrong_format() {
        env::set_var("LIB_UTILS_TEST_NUM", "abc");
        assert!(matches!(
            get_env_parse::<u64>("LIB_UTILS_TEST_NUM"),
            Err(Error::WrongFormat(_))
        ));
        env::remove_var("LIB_UTILS_TEST_NUM");
    }
}
