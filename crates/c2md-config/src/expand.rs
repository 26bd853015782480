//! `${VAR}` expansion in configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// Bare `$VAR` is left untouched so URLs containing `$` survive. An unset
/// variable without a default is an error naming the config `field`.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let lookup = |var: &str| -> Result<Option<String>, UnsetVar> {
        std::env::var(var)
            .map(Some)
            .map_err(|_| UnsetVar(var.to_owned()))
    };

    shellexpand::env_with_context(value, lookup)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.0),
        })
}

/// Expand an optional field in place.
pub(crate) fn expand_opt(value: &mut Option<String>, field: &str) -> Result<(), ConfigError> {
    if let Some(v) = value.as_mut() {
        *v = expand_env(v, field)?;
    }
    Ok(())
}

/// Name of a variable that has no value.
struct UnsetVar(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_passthrough() {
        assert_eq!(
            expand_env("https://wiki.example.com", "confluence.server").unwrap(),
            "https://wiki.example.com"
        );
    }

    #[test]
    fn test_set_variable() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("C2MD_TEST_WIKI_HOST", "wiki.internal");
        }
        let result = expand_env("https://${C2MD_TEST_WIKI_HOST}/wiki", "confluence.server").unwrap();
        assert_eq!(result, "https://wiki.internal/wiki");
        unsafe {
            std::env::remove_var("C2MD_TEST_WIKI_HOST");
        }
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("C2MD_TEST_UNSET_USER");
        }
        let result = expand_env("${C2MD_TEST_UNSET_USER:-reader}", "confluence.user").unwrap();
        assert_eq!(result, "reader");
    }

    #[test]
    fn test_unset_without_default_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("C2MD_TEST_MISSING_PASSWORD");
        }
        let err = expand_env("${C2MD_TEST_MISSING_PASSWORD}", "confluence.password").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("C2MD_TEST_MISSING_PASSWORD"), "{msg}");
        assert!(msg.contains("confluence.password"), "{msg}");
    }

    #[test]
    fn test_bare_dollar_kept() {
        assert_eq!(expand_env("pa$$word", "confluence.password").unwrap(), "pa$$word");
    }

    #[test]
    fn test_expand_opt_none_is_noop() {
        let mut value = None;
        expand_opt(&mut value, "diagrams.kroki_url").unwrap();
        assert!(value.is_none());
    }
}
