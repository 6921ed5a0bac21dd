//! Pure input validation. No I/O, no syscalls — every function here is a value-in,
//! `Result`-out transform, which keeps them trivially unit-testable and quickcheck-able,
//! in the spirit of `libcgroups`' controller `apply` functions which validate a resource
//! value before ever touching the filesystem.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

pub const MIN_MEMORY_MB: i64 = 64;
pub const MAX_MEMORY_MB: i64 = 8192;
pub const MIN_CPU_PERCENT: i64 = 1;
pub const MAX_CPU_PERCENT: i64 = 100;

const RESERVED_NAMES: &[&str] = &[
    "root", "admin", "system", "kernel", "init", "proc", "sys", "dev", "tmp", "var", "etc",
    "bin", "sbin", "usr", "lib", "lib64",
];

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,49}$").expect("valid regex"));

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid regex")
});

/// Validates a container name: regex shape, length, and the reserved-word list.
pub fn container_name(name: &str) -> Result<(), ValidationError> {
    if !NAME_RE.is_match(name) {
        return Err(ValidationError::BadName {
            name: name.to_string(),
        });
    }
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::ReservedName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validates a memory limit in MiB against `[64, 8192]`.
pub fn memory_mb(n: i64) -> Result<(), ValidationError> {
    if (MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&n) {
        Ok(())
    } else {
        Err(ValidationError::MemoryOutOfRange { value: n })
    }
}

/// Validates a CPU percentage against `[1, 100]`.
pub fn cpu_percent(n: i64) -> Result<(), ValidationError> {
    if (MIN_CPU_PERCENT..=MAX_CPU_PERCENT).contains(&n) {
        Ok(())
    } else {
        Err(ValidationError::CpuOutOfRange { value: n })
    }
}

/// Validates a hostname against an RFC 1123 label (lowercase/uppercase letters, digits,
/// interior hyphens, 1-63 octets). Returns the validated string unchanged on success.
pub fn hostname(name: &str) -> Result<&str, ValidationError> {
    if name.is_empty() || name.len() > 63 || !HOSTNAME_RE.is_match(name) {
        return Err(ValidationError::BadHostname {
            hostname: name.to_string(),
        });
    }
    Ok(name)
}

/// Strips all non-digit characters from `s`, then bounds-checks the remainder against
/// `max`. Returns `Err` if sanitation changed the input at all: callers at an API
/// boundary must reject, not silently coerce.
pub fn sanitize_numeric(s: &str, max: i64) -> Result<i64, ValidationError> {
    let stripped: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if stripped != s {
        return Err(ValidationError::UnsanitizedInput {
            input: s.to_string(),
        });
    }
    let value: i64 = stripped.parse().unwrap_or(i64::MAX);
    if value > max {
        return Err(ValidationError::UnsanitizedInput {
            input: s.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_names() {
        assert!(container_name("rumah-a").is_ok());
        assert!(container_name("a").is_ok());
        assert!(container_name(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn rejects_bad_length() {
        assert!(container_name("").is_err());
        assert!(container_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn rejects_reserved_names() {
        for reserved in RESERVED_NAMES {
            assert!(container_name(reserved).is_err());
            assert!(container_name(&reserved.to_uppercase()).is_err());
        }
    }

    #[test]
    fn rejects_leading_punctuation() {
        assert!(container_name("-abc").is_err());
        assert!(container_name("_abc").is_err());
    }

    #[test]
    fn memory_boundaries() {
        assert!(memory_mb(63).is_err());
        assert!(memory_mb(64).is_ok());
        assert!(memory_mb(8192).is_ok());
        assert!(memory_mb(8193).is_err());
    }

    #[test]
    fn cpu_boundaries() {
        assert!(cpu_percent(0).is_err());
        assert!(cpu_percent(1).is_ok());
        assert!(cpu_percent(100).is_ok());
        assert!(cpu_percent(101).is_err());
    }

    #[test]
    fn hostname_rejects_shell_metacharacters() {
        assert!(hostname("host;rm -rf").is_err());
        assert!(hostname("host$(whoami)").is_err());
        assert!(hostname("valid-host").is_ok());
    }

    #[test]
    fn sanitize_numeric_rejects_changed_input() {
        assert!(sanitize_numeric("512", 8192).is_ok());
        assert!(sanitize_numeric("512mb", 8192).is_err());
        assert!(sanitize_numeric("99999999999999", 8192).is_err());
    }

    quickcheck::quickcheck! {
        fn prop_memory_bounds_agree(n: i64) -> bool {
            let result = memory_mb(n);
            result.is_ok() == (MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&n)
        }

        fn prop_cpu_bounds_agree(n: i64) -> bool {
            let result = cpu_percent(n);
            result.is_ok() == (MIN_CPU_PERCENT..=MAX_CPU_PERCENT).contains(&n)
        }
    }
}
