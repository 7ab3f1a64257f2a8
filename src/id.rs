//! Task id generation.
//!
//! Ids are a slug of the task text plus 4 random hex characters. They are
//! collision-resistant within a single store, not globally unique.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Maximum length of the slug portion of an id.
const MAX_SLUG_LEN: usize = 24;

/// Counter used instead of random hex when deterministic ids are enabled.
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Whether to use deterministic ids (for testing).
static USE_DETERMINISTIC_IDS: AtomicBool = AtomicBool::new(false);

/// Enable deterministic id generation for testing.
///
/// When enabled, id suffixes come from a counter instead of random hex.
pub fn enable_deterministic_ids() {
    USE_DETERMINISTIC_IDS.store(true, Ordering::SeqCst);
    TEST_COUNTER.store(0, Ordering::SeqCst);
}

/// Disable deterministic id generation.
pub fn disable_deterministic_ids() {
    USE_DETERMINISTIC_IDS.store(false, Ordering::SeqCst);
}

/// Convert task text to a slug: lowercase ASCII alphanumerics with single
/// hyphens, truncated to [`MAX_SLUG_LEN`] without a trailing hyphen.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len().min(MAX_SLUG_LEN));
    let mut last_was_hyphen = true; // Start true to avoid a leading hyphen.

    for c in text.chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Generate a 4-character hex suffix.
#[allow(clippy::cast_possible_truncation)]
fn suffix() -> String {
    if USE_DETERMINISTIC_IDS.load(Ordering::SeqCst) {
        let count = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        format!("{count:04x}")
    } else {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let state = RandomState::new();
        let mut hasher = state.build_hasher();
        // Truncation is fine - this is entropy, not precision.
        hasher.write_u64(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos() as u64),
        );
        format!("{:04x}", hasher.finish() & 0xFFFF)
    }
}

/// Generate a task id from the task text.
#[must_use]
pub fn generate_id(text: &str) -> String {
    let slug = slugify(text);
    let suffix = suffix();
    if slug.is_empty() {
        format!("task-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serial_test::serial;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Buy milk"), "buy-milk");
        assert_eq!(slugify("Fix: the bug (urgent)"), "fix-the-bug-urgent");
        assert_eq!(slugify("simple"), "simple");
    }

    #[test]
    fn test_slugify_empty_and_symbols() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_hyphen() {
        let slug = slugify(&"word ".repeat(20));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    #[serial]
    fn test_generate_id_format() {
        enable_deterministic_ids();
        let id = generate_id("Buy milk");
        assert_eq!(id, "buy-milk-0000");
        let id = generate_id("Buy milk");
        assert_eq!(id, "buy-milk-0001");
        disable_deterministic_ids();
    }

    #[test]
    #[serial]
    fn test_generate_id_empty_text_falls_back() {
        enable_deterministic_ids();
        let id = generate_id("!!!");
        assert!(id.starts_with("task-"));
        disable_deterministic_ids();
    }

    #[test]
    #[serial]
    fn test_random_suffixes_differ() {
        disable_deterministic_ids();
        let a = generate_id("same text");
        let b = generate_id("same text");
        // 1/65536 chance of collision; acceptable for this test.
        assert!(a.starts_with("same-text-"));
        assert!(b.starts_with("same-text-"));
    }

    proptest! {
        #[test]
        fn prop_slug_is_bounded_and_clean(text in ".*") {
            let slug = slugify(&text);
            prop_assert!(slug.len() <= MAX_SLUG_LEN);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
