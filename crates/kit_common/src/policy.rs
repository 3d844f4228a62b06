//! Preservation policy - who owns a path inside the installation
//!
//! Rules are evaluated in fixed priority order: preserved rules first,
//! then reviewable-conflict rules, then the default Managed. Every path
//! classifies to exactly one outcome.

use std::path::Path;

use crate::layout::{COMMANDS_DIR, MEMORY_DIR, PAIN_POINTS_DIR, USER_CONFIG_FILE};

/// Ownership of a relative path within an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Owned by the release; freely overwritten or deleted by updates.
    Managed,
    /// User-owned; never overwritten or deleted, only left untouched.
    Preserved,
    /// May contain user customization layered on a managed template;
    /// surfaced for explicit decision, never silently acted on.
    ReviewRequired { reason: String },
}

#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// Exact relative path.
    Exact(&'static str),
    /// Any path under this directory.
    Under(&'static str),
    /// Files under `dir` whose name ends with `suffix`.
    Suffix { dir: &'static str, suffix: &'static str },
}

impl Matcher {
    fn matches(&self, path: &str) -> bool {
        match *self {
            Matcher::Exact(p) => path == p,
            Matcher::Under(dir) => is_under(path, dir),
            Matcher::Suffix { dir, suffix } => is_under(path, dir) && path.ends_with(suffix),
        }
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    path.starts_with(dir) && path[dir.len()..].starts_with('/')
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Preserved,
    Review(&'static str),
}

struct Rule {
    matcher: Matcher,
    outcome: Outcome,
}

/// Ordered-rule classifier for installation paths.
pub struct PreservationPolicy {
    rules: Vec<Rule>,
}

impl Default for PreservationPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                // Preserved rules outrank everything below them.
                Rule {
                    matcher: Matcher::Exact(USER_CONFIG_FILE),
                    outcome: Outcome::Preserved,
                },
                Rule {
                    matcher: Matcher::Under(MEMORY_DIR),
                    outcome: Outcome::Preserved,
                },
                Rule {
                    matcher: Matcher::Under(PAIN_POINTS_DIR),
                    outcome: Outcome::Preserved,
                },
                // Reviewable conflicts: user customization layered on a
                // managed template. Flagged, never auto-merged.
                Rule {
                    matcher: Matcher::Exact("settings.json"),
                    outcome: Outcome::Review("settings may carry local overrides"),
                },
                Rule {
                    matcher: Matcher::Suffix {
                        dir: COMMANDS_DIR,
                        suffix: ".local.md",
                    },
                    outcome: Outcome::Review("local command overlay on a managed template"),
                },
            ],
        }
    }
}

impl PreservationPolicy {
    /// Classify a relative path. First matching rule wins; no rule means
    /// Managed.
    pub fn classify(&self, path: &Path) -> Classification {
        let normalized = normalize(path);
        for rule in &self.rules {
            if rule.matcher.matches(&normalized) {
                return match rule.outcome {
                    Outcome::Preserved => Classification::Preserved,
                    Outcome::Review(reason) => Classification::ReviewRequired {
                        reason: reason.to_string(),
                    },
                };
            }
        }
        Classification::Managed
    }
}

/// Join path components with forward slashes so matching is
/// platform-independent.
fn normalize(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn classify(p: &str) -> Classification {
        PreservationPolicy::default().classify(&PathBuf::from(p))
    }

    #[test]
    fn test_user_config_is_preserved() {
        assert_eq!(classify("CLAUDE.md"), Classification::Preserved);
    }

    #[test]
    fn test_memory_and_pain_points_are_preserved() {
        assert_eq!(classify("memory/notes.md"), Classification::Preserved);
        assert_eq!(
            classify("memory/deep/nested.md"),
            Classification::Preserved
        );
        assert_eq!(
            classify("pain-points/2026-08.md"),
            Classification::Preserved
        );
    }

    #[test]
    fn test_prefix_match_requires_separator() {
        // "memory-extra" is not under "memory/".
        assert_eq!(classify("memory-extra/file.md"), Classification::Managed);
    }

    #[test]
    fn test_review_rules() {
        assert!(matches!(
            classify("settings.json"),
            Classification::ReviewRequired { .. }
        ));
        assert!(matches!(
            classify("commands/review.local.md"),
            Classification::ReviewRequired { .. }
        ));
    }

    #[test]
    fn test_default_is_managed() {
        assert_eq!(classify("VERSION"), Classification::Managed);
        assert_eq!(classify("commands/review.md"), Classification::Managed);
        assert_eq!(classify("README.md"), Classification::Managed);
    }

    #[test]
    fn test_classification_is_total_and_deterministic() {
        let paths = ["CLAUDE.md", "memory/a", "settings.json", "x/y/z"];
        let policy = PreservationPolicy::default();
        for p in paths {
            let a = policy.classify(&PathBuf::from(p));
            let b = policy.classify(&PathBuf::from(p));
            assert_eq!(a, b);
        }
    }
}
