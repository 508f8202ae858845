use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const POLICY_ENV: &str = "CHAPTERIZE_POLICY";
pub const RECURSIVE_ENV: &str = "CHAPTERIZE_RECURSIVE";

/// What to do with a file that already carries chapter/TOC frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingChapters {
    /// Use the existing frames; fall back to markers only without a TOC.
    Prefer,
    /// Leave the file alone.
    #[default]
    Skip,
    /// Rebuild from markers whenever the file has any.
    Overwrite,
}

impl Display for ExistingChapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExistingChapters::Prefer => "prefer",
            ExistingChapters::Skip => "skip",
            ExistingChapters::Overwrite => "overwrite",
        };
        f.write_str(name)
    }
}

impl FromStr for ExistingChapters {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefer" => Ok(ExistingChapters::Prefer),
            "skip" => Ok(ExistingChapters::Skip),
            "overwrite" => Ok(ExistingChapters::Overwrite),
            other => anyhow::bail!(
                "Unknown existing-chapters policy {:?} (expected prefer, skip or overwrite)",
                other
            ),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub policy: ExistingChapters,
    /// Descend into sub-directories when the target is a directory.
    pub recursive: bool,
    /// Load and report, never write.
    pub dry_run: bool,
    /// Print each file's chapters.
    pub list: bool,
    /// Print the batch report as JSON instead of text.
    pub json: bool,
}

impl Config {
    /// Defaults overridden by `CHAPTERIZE_POLICY` and `CHAPTERIZE_RECURSIVE`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Some(policy) = lookup(POLICY_ENV) {
            config.policy = policy
                .parse()
                .with_context(|| format!("Invalid {}", POLICY_ENV))?;
        }

        if let Some(recursive) = lookup(RECURSIVE_ENV) {
            config.recursive = parse_flag(&recursive)
                .with_context(|| format!("Invalid {}", RECURSIVE_ENV))?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_skip_files_with_chapters() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.policy, ExistingChapters::Skip);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (POLICY_ENV, "Overwrite"),
            (RECURSIVE_ENV, "yes"),
        ]))
        .unwrap();
        assert_eq!(config.policy, ExistingChapters::Overwrite);
        assert!(config.recursive);
    }

    #[test]
    fn bad_environment_values_are_reported() {
        let err = Config::from_lookup(lookup_from(&[(POLICY_ENV, "sometimes")])).unwrap_err();
        assert!(format!("{:#}", err).contains("sometimes"));
        assert!(Config::from_lookup(lookup_from(&[(RECURSIVE_ENV, "maybe")])).is_err());
    }

    #[test]
    fn policy_round_trips_through_text() {
        for policy in [
            ExistingChapters::Prefer,
            ExistingChapters::Skip,
            ExistingChapters::Overwrite,
        ] {
            assert_eq!(policy.to_string().parse::<ExistingChapters>().unwrap(), policy);
        }
    }
}
