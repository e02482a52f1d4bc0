use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How the git source decides whether to look at the repository.
///
/// - `No`: never run git.
/// - `IfUndefined`: only when the parent environment carries no git facts
///   (default).
/// - `Always`: always resolve, overriding inherited values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitAccessMode {
    No,
    IfUndefined,
    Always,
}

impl Default for GitAccessMode {
    fn default() -> Self {
        GitAccessMode::IfUndefined
    }
}

impl FromStr for GitAccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "no" => Ok(GitAccessMode::No),
            "if-undefined" => Ok(GitAccessMode::IfUndefined),
            "always" => Ok(GitAccessMode::Always),
            other => Err(format!(
                "invalid git access mode: {other} (expected \"no\", \"if-undefined\" or \"always\")"
            )),
        }
    }
}

impl fmt::Display for GitAccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GitAccessMode::No => "no",
            GitAccessMode::IfUndefined => "if-undefined",
            GitAccessMode::Always => "always",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_modes() {
        assert_eq!("no".parse::<GitAccessMode>(), Ok(GitAccessMode::No));
        assert_eq!(
            " If-Undefined ".parse::<GitAccessMode>(),
            Ok(GitAccessMode::IfUndefined)
        );
        assert_eq!("always".parse::<GitAccessMode>(), Ok(GitAccessMode::Always));
        assert!("sometimes".parse::<GitAccessMode>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for mode in [GitAccessMode::No, GitAccessMode::IfUndefined, GitAccessMode::Always] {
            assert_eq!(mode.to_string().parse::<GitAccessMode>(), Ok(mode));
        }
    }
}
