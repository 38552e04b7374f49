use crate::history::BUFSIZ;
use anyhow::{Result, ensure};
use nix::unistd::Uid;

/// Startup settings for an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of commands the history remembers.
    pub history_capacity: usize,
    /// Print the welcome line before the first prompt.
    pub banner: bool,
    /// Character closing the prompt: `#` for root, `$` otherwise.
    pub prompt_marker: char,
}

impl Config {
    pub fn new(history_capacity: usize, banner: bool) -> Result<Self> {
        ensure!(history_capacity > 0, "history size must be at least 1");
        Ok(Self {
            history_capacity,
            banner,
            prompt_marker: marker_for(Uid::effective()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_capacity: BUFSIZ,
            banner: true,
            prompt_marker: marker_for(Uid::effective()),
        }
    }
}

fn marker_for(uid: Uid) -> char {
    if uid.is_root() { '#' } else { '$' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity_is_line_buffer_size() {
        let config = Config::default();
        assert_eq!(config.history_capacity, 8192);
        assert!(config.banner);
    }

    #[test]
    fn test_zero_history_is_rejected() {
        assert!(Config::new(0, true).is_err());
        assert_eq!(Config::new(5, false).unwrap().history_capacity, 5);
    }

    #[test]
    fn test_prompt_marker_follows_effective_uid() {
        assert_eq!(marker_for(Uid::from_raw(0)), '#');
        assert_eq!(marker_for(Uid::from_raw(1000)), '$');
        let expected = marker_for(Uid::effective());
        assert_eq!(Config::default().prompt_marker, expected);
        assert_eq!(Config::new(1, true).unwrap().prompt_marker, expected);
    }
}
