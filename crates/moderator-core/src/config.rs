//! Tuning configuration loaded from the environment.

use std::env;
use std::time::Duration;

/// Timing and feature knobs for a moderated session, loaded from environment
/// variables with sensible defaults when unset or unparsable.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeratorConfig {
    pub silence_prompt_seconds: f64,
    pub silence_grace_seconds: f64,
    pub max_answer_seconds: f64,
    pub wrapup_seconds: f64,
    pub end_of_speech_silence: f64,
    pub group_type: Option<String>,
    pub guide_file: Option<String>,
    pub turn_timers_enabled: bool,
}

impl Default for ModeratorConfig {
    fn default() -> Self {
        Self {
            silence_prompt_seconds: 12.0,
            silence_grace_seconds: 8.0,
            max_answer_seconds: 45.0,
            wrapup_seconds: 15.0,
            end_of_speech_silence: 4.0,
            group_type: None,
            guide_file: None,
            turn_timers_enabled: true,
        }
    }
}

impl ModeratorConfig {
    /// Loads configuration from the process environment, falling back to
    /// defaults for any variable that is unset or does not parse.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            silence_prompt_seconds: env_f64("SILENCE_PROMPT_SECONDS", defaults.silence_prompt_seconds),
            silence_grace_seconds: env_f64("SILENCE_GRACE_SECONDS", defaults.silence_grace_seconds),
            max_answer_seconds: env_f64("MAX_ANSWER_SECONDS", defaults.max_answer_seconds),
            wrapup_seconds: env_f64("WRAPUP_SECONDS", defaults.wrapup_seconds),
            end_of_speech_silence: env_f64("END_OF_SPEECH_SILENCE", defaults.end_of_speech_silence),
            group_type: env_opt_string("GROUP_TYPE"),
            guide_file: env_opt_string("GUIDE_FILE"),
            turn_timers_enabled: env_bool("TURN_TIMERS_ENABLED", defaults.turn_timers_enabled),
        }
    }

    pub fn silence_prompt(&self) -> Duration {
        Duration::from_secs_f64(self.silence_prompt_seconds)
    }

    pub fn silence_grace(&self) -> Duration {
        Duration::from_secs_f64(self.silence_grace_seconds)
    }

    pub fn max_answer(&self) -> Duration {
        Duration::from_secs_f64(self.max_answer_seconds)
    }

    pub fn wrapup(&self) -> Duration {
        Duration::from_secs_f64(self.wrapup_seconds)
    }

    pub fn end_of_speech_silence(&self) -> Duration {
        Duration::from_secs_f64(self.end_of_speech_silence)
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_opt_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_ranges() {
        let cfg = ModeratorConfig::default();
        assert!((8.0..=20.0).contains(&cfg.silence_prompt_seconds));
        assert!((5.0..=15.0).contains(&cfg.silence_grace_seconds));
        assert!((25.0..=60.0).contains(&cfg.max_answer_seconds));
        assert!((10.0..=30.0).contains(&cfg.wrapup_seconds));
        assert!((2.0..=8.0).contains(&cfg.end_of_speech_silence));
        assert!(cfg.turn_timers_enabled);
    }

    #[test]
    fn env_bool_accepts_common_truthy_forms() {
        assert!(env_bool("__NONEXISTENT_MODERATOR_FLAG__", true));
    }
}
