//! Classification of a step's episode boundary.
//!
//! - **Terminal**: the episode reached an absorbing state.
//! - **Truncated**: the episode was cut by an external limit.
//!
//! Both end the episode from the adapter's point of view: the underlying
//! environment is reset and the episode accumulators are zeroed. The
//! distinction is kept in the stored flags so learners can bootstrap
//! truncated segments.

/// Episode boundary state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EpisodeState {
    /// Episode continues.
    #[default]
    Running,
    /// Episode reached an absorbing state.
    Terminal,
    /// Episode hit an external limit.
    Truncated,
}

impl EpisodeState {
    /// Terminal takes precedence when both flags are set.
    #[inline]
    pub fn from_flags(terminated: bool, truncated: bool) -> Self {
        if terminated {
            Self::Terminal
        } else if truncated {
            Self::Truncated
        } else {
            Self::Running
        }
    }

    /// Whether the episode ended (terminal or truncated).
    #[inline]
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Running)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        let cases = [
            (false, false, EpisodeState::Running),
            (true, false, EpisodeState::Terminal),
            (false, true, EpisodeState::Truncated),
            (true, true, EpisodeState::Terminal),
        ];
        for (terminated, truncated, expected) in cases {
            assert_eq!(
                EpisodeState::from_flags(terminated, truncated),
                expected,
                "terminated={}, truncated={}",
                terminated,
                truncated
            );
        }
    }

    #[test]
    fn test_done_iff_any_flag() {
        assert!(!EpisodeState::Running.is_done());
        assert!(EpisodeState::Terminal.is_done());
        assert!(EpisodeState::Truncated.is_done());
        assert_eq!(EpisodeState::default(), EpisodeState::Running);
    }
}
