//! Decision callbacks for questions the transformers cannot settle alone.

use std::collections::VecDeque;

/// Chooses one of several labelled options.
///
/// Callers list the recommended option first, so index 0 is always a
/// sensible default.
pub trait Decider {
    fn decide(&mut self, prompt: &str, options: &[String]) -> usize;
}

/// Always takes the recommended option.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecider;

impl Decider for AutoDecider {
    fn decide(&mut self, _prompt: &str, _options: &[String]) -> usize {
        0
    }
}

/// Replays a fixed sequence of answers, then falls back to the first option.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecider {
    answers: VecDeque<usize>,
}

impl ScriptedDecider {
    pub fn new(answers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl Decider for ScriptedDecider {
    fn decide(&mut self, _prompt: &str, _options: &[String]) -> usize {
        self.answers.pop_front().unwrap_or(0)
    }
}
