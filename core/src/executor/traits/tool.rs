use std::collections::BTreeSet;

use rand::seq::IteratorRandom;

/// Picks the tool shown as "in use" while a task runs.
///
/// Purely cosmetic: the choice never reaches the remote call and never affects
/// the task's outcome.
pub trait ToolSelector: Send + Sync {
    fn name(&self) -> &str;
    fn select(&self, tools: &BTreeSet<String>) -> Option<String>;
}

/// Uniform random choice among the declared tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomToolSelector;

impl ToolSelector for RandomToolSelector {
    fn name(&self) -> &str {
        "random"
    }

    fn select(&self, tools: &BTreeSet<String>) -> Option<String> {
        tools.iter().choose(&mut rand::thread_rng()).cloned()
    }
}

/// Never marks a tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoToolSelector;

impl ToolSelector for NoToolSelector {
    fn name(&self) -> &str {
        "none"
    }

    fn select(&self, _tools: &BTreeSet<String>) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_selector_picks_a_declared_tool() {
        let tools: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        for _ in 0..50 {
            let picked = RandomToolSelector.select(&tools).unwrap();
            assert!(tools.contains(&picked));
        }
    }

    #[test]
    fn empty_tool_set_selects_nothing() {
        assert!(RandomToolSelector.select(&BTreeSet::new()).is_none());
        let tools: BTreeSet<String> = ["a".to_string()].into();
        assert!(NoToolSelector.select(&tools).is_none());
    }
}
