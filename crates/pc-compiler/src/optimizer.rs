use std::collections::HashSet;

use pc_core::{Condition, ConditionType};

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub disabled: usize,
    /// A `True` condition made the rest of the list redundant
    pub always_true: bool,
}

/// Shrink a condition list without changing whether it matches.
///
/// Disabled (`False`) conditions are dropped, duplicates (same tag) keep
/// their first occurrence, and a `True` condition replaces the whole list.
pub fn optimize_conditions(conditions: &mut Vec<Condition>) -> OptimizeStats {
    let before = conditions.len();

    let mut disabled = 0usize;
    conditions.retain(|condition| {
        if condition.condition_type() == ConditionType::False {
            disabled += 1;
            return false;
        }
        true
    });

    let always_true = match conditions
        .iter()
        .position(|condition| condition.condition_type() == ConditionType::True)
    {
        Some(pos) => {
            let keep = conditions.swap_remove(pos);
            conditions.clear();
            conditions.push(keep);
            true
        }
        None => false,
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = 0usize;
    conditions.retain(|condition| {
        if seen.insert(condition.tag()) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    let after = conditions.len();
    log::debug!(
        "optimized conditions: {} -> {} (disabled {}, deduped {})",
        before,
        after,
        disabled,
        deduped
    );

    OptimizeStats {
        before,
        after,
        deduped,
        disabled,
        always_true,
    }
}
