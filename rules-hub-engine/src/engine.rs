//! Rule engine: coalesced evaluation passes over fact snapshots

use rules_hub_core::{Action, Rule};
use rules_hub_facts::FactRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::ActionDispatcher;

/// Evaluation state of a registered rule
///
/// Each evaluation pass drives an affected rule through
/// `Idle -> Evaluating -> Matched | NotMatched -> Idle`; between passes
/// every rule sits in `Idle`. The terminal outcome of the most recent
/// evaluation is kept separately as a [`RuleOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    /// Ready for the next pass
    Idle,
    /// Condition currently being evaluated
    Evaluating,
    /// Condition matched; actions appended to the batch
    Matched,
    /// Condition did not match (or failed)
    NotMatched,
}

/// Terminal outcome of a rule's most recent evaluation
///
/// A condition failure counts as `NotMatched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Matched,
    NotMatched,
}

struct RegisteredRule {
    rule: Rule,
    state: RuleState,
    last_outcome: Option<RuleOutcome>,
}

/// Holds the rule set and re-evaluates the rules affected by fact changes
///
/// Rules are immutable once registered. Every evaluation pass reads facts
/// as already-known snapshots and never suspends; the resulting batch is
/// handed to the dispatcher exactly once per pass.
pub struct RuleEngine {
    facts: Arc<FactRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    rules: RwLock<Vec<RegisteredRule>>,
}

impl RuleEngine {
    pub fn new(facts: Arc<FactRegistry>, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            facts,
            dispatcher,
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Register a rule; registration order breaks priority ties
    pub fn register_rule(&self, rule: Rule) {
        self.rules.write().unwrap().push(RegisteredRule {
            rule,
            state: RuleState::Idle,
            last_outcome: None,
        });
    }

    /// Current evaluation state per rule id
    pub fn rule_states(&self) -> HashMap<String, RuleState> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .map(|entry| (entry.rule.id.clone(), entry.state))
            .collect()
    }

    /// Outcome of the most recent evaluation per rule id
    ///
    /// `None` for rules that were never affected by a pass.
    pub fn last_outcomes(&self) -> HashMap<String, Option<RuleOutcome>> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .map(|entry| (entry.rule.id.clone(), entry.last_outcome))
            .collect()
    }

    /// Run one evaluation pass for a set of simultaneously changed facts
    ///
    /// Each affected rule is evaluated exactly once, even when several of
    /// its referenced facts changed in the same tick. Matching rules append
    /// their actions in declared order to a single batch sorted by
    /// descending priority (stable for equal priorities), dispatched once.
    pub async fn on_facts_changed(&self, changed: &HashSet<String>) {
        let batch = self.evaluate(changed);
        self.dispatcher.dispatch(batch).await;
    }

    /// Consume a fact change feed, coalescing queued changes into one tick
    pub async fn run(self: Arc<Self>, mut changes: mpsc::UnboundedReceiver<String>) {
        while let Some(first) = changes.recv().await {
            let mut changed = HashSet::new();
            changed.insert(first);
            while let Ok(name) = changes.try_recv() {
                changed.insert(name);
            }
            self.on_facts_changed(&changed).await;
        }
    }

    fn evaluate(&self, changed: &HashSet<String>) -> Vec<Action> {
        let mut rules = self.rules.write().unwrap();

        // Affected rules in registration order; the stable sort keeps that
        // order for equal priorities.
        let mut affected: Vec<usize> = (0..rules.len())
            .filter(|&i| !rules[i].rule.referenced_facts.is_disjoint(changed))
            .collect();
        affected.sort_by_key(|&i| std::cmp::Reverse(rules[i].rule.priority));

        tracing::debug!(
            changed = changed.len(),
            affected = affected.len(),
            "evaluation pass"
        );

        let mut batch = Vec::new();
        for &i in &affected {
            let entry = &mut rules[i];
            entry.state = RuleState::Evaluating;

            let snapshot = self.facts.current_values(&entry.rule.referenced_facts);
            match (entry.rule.condition)(&snapshot) {
                Ok(true) => {
                    entry.state = RuleState::Matched;
                    entry.last_outcome = Some(RuleOutcome::Matched);
                    batch.extend(entry.rule.actions.iter().cloned());
                }
                Ok(false) => {
                    entry.state = RuleState::NotMatched;
                    entry.last_outcome = Some(RuleOutcome::NotMatched);
                }
                Err(e) => {
                    entry.state = RuleState::NotMatched;
                    entry.last_outcome = Some(RuleOutcome::NotMatched);
                    tracing::error!("Rule '{}' condition failed: {:#}", entry.rule.id, e);
                }
            }
        }

        // The pass is over; affected rules return to Idle.
        for &i in &affected {
            rules[i].state = RuleState::Idle;
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rules_hub_core::{ActionHandler, Condition};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct BatchRecorder {
        types: Vec<String>,
        batches: Mutex<Vec<Vec<Action>>>,
    }

    impl BatchRecorder {
        fn new(types: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                types: types.iter().map(|t| t.to_string()).collect(),
                batches: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ActionHandler for BatchRecorder {
        fn supporting_action_types(&self) -> &[String] {
            &self.types
        }

        async fn execute_action(&self, actions: Vec<Action>) -> anyhow::Result<()> {
            self.batches.lock().unwrap().push(actions);
            Ok(())
        }
    }

    fn always_true() -> Condition {
        Box::new(|_| Ok(true))
    }

    fn setup() -> (Arc<FactRegistry>, Arc<ActionDispatcher>, RuleEngine) {
        let facts = Arc::new(FactRegistry::new());
        let dispatcher = Arc::new(ActionDispatcher::new());
        let engine = RuleEngine::new(facts.clone(), dispatcher.clone());
        (facts, dispatcher, engine)
    }

    #[tokio::test]
    async fn test_batch_ordered_by_descending_priority() {
        let (_facts, dispatcher, engine) = setup();
        let recorder = BatchRecorder::new(&["NOTE"]);
        dispatcher.register(recorder.clone());

        engine.register_rule(Rule::new(
            "low",
            1,
            ["destination"],
            always_true(),
            vec![Action::new("NOTE", json!("low"))],
        ));
        engine.register_rule(Rule::new(
            "high",
            10,
            ["destination"],
            always_true(),
            vec![Action::new("NOTE", json!("high"))],
        ));

        engine
            .on_facts_changed(&HashSet::from(["destination".to_string()]))
            .await;

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let values: Vec<&Value> = batches[0].iter().map(|a| &a.value).collect();
        assert_eq!(values, [&json!("high"), &json!("low")]);
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_registration_order() {
        let (_facts, dispatcher, engine) = setup();
        let recorder = BatchRecorder::new(&["NOTE"]);
        dispatcher.register(recorder.clone());

        for name in ["first", "second", "third"] {
            engine.register_rule(Rule::new(
                name,
                5,
                ["destination"],
                always_true(),
                vec![Action::new("NOTE", json!(name))],
            ));
        }

        engine
            .on_facts_changed(&HashSet::from(["destination".to_string()]))
            .await;

        let batches = recorder.batches.lock().unwrap();
        let values: Vec<&Value> = batches[0].iter().map(|a| &a.value).collect();
        assert_eq!(values, [&json!("first"), &json!("second"), &json!("third")]);
    }

    #[tokio::test]
    async fn test_coalesced_facts_evaluate_each_rule_once() {
        let (_facts, dispatcher, engine) = setup();
        let recorder = BatchRecorder::new(&["NOTE"]);
        dispatcher.register(recorder.clone());

        engine.register_rule(Rule::new(
            "both",
            0,
            ["origin", "destination"],
            always_true(),
            vec![Action::new("NOTE", json!("once"))],
        ));

        engine
            .on_facts_changed(&HashSet::from([
                "origin".to_string(),
                "destination".to_string(),
            ]))
            .await;

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[tokio::test]
    async fn test_condition_reads_current_fact_values() {
        let (facts, dispatcher, engine) = setup();
        let recorder = BatchRecorder::new(&["NOTE"]);
        dispatcher.register(recorder.clone());

        engine.register_rule(Rule::new(
            "long-haul",
            0,
            ["distance"],
            Box::new(|snapshot| {
                Ok(snapshot
                    .get("distance")
                    .and_then(Value::as_i64)
                    .is_some_and(|d| d > 1000))
            }),
            vec![Action::new("NOTE", json!("long"))],
        ));

        facts.push("distance", json!(500));
        engine
            .on_facts_changed(&HashSet::from(["distance".to_string()]))
            .await;
        assert!(recorder.batches.lock().unwrap().is_empty());
        assert_eq!(
            engine.last_outcomes()["long-haul"],
            Some(RuleOutcome::NotMatched)
        );

        facts.push("distance", json!(5000));
        engine
            .on_facts_changed(&HashSet::from(["distance".to_string()]))
            .await;
        assert_eq!(recorder.batches.lock().unwrap().len(), 1);
        assert_eq!(
            engine.last_outcomes()["long-haul"],
            Some(RuleOutcome::Matched)
        );
    }

    #[tokio::test]
    async fn test_rules_return_to_idle_after_pass() {
        let (_facts, dispatcher, engine) = setup();
        dispatcher.register(BatchRecorder::new(&["NOTE"]));

        engine.register_rule(Rule::new(
            "cycled",
            0,
            ["destination"],
            always_true(),
            vec![Action::new("NOTE", json!("cycled"))],
        ));

        engine
            .on_facts_changed(&HashSet::from(["destination".to_string()]))
            .await;

        assert_eq!(engine.rule_states()["cycled"], RuleState::Idle);
        assert_eq!(engine.last_outcomes()["cycled"], Some(RuleOutcome::Matched));
    }

    #[tokio::test]
    async fn test_failing_condition_does_not_block_other_rules() {
        let (_facts, dispatcher, engine) = setup();
        let recorder = BatchRecorder::new(&["NOTE"]);
        dispatcher.register(recorder.clone());

        engine.register_rule(Rule::new(
            "broken",
            10,
            ["destination"],
            Box::new(|_| anyhow::bail!("condition exploded")),
            vec![Action::new("NOTE", json!("broken"))],
        ));
        engine.register_rule(Rule::new(
            "healthy",
            1,
            ["destination"],
            always_true(),
            vec![Action::new("NOTE", json!("healthy"))],
        ));

        engine
            .on_facts_changed(&HashSet::from(["destination".to_string()]))
            .await;

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].value, json!("healthy"));
        assert_eq!(
            engine.last_outcomes()["broken"],
            Some(RuleOutcome::NotMatched)
        );
    }

    #[tokio::test]
    async fn test_unaffected_rules_are_skipped() {
        let (_facts, dispatcher, engine) = setup();
        let recorder = BatchRecorder::new(&["NOTE"]);
        dispatcher.register(recorder.clone());

        engine.register_rule(Rule::new(
            "other",
            0,
            ["currency"],
            always_true(),
            vec![Action::new("NOTE", json!("other"))],
        ));

        engine
            .on_facts_changed(&HashSet::from(["destination".to_string()]))
            .await;

        assert!(recorder.batches.lock().unwrap().is_empty());
        assert_eq!(engine.rule_states()["other"], RuleState::Idle);
        assert_eq!(engine.last_outcomes()["other"], None);
    }
}
