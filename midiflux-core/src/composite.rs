// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Composite actions (C5): `Sequence`, `Conditional`, `StateConditional`,
//! `Alternating`, and the `RelativeCc` wrapper used by the relative-CC
//! decoder (C7). Each type is a field of the matching [`crate::action::Action`]
//! variant; their `execute`/`execute_async`/`validate` methods are called
//! from there.

use crate::action::{Action, ErrorPolicy, ExecutionContext, ValidationError};
use crate::error::ActionError;
use crate::model::ActionId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Sequence {
    pub id: ActionId,
    pub sub_actions: Vec<Action>,
    pub error_policy: ErrorPolicy,
}

impl Sequence {
    pub fn validate(&self, path: &str, depth: usize) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.sub_actions.is_empty() {
            errors.push(ValidationError::new(path, "Sequence.subActions must be non-empty"));
        }
        for (i, child) in self.sub_actions.iter().enumerate() {
            errors.extend(child.validate(&format!("{path}.subActions[{i}]"), depth + 1));
        }
        errors
    }

    pub fn execute(&self, ctx: &ExecutionContext, value: Option<i32>) -> Result<(), ActionError> {
        let mut first_error = None;
        for child in &self.sub_actions {
            let result = child.execute(ctx, value);
            if let Err(err) = result {
                warn!(action = %child.id(), error = %err, "Sequence child failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
                if self.error_policy == ErrorPolicy::StopOnError {
                    return Err(first_error.unwrap());
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn execute_async(
        &self,
        ctx: &ExecutionContext,
        value: Option<i32>,
    ) -> Result<(), ActionError> {
        let mut first_error = None;
        for child in &self.sub_actions {
            let result = if child.requires_async() {
                child.execute_async(ctx, value).await
            } else {
                child.execute(ctx, value)
            };
            if let Err(err) = result {
                warn!(action = %child.id(), error = %err, "Sequence child failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
                if self.error_policy == ErrorPolicy::StopOnError {
                    return Err(first_error.unwrap());
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// One branch of a value-range [`Conditional`].
#[derive(Debug, Clone)]
pub struct ValueCondition {
    pub min_value: i32,
    pub max_value: i32,
    pub action: Action,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Conditional {
    pub id: ActionId,
    pub conditions: Vec<ValueCondition>,
}

impl Conditional {
    pub fn validate(&self, path: &str, depth: usize) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.conditions.is_empty() {
            errors.push(ValidationError::new(path, "Conditional.conditions must be non-empty"));
        }
        let mut ranges: Vec<(i32, i32)> = Vec::new();
        for (i, cond) in self.conditions.iter().enumerate() {
            let cond_path = format!("{path}.conditions[{i}]");
            if !(0..=127).contains(&cond.min_value)
                || !(0..=127).contains(&cond.max_value)
                || cond.min_value > cond.max_value
            {
                errors.push(ValidationError::new(
                    &cond_path,
                    "requires 0 <= minValue <= maxValue <= 127",
                ));
            } else if ranges
                .iter()
                .any(|(lo, hi)| cond.min_value <= *hi && *lo <= cond.max_value)
            {
                errors.push(ValidationError::new(&cond_path, "overlaps a preceding range"));
            } else {
                ranges.push((cond.min_value, cond.max_value));
            }
            errors.extend(cond.action.validate(&format!("{cond_path}.action"), depth + 1));
        }
        errors
    }

    fn matching_action(&self, v: i32) -> Option<&Action> {
        self.conditions
            .iter()
            .find(|c| c.min_value <= v && v <= c.max_value)
            .map(|c| &c.action)
    }

    pub fn execute(&self, ctx: &ExecutionContext, value: Option<i32>) -> Result<(), ActionError> {
        let Some(v) = value else { return Ok(()) };
        match self.matching_action(v) {
            Some(action) => action.execute(ctx, Some(v)),
            None => Ok(()),
        }
    }

    pub async fn execute_async(
        &self,
        ctx: &ExecutionContext,
        value: Option<i32>,
    ) -> Result<(), ActionError> {
        let Some(v) = value else { return Ok(()) };
        match self.matching_action(v) {
            Some(action) if action.requires_async() => action.execute_async(ctx, Some(v)).await,
            Some(action) => action.execute(ctx, Some(v)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ComparisonType {
    Equals,
    GreaterThan,
    LessThan,
}

impl ComparisonType {
    fn holds(self, actual: i32, expected: i32) -> bool {
        match self {
            ComparisonType::Equals => actual == expected,
            ComparisonType::GreaterThan => actual > expected,
            ComparisonType::LessThan => actual < expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ConditionLogic {
    /// Only the first entry of `conditions` is evaluated.
    Single,
    /// All entries of `conditions` must hold.
    And,
}

impl Default for ConditionLogic {
    fn default() -> Self {
        ConditionLogic::Single
    }
}

#[derive(Debug, Clone)]
pub struct StateCondition {
    pub state_key: String,
    pub comparison_type: ComparisonType,
    pub comparison_value: i32,
}

#[derive(Debug, Clone)]
pub struct StateConditional {
    pub id: ActionId,
    pub conditions: Vec<StateCondition>,
    pub logic: ConditionLogic,
    pub true_action: Box<Action>,
    pub false_action: Option<Box<Action>>,
}

impl StateConditional {
    pub fn validate(&self, path: &str, depth: usize) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.conditions.is_empty() {
            errors.push(ValidationError::new(
                path,
                "StateConditional requires at least one condition",
            ));
        }
        if self.logic == ConditionLogic::Single && self.conditions.len() > 1 {
            debug!(path, "Single logic only evaluates conditions[0]; remaining entries are unused");
        }
        errors.extend(
            self.true_action
                .validate(&format!("{path}.trueAction"), depth + 1),
        );
        if let Some(false_action) = &self.false_action {
            errors.extend(false_action.validate(&format!("{path}.falseAction"), depth + 1));
        }
        errors
    }

    fn evaluate(&self, ctx: &ExecutionContext) -> bool {
        match self.logic {
            ConditionLogic::Single => self
                .conditions
                .first()
                .is_some_and(|c| c.comparison_type.holds(ctx.state.get(&c.state_key), c.comparison_value)),
            ConditionLogic::And => self
                .conditions
                .iter()
                .all(|c| c.comparison_type.holds(ctx.state.get(&c.state_key), c.comparison_value)),
        }
    }

    pub fn execute(&self, ctx: &ExecutionContext, value: Option<i32>) -> Result<(), ActionError> {
        if self.evaluate(ctx) {
            self.true_action.execute(ctx, value)
        } else if let Some(false_action) = &self.false_action {
            false_action.execute(ctx, value)
        } else {
            Ok(())
        }
    }

    pub async fn execute_async(
        &self,
        ctx: &ExecutionContext,
        value: Option<i32>,
    ) -> Result<(), ActionError> {
        let chosen = if self.evaluate(ctx) {
            Some(self.true_action.as_ref())
        } else {
            self.false_action.as_deref()
        };
        match chosen {
            Some(action) if action.requires_async() => action.execute_async(ctx, value).await,
            Some(action) => action.execute(ctx, value),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alternating {
    pub id: ActionId,
    pub first_action: Box<Action>,
    pub second_action: Box<Action>,
    pub start_with_first: bool,
}

impl Alternating {
    /// Internal state key tracking which side fires next (§4.5, §4.6
    /// `*Alt<actionId>`). 0 means "first is next", 1 means "second is next",
    /// matching `startWithFirst` as the uninitialized default.
    pub fn state_key(&self) -> String {
        format!("*Alt{}", self.id)
    }

    pub fn validate(&self, path: &str, depth: usize) -> Vec<ValidationError> {
        let mut errors = self
            .first_action
            .validate(&format!("{path}.firstAction"), depth + 1);
        errors.extend(
            self.second_action
                .validate(&format!("{path}.secondAction"), depth + 1),
        );
        errors
    }

    fn next_is_first(&self, ctx: &ExecutionContext) -> bool {
        let key = self.state_key();
        if ctx.state.has(&key) {
            ctx.state.get(&key) == 0
        } else {
            self.start_with_first
        }
    }

    fn advance(&self, ctx: &ExecutionContext, used_first: bool) {
        let key = self.state_key();
        let next_is_first = !used_first;
        let _ = ctx.state.set(&key, if next_is_first { 0 } else { 1 });
    }

    pub fn execute(&self, ctx: &ExecutionContext, value: Option<i32>) -> Result<(), ActionError> {
        let use_first = self.next_is_first(ctx);
        let chosen: &Action = if use_first { &self.first_action } else { &self.second_action };
        let result = chosen.execute(ctx, value);
        if result.is_ok() {
            self.advance(ctx, use_first);
        }
        result
    }

    pub async fn execute_async(
        &self,
        ctx: &ExecutionContext,
        value: Option<i32>,
    ) -> Result<(), ActionError> {
        let use_first = self.next_is_first(ctx);
        let chosen: &Action = if use_first { &self.first_action } else { &self.second_action };
        let result = if chosen.requires_async() {
            chosen.execute_async(ctx, value).await
        } else {
            chosen.execute(ctx, value)
        };
        if result.is_ok() {
            self.advance(ctx, use_first);
        }
        result
    }
}

/// Wraps the increase/decrease sub-actions driven by the relative-CC
/// decoder (C7, §4.7). The decode itself lives in [`crate::relative_cc`];
/// this type only carries the bound sub-actions and the repeated-dispatch
/// semantics.
#[derive(Debug, Clone)]
pub struct RelativeCc {
    pub id: ActionId,
    pub increase_action: Box<Action>,
    pub decrease_action: Box<Action>,
}

impl RelativeCc {
    pub fn validate(&self, path: &str, depth: usize) -> Vec<ValidationError> {
        let mut errors = self
            .increase_action
            .validate(&format!("{path}.increaseAction"), depth + 1);
        errors.extend(
            self.decrease_action
                .validate(&format!("{path}.decreaseAction"), depth + 1),
        );
        errors
    }

    /// Dispatch `|delta|` repetitions of the increase or decrease sub-action,
    /// each forwarding the original wire value. A failing iteration is
    /// logged and the remaining iterations still run (§4.7).
    pub fn execute(&self, ctx: &ExecutionContext, wire_value: Option<i32>) -> Result<(), ActionError> {
        let delta = crate::relative_cc::decode(wire_value.unwrap_or(64) as u8);
        if delta == 0 {
            return Ok(());
        }
        let (action, count) = if delta > 0 {
            (&self.increase_action, delta as u32)
        } else {
            (&self.decrease_action, (-delta) as u32)
        };
        let mut first_error = None;
        for _ in 0..count {
            if let Err(err) = action.execute(ctx, wire_value) {
                warn!(error = %err, "RelativeCC sub-action iteration failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn execute_async(
        &self,
        ctx: &ExecutionContext,
        wire_value: Option<i32>,
    ) -> Result<(), ActionError> {
        let delta = crate::relative_cc::decode(wire_value.unwrap_or(64) as u8);
        if delta == 0 {
            return Ok(());
        }
        let (action, count) = if delta > 0 {
            (&self.increase_action, delta as u32)
        } else {
            (&self.decrease_action, (-delta) as u32)
        };
        let mut first_error = None;
        for _ in 0..count {
            let result = if action.requires_async() {
                action.execute_async(ctx, wire_value).await
            } else {
                action.execute(ctx, wire_value)
            };
            if let Err(err) = result {
                warn!(error = %err, "RelativeCC sub-action iteration failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::KeyCode;

    fn key(code: u32) -> Action {
        Action::KeyPressRelease {
            id: ActionId::new(),
            key: KeyCode::Code(code),
        }
    }

    #[test]
    fn conditional_disjoint_ranges_pass_validation() {
        let cond = Conditional {
            id: ActionId::new(),
            conditions: vec![
                ValueCondition { min_value: 0, max_value: 63, action: key(1), description: None },
                ValueCondition { min_value: 64, max_value: 127, action: key(2), description: None },
            ],
        };
        assert!(cond.validate("root", 0).is_empty());
    }

    #[test]
    fn conditional_overlapping_ranges_fail_validation() {
        let cond = Conditional {
            id: ActionId::new(),
            conditions: vec![
                ValueCondition { min_value: 0, max_value: 70, action: key(1), description: None },
                ValueCondition { min_value: 64, max_value: 127, action: key(2), description: None },
            ],
        };
        assert!(!cond.validate("root", 0).is_empty());
    }

    #[test]
    fn conditional_matches_first_containing_range() {
        let cond = Conditional {
            id: ActionId::new(),
            conditions: vec![
                ValueCondition { min_value: 0, max_value: 63, action: key(1), description: None },
                ValueCondition { min_value: 64, max_value: 127, action: key(2), description: None },
            ],
        };
        let matched = cond.matching_action(30).expect("30 is in the first range");
        assert_eq!(matched.id(), cond.conditions[0].action.id());
        assert!(cond.matching_action(200).is_none());
    }
}
