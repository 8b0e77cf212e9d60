//! Declarative schema settings and their materialization into charts.
//!
//! Hosts that keep statechart definitions in configuration rather than
//! code deserialize [`StatechartSettings`] (camelCase on the wire) and feed
//! them to a [`Materializer`]. Expression strings become lazily compiled
//! evaluators; an action string starting with `@` refers to a callback
//! registered on the materializer instead.

use crate::builder::ConfigError;
use crate::core::{Chart, Entity, Guard};
use crate::diag::{DiagnosticSink, NullSink};
use crate::eval::{default_engine, ActionEvaluator, CompiledAction, CompiledExpr};
use rhai::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One statechart definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatechartSettings {
    pub name: String,
    pub initial_state: String,
    pub states: Vec<StateSettings>,
}

/// One state definition.
///
/// `condition` becomes the state's entry guard; `on_enter` and `on_entered`
/// both append to the on-enter list, in that order. `sub_chart_reference`
/// names another [`StatechartSettings`] to materialize as the nested chart.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateSettings {
    pub name: String,
    pub value: Option<String>,
    pub permission: Option<String>,
    pub sub_chart_reference: Option<String>,
    pub condition: Option<String>,
    pub on_enter: Option<String>,
    pub on_entered: Option<String>,
    pub on_exit: Option<String>,
    pub transitions: Vec<TransitionSettings>,
}

/// One transition definition, keyed by `event`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionSettings {
    pub event: String,
    pub target: String,
    pub condition: Option<String>,
    pub action: Option<String>,
}

/// Builds charts from settings.
///
/// # Example
///
/// ```rust
/// use chartflow::schema::{Materializer, StatechartSettings};
///
/// let settings: StatechartSettings = serde_json::from_str(
///     r#"{
///         "name": "doc",
///         "initialState": "draft",
///         "states": [
///             { "name": "draft", "transitions": [
///                 { "event": "submit", "target": "review" }
///             ] },
///             { "name": "review" }
///         ]
///     }"#,
/// )
/// .unwrap();
///
/// let materializer: Materializer<serde_json::Value> = Materializer::new();
/// let chart = materializer.materialize(&settings).unwrap();
/// assert_eq!(chart.state_count(), 2);
/// ```
pub struct Materializer<E: Entity> {
    engine: Arc<Engine>,
    sink: Arc<dyn DiagnosticSink>,
    actions: HashMap<String, Arc<dyn ActionEvaluator<E>>>,
}

impl<E: Entity> Materializer<E> {
    pub fn new() -> Self {
        Self {
            engine: default_engine(),
            sink: Arc::new(NullSink),
            actions: HashMap::new(),
        }
    }

    /// Use a host-configured script engine for compiled expressions.
    pub fn with_engine(mut self, engine: Arc<Engine>) -> Self {
        self.engine = engine;
        self
    }

    /// Sink observing compile attempts of materialized expressions.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a named callback reachable from settings as `@name`.
    pub fn register_action(
        mut self,
        name: impl Into<String>,
        action: Arc<dyn ActionEvaluator<E>>,
    ) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Materialize a single settings document. Sub-chart references are an
    /// error here; use [`Self::materialize_all`] when charts nest.
    pub fn materialize(&self, settings: &StatechartSettings) -> Result<Chart<E>, ConfigError> {
        self.materialize_all(std::slice::from_ref(settings), &settings.name)
    }

    /// Materialize the chart named `root`, resolving `subChartReference`
    /// fields against the other settings in `all`.
    pub fn materialize_all(
        &self,
        all: &[StatechartSettings],
        root: &str,
    ) -> Result<Chart<E>, ConfigError> {
        let index: HashMap<&str, &StatechartSettings> =
            all.iter().map(|s| (s.name.as_str(), s)).collect();
        let settings = index
            .get(root)
            .copied()
            .ok_or_else(|| ConfigError::UnknownSubChart {
                name: root.to_string(),
            })?;
        let mut visiting = vec![root.to_string()];
        self.build(settings, &index, &mut visiting)
    }

    fn build(
        &self,
        settings: &StatechartSettings,
        index: &HashMap<&str, &StatechartSettings>,
        visiting: &mut Vec<String>,
    ) -> Result<Chart<E>, ConfigError> {
        let mut seen = HashSet::new();
        for state in &settings.states {
            if !seen.insert(state.name.as_str()) {
                return Err(ConfigError::DuplicateState {
                    name: state.name.clone(),
                });
            }
        }
        if !seen.contains(settings.initial_state.as_str()) {
            return Err(ConfigError::UnknownState {
                name: settings.initial_state.clone(),
            });
        }

        let mut chart = Chart::named(&settings.name);
        chart.initial(&settings.initial_state);

        for state in &settings.states {
            let mut handle = chart.state(&state.name);
            if let Some(value) = &state.value {
                handle = handle.display(value);
            }
            if let Some(permission) = &state.permission {
                handle = handle.permission(permission);
            }
            if let Some(condition) = &state.condition {
                handle = handle.guard_with(Guard::from_expr(self.expr(condition)));
            }
            for hook in [&state.on_enter, &state.on_entered].into_iter().flatten() {
                handle = handle.on_enter_shared(self.resolve_action(hook)?);
            }
            if let Some(hook) = &state.on_exit {
                let _ = handle.on_exit_shared(self.resolve_action(hook)?);
            }

            if let Some(reference) = &state.sub_chart_reference {
                if visiting.iter().any(|name| name == reference) {
                    return Err(ConfigError::CircularSubChart {
                        name: reference.clone(),
                    });
                }
                let sub_settings =
                    index
                        .get(reference.as_str())
                        .copied()
                        .ok_or_else(|| ConfigError::UnknownSubChart {
                            name: reference.clone(),
                        })?;
                visiting.push(reference.clone());
                let sub = self.build(sub_settings, index, visiting)?;
                visiting.pop();
                *chart.state(&state.name).chart() = sub;
            }

            for transition in &state.transitions {
                let mut edge = chart
                    .transition(&state.name, &transition.target)
                    .command(&transition.event);
                if let Some(condition) = &transition.condition {
                    edge = edge.condition_with(Guard::from_expr(self.expr(condition)));
                }
                if let Some(action) = &transition.action {
                    let _ = edge.action_shared(self.resolve_action(action)?);
                }
            }
        }

        Ok(chart)
    }

    fn expr(&self, source: &str) -> CompiledExpr {
        CompiledExpr::new(Arc::clone(&self.engine), source).with_sink(Arc::clone(&self.sink))
    }

    fn resolve_action(&self, text: &str) -> Result<Arc<dyn ActionEvaluator<E>>, ConfigError> {
        if let Some(name) = text.strip_prefix('@') {
            self.actions
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingCallback {
                    name: name.to_string(),
                })
        } else {
            Ok(Arc::new(
                CompiledAction::new(Arc::clone(&self.engine), text)
                    .with_sink(Arc::clone(&self.sink)),
            ))
        }
    }
}

impl<E: Entity> Default for Materializer<E> {
    fn default() -> Self {
        Self::new()
    }
}
