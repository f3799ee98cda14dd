//! Script configuration derived from front matter.

use std::fmt::{self, Display, Formatter};

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::error::ParseError;
use crate::pipeline::{PatternActionFunc, Pipeline};
use crate::postprocess::PostProcessor;
use crate::script::{
    CONDITION_KEY, Condition, ConditionCase, Expr, Expression, FrontMatter, FrontMatterValue, FuncCall,
    PatternAction,
};

/// Generates a closed enum of names with a default and lookup by name.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident default $default:ident { $($variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &[$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.name() == name)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_enum! {
    /// Where the model's response goes.
    pub enum InteractionType default RunPanel {
        ChatPanel,
        AppendCursor,
        AppendCursorStream,
        OutputFile,
        ReplaceSelection,
        ReplaceCurrentFile,
        InsertBeforeSelection,
        RunPanel,
        RightPanel,
    }
}

named_enum! {
    /// Where the script is offered to the user.
    pub enum ActionLocation default RunPanel {
        ContextMenu,
        IntentionMenu,
        TerminalMenu,
        CommitMenu,
        RunPanel,
        InputBox,
        DatabaseMenu,
        ConsoleMenu,
        VcsLog,
        ChatBox,
        InlineChat,
        SearchMenu,
    }
}

/// A variable declared under `variables:`.
#[derive(Debug, Clone, PartialEq)]
pub enum UserVariable {
    Literal(String),
    Pipeline(Pipeline),
}

impl Serialize for UserVariable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            UserVariable::Literal(text) => serializer.serialize_str(text),
            UserVariable::Pipeline(pipeline) => serializer.collect_str(pipeline),
        }
    }
}

/// One step of a routed task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStep {
    Process(PostProcessor),
    Func(PatternActionFunc),
}

impl TaskStep {
    /// Post-processor names take precedence; anything else must be a
    /// pattern-action function.
    pub fn from_call(call: &FuncCall, key: &str) -> Result<Self, ParseError> {
        if PostProcessor::NAMES.contains(&call.name.as_str()) {
            PostProcessor::from_call(call, key).map(TaskStep::Process)
        } else {
            PatternActionFunc::from_call(call, key).map(TaskStep::Func)
        }
    }
}

impl Display for TaskStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TaskStep::Process(processor) => write!(f, "{processor}"),
            TaskStep::Func(func) => write!(f, "{func}"),
        }
    }
}

impl Serialize for TaskStep {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub key: String,
    pub task: Vec<TaskStep>,
}

/// Conditional task routing from `condition:` and `case condition { ... }`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskRoutes {
    pub conditions: Vec<Condition>,
    pub routes: Vec<Route>,
    pub default: Option<Vec<TaskStep>>,
}

impl TaskRoutes {
    pub fn from_condition_case(case: &ConditionCase) -> Result<Self, ParseError> {
        let key = "case condition";
        let convert = |calls: &[FuncCall]| {
            calls
                .iter()
                .map(|call| TaskStep::from_call(call, key))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            conditions: case.conditions.clone(),
            routes: case
                .cases
                .iter()
                .map(|c| {
                    Ok(Route {
                        key: c.key.clone(),
                        task: convert(&c.task)?,
                    })
                })
                .collect::<Result<_, ParseError>>()?,
            default: case.default.as_deref().map(convert).transpose()?,
        })
    }

    /// Select the task to run.
    ///
    /// Conditions are tried in declaration order and the first satisfied one
    /// with a route wins. Falls back to the default task; `None` when there is
    /// nothing to run.
    pub fn select(&self, lookup: &mut dyn FnMut(&str) -> String) -> Option<(&str, &[TaskStep])> {
        for condition in &self.conditions {
            let Some(route) = self.routes.iter().find(|r| r.key == condition.key) else {
                continue;
            };
            if condition.expr.is_satisfied(lookup) {
                tracing::debug!(route = %route.key, "task route selected");
                return Some((route.key.as_str(), route.task.as_slice()));
            }
        }
        self.default.as_deref().map(|task| ("default", task))
    }
}

impl Serialize for TaskRoutes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3))?;
        let conditions = self
            .conditions
            .iter()
            .map(|c| (c.key.as_str(), c.expr.to_string()))
            .collect::<Vec<_>>();
        map.serialize_entry("conditions", &Pairs(&conditions))?;
        map.serialize_entry("routes", &self.routes)?;
        map.serialize_entry("default", &self.default)?;
        map.end()
    }
}

/// Serializes key/value pairs as a map, keeping their order.
struct Pairs<'a, V>(&'a [(&'a str, V)]);

impl<V: Serialize> Serialize for Pairs<'_, V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Configuration of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ShireConfig {
    pub name: String,
    pub description: String,
    pub interaction: InteractionType,
    pub action_location: ActionLocation,
    pub enabled: bool,
    pub model: Option<String>,

    /// Gates whether the script applies in the current context.
    pub when: Option<Expr>,

    /// User variables in declaration order.
    pub variables: Vec<(String, UserVariable)>,

    /// Processors run over the response once streaming ends.
    pub on_streaming_end: Vec<PostProcessor>,

    pub routes: Option<TaskRoutes>,
}

impl ShireConfig {
    /// Configuration for a script named `name` without front matter.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            interaction: InteractionType::default(),
            action_location: ActionLocation::default(),
            enabled: true,
            model: None,
            when: None,
            variables: Vec::new(),
            on_streaming_end: Vec::new(),
            routes: None,
        }
    }

    /// Build the configuration from parsed front matter.
    ///
    /// `fallback_name` is used when the front matter doesn't name the script.
    /// Unknown `interaction` and `actionLocation` values fall back to their
    /// defaults with a warning; malformed pipelines and tasks are errors.
    #[tracing::instrument(skip(front_matter))]
    pub fn from_front_matter(front_matter: &FrontMatter, fallback_name: &str) -> Result<Self, ParseError> {
        let mut config = Self::named(fallback_name);

        for (key, value) in front_matter.entries() {
            match key.as_str() {
                "name" => config.name = value.display_text(),
                "description" => config.description = value.display_text(),
                "interaction" => config.interaction = named_or_default(key, value, InteractionType::from_name),
                "actionLocation" => {
                    config.action_location = named_or_default(key, value, ActionLocation::from_name)
                }
                "enabled" => {
                    config.enabled = value.as_bool().unwrap_or_else(|| {
                        tracing::warn!(value = %value, "`enabled` is not a boolean, keeping true");
                        true
                    })
                }
                "model" => config.model = Some(value.display_text()),
                "when" => config.when = Some(condition_of(key, value)?),
                "variables" => config.variables = variables_of(value)?,
                "onStreamingEnd" => config.on_streaming_end = processors_of(key, value)?,
                CONDITION_KEY => config.routes = routes_of(value)?,
                _ => tracing::debug!(key, "ignoring unrecognized front-matter key"),
            }
        }

        Ok(config)
    }

    /// Whether the `when` condition holds; scripts without one always apply.
    pub fn is_applicable(&self, lookup: &mut dyn FnMut(&str) -> String) -> bool {
        self.when.as_ref().is_none_or(|when| when.is_satisfied(lookup))
    }

    pub fn variable(&self, name: &str) -> Option<&UserVariable> {
        self.variables.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Serialize for ShireConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("interaction", &self.interaction)?;
        map.serialize_entry("actionLocation", &self.action_location)?;
        map.serialize_entry("enabled", &self.enabled)?;
        if let Some(model) = &self.model {
            map.serialize_entry("model", model)?;
        }
        if let Some(when) = &self.when {
            map.serialize_entry("when", &when.to_string())?;
        }
        if !self.variables.is_empty() {
            let pairs = self
                .variables
                .iter()
                .map(|(k, v)| (k.as_str(), v))
                .collect::<Vec<_>>();
            map.serialize_entry("variables", &Pairs(&pairs))?;
        }
        if !self.on_streaming_end.is_empty() {
            let names = self.on_streaming_end.iter().map(ToString::to_string).collect::<Vec<_>>();
            map.serialize_entry("onStreamingEnd", &names)?;
        }
        if let Some(routes) = &self.routes {
            map.serialize_entry("routes", routes)?;
        }
        map.end()
    }
}

fn named_or_default<T: Default + Display>(
    key: &str,
    value: &FrontMatterValue,
    from_name: fn(&str) -> Option<T>,
) -> T {
    let text = value.display_text();
    from_name(text.trim()).unwrap_or_else(|| {
        let fallback = T::default();
        tracing::warn!(key, value = %text, %fallback, "unknown value, using default");
        fallback
    })
}

fn condition_of(key: &str, value: &FrontMatterValue) -> Result<Expr, ParseError> {
    match value {
        FrontMatterValue::Expression(Expression::Condition(expr)) => Ok(expr.clone()),
        other => Err(ParseError::InvalidArguments {
            name: key.to_string(),
            message: format!("expected a condition expression, found {}", other.kind()),
        }),
    }
}

fn variables_of(value: &FrontMatterValue) -> Result<Vec<(String, UserVariable)>, ParseError> {
    let Some(entries) = value.as_object() else {
        return Err(ParseError::InvalidArguments {
            name: String::from("variables"),
            message: format!("expected a block of variables, found {}", value.kind()),
        });
    };

    entries
        .iter()
        .map(|(name, value)| {
            let variable = match value {
                FrontMatterValue::Expression(Expression::PatternAction(action)) => {
                    UserVariable::Pipeline(Pipeline::from_action(action, name)?)
                }
                other => UserVariable::Literal(other.display_text()),
            };
            Ok((name.clone(), variable))
        })
        .collect()
}

fn processors_of(key: &str, value: &FrontMatterValue) -> Result<Vec<PostProcessor>, ParseError> {
    let calls = match value {
        FrontMatterValue::Expression(Expression::PatternAction(PatternAction {
            pattern: None,
            pipeline,
        })) => pipeline.clone(),
        FrontMatterValue::String(name) => vec![FuncCall {
            name: name.clone(),
            args: Vec::new(),
        }],
        FrontMatterValue::Array(items) => items
            .iter()
            .map(|item| FuncCall {
                name: item.display_text(),
                args: Vec::new(),
            })
            .collect(),
        other => {
            return Err(ParseError::InvalidArguments {
                name: key.to_string(),
                message: format!("expected `{{ processor | ... }}`, found {}", other.kind()),
            });
        }
    };
    calls.iter().map(|call| PostProcessor::from_call(call, key)).collect()
}

fn routes_of(value: &FrontMatterValue) -> Result<Option<TaskRoutes>, ParseError> {
    match value {
        FrontMatterValue::Expression(Expression::ConditionCase(case)) => {
            TaskRoutes::from_condition_case(case).map(Some)
        }
        FrontMatterValue::Array(items) => items
            .iter()
            .find_map(|item| match item {
                FrontMatterValue::Expression(Expression::ConditionCase(case)) => Some(case),
                _ => None,
            })
            .map(TaskRoutes::from_condition_case)
            .transpose(),
        other => {
            tracing::warn!(kind = other.kind(), "`condition` without `case condition`, ignoring");
            Ok(None)
        }
    }
}
