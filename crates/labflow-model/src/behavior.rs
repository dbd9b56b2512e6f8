use crate::{Activity, ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "input",
            Self::Out => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A formal parameter of a behavior.
///
/// Multiplicity defaults to exactly one. `upper == None` means unbounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value_type: String,
    pub direction: Direction,
    pub lower: u32,
    pub upper: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        value_type: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            direction,
            lower: 1,
            upper: Some(1),
            default_value: None,
        }
    }

    pub fn input(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self::new(name, value_type, Direction::In)
    }

    pub fn output(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self::new(name, value_type, Direction::Out)
    }

    pub fn optional(mut self) -> Self {
        self.lower = 0;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_bounds(mut self, lower: u32, upper: Option<u32>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn required(&self) -> bool {
        self.lower > 0
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::In
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Out
    }
}

/// Identity, name and ordered parameter list shared by every behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Signature {
    pub fn new(id: impl Into<ObjectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter(&self, name: &str, direction: Direction) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name && parameter.direction == direction)
    }

    pub fn input(&self, name: &str) -> Option<&Parameter> {
        self.parameter(name, Direction::In)
    }

    pub fn output(&self, name: &str) -> Option<&Parameter> {
        self.parameter(name, Direction::Out)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|parameter| parameter.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|parameter| parameter.is_output())
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.inputs().filter(|parameter| parameter.required())
    }

    pub fn required_outputs(&self) -> impl Iterator<Item = &Parameter> {
        self.outputs().filter(|parameter| parameter.required())
    }
}

/// A unit of computation that an action can invoke.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Behavior {
    /// Leaf computation executed by an external collaborator.
    Primitive(Signature),
    Activity(Activity),
}

impl Behavior {
    pub fn primitive(signature: Signature) -> Self {
        Self::Primitive(signature)
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Self::Primitive(signature) => signature,
            Self::Activity(activity) => &activity.signature,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.signature().id
    }

    pub fn name(&self) -> &str {
        &self.signature().name
    }

    pub fn as_activity(&self) -> Option<&Activity> {
        match self {
            Self::Activity(activity) => Some(activity),
            Self::Primitive(_) => None,
        }
    }
}

impl From<Activity> for Behavior {
    fn from(activity: Activity) -> Self {
        Self::Activity(activity)
    }
}
