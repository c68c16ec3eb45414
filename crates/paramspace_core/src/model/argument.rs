//! Typed measure arguments
//!
//! An [`Argument`] is a declaration (name, type, required, choices, default)
//! plus an optional current value. Values are an explicit tagged union with a
//! canonical string rendering per tag.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ids::{ObjectId, VersionId};
use crate::error::ArgumentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentType {
    Boolean,
    Double,
    Quantity,
    Integer,
    String,
    Choice,
    Path,
}

/// A number with units, rendered as `"<value> <units>"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub units: String,
}

impl Quantity {
    pub fn new(value: f64, units: impl Into<String>) -> Self {
        Self {
            value,
            units: units.into(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.units)
        }
    }
}

impl FromStr for Quantity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let value = parts.next().ok_or(())?.parse::<f64>().map_err(|_| ())?;
        let units = parts.collect::<Vec<_>>().join(" ");
        Ok(Self { value, units })
    }
}

/// Current or default value of an argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgumentValue {
    Bool(bool),
    Double(f64),
    Quantity(Quantity),
    Integer(i64),
    String(String),
    /// Index into the owning argument's choice list
    Choice(usize),
    Path(PathBuf),
}

impl ArgumentValue {
    pub fn argument_type(&self) -> ArgumentType {
        match self {
            ArgumentValue::Bool(_) => ArgumentType::Boolean,
            ArgumentValue::Double(_) => ArgumentType::Double,
            ArgumentValue::Quantity(_) => ArgumentType::Quantity,
            ArgumentValue::Integer(_) => ArgumentType::Integer,
            ArgumentValue::String(_) => ArgumentType::String,
            ArgumentValue::Choice(_) => ArgumentType::Choice,
            ArgumentValue::Path(_) => ArgumentType::Path,
        }
    }
}

/// A typed, versioned argument of a measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    id: ObjectId,
    version: VersionId,
    name: String,
    display_name: String,
    argument_type: ArgumentType,
    required: bool,
    #[serde(default)]
    value: Option<ArgumentValue>,
    #[serde(default)]
    default_value: Option<ArgumentValue>,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    choice_display_names: Vec<String>,
}

impl Argument {
    fn declare(name: impl Into<String>, argument_type: ArgumentType) -> Self {
        let name = name.into();
        Self {
            id: ObjectId::new(),
            version: VersionId::new(),
            display_name: name.clone(),
            name,
            argument_type,
            required: true,
            value: None,
            default_value: None,
            choices: Vec::new(),
            choice_display_names: Vec::new(),
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::declare(name, ArgumentType::Boolean)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::declare(name, ArgumentType::Double)
    }

    pub fn quantity(name: impl Into<String>) -> Self {
        Self::declare(name, ArgumentType::Quantity)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::declare(name, ArgumentType::Integer)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::declare(name, ArgumentType::String)
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::declare(name, ArgumentType::Path)
    }

    /// Choice argument. Display names are optional and matched by position.
    pub fn choice(name: impl Into<String>, choices: Vec<String>, display_names: Vec<String>) -> Self {
        let mut arg = Self::declare(name, ArgumentType::Choice);
        arg.choices = choices;
        arg.choice_display_names = display_names;
        arg
    }

    /// Mark this argument as optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Attach a default value. Silently ignored if the type does not fit.
    #[must_use]
    pub fn with_default(mut self, value: ArgumentValue) -> Self {
        if let Ok(value) = self.coerce(value) {
            self.default_value = Some(value);
        }
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Copy with a fresh identity
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: ObjectId::new(),
            version: VersionId::new(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn version(&self) -> VersionId {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn argument_type(&self) -> ArgumentType {
        self.argument_type
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn choice_display_names(&self) -> &[String] {
        &self.choice_display_names
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&ArgumentValue> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&ArgumentValue> {
        self.default_value.as_ref()
    }

    /// True unless the argument is required and has neither value nor default
    pub fn is_complete(&self) -> bool {
        !self.required || self.value.is_some() || self.default_value.is_some()
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
        self.version = VersionId::new();
    }

    /// Set the value. Integers are accepted by double arguments.
    pub fn set_value(&mut self, value: ArgumentValue) -> Result<(), ArgumentError> {
        let value = self.coerce(value)?;
        self.value = Some(value);
        self.version = VersionId::new();
        Ok(())
    }

    /// Parse and set the value from its string form. Choice arguments accept
    /// either a choice value or a choice display name.
    pub fn set_value_from_str(&mut self, text: &str) -> Result<(), ArgumentError> {
        let value = self.parse(text)?;
        self.value = Some(value);
        self.version = VersionId::new();
        Ok(())
    }

    pub fn clear_value(&mut self) {
        if self.value.take().is_some() {
            self.version = VersionId::new();
        }
    }

    /// Canonical rendering of the current value, falling back to the
    /// default when `print_default` is set. Empty if neither exists.
    pub fn print_value(&self, print_default: bool) -> String {
        let to_print = match (&self.value, print_default) {
            (Some(value), _) => Some(value),
            (None, true) => self.default_value.as_ref(),
            (None, false) => None,
        };
        to_print.map(|v| self.render(v)).unwrap_or_default()
    }

    pub fn print_default_value(&self) -> String {
        self.default_value
            .as_ref()
            .map(|v| self.render(v))
            .unwrap_or_default()
    }

    /// The current value rendered as a string
    pub fn value_as_string(&self) -> Result<String, ArgumentError> {
        self.value
            .as_ref()
            .map(|v| self.render(v))
            .ok_or_else(|| ArgumentError::NoValue(self.name.clone()))
    }

    fn render(&self, value: &ArgumentValue) -> String {
        match value {
            ArgumentValue::Bool(b) => b.to_string(),
            ArgumentValue::Double(d) => d.to_string(),
            ArgumentValue::Quantity(q) => q.to_string(),
            ArgumentValue::Integer(i) => i.to_string(),
            ArgumentValue::String(s) => s.clone(),
            ArgumentValue::Choice(index) => self.choices.get(*index).cloned().unwrap_or_default(),
            ArgumentValue::Path(p) => p.display().to_string(),
        }
    }

    fn coerce(&self, value: ArgumentValue) -> Result<ArgumentValue, ArgumentError> {
        match (self.argument_type, value) {
            (ArgumentType::Double, ArgumentValue::Integer(i)) => Ok(ArgumentValue::Double(i as f64)),
            (ArgumentType::Choice, ArgumentValue::Choice(index)) => {
                if index < self.choices.len() {
                    Ok(ArgumentValue::Choice(index))
                } else {
                    Err(ArgumentError::InvalidValue {
                        name: self.name.clone(),
                        value: index.to_string(),
                    })
                }
            }
            (expected, value) if value.argument_type() == expected => Ok(value),
            (expected, value) => Err(ArgumentError::TypeMismatch {
                name: self.name.clone(),
                expected,
                found: value.argument_type(),
            }),
        }
    }

    fn parse(&self, text: &str) -> Result<ArgumentValue, ArgumentError> {
        let invalid = || ArgumentError::InvalidValue {
            name: self.name.clone(),
            value: text.to_string(),
        };
        match self.argument_type {
            ArgumentType::Boolean => match text {
                "true" => Ok(ArgumentValue::Bool(true)),
                "false" => Ok(ArgumentValue::Bool(false)),
                _ => Err(invalid()),
            },
            ArgumentType::Double => text
                .trim()
                .parse::<f64>()
                .map(ArgumentValue::Double)
                .map_err(|_| invalid()),
            ArgumentType::Quantity => text
                .parse::<Quantity>()
                .map(ArgumentValue::Quantity)
                .map_err(|_| invalid()),
            ArgumentType::Integer => text
                .trim()
                .parse::<i64>()
                .map(ArgumentValue::Integer)
                .map_err(|_| invalid()),
            ArgumentType::String => Ok(ArgumentValue::String(text.to_string())),
            ArgumentType::Choice => self
                .choices
                .iter()
                .position(|c| c == text)
                .or_else(|| {
                    self.choice_display_names
                        .iter()
                        .position(|d| d == text)
                        .filter(|&i| i < self.choices.len())
                })
                .map(ArgumentValue::Choice)
                .ok_or_else(invalid),
            ArgumentType::Path if text.is_empty() => Err(invalid()),
            ArgumentType::Path => Ok(ArgumentValue::Path(PathBuf::from(text))),
        }
    }

    /// Whether `other` declares the same argument (ignoring identity and
    /// current value)
    pub fn same_declaration(&self, other: &Argument) -> bool {
        self.name == other.name
            && self.display_name == other.display_name
            && self.argument_type == other.argument_type
            && self.required == other.required
            && self.default_value == other.default_value
            && self.choices == other.choices
            && self.choice_display_names == other.choice_display_names
    }

    /// This argument's value re-expressed under a revised declaration, if it
    /// still fits. Choices are carried by their choice string.
    pub fn value_for(&self, declaration: &Argument) -> Option<ArgumentValue> {
        let value = self.value.as_ref()?;
        if declaration.argument_type != self.argument_type {
            return None;
        }
        match value {
            ArgumentValue::Choice(index) => {
                let choice = self.choices.get(*index)?;
                declaration
                    .choices
                    .iter()
                    .position(|c| c == choice)
                    .map(ArgumentValue::Choice)
            }
            other => Some(other.clone()),
        }
    }

    /// Reconcile with a revised declaration of the same name. Identity is
    /// kept; the version changes only if the declaration did.
    pub(crate) fn revised_by(&self, declaration: &Argument) -> Argument {
        if self.same_declaration(declaration) {
            return self.clone();
        }
        Argument {
            id: self.id,
            version: VersionId::new(),
            value: self.value_for(declaration),
            ..declaration.clone()
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.display_name.is_empty() && self.display_name != self.name {
            write!(f, " ({})", self.display_name)?;
        }
        let requirement = if self.required { "Required" } else { "Optional" };
        writeln!(f)?;
        writeln!(f, "{:?}, {requirement}", self.argument_type)?;
        write!(f, "Value: ")?;
        if self.has_value() {
            write!(f, "{} ", self.print_value(false))?;
        }
        if self.default_value.is_some() {
            write!(f, "({})", self.print_default_value())?;
        }
        writeln!(f)?;
        if self.argument_type == ArgumentType::Choice {
            writeln!(f, "Choices:")?;
            for (i, choice) in self.choices.iter().enumerate() {
                write!(f, "  {choice}")?;
                if let Some(display) = self.choice_display_names.get(i).filter(|d| !d.is_empty()) {
                    write!(f, " ({display})")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_accepts_integer() {
        let mut arg = Argument::double("wwr");
        arg.set_value(ArgumentValue::Integer(2)).unwrap();
        assert_eq!(arg.value(), Some(&ArgumentValue::Double(2.0)));
        assert_eq!(arg.print_value(false), "2");
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut arg = Argument::integer("numPeople");
        let err = arg
            .set_value(ArgumentValue::String("many".into()))
            .unwrap_err();
        assert!(matches!(err, ArgumentError::TypeMismatch { .. }));
        assert!(!arg.has_value());
    }

    #[test]
    fn test_boolean_parsing_is_strict() {
        let mut arg = Argument::boolean("flag");
        assert!(arg.set_value_from_str("yes").is_err());
        arg.set_value_from_str("true").unwrap();
        assert_eq!(arg.value_as_string().unwrap(), "true");
    }

    #[test]
    fn test_choice_by_value_or_display_name() {
        let mut arg = Argument::choice(
            "facade",
            vec!["N".into(), "S".into()],
            vec!["North".into(), "South".into()],
        );
        arg.set_value_from_str("S").unwrap();
        assert_eq!(arg.value(), Some(&ArgumentValue::Choice(1)));
        arg.set_value_from_str("North").unwrap();
        assert_eq!(arg.print_value(false), "N");
        assert!(arg.set_value_from_str("East").is_err());
        assert!(arg.set_value(ArgumentValue::Choice(5)).is_err());
    }

    #[test]
    fn test_quantity_rendering() {
        let mut arg = Argument::quantity("height");
        arg.set_value_from_str("1.5 m").unwrap();
        assert_eq!(arg.print_value(false), "1.5 m");
        assert!(arg.set_value_from_str("tall").is_err());
    }

    #[test]
    fn test_print_default() {
        let arg = Argument::double("sillHeight").with_default(ArgumentValue::Double(0.75));
        assert_eq!(arg.print_value(false), "");
        assert_eq!(arg.print_value(true), "0.75");
        assert!(arg.is_complete());
        assert!(arg.value_as_string().is_err());
    }

    #[test]
    fn test_completeness() {
        assert!(!Argument::double("wwr").is_complete());
        assert!(Argument::double("wwr").optional().is_complete());
    }

    #[test]
    fn test_value_carries_across_compatible_declaration() {
        let mut old = Argument::choice("facade", vec!["N".into(), "S".into()], vec![]);
        old.set_value(ArgumentValue::Choice(1)).unwrap();
        let revised = Argument::choice("facade", vec!["S".into(), "E".into()], vec![]);
        assert_eq!(old.value_for(&revised), Some(ArgumentValue::Choice(0)));

        let dropped = Argument::choice("facade", vec!["E".into()], vec![]);
        assert_eq!(old.value_for(&dropped), None);

        let mut wwr = Argument::double("wwr");
        wwr.set_value(ArgumentValue::Double(0.32)).unwrap();
        assert_eq!(wwr.value_for(&Argument::integer("wwr")), None);
        assert_eq!(
            wwr.value_for(&Argument::double("wwr")),
            Some(ArgumentValue::Double(0.32))
        );
    }

    #[test]
    fn test_set_value_bumps_version() {
        let mut arg = Argument::integer("numPeople");
        let before = arg.version();
        arg.set_value(ArgumentValue::Integer(100)).unwrap();
        assert_ne!(arg.version(), before);
        assert_eq!(arg.id(), arg.clone().id());
        assert_ne!(arg.duplicate().id(), arg.id());
    }
}
