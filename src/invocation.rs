use serde_json::{Map, Value};
use crate::error::{Error, Result};

/// Prefix marking options-record fields that are internal to the CLI shell.
pub const INTERNAL_PREFIX: char = '_';

/// Options-record field holding the back-reference to the owning command.
pub const PARENT_FIELD: &str = "parent";

/// A logical command name and the arguments it was called with.
///
/// The last argument is always the options record (a JSON object); every
/// argument before it is positional.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    name: String,
    args: Vec<Value>,
}

impl CommandInvocation {
    /// # Errors
    ///
    /// [`Error::Config`] if `args` is empty or its last element is not an object.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Result<Self> {
        let name = name.into();
        match args.last() {
            None => Err(Error::Config(format!("command '{name}' was invoked without arguments"))),
            Some(Value::Object(_)) => Ok(Self { name, args }),
            Some(_) => Err(Error::Config(format!(
                "the last argument of command '{name}' must be an options record"
            ))),
        }
    }

    /// Builds an invocation from positional arguments and an options record.
    pub fn from_parts(name: impl Into<String>, positional: Vec<Value>, options: Map<String, Value>) -> Self {
        let mut args = positional;
        args.push(Value::Object(options));
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every argument, options record last.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn positional(&self) -> &[Value] {
        &self.args[..self.args.len() - 1]
    }

    pub fn options(&self) -> &Map<String, Value> {
        match self.args.last() {
            Some(Value::Object(options)) => options,
            _ => unreachable!("constructors guarantee a trailing options record"),
        }
    }

    /// A copy of the arguments that is safe to hand to another process.
    ///
    /// The options record loses every internal field and the parent
    /// back-reference; positional arguments are kept as is.
    pub fn sanitized(&self) -> Vec<Value> {
        let mut args = self.positional().to_vec();
        args.push(Value::Object(sanitize_options(self.options())));
        args
    }
}

/// Drops internal and back-reference fields from an options record.
pub fn sanitize_options(options: &Map<String, Value>) -> Map<String, Value> {
    options
        .iter()
        .filter(|(key, _)| !key.starts_with(INTERNAL_PREFIX) && key.as_str() != PARENT_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_new_requires_trailing_options() {
        assert!(CommandInvocation::new("init", vec![]).is_err());
        assert!(CommandInvocation::new("init", vec![json!("app")]).is_err());
        assert!(CommandInvocation::new("init", vec![json!("app"), json!({})]).is_ok());
    }

    #[test]
    fn test_positional_excludes_options() {
        let invocation = CommandInvocation::new("init", vec![json!("app"), json!({"force": true})]).unwrap();
        assert_eq!(invocation.positional(), &[json!("app")]);
        assert_eq!(invocation.options().get("force"), Some(&json!(true)));
    }

    #[test]
    fn test_sanitized_drops_internal_and_parent_fields() {
        let invocation = CommandInvocation::from_parts(
            "init",
            vec![json!("app")],
            options(json!({
                "force": true,
                "_name": "init",
                "_events": {},
                "parent": {"targetPath": "/dev/pkg", "debug": true},
                "template": {"name": "react", "tags": ["project"]},
            })),
        );
        let sanitized = invocation.sanitized();
        let record = sanitized.last().unwrap().as_object().unwrap();
        assert!(!record.contains_key("_name"));
        assert!(!record.contains_key("_events"));
        assert!(!record.contains_key("parent"));
        assert_eq!(record.len(), 2);
        assert_eq!(sanitized[0], json!("app"));
    }

    #[test]
    fn test_sanitized_survives_serialization() {
        let invocation = CommandInvocation::from_parts(
            "init",
            vec![json!("app"), Value::Null],
            options(json!({"force": false, "depth": 3, "nested": {"_kept": 1}, "_private": 1})),
        );
        let encoded = serde_json::to_string(&invocation.sanitized()).unwrap();
        let decoded: Vec<Value> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, invocation.sanitized());
        // only top-level record fields are filtered
        assert_eq!(decoded[2]["nested"]["_kept"], json!(1));
        assert!(decoded[2].get("_private").is_none());
    }
}
