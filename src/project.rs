//! Fallback to the connection's default project id.
//!
//! Operations that need a project id take their parameters either as a typed
//! struct implementing [`ProjectScoped`], or as [`CallArgs`] when invoked from
//! untyped task definitions. In both cases a missing project id is filled from
//! the connection, and the call fails when neither side provides one.

use serde_json::{Map, Value};

use crate::error::{HookError, Result};

/// Keyword under which dynamic calls pass the project id.
pub const PROJECT_ID_KEY: &str = "project_id";

/// Parameters of an operation scoped to a project.
pub trait ProjectScoped {
    /// Slot holding the explicitly requested project id.
    fn project_id_mut(&mut self) -> &mut Option<String>;
}

/// Fill `params`' project id from `default_project` when absent, then run `op`.
pub fn fallback_to_default_project_id<P, T, F>(
    default_project: Option<&str>,
    mut params: P,
    op: F,
) -> Result<T>
where
    P: ProjectScoped,
    F: FnOnce(P) -> Result<T>,
{
    let slot = params.project_id_mut();
    let explicit = slot.take().filter(|p| !p.is_empty());
    let resolved = explicit
        .or_else(|| default_project.filter(|p| !p.is_empty()).map(str::to_string))
        .ok_or(HookError::MissingProjectId)?;
    *slot = Some(resolved);
    op(params)
}

/// Arguments of an operation invoked from an untyped call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keywords: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &Map<String, Value> {
        &self.keywords
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }

    /// The `project_id` keyword, if it is a string.
    pub fn project_id(&self) -> Option<&str> {
        self.keywords.get(PROJECT_ID_KEY).and_then(Value::as_str)
    }
}

/// Dynamic-argument form of [`fallback_to_default_project_id`].
///
/// Positional arguments are rejected so a project id can never be mistaken
/// for another parameter.
pub fn fallback_to_default_project_id_args<T, F>(
    default_project: Option<&str>,
    mut args: CallArgs,
    op: F,
) -> Result<T>
where
    F: FnOnce(CallArgs) -> Result<T>,
{
    if !args.positional.is_empty() {
        return Err(HookError::PositionalArgumentRejected);
    }
    let explicit = match args.keywords.get(PROJECT_ID_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(HookError::InvalidArgument(format!(
                "{PROJECT_ID_KEY} must be a string, got {other}"
            )));
        }
    };
    let resolved = explicit
        .or_else(|| default_project.filter(|p| !p.is_empty()).map(str::to_string))
        .ok_or(HookError::MissingProjectId)?;
    args.keywords
        .insert(PROJECT_ID_KEY.to_string(), Value::String(resolved));
    op(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct ListBuckets {
        project_id: Option<String>,
        prefix: Option<String>,
    }

    impl ProjectScoped for ListBuckets {
        fn project_id_mut(&mut self) -> &mut Option<String> {
            &mut self.project_id
        }
    }

    fn run(default: Option<&str>, params: ListBuckets) -> Result<(String, Option<String>)> {
        fallback_to_default_project_id(default, params, |p| {
            Ok((p.project_id.unwrap(), p.prefix))
        })
    }

    #[test]
    fn explicit_project_wins() {
        let params = ListBuckets {
            project_id: Some("explicit".into()),
            prefix: Some("logs/".into()),
        };
        let (project, prefix) = run(Some("default"), params).unwrap();
        assert_eq!(project, "explicit");
        assert_eq!(prefix.as_deref(), Some("logs/"));
    }

    #[test]
    fn absent_or_empty_project_falls_back() {
        assert_eq!(run(Some("default"), ListBuckets::default()).unwrap().0, "default");
        let params = ListBuckets {
            project_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(run(Some("default"), params).unwrap().0, "default");
    }

    #[test]
    fn missing_everywhere_fails_without_running() {
        let mut ran = false;
        let err = fallback_to_default_project_id(None, ListBuckets::default(), |_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, HookError::MissingProjectId));
        assert!(!ran);
    }

    #[test]
    fn dynamic_args_reject_positional() {
        let args = CallArgs::new().arg("my-project");
        let err = fallback_to_default_project_id_args(Some("default"), args, |_| Ok(())).unwrap_err();
        assert!(matches!(err, HookError::PositionalArgumentRejected));
    }

    #[test]
    fn dynamic_args_fill_missing_or_null_project() {
        let seen = fallback_to_default_project_id_args(
            Some("default"),
            CallArgs::new().kwarg("bucket", "b1"),
            |a| Ok(a.project_id().map(str::to_string)),
        )
        .unwrap();
        assert_eq!(seen.as_deref(), Some("default"));

        let seen = fallback_to_default_project_id_args(
            Some("default"),
            CallArgs::new().kwarg(PROJECT_ID_KEY, Value::Null),
            |a| Ok(a.project_id().map(str::to_string)),
        )
        .unwrap();
        assert_eq!(seen.as_deref(), Some("default"));
    }

    #[test]
    fn dynamic_args_keep_explicit_project_and_other_keywords() {
        let args = fallback_to_default_project_id_args(
            Some("default"),
            CallArgs::new()
                .kwarg(PROJECT_ID_KEY, "explicit")
                .kwarg("bucket", "b1"),
            Ok,
        )
        .unwrap();
        assert_eq!(args.project_id(), Some("explicit"));
        assert_eq!(args.get("bucket"), Some(&Value::from("b1")));
    }

    #[test]
    fn dynamic_args_missing_everywhere() {
        let err = fallback_to_default_project_id_args(None, CallArgs::new(), |_| Ok(())).unwrap_err();
        assert!(matches!(err, HookError::MissingProjectId));
    }

    #[test]
    fn dynamic_args_reject_non_string_project() {
        let err = fallback_to_default_project_id_args(
            Some("default"),
            CallArgs::new().kwarg(PROJECT_ID_KEY, 42),
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err, HookError::InvalidArgument(_)));
    }
}
