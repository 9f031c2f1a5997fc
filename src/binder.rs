use crate::error::MarkupError;
use crate::location::Location;
use crate::macros::{
    BoundArguments, MacroContext, MacroDescriptor, MacroLibrary, MacroMethod, ParamSpec, Value,
    ValueKind,
};
use crate::token::{CallArguments, MacroRef};
use std::collections::BTreeMap;
use tracing::debug;

/// Binds the literal call-site arguments to `method`'s parameters and runs it.
///
/// Positional arguments fill the declared parameters in order, skipping
/// context parameters, which are filled with `context` instead. Keyword
/// arguments fill parameters by name and unsupplied parameters fall back to
/// their default. Every value goes through its parameter's conversion.
///
/// A markup error raised by a conversion is re-based onto the line of the
/// call. A markup error raised by the handler is reported at the call site;
/// anything else the handler fails with is wrapped as `ErrorInMacroCall`.
pub fn bind_and_call<T>(
    method: &MacroMethod<T>,
    args: &CallArguments,
    context: &MacroContext,
) -> Result<T, MarkupError> {
    let bound = bind(method, args, context)?;

    (method.handler)(&bound).map_err(|error| match error.downcast::<MarkupError>() {
        Ok(mut markup_error) => {
            markup_error.set_location(context.location.clone());
            markup_error
        }
        Err(other) => MarkupError::ErrorInMacroCall {
            macro_name: context.macro_name.clone(),
            message: other.to_string(),
            location: context.location.clone(),
            source: Some(other.into()),
        },
    })
}

fn bind<T>(
    method: &MacroMethod<T>,
    args: &CallArguments,
    context: &MacroContext,
) -> Result<BoundArguments, MarkupError> {
    let fail = |message: String| {
        MarkupError::in_macro_call(&context.macro_name, message, context.location.clone())
    };

    let from_call_site: Vec<&ParamSpec> = method
        .params
        .iter()
        .filter(|param| param.kind != ValueKind::Context)
        .collect();

    let mut raw: BTreeMap<&str, &str> = BTreeMap::new();
    let mut extra = CallArguments::default();

    for (index, value) in args.positional.iter().enumerate() {
        match from_call_site.get(index) {
            Some(param) => {
                raw.insert(&param.name, value);
            }
            None if method.accepts_extra => extra.positional.push(value.clone()),
            None => {
                return Err(fail(format!(
                    "takes at most {} positional arguments but {} were given",
                    from_call_site.len(),
                    args.positional.len()
                )))
            }
        }
    }

    for (keyword, value) in &args.keyword {
        match from_call_site.iter().find(|param| &param.name == keyword) {
            Some(param) => {
                if raw.insert(&param.name, value).is_some() {
                    return Err(fail(format!("got multiple values for “{keyword}”")));
                }
            }
            None if method.accepts_extra => {
                extra.keyword.insert(keyword.clone(), value.clone());
            }
            None => return Err(fail(format!("unexpected keyword argument “{keyword}”"))),
        }
    }

    let mut values = BTreeMap::new();
    for param in &method.params {
        let value = match (param.kind, raw.get(param.name.as_str())) {
            (ValueKind::Context, _) => convert(param, "", context)?,
            (_, Some(raw)) => convert(param, raw, context)?,
            (_, None) => match &param.default {
                Some(default) => default.clone(),
                None => return Err(fail(format!("missing required argument “{}”", param.name))),
            },
        };
        values.insert(param.name.clone(), value);
    }

    Ok(BoundArguments { values, extra })
}

fn convert(param: &ParamSpec, raw: &str, context: &MacroContext) -> Result<Value, MarkupError> {
    (param.convert)(raw, context).map_err(|error| match error.downcast::<MarkupError>() {
        Ok(markup_error) => markup_error.shift_lines(context.location.line),
        Err(other) => MarkupError::ErrorInMacroCall {
            macro_name: context.macro_name.clone(),
            message: format!("cannot convert “{}”: {other}", param.name),
            location: context.location.clone(),
            source: Some(other.into()),
        },
    })
}

/// Resolves a macro prefix found on a table cell, caption, blockquote or
/// start tag. Without a prefix the result is `(None, empty arguments)`.
pub fn get_macro_for<'l>(
    library: &'l MacroLibrary,
    prefix: Option<&MacroRef>,
    location: &Location,
) -> Result<(Option<&'l MacroDescriptor>, CallArguments), MarkupError> {
    match prefix {
        None => Ok((None, CallArguments::default())),
        Some(prefix) => {
            let descriptor = library.get(&prefix.name, location)?;
            debug!(name = %prefix.name, line = location.line, "resolved macro prefix");
            Ok((Some(descriptor), prefix.args.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::Environment;
    use anyhow::bail;

    fn context() -> MacroContext {
        MacroContext {
            macro_name: "m".to_string(),
            environment: Environment::Block,
            location: Location::new(10, "<<m ...>>"),
        }
    }

    fn call(positional: &[&str], keyword: &[(&str, &str)]) -> CallArguments {
        CallArguments {
            positional: positional.iter().map(|s| s.to_string()).collect(),
            keyword: keyword
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn echo() -> MacroMethod<BoundArguments> {
        MacroMethod::new(
            vec![
                ParamSpec::string("letter"),
                ParamSpec::context("context"),
                ParamSpec::float("length"),
                ParamSpec::string("filename").with_default(Value::Str("none".to_string())),
                ParamSpec::string("color").with_default(Value::Str("default".to_string())),
            ],
            |bound| Ok(bound.clone()),
        )
    }

    #[test]
    fn maps_positional_keyword_and_default_values() {
        let bound = bind_and_call(
            &echo(),
            &call(&["a", "1.2"], &[("filename", "test.jpg")]),
            &context(),
        )
        .unwrap();

        assert_eq!(bound.str("letter").unwrap(), "a");
        assert_eq!(bound.float("length").unwrap(), 1.2);
        assert_eq!(bound.str("filename").unwrap(), "test.jpg");
        assert_eq!(bound.str("color").unwrap(), "default");
        assert_eq!(bound.context().map(|c| c.location.line), Some(10));
    }

    #[test]
    fn too_many_positionals() {
        let error = bind_and_call(&echo(), &call(&["a", "1", "b", "c", "d"], &[]), &context())
            .unwrap_err();
        assert!(matches!(error, MarkupError::ErrorInMacroCall { .. }));
    }

    #[test]
    fn value_given_twice() {
        let error = bind_and_call(&echo(), &call(&["a", "1"], &[("letter", "b")]), &context())
            .unwrap_err();
        assert!(error.to_string().contains("multiple values"));
    }

    #[test]
    fn missing_required_and_unknown_keyword() {
        assert!(bind_and_call(&echo(), &call(&["a"], &[]), &context()).is_err());
        assert!(bind_and_call(&echo(), &call(&["a", "1"], &[("size", "3")]), &context()).is_err());
    }

    #[test]
    fn extras_are_collected_when_accepted() {
        let method = MacroMethod::new(vec![ParamSpec::string("first")], |bound| {
            Ok(bound.extra.clone())
        })
        .accepting_extra();
        let extra = bind_and_call(&method, &call(&["a", "b"], &[("x", "1")]), &context()).unwrap();
        assert_eq!(extra.positional, vec!["b"]);
        assert_eq!(extra.keyword.get("x").map(String::as_str), Some("1"));
    }

    #[test]
    fn bad_number_is_an_error_in_macro_call() {
        let error = bind_and_call(&echo(), &call(&["a", "long"], &[]), &context()).unwrap_err();
        match error {
            MarkupError::ErrorInMacroCall { location, source, .. } => {
                assert_eq!(location.line, 10);
                assert!(source.is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn markup_errors_from_conversions_are_shifted_to_the_call_line() {
        fn failing(_raw: &str, _context: &MacroContext) -> anyhow::Result<Value> {
            Err(MarkupError::parse("unclosed ''", Location::new(3, "")).into())
        }
        let method = MacroMethod::new(
            vec![ParamSpec::markup("contents").with_conversion(failing)],
            |_| Ok(()),
        );
        let error = bind_and_call(&method, &call(&["x"], &[]), &context()).unwrap_err();
        assert!(matches!(error, MarkupError::Parse { .. }));
        assert_eq!(error.location().map(|l| l.line), Some(12));
    }

    #[test]
    fn handler_failures() {
        let foreign = MacroMethod::new(vec![], |_| -> anyhow::Result<()> { bail!("disk full") });
        let error = bind_and_call(&foreign, &CallArguments::default(), &context()).unwrap_err();
        assert!(matches!(error, MarkupError::ErrorInMacroCall { ref message, .. } if message == "disk full"));

        let markup = MacroMethod::new(vec![], |_| -> anyhow::Result<()> {
            Err(MarkupError::unsuitable("inline only", Location::new(1, "")).into())
        });
        let error = bind_and_call(&markup, &CallArguments::default(), &context()).unwrap_err();
        assert!(matches!(error, MarkupError::UnsuitableMacro { .. }));
        assert_eq!(error.location().map(|l| l.line), Some(10));
    }

    #[test]
    fn get_macro_for_without_prefix() {
        let library = MacroLibrary::new();
        let (descriptor, args) = get_macro_for(&library, None, &Location::new(1, "")).unwrap();
        assert!(descriptor.is_none());
        assert!(args.is_empty());
    }

    #[test]
    fn get_macro_for_unknown_prefix() {
        let library = MacroLibrary::new();
        let prefix = MacroRef {
            name: "dark".to_string(),
            args: CallArguments::default(),
        };
        let error = get_macro_for(&library, Some(&prefix), &Location::new(2, "")).unwrap_err();
        assert!(matches!(error, MarkupError::UnknownMacro { .. }));
    }
}
