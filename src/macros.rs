use crate::binder::bind_and_call;
use crate::error::MarkupError;
use crate::location::Location;
use crate::token::CallArguments;
use anyhow::{anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

static EOLS_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n)*").expect("line break pattern is valid"));

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Block,
    Inline,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Environment::Block => write!(f, "block"),
            Environment::Inline => write!(f, "inline"),
        }
    }
}

/// What a declared macro parameter is converted into before the handler
/// sees it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValueKind {
    String,
    Int,
    Float,
    /// Markup to be compiled by the backend, e.g. the contents of a decorator.
    Markup,
    /// Not taken from the call site: receives the `MacroContext`.
    Context,
}

/// Markup handed to a macro as an argument. Keeps the line of the call so
/// errors found while compiling it can be reported against the document.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MarkupSource {
    pub text: String,
    pub line: usize,
}

impl MarkupSource {
    /// Whether the text holds more than one paragraph.
    pub fn has_paragraphs(&self) -> bool {
        EOLS_RUN_RE
            .find_iter(&self.text)
            .any(|run| run.as_str().matches('\n').count() > 1)
    }
}

/// Everything a macro may learn about the call it is serving.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MacroContext {
    pub macro_name: String,
    pub environment: Environment,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Markup(MarkupSource),
    Context(MacroContext),
}

pub type Conversion = fn(&str, &MacroContext) -> anyhow::Result<Value>;

fn to_string_value(raw: &str, _context: &MacroContext) -> anyhow::Result<Value> {
    Ok(Value::Str(raw.to_string()))
}

fn to_int(raw: &str, _context: &MacroContext) -> anyhow::Result<Value> {
    raw.trim()
        .parse()
        .map(Value::Int)
        .map_err(|_| anyhow!("“{raw}” is not an integer"))
}

fn to_float(raw: &str, _context: &MacroContext) -> anyhow::Result<Value> {
    raw.trim()
        .parse()
        .map(Value::Float)
        .map_err(|_| anyhow!("“{raw}” is not a number"))
}

fn to_markup(raw: &str, context: &MacroContext) -> anyhow::Result<Value> {
    Ok(Value::Markup(MarkupSource {
        text: raw.to_string(),
        line: context.location.line,
    }))
}

fn to_context(_raw: &str, context: &MacroContext) -> anyhow::Result<Value> {
    Ok(Value::Context(context.clone()))
}

/// One declared parameter of a macro method.
#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub convert: Conversion,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ValueKind) -> Self {
        let convert: Conversion = match kind {
            ValueKind::String => to_string_value,
            ValueKind::Int => to_int,
            ValueKind::Float => to_float,
            ValueKind::Markup => to_markup,
            ValueKind::Context => to_context,
        };

        Self {
            name: name.to_string(),
            kind,
            default: None,
            convert,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ValueKind::String)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, ValueKind::Int)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, ValueKind::Float)
    }

    pub fn markup(name: &str) -> Self {
        Self::new(name, ValueKind::Markup)
    }

    pub fn context(name: &str) -> Self {
        Self::new(name, ValueKind::Context)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Replaces the conversion derived from the kind.
    pub fn with_conversion(mut self, convert: Conversion) -> Self {
        self.convert = convert;
        self
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .finish()
    }
}

/// Arguments after binding: declared parameters by name, plus whatever the
/// call site passed beyond them when the method accepts extras.
#[derive(Debug, Default, Clone)]
pub struct BoundArguments {
    pub values: BTreeMap<String, Value>,
    pub extra: CallArguments,
}

impl BoundArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        match self.get(name) {
            Some(Value::Str(value)) => Ok(value),
            Some(Value::Markup(source)) => Ok(&source.text),
            other => bail!("parameter “{name}” is not a string: {other:?}"),
        }
    }

    pub fn int(&self, name: &str) -> anyhow::Result<i64> {
        match self.get(name) {
            Some(Value::Int(value)) => Ok(*value),
            other => bail!("parameter “{name}” is not an integer: {other:?}"),
        }
    }

    pub fn float(&self, name: &str) -> anyhow::Result<f64> {
        match self.get(name) {
            Some(Value::Float(value)) => Ok(*value),
            Some(Value::Int(value)) => Ok(*value as f64),
            other => bail!("parameter “{name}” is not a number: {other:?}"),
        }
    }

    pub fn markup(&self, name: &str) -> anyhow::Result<&MarkupSource> {
        match self.get(name) {
            Some(Value::Markup(source)) => Ok(source),
            other => bail!("parameter “{name}” is not markup: {other:?}"),
        }
    }

    pub fn context(&self) -> Option<&MacroContext> {
        self.values.values().find_map(|value| match value {
            Value::Context(context) => Some(context),
            _ => None,
        })
    }
}

pub type Handler<T> = Arc<dyn Fn(&BoundArguments) -> anyhow::Result<T> + Send + Sync>;

/// A parameter schema together with the function it is bound for.
pub struct MacroMethod<T> {
    pub params: Vec<ParamSpec>,
    pub accepts_extra: bool,
    pub handler: Handler<T>,
}

impl<T> MacroMethod<T> {
    pub fn new<F>(params: Vec<ParamSpec>, handler: F) -> Self
    where
        F: Fn(&BoundArguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            params,
            accepts_extra: false,
            handler: Arc::new(handler),
        }
    }

    /// Lets the method take positional and keyword arguments beyond its
    /// declared parameters; they end up in `BoundArguments::extra`.
    pub fn accepting_extra(mut self) -> Self {
        self.accepts_extra = true;
        self
    }
}

impl<T> Clone for MacroMethod<T> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            accepts_extra: self.accepts_extra,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T> fmt::Debug for MacroMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        f.debug_struct("MacroMethod")
            .field("params", &names)
            .field("accepts_extra", &self.accepts_extra)
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub supports_block: bool,
    pub supports_inline: bool,
    pub renders: bool,
    pub has_tag_params: bool,
    pub has_search_indexing: bool,
}

#[derive(Debug, Clone)]
pub struct MacroDescriptor {
    name: String,
    block: bool,
    inline: bool,
    render: Option<MacroMethod<String>>,
    tag_params: Option<MacroMethod<BTreeMap<String, String>>>,
    search_index: Option<MacroMethod<Vec<String>>>,
}

impl MacroDescriptor {
    /// A macro usable in both environments with no methods yet.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            block: true,
            inline: true,
            render: None,
            tag_params: None,
            search_index: None,
        }
    }

    /// Names the macro after a type: `my_crate::macros::Bild` becomes `bild`.
    pub fn for_type<T: ?Sized>() -> Self {
        let path = std::any::type_name::<T>();
        let base = path.split('<').next().unwrap_or(path);
        let name = base.rsplit("::").next().unwrap_or(base);
        Self::new(&name.to_lowercase())
    }

    pub fn with_environments(mut self, environments: &[Environment]) -> Self {
        self.block = environments.contains(&Environment::Block);
        self.inline = environments.contains(&Environment::Inline);
        self
    }

    pub fn with_render(mut self, method: MacroMethod<String>) -> Self {
        self.render = Some(method);
        self
    }

    pub fn with_tag_params(mut self, method: MacroMethod<BTreeMap<String, String>>) -> Self {
        self.tag_params = Some(method);
        self
    }

    pub fn with_search_index(mut self, method: MacroMethod<Vec<String>>) -> Self {
        self.search_index = Some(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports(&self, environment: Environment) -> bool {
        match environment {
            Environment::Block => self.block,
            Environment::Inline => self.inline,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_block: self.block,
            supports_inline: self.inline,
            renders: self.render.is_some(),
            has_tag_params: self.tag_params.is_some(),
            has_search_indexing: self.search_index.is_some(),
        }
    }

    /// The macro's output for a `<<name ...>>` call.
    pub fn render(&self, args: &CallArguments, context: &MacroContext) -> Result<String, MarkupError> {
        let method = self.method(self.render.as_ref(), "render", context)?;
        bind_and_call(method, args, context)
    }

    /// Attributes for the element opened by a prefix, start tag or inline block.
    pub fn tag_params(
        &self,
        args: &CallArguments,
        context: &MacroContext,
    ) -> Result<BTreeMap<String, String>, MarkupError> {
        let method = self.method(self.tag_params.as_ref(), "tag parameters", context)?;
        bind_and_call(method, args, context)
    }

    /// Words a full-text index should record for this call.
    pub fn search_words(
        &self,
        args: &CallArguments,
        context: &MacroContext,
    ) -> Result<Vec<String>, MarkupError> {
        let method = self.method(self.search_index.as_ref(), "search indexing", context)?;
        bind_and_call(method, args, context)
    }

    fn method<'m, T>(
        &self,
        method: Option<&'m MacroMethod<T>>,
        what: &str,
        context: &MacroContext,
    ) -> Result<&'m MacroMethod<T>, MarkupError> {
        method.ok_or_else(|| {
            MarkupError::unsuitable(
                format!("macro “{}” does not provide {what}", self.name),
                context.location.clone(),
            )
        })
    }
}

/// Name to descriptor registry. Read-only once built, so one library can
/// serve any number of parses, on any number of threads.
#[derive(Debug, Default, Clone)]
pub struct MacroLibrary {
    macros: HashMap<String, MacroDescriptor>,
}

impl MacroLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: MacroDescriptor) -> Result<(), MarkupError> {
        if self.macros.contains_key(descriptor.name()) {
            return Err(MarkupError::DuplicateMacro {
                name: descriptor.name().to_string(),
            });
        }

        debug!(name = descriptor.name(), capabilities = ?descriptor.capabilities(), "registered macro");
        self.macros.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str, location: &Location) -> Result<&MacroDescriptor, MarkupError> {
        self.macros.get(name).ok_or_else(|| MarkupError::UnknownMacro {
            name: name.to_string(),
            location: location.clone(),
        })
    }

    /// Adds every macro of `other`. Fails on the first name both share.
    pub fn extend(&mut self, other: MacroLibrary) -> Result<(), MarkupError> {
        let mut incoming: Vec<MacroDescriptor> = other.macros.into_values().collect();
        incoming.sort_by(|a, b| a.name.cmp(&b.name));
        for descriptor in incoming {
            self.register(descriptor)?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Descriptors ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &MacroDescriptor> {
        let mut descriptors: Vec<&MacroDescriptor> = self.macros.values().collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bild;

    fn context() -> MacroContext {
        MacroContext {
            macro_name: "bild".to_string(),
            environment: Environment::Block,
            location: Location::new(4, "<<bild 'a.jpg'>>"),
        }
    }

    #[test]
    fn name_is_derived_from_the_type() {
        assert_eq!(MacroDescriptor::for_type::<Bild>().name(), "bild");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut library = MacroLibrary::new();
        library.register(MacroDescriptor::new("de")).unwrap();
        let error = library.register(MacroDescriptor::new("de")).unwrap_err();
        assert!(matches!(error, MarkupError::DuplicateMacro { name } if name == "de"));
    }

    #[test]
    fn extend_fails_loudly_on_shared_names() {
        let mut first = MacroLibrary::new();
        first.register(MacroDescriptor::new("de")).unwrap();
        let mut second = MacroLibrary::new();
        second.register(MacroDescriptor::new("en")).unwrap();
        second.register(MacroDescriptor::new("de")).unwrap();

        assert!(first.extend(second).is_err());
    }

    #[test]
    fn unknown_macro_carries_the_location() {
        let library = MacroLibrary::new();
        let location = Location::new(7, "<<nosuchmacro>>");
        match library.get("nosuchmacro", &location) {
            Err(MarkupError::UnknownMacro { name, location }) => {
                assert_eq!(name, "nosuchmacro");
                assert_eq!(location.line, 7);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn missing_capability_is_unsuitable() {
        let descriptor = MacroDescriptor::new("bild").with_environments(&[Environment::Block]);
        let error = descriptor
            .tag_params(&CallArguments::default(), &context())
            .unwrap_err();
        assert!(matches!(error, MarkupError::UnsuitableMacro { .. }));
        assert!(!descriptor.supports(Environment::Inline));
    }

    #[test]
    fn capabilities_follow_the_methods() {
        let descriptor = MacroDescriptor::new("de")
            .with_environments(&[Environment::Inline])
            .with_tag_params(MacroMethod::new(vec![], |_| {
                Ok(BTreeMap::from([("lang".to_string(), "de".to_string())]))
            }));
        let capabilities = descriptor.capabilities();
        assert!(capabilities.has_tag_params);
        assert!(!capabilities.supports_block);
        assert!(!capabilities.renders);
    }

    #[test]
    fn markup_source_knows_about_paragraphs() {
        let single = MarkupSource {
            text: "one\nline".to_string(),
            line: 1,
        };
        let several = MarkupSource {
            text: "one\n \ntwo".to_string(),
            line: 1,
        };
        assert!(!single.has_paragraphs());
        assert!(several.has_paragraphs());
    }
}
