use crate::error::ConfigError;
use crate::macros::{Environment, MacroDescriptor, MacroLibrary, MacroMethod};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV_VAR: &str = "WIKKLY_CONFIG";

static MACRO_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[^\d\W]\w*\z").expect("macro name pattern is valid"));

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub macros: Vec<MacroDeclaration>,
}

/// A macro declared in the configuration file rather than in code.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroDeclaration {
    pub name: String,
    #[serde(default = "both_environments")]
    pub environments: Vec<Environment>,
    /// Attributes handed out as tag parameters, e.g. `{"lang": "de"}`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn both_environments() -> Vec<Environment> {
    vec![Environment::Block, Environment::Inline]
}

impl Config {
    /// Loads the configuration from `explicit`, else from the file named by
    /// `WIKKLY_CONFIG`, else returns an empty configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::config_path(explicit) {
            Some(path) => Self::read(&path),
            None => {
                debug!("no configuration file, using defaults");
                Ok(Config::default())
            }
        }
    }

    pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading configuration");
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for declaration in &self.macros {
            if !MACRO_NAME_RE.is_match(&declaration.name) {
                return Err(ConfigError::InvalidDeclaration {
                    name: declaration.name.clone(),
                    reason: "not a valid macro name".to_string(),
                });
            }
            if declaration.environments.is_empty() {
                return Err(ConfigError::InvalidDeclaration {
                    name: declaration.name.clone(),
                    reason: "no environment given".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Builds a library holding every declared macro.
    pub fn macro_library(&self) -> Result<MacroLibrary, ConfigError> {
        let mut library = MacroLibrary::new();
        for declaration in &self.macros {
            library.register(declaration.descriptor())?;
        }
        Ok(library)
    }
}

impl MacroDeclaration {
    pub fn descriptor(&self) -> MacroDescriptor {
        let descriptor = MacroDescriptor::new(&self.name).with_environments(&self.environments);
        if self.attributes.is_empty() {
            return descriptor;
        }

        let attributes = self.attributes.clone();
        descriptor.with_tag_params(MacroMethod::new(vec![], move |_| Ok(attributes.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarkupError;
    use crate::location::Location;
    use crate::macros::MacroContext;
    use crate::token::CallArguments;

    const SAMPLE: &str = r#"{
        "macros": [
            { "name": "de", "environments": ["inline"], "attributes": { "lang": "de" } },
            { "name": "subdued", "attributes": { "class": "subdued" } },
            { "name": "plain" }
        ]
    }"#;

    #[test]
    fn declarations_become_descriptors() {
        let library = Config::from_json(SAMPLE).unwrap().macro_library().unwrap();
        assert_eq!(library.len(), 3);

        let location = Location::new(1, "");
        let de = library.get("de", &location).unwrap();
        assert!(!de.supports(Environment::Block));

        let context = MacroContext {
            macro_name: "de".to_string(),
            environment: Environment::Inline,
            location,
        };
        let params = de.tag_params(&CallArguments::default(), &context).unwrap();
        assert_eq!(params.get("lang").map(String::as_str), Some("de"));

        let plain = library.get("plain", &context.location).unwrap();
        assert!(plain.supports(Environment::Block) && plain.supports(Environment::Inline));
        assert!(!plain.capabilities().has_tag_params);
    }

    #[test]
    fn duplicate_declarations_fail() {
        let json = r#"{ "macros": [ { "name": "de" }, { "name": "de" } ] }"#;
        let error = Config::from_json(json).unwrap().macro_library().unwrap_err();
        assert!(matches!(error, ConfigError::Library(MarkupError::DuplicateMacro { .. })));
    }

    #[test]
    fn invalid_names_and_empty_environments_are_rejected() {
        let bad_name = r#"{ "macros": [ { "name": "9lives" } ] }"#;
        assert!(matches!(
            Config::from_json(bad_name),
            Err(ConfigError::InvalidDeclaration { .. })
        ));

        let no_environment = r#"{ "macros": [ { "name": "x", "environments": [] } ] }"#;
        assert!(Config::from_json(no_environment).is_err());
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(Config::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.json");
        assert_eq!(Config::config_path(Some(path)), Some(path.to_path_buf()));
    }
}
