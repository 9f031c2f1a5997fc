use std::io::Write;
use tempfile::{tempdir, NamedTempFile};
use wikkly::{parse, Config, ConfigError, Environment, Event, EventRecorder};

const DECLARATIONS: &str = r#"{
    "macros": [
        { "name": "de", "attributes": { "lang": "de" } },
        { "name": "toc", "environments": ["block"] }
    ]
}"#;

#[test]
fn loads_declarations_from_an_explicit_path() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DECLARATIONS.as_bytes()).unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.macros.len(), 2);
    assert_eq!(config.macros[1].environments, vec![Environment::Block]);

    let library = config.macro_library().unwrap();
    let names: Vec<&str> = library.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["de", "toc"]);
}

#[test]
fn declared_macros_drive_the_parser() {
    let library = Config::from_json(DECLARATIONS)
        .unwrap()
        .macro_library()
        .unwrap();
    let mut recorder = EventRecorder::default();
    parse("|de: Hallo|\n\n<<toc>>", &library, &mut recorder).unwrap();

    assert!(recorder.events.iter().any(|e| matches!(
        e,
        Event::BeginTableCell { macro_name: Some(name), .. } if name == "de"
    )));
    assert!(recorder.events.iter().any(|e| matches!(
        e,
        Event::CallMacro { environment: Environment::Block, name, .. } if name == "toc"
    )));
}

#[test]
fn saved_configuration_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wikkly.json");

    let config = Config::from_json(DECLARATIONS).unwrap();
    config.save(&path).unwrap();
    assert_eq!(Config::load(Some(&path)).unwrap(), config);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    assert!(matches!(
        Config::load(Some(&missing)),
        Err(ConfigError::Io { .. })
    ));
}
