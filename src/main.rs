use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wikkly::{tokenize, Config, Event, EventRecorder, MacroLibrary, Parser, TokenValue};

#[derive(ClapParser)]
#[command(author, version, about = "WikklyText markup tracer")]
struct Cli {
    /// JSON file declaring the available macros (defaults to $WIKKLY_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tokens of a markup file, one per line
    Tokens {
        /// Markup file to tokenize
        file: PathBuf,
    },
    /// Parse a markup file and print the structural events
    Events {
        /// Markup file to parse
        file: PathBuf,
        /// Print the events as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// List the configured macros and what they can do
    Macros,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wikkly=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e).into())
}

fn describe_value(value: &TokenValue) -> String {
    match value {
        TokenValue::None => String::new(),
        TokenValue::Text(text) => format!("{text:?}"),
        TokenValue::Newlines(count) => count.to_string(),
        TokenValue::Call(call) => format!("{} {:?}", call.name, call.args),
        TokenValue::Prefix(None) => String::new(),
        TokenValue::Prefix(Some(prefix)) => format!("{} {:?}", prefix.name, prefix.args),
        TokenValue::Cell(cell) => match &cell.prefix {
            Some(prefix) => format!("header={} {} {:?}", cell.header, prefix.name, prefix.args),
            None => format!("header={}", cell.header),
        },
        TokenValue::Caption { text, prefix } => match prefix {
            Some(prefix) => format!("{text:?} {}", prefix.name),
            None => format!("{text:?}"),
        },
        TokenValue::Link { text, target } => format!("{target:?} {text:?}"),
        TokenValue::Image {
            title,
            filename,
            url,
        } => format!("{filename:?} title={title:?} url={url:?}"),
    }
}

fn print_tokens(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(path)?;
    for token in tokenize(&source) {
        let token = token?;
        println!(
            "{:>4}  {:<20} {}",
            token.location.line,
            format!("{:?}", token.kind),
            describe_value(&token.value)
        );
    }
    Ok(())
}

fn print_events(
    path: &Path,
    library: &MacroLibrary,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(path)?;
    let mut recorder = EventRecorder::default();
    Parser::new(library).parse(&source, &mut recorder)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recorder.events)?);
        return Ok(());
    }

    let mut depth: i32 = 0;
    for event in &recorder.events {
        let change = event.depth_change();
        if change < 0 {
            depth += change;
        }
        println!("{}{}", "  ".repeat(depth.max(0) as usize), describe_event(event)?);
        if change > 0 {
            depth += change;
        }
    }
    Ok(())
}

fn describe_event(event: &Event) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(event)?;
    let name = value
        .as_object_mut()
        .and_then(|fields| fields.remove("event"))
        .and_then(|name| name.as_str().map(str::to_string))
        .unwrap_or_default();
    match value.as_object() {
        Some(fields) if !fields.is_empty() => Ok(format!("{name} {value}")),
        _ => Ok(name),
    }
}

fn list_macros(library: &MacroLibrary) {
    if library.is_empty() {
        println!("No macros configured.");
        return;
    }
    for descriptor in library.iter() {
        let caps = descriptor.capabilities();
        let mut features = Vec::new();
        if caps.supports_block {
            features.push("block");
        }
        if caps.supports_inline {
            features.push("inline");
        }
        if caps.renders {
            features.push("render");
        }
        if caps.has_tag_params {
            features.push("tag-params");
        }
        if caps.has_search_indexing {
            features.push("search");
        }
        println!("{:<20} {}", descriptor.name(), features.join(", "));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let library = config.macro_library()?;

    match cli.command {
        Commands::Tokens { file } => print_tokens(&file),
        Commands::Events { file, json } => print_events(&file, &library, json),
        Commands::Macros => {
            list_macros(&library);
            Ok(())
        }
    }
}
