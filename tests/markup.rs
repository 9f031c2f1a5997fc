use rstest::rstest;
use wikkly::{
    parse, CallArguments, CompileResult, Compiler, Environment, Event, EventRecorder, ListKind,
    Location, MacroContext, MacroDescriptor, MacroLibrary, MacroMethod, MarkupError, ParamSpec,
    Value,
};

fn library() -> MacroLibrary {
    let mut library = MacroLibrary::new();
    library
        .register(MacroDescriptor::new("m").with_render(MacroMethod::new(
            vec![
                ParamSpec::string("letter"),
                ParamSpec::context("context"),
                ParamSpec::float("length"),
                ParamSpec::string("filename").with_default(Value::Str("none".to_string())),
                ParamSpec::string("color").with_default(Value::Str("black".to_string())),
            ],
            |args| {
                let line = args.context().map(|c| c.location.line).unwrap_or_default();
                Ok(format!(
                    "{} {} {} {} @{}",
                    args.str("letter")?,
                    args.float("length")?,
                    args.str("filename")?,
                    args.str("color")?,
                    line
                ))
            },
        )))
        .unwrap();
    library
}

fn events(source: &str) -> Vec<Event> {
    let library = library();
    let mut recorder = EventRecorder::default();
    parse(source, &library, &mut recorder).unwrap();
    recorder.events
}

fn error(source: &str) -> MarkupError {
    let library = library();
    let mut recorder = EventRecorder::default();
    parse(source, &library, &mut recorder).unwrap_err()
}

fn word(text: &str) -> Event {
    Event::Word {
        text: text.to_string(),
    }
}

/// A backend that renders every macro call it sees.
#[derive(Default)]
struct Renderer {
    output: Vec<String>,
}

impl Compiler for Renderer {
    fn call_macro(
        &mut self,
        environment: Environment,
        macro_descriptor: &MacroDescriptor,
        args: &CallArguments,
        location: &Location,
    ) -> CompileResult {
        let context = MacroContext {
            macro_name: macro_descriptor.name().to_string(),
            environment,
            location: location.clone(),
        };
        self.output.push(macro_descriptor.render(args, &context)?);
        Ok(())
    }
}

#[test]
fn macro_arguments_bind_by_position_keyword_and_default() {
    let library = library();
    let mut renderer = Renderer::default();
    parse(
        "intro\n\n<<m 'a' 1.2 filename='test.jpg'>>",
        &library,
        &mut renderer,
    )
    .unwrap();
    assert_eq!(renderer.output, vec!["a 1.2 test.jpg black @3"]);
}

#[test]
fn positional_after_keyword_is_a_syntax_error() {
    assert!(matches!(error("<<m a=1 'b'>>"), MarkupError::Syntax { .. }));
}

#[test]
fn bad_argument_value_is_reported_against_the_call() {
    let library = library();
    let mut renderer = Renderer::default();
    let error = parse("x\n\n<<m 'a' long>>", &library, &mut renderer).unwrap_err();
    match error {
        MarkupError::ErrorInMacroCall {
            macro_name,
            location,
            ..
        } => {
            assert_eq!(macro_name, "m");
            assert_eq!(location.line, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn nested_numbered_lists() {
    let numbered = ListKind::Numbered;
    assert_eq!(
        events("# a\n## b\n# c\n"),
        vec![
            Event::BeginDocument,
            Event::BeginList { kind: numbered },
            Event::BeginListItem {
                kind: numbered,
                level: 1
            },
            word("a"),
            Event::BeginList { kind: numbered },
            Event::BeginListItem {
                kind: numbered,
                level: 2
            },
            word("b"),
            Event::EndListItem { kind: numbered },
            Event::EndList { kind: numbered },
            Event::EndListItem { kind: numbered },
            Event::BeginListItem {
                kind: numbered,
                level: 1
            },
            word("c"),
            Event::EndListItem { kind: numbered },
            Event::EndList { kind: numbered },
            Event::EndDocument,
        ]
    );
}

#[rstest]
#[case::blank_line_after("|h1|h2|\n|a|b|\n\n")]
#[case::newline_after("|h1|h2|\n|a|b|\n")]
#[case::end_of_input("|h1|h2|\n|a|b|")]
fn two_row_table(#[case] source: &str) {
    let cell = || Event::BeginTableCell {
        header: false,
        macro_name: None,
        args: CallArguments::default(),
    };
    assert_eq!(
        events(source),
        vec![
            Event::BeginDocument,
            Event::BeginTable,
            Event::BeginTableRow,
            cell(),
            word("h1"),
            Event::EndTableCell,
            cell(),
            word("h2"),
            Event::EndTableCell,
            Event::EndTableRow,
            Event::BeginTableRow,
            cell(),
            word("a"),
            Event::EndTableCell,
            cell(),
            word("b"),
            Event::EndTableCell,
            Event::EndTableRow,
            Event::EndTable,
            Event::EndDocument,
        ]
    );
}

#[test]
fn header_cells_are_marked() {
    let events = events("|!Name|!Price|\n");
    let headers = events
        .iter()
        .filter(|e| matches!(e, Event::BeginTableCell { header: true, .. }))
        .count();
    assert_eq!(headers, 2);
}

#[rstest]
#[case::bold("''never closed")]
#[case::italic("//never closed")]
#[case::subscript("~~never closed")]
fn unclosed_toggle_fails_at_end_of_input(#[case] source: &str) {
    match error(source) {
        MarkupError::Parse { location, .. } => {
            assert_eq!(location.line, 1);
            assert_eq!(location.looking_at, "");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
#[case::across_paragraphs("''a\n\nb")]
#[case::heading_at_end_of_input("! ''Title")]
#[case::heading_line("! ''Title\n")]
#[case::table_cell("|''a|\n")]
#[case::list_items("* ''a\n* b")]
fn toggle_left_open_past_a_block_boundary_fails(#[case] source: &str) {
    let message = error(source).to_string();
    assert!(message.contains("Input ended inside"), "{message}");
}

#[rstest]
#[case::across_paragraphs("''a\n\nb''")]
#[case::list_items("* ''a\n* b''")]
#[case::table_cells("|''a|b''|\n")]
fn toggle_closed_in_a_later_block_parses(#[case] source: &str) {
    let events = events(source);
    let opened = events
        .iter()
        .filter(|e| matches!(e, Event::BeginStyle { .. }))
        .count();
    let closed = events
        .iter()
        .filter(|e| matches!(e, Event::EndStyle { .. }))
        .count();
    assert_eq!((opened, closed), (2, 2));
}

#[test]
fn mailto_cell_is_a_link_not_a_macro() {
    let events = events("|mailto:ab@x.org|\n");
    assert!(events.contains(&Event::Link {
        target: "mailto:ab@x.org".to_string(),
        text: Some("mailto:ab@x.org".to_string()),
    }));
}

#[test]
fn unknown_macro_reports_its_line() {
    match error("first\nsecond\n<<nosuchmacro>>") {
        MarkupError::UnknownMacro { name, location } => {
            assert_eq!(name, "nosuchmacro");
            assert_eq!(location.line, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn nested_blockquote_fails_at_the_inner_opener() {
    match error("<<<\n<<<\nx\n>>>\n>>>") {
        MarkupError::Parse { location, .. } => assert_eq!(location.line, 2),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
#[case("a''b", "Input ended inside")]
#[case("a@@", "Unexpected end")]
#[case("<<<\nquote", "Input ended inside")]
fn parse_error_messages(#[case] source: &str, #[case] expected: &str) {
    let message = error(source).to_string();
    assert!(message.starts_with("ParseError: "), "{message}");
    assert!(message.contains(expected), "{message}");
}

#[test]
fn backend_errors_abort_the_parse() {
    struct Refusing;
    impl Compiler for Refusing {
        fn begin_table(&mut self) -> CompileResult {
            Err(MarkupError::internal("no tables here", Location::new(1, "")))
        }
    }

    let library = library();
    let result = parse("text\n\n|a|\n", &library, &mut Refusing);
    assert!(matches!(result, Err(MarkupError::Internal { .. })));
}

#[test]
fn one_library_serves_parallel_parses() {
    let library = library();
    let sources = ["# a\n## b\n", "|x|y|\n", "''bold'' text", "<<m 'q' 2>>"];

    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let library = &library;
                scope.spawn(move || {
                    let mut recorder = EventRecorder::default();
                    parse(source, library, &mut recorder).map(|_| recorder.events)
                })
            })
            .collect();

        for (handle, source) in handles.into_iter().zip(sources) {
            let events = handle.join().unwrap().unwrap();
            assert_eq!(events, self::events(source));
        }
    });
}
