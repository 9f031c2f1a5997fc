use proptest::prelude::*;
use wikkly::{
    parse_parameter_list, tokenize, EventRecorder, MacroDescriptor, MacroLibrary, MacroMethod,
    Parser, Terminator,
};

fn library() -> MacroLibrary {
    let mut library = MacroLibrary::new();
    library
        .register(
            MacroDescriptor::new("m").with_tag_params(MacroMethod::new(vec![], |_| {
                Ok(Default::default())
            })),
        )
        .unwrap();
    library
}

/// Markup-heavy text: delimiters, markers and line breaks in any order.
fn markup() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just("''"),
            Just("//"),
            Just("--"),
            Just("__"),
            Just("^^"),
            Just("~~"),
            Just("|"),
            Just("!"),
            Just("#"),
            Just("* "),
            Just(";"),
            Just(":"),
            Just("<<<"),
            Just(">>>"),
            Just("<<m>>"),
            Just("@@m:"),
            Just("@@"),
            Just("{{m{"),
            Just("}}}"),
            Just("[[a|b]]"),
            Just("word"),
            Just(" "),
            Just("\n"),
            Just("\n\n"),
        ],
        0..40,
    )
    .prop_map(|pieces| pieces.concat())
}

proptest! {
    #[test]
    fn tokenizing_is_deterministic(source in markup()) {
        let run = || -> Vec<Result<_, String>> {
            tokenize(&source).map(|t| t.map_err(|e| e.to_string())).collect()
        };
        let (first, second) = (run(), run());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn tokens_cover_the_source_in_order(source in markup()) {
        let mut end = 0;
        for token in tokenize(&source) {
            let Ok(token) = token else { break };
            prop_assert!(token.span.start >= end);
            prop_assert_eq!(&source[token.span.clone()], token.raw.as_str());
            end = token.span.end;
        }
    }

    #[test]
    fn successful_parses_are_balanced(source in markup()) {
        let library = library();
        let mut recorder = EventRecorder::default();
        if Parser::new(&library).parse(&source, &mut recorder).is_ok() {
            let mut depth = 0;
            for event in &recorder.events {
                depth += event.depth_change();
                prop_assert!(depth >= 0, "{:?}", recorder.events);
            }
            prop_assert_eq!(depth, 0);
        }
    }

    #[test]
    fn quoted_parameters_round_trip(value in "[a-z0-9 .]{0,12}") {
        let source = format!(" '{value}'>>");
        let (consumed, args) = parse_parameter_list(&source, 1, Terminator::Macro).unwrap();
        prop_assert_eq!(consumed, source.len());
        prop_assert_eq!(args.positional, vec![value]);
    }
}
