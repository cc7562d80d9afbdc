mod common;

use grist::{
    compile_grammar, process, process_bytes, process_with,
    runtime::{parse_lazy, tokenize, Expected, Found, LexErrorReason, ParseErrorKind, ParserOptions},
    Config, Grammar, GrammarError, PipelineError, Reduction, Token,
};
use proptest::prelude::*;
use rstest::rstest;

#[derive(Clone, PartialEq, Eq, Debug)]
enum Json {
    Num(i64),
    Str(String),
    Ident(String),
    Null,
    List(Vec<Json>),
    Punct,
}

fn lists() -> Grammar {
    compile_grammar(
        r#"
        @skip token Space { [ \t\n]+ }
        @word token Ident { [a-z_]+ }
        token Number { [0-9]+ }
        @unquote token String { '"' ([^"\\] | '\\' .)* '"' }
        @root rule list { '[' (value (',' value)*)? ']' }
        rule value { Number | String | Ident | 'null' | list }
        "#,
    )
    .unwrap()
}

fn leaf(token: &Token, text: &str) -> Json {
    match token.name.as_ref() {
        "Number" => Json::Num(text.parse().unwrap()),
        "String" => Json::Str(text.to_owned()),
        "Ident" => Json::Ident(text.to_owned()),
        "'null'" => Json::Null,
        _ => Json::Punct,
    }
}

fn reduction(grammar: &Grammar) -> Reduction<Json> {
    Reduction::builder(leaf)
        .rule("list", |children| {
            Json::List(children.into_iter().filter(|c| *c != Json::Punct).collect())
        })
        .rule("value", |mut children| children.pop().unwrap())
        .build(grammar)
        .unwrap()
}

fn render(value: &Json, out: &mut String) {
    match value {
        Json::Num(n) => out.push_str(&n.to_string()),
        Json::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        Json::Ident(s) => out.push_str(s),
        Json::Null => out.push_str("null"),
        Json::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(item, out);
            }
            out.push(']');
        }
        Json::Punct => {}
    }
}

#[test]
fn values() {
    common::init_logger();
    let grammar = lists();
    let reduction = reduction(&grammar);

    let src = r#"[1, "a\"b", nullable, null, [2]]"#;
    assert_eq!(
        process(&grammar, src, &reduction).unwrap(),
        Json::List(vec![
            Json::Num(1),
            Json::Str("a\"b".to_owned()),
            Json::Ident("nullable".to_owned()),
            Json::Null,
            Json::List(vec![Json::Num(2)]),
        ])
    );
}

#[rstest]
#[case("[]")]
#[case("[1,2 ,3]")]
#[case(r#"["tab\there", [null, [x]]]"#)]
#[case(r#"[ "q\"uote" , "back\\slash", "line\n" ]"#)]
fn render_round_trip(#[case] src: &str) {
    let grammar = lists();
    let reduction = reduction(&grammar);

    let ast = process(&grammar, src, &reduction).unwrap();
    let mut rendered = String::new();
    render(&ast, &mut rendered);
    assert_eq!(process(&grammar, &rendered, &reduction).unwrap(), ast);
}

#[test]
fn furthest_failure() {
    let grammar = compile_grammar("rule root { 'a' 'b' 'c' }").unwrap();
    let reduction = Reduction::builder(|_, _: &str| ())
        .rule("root", |_| ())
        .build(&grammar)
        .unwrap();

    let err = process(&grammar, "ab", &reduction).unwrap_err();
    let PipelineError::Parse(err) = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(err.offset, 2);
    assert_eq!(
        err.kind,
        ParseErrorKind::Unexpected {
            expected: [Expected::Symbol("'c'".into())].into(),
            found: Found::EndOfInput,
        }
    );
}

#[test]
fn undefined_reference() {
    let errors = compile_grammar("rule x { y }").unwrap_err();
    assert!(
        matches!(
            errors.as_slice(),
            [GrammarError::UndefinedNonterminal { name, .. }] if name.as_ref() == "y"
        ),
        "{errors:?}"
    );
}

#[test]
fn longest_match() {
    let grammar = compile_grammar("token WORD { [a-z]+ }").unwrap();
    let reduction = Reduction::builder(|token, text: &str| format!("{}({text})", token.name))
        .build(&grammar)
        .unwrap();
    assert_eq!(process(&grammar, "cat", &reduction).unwrap(), "WORD(cat)");
}

#[test]
fn lex_errors() {
    let grammar = lists();
    let reduction = reduction(&grammar);

    let err = process(&grammar, "[1, #]", &reduction).unwrap_err();
    assert!(
        matches!(
            &err,
            PipelineError::Lex(err) if err.offset == 4 && err.reason == LexErrorReason::NoMatch { found: '#' }
        ),
        "{err:?}"
    );

    let err = process(&grammar, r#"["\q"]"#, &reduction).unwrap_err();
    assert!(
        matches!(
            &err,
            PipelineError::Lex(err) if err.offset == 2 && matches!(err.reason, LexErrorReason::InvalidEscape { .. })
        ),
        "{err:?}"
    );

    let err = process_bytes(&grammar, b"[1, \xFF]", &reduction, &Config::default()).unwrap_err();
    assert!(
        matches!(
            &err,
            PipelineError::Lex(err) if err.offset == 4 && err.reason == LexErrorReason::InvalidUtf8
        ),
        "{err:?}"
    );
    assert_eq!(
        process_bytes(&grammar, b"[1]", &reduction, &Config::default()).unwrap(),
        Json::List(vec![Json::Num(1)])
    );
}

#[test]
fn parse_errors_before_lex_errors() {
    let grammar = lists();
    let reduction = reduction(&grammar);

    // the parser fails on the second `]` before the lexer reaches `#`
    let err = process(&grammar, "[1]] #", &reduction).unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)), "{err:?}");
    assert_eq!(err.offset(), Some(3));
}

#[test]
fn configured_recursion_limit() {
    let grammar = lists();
    let reduction = reduction(&grammar);
    let src = "[".repeat(20) + &"]".repeat(20);

    assert!(process(&grammar, &src, &reduction).is_ok());

    let config = Config::from_json(serde_json::json!({ "recursionLimit": 8 })).unwrap();
    let err = process_with(&grammar, &src, &reduction, &config).unwrap_err();
    assert!(
        matches!(
            &err,
            PipelineError::Parse(err) if err.kind == ParseErrorKind::RecursionLimit { limit: 8 }
        ),
        "{err:?}"
    );
}

#[test]
fn missing_reduction_rule() {
    let grammar = lists();
    let err = Reduction::builder(leaf)
        .rule("list", Json::List)
        .build(&grammar)
        .err()
        .unwrap();

    let err = PipelineError::from(err);
    assert_eq!(err.to_string(), "no reduction rule for `value`");
    assert_eq!(err.offset(), None);
}

#[test]
fn parallel_parses() {
    let grammar = lists();
    let reduction = reduction(&grammar);
    let inputs = (0..8)
        .map(|i| format!(r#"[{i}, "s{i}", [{i}]]"#))
        .collect::<Vec<_>>();

    let grammar = &grammar;
    let reduction = &reduction;
    let results = std::thread::scope(|s| {
        let handles = inputs
            .iter()
            .map(|input| s.spawn(move || process(grammar, input, reduction)))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect::<Vec<_>>()
    });

    for (i, result) in results.into_iter().enumerate() {
        let i = i as i64;
        assert_eq!(
            result,
            Json::List(vec![
                Json::Num(i),
                Json::Str(format!("s{i}")),
                Json::List(vec![Json::Num(i)])
            ])
        );
    }
}

proptest! {
    #[test]
    fn leaves_reproduce_input(
        src in r"\[ ?([0-9]{1,3}|[a-z]{1,4}) ?(, ?([0-9]{1,3}|[a-z]{1,4}) ?){0,4}\]"
    ) {
        let grammar = lists();

        let options = ParserOptions { keep_skipped: true, ..Default::default() };
        let tree = parse_lazy(&grammar, tokenize(&grammar, &src), options).unwrap();
        let text = tree.tokens().map(|t| t.text(&src)).collect::<String>();
        prop_assert_eq!(&text, &src);

        let concat = Reduction::builder(|_, text: &str| text.to_owned())
            .rule("list", |children| children.concat())
            .rule("value", |children| children.concat())
            .build(&grammar)
            .unwrap();
        let significant = process(&grammar, &src, &concat).unwrap();
        prop_assert_eq!(significant, src.replace(' ', ""));
    }
}
