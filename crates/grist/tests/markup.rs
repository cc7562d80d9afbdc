mod common;

use grist::{compile_grammar, process, Grammar, Reduction, Token};
use proptest::prelude::*;

#[derive(Clone, PartialEq, Eq, Debug)]
enum Node {
    Text(String),
    Italic(Vec<Node>),
    Seq(Vec<Node>),
    Markup,
}

fn html() -> Grammar {
    compile_grammar(
        r#"
        token Text { [^<]+ }
        @root rule html { (normal | italic)* }
        rule italic { '<i>' html '</i>' }
        rule normal { Text }
        "#,
    )
    .unwrap()
}

fn latex() -> Grammar {
    compile_grammar(
        r#"
        // same structure, other names
        token Text { [^\\{}]+ }
        @root rule doc { (plain | emph)* }
        rule emph { '\\emph{' doc '}' }
        rule plain { Text }
        "#,
    )
    .unwrap()
}

fn leaf(token: &Token, text: &str) -> Node {
    match token.name.as_ref() {
        "Text" => Node::Text(text.to_owned()),
        _ => Node::Markup,
    }
}

fn italic(children: Vec<Node>) -> Node {
    match <[Node; 3]>::try_from(children) {
        Ok([Node::Markup, Node::Seq(inner), Node::Markup]) => Node::Italic(inner),
        other => panic!("unexpected italic children {other:?}"),
    }
}

fn single(mut children: Vec<Node>) -> Node {
    assert_eq!(children.len(), 1);
    children.pop().unwrap()
}

fn semantics() -> grist::ReductionBuilder<Node> {
    Reduction::builder(leaf)
        .rule("html", Node::Seq)
        .rule("italic", italic)
        .rule("normal", single)
        .rule("doc", Node::Seq)
        .rule("emph", italic)
        .rule("plain", single)
}

fn render_html(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Italic(children) => {
            out.push_str("<i>");
            children.iter().for_each(|child| render_html(child, out));
            out.push_str("</i>");
        }
        Node::Seq(children) => children.iter().for_each(|child| render_html(child, out)),
        Node::Markup => {}
    }
}

fn render_latex(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Italic(children) => {
            out.push_str("\\emph{");
            children.iter().for_each(|child| render_latex(child, out));
            out.push('}');
        }
        Node::Seq(children) => children.iter().for_each(|child| render_latex(child, out)),
        Node::Markup => {}
    }
}

fn text(s: &str) -> Node {
    Node::Text(s.to_owned())
}

#[test]
fn nested_structure() {
    common::init_logger();
    let grammar = html();
    let reduction = semantics().build(&grammar).unwrap();

    assert_eq!(
        process(&grammar, "a<i>b</i>c", &reduction).unwrap(),
        Node::Seq(vec![text("a"), Node::Italic(vec![text("b")]), text("c")])
    );
    assert_eq!(
        process(&grammar, "x<i>y<i>z</i></i>", &reduction).unwrap(),
        Node::Seq(vec![
            text("x"),
            Node::Italic(vec![text("y"), Node::Italic(vec![text("z")])])
        ])
    );
}

#[test]
fn empty_input() {
    let grammar = html();
    let reduction = semantics().build(&grammar).unwrap();
    assert_eq!(process(&grammar, "", &reduction).unwrap(), Node::Seq(Vec::new()));
}

#[test]
fn unclosed_italic() {
    let grammar = html();
    let reduction = semantics().build(&grammar).unwrap();
    let err = process(&grammar, "a<i>b", &reduction).unwrap_err();
    assert_eq!(err.offset(), Some(5));
    assert_eq!(err.render("a<i>b"), format!("1:6 {err}\na<i>b\n     ^"));
}

#[test]
fn dialects_share_semantics() {
    let semantics = semantics();
    let html = html();
    let latex = latex();
    let from_html = semantics.build(&html).unwrap();
    let from_latex = semantics.build(&latex).unwrap();

    let expected = Node::Seq(vec![text("a"), Node::Italic(vec![text("b")]), text("c")]);
    assert_eq!(process(&html, "a<i>b</i>c", &from_html).unwrap(), expected);
    assert_eq!(process(&latex, r"a\emph{b}c", &from_latex).unwrap(), expected);
}

proptest! {
    #[test]
    fn html_round_trip(src in "([a-z ]{1,3}|<i>[a-z ]{0,3}</i>){0,6}") {
        let grammar = html();
        let reduction = semantics().build(&grammar).unwrap();

        let ast = process(&grammar, &src, &reduction).unwrap();
        let mut rendered = String::new();
        render_html(&ast, &mut rendered);
        prop_assert_eq!(&rendered, &src);
        prop_assert_eq!(process(&grammar, &rendered, &reduction).unwrap(), ast);
    }

    #[test]
    fn html_to_latex(src in "([a-z ]{1,3}|<i>[a-z ]{0,3}</i>){0,6}") {
        let semantics = semantics();
        let html = html();
        let latex = latex();

        let ast = process(&html, &src, &semantics.build(&html).unwrap()).unwrap();
        let mut translated = String::new();
        render_latex(&ast, &mut translated);
        prop_assert_eq!(
            process(&latex, &translated, &semantics.build(&latex).unwrap()).unwrap(),
            ast
        );
    }
}
