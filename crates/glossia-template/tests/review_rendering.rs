//! Integration tests for rendering translation review templates.
//!
//! Tests cover: row numbering with the increment tag, numbering
//! independence across counter names, conditional includes, the review
//! filter set over a real message catalog, and end to end rendering of a
//! review table page.

use glossia_core::catalog::{Message, MessageCatalog};
use glossia_core::error::GlossiaError;
use glossia_template::context::{Context, ContextValue};
use glossia_template::engine::Engine;

fn catalog() -> MessageCatalog {
    let mut catalog = MessageCatalog::new("de");
    catalog.add(Message::new("Hello %(name)s").with_msgstr("Hallo %(name)s"));
    catalog.add(
        Message::new("Goodbye")
            .with_msgstr("Auf Wiedersehen")
            .with_flag("fuzzy"),
    );
    catalog.add(Message::new("Untranslated"));
    catalog
}

fn messages_value(catalog: &MessageCatalog) -> ContextValue {
    ContextValue::List(catalog.messages.iter().map(ContextValue::from).collect())
}

// ═════════════════════════════════════════════════════════════════════
// 1. Increment tag: sequential numbering per render
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_increment_numbers_rows_sequentially() {
    let engine = Engine::new();
    engine.add_string_template(
        "rows.html",
        "{% for m in messages %}{% increment row %},{% endfor %}",
    );

    let mut ctx = Context::new();
    ctx.set(
        "messages",
        ContextValue::from(vec!["a", "b", "c", "d", "e"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()),
    );

    let out = engine.render_to_string("rows.html", &mut ctx).unwrap();
    assert_eq!(out, "1,2,3,4,5,");
}

#[test]
fn test_increment_restarts_each_render() {
    let engine = Engine::new();
    engine.add_string_template("t.html", "{% increment n %}");

    let mut ctx = Context::new();
    for _ in 0..3 {
        assert_eq!(engine.render_to_string("t.html", &mut ctx).unwrap(), "1");
    }
}

#[test]
fn test_interleaved_counters_count_independently() {
    let engine = Engine::new();
    engine.add_string_template(
        "t.html",
        "{% increment x %} {% increment x %} {% increment y %} {% increment x %} {% increment y %}",
    );

    let mut ctx = Context::new();
    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    assert_eq!(out, "1 2 1 3 2");
}

#[test]
fn test_increment_requires_a_name() {
    let engine = Engine::new();
    engine.add_string_template("t.html", "{% increment %}");

    let mut ctx = Context::new();
    let result = engine.render_to_string("t.html", &mut ctx);
    assert!(matches!(result, Err(GlossiaError::TemplateSyntaxError(_))));
}

// ═════════════════════════════════════════════════════════════════════
// 2. Conditional includes
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_try_include_suppresses_missing_templates() {
    let engine = Engine::new();
    engine.add_string_template(
        "page.html",
        r#"<header>{% try_include "banner.html" %}</header>"#,
    );

    let mut ctx = Context::new();
    let out = engine.render_to_string("page.html", &mut ctx).unwrap();
    assert_eq!(out, "<header></header>");

    engine.add_string_template("banner.html", "NOTICE");
    let out = engine.render_to_string("page.html", &mut ctx).unwrap();
    assert_eq!(out, "<header>NOTICE</header>");
}

#[test]
fn test_template_exists_drives_conditional_markup() {
    let engine = Engine::new();
    engine.add_string_template(
        "page.html",
        r#"{% if "extra.html"|template_exists %}yes{% else %}no{% endif %}"#,
    );

    let mut ctx = Context::new();
    assert_eq!(engine.render_to_string("page.html", &mut ctx).unwrap(), "no");

    engine.add_string_template("extra.html", "x");
    assert_eq!(engine.render_to_string("page.html", &mut ctx).unwrap(), "yes");
}

// ═════════════════════════════════════════════════════════════════════
// 3. Review filters over a message catalog
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_format_message_in_template() {
    let engine = Engine::new();
    engine.add_string_template("t.html", "{{ m.msgid|format_message }}");

    let mut ctx = Context::new();
    let catalog = catalog();
    ctx.set("m", ContextValue::from(&catalog.messages[0]));

    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    assert_eq!(out, "Hello <code>%(name)s</code>");
}

#[test]
fn test_format_message_output_not_double_escaped() {
    let engine = Engine::new();
    engine.add_string_template("t.html", "{{ text|format_message }}");

    let mut ctx = Context::new();
    ctx.set("text", ContextValue::from("<b>%s</b>"));

    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    // The filter escapes the input itself and marks its markup safe.
    assert_eq!(out, "&lt;b&gt;<code>%s</code>&lt;/b&gt;");
}

#[test]
fn test_is_fuzzy_marks_rows() {
    let engine = Engine::new();
    engine.add_string_template(
        "t.html",
        "{% for m in messages %}{% if m|is_fuzzy %}F{% else %}.{% endif %}{% endfor %}",
    );

    let mut ctx = Context::new();
    ctx.set("messages", messages_value(&catalog()));

    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    assert_eq!(out, ".F.");
}

#[test]
fn test_lines_count_sizes_edit_boxes() {
    let engine = Engine::new();
    engine.add_string_template("t.html", r#"rows="{{ text|lines_count }}""#);

    let mut ctx = Context::new();
    ctx.set("text", ContextValue::from("x".repeat(130)));

    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    assert_eq!(out, r#"rows="3""#);
}

#[test]
fn test_arithmetic_filters_in_pagination() {
    let engine = Engine::new();
    engine.add_string_template(
        "t.html",
        "{{ page|minus:1|mult:per_page }}{% if total|gt:50 %}+{% endif %}",
    );

    let mut ctx = Context::new();
    ctx.set("page", ContextValue::Integer(3));
    ctx.set("per_page", ContextValue::Integer(20));
    ctx.set("total", ContextValue::Integer(51));

    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    assert_eq!(out, "40+");
}

#[test]
fn test_arithmetic_filters_tolerate_bad_input() {
    let engine = Engine::new();
    engine.add_string_template("t.html", "{{ junk|mult:2 }} {{ junk|minus:2 }}");

    let mut ctx = Context::new();
    ctx.set("junk", ContextValue::from("not a number"));

    let out = engine.render_to_string("t.html", &mut ctx).unwrap();
    assert_eq!(out, "0 0");
}

// ═════════════════════════════════════════════════════════════════════
// 4. A complete review table render
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_review_table_page() {
    let engine = Engine::new();
    engine.add_string_template(
        "table.html",
        "{% load review %}\
         {% for m in messages %}\
         <tr><td>{% increment row %}</td>\
         <td>{{ m.msgid|format_message }}</td>\
         <td{% if m|is_fuzzy %} class=\"fuzzy\"{% endif %}>{{ m.msgstr }}</td></tr>\
         {% endfor %}",
    );

    let mut ctx = Context::new();
    ctx.set("messages", messages_value(&catalog()));

    let out = engine.render_to_string("table.html", &mut ctx).unwrap();
    assert_eq!(
        out,
        "<tr><td>1</td><td>Hello <code>%(name)s</code></td><td>Hallo %(name)s</td></tr>\
         <tr><td>2</td><td>Goodbye</td><td class=\"fuzzy\">Auf Wiedersehen</td></tr>\
         <tr><td>3</td><td>Untranslated</td><td></td></tr>"
    );
}

#[test]
fn test_catalog_stats_match_rendered_summary() {
    let engine = Engine::new();
    engine.add_string_template(
        "summary.html",
        "{{ total }} message{{ total|pluralize }}, {{ fuzzy }} fuzzy",
    );

    let catalog = catalog();
    let stats = catalog.stats();

    let mut ctx = Context::new();
    ctx.set("total", ContextValue::from(stats.total));
    ctx.set("fuzzy", ContextValue::from(stats.fuzzy));

    let out = engine.render_to_string("summary.html", &mut ctx).unwrap();
    assert_eq!(out, "3 messages, 1 fuzzy");
}
