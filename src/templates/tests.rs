//! Tests for the template engine

use super::*;
use std::fs;
use tempfile::TempDir;

fn vars() -> StandardTemplateVars {
    StandardTemplateVars::new("SignLearn", "/")
}

#[test]
fn test_embedded_templates_load() {
    let engine = TemplateEngine::embedded().expect("embedded templates should load");

    for name in [
        "base.html",
        "home.html",
        "level.html",
        "practice.html",
        "dictionary.html",
        "chapter.html",
        "chapters/chapter1.html",
        "profile.html",
        "register.html",
        "login.html",
        "error.html",
    ] {
        assert!(engine.has_template(name), "missing embedded template {}", name);
    }
}

#[test]
fn test_select_template_prefers_first_available() {
    let engine = TemplateEngine::embedded().unwrap();

    assert_eq!(
        engine.select_template(&["chapters/chapter1.html", "chapter.html"]),
        Some("chapters/chapter1.html")
    );
    assert_eq!(
        engine.select_template(&["chapters/chapter5.html", "chapter.html"]),
        Some("chapter.html")
    );
    assert_eq!(engine.select_template(&["nope.html"]), None);
}

#[test]
fn test_render_home_with_standard_vars() {
    let engine = TemplateEngine::embedded().unwrap();

    let html = engine
        .render_with_standard_vars("home.html", &TeraContext::new(), &vars())
        .expect("home should render");

    assert!(html.contains("SignLearn"));
    assert!(html.contains("/static/css/site.css"));
}

#[test]
fn test_current_user_shown_in_navigation() {
    let engine = TemplateEngine::embedded().unwrap();
    let vars = vars().with_user(Some("signer".to_string()));

    let html = engine
        .render_with_standard_vars("home.html", &TeraContext::new(), &vars)
        .unwrap();

    assert!(html.contains("signer"));
    assert!(html.contains("/logout/"));
}

#[test]
fn test_render_missing_template_is_not_found() {
    let engine = TemplateEngine::embedded().unwrap();

    let err = engine.render("missing.html", &TeraContext::new()).unwrap_err();
    assert!(matches!(err, TemplateError::NotFound(_)));
}

#[test]
fn test_render_page_falls_back_to_error_template() {
    let engine = TemplateEngine::embedded().unwrap();

    let html = engine.render_page("missing.html", &TeraContext::new(), &vars());

    assert!(html.contains("missing.html"));
    assert!(html.contains("SignLearn"));
}

#[test]
fn test_override_directory_replaces_and_adds_templates() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("home.html"),
        "<p>Custom home for {{ site_name }}</p>",
    )
    .unwrap();
    fs::create_dir_all(temp_dir.path().join("chapters")).unwrap();
    fs::write(
        temp_dir.path().join("chapters").join("chapter2.html"),
        "<p>Chapter {{ chapter_letter }}</p>",
    )
    .unwrap();

    let engine = TemplateEngine::new(temp_dir.path()).unwrap();

    let html = engine
        .render_with_standard_vars("home.html", &TeraContext::new(), &vars())
        .unwrap();
    assert_eq!(html, "<p>Custom home for SignLearn</p>");
    assert!(engine.has_template("chapters/chapter2.html"));
    assert!(engine.has_template("chapters/chapter1.html"));
}

#[test]
fn test_missing_override_directory_uses_embedded() {
    let temp_dir = TempDir::new().unwrap();

    let engine = TemplateEngine::new(&temp_dir.path().join("absent")).unwrap();

    assert!(engine.has_template("home.html"));
    let html = engine
        .render_with_standard_vars("home.html", &TeraContext::new(), &vars())
        .unwrap();
    assert!(html.contains("SignLearn"));
}

#[test]
fn test_broken_error_template_uses_simple_page() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("error.html"), "{{ undefined_variable.field }}").unwrap();
    fs::write(temp_dir.path().join("broken.html"), "{{ also_undefined.field }}").unwrap();

    let engine = TemplateEngine::new(temp_dir.path()).unwrap();
    let html = engine.render_page("broken.html", &TeraContext::new(), &vars());

    assert!(html.contains("Something went wrong"));
    assert!(html.contains("<code>broken.html</code>"));
}

#[test]
fn test_invalid_override_syntax_is_render_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("home.html"), "{% if %}").unwrap();

    let result = TemplateEngine::new(temp_dir.path());
    assert!(matches!(result, Err(TemplateError::Render(_))));
}

#[test]
fn test_simple_error_page_escapes_input() {
    let html = simple_error_page("<x>.html", "<script>alert(1)</script>");

    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));
}

#[test]
fn test_template_names_sorted() {
    let engine = TemplateEngine::embedded().unwrap();
    let names = engine.template_names();

    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert!(names.contains(&"error.html".to_string()));
}
