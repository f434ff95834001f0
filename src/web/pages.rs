//! Embedded Tera templates for the three pages. Template names end in
//! `.html` so value interpolation is HTML-escaped.

use anyhow::Context as _;
use axum::http::StatusCode;
use once_cell::sync::Lazy;
use tera::{Context, Tera};

use crate::config::Config;
use crate::errors::AppError;
use crate::resolver::ResolvedSecrets;

static PAGES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template("index.html", include_str!("templates/index.html.tera"))
        .expect("index template is malformed");
    tera.add_raw_template("about.html", include_str!("templates/about.html.tera"))
        .expect("about template is malformed");
    tera.add_raw_template("error.html", include_str!("templates/error.html.tera"))
        .expect("error template is malformed");
    tera
});

/// Render the index page: the display values plus the resolved name/value
/// table, in request order.
pub fn render_index(config: &Config, secrets: &ResolvedSecrets) -> Result<String, AppError> {
    let rows: Vec<serde_json::Value> = secrets
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "value": s.value.expose(),
            })
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("title", &config.site_title);
    ctx.insert("environment", &config.environment);
    ctx.insert("mode", config.deployment_mode().as_str());
    ctx.insert("secrets", &rows);

    Ok(PAGES
        .render("index.html", &ctx)
        .context("failed to render index page")?)
}

pub fn render_about(config: &Config) -> Result<String, AppError> {
    let mut ctx = Context::new();
    ctx.insert("title", &config.site_title);
    ctx.insert("mode", config.deployment_mode().as_str());

    Ok(PAGES
        .render("about.html", &ctx)
        .context("failed to render about page")?)
}

/// Render the error page. Falls back to plain text if the template engine
/// itself fails, so errors always produce a response.
pub fn render_error(status: StatusCode, code: &str, message: &str) -> String {
    let mut ctx = Context::new();
    ctx.insert("status", &status.as_u16());
    ctx.insert("reason", status.canonical_reason().unwrap_or("error"));
    ctx.insert("code", code);
    ctx.insert("message", message);

    match PAGES.render("error.html", &ctx) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("failed to render error page: {}", e);
            format!("{} {}: {}", status.as_u16(), code, message)
        }
    }
}
