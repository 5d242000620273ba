//! HTML pages, rendered with Tera from templates compiled into the binary

use crate::error::WebError;
use axum::response::Html;
use tera::{Context, Tera};

/// Outcome line shown above the upload form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", include_str!("../templates/base.html")),
            ("login.html", include_str!("../templates/login.html")),
            ("upload.html", include_str!("../templates/upload.html")),
        ])?;
        Ok(Self { tera })
    }

    pub fn login(&self, error: Option<&str>) -> Result<Html<String>, WebError> {
        let mut context = Context::new();
        context.insert("error", &error);
        Ok(Html(self.tera.render("login.html", &context)?))
    }

    pub fn upload(
        &self,
        username: &str,
        warehouse: &str,
        table: &str,
        notice: Option<&Notice>,
    ) -> Result<Html<String>, WebError> {
        let (message, error) = match notice {
            Some(Notice::Success(text)) => (Some(text.as_str()), None),
            Some(Notice::Failure(text)) => (None, Some(text.as_str())),
            None => (None, None),
        };

        let mut context = Context::new();
        context.insert("username", username);
        context.insert("warehouse", warehouse);
        context.insert("table", table);
        context.insert("message", &message);
        context.insert("error", &error);
        Ok(Html(self.tera.render("upload.html", &context)?))
    }
}
