//! Point-in-time view of a page: hostname, visible text, forms and referenced resources.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::error::GuardError;

const HIDDEN_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub tag: String,
    pub name: String,
    pub field_type: String,
    pub id: String,
    pub autocomplete: String,
}

impl FieldSnapshot {
    pub fn input(name: &str, field_type: &str) -> Self {
        Self {
            tag: "input".into(),
            name: name.into(),
            field_type: field_type.into(),
            ..Self::default()
        }
    }

    /// Lower-cased name, id, type and autocomplete hint joined for pattern matching.
    pub fn descriptor(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name, self.id, self.field_type, self.autocomplete
        )
        .to_lowercase()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormSnapshot {
    /// Visible text inside the form, whitespace-collapsed.
    pub text: String,
    /// Raw `action` attribute; empty when absent.
    pub action: String,
    pub fields: Vec<FieldSnapshot>,
}

impl FormSnapshot {
    pub fn new(text: &str, action: &str) -> Self {
        Self {
            text: text.into(),
            action: action.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSnapshot) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub hostname: String,
    pub scheme: String,
    pub body_text: String,
    pub forms: Vec<FormSnapshot>,
    /// `src`/`href` values of sub-resources, used for the mixed-content check.
    pub resources: Vec<String>,
}

impl PageSnapshot {
    /// A page with no content yet; hostname is taken from `url`.
    pub fn new(url: &str) -> Result<Self, GuardError> {
        let parsed = Url::parse(url).map_err(|e| GuardError::Parse(format!("{url}: {e}")))?;
        let hostname = parsed
            .host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GuardError::Parse(format!("{url}: no hostname")))?;
        Ok(Self {
            url: parsed.to_string(),
            hostname,
            scheme: parsed.scheme().to_string(),
            body_text: String::new(),
            forms: Vec::new(),
            resources: Vec::new(),
        })
    }

    pub fn parse(url: &str, html: &str) -> Result<Self, GuardError> {
        let mut page = Self::new(url)?;
        let document = Html::parse_document(html);

        let body_sel = selector("body")?;
        page.body_text = match document.select(&body_sel).next() {
            Some(body) => visible_text(body),
            None => visible_text(document.root_element()),
        };

        let form_sel = selector("form")?;
        let field_sel = selector("input, select, textarea")?;
        for form in document.select(&form_sel) {
            let fields = form
                .select(&field_sel)
                .map(|field| FieldSnapshot {
                    tag: field.value().name().to_string(),
                    name: attr(&field, "name"),
                    field_type: attr(&field, "type").to_lowercase(),
                    id: attr(&field, "id"),
                    autocomplete: attr(&field, "autocomplete"),
                })
                .collect();
            page.forms.push(FormSnapshot {
                text: visible_text(form),
                action: attr(&form, "action").trim().to_string(),
                fields,
            });
        }

        let resource_sel = selector(
            "script[src], img[src], iframe[src], audio[src], video[src], source[src], embed[src], link[href]",
        )?;
        for el in document.select(&resource_sel) {
            let value = el
                .value()
                .attr("src")
                .or_else(|| el.value().attr("href"))
                .unwrap_or("")
                .trim();
            if !value.is_empty() {
                page.resources.push(value.to_string());
            }
        }

        Ok(page)
    }

    pub fn with_body_text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    pub fn with_form(mut self, form: FormSnapshot) -> Self {
        self.forms.push(form);
        self
    }

    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resources.push(resource.to_string());
        self
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    pub fn has_mixed_content(&self) -> bool {
        self.resources
            .iter()
            .any(|r| r.to_ascii_lowercase().starts_with("http://"))
    }

    /// Forms in `self` that were not present in `previous`.
    pub fn new_forms_since(&self, previous: &PageSnapshot) -> usize {
        self.forms
            .iter()
            .filter(|f| !previous.forms.contains(f))
            .count()
    }
}

fn selector(css: &str) -> Result<Selector, GuardError> {
    Selector::parse(css).map_err(|e| GuardError::Parse(format!("selector {css}: {e:?}")))
}

fn attr(el: &ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or("").to_string()
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
            .map(|name| HIDDEN_TEXT_PARENTS.contains(&name.as_str()))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
