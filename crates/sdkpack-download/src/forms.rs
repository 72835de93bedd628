use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(method) if method.trim().eq_ignore_ascii_case("post") => Self::Post,
            _ => Self::Get,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub method: FormMethod,
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

/// Named HTML form with its successful controls in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlForm {
    pub name: String,
    pub action: String,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

impl HtmlForm {
    pub fn find(body: &str, form_name: &str) -> Result<Option<Self>> {
        let document = Html::parse_document(body);
        let forms = selector("form")?;
        let controls = selector("input, select, textarea")?;

        let Some(form) = document
            .select(&forms)
            .find(|form| form.value().attr("name") == Some(form_name))
        else {
            return Ok(None);
        };

        let fields = form
            .select(&controls)
            .filter_map(successful_control)
            .collect();

        Ok(Some(Self {
            name: form_name.to_string(),
            action: form.value().attr("action").unwrap_or("").trim().to_string(),
            method: FormMethod::parse(form.value().attr("method")),
            fields,
        }))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    /// Sets the first control called `name`; false when there is none.
    pub fn set_field(&mut self, name: &str, value: &str) -> bool {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, current)) => {
                *current = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn submission(&self, page_url: &Url) -> Result<FormSubmission> {
        let action = if self.action.is_empty() {
            page_url.clone()
        } else {
            page_url.join(&self.action).with_context(|| {
                format!(
                    "form '{}' has an invalid action '{}' on {page_url}",
                    self.name, self.action
                )
            })?
        };

        Ok(FormSubmission {
            method: self.method,
            action,
            fields: self.fields.clone(),
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow!("invalid selector '{css}': {err}"))
}

fn successful_control(control: ElementRef<'_>) -> Option<(String, String)> {
    let element = control.value();
    let name = element.attr("name").filter(|name| !name.is_empty())?;
    if element.attr("disabled").is_some() {
        return None;
    }

    match element.name() {
        "input" => {
            let kind = element
                .attr("type")
                .unwrap_or("text")
                .trim()
                .to_ascii_lowercase();
            match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => None,
                "checkbox" | "radio" => element
                    .attr("checked")
                    .map(|_| (name.to_string(), element.attr("value").unwrap_or("on").to_string())),
                _ => Some((
                    name.to_string(),
                    element.attr("value").unwrap_or("").to_string(),
                )),
            }
        }
        "select" => {
            let options = Selector::parse("option").ok()?;
            let mut all = control.select(&options);
            let chosen = control
                .select(&options)
                .find(|option| option.value().attr("selected").is_some())
                .or_else(|| all.next())?;
            let value = chosen
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| chosen.text().collect::<String>().trim().to_string());
            Some((name.to_string(), value))
        }
        "textarea" => Some((name.to_string(), control.text().collect())),
        _ => None,
    }
}
