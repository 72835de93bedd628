use std::fmt;
use std::io::Read;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::debug;

use crate::forms::{FormMethod, FormSubmission};
use crate::settings::DownloadSettings;

pub struct HtmlPage {
    pub url: Url,
    pub body: String,
}

pub struct BinaryPage {
    pub url: Url,
    pub body: Box<dyn Read>,
}

/// A response, classified the only way the login flow cares about.
pub enum Page {
    Html(HtmlPage),
    Binary(BinaryPage),
}

impl Page {
    pub fn url(&self) -> &Url {
        match self {
            Self::Html(page) => &page.url,
            Self::Binary(page) => &page.url,
        }
    }
}

impl fmt::Debug for BinaryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryPage")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html(page) => f.debug_tuple("Html").field(&page.url.as_str()).finish(),
            Self::Binary(page) => fmt::Debug::fmt(page, f),
        }
    }
}

/// Stateful browsing session: cookies set by one response are sent with the
/// next request.
pub trait WebSession {
    fn get(&mut self, url: &Url) -> Result<Page>;
    fn submit(&mut self, submission: &FormSubmission) -> Result<Page>;
}

/// Plain HTTP client session. Pages are never scripted or styled; only the
/// markup and form controls are read.
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn new(settings: &DownloadSettings) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> Result<Page> {
        let response = request
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("request to {url} was rejected"))?;
        classify_response(response)
    }
}

impl WebSession for HttpSession {
    fn get(&mut self, url: &Url) -> Result<Page> {
        debug!(%url, "GET");
        self.send(self.client.get(url.clone()), url)
    }

    fn submit(&mut self, submission: &FormSubmission) -> Result<Page> {
        let url = &submission.action;
        debug!(%url, method = ?submission.method, "submitting form");
        let request = match submission.method {
            FormMethod::Get => self.client.get(url.clone()).query(&submission.fields),
            FormMethod::Post => self.client.post(url.clone()).form(&submission.fields),
        };
        self.send(request, url)
    }
}

fn classify_response(response: Response) -> Result<Page> {
    let url = response.url().clone();
    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_html_content_type);

    if is_html {
        let body = response
            .text()
            .with_context(|| format!("failed to read page body from {url}"))?;
        return Ok(Page::Html(HtmlPage { url, body }));
    }

    Ok(Page::Binary(BinaryPage {
        url,
        body: Box::new(response),
    }))
}

pub(crate) fn is_html_content_type(value: &str) -> bool {
    let mime = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
