use std::io::Write;

use anyhow::{Context, Result};
use sdkpack_core::InstallError;
use tracing::debug;

use crate::credentials::Credentials;
use crate::forms::HtmlForm;
use crate::session::{BinaryPage, HtmlPage, Page, WebSession};
use crate::settings::DownloadSettings;

/// Script-check page shown before the real login form.
pub const PRE_AUTH_FORM: &str = "myForm";
pub const LOGIN_FORM: &str = "LoginForm";
pub const USERNAME_FIELD: &str = "ssousername";
pub const PASSWORD_FIELD: &str = "password";

pub const MAX_HTML_PAGES: u32 = 16;
pub const MAX_LOGIN_ATTEMPTS: u32 = 4;

/// Walks the single-sign-on pages that stand between a download link and
/// the bytes, starting from `first`, until a non-HTML response arrives.
pub fn follow_login_flow(
    session: &mut dyn WebSession,
    first: Page,
    settings: &DownloadSettings,
    credentials: Option<&Credentials>,
    out: &mut dyn Write,
) -> Result<BinaryPage> {
    let mut page = first;
    let mut html_pages = 0_u32;
    let mut login_attempts = 0_u32;

    loop {
        let html = match page {
            Page::Binary(binary) => return Ok(binary),
            Page::Html(html) => html,
        };

        if html.url.host_str() != Some(settings.sso_host.as_str()) {
            return Err(InstallError::ProtocolViolation(format!(
                "expected to see a login page but instead saw {}",
                html.url
            ))
            .into());
        }

        html_pages += 1;
        if html_pages > MAX_HTML_PAGES {
            return Err(InstallError::ProtocolViolation(format!(
                "gave up after {MAX_HTML_PAGES} login pages without reaching the download; last page was {}",
                html.url
            ))
            .into());
        }
        debug!(url = %html.url, page = html_pages, "login flow page");

        if let Some(mut form) = pre_auth_form(&html)? {
            if let Some(credentials) = credentials {
                form.set_field(USERNAME_FIELD, credentials.username());
            }
            page = session
                .submit(&form.submission(&html.url)?)
                .with_context(|| format!("failed to submit {PRE_AUTH_FORM} on {}", html.url))?;
            continue;
        }

        if let Some(mut form) = login_form(&html)? {
            let Some(credentials) = credentials else {
                writeln!(
                    out,
                    "The download site requires an account to download this JDK. Please specify your username/password at {}",
                    settings.credential_url
                )?;
                return Err(InstallError::AuthenticationRequired {
                    credential_url: settings.credential_url.clone(),
                }
                .into());
            };

            if login_attempts >= MAX_LOGIN_ATTEMPTS {
                writeln!(
                    out,
                    "Your account doesn't appear valid. Please specify a valid username/password at {}",
                    settings.credential_url
                )?;
                return Err(InstallError::AuthenticationFailed {
                    credential_url: settings.credential_url.clone(),
                    attempts: login_attempts,
                }
                .into());
            }
            login_attempts += 1;

            form.set_field(USERNAME_FIELD, credentials.username());
            form.set_field(PASSWORD_FIELD, credentials.password());
            page = session
                .submit(&form.submission(&html.url)?)
                .with_context(|| format!("failed to submit {LOGIN_FORM} on {}", html.url))?;
            continue;
        }

        return Err(InstallError::ProtocolViolation(format!(
            "unable to find the login form in {}",
            html.body
        ))
        .into());
    }
}

fn pre_auth_form(html: &HtmlPage) -> Result<Option<HtmlForm>> {
    Ok(HtmlForm::find(&html.body, PRE_AUTH_FORM)?
        .filter(|form| form.has_field(USERNAME_FIELD) && !form.has_field(PASSWORD_FIELD)))
}

fn login_form(html: &HtmlPage) -> Result<Option<HtmlForm>> {
    Ok(HtmlForm::find(&html.body, LOGIN_FORM)?
        .filter(|form| form.has_field(USERNAME_FIELD) && form.has_field(PASSWORD_FIELD)))
}
