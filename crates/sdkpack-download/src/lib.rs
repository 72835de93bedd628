mod cache;
mod catalog;
mod credentials;
mod engine;
mod forms;
mod layout;
mod login;
mod session;
mod settings;

pub use cache::{BundleKey, BundleSource, LocalCache};
pub use catalog::{CatalogProvider, FileCatalog};
pub use credentials::Credentials;
pub use engine::{AuthenticatedSource, DownloadEngine};
pub use forms::{FormMethod, FormSubmission, HtmlForm};
pub use layout::{default_user_prefix, PrefixLayout};
pub use login::{
    follow_login_flow, LOGIN_FORM, MAX_HTML_PAGES, MAX_LOGIN_ATTEMPTS, PASSWORD_FIELD,
    PRE_AUTH_FORM, USERNAME_FIELD,
};
pub use session::{BinaryPage, HtmlPage, HttpSession, Page, WebSession};
pub use settings::{DownloadSettings, DEFAULT_CREDENTIAL_URL, DEFAULT_SSO_HOST};

#[cfg(test)]
mod tests;
