use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Cursor, Read, Write};

use anyhow::{anyhow, Result};
use reqwest::Url;
use sdkpack_core::{
    find_install_error, ArtifactFile, Cpu, Family, InstallError, Platform, Release, ReleaseCatalog,
};

use super::*;
use crate::session::is_html_content_type;

const SSO: &str = "https://login.oracle.com/mysso/signon.jsp";

fn url(raw: &str) -> Url {
    Url::parse(raw).expect("valid url")
}

fn html(at: &str, body: &str) -> Page {
    Page::Html(HtmlPage {
        url: url(at),
        body: body.to_string(),
    })
}

fn binary(at: &str, bytes: &[u8]) -> Page {
    Page::Binary(BinaryPage {
        url: url(at),
        body: Box::new(Cursor::new(bytes.to_vec())),
    })
}

fn pre_auth_page() -> String {
    r#"<html><body>
        <form name="myForm" method="post" action="/oam/server/sso/auth_cred_submit">
            <input type="hidden" name="site2pstoretoken" value="v1.2~token" />
            <input type="text" name="ssousername" value="" />
            <input type="submit" name="go" value="Continue" />
        </form>
    </body></html>"#
        .to_string()
}

fn login_page() -> String {
    r#"<html><body>
        <form name="LoginForm" method="POST" action="https://login.oracle.com/oam/server/sso/auth_cred_submit">
            <input type="hidden" name="request_id" value="42" />
            <input type="text" name="ssousername" />
            <input type="password" name="password" />
            <input type="checkbox" name="remember" />
        </form>
    </body></html>"#
        .to_string()
}

#[derive(Default)]
struct ScriptedSession {
    responses: VecDeque<Page>,
    gets: Vec<Url>,
    submissions: Vec<FormSubmission>,
}

impl ScriptedSession {
    fn new(responses: Vec<Page>) -> Self {
        Self {
            responses: responses.into(),
            ..Self::default()
        }
    }

    fn next(&mut self) -> Result<Page> {
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response left"))
    }
}

impl WebSession for ScriptedSession {
    fn get(&mut self, url: &Url) -> Result<Page> {
        self.gets.push(url.clone());
        self.next()
    }

    fn submit(&mut self, submission: &FormSubmission) -> Result<Page> {
        self.submissions.push(submission.clone());
        self.next()
    }
}

fn read_all(mut reader: Box<dyn Read>) -> Vec<u8> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).expect("readable stream");
    bytes
}

fn credentials() -> Credentials {
    Credentials::new("builder@example.test", "s3cret")
}

fn run_flow(
    session: &mut ScriptedSession,
    first: Page,
    credentials: Option<&Credentials>,
) -> (Result<BinaryPage>, String) {
    let mut out = Vec::new();
    let result = follow_login_flow(
        session,
        first,
        &DownloadSettings::default(),
        credentials,
        &mut out,
    );
    (result, String::from_utf8(out).expect("utf8 output"))
}

fn field<'a>(submission: &'a FormSubmission, name: &str) -> Option<&'a str> {
    submission
        .fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[test]
fn direct_binary_response_skips_login() {
    let mut session = ScriptedSession::new(Vec::new());
    let (result, out) = run_flow(
        &mut session,
        binary("https://download.example.test/jdk.tar.gz", b"\x1f\x8bbits"),
        None,
    );
    let page = result.expect("binary page is terminal");
    assert_eq!(read_all(page.body), b"\x1f\x8bbits");
    assert!(session.submissions.is_empty());
    assert!(out.is_empty());
}

#[test]
fn pre_auth_then_login_then_binary() {
    let mut session = ScriptedSession::new(vec![
        html(SSO, &login_page()),
        binary("https://edelivery.example.test/jdk.tar.gz?token=1", b"payload"),
    ]);
    let creds = credentials();
    let (result, _) = run_flow(&mut session, html(SSO, &pre_auth_page()), Some(&creds));

    let page = result.expect("flow should reach the download");
    assert_eq!(read_all(page.body), b"payload");
    assert_eq!(session.submissions.len(), 2);

    let pre_auth = &session.submissions[0];
    assert_eq!(pre_auth.method, FormMethod::Post);
    assert_eq!(
        pre_auth.action.as_str(),
        "https://login.oracle.com/oam/server/sso/auth_cred_submit"
    );
    assert_eq!(field(pre_auth, "ssousername"), Some("builder@example.test"));
    assert_eq!(field(pre_auth, "site2pstoretoken"), Some("v1.2~token"));
    assert_eq!(field(pre_auth, "go"), None);

    let login = &session.submissions[1];
    assert_eq!(field(login, "ssousername"), Some("builder@example.test"));
    assert_eq!(field(login, "password"), Some("s3cret"));
    assert_eq!(field(login, "request_id"), Some("42"));
    assert_eq!(field(login, "remember"), None);
}

#[test]
fn pre_auth_form_is_submitted_without_credentials() {
    let mut session = ScriptedSession::new(vec![binary(
        "https://download.example.test/jdk.bin",
        b"bits",
    )]);
    let (result, _) = run_flow(&mut session, html(SSO, &pre_auth_page()), None);
    result.expect("pre-auth does not need an account");
    assert_eq!(field(&session.submissions[0], "ssousername"), Some(""));
}

#[test]
fn login_form_without_credentials_requires_authentication() {
    let mut session = ScriptedSession::new(Vec::new());
    let (result, out) = run_flow(&mut session, html(SSO, &login_page()), None);

    let err = result.expect_err("credentials are required");
    assert!(matches!(
        find_install_error(&err),
        Some(InstallError::AuthenticationRequired { credential_url }) if credential_url == crate::settings::DEFAULT_CREDENTIAL_URL
    ));
    assert!(out.contains("Please specify your username/password"));
    assert!(session.submissions.is_empty());
}

#[test]
fn rejected_credentials_stop_after_four_attempts() {
    let mut responses = Vec::new();
    for _ in 0..MAX_LOGIN_ATTEMPTS {
        responses.push(html(SSO, &login_page()));
    }
    let mut session = ScriptedSession::new(responses);
    let creds = credentials();
    let (result, out) = run_flow(&mut session, html(SSO, &login_page()), Some(&creds));

    let err = result.expect_err("bad account must give up");
    assert!(matches!(
        find_install_error(&err),
        Some(InstallError::AuthenticationFailed { attempts: 4, .. })
    ));
    assert_eq!(session.submissions.len(), MAX_LOGIN_ATTEMPTS as usize);
    assert!(out.contains("doesn't appear valid"));
}

#[test]
fn endless_login_pages_are_a_protocol_violation() {
    let mut responses = Vec::new();
    for _ in 0..MAX_HTML_PAGES + 4 {
        responses.push(html(SSO, &pre_auth_page()));
    }
    let mut session = ScriptedSession::new(responses);
    let (result, _) = run_flow(&mut session, html(SSO, &pre_auth_page()), None);

    let err = result.expect_err("loop must terminate");
    assert!(matches!(
        find_install_error(&err),
        Some(InstallError::ProtocolViolation(_))
    ));
    assert_eq!(session.submissions.len(), MAX_HTML_PAGES as usize);
}

#[test]
fn html_from_unexpected_host_is_a_protocol_violation() {
    let mut session = ScriptedSession::new(Vec::new());
    let (result, _) = run_flow(
        &mut session,
        html("https://www.example.test/downloads/error.html", "<html></html>"),
        Some(&credentials()),
    );

    let err = result.expect_err("only the sso host may serve html");
    match find_install_error(&err) {
        Some(InstallError::ProtocolViolation(message)) => {
            assert!(message.contains("www.example.test"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn page_without_known_form_reports_its_content() {
    let body = "<html><body><p>maintenance</p></body></html>";
    let mut session = ScriptedSession::new(Vec::new());
    let (result, _) = run_flow(&mut session, html(SSO, body), Some(&credentials()));

    let err = result.expect_err("unknown page");
    match find_install_error(&err) {
        Some(InstallError::ProtocolViolation(message)) => assert!(message.contains("maintenance")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn form_lookup_resolves_relative_actions_and_defaults() {
    let body = r#"<form name="probe"><input name="a" value="1"><input name="b" disabled value="2">
        <select name="c"><option value="x">X</option><option value="y" selected>Y</option></select>
        <textarea name="d">note</textarea><input type="radio" name="e" value="r1" checked></form>"#;
    let form = HtmlForm::find(body, "probe")
        .expect("parse")
        .expect("form exists");
    assert_eq!(form.method, FormMethod::Get);
    assert_eq!(
        form.fields,
        vec![
            ("a".to_string(), "1".to_string()),
            ("c".to_string(), "y".to_string()),
            ("d".to_string(), "note".to_string()),
            ("e".to_string(), "r1".to_string()),
        ]
    );

    let page = url("https://login.oracle.com/mysso/signon.jsp?x=1");
    let submission = form.submission(&page).expect("submission");
    assert_eq!(submission.action, page);

    assert!(HtmlForm::find(body, "missing").expect("parse").is_none());
}

#[test]
fn set_field_reports_missing_controls() {
    let mut form = HtmlForm::find(&pre_auth_page(), PRE_AUTH_FORM)
        .expect("parse")
        .expect("form exists");
    assert!(form.set_field(USERNAME_FIELD, "someone"));
    assert!(!form.set_field(PASSWORD_FIELD, "secret"));
}

#[test]
fn html_content_types_are_detected() {
    assert!(is_html_content_type("text/html"));
    assert!(is_html_content_type("text/html; charset=UTF-8"));
    assert!(is_html_content_type("application/xhtml+xml"));
    assert!(!is_html_content_type("application/x-gzip"));
    assert!(!is_html_content_type("application/octet-stream"));
}

#[test]
fn credentials_debug_redacts_password() {
    let rendered = format!("{:?}", credentials());
    assert!(rendered.contains("builder@example.test"));
    assert!(!rendered.contains("s3cret"));
}

#[test]
fn credentials_need_both_halves() {
    assert!(Credentials::from_parts(Some("user".to_string()), None).is_none());
    assert!(Credentials::from_parts(None, Some("pw".to_string())).is_none());
    assert!(Credentials::from_parts(Some(" ".to_string()), Some("pw".to_string())).is_none());
    let creds = Credentials::from_parts(Some("user".to_string()), Some("pw".to_string()))
        .expect("configured");
    assert_eq!(creds.username(), "user");
    assert_eq!(creds.password(), "pw");
}

fn artifact(name: &str) -> ArtifactFile {
    ArtifactFile {
        name: name.to_string(),
        title: name.to_string(),
        download_path: format!("https://download.example.test/otn/{name}"),
    }
}

fn catalog(files: Vec<ArtifactFile>) -> ReleaseCatalog {
    ReleaseCatalog {
        version: 1,
        data: vec![Family {
            name: "JDK 7".to_string(),
            releases: vec![Release {
                id: "jdk-7u80".to_string(),
                title: "Java SE Development Kit 7u80".to_string(),
                files,
            }],
        }],
    }
}

#[test]
fn engine_reports_empty_catalog_as_not_found() {
    let engine = DownloadEngine::new(ReleaseCatalog::default(), DownloadSettings::default());
    let err = engine
        .choose_artifact("jdk-7u80", Platform::Linux, Cpu::X86_64)
        .expect_err("empty catalog");
    assert!(matches!(find_install_error(&err), Some(InstallError::NotFound(_))));
}

#[test]
fn engine_reports_unknown_release_as_not_found() {
    let engine = DownloadEngine::new(
        catalog(vec![artifact("jdk-7u80-linux-x64.tar.gz")]),
        DownloadSettings::default(),
    );
    let err = engine
        .choose_artifact("jdk-8u5", Platform::Linux, Cpu::X86_64)
        .expect_err("unknown release");
    match find_install_error(&err) {
        Some(InstallError::NotFound(message)) => assert!(message.contains("jdk-8u5")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn engine_picks_x64_bundle_for_64_bit_linux() {
    let engine = DownloadEngine::new(
        catalog(vec![
            artifact("jdk-7-linux-i586.tar.gz"),
            artifact("jdk-7-linux-x64.tar.gz"),
        ]),
        DownloadSettings::default(),
    );
    let chosen = engine
        .choose_artifact("jdk-7u80", Platform::Linux, Cpu::X86_64)
        .expect("match");
    assert_eq!(chosen.name, "jdk-7-linux-x64.tar.gz");
}

#[test]
fn engine_fails_without_compatible_artifact() {
    let engine = DownloadEngine::new(
        catalog(vec![artifact("jdk-7-solaris-sparc.tar.gz")]),
        DownloadSettings::default(),
    );
    let err = engine
        .choose_artifact("jdk-7u80", Platform::Windows, Cpu::X86_32)
        .expect_err("nothing fits");
    assert!(matches!(
        find_install_error(&err),
        Some(InstallError::NoCompatibleArtifact {
            platform: Platform::Windows,
            cpu: Cpu::X86_32
        })
    ));
}

#[test]
fn engine_downloads_through_session() {
    let engine = DownloadEngine::new(
        catalog(vec![artifact("jdk-7-linux-x64.tar.gz")]),
        DownloadSettings::default(),
    );
    let mut session = ScriptedSession::new(vec![
        html(SSO, &login_page()),
        binary("https://download.example.test/otn/jdk-7-linux-x64.tar.gz", b"jdk"),
    ]);
    let creds = credentials();
    let mut out = Vec::new();

    let stream = engine
        .resolve_with_session(
            &mut session,
            "jdk-7u80@CDS-CDS_Developer",
            Platform::Linux,
            Cpu::X86_64,
            Some(&creds),
            &mut out,
        )
        .expect("download");

    assert_eq!(read_all(stream), b"jdk");
    assert_eq!(
        session.gets,
        vec![url("https://download.example.test/otn/jdk-7-linux-x64.tar.gz")]
    );
    let out = String::from_utf8(out).expect("utf8");
    assert!(out.contains("Downloading JDK from https://download.example.test/otn/jdk-7-linux-x64.tar.gz"));
}

#[test]
fn file_catalog_treats_missing_file_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = FileCatalog::new(dir.path().join("jdk.json"));
    assert!(provider.load_catalog().expect("load").is_empty());
}

#[test]
fn file_catalog_reads_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("jdk.json");
    fs::write(
        &path,
        r#"{"version":1,"data":[{"name":"JDK 7","releases":[{"name":"jdk-7u80","title":"7u80","files":[]}]}]}"#,
    )
    .expect("write catalog");
    let loaded = FileCatalog::new(&path).load_catalog().expect("load");
    assert!(loaded.release("jdk-7u80").is_some());
}

#[test]
fn file_catalog_rejects_malformed_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("jdk.json");
    fs::write(&path, "{not json").expect("write catalog");
    let err = FileCatalog::new(&path)
        .load_catalog()
        .expect_err("malformed");
    assert!(format!("{err:#}").contains("jdk.json"));
}

struct CountingSource {
    calls: Cell<u32>,
    payload: Vec<u8>,
}

impl CountingSource {
    fn new(payload: &[u8]) -> Self {
        Self {
            calls: Cell::new(0),
            payload: payload.to_vec(),
        }
    }
}

impl BundleSource for CountingSource {
    fn open_bundle(&self, _key: &BundleKey, _out: &mut dyn Write) -> Result<Box<dyn Read>> {
        self.calls.set(self.calls.get() + 1);
        Ok(Box::new(Cursor::new(self.payload.clone())))
    }
}

/// Yields some bytes, then fails mid-stream.
struct TruncatedReader {
    sent: bool,
}

impl Read for TruncatedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.sent {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        self.sent = true;
        let chunk = b"partial-bytes";
        buf[..chunk.len()].copy_from_slice(chunk);
        Ok(chunk.len())
    }
}

struct TruncatingSource;

impl BundleSource for TruncatingSource {
    fn open_bundle(&self, _key: &BundleKey, _out: &mut dyn Write) -> Result<Box<dyn Read>> {
        Ok(Box::new(TruncatedReader { sent: false }))
    }
}

struct FailingSource {
    seen: RefCell<Vec<BundleKey>>,
}

impl BundleSource for FailingSource {
    fn open_bundle(&self, key: &BundleKey, _out: &mut dyn Write) -> Result<Box<dyn Read>> {
        self.seen.borrow_mut().push(key.clone());
        Err(InstallError::NotFound("Unable to find JDK with ID=jdk-7u80".to_string()).into())
    }
}

fn dir_entries(path: &std::path::Path) -> Vec<String> {
    let mut names = fs::read_dir(path)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn cache_path_is_derived_from_platform_cpu_and_release() {
    let layout = PrefixLayout::new("/srv/sdkpack");
    let cache = LocalCache::new(layout.clone());
    let key = BundleKey::new(Platform::Linux, Cpu::X86_64, "jdk-7u80");
    assert_eq!(
        cache.cache_path(&key).expect("path"),
        layout
            .bundles_cache_dir()
            .join("LINUX")
            .join("X86_64")
            .join("jdk-7u80")
    );
}

#[test]
fn cache_rejects_release_ids_that_escape_the_cache() {
    let cache = LocalCache::new(PrefixLayout::new("/srv/sdkpack"));
    for id in ["", "..", "../etc", "a/b", "a\\b"] {
        assert!(
            cache
                .cache_path(&BundleKey::new(Platform::Linux, Cpu::X86_64, id))
                .is_err(),
            "id {id:?}"
        );
    }
}

#[test]
fn cache_hit_skips_the_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = LocalCache::new(PrefixLayout::new(dir.path()));
    let key = BundleKey::new(Platform::Linux, Cpu::X86_64, "jdk-7u80");
    let path = cache.cache_path(&key).expect("path");
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, b"cached").expect("seed cache");

    let source = CountingSource::new(b"fresh");
    let mut out = Vec::new();
    let found = cache
        .fetch_or_download(&key, &source, &mut out)
        .expect("cache hit");

    assert_eq!(found, path);
    assert_eq!(source.calls.get(), 0);
    assert_eq!(fs::read(&path).expect("read"), b"cached");
    assert!(out.is_empty());
}

#[test]
fn cache_downloads_once_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = LocalCache::new(PrefixLayout::new(dir.path()));
    let key = BundleKey::new(Platform::Windows, Cpu::X86_32, "jdk-6u45");
    let source = CountingSource::new(b"MZ installer");
    let mut out = Vec::new();

    let first = cache
        .fetch_or_download(&key, &source, &mut out)
        .expect("download");
    let second = cache
        .fetch_or_download(&key, &source, &mut out)
        .expect("cache hit");

    assert_eq!(first, second);
    assert_eq!(source.calls.get(), 1);
    assert_eq!(fs::read(&first).expect("read"), b"MZ installer");
    assert_eq!(
        dir_entries(first.parent().expect("parent")),
        vec!["jdk-6u45".to_string()]
    );
    let out = String::from_utf8(out).expect("utf8");
    assert_eq!(out.matches("Installing JDK jdk-6u45").count(), 1);
}

#[test]
fn failed_download_leaves_no_file_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = LocalCache::new(PrefixLayout::new(dir.path()));
    let key = BundleKey::new(Platform::Linux, Cpu::X86_64, "jdk-7u80");
    let mut out = Vec::new();

    let err = cache
        .fetch_or_download(&key, &TruncatingSource, &mut out)
        .expect_err("stream breaks");
    assert!(format!("{err:#}").contains("connection reset"));

    let path = cache.cache_path(&key).expect("path");
    assert!(!path.exists());
    assert!(dir_entries(path.parent().expect("parent")).is_empty());
}

#[test]
fn failed_resolution_propagates_typed_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = LocalCache::new(PrefixLayout::new(dir.path()));
    let key = BundleKey::new(Platform::Solaris, Cpu::Sparc, "jdk-7u80");
    let source = FailingSource {
        seen: RefCell::new(Vec::new()),
    };
    let mut out = Vec::new();

    let err = cache
        .fetch_or_download(&key, &source, &mut out)
        .expect_err("resolution fails");
    assert!(matches!(find_install_error(&err), Some(InstallError::NotFound(_))));
    assert_eq!(source.seen.borrow().as_slice(), &[key.clone()]);
    assert!(!cache.cache_path(&key).expect("path").exists());
}

#[test]
fn layout_paths_hang_off_prefix() {
    let layout = PrefixLayout::new("/srv/sdkpack");
    assert_eq!(layout.cache_dir(), layout.prefix().join("cache"));
    assert_eq!(layout.bundles_cache_dir(), layout.prefix().join("cache").join("jdks"));
    assert_eq!(
        layout.default_catalog_path(),
        layout.prefix().join("catalog").join("jdk.json")
    );
    assert_eq!(layout.config_path(), layout.prefix().join("config.toml"));
}

#[test]
fn ensure_base_dirs_creates_cache_and_catalog() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = PrefixLayout::new(dir.path().join("prefix"));
    layout.ensure_base_dirs().expect("dirs");
    assert!(layout.bundles_cache_dir().is_dir());
    assert!(layout.catalog_dir().is_dir());
}
