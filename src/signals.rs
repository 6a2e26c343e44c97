//! Signal extraction: turns an inbound reader request into the facts the
//! decision needs.
//!
//! Identity and preview detection are injected capabilities so the engine
//! never reaches for request-scoped globals.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

/// Transport-neutral view of a reader request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderRequest {
    /// Explicit request fields, e.g. the query string.
    pub params: HashMap<String, String>,
    /// Raw request body, expected to be a JSON object when present.
    pub body: Option<String>,
    /// Referring page URL.
    pub referer: Option<String>,
    /// Raw `Cookie` header.
    pub cookie: Option<String>,
}

impl ReaderRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

/// Resolves the reader when the request does not name one explicitly.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, request: &ReaderRequest) -> Option<String>;
}

/// Reads the reader id from a named cookie.
#[derive(Debug, Clone)]
pub struct CookieIdentity {
    cookie_name: String,
}

impl CookieIdentity {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl IdentityResolver for CookieIdentity {
    fn resolve(&self, request: &ReaderRequest) -> Option<String> {
        let header = request.cookie.as_deref()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == self.cookie_name)
            .map(|(_, value)| form_decode(value.trim().trim_matches('"')))
            .filter(|value| !value.is_empty())
    }
}

/// Never resolves an implicit identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

impl IdentityResolver for NoIdentity {
    fn resolve(&self, _request: &ReaderRequest) -> Option<String> {
        None
    }
}

/// Decides from the referring page whether an editor is previewing a prompt.
pub trait PreviewModePredicate: Send + Sync {
    /// Id of the prompt being previewed, if the referer is a preview page.
    fn previewed_prompt(&self, referer: &str) -> Option<String>;
}

/// Preview pages carry the previewed prompt id in a query parameter.
#[derive(Debug, Clone)]
pub struct QueryParamPreview {
    param: String,
}

impl QueryParamPreview {
    #[must_use]
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

impl PreviewModePredicate for QueryParamPreview {
    fn previewed_prompt(&self, referer: &str) -> Option<String> {
        let parsed = url::Url::parse(referer).ok()?;
        parsed
            .query_pairs()
            .find(|(name, _)| name == self.param.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.trim().is_empty())
    }
}

/// Everything the engine knows about one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    pub reader_id: Option<String>,
    pub prompt_id: Option<String>,
    pub page_url: Option<String>,
    pub is_preview: bool,
    pub suppress_forever: bool,
    pub mailing_list_subscribed: bool,
    pub referer_url: Option<String>,
}

/// Reader and prompt a request's state lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTarget<'a> {
    pub reader_id: &'a str,
    pub prompt_id: &'a str,
}

impl Signals {
    /// The state target exists only when reader, prompt and page are all
    /// known.
    #[must_use]
    pub fn state_target(&self) -> Option<StateTarget<'_>> {
        let reader_id = self.reader_id.as_deref()?;
        let prompt_id = self.prompt_id.as_deref()?;
        self.page_url.as_ref()?;
        Some(StateTarget {
            reader_id,
            prompt_id,
        })
    }
}

pub struct SignalExtractor {
    identity: Arc<dyn IdentityResolver>,
    preview: Arc<dyn PreviewModePredicate>,
}

impl SignalExtractor {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityResolver>, preview: Arc<dyn PreviewModePredicate>) -> Self {
        Self { identity, preview }
    }

    #[must_use]
    pub fn extract(&self, request: &ReaderRequest) -> Signals {
        let body = parse_body(request.body.as_deref());
        let field = |name: &str| lookup(request, body.as_ref(), name);

        let reader_id = field("rid")
            .map(Cow::into_owned)
            .or_else(|| self.identity.resolve(request));
        let prompt_id = field("popup_id").map(Cow::into_owned);
        let page_url = field("url").map(|raw| form_decode(&raw));

        let suppress_forever = request
            .params
            .get("suppress_forever")
            .map(|raw| is_truthy_str(raw))
            .or_else(|| body.as_ref()?.get("suppress_forever").map(is_truthy_value))
            .unwrap_or(false);
        let mailing_list_subscribed =
            field("mailing_list_status").is_some_and(|status| status == "subscribed");

        let referer_url = request
            .referer
            .as_deref()
            .map(str::trim)
            .filter(|referer| !referer.is_empty())
            .map(str::to_string);
        let is_preview = referer_url
            .as_deref()
            .and_then(|referer| self.preview.previewed_prompt(referer))
            .is_some();

        Signals {
            reader_id,
            prompt_id,
            page_url,
            is_preview,
            suppress_forever,
            mailing_list_subscribed,
            referer_url,
        }
    }
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(CookieIdentity::new("amp-access")),
            Arc::new(QueryParamPreview::new("preview_prompt_id")),
        )
    }
}

fn parse_body(raw: Option<&str>) -> Option<Map<String, Value>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("reader request body is not a JSON object; ignoring it");
            None
        }
        Err(err) => {
            warn!(error = %err, "reader request body is not valid JSON; ignoring it");
            None
        }
    }
}

/// Explicit field first, then the body. Empty values count as absent.
fn lookup<'a>(
    request: &'a ReaderRequest,
    body: Option<&Map<String, Value>>,
    name: &str,
) -> Option<Cow<'a, str>> {
    if let Some(value) = request.params.get(name).map(|v| v.trim()) {
        if !value.is_empty() {
            return Some(Cow::Borrowed(value));
        }
    }
    let value = match body?.get(name)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(Cow::Owned(value))
}

fn is_truthy_str(raw: &str) -> bool {
    let raw = raw.trim();
    !(raw.is_empty() || raw == "0" || raw.eq_ignore_ascii_case("false"))
}

fn is_truthy_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => is_truthy_str(s),
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Decodes with form semantics: `+` is a space, then percent escapes.
///
/// Invalid escapes leave the input as-is.
#[must_use]
pub fn form_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
