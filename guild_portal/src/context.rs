//! Session state harvested from the portal: postback form fields and cookies.

use std::collections::BTreeMap;
use std::fmt;

use scraper::{Html, Selector};

use crate::Error;

/// Name of the portal's forms-authentication cookie.
pub const DEFAULT_AUTH_COOKIE: &str = ".ASPXAUTH";

/// Form field values harvested from an ASP.NET WebForms page.
///
/// WebForms rejects or mis-renders a postback that does not echo every
/// hidden control field, so the whole set is carried forward. Document
/// order is preserved; setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any earlier value for that name.
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.0.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.to_string();
        } else {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name/value pairs in document order, ready for form encoding.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Cookies accumulated across the requests of one report session.
///
/// Sorted by name so the rendered `Cookie` header is stable between runs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CookieJar(BTreeMap<String, String>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// A jar holding only the caller's auth cookie.
    pub fn with_auth(auth_name: &str, token: &str) -> Self {
        let mut jar = Self::new();
        jar.insert(auth_name, token);
        jar
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges cookies issued by a response, then re-applies the caller's
    /// auth token so a stale or empty server echo never replaces it.
    pub fn absorb<'a, I>(&mut self, issued: I, auth_name: &str, token: &str)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in issued {
            self.insert(name, value);
        }
        self.insert(auth_name, token);
    }

    /// Renders the jar as a `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// Cookie values are session credentials; only names are printed.
impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Everything the context GET produced for the subsequent postback.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub fields: FormFields,
    pub cookies: CookieJar,
    /// Auth cookie value the portal itself issued, before the caller's
    /// token was stamped over it. `None` when the portal did not set one.
    pub issued_auth: Option<String>,
}

fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("selector {}: {:?}", css, e)))
}

/// Returns the page title when it marks the portal's login page.
pub(crate) fn login_title(html: &Html) -> Result<Option<String>, Error> {
    let title_sel = selector("title")?;
    let title = html
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>());
    Ok(title
        .map(|t| t.trim().to_string())
        .filter(|t| t.contains("Login")))
}

/// Collects every `input` carrying both a `name` and a non-empty `value`.
pub(crate) fn harvest_fields(html: &Html) -> Result<FormFields, Error> {
    let input_sel = selector("input")?;
    let mut fields = FormFields::new();
    for input in html.select(&input_sel) {
        let name = match input.attr("name") {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        let value = match input.attr("value") {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };
        fields.set(name, value);
    }
    Ok(fields)
}

/// Parses a context page, failing if it is the login page.
pub(crate) fn parse_context_page(body: &str) -> Result<FormFields, Error> {
    let html = Html::parse_document(body);
    if let Some(title) = login_title(&html)? {
        return Err(Error::Authentication { title });
    }
    harvest_fields(&html)
}
