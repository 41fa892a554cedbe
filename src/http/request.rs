use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ServerError;

/// Request method. Tokens outside the common set are kept as [`Method::Other`]
/// so they can still be routed.
#[derive(Eq, Hash, PartialEq, Clone, Debug)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
            Method::Other(token) => token.as_str(),
        }
    }
}

// RFC 9110 token characters.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

impl FromStr for Method {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "HEAD" => Ok(Method::HEAD),
            "CONNECT" => Ok(Method::CONNECT),
            "OPTIONS" => Ok(Method::OPTIONS),
            "TRACE" => Ok(Method::TRACE),
            "PATCH" => Ok(Method::PATCH),
            other if is_token(other) => Ok(Method::Other(other.to_string())),
            other => Err(ServerError::BadRequest(format!("invalid method {:?}", other))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Body {
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

impl Body {
    pub fn new() -> Body {
        Body::default()
    }

    pub fn from_string(s: &str) -> Body {
        Body {
            content_type: "text/plain".to_string(),
            data: s.as_bytes().to_vec(),
        }
    }

    pub fn with_content_type(content_type: &str, data: Vec<u8>) -> Body {
        Body {
            content_type: content_type.to_string(),
            data,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn json<T>(&self) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if self.content_type.starts_with("application/json") {
            serde_json::from_slice(&self.data).ok()
        } else {
            None
        }
    }

    /// Decodes an `application/x-www-form-urlencoded` body into a flat map.
    /// Any other content type yields an empty map.
    pub fn form(&self) -> Result<HashMap<String, String>, ServerError> {
        if !self.content_type.starts_with("application/x-www-form-urlencoded") {
            return Ok(HashMap::new());
        }
        parse_urlencoded(&String::from_utf8_lossy(&self.data))
    }
}

/// Percent-decodes `key=value&key=value` pairs; `+` is treated as a space.
pub(crate) fn parse_urlencoded(input: &str) -> Result<HashMap<String, String>, ServerError> {
    let mut pairs = HashMap::new();
    for pair in input.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        let value = decode_component(value)?;
        pairs.entry(key).or_insert(value);
    }
    Ok(pairs)
}

fn decode_component(raw: &str) -> Result<String, ServerError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ServerError::BadRequest(format!("invalid percent-encoding in {:?}", raw)))
}

/// The incoming-request descriptor handed to the dispatch core.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Body,
}

impl Request {
    /// Builds a request for `target`. The path part is percent-decoded; the
    /// query part is decoded into [`Request::query`].
    pub fn new(method: Method, target: &str) -> Request {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_urlencoded(query).unwrap_or_default()),
            None => (target, HashMap::new()),
        };
        Request {
            method,
            path: String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned(),
            query,
            headers: HashMap::new(),
            body: Body::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_splits_path_and_query() {
        let req = Request::new(Method::GET, "/search?q=rust+trie&page=2");
        assert_eq!(req.path, "/search");
        assert_eq!(req.query.get("q").map(String::as_str), Some("rust trie"));
        assert_eq!(req.query.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn form_body_is_percent_decoded() {
        let body = Body::with_content_type(
            "application/x-www-form-urlencoded",
            b"name=J%C3%BCrgen&city=New+York&flag".to_vec(),
        );
        let form = body.form().unwrap();
        assert_eq!(form["name"], "Jürgen");
        assert_eq!(form["city"], "New York");
        assert_eq!(form["flag"], "");
    }

    #[test]
    fn form_ignores_other_content_types() {
        let body = Body::from_string("name=value");
        assert!(body.form().unwrap().is_empty());
    }

    #[test]
    fn extension_methods_are_kept() {
        assert_eq!("PATCH".parse::<Method>().unwrap(), Method::PATCH);
        let purge: Method = "PURGE".parse().unwrap();
        assert_eq!(purge, Method::Other("PURGE".to_string()));
        assert_eq!(purge.to_string(), "PURGE");
    }

    #[test]
    fn malformed_method_is_rejected() {
        assert!("GE(T".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn path_is_percent_decoded() {
        let req = Request::new(Method::GET, "/hello/J%C3%BCrgen%20X?q=a%20b");
        assert_eq!(req.path, "/hello/Jürgen X");
        assert_eq!(req.query["q"], "a b");

        let plus = Request::new(Method::GET, "/a+b");
        assert_eq!(plus.path, "/a+b");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(Method::GET, "/").header("X-Token", "abc");
        assert_eq!(req.get_header("x-token"), Some("abc"));
        assert_eq!(req.get_header("X-TOKEN"), Some("abc"));
    }
}
