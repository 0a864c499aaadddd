//! Request / response values passed between fetches and script hooks.
//!
//! All text conversions honour the request's character encoding: plugins for
//! legacy sites commonly declare GBK or Big5 and expect both percent-encoding
//! and body decoding to follow it.

use std::collections::BTreeMap;
use std::fmt;

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^:]+):\s*(.+)").expect("static regex"));
static FORM_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^=]+)=(.+)").expect("static regex"));

/// `application/x-www-form-urlencoded` encoding of `text` in `encoding`.
///
/// Spaces become `+`; alphanumerics and `*-._` are kept as-is.
pub fn form_encode(text: &str, encoding: &'static Encoding) -> String {
    let (bytes, _, _) = encoding.encode(text);
    url::form_urlencoded::byte_serialize(&bytes).collect()
}

/// Inverse of [`form_encode`]. Malformed escapes are kept literally.
pub fn form_decode(text: &str, encoding: &'static Encoding) -> String {
    let plus_as_space: Vec<u8> = text
        .bytes()
        .map(|b| if b == b'+' { b' ' } else { b })
        .collect();
    let bytes = urlencoding::decode_binary(&plus_as_space);
    encoding
        .decode_without_bom_handling(&bytes)
        .0
        .into_owned()
}

/// Outgoing request state shared between the host fetcher and script hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub headers: BTreeMap<String, String>,
    pub form_data: BTreeMap<String, String>,
    pub encoding: &'static Encoding,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            form_data: BTreeMap::new(),
            encoding: encoding_rs::UTF_8,
        }
    }
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the charset from a WHATWG label such as `gbk` or `utf-8`.
    ///
    /// Returns `false` and leaves the encoding untouched for unknown labels
    /// and for decode-only charsets (UTF-16, `replacement`) whose encoder
    /// would emit UTF-8 instead.
    pub fn set_encoding_label(&mut self, label: &str) -> bool {
        match Encoding::for_label(label.trim().as_bytes())
            .filter(|encoding| encoding.output_encoding() == *encoding)
        {
            Some(encoding) => {
                self.encoding = encoding;
                true
            }
            None => false,
        }
    }

    /// Headers as one encoded `key: value\n` block.
    pub fn header_block(&self) -> String {
        let block: String = self
            .headers
            .iter()
            .map(|(key, value)| format!("{key}: {value}\n"))
            .collect();
        form_encode(&block, self.encoding)
    }

    /// Merge headers from a block produced by [`Request::header_block`].
    ///
    /// Lines that are not `key: value` are skipped.
    pub fn set_header_block(&mut self, block: &str) {
        let decoded = form_decode(block, self.encoding);
        for line in decoded.split('\n') {
            if let Some(caps) = HEADER_LINE.captures(line) {
                self.headers.insert(caps[1].to_string(), caps[2].to_string());
            }
        }
    }

    /// Form fields as one encoded `key=value&key=value` block.
    pub fn form_block(&self) -> String {
        let block = self
            .form_data
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        form_encode(&block, self.encoding)
    }

    /// Merge form fields from a block produced by [`Request::form_block`].
    pub fn set_form_block(&mut self, block: &str) {
        let decoded = form_decode(block, self.encoding);
        for pair in decoded.split('&') {
            if let Some(caps) = FORM_PAIR.captures(pair) {
                self.form_data
                    .insert(caps[1].to_string(), caps[2].to_string());
            }
        }
    }

    /// Form body bytes for a POST: each key and value encoded separately.
    pub fn form_body(&self) -> String {
        self.form_data
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    form_encode(key, self.encoding),
                    form_encode(value, self.encoding)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Result of a fetch or a script hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: Vec<u8>,
    pub request: Request,
    pub location: String,
}

impl Response {
    pub fn new(body: impl Into<Vec<u8>>, request: Request, location: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            request,
            location: location.into(),
        }
    }

    /// Body decoded with the request's encoding (lossy).
    pub fn text(&self) -> String {
        self.request
            .encoding
            .decode_without_bom_handling(&self.body)
            .0
            .into_owned()
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_headers() -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), "Mozilla/5.0 (X11)".to_string());
        headers.insert("Referer".to_string(), "https://site/a?b=1&c=2".to_string());
        headers.insert("X-Token".to_string(), "abc+def/100%".to_string());
        headers
    }

    #[test]
    fn form_encode_matches_www_form_rules() {
        let utf8 = encoding_rs::UTF_8;
        assert_eq!(form_encode("a b", utf8), "a+b");
        assert_eq!(form_encode("*-._", utf8), "*-._");
        assert_eq!(form_encode("中", utf8), "%E4%B8%AD");
        assert_eq!(form_encode("a&b=c", utf8), "a%26b%3Dc");
    }

    #[test]
    fn form_encode_uses_request_charset() {
        let gbk = Encoding::for_label(b"gbk").unwrap();
        assert_eq!(form_encode("中", gbk), "%D6%D0");
        assert_eq!(form_decode("%D6%D0", gbk), "中");
    }

    #[test]
    fn form_decode_handles_plus() {
        assert_eq!(form_decode("a+b%2Bc", encoding_rs::UTF_8), "a b+c");
    }

    #[test]
    fn header_block_round_trip() {
        let request = Request {
            headers: sample_headers(),
            ..Request::default()
        };
        let block = request.header_block();
        assert!(!block.contains('\n'));

        let mut restored = Request::new();
        restored.set_header_block(&block);
        assert_eq!(restored.headers, request.headers);
    }

    #[test]
    fn header_block_accepts_plain_text() {
        let mut request = Request::new();
        request.set_header_block("Accept: text/html\nnot a header\nX-A:   b");
        assert_eq!(request.headers.get("Accept").unwrap(), "text/html");
        assert_eq!(request.headers.get("X-A").unwrap(), "b");
        assert_eq!(request.headers.len(), 2);
    }

    #[test]
    fn form_block_round_trip() {
        let mut request = Request::new();
        request.form_data.insert("q".to_string(), "rust lang".to_string());
        request.form_data.insert("page".to_string(), "2".to_string());
        let block = request.form_block();

        let mut restored = Request::new();
        restored.set_form_block(&block);
        assert_eq!(restored.form_data, request.form_data);
    }

    #[test]
    fn form_body_escapes_each_part() {
        let mut request = Request::new();
        request.form_data.insert("k".to_string(), "a&b".to_string());
        request.form_data.insert("q".to_string(), "x y".to_string());
        assert_eq!(request.form_body(), "k=a%26b&q=x+y");
    }

    #[test]
    fn unknown_encoding_label_is_rejected() {
        let mut request = Request::new();
        assert!(!request.set_encoding_label("no-such-charset"));
        assert_eq!(request.encoding, encoding_rs::UTF_8);
        assert!(request.set_encoding_label("GBK"));
        assert_eq!(request.encoding.name(), "GBK");
    }

    #[test]
    fn response_text_uses_request_encoding() {
        let mut request = Request::new();
        request.set_encoding_label("gbk");
        let response = Response::new(vec![0xD6, 0xD0], request, "http://site/");
        assert_eq!(response.text(), "中");
        assert_eq!(response.to_string(), "中");
    }

    #[test]
    fn response_equality_is_structural() {
        let a = Response::new(b"x".to_vec(), Request::new(), "loc");
        let b = Response::new(b"x".to_vec(), Request::new(), "loc");
        let c = Response::new(b"x".to_vec(), Request::new(), "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn decode_only_charsets_are_refused() {
        let mut request = Request::new();
        assert!(!request.set_encoding_label("utf-16le"));
        assert!(!request.set_encoding_label("UTF-16BE"));
        assert!(!request.set_encoding_label("iso-2022-kr"));
        assert_eq!(request.encoding, encoding_rs::UTF_8);
        assert!(request.set_encoding_label(" big5 "));
        assert_eq!(request.encoding.name(), "Big5");
    }
}
