//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Parser de un subconjunto de HTTP/1.1, implementado desde cero.
//!
//! ## Formato de un Request
//!
//! ```text
//! GET /video.mp4?x=1 HTTP/1.1\r\n
//! Host: example.com:8080\r\n
//! Range: bytes=0-99\r\n
//! Connection: close\r\n
//! \r\n
//! ```
//!
//! El request completo (request line + headers) debe llegar en una sola
//! lectura: no hay soporte para bodies ni para requests partidos en varios
//! `read`. Solo se interpretan `Host`, `Range` y `Connection`; el resto de
//! headers se ignora.

use std::collections::HashMap;
use thiserror::Error;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un recurso
    GET,

    /// HEAD - Como GET pero solo retorna headers
    HEAD,
}

impl Method {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
        }
    }
}

/// Versión del protocolo declarada en la request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(ParseError::InvalidHttpVersion(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Rango de bytes pedido con `Range: bytes=start-end`
///
/// `end` es inclusivo; `None` significa "hasta el final del recurso".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parsea el valor del header `Range`
    ///
    /// Solo se acepta un único rango `bytes=N-` o `bytes=N-M`. Rangos sufijo
    /// (`bytes=-N`), múltiples rangos o valores ilegibles retornan `None` y
    /// el request se sirve completo.
    pub fn parse(value: &str) -> Option<Self> {
        let ranges = value.trim().strip_prefix("bytes=")?;
        if ranges.contains(',') {
            return None;
        }

        let (start, end) = ranges.split_once('-')?;
        let start = start.trim().parse::<u64>().ok()?;
        let end = match end.trim() {
            "" => None,
            e => Some(e.parse::<u64>().ok()?),
        };

        if matches!(end, Some(e) if e < start) {
            return None;
        }

        Some(Self { start, end })
    }

    /// Resuelve el rango contra el tamaño real del recurso
    ///
    /// Retorna `(start, end)` inclusivos, o `None` si el rango no es
    /// satisfacible (inicio más allá del final), en cuyo caso se responde 200
    /// con el recurso completo. Un `end` ausente o fuera de rango se recorta a
    /// `len - 1`.
    ///
    /// # Ejemplo
    /// ```
    /// use concurrent_http::http::request::ByteRange;
    ///
    /// let range = ByteRange::parse("bytes=0-99").unwrap();
    /// assert_eq!(range.resolve(500), Some((0, 99)));
    /// assert_eq!(range.resolve(50), Some((0, 49)));
    /// ```
    pub fn resolve(&self, len: u64) -> Option<(u64, u64)> {
        if self.start >= len {
            return None;
        }
        let last = len - 1;
        let end = self.end.map_or(last, |e| e.min(last));
        Some((self.start, end))
    }
}

/// Representa un request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP (GET, HEAD)
    method: Method,

    /// Path sin query string (ej: "/index.html")
    path: String,

    /// Query string cruda, sin el '?'
    query: Option<String>,

    /// Query parameters parseados (ej: {"format": "json"})
    query_params: HashMap<String, String>,

    /// Versión HTTP declarada
    version: Version,

    /// Headers con el nombre en minúsculas
    headers: HashMap<String, String>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Falta el `\r\n\r\n` que cierra los headers
    #[error("Incomplete HTTP request")]
    IncompleteRequest,

    /// Formato inválido de la request line
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Método HTTP no soportado
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Versión HTTP distinta de 1.0 / 1.1
    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    /// Header malformado
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Request vacío
    #[error("Empty request")]
    EmptyRequest,
}

impl Request {
    /// Parsea un request desde el buffer de una única lectura
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use concurrent_http::http::Request;
    ///
    /// let raw = b"GET /stats?format=json HTTP/1.1\r\nHost: localhost\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/stats");
    /// assert_eq!(request.query_param("format"), Some("json"));
    /// assert_eq!(request.host(), Some("localhost"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let request_str =
            std::str::from_utf8(buffer).map_err(|_| ParseError::InvalidRequestLine)?;

        if request_str.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let head = match request_str.find("\r\n\r\n") {
            Some(end) => &request_str[..end],
            None => return Err(ParseError::IncompleteRequest),
        };

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::IncompleteRequest)?;

        let (method, target, version) = Self::parse_request_line(request_line)?;
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };
        let query_params = query
            .as_deref()
            .map(Self::parse_query_string)
            .unwrap_or_default();

        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            query,
            query_params,
            version,
            headers,
        })
    }

    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(line: &str) -> Result<(Method, &str, Version), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::parse(parts[0])?;
        if !parts[1].starts_with('/') {
            return Err(ParseError::InvalidRequestLine);
        }
        let version = Version::parse(parts[2])?;

        Ok((method, parts[1], version))
    }

    /// Ejemplo: "format=json&debug" -> {"format": "json", "debug": ""}
    fn parse_query_string(query: &str) -> HashMap<String, String> {
        query
            .split('&')
            .filter(|param| !param.is_empty())
            .map(|param| match param.split_once('=') {
                Some((key, value)) => (key.to_string(), value.replace("%20", " ").replace('+', " ")),
                None => (param.to_string(), String::new()),
            })
            .collect()
    }

    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                None => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    // === Métodos públicos para acceder a los campos ===

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Obtiene un header (el nombre no distingue mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Host pedido, sin el sufijo `:puerto`
    pub fn host(&self) -> Option<&str> {
        self.header("host").map(|host| match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        })
    }

    /// Rango de bytes pedido, si el header es válido
    pub fn range(&self) -> Option<ByteRange> {
        self.header("range").and_then(ByteRange::parse)
    }

    /// `true` si el cliente envió `Connection: close`
    pub fn connection_close(&self) -> bool {
        self.header("connection")
            .map(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("close")))
            .unwrap_or(false)
    }

    /// Keep-alive solo para HTTP/1.1 sin `Connection: close`
    pub fn wants_keep_alive(&self) -> bool {
        self.version == Version::Http11 && !self.connection_close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/");
        assert_eq!(request.version(), Version::Http10);
        assert!(request.query().is_none());
    }

    #[test]
    fn test_parse_head() {
        let raw = b"HEAD /index.html HTTP/1.1\r\nHost: a\r\n\r\n";
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.method(), Method::HEAD);
        assert_eq!(request.path(), "/index.html");
    }

    #[test]
    fn test_parse_with_query_params() {
        let raw = b"GET /stats?format=json&debug HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.path(), "/stats");
        assert_eq!(request.query(), Some("format=json&debug"));
        assert_eq!(request.query_param("format"), Some("json"));
        assert_eq!(request.query_param("debug"), Some(""));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nHOST: example.com\r\nuser-agent: test\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("Host"), Some("example.com"));
        assert_eq!(request.header("User-Agent"), Some("test"));
    }

    #[test]
    fn test_host_strips_port() {
        let raw = b"GET / HTTP/1.1\r\nHost: site.local:8080\r\n\r\n";
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.host(), Some("site.local"));
    }

    #[test]
    fn test_keep_alive_rules() {
        let r = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(r.wants_keep_alive());

        let r = Request::parse(b"GET / HTTP/1.1\r\nConnection: Close\r\n\r\n").unwrap();
        assert!(!r.wants_keep_alive());

        let r = Request::parse(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").unwrap();
        assert!(!r.wants_keep_alive());
    }

    #[test]
    fn test_range_header() {
        let raw = b"GET /f HTTP/1.1\r\nRange: bytes=0-99\r\n\r\n";
        let request = Request::parse(raw).unwrap();
        assert_eq!(
            request.range(),
            Some(ByteRange {
                start: 0,
                end: Some(99)
            })
        );
    }

    #[test]
    fn test_range_parse_variants() {
        assert_eq!(
            ByteRange::parse("bytes=100-"),
            Some(ByteRange {
                start: 100,
                end: None
            })
        );
        assert_eq!(ByteRange::parse("bytes=-100"), None);
        assert_eq!(ByteRange::parse("bytes=0-1,5-9"), None);
        assert_eq!(ByteRange::parse("bytes=9-5"), None);
        assert_eq!(ByteRange::parse("items=0-5"), None);
    }

    #[test]
    fn test_range_resolve() {
        let range = ByteRange::parse("bytes=0-99").unwrap();
        assert_eq!(range.resolve(500), Some((0, 99)));

        let open = ByteRange::parse("bytes=450-").unwrap();
        assert_eq!(open.resolve(500), Some((450, 499)));

        let past_end = ByteRange::parse("bytes=400-10000").unwrap();
        assert_eq!(past_end.resolve(500), Some((400, 499)));

        let beyond = ByteRange::parse("bytes=500-600").unwrap();
        assert_eq!(beyond.resolve(500), None);
        assert_eq!(range.resolve(0), None);
    }

    #[test]
    fn test_unsupported_method() {
        let result = Request::parse(b"POST / HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(ParseError::UnsupportedMethod(_))));
    }

    #[test]
    fn test_invalid_version() {
        let result = Request::parse(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
    }

    #[test]
    fn test_empty_request() {
        assert!(matches!(Request::parse(b""), Err(ParseError::EmptyRequest)));
    }

    #[test]
    fn test_incomplete_request() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nHost: a\r\n");
        assert!(matches!(result, Err(ParseError::IncompleteRequest)));
    }

    #[test]
    fn test_invalid_request_line() {
        let result = Request::parse(b"GET\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidRequestLine)));

        let result = Request::parse(b"GET index.html HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidRequestLine)));
    }

    #[test]
    fn test_invalid_header() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nnot-a-header\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }
}
