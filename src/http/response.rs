//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP/1.1 y escribirlas en el socket.
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.1 206 Partial Content\r\n
//! Server: ConcurrentHTTP/1.1\r\n
//! Content-Type: video/mp4\r\n
//! Content-Length: 100\r\n
//! Content-Range: bytes 0-99/500\r\n
//! Connection: keep-alive\r\n
//! \r\n
//! <100 bytes>
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use concurrent_http::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Content-Type", "text/plain")
//!     .with_body("Hello");
//!
//! let bytes = response.to_bytes();
//! assert!(bytes.ends_with(b"\r\n\r\nHello"));
//! ```

use super::StatusCode;
use bytes::Bytes;
use std::io::{self, Write};

/// Valor del header `Server`
pub const SERVER_NAME: &str = "ConcurrentHTTP/1.1";

/// Representa una respuesta HTTP completa
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,

    /// Headers en orden de inserción; un nombre repetido reemplaza el valor
    headers: Vec<(String, String)>,

    body: Bytes,

    /// HEAD: se anuncia `Content-Length` pero no se transfiere el body
    omit_body: bool,
}

impl Response {
    /// Crea una respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            omit_body: false,
        }
    }

    /// Agrega (o reemplaza) un header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Versión mutable de `with_header`
    pub fn add_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Establece el body y calcula `Content-Length`
    ///
    /// Acepta `&str`, `String`, `Vec<u8>` o `Bytes` (este último sin copiar).
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        let len = self.body.len().to_string();
        self.add_header("Content-Length", &len);
        self
    }

    /// Respuesta a HEAD: mantiene `Content-Length` pero descarta el body
    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self.body = Bytes::new();
        self
    }

    /// Anuncia un `Content-Length` sin cargar el body (HEAD sobre un archivo)
    pub fn with_content_length(mut self, len: u64) -> Self {
        self.add_header("Content-Length", &len.to_string());
        self.omit_body = true;
        self
    }

    /// Agrega `Content-Range: bytes start-end/total`
    pub fn with_content_range(self, start: u64, end: u64, total: u64) -> Self {
        self.with_header("Content-Range", &format!("bytes {}-{}/{}", start, end, total))
    }

    /// Fija el header `Connection`
    pub fn with_keep_alive(self, keep_alive: bool) -> Self {
        let value = if keep_alive { "keep-alive" } else { "close" };
        self.with_header("Connection", value)
    }

    /// Página HTML mínima para respuestas de error
    ///
    /// El body nunca es vacío y la conexión queda marcada para cerrarse.
    pub fn error(status: StatusCode) -> Self {
        let body = format!(
            "<!DOCTYPE html><html><head><title>{status}</title></head>\
             <body><h1>{status}</h1><hr><p>{SERVER_NAME}</p></body></html>"
        );
        Self::new(status)
            .with_header("Content-Type", "text/html")
            .with_body(body)
            .with_keep_alive(false)
    }

    /// Serializa status line y headers (incluye la línea vacía final)
    fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status);
        head.push_str(&format!("Server: {}\r\n", SERVER_NAME));
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("\r\n");
        head.into_bytes()
    }

    /// Convierte la respuesta completa a bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = self.head_bytes();
        if !self.omit_body {
            result.extend_from_slice(&self.body);
        }
        result
    }

    /// Escribe la respuesta en `writer`
    ///
    /// Retorna los bytes de body transferidos (0 para HEAD).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        writer.write_all(&self.head_bytes())?;
        if self.omit_body {
            writer.flush()?;
            return Ok(0);
        }
        writer.write_all(&self.body)?;
        writer.flush()?;
        Ok(self.body.len() as u64)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene el valor de un header (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// `true` si la respuesta permite mantener viva la conexión
    pub fn keeps_alive(&self) -> bool {
        self.header("Connection")
            .map(|v| v.eq_ignore_ascii_case("keep-alive"))
            .unwrap_or(false)
    }
}
