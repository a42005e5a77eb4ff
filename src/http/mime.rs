//! # Tipos MIME
//! src/http/mime.rs

use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// Deduce el `Content-Type` a partir de la extensión del archivo
///
/// Sin extensión o con una desconocida se sirve como binario.
///
/// # Ejemplo
/// ```
/// use concurrent_http::http::mime::content_type;
/// use std::path::Path;
///
/// assert_eq!(content_type(Path::new("www/index.html")), "text/html");
/// assert_eq!(content_type(Path::new("www/blob")), "application/octet-stream");
/// assert_eq!(content_type(Path::new("www/dump.xyz")), "application/octet-stream");
/// ```
pub fn content_type(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return OCTET_STREAM,
    };

    match ext.as_str() {
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => OCTET_STREAM,
    }
}
