//! # Módulo HTTP
//!
//! Subconjunto de HTTP/1.1 implementado desde cero, sin librerías de alto
//! nivel:
//!
//! - Parsing de requests GET/HEAD (headers `Host`, `Range`, `Connection`)
//! - Rangos de bytes (`Range: bytes=start-end` -> 206)
//! - Construcción de responses y códigos de estado
//! - Tipos MIME por extensión
//!
//! No hay chunked transfer-encoding ni bodies en el request.

pub mod mime; // Content-Type por extensión
pub mod request; // Parsing de HTTP requests
pub mod response; // Construcción de HTTP responses
pub mod status; // Códigos de estado HTTP

pub use request::{ByteRange, Method, ParseError, Request, Version};
pub use response::Response;
pub use status::StatusCode;
