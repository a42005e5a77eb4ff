//! # Manejo de Conexiones
//! src/server/handler.rs
//!
//! Loop de una conexión, ejecutado por un thread del pool:
//!
//! ```text
//! AWAIT_REQUEST ──read──▶ PARSE ──▶ ROUTE ──▶ RESPOND ──keep-alive──┐
//!      ▲                                                             │
//!      └─────────────────────────────────────────────────────────────┘
//!      timeout / EOF / error / close ──▶ CLOSED
//! ```
//!
//! Cada request se lee con una sola llamada a `read()` de hasta 8 KB; si no
//! trae el request completo se responde 400 y se cierra.

use crate::cache::Cache;
use crate::cgi::{ScriptError, ScriptRequest, ScriptRunner};
use crate::config::Config;
use crate::http::{mime, Method, Request, Response, StatusCode};
use crate::logging::{AccessLog, AccessRecord};
use crate::router::{Route, Router};
use crate::stats::{dashboard, Exchange, SharedStats};
use bytes::Bytes;
use chrono::Utc;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::net::{IpAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Tamaño del buffer de lectura de un request
pub const REQUEST_BUFFER_SIZE: usize = 8192;

/// Estado compartido por los threads del pool de un worker
pub struct HandlerContext {
    router: Router,
    cache: Cache,
    scripts: ScriptRunner,
    stats: Arc<SharedStats>,
    access_log: Arc<AccessLog>,
    timeout: Duration,
    cache_max_entry: usize,
}

/// Respuesta generada más el dato de si vino de la cache
struct Served {
    response: Response,
    cache_hit: bool,
}

impl Served {
    fn fresh(response: Response) -> Self {
        Self {
            response,
            cache_hit: false,
        }
    }
}

impl HandlerContext {
    /// Crea la cache privada del worker y el resto del contexto
    pub fn new(config: &Config, stats: Arc<SharedStats>, access_log: Arc<AccessLog>) -> Self {
        Self {
            router: Router::from_config(config),
            cache: Cache::new(config.cache_capacity_bytes()),
            scripts: ScriptRunner::new(
                config.script_interpreter.clone(),
                config.script_output_limit,
                config.connection_timeout(),
            ),
            stats,
            access_log,
            timeout: config.connection_timeout(),
            cache_max_entry: config.cache_max_entry_bytes(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Atiende una conexión hasta que se cierra
    pub fn handle_connection(&self, mut stream: TcpStream) {
        let client = stream.peer_addr().ok().map(|addr| addr.ip());

        // El mismo timeout acota la espera de un request y la escritura a
        // un cliente que dejó de leer
        if let Err(e) = stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
        {
            warn!(error = %e, "no se pudo fijar el timeout del socket");
            return;
        }
        if let Err(e) = self.stats.connection_opened() {
            warn!(error = %e, "stats: connection_opened falló");
        }

        let mut buffer = [0u8; REQUEST_BUFFER_SIZE];
        loop {
            let n = match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // timeout de keep-alive o error del cliente
                    debug!(error = %e, "fin de la conexión");
                    break;
                }
            };

            if !self.exchange(&mut stream, client, &buffer[..n]) {
                break;
            }
        }

        if let Err(e) = self.stats.connection_closed() {
            warn!(error = %e, "stats: connection_closed falló");
        }
    }

    /// Procesa un request ya leído y escribe la respuesta
    ///
    /// Retorna `true` si la conexión debe seguir abierta.
    fn exchange(&self, stream: &mut TcpStream, client: Option<IpAddr>, raw: &[u8]) -> bool {
        let start = Instant::now();

        let (served, request) = match Request::parse(raw) {
            Ok(request) => (self.respond(&request), Some(request)),
            Err(e) => {
                debug!(error = %e, "request inválido");
                (
                    Served::fresh(self.error_response(StatusCode::BadRequest, None)),
                    None,
                )
            }
        };

        let keep_alive = keeps_connection(request.as_ref(), &served.response);

        let mut response = served
            .response
            .with_header("Date", &http_date())
            .with_keep_alive(keep_alive);
        if request.as_ref().map_or(false, |r| r.method() == Method::HEAD) {
            response = response.without_body();
        }

        let bytes = match response.write_to(stream) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "error escribiendo la respuesta");
                return false;
            }
        };

        let status = response.status();
        let exchange = Exchange {
            status,
            bytes,
            latency: start.elapsed(),
            cache_hit: served.cache_hit,
        };
        if let Err(e) = self.stats.record_exchange(&exchange) {
            warn!(error = %e, "stats: record_exchange falló");
        }

        let record = AccessRecord {
            client,
            time: Utc::now(),
            method: request.as_ref().map_or("-", |r| r.method().as_str()),
            path: request.as_ref().map_or("-", |r| r.path()),
            version: request.as_ref().map_or("-", |r| r.version().as_str()),
            status,
            bytes,
        };
        if let Err(e) = self.access_log.append(&record) {
            warn!(error = %e, "access log: no se pudo escribir");
        }

        keep_alive
    }

    /// Genera la respuesta para un request válido
    fn respond(&self, request: &Request) -> Served {
        match self.router.route(request) {
            Route::Stats { json } => Served::fresh(self.stats_response(json)),
            Route::Forbidden { root } => {
                Served::fresh(self.error_response(StatusCode::Forbidden, Some(&root)))
            }
            Route::Script { path, root } => Served::fresh(self.run_script(request, &path, &root)),
            Route::File { path, root } => match self.serve_file(request, &path) {
                Ok(served) => served,
                Err(e) => Served::fresh(self.file_error(&path, &root, &e)),
            },
        }
    }

    /// Respuesta para un archivo que no se pudo abrir o leer
    fn file_error(&self, path: &Path, root: &Path, err: &io::Error) -> Response {
        let status = status_for_io_error(err);
        if status == StatusCode::InternalServerError {
            warn!(path = %path.display(), error = %err, "error leyendo archivo");
        }
        self.error_response(status, Some(root))
    }

    fn stats_response(&self, json: bool) -> Response {
        // El snapshot se copia bajo el mutex; el render va fuera
        let snapshot = match self.stats.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "stats: snapshot falló");
                return self.error_response(StatusCode::InternalServerError, None);
            }
        };

        if json {
            match dashboard::render_json(&snapshot) {
                Ok(body) => Response::new(StatusCode::Ok)
                    .with_header("Content-Type", "application/json")
                    .with_body(body),
                Err(e) => {
                    warn!(error = %e, "stats: error serializando JSON");
                    self.error_response(StatusCode::InternalServerError, None)
                }
            }
        } else {
            Response::new(StatusCode::Ok)
                .with_header("Content-Type", "text/html")
                .with_body(dashboard::render_html(&snapshot))
        }
    }

    fn run_script(&self, request: &Request, path: &Path, root: &Path) -> Response {
        let script_request = ScriptRequest {
            script: path,
            method: request.method().as_str(),
            script_name: request.path(),
            query: request.query(),
            protocol: request.version().as_str(),
            host: request.host(),
        };

        match self.scripts.run(&script_request) {
            Ok(output) => Response::new(StatusCode::Ok)
                .with_header("Content-Type", "text/html")
                .with_body(output),
            Err(ScriptError::NotFound(_)) => self.error_response(StatusCode::NotFound, Some(root)),
            Err(e) => {
                warn!(script = %path.display(), error = %e, "script falló");
                self.error_response(StatusCode::InternalServerError, Some(root))
            }
        }
    }

    /// Sirve un archivo estático, primero desde la cache
    fn serve_file(&self, request: &Request, path: &Path) -> io::Result<Served> {
        let key = path.to_string_lossy();

        if let Some(data) = self.cache.get(&key) {
            let total = data.len() as u64;
            let response = self.file_response(request, path, total, |start, len| {
                Ok(data.slice(start as usize..(start + len) as usize))
            })?;
            return Ok(Served {
                response,
                cache_hit: true,
            });
        }

        let mut file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return self.serve_file(request, &path.join("index.html"));
        }

        let total = metadata.len();
        let response = self.file_response(request, path, total, |start, len| {
            if start == 0 && len == total {
                let mut data = Vec::with_capacity(len as usize);
                file.read_to_end(&mut data)?;
                let data = Bytes::from(data);
                if data.len() <= self.cache_max_entry {
                    self.cache.put(&key, data.clone());
                }
                Ok(data)
            } else {
                file.seek(SeekFrom::Start(start))?;
                let mut data = Vec::with_capacity(len as usize);
                (&mut file).take(len).read_to_end(&mut data)?;
                Ok(Bytes::from(data))
            }
        })?;

        Ok(Served::fresh(response))
    }

    /// Arma la respuesta 200/206 de un recurso de `total` bytes
    ///
    /// `load(start, len)` entrega el contenido; no se llama para HEAD.
    fn file_response<F>(
        &self,
        request: &Request,
        path: &Path,
        total: u64,
        mut load: F,
    ) -> io::Result<Response>
    where
        F: FnMut(u64, u64) -> io::Result<Bytes>,
    {
        let head = request.method() == Method::HEAD;
        let content_type = mime::content_type(path);

        // Un rango insatisfacible cae a la respuesta completa
        let (response, start, len) = match request.range().and_then(|r| r.resolve(total)) {
            Some((start, end)) => (
                Response::new(StatusCode::PartialContent).with_content_range(start, end, total),
                start,
                end - start + 1,
            ),
            None => (Response::new(StatusCode::Ok), 0, total),
        };
        let response = response.with_header("Content-Type", content_type);

        if head {
            return Ok(response.with_content_length(len));
        }
        Ok(response.with_body(load(start, len)?))
    }

    /// Respuesta de error, con `<root>/errors/<code>.html` si existe
    fn error_response(&self, status: StatusCode, root: Option<&Path>) -> Response {
        let root = root.unwrap_or_else(|| self.router.default_root());
        let page: PathBuf = root.join("errors").join(format!("{}.html", status.as_u16()));

        match std::fs::read(&page) {
            Ok(body) if !body.is_empty() => Response::new(status)
                .with_header("Content-Type", "text/html")
                .with_body(body)
                .with_keep_alive(false),
            _ => Response::error(status),
        }
    }
}

/// Solo un 2xx a un request que pidió keep-alive deja la conexión abierta
fn keeps_connection(request: Option<&Request>, response: &Response) -> bool {
    request.map_or(false, |r| r.wants_keep_alive()) && response.status().is_success()
}

/// Traduce un error de filesystem al status correspondiente
pub fn status_for_io_error(err: &io::Error) -> StatusCode {
    match err.kind() {
        io::ErrorKind::NotFound => StatusCode::NotFound,
        io::ErrorKind::PermissionDenied => StatusCode::Forbidden,
        _ if err.raw_os_error() == Some(libc::ENOTDIR) => StatusCode::NotFound,
        _ => StatusCode::InternalServerError,
    }
}

/// Fecha en formato IMF-fixdate para el header `Date`
fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
