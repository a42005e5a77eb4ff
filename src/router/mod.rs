//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Decide qué hacer con un request antes de tocar el filesystem.
//!
//! ## Arquitectura
//!
//! ```text
//! Request → Host → document root → Route
//!                                   ├── Stats      (/stats)
//!                                   ├── Script     (*.py por defecto)
//!                                   ├── File       (<root><path>)
//!                                   └── Forbidden  (segmento "..")
//! ```
//!
//! El virtual host se elige por coincidencia exacta del hostname (sin
//! puerto); si ninguno coincide se usa el document root por defecto.

use crate::config::{Config, VirtualHost};
use crate::http::Request;
use std::path::{Component, Path, PathBuf};

/// Path reservado del dashboard
pub const STATS_PATH: &str = "/stats";

/// Destino de un request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Dashboard de estadísticas; `json` si se pidió `?format=json`
    Stats { json: bool },
    /// Script dinámico a delegar al intérprete
    Script { path: PathBuf, root: PathBuf },
    /// Archivo estático; el path resuelto es también la clave de cache
    File { path: PathBuf, root: PathBuf },
    /// El path intenta salir del document root
    Forbidden { root: PathBuf },
}

pub struct Router {
    default_root: PathBuf,
    vhosts: Vec<VirtualHost>,
    script_extension: String,
}

impl Router {
    pub fn new(
        default_root: impl Into<PathBuf>,
        vhosts: Vec<VirtualHost>,
        script_extension: &str,
    ) -> Self {
        Self {
            default_root: default_root.into(),
            vhosts,
            script_extension: script_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.document_root.clone(),
            config.vhosts.clone(),
            &config.script_extension,
        )
    }

    /// Document root para un Host dado (ya sin puerto)
    pub fn root_for(&self, host: Option<&str>) -> &Path {
        host.and_then(|h| self.vhosts.iter().find(|v| v.hostname == h))
            .map(|v| v.root.as_path())
            .unwrap_or(&self.default_root)
    }

    pub fn default_root(&self) -> &Path {
        &self.default_root
    }

    /// Resuelve el destino de un request
    ///
    /// # Ejemplo
    /// ```
    /// use concurrent_http::router::{Route, Router};
    /// use concurrent_http::http::Request;
    ///
    /// let router = Router::new("/srv/www", Vec::new(), "py");
    /// let request = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(
    ///     router.route(&request),
    ///     Route::File { path: "/srv/www/index.html".into(), root: "/srv/www".into() }
    /// );
    /// ```
    pub fn route(&self, request: &Request) -> Route {
        let path = request.path();

        if path == STATS_PATH {
            return Route::Stats {
                json: request.query_param("format") == Some("json"),
            };
        }

        let root = self.root_for(request.host()).to_path_buf();
        let resolved = match resolve_path(&root, path) {
            Some(p) => p,
            None => return Route::Forbidden { root },
        };

        let is_script = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e == self.script_extension);

        if is_script {
            Route::Script {
                path: resolved,
                root,
            }
        } else {
            Route::File {
                path: resolved,
                root,
            }
        }
    }
}

/// Une `root` con el path del request
///
/// `/` y los paths terminados en `/` apuntan a `index.html`. Devuelve `None`
/// si algún segmento es `..`.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let mut resolved = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.is_empty() || request_path.ends_with('/') {
        resolved.push("index.html");
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new(
            "/srv/default",
            vec![
                VirtualHost {
                    hostname: "site.local".to_string(),
                    root: PathBuf::from("/srv/site"),
                },
                VirtualHost {
                    hostname: "other.local".to_string(),
                    root: PathBuf::from("/srv/other"),
                },
            ],
            "py",
        )
    }

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_root_maps_to_index() {
        let route = router().route(&request("GET / HTTP/1.1\r\n\r\n"));
        assert_eq!(
            route,
            Route::File {
                path: PathBuf::from("/srv/default/index.html"),
                root: PathBuf::from("/srv/default"),
            }
        );
    }

    #[test]
    fn test_trailing_slash_maps_to_index() {
        let path = resolve_path(Path::new("/srv"), "/docs/").unwrap();
        assert_eq!(path, PathBuf::from("/srv/docs/index.html"));
    }

    #[test]
    fn test_vhost_exact_match_without_port() {
        let route = router().route(&request(
            "GET /a.css HTTP/1.1\r\nHost: site.local:8080\r\n\r\n",
        ));
        assert_eq!(
            route,
            Route::File {
                path: PathBuf::from("/srv/site/a.css"),
                root: PathBuf::from("/srv/site"),
            }
        );
    }

    #[test]
    fn test_unknown_host_uses_default_root() {
        let router = router();
        assert_eq!(router.root_for(Some("nope.local")), Path::new("/srv/default"));
        assert_eq!(router.root_for(Some("SITE.local.evil")), Path::new("/srv/default"));
        assert_eq!(router.root_for(None), Path::new("/srv/default"));
    }

    #[test]
    fn test_stats_route() {
        let router = router();
        assert_eq!(
            router.route(&request("GET /stats HTTP/1.1\r\n\r\n")),
            Route::Stats { json: false }
        );
        assert_eq!(
            router.route(&request("GET /stats?format=json HTTP/1.1\r\n\r\n")),
            Route::Stats { json: true }
        );
    }

    #[test]
    fn test_script_route() {
        let route = router().route(&request("GET /cgi/hello.py?name=x HTTP/1.1\r\n\r\n"));
        assert_eq!(
            route,
            Route::Script {
                path: PathBuf::from("/srv/default/cgi/hello.py"),
                root: PathBuf::from("/srv/default"),
            }
        );
    }

    #[test]
    fn test_parent_dir_is_forbidden() {
        let route = router().route(&request("GET /../etc/passwd HTTP/1.1\r\n\r\n"));
        assert_eq!(
            route,
            Route::Forbidden {
                root: PathBuf::from("/srv/default")
            }
        );
        assert!(resolve_path(Path::new("/srv"), "/a/../../b").is_none());
    }

    #[test]
    fn test_dot_segments_ignored() {
        let path = resolve_path(Path::new("/srv"), "/./a/./b.txt").unwrap();
        assert_eq!(path, PathBuf::from("/srv/a/b.txt"));
    }
}
