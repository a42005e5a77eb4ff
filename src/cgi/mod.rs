//! # Delegado de Scripts
//! src/cgi/mod.rs
//!
//! Ejecuta `<intérprete> <script>` y captura su salida estándar.
//!
//! - Exit 0 → la salida es el body de un 200 `text/html`
//! - Exit distinto de 0, fallo al lanzar o muerte por señal → 500
//! - Script inexistente → 404 (se verifica antes de lanzar)
//! - Script que no termina en `timeout` → se mata su grupo de procesos, 500
//!
//! La salida se limita a `output_limit` bytes; el resto se lee y se descarta
//! para que el proceso hijo no quede bloqueado escribiendo en el pipe.

use crate::http::response::SERVER_NAME;
use bytes::Bytes;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Intervalo de sondeo mientras el script corre
const WAIT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script not found: {0}")]
    NotFound(PathBuf),

    #[error("cannot start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        source: io::Error,
    },

    #[error("error reading script output: {0}")]
    Io(#[from] io::Error),

    #[error("script exited with {0}")]
    Failed(ExitStatus),

    #[error("script still running after {0:?}")]
    TimedOut(Duration),
}

/// Datos del request que se exponen al script como variables de entorno
#[derive(Debug, Clone)]
pub struct ScriptRequest<'a> {
    pub script: &'a Path,
    pub method: &'a str,
    /// Path tal como llegó en el request (`SCRIPT_NAME`)
    pub script_name: &'a str,
    pub query: Option<&'a str>,
    pub protocol: &'a str,
    pub host: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    output_limit: usize,
    timeout: Duration,
}

impl ScriptRunner {
    pub fn new(interpreter: impl Into<String>, output_limit: usize, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            output_limit,
            timeout,
        }
    }

    /// Ejecuta el script y devuelve su salida si terminó con éxito
    pub fn run(&self, request: &ScriptRequest<'_>) -> Result<Bytes, ScriptError> {
        if !request.script.is_file() {
            return Err(ScriptError::NotFound(request.script.to_path_buf()));
        }

        let mut child = Command::new(&self.interpreter)
            .arg(request.script)
            .env("REQUEST_METHOD", request.method)
            .env("QUERY_STRING", request.query.unwrap_or(""))
            .env("SCRIPT_NAME", request.script_name)
            .env("SERVER_PROTOCOL", request.protocol)
            .env("HTTP_HOST", request.host.unwrap_or(""))
            .env("SERVER_SOFTWARE", SERVER_NAME)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| ScriptError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let limit = self.output_limit as u64;
        let reader = match thread::Builder::new()
            .name("script-output".to_string())
            .spawn(move || read_output(stdout, limit))
        {
            Ok(reader) => reader,
            Err(e) => {
                kill_group(&mut child);
                return Err(e.into());
            }
        };

        let status = match wait_until(&mut child, Instant::now() + self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(script = %request.script.display(), "script excedió el timeout");
                kill_group(&mut child);
                let _ = reader.join();
                return Err(ScriptError::TimedOut(self.timeout));
            }
            Err(e) => {
                kill_group(&mut child);
                return Err(e.into());
            }
        };

        let (output, discarded) = reader
            .join()
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "output reader panicked")))?;

        debug!(
            script = %request.script.display(),
            %status,
            bytes = output.len(),
            discarded,
            "script terminado"
        );

        if status.success() {
            Ok(Bytes::from(output))
        } else {
            Err(ScriptError::Failed(status))
        }
    }
}

/// Lee hasta `limit` bytes y descarta el resto hasta EOF
fn read_output(stdout: Option<ChildStdout>, limit: u64) -> io::Result<(Vec<u8>, u64)> {
    let mut output = Vec::new();
    let Some(mut stdout) = stdout else {
        return Ok((output, 0));
    };
    (&mut stdout).take(limit).read_to_end(&mut output)?;
    let discarded = io::copy(&mut stdout, &mut io::sink())?;
    Ok((output, discarded))
}

/// `try_wait` hasta que el hijo termine o venza `deadline`
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

/// SIGKILL al grupo del script (incluye sus hijos) y espera al líder
fn kill_group(child: &mut Child) {
    // SAFETY: el hijo es líder de su propio grupo (process_group(0))
    unsafe { libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL) };
    if let Err(e) = child.wait() {
        warn!(error = %e, "no se pudo esperar al script");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn runner(output_limit: usize) -> ScriptRunner {
        ScriptRunner::new("sh", output_limit, Duration::from_secs(5))
    }

    fn request(script: &Path) -> ScriptRequest<'_> {
        ScriptRequest {
            script,
            method: "GET",
            script_name: "/test.sh",
            query: Some("name=world"),
            protocol: "HTTP/1.1",
            host: Some("site.local"),
        }
    }

    #[test]
    fn test_successful_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "ok.sh", "echo '<p>hello</p>'\n");

        let output = runner(1024).run(&request(&path)).unwrap();
        assert_eq!(&output[..], b"<p>hello</p>\n");
    }

    #[test]
    fn test_environment_is_passed() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(
            dir.path(),
            "env.sh",
            "printf '%s|%s|%s|%s' \"$REQUEST_METHOD\" \"$QUERY_STRING\" \"$HTTP_HOST\" \"$SERVER_SOFTWARE\"\n",
        );

        let output = runner(1024).run(&request(&path)).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&output),
            format!("GET|name=world|site.local|{}", SERVER_NAME)
        );
    }

    #[test]
    fn test_non_zero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "fail.sh", "echo partial\nexit 3\n");

        let result = runner(1024).run(&request(&path));
        assert!(matches!(result, Err(ScriptError::Failed(status)) if status.code() == Some(3)));
    }

    #[test]
    fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sh");

        let result = runner(1024).run(&request(&path));
        assert!(matches!(result, Err(ScriptError::NotFound(_))));
    }

    #[test]
    fn test_missing_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "ok.sh", "echo hi\n");

        let result = ScriptRunner::new("definitely-not-an-interpreter", 1024, Duration::from_secs(5)).run(&request(&path));
        assert!(matches!(result, Err(ScriptError::Spawn { .. })));
    }

    #[test]
    fn test_output_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(
            dir.path(),
            "big.sh",
            "i=0\nwhile [ $i -lt 2000 ]; do echo 0123456789; i=$((i+1)); done\n",
        );

        let output = runner(16).run(&request(&path)).unwrap();
        assert_eq!(output.len(), 16);
    }

    #[test]
    fn test_hung_script_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "hang.sh", "echo start\nsleep 30\necho never\n");

        let start = Instant::now();
        let result = ScriptRunner::new("sh", 1024, Duration::from_millis(300)).run(&request(&path));

        assert!(matches!(result, Err(ScriptError::TimedOut(_))));
        // el `sleep` hijo también muere, si no el pipe seguiría abierto
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
