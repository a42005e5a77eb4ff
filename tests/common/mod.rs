//! Helpers compartidos por los tests de integración
//! tests/common/mod.rs

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Response HTTP leída del socket
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Cliente mínimo que mantiene la conexión abierta entre requests
pub struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        Self {
            reader: BufReader::new(stream),
        }
    }

    pub fn send(&mut self, raw: &str) {
        let stream = self.reader.get_mut();
        stream.write_all(raw.as_bytes()).expect("write request");
        stream.flush().expect("flush");
    }

    /// Lee status line, headers y (salvo HEAD) `Content-Length` bytes de body
    pub fn read_response(&mut self, head: bool) -> HttpResponse {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("status line");
        let status = line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("bad status line: {:?}", line));

        let mut headers = Vec::new();
        loop {
            line.clear();
            self.reader.read_line(&mut line).expect("header line");
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                break;
            }
            let (name, value) = trimmed.split_once(':').expect("header format");
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut response = HttpResponse {
            status,
            headers,
            body: Vec::new(),
        };
        if !head {
            let len: usize = response
                .header("Content-Length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            response.body = vec![0; len];
            self.reader.read_exact(&mut response.body).expect("body");
        }
        response
    }

    pub fn request(&mut self, raw: &str) -> HttpResponse {
        self.send(raw);
        self.read_response(raw.starts_with("HEAD "))
    }

    /// `true` si el servidor cerró la conexión
    pub fn is_closed(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.reader.read(&mut byte), Ok(0))
    }
}

/// Un request con `Connection: close`; espera al cierre del servidor
pub fn get_once(addr: SocketAddr, path: &str) -> HttpResponse {
    let mut client = Client::connect(addr);
    let response = client.request(&format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    ));
    assert!(client.is_closed(), "server kept the connection open");
    response
}
