//! # Dashboard de Estadísticas
//! src/stats/dashboard.rs
//!
//! Render de un `StatsSnapshot` como página HTML (`/stats`), JSON
//! (`/stats?format=json`) y resumen de consola para el master.

use super::counters::StatsSnapshot;

/// Página HTML con auto-refresh cada 3 segundos
pub fn render_html(snap: &StatsSnapshot) -> String {
    let c = &snap.counters;
    format!(
        "<!DOCTYPE html><html><head><meta http-equiv='refresh' content='3'>\
         <title>Server Dashboard</title>\
         <style>body{{font-family:sans-serif;padding:20px;background:#f4f4f9}}\
         .card{{background:#fff;padding:20px;border-radius:8px;box-shadow:0 2px 5px rgba(0,0,0,0.1)}}\
         td{{padding:4px 12px}}</style></head><body><div class='card'>\
         <h1>Server Dashboard</h1>\
         <p>Uptime: <b>{}s</b> | Active connections: <b>{}</b></p>\
         <p>Total requests: <b>{}</b> | Avg response: <b>{:.2} ms</b></p>\
         <p>Bytes transferred: <b>{}</b> | Cache hits: <b>{}</b></p>\
         <table><tr><th>200</th><th>206</th><th>400</th><th>403</th><th>404</th><th>500</th></tr>\
         <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></table>\
         </div></body></html>",
        snap.uptime_secs,
        c.active_connections,
        c.total_requests,
        snap.avg_response_ms,
        c.bytes_transferred,
        c.cache_hits,
        c.status_200,
        c.status_206,
        c.status_400,
        c.status_403,
        c.status_404,
        c.status_500,
    )
}

pub fn render_json(snap: &StatsSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snap)
}

/// Una línea para el log periódico del master
pub fn summary_line(snap: &StatsSnapshot) -> String {
    let c = &snap.counters;
    format!(
        "uptime={}s requests={} active={} bytes={} hits={} avg={:.2}ms 2xx={} 4xx={} 5xx={}",
        snap.uptime_secs,
        c.total_requests,
        c.active_connections,
        c.bytes_transferred,
        c.cache_hits,
        snap.avg_response_ms,
        c.status_200 + c.status_206,
        c.status_400 + c.status_403 + c.status_404,
        c.status_500,
    )
}

/// Resumen final al apagar el servidor
pub fn print_summary(snap: &StatsSnapshot) {
    let c = &snap.counters;
    println!();
    println!("╔══════════════════════════════════════╗");
    println!("║          SERVER STATISTICS           ║");
    println!("╚══════════════════════════════════════╝");
    println!("   Uptime:             {} s", snap.uptime_secs);
    println!("   Total requests:     {}", c.total_requests);
    println!("   Bytes transferred:  {}", c.bytes_transferred);
    println!("   Cache hits:         {}", c.cache_hits);
    println!("   Avg response:       {:.2} ms", snap.avg_response_ms);
    println!("   200 / 206:          {} / {}", c.status_200, c.status_206);
    println!("   400 / 403 / 404:    {} / {} / {}", c.status_400, c.status_403, c.status_404);
    println!("   500:                {}", c.status_500);
    println!("   Active connections: {}", c.active_connections);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsCounters;

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            counters: StatsCounters {
                total_requests: 12,
                bytes_transferred: 4096,
                status_200: 9,
                status_404: 3,
                cache_hits: 5,
                ..StatsCounters::default()
            },
            uptime_secs: 60,
            avg_response_ms: 1.5,
        }
    }

    #[test]
    fn test_html_contains_counters() {
        let html = render_html(&snapshot());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Total requests: <b>12</b>"));
        assert!(html.contains("Cache hits: <b>5</b>"));
        assert!(html.contains("1.50 ms"));
    }

    #[test]
    fn test_json_is_flat() {
        let json = render_json(&snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_requests"], 12);
        assert_eq!(value["status_404"], 3);
        assert_eq!(value["uptime_secs"], 60);
    }

    #[test]
    fn test_summary_line() {
        let line = summary_line(&snapshot());
        assert!(line.contains("requests=12"));
        assert!(line.contains("4xx=3"));
    }
}
