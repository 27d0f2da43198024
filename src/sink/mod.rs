use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::InfluxConfig;
use crate::point::Point;

/// Sink consumes finished points and exports them.
///
/// Writes are buffered; `flush` is the only operation that performs I/O.
/// A sink must tolerate any number of writes and flushes between one
/// `open` and one `close`.
pub trait Sink: Send + Sync {
    /// Prepare the sink for a run.
    fn open(&self) -> Result<()>;

    /// Queue a single point.
    fn write_point(&self, point: Point);

    /// Queue a batch of points.
    fn write_points(&self, points: Vec<Point>) {
        for point in points {
            self.write_point(point);
        }
    }

    /// Push all queued points to the backing store.
    fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Flush remaining points and release the sink.
    fn close(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// InfluxDB v2 sink writing line protocol over HTTP.
pub struct InfluxSink {
    http: reqwest::Client,
    write_url: String,
    org: String,
    bucket: String,
    token: String,
    buffer: Mutex<Vec<String>>,
}

impl InfluxSink {
    /// Create a new InfluxDB sink from config.
    pub fn new(cfg: &InfluxConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            http,
            write_url: format!("{}/api/v2/write", cfg.url.trim_end_matches('/')),
            org: cfg.org.clone(),
            bucket: cfg.bucket.clone(),
            token: cfg.token.clone(),
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Number of queued, not yet flushed points.
    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    fn take_lines(&self) -> Vec<String> {
        match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut *buffer),
            Err(_) => Vec::new(),
        }
    }
}

impl Sink for InfluxSink {
    fn open(&self) -> Result<()> {
        info!(org = %self.org, bucket = %self.bucket, "influx sink opened");
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
        Ok(())
    }

    fn write_point(&self, point: Point) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(point.to_line_protocol());
        }
    }

    async fn flush(&self) -> Result<()> {
        let lines = self.take_lines();
        if lines.is_empty() {
            return Ok(());
        }

        debug!(points = lines.len(), "flushing to influx");

        let body = lines.join("\n");
        let response = self
            .http
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .context("writing points to influx")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("influx write failed with status {}: {}", status, body);
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.flush().await.context("flushing on close")?;
        info!("influx sink closed");
        Ok(())
    }
}

/// Console sink used in debug mode: points are printed as line protocol
/// instead of being sent anywhere.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn write_point(&self, point: Point) {
        println!("{}", point.to_line_protocol());
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointBuilder;
    use std::time::{Duration, UNIX_EPOCH};

    fn test_sink() -> InfluxSink {
        InfluxSink::new(&InfluxConfig {
            url: "http://localhost:8086".to_string(),
            org: "org".to_string(),
            bucket: "bucket".to_string(),
            token: "token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("should build")
    }

    fn point(secs: u64) -> Point {
        PointBuilder::new("m", UNIX_EPOCH + Duration::from_secs(secs))
            .bool_field("ok", true)
            .build()
    }

    #[test]
    fn test_writes_are_buffered() {
        let sink = test_sink();
        assert_eq!(sink.pending(), 0);

        sink.write_point(point(1));
        sink.write_points(vec![point(2), point(3)]);
        assert_eq!(sink.pending(), 3);
    }

    #[test]
    fn test_open_resets_buffer() {
        let sink = test_sink();
        sink.write_point(point(1));
        sink.open().expect("should open");
        assert_eq!(sink.pending(), 0);
    }

    #[tokio::test]
    async fn test_flush_empty_buffer_is_noop() {
        // No queued lines, so no request is made and flush succeeds
        // even without a reachable server.
        let sink = test_sink();
        sink.flush().await.expect("empty flush should succeed");
    }

    #[test]
    fn test_take_lines_drains() {
        let sink = test_sink();
        sink.write_point(point(1));
        let lines = sink.take_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn test_console_sink_accepts_points() {
        let sink = ConsoleSink;
        sink.open().expect("should open");
        sink.write_point(point(1));
    }
}
