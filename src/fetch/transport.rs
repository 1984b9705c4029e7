// src/fetch/transport.rs

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{future::BoxFuture, stream::BoxStream, StreamExt};
use reqwest::Client;
use std::time::Duration;

/// A response whose body has not been read yet.
pub struct RemoteBody {
    /// `Content-Length`, when the server sends one.
    pub total: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

/// Where archive bytes come from. The fetcher only ever issues GETs, so this
/// is the whole surface it needs; tests swap in a scripted fake.
pub trait Transport: Send + Sync {
    /// Start a GET. Non-success statuses must come back as errors.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RemoteBody>>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RemoteBody>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("GET {} failed", url))?
                .error_for_status()
                .with_context(|| format!("Non-success status {}", url))?;

            let total = resp.content_length();
            let chunks = resp
                .bytes_stream()
                .map(|chunk| chunk.context("reading response body"))
                .boxed();
            Ok(RemoteBody { total, chunks })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serve one canned HTTP response on a loopback port and return its URL.
    async fn serve_once(response: Vec<u8>) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        Ok(format!("http://{}/microdados_2021.zip", addr))
    }

    fn transport() -> Result<HttpTransport> {
        HttpTransport::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn not_found_is_an_error() -> Result<()> {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await?;

        let err = match transport()?.get(&url).await {
            Ok(_) => panic!("404 should not yield a body"),
            Err(e) => e,
        };
        let msg = format!("{:#}", err);
        assert!(msg.contains("Non-success status"), "{}", msg);
        assert!(msg.contains("404"), "{}", msg);
        Ok(())
    }

    #[tokio::test]
    async fn ok_response_streams_whole_body() -> Result<()> {
        let body = b"PK\x03\x04 not really a zip, just bytes".to_vec();
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(&body);
        let url = serve_once(response).await?;

        let RemoteBody { total, mut chunks } = transport()?.get(&url).await?;
        assert_eq!(total, Some(body.len() as u64));

        let mut received = Vec::new();
        while let Some(chunk) = chunks.next().await {
            received.extend_from_slice(&chunk?);
        }
        assert_eq!(received, body);
        Ok(())
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let url = format!("http://{}/microdados_2022.zip", addr);
        let err = match transport()?.get(&url).await {
            Ok(_) => panic!("nothing is listening"),
            Err(e) => e,
        };
        assert!(format!("{:#}", err).contains("GET"), "{:#}", err);
        Ok(())
    }
}
