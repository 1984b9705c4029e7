use anyhow::{anyhow, bail, Result};
use bytes::Bytes;
use futures::{future::BoxFuture, stream, StreamExt};
use std::{
    collections::{HashMap, VecDeque},
    io::{Cursor, Write},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::fetch::{RemoteBody, Transport};

/// One scripted answer to a GET.
#[derive(Clone)]
pub enum Reply {
    Ok { chunks: Vec<Vec<u8>>, total: Option<u64> },
    /// Connection-level failure before any body.
    Fail(String),
    /// Non-success HTTP status.
    Status(u16),
    /// Sends these bytes, then the stream errors.
    Broken(Vec<u8>),
    /// Advertises more bytes than it sends.
    Short { body: Vec<u8>, advertised: u64 },
    /// Never answers.
    Stall,
}

impl Reply {
    pub fn body(data: Vec<u8>, chunk: usize) -> Self {
        let total = Some(data.len() as u64);
        let chunks = data.chunks(chunk.max(1)).map(<[u8]>::to_vec).collect();
        Reply::Ok { chunks, total }
    }
}

/// In-memory `Transport`. Per-URL routes answer every request for that URL;
/// everything else is served from a FIFO queue.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Reply>>,
    routes: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn push(&self, reply: Reply) {
        self.queue.lock().unwrap().push_back(reply);
    }

    pub fn route(&self, url: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> Option<Reply> {
        if let Some(r) = self.routes.lock().unwrap().get(url) {
            return Some(r.clone());
        }
        self.queue.lock().unwrap().pop_front()
    }
}

impl Transport for ScriptedTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RemoteBody>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply(url);
        Box::pin(async move {
            match reply {
                None => bail!("no reply scripted for {}", url),
                Some(Reply::Ok { chunks, total }) => Ok(RemoteBody {
                    total,
                    chunks: stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed(),
                }),
                Some(Reply::Fail(msg)) => Err(anyhow!("GET {} failed: {}", url, msg)),
                Some(Reply::Status(code)) => bail!("HTTP status {} for {}", code, url),
                Some(Reply::Broken(data)) => Ok(RemoteBody {
                    total: None,
                    chunks: stream::iter(vec![
                        Ok(Bytes::from(data)),
                        Err(anyhow!("stream interrupted")),
                    ])
                    .boxed(),
                }),
                Some(Reply::Short { body, advertised }) => Ok(RemoteBody {
                    total: Some(advertised),
                    chunks: stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
                }),
                Some(Reply::Stall) => futures::future::pending().await,
            }
        })
    }
}

/// Build a zip in memory. Names ending in `/` become directory entries.
/// Entries are stored uncompressed so tests can corrupt payload bytes.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }
    buf
}

/// Flip the first byte of `needle` inside `archive`, breaking that entry's CRC.
pub fn corrupt(archive: &mut [u8], needle: &[u8]) {
    let pos = archive
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle not found in archive");
    archive[pos] ^= 0xFF;
}
