use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bytes sent per INSTREAM chunk.
const CHUNK_SIZE: usize = 8192;

/// Upper bound on a clamd reply we are willing to buffer.
const MAX_REPLY_BYTES: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanVerdict {
    Clean,
    Infected,
    /// The scanner could not give an answer. Treated as a soft pass.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub verdict: ScanVerdict,
    /// Engine output: the signature name when infected, the failure when
    /// unavailable.
    pub detail: String,
}

impl ScanReport {
    pub fn clean(detail: impl Into<String>) -> Self {
        Self {
            verdict: ScanVerdict::Clean,
            detail: detail.into(),
        }
    }

    pub fn infected(detail: impl Into<String>) -> Self {
        Self {
            verdict: ScanVerdict::Infected,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            verdict: ScanVerdict::Unavailable,
            detail: detail.into(),
        }
    }
}

/// Malware scanning abstraction (allows swapping engines and faking in tests).
pub trait MalwareScanner: Send + Sync {
    fn name(&self) -> &str;

    /// Scan a stored file. Never fails: problems become `Unavailable`.
    fn scan(&self, path: &Path) -> ScanReport;
}

/// Scanner used when no engine is configured. Every scan is `Unavailable`,
/// so uploads proceed with a warning instead of silently passing as clean.
pub struct NullScanner;

impl MalwareScanner for NullScanner {
    fn name(&self) -> &str {
        "none"
    }

    fn scan(&self, _path: &Path) -> ScanReport {
        ScanReport::unavailable("no malware scanner configured")
    }
}

/// ClamAV daemon client speaking `zINSTREAM` over TCP.
pub struct ClamdScanner {
    addr: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ClamdScanner {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: timeout,
            io_timeout: timeout,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.io_timeout))?;
                    stream.set_write_timeout(Some(self.io_timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        }))
    }

    fn instream(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut stream = self.connect()?;

        stream.write_all(b"zINSTREAM\0")?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            stream.write_all(&(n as u32).to_be_bytes())?;
            stream.write_all(&buf[..n])?;
        }
        stream.write_all(&0u32.to_be_bytes())?;
        stream.flush()?;

        let mut reply = Vec::new();
        stream.take(MAX_REPLY_BYTES).read_to_end(&mut reply)?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

impl MalwareScanner for ClamdScanner {
    fn name(&self) -> &str {
        "clamd"
    }

    fn scan(&self, path: &Path) -> ScanReport {
        match self.instream(path) {
            Ok(reply) => parse_clamd_reply(&reply),
            Err(e) => {
                tracing::warn!(addr = %self.addr, error = %e, "clamd unreachable");
                ScanReport::unavailable(format!("clamd unreachable: {e}"))
            }
        }
    }
}

/// Interpret a clamd reply such as `stream: OK` or
/// `stream: Eicar-Test-Signature FOUND`.
pub fn parse_clamd_reply(reply: &str) -> ScanReport {
    let line = reply.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let body = line.strip_prefix("stream:").map(str::trim).unwrap_or(line);

    if body == "OK" {
        ScanReport::clean("OK")
    } else if let Some(signature) = body.strip_suffix("FOUND") {
        ScanReport::infected(signature.trim())
    } else if body.is_empty() {
        ScanReport::unavailable("empty reply from clamd")
    } else {
        ScanReport::unavailable(body)
    }
}
