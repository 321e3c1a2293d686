//! Shared HTTP client configuration and bounded response helpers.
//!
//! One blocking client is built lazily and reused for every service call so
//! connection pooling and timeouts stay consistent across the app.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::{Client, Response};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Return the shared blocking client, building it on first use.
///
/// Building can fail (TLS backend initialization); the error is propagated so
/// callers can report it instead of panicking.
pub(crate) fn client() -> Result<&'static Client, reqwest::Error> {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let built = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()?;
    Ok(CLIENT.get_or_init(|| built))
}

/// Read a response body into memory, enforcing a maximum byte size.
pub(crate) fn read_response_bytes(
    response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, io::Error> {
    check_content_length(&response, max_bytes)?;
    let mut limited = response.take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}

/// Stream a response body to the provided writer, enforcing a maximum size.
pub(crate) fn copy_response_to_writer(
    response: Response,
    writer: &mut impl Write,
    max_bytes: usize,
) -> Result<u64, io::Error> {
    check_content_length(&response, max_bytes)?;
    let mut limited = response.take(max_bytes as u64 + 1);
    let mut total = 0u64;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = limited.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        if total > max_bytes as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Response exceeded {max_bytes} bytes"),
            ));
        }
        writer.write_all(&buf[..read])?;
    }
    Ok(total)
}

fn check_content_length(response: &Response, max_bytes: usize) -> Result<(), io::Error> {
    let Some(length) = response.content_length() else {
        return Ok(());
    };
    if length > max_bytes as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response too large: {length} bytes"),
        ));
    }
    Ok(())
}
