use std::fs;
use std::io::{self, Read, Write};
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::config::CrawlConfig;
use crate::domain::Stage;
use crate::error::CrawlError;
use crate::extract::Page;

pub trait PageFetcher: Send + Sync {
    /// GETs an HTML page and parses it against the final (post-redirect) URL.
    fn fetch_page(&self, stage: Stage, url: &Url) -> Result<Page, CrawlError>;

    /// Streams the raw response body of `url` into `destination`, returning the byte count.
    fn download(&self, url: &Url, destination: &Utf8Path) -> Result<u64, CrawlError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    pages: Client,
    downloads: Client,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let pages = build_client(Duration::from_secs(config.page_timeout_secs))?;
        let downloads = build_client(Duration::from_secs(config.download_timeout_secs))?;
        Ok(Self {
            pages,
            downloads,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn send(client: &Client, stage: Stage, url: &Url) -> Result<Response, CrawlError> {
        let response = client
            .get(url.clone())
            .send()
            .map_err(|err| CrawlError::FetchHttp {
                stage,
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(CrawlError::FetchStatus {
                stage,
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    fn read_capped(&self, stage: Stage, url: &Url, response: Response) -> Result<String, CrawlError> {
        let too_large = || CrawlError::BodyTooLarge {
            stage,
            url: url.to_string(),
            limit: self.max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_body_bytes)
        {
            return Err(too_large());
        }
        let mut body = Vec::new();
        response
            .take(self.max_body_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|err| CrawlError::FetchHttp {
                stage,
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if body.len() as u64 > self.max_body_bytes {
            return Err(too_large());
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&self, stage: Stage, url: &Url) -> Result<Page, CrawlError> {
        let response = Self::send(&self.pages, stage, url)?;
        let final_url = response.url().clone();
        let body = self.read_capped(stage, url, response)?;
        Ok(Page::parse(final_url, &body))
    }

    fn download(&self, url: &Url, destination: &Utf8Path) -> Result<u64, CrawlError> {
        let mut response = Self::send(&self.downloads, Stage::Download, url)?;
        write_atomic(destination, |file| copy_body(&mut response, file, url, destination))
    }
}

/// Like `io::copy`, but a failed read is a transport error and a failed write
/// is a local filesystem error.
fn copy_body<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    url: &Url,
    destination: &Utf8Path,
) -> Result<u64, CrawlError> {
    let mut buffer = vec![0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(CrawlError::FetchHttp {
                    stage: Stage::Download,
                    url: url.to_string(),
                    message: err.to_string(),
                });
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| CrawlError::Filesystem(format!("write {destination}: {err}")))?;
        written += read as u64;
    }
    writer
        .flush()
        .map_err(|err| CrawlError::Filesystem(format!("write {destination}: {err}")))?;
    Ok(written)
}

fn build_client(timeout: Duration) -> Result<Client, CrawlError> {
    client_builder(timeout)?
        .build()
        .map_err(|err| CrawlError::HttpClient(err.to_string()))
}

fn client_builder(timeout: Duration) -> Result<ClientBuilder, CrawlError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("biocrawler/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CrawlError::HttpClient(err.to_string()))?,
    );
    Ok(Client::builder().default_headers(headers).timeout(timeout))
}

/// Fills a temp file next to `destination` through `fill`, then moves it into place.
pub fn write_atomic<T, F>(destination: &Utf8Path, fill: F) -> Result<T, CrawlError>
where
    F: FnOnce(&mut fs::File) -> Result<T, CrawlError>,
{
    let parent = match destination.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".biocrawler")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
    let value = fill(temp.as_file_mut())?;
    temp.persist(destination.as_std_path())
        .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    use assert_matches::assert_matches;

    use super::*;
    use crate::stages::ftp;

    const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    /// Serves canned raw responses by request path on a loopback port.
    fn serve(routes: Vec<(&'static str, String)>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap_or(0) == 0 || header == "\r\n" {
                        break;
                    }
                }
                let path = request_line.split_whitespace().nth(1).unwrap_or_default();
                let response = routes
                    .iter()
                    .find(|(route, _)| *route == path)
                    .map(|(_, response)| response.as_str())
                    .unwrap_or(NOT_FOUND);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Url::parse(&format!("http://{address}/")).unwrap()
    }

    fn html(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn loopback_fetcher(max_body_bytes: u64) -> HttpFetcher {
        let client = || {
            client_builder(Duration::from_secs(10))
                .unwrap()
                .no_proxy()
                .build()
                .unwrap()
        };
        HttpFetcher {
            pages: client(),
            downloads: client(),
            max_body_bytes,
        }
    }

    #[test]
    fn non_success_status_is_reported_with_stage() {
        let base = serve(Vec::new());
        let url = base.join("biosample/missing").unwrap();

        let err = loopback_fetcher(1024)
            .fetch_page(Stage::BioSample, &url)
            .unwrap_err();

        assert_matches!(
            err,
            CrawlError::FetchStatus { stage: Stage::BioSample, status: 404, ref url } if url.ends_with("/biosample/missing")
        );
    }

    #[test]
    fn body_over_limit_without_content_length_is_rejected() {
        let body = "x".repeat(103);
        let base = serve(vec![(
            "/big",
            format!("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n{body}"),
        )]);

        let err = loopback_fetcher(100)
            .fetch_page(Stage::BioSample, &base.join("big").unwrap())
            .unwrap_err();

        assert_matches!(err, CrawlError::BodyTooLarge { limit: 100, stage: Stage::BioSample, .. });
    }

    #[test]
    fn listing_links_resolve_against_redirected_url() {
        let base = serve(vec![
            (
                "/dir",
                "HTTP/1.1 301 Moved Permanently\r\nLocation: /dir/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    .to_string(),
            ),
            (
                "/dir/",
                html(r#"<pre><a href="x_genomic.gbff.gz">x_genomic.gbff.gz</a></pre>"#),
            ),
        ]);

        let page = loopback_fetcher(1024)
            .fetch_page(Stage::FtpListing, &base.join("dir").unwrap())
            .unwrap();

        assert_eq!(page.url().as_str(), base.join("dir/").unwrap().as_str());
        assert_eq!(
            ftp::extract(&page).unwrap(),
            Some(base.join("dir/x_genomic.gbff.gz").unwrap().to_string())
        );
    }

    #[test]
    fn download_streams_body_to_destination() {
        let base = serve(vec![("/a_genomic.gbff.gz", html("gzip bytes"))]);
        let temp = tempfile::tempdir().unwrap();
        let destination = Utf8Path::from_path(temp.path()).unwrap().join("a_genomic.gbff");

        let written = loopback_fetcher(4)
            .download(&base.join("a_genomic.gbff.gz").unwrap(), &destination)
            .unwrap();

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(destination.as_std_path()).unwrap(), b"gzip bytes");
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct DroppedConnection;

    impl Read for DroppedConnection {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
        }
    }

    #[test]
    fn copy_body_separates_read_and_write_failures() {
        let url = Url::parse("https://ftp.example.org/a_genomic.gbff.gz").unwrap();
        let destination = Utf8Path::new("out/a_genomic.gbff");

        let write_err = copy_body(&mut &b"payload"[..], &mut FullDisk, &url, destination).unwrap_err();
        assert_matches!(write_err, CrawlError::Filesystem(ref message) if message.contains("out/a_genomic.gbff"));

        let read_err = copy_body(&mut DroppedConnection, &mut Vec::new(), &url, destination).unwrap_err();
        assert_matches!(read_err, CrawlError::FetchHttp { stage: Stage::Download, .. });
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap().join("out.txt");
        std::fs::write(path.as_std_path(), b"old").unwrap();

        let written = write_atomic(&path, |file| {
            use std::io::Write;
            file.write_all(b"new contents")
                .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
            Ok(12u64)
        })
        .unwrap();

        assert_eq!(written, 12);
        assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"new contents");
    }

    #[test]
    fn write_atomic_leaves_nothing_on_failure() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap().join("out.txt");

        let result: Result<(), CrawlError> =
            write_atomic(&path, |_| Err(CrawlError::Filesystem("boom".to_string())));

        assert!(result.is_err());
        assert!(!path.as_std_path().exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
