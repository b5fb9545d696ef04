//! A scripted local HTTP server for exercising the API client and the
//! pipeline without the network
use crate::api::ApiClient;
use crate::config::Credentials;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub(crate) fn credentials() -> Credentials {
    Credentials {
        secret_id: "AKIDEXAMPLE".into(),
        secret_key: "SECRETEXAMPLE".into(),
        region: "ap-singapore".into(),
        endpoint: "hunyuan.intl.tencentcloudapi.com".into(),
        cos_bucket: None,
        cos_region: None,
    }
}

/// An API client that posts to `base_url` and bypasses any configured proxy
pub(crate) fn api_client(base_url: &str, timeout: Duration) -> ApiClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    ApiClient::with_http(http, credentials(), base_url.to_owned(), timeout)
}

/// Serialize `response` wrapped in the API's `{"Response": ...}` envelope
pub(crate) fn envelope(response: &serde_json::Value) -> String {
    serde_json::json!({ "Response": response }).to_string()
}

/// A request as it arrived on the wire
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Recorded {
    /// Request line and headers, without the blank line
    pub(crate) head: String,
    pub(crate) body: Vec<u8>,
}

impl Recorded {
    pub(crate) fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// Value of the header `name`, matched case-insensitively
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.head
            .lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    }

    pub(crate) fn body_text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

#[derive(Debug)]
pub(crate) struct Responder {
    listener: TcpListener,
    url: String,
}

impl Responder {
    pub(crate) async fn bind() -> Responder {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        Responder { listener, url }
    }

    /// Base URL ending in `/`
    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Answer one connection per entry of `replies`, in order, with the
    /// given status and body.  The task returns every request received.
    pub(crate) fn replay(self, replies: Vec<(u16, String)>) -> JoinHandle<Vec<Recorded>> {
        tokio::spawn(async move {
            let mut recorded = Vec::with_capacity(replies.len());
            for (status, body) in replies {
                let (mut sock, _) = self.listener.accept().await.unwrap();
                recorded.push(read_request(&mut sock).await);
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(response.as_bytes()).await.unwrap();
                sock.shutdown().await.unwrap();
            }
            recorded
        })
    }

    /// Accept one request and never answer it
    pub(crate) fn hang(self) {
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = self.listener.accept().await {
                read_request(&mut sock).await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
    }
}

async fn read_request(sock: &mut TcpStream) -> Recorded {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(i) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break i;
        }
        let n = sock.read(&mut buf).await.unwrap();
        assert_ne!(n, 0, "connection closed before the request head ended");
        data.extend_from_slice(&buf[..n]);
    };
    let mut recorded = Recorded {
        head: String::from_utf8_lossy(&data[..head_end]).into_owned(),
        body: data[head_end + 4..].to_vec(),
    };
    let length = recorded
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while recorded.body.len() < length {
        let n = sock.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        recorded.body.extend_from_slice(&buf[..n]);
    }
    recorded
}
