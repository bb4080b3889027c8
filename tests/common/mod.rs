#![allow(dead_code)]

pub mod handlers {
    use serde_json::json;
    use switchyard::handler::HandlerRef;

    /// Handler returning nothing.
    pub fn noop() -> HandlerRef {
        HandlerRef::function(|_ctx| Ok(None))
    }

    /// Handler echoing its name and captured params as JSON.
    pub fn named(name: &'static str) -> HandlerRef {
        HandlerRef::function(move |ctx| {
            let params: serde_json::Map<String, serde_json::Value> = ctx
                .params()
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            Ok(Some(json!({ "handler": name, "params": params }).into()))
        })
    }
}

pub mod recorder {
    use std::sync::{Arc, Mutex};

    /// Shared, ordered log of pipeline steps.
    #[derive(Clone, Default)]
    pub struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, step: &str) {
            self.0.lock().unwrap().push(step.to_string());
        }

        pub fn steps(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }
}

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Raw response split into status code, header block and body.
    pub struct RawResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl RawResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    /// Send one request over a fresh connection and read the full response.
    pub fn send_request(addr: SocketAddr, request: &str) -> RawResponse {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        stream.write_all(request.as_bytes()).unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(resp) = parse_complete(&buf) {
                        return resp;
                    }
                }
                Err(_) => break,
            }
        }
        parse_complete(&buf).expect("incomplete HTTP response")
    }

    fn parse_complete(buf: &[u8]) -> Option<RawResponse> {
        let text = String::from_utf8_lossy(buf);
        let (head, body) = text.split_once("\r\n\r\n")?;
        let mut lines = head.lines();
        let status = lines.next()?.split_whitespace().nth(1)?.parse().ok()?;
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        if body.len() < length {
            return None;
        }
        Some(RawResponse {
            status,
            headers,
            body: body[..length].to_string(),
        })
    }
}
