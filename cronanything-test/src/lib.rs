//! Clusterless test harness for CronAnything-family reducers.
//!
//! Mirrors the mock pattern used by `kube-client`'s own unit tests
//! (`tower_test::mock::pair` wired into `kube::Client::new`), generalized into a
//! small scenario list that a test drives alongside the reducer under test: the
//! driver asserts on the sequence of HTTP requests the reducer issues and hands
//! back canned responses, so reducer tests run without a real cluster.

use bytes::Bytes;
use http::{request::Parts, Request, Response};
use kube::Client;
use tower_test::mock::{self, Handle};

type MockRequest = Request<kube::client::Body>;
type MockResponse = Response<kube::client::Body>;

/// One HTTP request/response expectation, executed in order by [`drive_scenarios`].
pub struct Scenario {
    expect: Box<dyn FnOnce(&Parts, &[u8]) + Send>,
    respond_with: Vec<u8>,
    status: u16,
}

impl Scenario {
    /// A 200 response carrying `body` (typically `serde_json::to_vec(&obj).unwrap()`).
    ///
    /// `expect` is handed the request's `(method, uri, headers)` and raw body bytes.
    pub fn ok(expect: impl FnOnce(&Parts, &[u8]) + Send + 'static, body: Vec<u8>) -> Self {
        Scenario {
            expect: Box::new(expect),
            respond_with: body,
            status: 200,
        }
    }

    /// A non-2xx response, used to exercise create-failure / not-found paths.
    pub fn error(expect: impl FnOnce(&Parts, &[u8]) + Send + 'static, status: u16, body: Vec<u8>) -> Self {
        Scenario {
            expect: Box::new(expect),
            respond_with: body,
            status,
        }
    }

    /// Shorthand: assert only the method and URI path, ignore the body.
    pub fn method_uri(method: &'static str, uri: &'static str, body: Vec<u8>) -> Self {
        Self::ok(
            move |parts, _| {
                assert_eq!(parts.method.as_str(), method, "unexpected HTTP method");
                assert_eq!(parts.uri.to_string(), uri, "unexpected request URI");
            },
            body,
        )
    }
}

/// Builds a mocked [`Client`] plus the raw mock `Handle` a test drives with
/// [`drive_scenarios`].
pub fn mock_client() -> (Client, Handle<MockRequest, MockResponse>) {
    let (mock_service, handle) = mock::pair::<MockRequest, MockResponse>();
    let client = Client::new(mock_service, "default");
    (client, handle)
}

/// Drives `handle` through `scenarios` in order, asserting each request and
/// sending back the matching canned response.
pub async fn drive_scenarios(mut handle: Handle<MockRequest, MockResponse>, scenarios: Vec<Scenario>) {
    for scenario in scenarios {
        let (request, send) = handle.next_request().await.expect("reducer did not call the API");
        let (parts, body) = request.into_parts();
        let bytes = http_body_util::BodyExt::collect(body)
            .await
            .expect("request body readable")
            .to_bytes();
        (scenario.expect)(&parts, &bytes);
        let response = Response::builder()
            .status(scenario.status)
            .body(kube::client::Body::from(Bytes::from(scenario.respond_with)))
            .unwrap();
        send.send_response(response);
    }
}

/// A clock that always returns a fixed instant, for pinning `now` in tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub chrono::DateTime<chrono::Utc>);

impl cronanything_core::Clock for FixedClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.0
    }
}

/// Parses an RFC3339 literal into a `DateTime<Utc>`, panicking on malformed
/// input (test-only convenience).
pub fn dt(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .unwrap_or_else(|e| panic!("invalid test timestamp {s:?}: {e}"))
        .with_timezone(&chrono::Utc)
}
