use httpmock::prelude::*;
use httpmock::{
    Method,
    Mock,
    Then,
    When,
};
use serde_json::json;

// An httpmock server standing in for a real apiserver.  Routes are registered as they're declared;
// verify() checks that each of them was hit at least once.
pub struct FakeApiServer {
    server: MockServer,
    routes: Vec<usize>,
}

impl FakeApiServer {
    pub fn start() -> (FakeApiServer, kube::Client) {
        let server = MockServer::start();
        let uri = http::Uri::try_from(server.url("/")).unwrap();
        let client = kube::Client::try_from(kube::Config::new(uri)).unwrap();
        (FakeApiServer { server, routes: vec![] }, client)
    }

    pub fn on<F: FnOnce(When, Then)>(&mut self, f: F) -> &mut Self {
        let mock = self.server.mock(|when, then| {
            let when = when.matches(|req: &HttpMockRequest| {
                println!("    apiserver got {} {}", req.method(), req.uri().path());
                true
            });
            f(when, then)
        });
        self.routes.push(mock.id);
        self
    }

    pub fn get_json(&mut self, path: &str, body: serde_json::Value) -> &mut Self {
        self.on(|when, then| {
            when.method(Method::GET).path(path);
            then.json_body(body);
        })
    }

    // Any verb on `path` fails with a Status carrying `code` and `reason`
    pub fn fail(&mut self, method: Method, path: &str, code: u16, reason: &str) -> &mut Self {
        let body = failure_status(code, reason);
        self.on(|when, then| {
            when.method(method).path(path);
            then.status(code).json_body(body);
        })
    }

    pub fn not_found(&mut self, method: Method, path: &str) -> &mut Self {
        self.fail(method, path, 404, "NotFound")
    }

    pub fn verify(&self) {
        for id in &self.routes {
            Mock::new(*id, &self.server).assert();
        }
    }
}

pub fn failure_status(code: u16, reason: &str) -> serde_json::Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "reason": reason,
        "code": code,
    })
}

pub fn kyma_list(items: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "apiVersion": "operator.kyma-project.io/v1beta2",
        "kind": "KymaList",
        "metadata": {},
        "items": items,
    })
}
