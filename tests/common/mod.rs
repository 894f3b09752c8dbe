//! Mock upstream APIs for integration tests

use birdseye::transport::{HttpSettings, HttpTransport, SourceProfile};
use flate2::write::GzEncoder;
use flate2::Compression;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::io::Write;
use std::time::Duration;

pub const ORG: &str = "gramo-org";
pub const GITHUB_TOKEN: &str = "gh-token";
pub const HEROKU_TOKEN: &str = "hk-token";
pub const SNAPCI_TOKEN: &str = "sn-token";

/// One mock server standing in for GitHub, Heroku and Snap CI at once.
pub struct MockUpstream {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockUpstream {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    pub fn settings() -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(5),
            ..HttpSettings::default()
        }
    }

    pub fn github(&self) -> HttpTransport {
        HttpTransport::new(SourceProfile::github(&self.base_url, GITHUB_TOKEN), &Self::settings())
            .expect("github transport")
    }

    pub fn heroku(&self) -> HttpTransport {
        HttpTransport::new(SourceProfile::heroku(&self.base_url, HEROKU_TOKEN), &Self::settings())
            .expect("heroku transport")
    }

    pub fn snapci(&self) -> HttpTransport {
        HttpTransport::new(
            SourceProfile::snapci(&self.base_url, "kjellm", SNAPCI_TOKEN),
            &Self::settings(),
        )
        .expect("snapci transport")
    }

    /// JSON 200 response for a GET.
    pub async fn json(&mut self, path: &str, body: serde_json::Value) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Gzip-compressed JSON 200 response announced through Content-Encoding.
    pub async fn gzip_json(&mut self, path: &str, body: serde_json::Value) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("content-encoding", "gzip")
            .with_body(gzip(body.to_string().as_bytes()))
            .create_async()
            .await
    }

    pub async fn status(&mut self, path: &str, status: usize) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(status)
            .with_body(r#"{"message":"nope"}"#)
            .create_async()
            .await
    }

    /// Org lookup plus repository listing for the given repository names.
    /// The org endpoint is expected exactly once.
    pub async fn repositories(&mut self, names: &[&str]) -> Mock {
        let repos_url = format!("{}/orgs/{}/repos", self.base_url, ORG);
        let org = self
            .server
            .mock("GET", format!("/orgs/{}", ORG).as_str())
            .match_header("authorization", format!("token {}", GITHUB_TOKEN).as_str())
            .match_header("accept", "application/vnd.github.v3+json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "login": ORG, "repos_url": repos_url }).to_string())
            .expect(1)
            .create_async()
            .await;

        let repos: Vec<_> = names
            .iter()
            .map(|name| {
                json!({
                    "full_name": format!("{}/{}", ORG, name),
                    "issues_url": format!("{}/repos/{}/{}/issues{{/number}}", self.base_url, ORG, name),
                    "pulls_url": format!("{}/repos/{}/{}/pulls{{/number}}", self.base_url, ORG, name),
                })
            })
            .collect();
        self.json(&format!("/orgs/{}/repos", ORG), json!(repos)).await;
        org
    }

    pub async fn issues(&mut self, repo: &str, labels: &[&[&str]]) -> Mock {
        let issues: Vec<_> = labels
            .iter()
            .enumerate()
            .map(|(i, names)| {
                json!({
                    "number": i + 1,
                    "labels": names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>(),
                })
            })
            .collect();
        self.json(&format!("/repos/{}/{}/issues", ORG, repo), json!(issues)).await
    }

    pub async fn pulls(&mut self, repo: &str, count: usize) -> Mock {
        let pulls: Vec<_> = (0..count).map(|i| json!({ "number": i + 1 })).collect();
        self.json(&format!("/repos/{}/{}/pulls", ORG, repo), json!(pulls)).await
    }

    /// Latest-pipeline redirect plus the pipeline it points to.
    pub async fn pipeline(&mut self, repo: &str, result: &str) {
        let href = format!("{}/project/{}/{}/branch/master/pipelines/42", self.base_url, ORG, repo);
        self.server
            .mock(
                "GET",
                format!("/project/{}/{}/branch/master/pipelines/latest", ORG, repo).as_str(),
            )
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .match_header("accept", "application/vnd.snap-ci.com.v1+json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "_links": { "redirect": { "href": href } } }).to_string())
            .create_async()
            .await;
        self.json(
            &format!("/project/{}/{}/branch/master/pipelines/42", ORG, repo),
            json!({ "counter": 42, "result": result }),
        )
        .await;
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).expect("gzip write");
    enc.finish().expect("gzip finish")
}
