// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote endpoint access.
//!
//! The sync stub talks to a generic public list-of-posts endpoint. Posts have
//! nothing to do with quotes, they are simply relabeled as quotes once fetched.
//! Only four requests are ever made:
//!
//! - `GET /posts` to fetch everything.
//! - `GET /posts?_limit=1` for a cheap change check.
//! - `HEAD /posts` to probe connectivity.
//! - `POST /posts` to push a locally added quote.

use crate::config::SyncSettings;

use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tracing::{debug, instrument};

/// Post as served by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub user_id: u64,
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Post sent to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub user_id: u64,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: u64,
}

/// Layer of indirection for remote endpoint access.
pub trait Remote {
    /// Fetch posts, optionally limited to the first few.
    fn fetch_posts(&self, limit: Option<usize>) -> impl Future<Output = Result<Vec<Post>>> + Send;

    /// Check that the endpoint is reachable.
    fn probe(&self) -> impl Future<Output = Result<()>> + Send;

    /// Create new post, returning the identifier the remote assigned to it.
    fn create_post(&self, post: &NewPost) -> impl Future<Output = Result<u64>> + Send;
}

/// Remote endpoint access over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    posts_url: String,
    quick_timeout: Duration,
}

impl HttpRemote {
    /// Construct new HTTP remote from sync settings.
    ///
    /// Every request shares the flat timeout of the settings, except for quick
    /// change checks and probes which get half of it.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Http`] if HTTP client cannot be built.
    pub fn new(settings: &SyncSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            posts_url: format!("{}/posts", settings.base_url.trim_end_matches('/')),
            quick_timeout: settings.timeout() / 2,
        })
    }
}

impl Remote for HttpRemote {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<Post>> {
        let mut request = self.client.get(&self.posts_url);
        if let Some(limit) = limit {
            request = request
                .query(&[("_limit", limit)])
                .timeout(self.quick_timeout);
        }

        let posts: Vec<Post> = request.send().await?.error_for_status()?.json().await?;
        debug!("fetched {} posts from {}", posts.len(), self.posts_url);

        Ok(posts)
    }

    async fn probe(&self) -> Result<()> {
        self.client
            .head(&self.posts_url)
            .timeout(self.quick_timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    #[instrument(skip(self, post), level = "debug")]
    async fn create_post(&self, post: &NewPost) -> Result<u64> {
        let created: CreatedPost = self
            .client
            .post(&self.posts_url)
            .json(post)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("remote created post {}", created.id);

        Ok(created.id)
    }
}

/// Remote endpoint error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Request failed, timed out, or got an error status.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Friendly result alias :3
type Result<T, E = RemoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn remote_for(server: &MockServer) -> anyhow::Result<HttpRemote> {
        let settings = SyncSettings {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 2,
            ..SyncSettings::default()
        };
        Ok(HttpRemote::new(&settings)?)
    }

    #[tokio::test]
    async fn fetch_posts_decodes_list() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"userId": 1, "id": 1, "title": "first", "body": "b"},
                {"userId": 2, "id": 2, "title": "second"}
            ])))
            .mount(&server)
            .await;

        let posts = remote_for(&server)?.fetch_posts(None).await?;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].title, "second");
        assert_eq!(posts[1].body, "");

        Ok(())
    }

    #[tokio::test]
    async fn fetch_posts_passes_limit() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .and(query_param("_limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"userId": 1, "id": 1, "title": "first"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let posts = remote_for(&server)?.fetch_posts(Some(1)).await?;
        assert_eq!(posts.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn error_status_is_an_error() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let remote = remote_for(&server)?;
        assert!(remote.fetch_posts(None).await.is_err());
        assert!(remote.probe().await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn create_post_returns_assigned_id() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(body_json(json!({
                "title": "Stay hungry.",
                "body": "Author: Steve Jobs, Category: motivation",
                "userId": 1
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 101})))
            .mount(&server)
            .await;

        let post = NewPost {
            title: "Stay hungry.".into(),
            body: "Author: Steve Jobs, Category: motivation".into(),
            user_id: 1,
        };
        let id = remote_for(&server)?.create_post(&post).await?;
        assert_eq!(id, 101);

        Ok(())
    }
}
