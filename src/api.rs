use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::USER_AGENT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8800/api/";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("api error {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut base_url = Url::parse(&base)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .cookie_store(true)
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn videos(&self) -> Result<Vec<Video>> {
        self.fetch_json(Method::GET, &["videos"], &[])
    }

    pub fn find_video(&self, id: &str) -> Result<Video> {
        self.fetch_json(Method::GET, &["videos", "find", id], &[])
    }

    pub fn search_videos(&self, query: &str) -> Result<Vec<Video>> {
        let params = [("q".to_string(), query.to_string())];
        self.fetch_json(Method::GET, &["videos", "search"], &params)
    }

    pub fn search_by_tags(&self, query: &str) -> Result<Vec<Video>> {
        let params = [("q".to_string(), query.to_string())];
        self.fetch_json(Method::GET, &["videos", "specificTags"], &params)
    }

    pub fn comments(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.fetch_json(Method::GET, &["comments", video_id], &[])
    }

    pub fn find_user(&self, id: &str) -> Result<User> {
        self.fetch_json(Method::GET, &["users", "find", id], &[])
    }

    pub fn like(&self, video_id: &str) -> Result<()> {
        self.request(Method::PUT, &["users", "like", video_id], &[])?;
        Ok(())
    }

    pub fn dislike(&self, video_id: &str) -> Result<()> {
        self.request(Method::PUT, &["users", "dislike", video_id], &[])?;
        Ok(())
    }

    pub fn subscribe(&self, channel_id: &str) -> Result<()> {
        self.request(Method::PUT, &["users", "sub", channel_id], &[])?;
        Ok(())
    }

    pub fn unsubscribe(&self, channel_id: &str) -> Result<()> {
        self.request(Method::PUT, &["users", "unsub", channel_id], &[])?;
        Ok(())
    }

    pub fn add_to_library(&self, user_id: &str, video_id: &str) -> Result<LibraryUpdate> {
        self.fetch_json(Method::PUT, &["users", "library", user_id, video_id], &[])
    }

    pub fn remove_from_library(&self, user_id: &str, video_id: &str) -> Result<LibraryUpdate> {
        self.fetch_json(Method::DELETE, &["users", "library", user_id, video_id], &[])
    }

    pub fn logout(&self) -> Result<()> {
        self.request(Method::POST, &["auth", "logout"], &[])?;
        Ok(())
    }

    fn fetch_json<T>(
        &self,
        method: Method,
        segments: &[&str],
        params: &[(String, String)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = self.request(method, segments, params)?;
        resp.json()
            .with_context(|| format!("api: decode response for /{}", segments.join("/")))
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        params: &[(String, String)],
    ) -> Result<Response> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api: base url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone());
        let resp = req.send()?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let message = error_message(&resp.text().unwrap_or_default());
            match status.as_u16() {
                401 => bail!(ApiError::Unauthorized),
                403 => bail!(ApiError::Forbidden),
                404 => bail!(ApiError::NotFound),
                429 => bail!(ApiError::RateLimited(message)),
                code => bail!(ApiError::Status {
                    status: code,
                    message
                }),
            }
        }
    }
}

/// The backend wraps failures in `{"success": false, "status": …, "message": …}`.
/// Fall back to the raw body when the envelope is absent or malformed.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        message: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope {
            message: Some(message),
        }) => message,
        _ => body.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub subscribers: i64,
    #[serde(default, rename = "subscribedUsers")]
    pub subscribed_users: Vec<String>,
    #[serde(default)]
    pub library: Vec<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, rename = "imgUrl")]
    pub img_url: String,
    #[serde(default, rename = "videoUrl")]
    pub video_url: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Authoritative library set returned by the library PUT/DELETE endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryUpdate {
    #[serde(default)]
    pub library: Vec<String>,
}
