use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rand::seq::SliceRandom;

use crate::api::{self, Comment, User, Video};

pub trait VideoService: Send + Sync {
    fn list(&self) -> Result<Vec<Video>>;
    fn find(&self, id: &str) -> Result<Video>;
    fn search_titles(&self, query: &str) -> Result<Vec<Video>>;
    fn search_tags(&self, query: &str) -> Result<Vec<Video>>;
}

pub trait CommentService: Send + Sync {
    fn for_video(&self, video_id: &str) -> Result<Vec<Comment>>;
}

pub trait ChannelService: Send + Sync {
    fn find(&self, user_id: &str) -> Result<User>;
}

pub trait InteractionService: Send + Sync {
    fn like(&self, video_id: &str) -> Result<()>;
    fn dislike(&self, video_id: &str) -> Result<()>;
    fn subscribe(&self, channel_id: &str) -> Result<()>;
    fn unsubscribe(&self, channel_id: &str) -> Result<()>;
    fn add_to_library(&self, user_id: &str, video_id: &str) -> Result<Vec<String>>;
    fn remove_from_library(&self, user_id: &str, video_id: &str) -> Result<Vec<String>>;
}

pub trait AuthService: Send + Sync {
    fn logout(&self) -> Result<()>;
}

pub struct RestVideoService {
    client: Arc<api::Client>,
}

impl RestVideoService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl VideoService for RestVideoService {
    fn list(&self) -> Result<Vec<Video>> {
        self.client.videos().context("fetch video listing")
    }

    fn find(&self, id: &str) -> Result<Video> {
        self.client
            .find_video(id)
            .with_context(|| format!("fetch video {id}"))
    }

    fn search_titles(&self, query: &str) -> Result<Vec<Video>> {
        self.client
            .search_videos(query)
            .context("search videos by title")
    }

    fn search_tags(&self, query: &str) -> Result<Vec<Video>> {
        self.client
            .search_by_tags(query)
            .context("search videos by tags")
    }
}

pub struct RestCommentService {
    client: Arc<api::Client>,
}

impl RestCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for RestCommentService {
    fn for_video(&self, video_id: &str) -> Result<Vec<Comment>> {
        self.client
            .comments(video_id)
            .with_context(|| format!("fetch comments for {video_id}"))
    }
}

pub struct RestChannelService {
    client: Arc<api::Client>,
}

impl RestChannelService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl ChannelService for RestChannelService {
    fn find(&self, user_id: &str) -> Result<User> {
        self.client
            .find_user(user_id)
            .with_context(|| format!("fetch channel {user_id}"))
    }
}

pub struct RestInteractionService {
    client: Arc<api::Client>,
}

impl RestInteractionService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl InteractionService for RestInteractionService {
    fn like(&self, video_id: &str) -> Result<()> {
        self.client.like(video_id)
    }

    fn dislike(&self, video_id: &str) -> Result<()> {
        self.client.dislike(video_id)
    }

    fn subscribe(&self, channel_id: &str) -> Result<()> {
        self.client.subscribe(channel_id)
    }

    fn unsubscribe(&self, channel_id: &str) -> Result<()> {
        self.client.unsubscribe(channel_id)
    }

    fn add_to_library(&self, user_id: &str, video_id: &str) -> Result<Vec<String>> {
        let update = self
            .client
            .add_to_library(user_id, video_id)
            .context("add to library")?;
        Ok(update.library)
    }

    fn remove_from_library(&self, user_id: &str, video_id: &str) -> Result<Vec<String>> {
        let update = self
            .client
            .remove_from_library(user_id, video_id)
            .context("remove from library")?;
        Ok(update.library)
    }
}

pub struct RestAuthService {
    client: Arc<api::Client>,
}

impl RestAuthService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl AuthService for RestAuthService {
    fn logout(&self) -> Result<()> {
        self.client.logout().context("server logout")
    }
}

pub struct MockVideoService {
    videos: Vec<Video>,
}

impl MockVideoService {
    pub fn with_videos(videos: Vec<Video>) -> Self {
        Self { videos }
    }
}

impl Default for MockVideoService {
    fn default() -> Self {
        Self {
            videos: sample_videos(),
        }
    }
}

impl VideoService for MockVideoService {
    fn list(&self) -> Result<Vec<Video>> {
        Ok(self.videos.clone())
    }

    fn find(&self, id: &str) -> Result<Video> {
        match self.videos.iter().find(|video| video.id == id) {
            Some(video) => Ok(video.clone()),
            None => bail!("mock: video {} not found", id),
        }
    }

    fn search_titles(&self, query: &str) -> Result<Vec<Video>> {
        let needle = query.to_lowercase();
        Ok(self
            .videos
            .iter()
            .filter(|video| video.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn search_tags(&self, query: &str) -> Result<Vec<Video>> {
        Ok(self
            .videos
            .iter()
            .filter(|video| video.tags.iter().any(|tag| tag == query))
            .cloned()
            .collect())
    }
}

pub struct MockCommentService {
    comments: Vec<Comment>,
}

impl MockCommentService {
    pub fn with_comments(comments: Vec<Comment>) -> Self {
        Self { comments }
    }
}

impl Default for MockCommentService {
    fn default() -> Self {
        Self {
            comments: sample_comments(),
        }
    }
}

impl CommentService for MockCommentService {
    fn for_video(&self, video_id: &str) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .iter()
            .filter(|comment| comment.video_id == video_id)
            .cloned()
            .collect())
    }
}

pub struct MockChannelService {
    users: Vec<User>,
}

impl MockChannelService {
    pub fn with_users(users: Vec<User>) -> Self {
        Self { users }
    }
}

impl Default for MockChannelService {
    fn default() -> Self {
        Self {
            users: sample_users(),
        }
    }
}

impl ChannelService for MockChannelService {
    fn find(&self, user_id: &str) -> Result<User> {
        match self.users.iter().find(|user| user.id == user_id) {
            Some(user) => Ok(user.clone()),
            None => bail!("mock: user {} not found", user_id),
        }
    }
}

/// Records every call it receives and keeps an in-memory library, so the
/// library endpoints answer with an authoritative set like the backend.
#[derive(Default)]
pub struct MockInteractionService {
    calls: Mutex<Vec<String>>,
    library: Mutex<Vec<String>>,
}

impl MockInteractionService {
    pub fn with_library(library: Vec<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            library: Mutex::new(library),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl InteractionService for MockInteractionService {
    fn like(&self, video_id: &str) -> Result<()> {
        self.record(format!("like:{video_id}"));
        Ok(())
    }

    fn dislike(&self, video_id: &str) -> Result<()> {
        self.record(format!("dislike:{video_id}"));
        Ok(())
    }

    fn subscribe(&self, channel_id: &str) -> Result<()> {
        self.record(format!("sub:{channel_id}"));
        Ok(())
    }

    fn unsubscribe(&self, channel_id: &str) -> Result<()> {
        self.record(format!("unsub:{channel_id}"));
        Ok(())
    }

    fn add_to_library(&self, user_id: &str, video_id: &str) -> Result<Vec<String>> {
        self.record(format!("library+:{user_id}:{video_id}"));
        let mut library = self.library.lock();
        if !library.iter().any(|id| id == video_id) {
            library.push(video_id.to_string());
        }
        Ok(library.clone())
    }

    fn remove_from_library(&self, user_id: &str, video_id: &str) -> Result<Vec<String>> {
        self.record(format!("library-:{user_id}:{video_id}"));
        let mut library = self.library.lock();
        library.retain(|id| id != video_id);
        Ok(library.clone())
    }
}

/// Counts logouts; an optional delay simulates the server round trip.
#[derive(Default)]
pub struct MockAuthService {
    delay: Option<Duration>,
    logouts: AtomicUsize,
}

impl MockAuthService {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            logouts: AtomicUsize::new(0),
        }
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl AuthService for MockAuthService {
    fn logout(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn sample_users() -> Vec<User> {
    vec![
        User {
            id: "u1".into(),
            name: "ada".into(),
            img: "https://cdn.tubeview.dev/avatars/u1.png".into(),
            subscribers: 1280,
            subscribed_users: vec!["u2".into()],
            library: vec!["v2".into()],
            created_at: None,
        },
        User {
            id: "u2".into(),
            name: "grace".into(),
            img: "https://cdn.tubeview.dev/avatars/u2.png".into(),
            subscribers: 44,
            subscribed_users: Vec::new(),
            library: Vec::new(),
            created_at: None,
        },
    ]
}

pub fn sample_videos() -> Vec<Video> {
    let mut videos = vec![
        Video {
            id: "v1".into(),
            user_id: "u1".into(),
            title: "Building a terminal client".into(),
            desc: "Walkthrough of the data layer.".into(),
            img_url: String::new(),
            video_url: "https://cdn.tubeview.dev/v1.mp4".into(),
            views: 1500,
            tags: vec!["rust".into(), "tui".into()],
            likes: vec!["u2".into()],
            dislikes: Vec::new(),
            created_at: None,
        },
        Video {
            id: "v2".into(),
            user_id: "u2".into(),
            title: "Cooking with threads".into(),
            desc: "Fan-out and join, gently.".into(),
            img_url: String::new(),
            video_url: "https://cdn.tubeview.dev/v2.mp4".into(),
            views: 999,
            tags: vec!["concurrency".into()],
            likes: Vec::new(),
            dislikes: Vec::new(),
            created_at: None,
        },
        Video {
            id: "v3".into(),
            user_id: "u1".into(),
            title: "Q&A stream".into(),
            desc: String::new(),
            img_url: String::new(),
            video_url: "https://cdn.tubeview.dev/v3.mp4".into(),
            views: 1_200_000,
            tags: vec!["stream".into(), "rust".into()],
            likes: Vec::new(),
            dislikes: vec!["u2".into()],
            created_at: None,
        },
    ];

    let mut rng = rand::thread_rng();
    videos.shuffle(&mut rng);
    videos
}

pub fn sample_comments() -> Vec<Comment> {
    vec![
        Comment {
            id: "c1".into(),
            user_id: "u2".into(),
            video_id: "v1".into(),
            desc: "Great walkthrough!".into(),
            created_at: None,
        },
        Comment {
            id: "c2".into(),
            user_id: "u1".into(),
            video_id: "v2".into(),
            desc: "Subscribed.".into(),
            created_at: None,
        },
        Comment {
            id: "c3".into(),
            user_id: "u2".into(),
            video_id: "v3".into(),
            desc: "When is the next stream?".into(),
            created_at: None,
        },
    ]
}
