use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use tubeview::api::{Comment, User, Video};
use tubeview::app::{App, Services};
use tubeview::data::{
    MockAuthService, MockChannelService, MockCommentService, MockInteractionService,
    MockVideoService, VideoService,
};

fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        name: id.to_string(),
        img: String::new(),
        subscribers: 0,
        subscribed_users: Vec::new(),
        library: Vec::new(),
        created_at: None,
    }
}

fn video(id: &str, owner: &str) -> Video {
    Video {
        id: id.to_string(),
        user_id: owner.to_string(),
        title: format!("video {id}"),
        desc: String::new(),
        img_url: String::new(),
        video_url: String::new(),
        views: 0,
        tags: Vec::new(),
        likes: Vec::new(),
        dislikes: Vec::new(),
        created_at: None,
    }
}

fn comment(id: &str, video_id: &str) -> Comment {
    Comment {
        id: id.to_string(),
        user_id: "someone".to_string(),
        video_id: video_id.to_string(),
        desc: format!("comment {id}"),
        created_at: None,
    }
}

/// Delegates to the plain mock after an optional per-video delay, to
/// hold a fetch in flight while the test navigates away.
struct SlowVideoService {
    inner: MockVideoService,
    delays: HashMap<String, Duration>,
}

impl SlowVideoService {
    fn new(videos: Vec<Video>, delays: HashMap<String, Duration>) -> Self {
        Self {
            inner: MockVideoService::with_videos(videos),
            delays,
        }
    }
}

impl VideoService for SlowVideoService {
    fn list(&self) -> Result<Vec<Video>> {
        self.inner.list()
    }

    fn find(&self, id: &str) -> Result<Video> {
        if let Some(delay) = self.delays.get(id) {
            thread::sleep(*delay);
        }
        self.inner.find(id)
    }

    fn search_titles(&self, query: &str) -> Result<Vec<Video>> {
        self.inner.search_titles(query)
    }

    fn search_tags(&self, query: &str) -> Result<Vec<Video>> {
        self.inner.search_tags(query)
    }
}

fn services_with(
    videos: Arc<dyn VideoService>,
    comments: Vec<Comment>,
    users: Vec<User>,
) -> Services {
    Services {
        videos,
        comments: Arc::new(MockCommentService::with_comments(comments)),
        channels: Arc::new(MockChannelService::with_users(users)),
        interactions: Arc::new(MockInteractionService::default()),
        auth: Arc::new(MockAuthService::default()),
    }
}

fn poll_until(app: &mut App, deadline: Duration, mut done: impl FnMut(&App) -> bool) {
    let until = Instant::now() + deadline;
    loop {
        app.poll();
        if done(app) {
            return;
        }
        assert!(Instant::now() < until, "condition never became true");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn late_response_cannot_overwrite_newer_navigation() {
    let mut delays = HashMap::new();
    delays.insert("va".to_string(), Duration::from_millis(150));
    let videos: Arc<dyn VideoService> = Arc::new(SlowVideoService::new(
        vec![video("va", "u1"), video("vb", "u2")],
        delays,
    ));
    let mut app = App::with_services(
        services_with(videos, Vec::new(), vec![user("u1"), user("u2")]),
        Duration::from_secs(60),
    );

    // navigate to A, then immediately away to B while A is in flight
    app.watch.open("va");
    app.watch.open("vb");
    poll_until(&mut app, Duration::from_secs(5), |app| {
        app.watch.video().is_some()
    });
    assert_eq!(app.watch.video().unwrap().id, "vb");
    assert_eq!(app.watch.channel().unwrap().id, "u2");

    // let A's stale response arrive and be discarded
    thread::sleep(Duration::from_millis(250));
    app.poll();
    assert_eq!(app.watch.video().unwrap().id, "vb");
    assert_eq!(app.watch.channel().unwrap().id, "u2");
}

#[test]
fn notification_feed_spans_all_owned_videos() {
    let videos: Arc<dyn VideoService> = Arc::new(MockVideoService::with_videos(vec![
        video("v1", "u1"),
        video("v2", "u1"),
        video("v3", "someone-else"),
    ]));
    let comments = vec![
        comment("c1", "v1"),
        comment("c2", "v2"),
        comment("c3", "v2"),
        comment("c4", "v3"),
    ];
    let mut app = App::with_services(
        services_with(videos, comments, vec![user("u1")]),
        Duration::from_secs(60),
    );

    app.session.sign_in(user("u1"));
    poll_until(&mut app, Duration::from_secs(5), |app| {
        !app.navbar.notifications().is_empty()
    });

    let mut ids: Vec<&str> = app
        .navbar
        .notifications()
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
}

#[test]
fn feed_from_previous_user_is_discarded_after_switch() {
    let videos: Arc<dyn VideoService> = Arc::new(MockVideoService::with_videos(vec![video(
        "v1", "u1",
    )]));
    let mut app = App::with_services(
        services_with(videos, vec![comment("c1", "v1")], vec![user("u1")]),
        Duration::from_secs(60),
    );

    app.session.sign_in(user("u1"));
    poll_until(&mut app, Duration::from_secs(5), |app| {
        !app.navbar.notifications().is_empty()
    });

    // u2 owns nothing; the refresh triggered by the user change must
    // leave an empty feed even though u1's feed had entries
    app.session.sign_in(user("u2"));
    app.poll();
    thread::sleep(Duration::from_millis(100));
    app.poll();
    assert!(app.navbar.notifications().is_empty());
}

#[test]
fn full_watch_flow_with_mock_services() {
    let videos: Arc<dyn VideoService> = Arc::new(MockVideoService::with_videos(vec![video(
        "v1", "u2",
    )]));
    let mut app = App::with_services(
        services_with(videos, Vec::new(), vec![user("u2")]),
        Duration::from_secs(60),
    );

    app.session.sign_in(user("u1"));
    app.watch.open("v1");
    poll_until(&mut app, Duration::from_secs(5), |app| {
        app.watch.video().is_some()
    });

    assert!(app.watch.like().is_none());
    assert!(app.watch.is_liked());

    assert!(app.watch.subscribe().is_none());
    assert!(app.watch.is_subscribed());

    app.watch.save();
    poll_until(&mut app, Duration::from_secs(5), |app| app.watch.is_saved());
    assert_eq!(app.session.current().unwrap().library, vec!["v1"]);

    let route = app.navbar.logout();
    assert_eq!(route.to_path(), "/");
    assert!(!app.session.is_signed_in());
    assert!(!app.watch.is_liked());
    assert!(!app.watch.is_saved());
    assert!(!app.watch.is_subscribed());
}
