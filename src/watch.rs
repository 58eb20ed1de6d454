use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::api::{User, Video};
use crate::data::{ChannelService, InteractionService, VideoService};
use crate::route::Route;
use crate::session::Session;

/// Reaction transitions applied to a video's like/dislike sets.
/// Reactions are mutually exclusive: picking one always clears the
/// other, and `Undo` retracts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Like,
    Dislike,
    Undo,
}

/// Pure transition over the video's reaction sets. Idempotent per
/// action: liking an already-liked video changes nothing.
pub fn apply_reaction(video: &mut Video, user_id: &str, action: ReactionAction) {
    match action {
        ReactionAction::Like => {
            remove_id(&mut video.dislikes, user_id);
            insert_id(&mut video.likes, user_id);
        }
        ReactionAction::Dislike => {
            remove_id(&mut video.likes, user_id);
            insert_id(&mut video.dislikes, user_id);
        }
        ReactionAction::Undo => {
            remove_id(&mut video.likes, user_id);
            remove_id(&mut video.dislikes, user_id);
        }
    }
}

fn insert_id(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

fn remove_id(ids: &mut Vec<String>, id: &str) {
    ids.retain(|existing| existing != id);
}

/// Human-readable view count: `999` stays numeric, then one decimal
/// with K/M/B/T suffixes and a trailing `.0` dropped, so exactly
/// `1000` renders as `1K`.
pub fn format_views(views: u64) -> String {
    const STEPS: [(u64, &str); 4] = [
        (1_000_000_000_000, "T"),
        (1_000_000_000, "B"),
        (1_000_000, "M"),
        (1_000, "K"),
    ];
    for (divisor, suffix) in STEPS {
        if views >= divisor {
            let scaled = (views as f64 / divisor as f64 * 10.0).round() / 10.0;
            return if scaled.fract() == 0.0 {
                format!("{}{}", scaled as u64, suffix)
            } else {
                format!("{scaled:.1}{suffix}")
            };
        }
    }
    views.to_string()
}

struct PendingVideo {
    request_id: u64,
    video_id: String,
}

struct PendingLibrary {
    request_id: u64,
}

enum WatchResponse {
    Loaded {
        request_id: u64,
        video_id: String,
        result: Result<(Video, User)>,
    },
    Library {
        request_id: u64,
        result: Result<Vec<String>>,
    },
    Reaction {
        action: ReactionAction,
        result: Result<()>,
    },
    Subscription {
        subscribed: bool,
        result: Result<()>,
    },
}

/// Watch-page controller: holds the current video and its channel,
/// exposes the interaction handlers, and keeps the derived membership
/// flags consistent with the session.
pub struct Watch {
    session: Arc<Session>,
    videos: Arc<dyn VideoService>,
    channels: Arc<dyn ChannelService>,
    interactions: Arc<dyn InteractionService>,
    video: Option<Video>,
    channel: Option<User>,
    pending: Option<PendingVideo>,
    pending_library: Option<PendingLibrary>,
    next_request_id: u64,
    response_tx: Sender<WatchResponse>,
    response_rx: Receiver<WatchResponse>,
}

impl Watch {
    pub fn new(
        session: Arc<Session>,
        videos: Arc<dyn VideoService>,
        channels: Arc<dyn ChannelService>,
        interactions: Arc<dyn InteractionService>,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            session,
            videos,
            channels,
            interactions,
            video: None,
            channel: None,
            pending: None,
            pending_library: None,
            next_request_id: 1,
            response_tx,
            response_rx,
        }
    }

    pub fn video(&self) -> Option<&Video> {
        self.video.as_ref()
    }

    pub fn channel(&self) -> Option<&User> {
        self.channel.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Load a video and, strictly after it, the owning channel. A call
    /// supersedes any load still in flight: the older response is
    /// discarded on commit, so rapid navigation cannot publish stale
    /// data over the newer view.
    pub fn open(&mut self, video_id: &str) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending = Some(PendingVideo {
            request_id,
            video_id: video_id.to_string(),
        });

        let videos = self.videos.clone();
        let channels = self.channels.clone();
        let tx = self.response_tx.clone();
        let video_id = video_id.to_string();
        thread::spawn(move || {
            let result: Result<(Video, User)> = (|| {
                let video = videos.find(&video_id).context("fetch video")?;
                let channel = channels.find(&video.user_id).context("fetch channel")?;
                Ok((video, channel))
            })();
            let _ = tx.send(WatchResponse::Loaded {
                request_id,
                video_id,
                result,
            });
        });
    }

    /// Drain worker responses and commit the ones that still match a
    /// pending request.
    pub fn poll(&mut self) {
        while let Ok(response) = self.response_rx.try_recv() {
            match response {
                WatchResponse::Loaded {
                    request_id,
                    video_id,
                    result,
                } => {
                    let matches = self
                        .pending
                        .as_ref()
                        .map_or(false, |p| p.request_id == request_id && p.video_id == video_id);
                    if !matches {
                        log::debug!("watch: discarding superseded load for {video_id}");
                        continue;
                    }
                    self.pending = None;
                    match result {
                        Ok((video, channel)) => {
                            self.video = Some(video);
                            self.channel = Some(channel);
                        }
                        // prior video stays in place
                        Err(err) => log::warn!("watch: load failed for {video_id}: {err:#}"),
                    }
                }
                WatchResponse::Library { request_id, result } => {
                    let matches = self
                        .pending_library
                        .as_ref()
                        .map_or(false, |p| p.request_id == request_id);
                    if !matches {
                        log::debug!("watch: discarding superseded library update");
                        continue;
                    }
                    self.pending_library = None;
                    match result {
                        Ok(library) => self.session.replace_library(library),
                        Err(err) => log::warn!("watch: library update failed: {err:#}"),
                    }
                }
                WatchResponse::Reaction { action, result } => {
                    if let Err(err) = result {
                        // no rollback; the next full fetch reconciles
                        log::warn!("watch: {action:?} failed: {err:#}");
                    }
                }
                WatchResponse::Subscription { subscribed, result } => {
                    if let Err(err) = result {
                        let verb = if subscribed { "subscribe" } else { "unsubscribe" };
                        log::warn!("watch: {verb} failed: {err:#}");
                    }
                }
            }
        }
    }

    pub fn is_liked(&self) -> bool {
        match (self.session.user_id(), self.video.as_ref()) {
            (Some(user_id), Some(video)) => video.likes.iter().any(|id| *id == user_id),
            _ => false,
        }
    }

    pub fn is_disliked(&self) -> bool {
        match (self.session.user_id(), self.video.as_ref()) {
            (Some(user_id), Some(video)) => video.dislikes.iter().any(|id| *id == user_id),
            _ => false,
        }
    }

    pub fn is_saved(&self) -> bool {
        match (self.session.current(), self.video.as_ref()) {
            (Some(user), Some(video)) => user.library.contains(&video.id),
            _ => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        match (self.session.current(), self.channel.as_ref()) {
            (Some(user), Some(channel)) => user.subscribed_users.contains(&channel.id),
            _ => false,
        }
    }

    pub fn like(&mut self) -> Option<Route> {
        let retract = self.is_liked();
        self.react(ReactionAction::Like, retract)
    }

    pub fn dislike(&mut self) -> Option<Route> {
        let retract = self.is_disliked();
        self.react(ReactionAction::Dislike, retract)
    }

    /// Sends the reaction PUT (the server toggles membership on its
    /// side) and optimistically applies the matching transition: the
    /// reaction itself, or `Undo` when the user is retracting one they
    /// already made. Signed-out users are routed to sign-in and never
    /// reach the network.
    fn react(&mut self, reaction: ReactionAction, retract: bool) -> Option<Route> {
        let Some(user_id) = self.session.user_id() else {
            return Some(Route::SignIn);
        };
        let Some(video) = self.video.as_mut() else {
            return None;
        };

        let interactions = self.interactions.clone();
        let tx = self.response_tx.clone();
        let video_id = video.id.clone();
        thread::spawn(move || {
            let result = match reaction {
                ReactionAction::Like => interactions.like(&video_id).context("send like"),
                ReactionAction::Dislike => interactions.dislike(&video_id).context("send dislike"),
                // Undo never originates a request of its own
                ReactionAction::Undo => Ok(()),
            };
            let _ = tx.send(WatchResponse::Reaction {
                action: reaction,
                result,
            });
        });

        let action = if retract {
            ReactionAction::Undo
        } else {
            reaction
        };
        apply_reaction(video, &user_id, action);
        None
    }

    /// Library toggle. Unlike reactions this path is fetch-and-replace:
    /// the response carries the authoritative library set, which
    /// replaces the session's copy on commit.
    pub fn save(&mut self) -> Option<Route> {
        let Some(user) = self.session.current() else {
            return Some(Route::SignIn);
        };
        let Some(video) = self.video.as_ref() else {
            return None;
        };

        let saved = user.library.contains(&video.id);
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_library = Some(PendingLibrary { request_id });

        let interactions = self.interactions.clone();
        let tx = self.response_tx.clone();
        let user_id = user.id;
        let video_id = video.id.clone();
        thread::spawn(move || {
            let result = if saved {
                interactions
                    .remove_from_library(&user_id, &video_id)
                    .context("remove from library")
            } else {
                interactions
                    .add_to_library(&user_id, &video_id)
                    .context("add to library")
            };
            let _ = tx.send(WatchResponse::Library { request_id, result });
        });
        None
    }

    /// Subscription toggle against the loaded channel; a no-op while
    /// the channel is still loading.
    pub fn subscribe(&mut self) -> Option<Route> {
        let Some(user) = self.session.current() else {
            return Some(Route::SignIn);
        };
        let Some(channel) = self.channel.as_ref() else {
            return None;
        };

        let subscribed = user.subscribed_users.contains(&channel.id);
        let interactions = self.interactions.clone();
        let tx = self.response_tx.clone();
        let channel_id = channel.id.clone();
        thread::spawn(move || {
            let result = if subscribed {
                interactions.unsubscribe(&channel_id).context("unsubscribe")
            } else {
                interactions.subscribe(&channel_id).context("subscribe")
            };
            let _ = tx.send(WatchResponse::Subscription {
                subscribed: !subscribed,
                result,
            });
        });

        self.session.set_subscribed(&channel.id, !subscribed);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockChannelService, MockInteractionService, MockVideoService};
    use std::time::{Duration, Instant};

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
            title: String::new(),
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

    fn watch_with(
        session: Arc<Session>,
        videos: Vec<Video>,
        users: Vec<User>,
        interactions: Arc<MockInteractionService>,
    ) -> Watch {
        Watch::new(
            session,
            Arc::new(MockVideoService::with_videos(videos)),
            Arc::new(MockChannelService::with_users(users)),
            interactions,
        )
    }

    fn wait_for_load(watch: &mut Watch) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while watch.is_loading() {
            watch.poll();
            assert!(Instant::now() < deadline, "load did not settle");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_for_library(watch: &mut Watch) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while watch.pending_library.is_some() {
            watch.poll();
            assert!(Instant::now() < deadline, "library update did not settle");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    // worker threads record calls asynchronously, so wait for the count
    // and compare without depending on their completion order
    fn wait_for_calls(interactions: &MockInteractionService, expected: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let mut calls = interactions.calls();
            if calls.len() >= expected {
                calls.sort_unstable();
                return calls;
            }
            assert!(Instant::now() < deadline, "calls never arrived");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn formats_view_counts() {
        assert_eq!(format_views(0), "0");
        assert_eq!(format_views(999), "999");
        assert_eq!(format_views(1000), "1K");
        assert_eq!(format_views(1500), "1.5K");
        assert_eq!(format_views(999_999), "1000K");
        assert_eq!(format_views(1_000_000), "1M");
        assert_eq!(format_views(2_340_000), "2.3M");
        assert_eq!(format_views(1_000_000_000), "1B");
        assert_eq!(format_views(1_200_000_000_000), "1.2T");
    }

    #[test]
    fn reactions_are_mutually_exclusive() {
        let mut v = video("v1", "u2");
        apply_reaction(&mut v, "u1", ReactionAction::Dislike);
        assert_eq!(v.dislikes, vec!["u1"]);

        apply_reaction(&mut v, "u1", ReactionAction::Like);
        assert_eq!(v.likes, vec!["u1"]);
        assert!(v.dislikes.is_empty());

        // idempotent
        apply_reaction(&mut v, "u1", ReactionAction::Like);
        assert_eq!(v.likes, vec!["u1"]);

        apply_reaction(&mut v, "u1", ReactionAction::Undo);
        assert!(v.likes.is_empty());
        assert!(v.dislikes.is_empty());
    }

    #[test]
    fn unauthenticated_actions_never_reach_the_network() {
        let session = Arc::new(Session::new());
        let interactions = Arc::new(MockInteractionService::default());
        let mut watch = watch_with(
            session,
            vec![video("v1", "u2")],
            vec![user("u2")],
            interactions.clone(),
        );
        watch.open("v1");
        wait_for_load(&mut watch);

        assert_eq!(watch.like(), Some(Route::SignIn));
        assert_eq!(watch.dislike(), Some(Route::SignIn));
        assert_eq!(watch.save(), Some(Route::SignIn));
        assert_eq!(watch.subscribe(), Some(Route::SignIn));
        assert!(interactions.calls().is_empty());
    }

    #[test]
    fn like_flips_flags_optimistically() {
        let session = Arc::new(Session::new());
        session.sign_in(user("u1"));
        let interactions = Arc::new(MockInteractionService::default());
        let mut watch = watch_with(
            session,
            vec![video("v1", "u2")],
            vec![user("u2")],
            interactions.clone(),
        );
        watch.open("v1");
        wait_for_load(&mut watch);

        assert!(watch.like().is_none());
        assert!(watch.is_liked());
        assert!(!watch.is_disliked());

        assert!(watch.dislike().is_none());
        assert!(watch.is_disliked());
        assert!(!watch.is_liked());

        // retracting an existing dislike goes back to neutral
        assert!(watch.dislike().is_none());
        assert!(!watch.is_disliked());
        assert!(!watch.is_liked());

        let calls = wait_for_calls(&interactions, 3);
        assert_eq!(calls, vec!["dislike:v1", "dislike:v1", "like:v1"]);
    }

    #[test]
    fn save_round_trip_restores_library() {
        let session = Arc::new(Session::new());
        session.sign_in(user("u1"));
        let interactions = Arc::new(MockInteractionService::with_library(vec!["v9".into()]));
        let mut watch = watch_with(
            session.clone(),
            vec![video("v1", "u2")],
            vec![user("u2")],
            interactions,
        );
        watch.open("v1");
        wait_for_load(&mut watch);

        assert!(!watch.is_saved());
        watch.save();
        wait_for_library(&mut watch);
        assert!(watch.is_saved());
        assert_eq!(
            session.current().unwrap().library,
            vec!["v9".to_string(), "v1".to_string()]
        );

        watch.save();
        wait_for_library(&mut watch);
        assert!(!watch.is_saved());
        assert_eq!(session.current().unwrap().library, vec!["v9".to_string()]);
    }

    #[test]
    fn subscribe_toggles_channel_membership() {
        let session = Arc::new(Session::new());
        session.sign_in(user("u1"));
        let interactions = Arc::new(MockInteractionService::default());
        let mut watch = watch_with(
            session.clone(),
            vec![video("v1", "u2")],
            vec![user("u2")],
            interactions.clone(),
        );

        // channel not loaded yet: defensive no-op
        assert!(watch.subscribe().is_none());
        assert!(interactions.calls().is_empty());

        watch.open("v1");
        wait_for_load(&mut watch);

        watch.subscribe();
        assert!(watch.is_subscribed());
        watch.subscribe();
        assert!(!watch.is_subscribed());
        let calls = wait_for_calls(&interactions, 2);
        assert_eq!(calls, vec!["sub:u2", "unsub:u2"]);
    }

    #[test]
    fn failed_load_keeps_previous_video() {
        let session = Arc::new(Session::new());
        let interactions = Arc::new(MockInteractionService::default());
        let mut watch = watch_with(
            session,
            vec![video("v1", "u2")],
            vec![user("u2")],
            interactions,
        );
        watch.open("v1");
        wait_for_load(&mut watch);
        assert_eq!(watch.video().unwrap().id, "v1");

        watch.open("missing");
        wait_for_load(&mut watch);
        assert_eq!(watch.video().unwrap().id, "v1");
    }
}
