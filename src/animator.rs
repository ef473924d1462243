//! Playback capability consumed by the flow engine.
//!
//! The flow never assumes a specific playback engine. States only call the
//! [`Animator`] contract: start a clip, set its loop policy and, for
//! hold-frame states, pin a frame. [`SpriteAnimator`] is the engine's own
//! sprite-sheet implementation backed by an
//! [`AnimationStore`](crate::resources::animationstore::AnimationStore).
//!
//! # Related
//!
//! - [`crate::components::parameters::ParameterContext`] – holds the animator handle
//! - [`crate::components::flowstate::FlowState`] – calls the animator from its hooks

use log::{trace, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::resources::animationstore::{AnimationResource, AnimationStore};

/// Minimal playback contract a host supplies to a flow controller.
///
/// Only `play`, `set_looping` and `available_animations` are mandatory. The
/// remaining hooks have no-op defaults for engines that cannot seek or report
/// completion.
pub trait Animator: Send + Sync {
    /// Start playing the named animation from its first frame.
    fn play(&mut self, animation: &str);

    /// Set whether the current animation restarts after its last frame.
    fn set_looping(&mut self, looping: bool);

    /// Names of every animation this animator can play.
    fn available_animations(&self) -> Vec<String>;

    /// Pin playback on a specific frame index.
    fn set_frame(&mut self, _frame: usize) {}

    /// True once a non-looping animation has shown its last frame.
    fn is_finished(&self) -> bool {
        false
    }

    /// Advance playback by `dt` seconds.
    fn advance(&mut self, _dt: f32) {}
}

/// Playback cursor of a [`SpriteAnimator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpritePlayback {
    pub animation_key: String,
    pub frame_index: usize,
    pub elapsed_time: f32,
    pub looping: bool,
    /// Frame pinned by a hold-frame state; frames do not advance while set.
    pub held_frame: Option<usize>,
    pub finished: bool,
}

/// Sprite-sheet animator driven by clip definitions.
#[derive(Debug, Clone, Default)]
pub struct SpriteAnimator {
    clips: FxHashMap<String, AnimationResource>,
    playback: SpritePlayback,
}

impl SpriteAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an animator that can play every clip in `store`.
    pub fn from_store(store: &AnimationStore) -> Self {
        Self {
            clips: store.animations.clone(),
            playback: SpritePlayback::default(),
        }
    }

    pub fn with_clip(mut self, name: impl Into<String>, clip: AnimationResource) -> Self {
        self.clips.insert(name.into(), clip);
        self
    }

    /// Current playback cursor.
    pub fn playback(&self) -> &SpritePlayback {
        &self.playback
    }

    pub fn current_frame(&self) -> usize {
        self.playback.frame_index
    }
}

impl Animator for SpriteAnimator {
    fn play(&mut self, animation: &str) {
        if !self.clips.contains_key(animation) {
            warn!("SpriteAnimator: unknown animation '{}'", animation);
        }
        let looping = self
            .clips
            .get(animation)
            .map(|clip| clip.looped)
            .unwrap_or(false);
        self.playback = SpritePlayback {
            animation_key: animation.to_string(),
            looping,
            ..SpritePlayback::default()
        };
    }

    fn set_looping(&mut self, looping: bool) {
        self.playback.looping = looping;
    }

    fn available_animations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clips.keys().cloned().collect();
        names.sort();
        names
    }

    fn set_frame(&mut self, frame: usize) {
        let last = self
            .clips
            .get(&self.playback.animation_key)
            .map(|clip| clip.frame_count.saturating_sub(1))
            .unwrap_or(0);
        let frame = frame.min(last);
        self.playback.frame_index = frame;
        self.playback.elapsed_time = 0.0;
        self.playback.held_frame = Some(frame);
    }

    fn is_finished(&self) -> bool {
        self.playback.finished
    }

    fn advance(&mut self, dt: f32) {
        let Some(clip) = self.clips.get(&self.playback.animation_key) else {
            return;
        };
        if self.playback.held_frame.is_some() || self.playback.finished {
            return;
        }
        if clip.fps <= 0.0 || clip.frame_count == 0 {
            return;
        }

        self.playback.elapsed_time += dt;
        let frame_duration = 1.0 / clip.fps;
        if self.playback.elapsed_time < frame_duration {
            return;
        }

        // whole frames elapsed; saturates for very large deltas
        let steps = (self.playback.elapsed_time / frame_duration).floor() as usize;
        self.playback.elapsed_time %= frame_duration;

        if self.playback.looping {
            self.playback.frame_index =
                (self.playback.frame_index + steps % clip.frame_count) % clip.frame_count;
        } else if steps >= clip.frame_count - self.playback.frame_index.min(clip.frame_count) {
            // stay on last frame
            self.playback.frame_index = clip.frame_count - 1;
            self.playback.elapsed_time = 0.0;
            self.playback.finished = true;
            trace!("SpriteAnimator: '{}' finished", self.playback.animation_key);
        } else {
            self.playback.frame_index += steps;
        }
    }
}
