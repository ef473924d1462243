//! Animation clip registry.
//!
//! This module provides a minimal store for animation definitions that can be
//! reused by multiple animators. A [`SpriteAnimator`](crate::animator::SpriteAnimator)
//! looks up a clip by its string key and drives playback from the immutable
//! parameters stored here.

use bevy_ecs::prelude::Resource;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Central registry of reusable animation clips keyed by name.
#[derive(Resource, Debug, Clone, Default)]
pub struct AnimationStore {
    pub animations: FxHashMap<String, AnimationResource>,
}

impl AnimationStore {
    pub fn insert(&mut self, name: impl Into<String>, clip: AnimationResource) {
        self.animations.insert(name.into(), clip);
    }

    pub fn get(&self, name: &str) -> Option<&AnimationResource> {
        self.animations.get(name)
    }
}

/// Immutable data describing a sprite-sheet animation.
///
/// Fields are intentionally simple to keep the format engine-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationResource {
    /// Number of frames in the animation.
    pub frame_count: usize,
    /// Frames per second playback speed.
    pub fps: f32,
    /// Whether the animation restarts after the last frame.
    pub looped: bool,
}
