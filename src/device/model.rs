//! Supported instrument models and their channel ratings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protection limits may exceed the channel rating by this factor.
pub const PROTECTION_HEADROOM: f64 = 1.1;

/// Rated output of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRating {
    /// Channel number, starting at 1.
    pub channel: u8,
    pub max_voltage: f64,
    pub max_current: f64,
}

impl ChannelRating {
    const fn new(channel: u8, max_voltage: f64, max_current: f64) -> Self {
        Self {
            channel,
            max_voltage,
            max_current,
        }
    }

    /// Highest accepted OVP trip level.
    pub fn max_ovp(&self) -> f64 {
        self.max_voltage * PROTECTION_HEADROOM
    }

    /// Highest accepted OCP trip level.
    pub fn max_ocp(&self) -> f64 {
        self.max_current * PROTECTION_HEADROOM
    }
}

/// Instrument models the driver knows the channel layout of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "DP832")]
    Dp832,
    #[serde(rename = "DP821")]
    Dp821,
    #[serde(rename = "DP712")]
    Dp712,
}

/// Model name as reported in the identity reply, with its channel table.
struct ModelProfile {
    model: Model,
    name: &'static str,
    channels: &'static [ChannelRating],
}

const MODEL_PROFILES: &[ModelProfile] = &[
    ModelProfile {
        model: Model::Dp832,
        name: "DP832",
        channels: &[
            ChannelRating::new(1, 30.0, 3.0),
            ChannelRating::new(2, 30.0, 3.0),
            ChannelRating::new(3, 5.0, 3.0),
        ],
    },
    ModelProfile {
        model: Model::Dp821,
        name: "DP821",
        channels: &[
            ChannelRating::new(1, 60.0, 1.0),
            ChannelRating::new(2, 8.0, 10.0),
        ],
    },
    ModelProfile {
        model: Model::Dp712,
        name: "DP712",
        channels: &[ChannelRating::new(1, 50.0, 3.0)],
    },
];

impl Model {
    /// All supported models.
    pub const ALL: [Model; 3] = [Model::Dp832, Model::Dp821, Model::Dp712];

    fn profile(self) -> &'static ModelProfile {
        // MODEL_PROFILES has one entry per variant, in declaration order.
        &MODEL_PROFILES[self as usize]
    }

    /// Model name, e.g. `DP832`.
    pub fn name(self) -> &'static str {
        self.profile().name
    }

    /// Channel ratings in channel order.
    pub fn channels(self) -> &'static [ChannelRating] {
        self.profile().channels
    }

    /// Number of output channels.
    pub fn channel_count(self) -> u8 {
        self.channels().len() as u8
    }

    /// Largest channel count across all supported models.
    pub fn max_channel_count() -> u8 {
        Self::ALL.iter().map(|m| m.channel_count()).max().unwrap_or(1)
    }

    /// Rating of `channel`, or `None` when the model has no such channel.
    pub fn rating(self, channel: u8) -> Option<&'static ChannelRating> {
        self.channels().iter().find(|r| r.channel == channel)
    }

    /// Match the model field of an identity reply (`DP832`, `DP832A`, ...).
    pub fn from_identity_model(model: &str) -> Option<Self> {
        let model = model.trim().to_ascii_uppercase();
        MODEL_PROFILES
            .iter()
            .find(|p| model.starts_with(p.name))
            .map(|p| p.model)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
