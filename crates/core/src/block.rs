//! Content blocks: the typed units a page is composed of.
//!
//! A [`Block`] is a stable id, an optional grid placement, and a
//! [`BlockContent`] payload. `BlockContent` is a closed sum type serialized
//! with an internal `"type"` discriminator so the JSON shape stays flat:
//!
//! ```json
//! { "id": "…", "type": "link", "title": { "en": "Shop" }, "url": "https://…" }
//! ```
//!
//! [`BlockKind`] is the payload-free discriminator used by factories and
//! request DTOs. Both conversions between the two are exhaustive matches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::grid::GridLayoutData;
use crate::types::{BlockId, Timestamp};

/// Locale used when a localized string has no entry for the requested one.
pub const DEFAULT_LOCALE: &str = "en";

// ---------------------------------------------------------------------------
// Localized strings
// ---------------------------------------------------------------------------

/// Text keyed by locale code (`"en"`, `"ru"`, …).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedString(BTreeMap<String, String>);

impl LocalizedString {
    /// A string with a single entry for [`DEFAULT_LOCALE`].
    pub fn plain(text: impl Into<String>) -> Self {
        Self::default().with(DEFAULT_LOCALE, text)
    }

    pub fn with(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(locale.into(), text.into());
        self
    }

    /// Look up `locale`, falling back to [`DEFAULT_LOCALE`] and then to any
    /// available translation.
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0
            .get(locale)
            .or_else(|| self.0.get(DEFAULT_LOCALE))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Nested payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarouselSlide {
    pub image_url: String,
    #[serde(default)]
    pub caption: LocalizedString,
    #[serde(default)]
    pub link_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    #[default]
    Text,
    Email,
    Phone,
    Textarea,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub label: LocalizedString,
    #[serde(default)]
    pub field_type: FormFieldType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingItem {
    pub name: LocalizedString,
    pub price: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: LocalizedString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: LocalizedString,
    pub answer: LocalizedString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// BlockContent
// ---------------------------------------------------------------------------

/// Type-specific block payload, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    Profile {
        name: String,
        #[serde(default)]
        bio: LocalizedString,
        #[serde(default)]
        avatar_url: Option<String>,
        #[serde(default)]
        verified: bool,
    },
    Text {
        #[serde(default)]
        content: LocalizedString,
        #[serde(default)]
        align: TextAlign,
    },
    Link {
        #[serde(default)]
        title: LocalizedString,
        #[serde(default)]
        url: String,
        #[serde(default)]
        icon: Option<String>,
    },
    Button {
        #[serde(default)]
        label: LocalizedString,
        #[serde(default)]
        url: String,
        #[serde(default)]
        button_style: Option<String>,
    },
    Image {
        #[serde(default)]
        url: String,
        #[serde(default)]
        alt: LocalizedString,
        #[serde(default)]
        link_url: Option<String>,
    },
    Video {
        #[serde(default)]
        url: String,
        #[serde(default)]
        autoplay: bool,
    },
    Carousel {
        #[serde(default)]
        slides: Vec<CarouselSlide>,
    },
    Form {
        #[serde(default)]
        title: LocalizedString,
        #[serde(default)]
        fields: Vec<FormField>,
        #[serde(default)]
        submit_label: LocalizedString,
    },
    Pricing {
        #[serde(default)]
        title: LocalizedString,
        #[serde(default)]
        items: Vec<PricingItem>,
    },
    Faq {
        #[serde(default)]
        items: Vec<FaqItem>,
    },
    Countdown {
        #[serde(default)]
        title: LocalizedString,
        #[serde(default)]
        ends_at: Option<Timestamp>,
    },
    Testimonial {
        #[serde(default)]
        quote: LocalizedString,
        #[serde(default)]
        author: String,
        #[serde(default)]
        avatar_url: Option<String>,
    },
    Messenger {
        #[serde(default)]
        platform: String,
        #[serde(default)]
        handle: String,
    },
    Socials {
        #[serde(default)]
        links: Vec<SocialLink>,
    },
    Separator {
        #[serde(default)]
        line_style: Option<String>,
    },
    Avatar {
        #[serde(default)]
        url: String,
        #[serde(default)]
        size: Option<u32>,
    },
    Download {
        #[serde(default)]
        title: LocalizedString,
        #[serde(default)]
        file_url: String,
        #[serde(default)]
        file_name: Option<String>,
    },
    Scratch {
        #[serde(default)]
        prize: LocalizedString,
        #[serde(default)]
        cover_color: Option<String>,
    },
    Event {
        #[serde(default)]
        title: LocalizedString,
        #[serde(default)]
        description: LocalizedString,
        #[serde(default)]
        starts_at: Option<Timestamp>,
        #[serde(default)]
        ends_at: Option<Timestamp>,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        ticket_url: Option<String>,
    },
}

/// Payload-free block discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Profile,
    Text,
    Link,
    Button,
    Image,
    Video,
    Carousel,
    Form,
    Pricing,
    Faq,
    Countdown,
    Testimonial,
    Messenger,
    Socials,
    Separator,
    Avatar,
    Download,
    Scratch,
    Event,
}

impl BlockKind {
    pub const ALL: [BlockKind; 19] = [
        BlockKind::Profile,
        BlockKind::Text,
        BlockKind::Link,
        BlockKind::Button,
        BlockKind::Image,
        BlockKind::Video,
        BlockKind::Carousel,
        BlockKind::Form,
        BlockKind::Pricing,
        BlockKind::Faq,
        BlockKind::Countdown,
        BlockKind::Testimonial,
        BlockKind::Messenger,
        BlockKind::Socials,
        BlockKind::Separator,
        BlockKind::Avatar,
        BlockKind::Download,
        BlockKind::Scratch,
        BlockKind::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Profile => "profile",
            BlockKind::Text => "text",
            BlockKind::Link => "link",
            BlockKind::Button => "button",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
            BlockKind::Carousel => "carousel",
            BlockKind::Form => "form",
            BlockKind::Pricing => "pricing",
            BlockKind::Faq => "faq",
            BlockKind::Countdown => "countdown",
            BlockKind::Testimonial => "testimonial",
            BlockKind::Messenger => "messenger",
            BlockKind::Socials => "socials",
            BlockKind::Separator => "separator",
            BlockKind::Avatar => "avatar",
            BlockKind::Download => "download",
            BlockKind::Scratch => "scratch",
            BlockKind::Event => "event",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BlockContent {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Profile { .. } => BlockKind::Profile,
            BlockContent::Text { .. } => BlockKind::Text,
            BlockContent::Link { .. } => BlockKind::Link,
            BlockContent::Button { .. } => BlockKind::Button,
            BlockContent::Image { .. } => BlockKind::Image,
            BlockContent::Video { .. } => BlockKind::Video,
            BlockContent::Carousel { .. } => BlockKind::Carousel,
            BlockContent::Form { .. } => BlockKind::Form,
            BlockContent::Pricing { .. } => BlockKind::Pricing,
            BlockContent::Faq { .. } => BlockKind::Faq,
            BlockContent::Countdown { .. } => BlockKind::Countdown,
            BlockContent::Testimonial { .. } => BlockKind::Testimonial,
            BlockContent::Messenger { .. } => BlockKind::Messenger,
            BlockContent::Socials { .. } => BlockKind::Socials,
            BlockContent::Separator { .. } => BlockKind::Separator,
            BlockContent::Avatar { .. } => BlockKind::Avatar,
            BlockContent::Download { .. } => BlockKind::Download,
            BlockContent::Scratch { .. } => BlockKind::Scratch,
            BlockContent::Event { .. } => BlockKind::Event,
        }
    }

    /// Starter content for a freshly inserted block of `kind`.
    pub fn default_for(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Profile => BlockContent::Profile {
                name: String::new(),
                bio: LocalizedString::default(),
                avatar_url: None,
                verified: false,
            },
            BlockKind::Text => BlockContent::Text {
                content: LocalizedString::plain("New text"),
                align: TextAlign::Left,
            },
            BlockKind::Link => BlockContent::Link {
                title: LocalizedString::plain("New link"),
                url: String::new(),
                icon: None,
            },
            BlockKind::Button => BlockContent::Button {
                label: LocalizedString::plain("Click me"),
                url: String::new(),
                button_style: None,
            },
            BlockKind::Image => BlockContent::Image {
                url: String::new(),
                alt: LocalizedString::default(),
                link_url: None,
            },
            BlockKind::Video => BlockContent::Video {
                url: String::new(),
                autoplay: false,
            },
            BlockKind::Carousel => BlockContent::Carousel { slides: Vec::new() },
            BlockKind::Form => BlockContent::Form {
                title: LocalizedString::plain("Contact me"),
                fields: vec![FormField {
                    name: "email".to_string(),
                    label: LocalizedString::plain("Email"),
                    field_type: FormFieldType::Email,
                    required: true,
                }],
                submit_label: LocalizedString::plain("Send"),
            },
            BlockKind::Pricing => BlockContent::Pricing {
                title: LocalizedString::default(),
                items: Vec::new(),
            },
            BlockKind::Faq => BlockContent::Faq { items: Vec::new() },
            BlockKind::Countdown => BlockContent::Countdown {
                title: LocalizedString::default(),
                ends_at: None,
            },
            BlockKind::Testimonial => BlockContent::Testimonial {
                quote: LocalizedString::default(),
                author: String::new(),
                avatar_url: None,
            },
            BlockKind::Messenger => BlockContent::Messenger {
                platform: "telegram".to_string(),
                handle: String::new(),
            },
            BlockKind::Socials => BlockContent::Socials { links: Vec::new() },
            BlockKind::Separator => BlockContent::Separator { line_style: None },
            BlockKind::Avatar => BlockContent::Avatar {
                url: String::new(),
                size: None,
            },
            BlockKind::Download => BlockContent::Download {
                title: LocalizedString::default(),
                file_url: String::new(),
                file_name: None,
            },
            BlockKind::Scratch => BlockContent::Scratch {
                prize: LocalizedString::default(),
                cover_color: None,
            },
            BlockKind::Event => BlockContent::Event {
                title: LocalizedString::plain("New event"),
                description: LocalizedString::default(),
                starts_at: None,
                ends_at: None,
                location: None,
                ticket_url: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// One content unit on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub id: BlockId,

    #[serde(flatten)]
    pub content: BlockContent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_layout: Option<GridLayoutData>,
}

impl Block {
    /// Create a block of `kind` with a fresh id and starter content.
    pub fn new(kind: BlockKind) -> Self {
        Self::with_content(BlockContent::default_for(kind))
    }

    pub fn with_content(content: BlockContent) -> Self {
        Self {
            id: new_block_id(),
            content,
            grid_layout: None,
        }
    }

    /// The profile block for a new page.
    pub fn profile(name: impl Into<String>) -> Self {
        Self::with_content(BlockContent::Profile {
            name: name.into(),
            bio: LocalizedString::default(),
            avatar_url: None,
            verified: false,
        })
    }

    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }

    pub fn is_profile(&self) -> bool {
        self.kind() == BlockKind::Profile
    }

    pub fn is_event(&self) -> bool {
        self.kind() == BlockKind::Event
    }

    /// Shallow-merge a JSON object into this block and return the result.
    ///
    /// Top-level keys of `patch` replace the block's keys; `grid_layout: null`
    /// removes the placement. `id` and `type` may be repeated but not changed.
    pub fn merge_patch(&self, patch: &serde_json::Value) -> Result<Block, CoreError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| CoreError::Validation("Block update must be a JSON object".into()))?;

        let mut merged = serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize block: {e}")))?;
        let fields = merged
            .as_object_mut()
            .ok_or_else(|| CoreError::Internal("Block did not serialize to an object".into()))?;

        for (key, value) in patch {
            match key.as_str() {
                "id" if value.as_str() != Some(self.id.as_str()) => {
                    return Err(CoreError::Validation("Block id cannot be changed".into()));
                }
                "type" if value.as_str() != Some(self.kind().as_str()) => {
                    return Err(CoreError::Validation(format!(
                        "Block type cannot be changed (block '{}' is '{}')",
                        self.id,
                        self.kind()
                    )));
                }
                _ => {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }

        serde_json::from_value(merged)
            .map_err(|e| CoreError::Validation(format!("Invalid block update: {e}")))
    }
}

/// Generate a new block id.
pub fn new_block_id() -> BlockId {
    uuid::Uuid::new_v4().to_string()
}
