use serde::{Deserialize, Serialize};

/// One fulfillment message of a turn.
///
/// Text and card messages are understood by the pipeline; everything else the
/// backend sends is carried through untouched as [`Message::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Message {
    Text(TextMessage),
    Card(Card),
    #[serde(untagged)]
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    #[serde(default)]
    pub text: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Card {
    pub title: String,
    pub subtitle: String,
    pub image_uri: String,
    pub buttons: Vec<CardButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardButton {
    pub text: String,
    pub postback: String,
}

impl Message {
    /// A text message with a single segment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextMessage {
            text: vec![text.into()],
        })
    }

    pub fn card(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self::Card(Card {
            title: title.into(),
            subtitle: subtitle.into(),
            ..Card::default()
        })
    }

    #[must_use]
    pub fn text_segments(&self) -> Option<&[String]> {
        match self {
            Self::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.text_segments()
            .and_then(|segments| segments.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn card_subtitle(&self) -> Option<&str> {
        match self {
            Self::Card(c) => Some(&c.subtitle),
            _ => None,
        }
    }

    /// True for a text message with at least one segment.
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.text_segments().is_some_and(|s| !s.is_empty())
    }

    /// Rewrite the editable text of this message: the first text segment of a
    /// text message, or the subtitle of a card. Other variants are returned
    /// unchanged.
    #[must_use]
    pub fn map_text(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Self::Text(mut t) => {
                if let Some(first) = t.text.first_mut() {
                    *first = f(first);
                }
                Self::Text(t)
            },
            Self::Card(mut c) => {
                c.subtitle = f(&c.subtitle);
                Self::Card(c)
            },
            other => other,
        }
    }
}
