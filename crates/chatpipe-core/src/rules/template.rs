//! Template expansion with author placeholders.
//!
//! `^` introduces an escape:
//!
//! | escape | expands to |
//! |--------|------------|
//! | `^^`   | a literal `^` |
//! | `^U`   | author username |
//! | `^T`   | author discriminator/tag |
//! | `^C`   | author accent colour, lowercase hex |
//!
//! Any other character after `^`, and a trailing `^`, pass through verbatim.
//! Regex references such as `${1}` are left alone for the substitution step.

use std::borrow::Cow;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Escape lead-in character.
pub const ESCAPE: char = '^';

/// Author of an inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Author {
    /// Display name.
    pub username: String,
    /// Discriminator or tag shown next to the name.
    #[serde(default)]
    pub discriminator: String,
    /// Accent colour as `0xRRGGBB`.
    #[serde(default)]
    pub accent_color: u32,
}

/// Substitutable context attached to an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Props {
    pub author: Author,
}

impl Props {
    pub const fn new(author: Author) -> Self {
        Self { author }
    }
}

/// Expand author placeholders in `template`.
///
/// Without `props` the template is returned untouched, escapes included.
pub fn expand_template<'a>(template: &'a str, props: Option<&Props>) -> Cow<'a, str> {
    let Some(props) = props else {
        return Cow::Borrowed(template);
    };
    if !template.contains(ESCAPE) {
        return Cow::Borrowed(template);
    }

    let author = &props.author;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            let consumed = match chars.peek() {
                Some(&ESCAPE) => {
                    out.push(ESCAPE);
                    true
                }
                Some('U') => {
                    out.push_str(&author.username);
                    true
                }
                Some('T') => {
                    out.push_str(&author.discriminator);
                    true
                }
                Some('C') => {
                    let _ = write!(out, "{:x}", author.accent_color);
                    true
                }
                _ => false,
            };
            if consumed {
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    Cow::Owned(out)
}
