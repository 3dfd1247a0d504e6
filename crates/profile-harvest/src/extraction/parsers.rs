//! Response decoders for the extraction strategies.
//!
//! Page responses are classified by explicit markers first, then decoded from
//! an embedded structured-data block (`window._sharedData` or JSON-LD), and
//! finally from meta tags plus regex-extracted counters. Structured endpoint
//! responses are decoded directly from their `data.user` object.
//!
//! Everything here is synchronous: `scraper::Html` is `!Send`, so documents
//! are parsed and dropped without crossing an await point.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use super::counts::parse_count;
use crate::error::ErrorKind;
use crate::types::{Profile, ProfileIdentity, ProfileStatistics};

const PRIVATE_MARKER: &str = "This Account is Private";
const PRIVATE_MARKER_LOWER: &str = "account is private";
const NOT_FOUND_MARKER: &str = "Sorry, this page isn't available";
const TITLE_SUFFIX: &str = "• Instagram";

/// Known locations of the user object inside an embedded data block.
const USER_PATHS: &[&[PathStep]] = &[
    &[
        PathStep::Key("entry_data"),
        PathStep::Key("ProfilePage"),
        PathStep::Index(0),
        PathStep::Key("graphql"),
        PathStep::Key("user"),
    ],
    &[PathStep::Key("graphql"), PathStep::Key("user")],
    &[PathStep::Key("user")],
];

#[derive(Debug, Clone, Copy)]
enum PathStep {
    Key(&'static str),
    Index(usize),
}

/// What a rendered profile page says about the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    Private,
    NotFound,
    Content,
}

pub fn classify_page(html: &str) -> PageClass {
    if html.contains(PRIVATE_MARKER) || html.to_lowercase().contains(PRIVATE_MARKER_LOWER) {
        PageClass::Private
    } else if html.contains(NOT_FOUND_MARKER) {
        PageClass::NotFound
    } else {
        PageClass::Content
    }
}

/// Decode a rendered profile page into a normalized profile.
pub fn parse_profile_page(html: &str, target: &str) -> Result<Profile, ErrorKind> {
    match classify_page(html) {
        PageClass::Private => return Err(ErrorKind::PrivateProfile),
        PageClass::NotFound => return Err(ErrorKind::ProfileNotFound),
        PageClass::Content => {}
    }

    match extract_embedded_json(html) {
        Some(data) => {
            let user = find_user_object(&data).ok_or(ErrorKind::ParseFailed)?;
            decode_user(user, target).map_err(|_| ErrorKind::ParseFailed)
        }
        None => Ok(parse_meta_fallback(html, target)),
    }
}

/// Decode a structured-endpoint response body.
pub fn parse_structured_response(body: &str, target: &str) -> Result<Profile, ErrorKind> {
    let data: Value = serde_json::from_str(body).map_err(|_| ErrorKind::ApiFailed)?;
    let user = data
        .get("data")
        .and_then(|d| d.get("user"))
        .filter(|u| u.as_object().is_some_and(|o| !o.is_empty()))
        .ok_or(ErrorKind::UserNotFound)?;
    decode_user(user, target).map_err(|_| ErrorKind::ApiFailed)
}

/// Find an embedded structured-data block.
///
/// Tries the `window._sharedData = {...};` assignment first, then every
/// `application/ld+json` script, returning the first that parses.
pub fn extract_embedded_json(html: &str) -> Option<Value> {
    if let Some(caps) = shared_data_regex().captures(html) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            return Some(value);
        }
    }

    let document = Html::parse_document(html);
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    let found = document.select(&sel).find_map(|element| {
        let text = element.inner_html();
        serde_json::from_str::<Value>(text.trim()).ok()
    });
    found
}

/// Walk the known paths and return the first object carrying a `username`.
pub fn find_user_object(data: &Value) -> Option<&Value> {
    USER_PATHS.iter().find_map(|path| {
        let mut current = data;
        for step in path.iter() {
            current = match step {
                PathStep::Key(key) => current.get(*key)?,
                PathStep::Index(idx) => current.get(*idx)?,
            };
        }
        current.get("username").map(|_| current)
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    username: Option<String>,
    full_name: Option<String>,
    biography: Option<String>,
    external_url: Option<String>,
    is_private: Option<bool>,
    is_verified: Option<bool>,
    profile_pic_url_hd: Option<String>,
    profile_pic_url: Option<String>,
    edge_followed_by: Option<EdgeCount>,
    edge_follow: Option<EdgeCount>,
    edge_owner_to_timeline_media: Option<EdgeCount>,
}

#[derive(Debug, Default, Deserialize)]
struct EdgeCount {
    count: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn edge(count: Option<EdgeCount>) -> u64 {
    count.and_then(|c| c.count).unwrap_or(0)
}

/// Decode a user object into the normalized schema.
pub fn decode_user(user: &Value, target: &str) -> Result<Profile, serde_json::Error> {
    let raw = RawUser::deserialize(user)?;
    Ok(Profile {
        identity: ProfileIdentity {
            username: non_empty(raw.username).unwrap_or_else(|| target.to_string()),
            full_name: raw.full_name.unwrap_or_default(),
            biography: raw.biography.unwrap_or_default(),
            external_url: raw.external_url.unwrap_or_default(),
            is_private: raw.is_private.unwrap_or(false),
            is_verified: raw.is_verified.unwrap_or(false),
            profile_pic_url: non_empty(raw.profile_pic_url_hd)
                .or_else(|| non_empty(raw.profile_pic_url))
                .unwrap_or_default(),
        },
        statistics: ProfileStatistics {
            followers: edge(raw.edge_followed_by),
            following: edge(raw.edge_follow),
            posts: edge(raw.edge_owner_to_timeline_media),
        },
    })
}

/// Build a profile from meta tags and counters found in the markup.
pub fn parse_meta_fallback(html: &str, target: &str) -> Profile {
    let meta = collect_meta_tags(html);
    let lower = html.to_lowercase();
    let get = |key: &str| meta.get(key).cloned().unwrap_or_default();

    Profile {
        identity: ProfileIdentity {
            username: target.to_string(),
            full_name: get("og:title").replace(TITLE_SUFFIX, "").trim().to_string(),
            biography: get("og:description"),
            external_url: String::new(),
            is_private: lower.contains("private"),
            is_verified: lower.contains("verified"),
            profile_pic_url: get("og:image"),
        },
        statistics: ProfileStatistics {
            followers: extract_count(html, &count_regexes().followers),
            following: extract_count(html, &count_regexes().following),
            posts: extract_count(html, &count_regexes().posts),
        },
    }
}

fn collect_meta_tags(html: &str) -> HashMap<String, String> {
    let document = Html::parse_document(html);
    let mut meta = HashMap::new();
    let Ok(sel) = Selector::parse("meta") else {
        return meta;
    };
    for element in document.select(&sel) {
        let attrs = element.value();
        let key = attrs.attr("property").or_else(|| attrs.attr("name"));
        if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
            if !key.is_empty() && !content.is_empty() {
                meta.insert(key.to_string(), content.to_string());
            }
        }
    }
    meta
}

fn extract_count(html: &str, re: &Regex) -> u64 {
    re.captures(html)
        .map(|caps| parse_count(&caps[1]))
        .unwrap_or(0)
}

fn shared_data_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)window\._sharedData\s*=\s*(\{.*?\});").expect("shared data regex is valid")
    })
}

struct CountRegexes {
    followers: Regex,
    following: Regex,
    posts: Regex,
}

fn count_regexes() -> &'static CountRegexes {
    static RES: OnceLock<CountRegexes> = OnceLock::new();
    RES.get_or_init(|| {
        let build = |label: &str| {
            Regex::new(&format!(r"(?i)(\d[\d,]*(?:\.\d+)?[km]?)\s*{label}"))
                .expect("count regex is valid")
        };
        CountRegexes {
            followers: build("followers"),
            following: build("following"),
            posts: build("posts"),
        }
    })
}
