//! Request classification.
//!
//! Maps a request URL to the category whose cache policy applies. The checks
//! overlap (`favicon.ico` looks like an image) so evaluation order matters:
//! app shell, user uploads, images, static assets, everything else.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Path prefix under which user-uploaded pictures are served.
pub const USER_PICTURE_PREFIX: &str = "/user-pictures/";

/// Files required to boot the UI.
pub const APP_SHELL_FILES: &[&str] = &["/", "/index.html", "/manifest.json", "/favicon.ico"];

static IMAGE_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(png|jpg|jpeg|svg|gif|webp)$").expect("static regex"));

static ASSET_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(js|css|woff|woff2|ttf|eot)$").expect("static regex"));

/// Resource category of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AppShell,
    BuiltInImage,
    UserAddedImage,
    StaticAsset,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::AppShell,
        Category::BuiltInImage,
        Category::UserAddedImage,
        Category::StaticAsset,
        Category::Other,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::AppShell => "app-shell",
            Category::BuiltInImage => "built-in-image",
            Category::UserAddedImage => "user-added-image",
            Category::StaticAsset => "static-asset",
            Category::Other => "other",
        };
        f.write_str(name)
    }
}

/// Classify a request URL. Only the path takes part.
pub fn classify(url: &Url) -> Category {
    classify_path(url.path())
}

/// Classify a URL path.
pub fn classify_path(path: &str) -> Category {
    if is_app_shell(path) {
        Category::AppShell
    } else if path.starts_with(USER_PICTURE_PREFIX) {
        Category::UserAddedImage
    } else if IMAGE_EXT.is_match(path) {
        Category::BuiltInImage
    } else if ASSET_EXT.is_match(path) {
        Category::StaticAsset
    } else {
        Category::Other
    }
}

fn is_app_shell(path: &str) -> bool {
    matches!(path, "/" | "/index.html" | "/manifest.json") || path.ends_with(".ico")
}

/// Whether `url` shares scheme, host and port with `origin`.
pub fn is_same_origin(url: &Url, origin: &Url) -> bool {
    url.origin() == origin.origin()
}

/// Path of a bundled picture-library image.
pub fn built_in_picture_path(stem: &str) -> String {
    format!("/assets/pictures/{stem}.svg")
}
