//! Subcommand implementations. Output goes to the given writer so the
//! commands can be exercised without a terminal.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use pictoh_client::{Agent, ProgressTracker, Source, WarmUpEvent, WarmUpHandle};
use pictoh_core::Category;
use pictoh_core::classify::built_in_picture_path;

/// Read a URL list, one entry per line. Blank lines and `#` comments are
/// skipped; a bare name such as `eat` means the bundled picture of that name.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| if line.contains('/') { line.to_string() } else { built_in_picture_path(line) })
        .collect())
}

/// Run a warm-up session through the agent, printing weighted progress.
///
/// Records first-launch completion once every phase has finished.
pub async fn warm_up(
    agent: Arc<Agent>, pictures: Vec<String>, tts: Vec<String>, out: &mut impl Write,
) -> Result<ProgressTracker> {
    let mut handle = WarmUpHandle::spawn(agent.clone(), agent.origin().clone());
    handle.start(pictures, tts)?;

    let mut tracker = ProgressTracker::new();
    writeln!(out, "[{:>3}%] {}", tracker.overall(), tracker.status())?;

    while let Some(event) = handle.next_event().await {
        tracker.apply(&event);
        match &event {
            WarmUpEvent::Error { error, .. } => writeln!(out, "       ! {error}")?,
            _ => writeln!(out, "[{:>3}%] {}", tracker.overall(), tracker.status())?,
        }
        if tracker.is_complete() {
            break;
        }
    }
    handle.finish().await;

    if tracker.is_complete() {
        agent.db().mark_first_launch_complete().await;
    }
    if let Some(notice) = tracker.notice() {
        writeln!(out, "{notice}")?;
    }
    Ok(tracker)
}

pub async fn fetch(agent: &Agent, method: &str, url: &str, out: &mut impl Write) -> Result<()> {
    let request = agent.request(method, url)?;
    let served = agent.serve(request).await?;
    let source = match served.source {
        Source::Cache => "cache",
        Source::Network => "network",
    };
    let response = &served.response;
    writeln!(
        out,
        "{} {} {} {} bytes from {source}",
        response.status,
        response.url,
        response.content_type().unwrap_or("-"),
        response.body.len()
    )?;
    Ok(())
}

pub async fn caches(agent: &Agent, out: &mut impl Write) -> Result<()> {
    let db = agent.db();
    let names = db.list_caches().await?;
    if names.is_empty() {
        writeln!(out, "no caches")?;
    }
    for name in names {
        let count = db.count_entries(&name).await?;
        let stale = if agent.names().is_stale(&name) { " (stale)" } else { "" };
        writeln!(out, "{name:<28} {count:>6}{stale}")?;
    }

    let marker = if db.is_first_launch().await { "pending" } else { "complete" };
    writeln!(out, "first-launch warm-up: {marker}")?;
    Ok(())
}

/// Delete expired entries from every age-limited cache.
pub async fn purge(agent: &Agent, out: &mut impl Write) -> Result<u64> {
    let now = Utc::now();
    let mut total = 0;
    for category in Category::ALL {
        let policy = agent.policies().for_category(category);
        let Some(max_age) = policy.max_age else {
            continue;
        };
        let deleted = agent.db().purge_expired(&policy.cache, max_age, now).await?;
        writeln!(out, "{}: removed {deleted} expired", policy.cache)?;
        total += deleted;
    }
    Ok(total)
}

pub async fn gc(agent: &Agent, out: &mut impl Write) -> Result<()> {
    let deleted = agent.collect_garbage().await?;
    if deleted.is_empty() {
        writeln!(out, "nothing to delete")?;
    }
    for name in deleted {
        writeln!(out, "deleted {name}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictoh_client::Fetcher;
    use pictoh_core::classify::APP_SHELL_FILES;
    use pictoh_core::http::format_http_date;
    use pictoh_core::{AppConfig, CacheDb, Error, Request, Response};

    /// Everything is reachable except paths containing "missing".
    struct Online;

    #[async_trait::async_trait]
    impl Fetcher for Online {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if request.url.path().contains("missing") {
                return Err(Error::Network(format!("{} offline", request.url)));
            }
            Ok(Response::new(request.url.as_str(), 200, "ok").with_header("content-type", "image/svg+xml"))
        }
    }

    async fn agent(config: &AppConfig) -> Arc<Agent> {
        let db = CacheDb::open_in_memory().await.unwrap();
        let agent = Arc::new(Agent::new(db, Arc::new(Online), config).unwrap());
        agent.start().await.unwrap();
        agent
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_read_url_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pictures.txt");
        std::fs::write(&path, "# core words\neat\n\n  /assets/pictures/drink.svg \nhttps://cdn.example.com/x.png\n").unwrap();

        let urls = read_url_list(&path).unwrap();
        assert_eq!(
            urls,
            vec!["/assets/pictures/eat.svg", "/assets/pictures/drink.svg", "https://cdn.example.com/x.png"]
        );
    }

    #[test]
    fn test_read_url_list_missing_file() {
        let err = read_url_list(Path::new("/nonexistent/pictures.txt")).unwrap_err();
        assert!(err.to_string().contains("pictures.txt"));
    }

    #[tokio::test]
    async fn test_warm_up_reports_progress_and_marks_first_launch() {
        let agent = agent(&AppConfig::default()).await;
        assert!(agent.db().is_first_launch().await);
        let pictures = vec!["/assets/pictures/eat.svg".into(), "/assets/pictures/missing.svg".into()];

        let mut out = Vec::new();
        let tracker = warm_up(agent.clone(), pictures, vec![], &mut out).await.unwrap();

        assert!(tracker.is_complete());
        assert_eq!(tracker.advisories().len(), 1);
        assert!(!agent.db().is_first_launch().await);
        let out = text(out);
        assert!(out.starts_with("[ 30%] Loading application"), "{out}");
        assert!(out.contains("[100%] Ready"), "{out}");
        assert!(out.contains("1 resource could not be downloaded"), "{out}");
    }

    #[tokio::test]
    async fn test_fetch_reports_source() {
        let agent = agent(&AppConfig::default()).await;
        let mut out = Vec::new();

        fetch(&agent, "GET", "/assets/pictures/eat.svg", &mut out).await.unwrap();
        fetch(&agent, "GET", "/assets/pictures/eat.svg", &mut out).await.unwrap();

        let out = text(out);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].ends_with("from network"), "{out}");
        assert!(lines[1].ends_with("from cache"), "{out}");
        assert!(lines[1].contains("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_caches_lists_counts() {
        let agent = agent(&AppConfig::default()).await;
        let mut out = Vec::new();

        caches(&agent, &mut out).await.unwrap();

        let out = text(out);
        let shell = out.lines().find(|l| l.starts_with("pictoh-shell-v1")).unwrap();
        assert!(shell.trim_end().ends_with(&APP_SHELL_FILES.len().to_string()), "{out}");
        assert!(out.contains("first-launch warm-up: pending"));
    }

    #[tokio::test]
    async fn test_purge_removes_expired_images() {
        let agent = agent(&AppConfig::default()).await;
        let request = agent.request("GET", "/assets/pictures/old.svg").unwrap();
        let old = Response::new(request.url.as_str(), 200, "old")
            .with_header("date", format_http_date(Utc::now() - chrono::Duration::days(45)));
        agent.db().put("pictoh-images-v1", &request, &old).await.unwrap();

        let mut out = Vec::new();
        let removed = purge(&agent, &mut out).await.unwrap();

        assert_eq!(removed, 1);
        assert!(text(out).contains("pictoh-images-v1: removed 1 expired"));
    }

    #[tokio::test]
    async fn test_gc_deletes_old_versions() {
        let config = AppConfig { cache_version: "v3".into(), ..AppConfig::default() };
        let agent = agent(&config).await;
        agent.db().open_cache("pictoh-images-v2").await.unwrap();

        let mut out = Vec::new();
        gc(&agent, &mut out).await.unwrap();

        assert_eq!(text(out), "deleted pictoh-images-v2\n");
    }
}
