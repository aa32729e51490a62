use crate::engine::{EngineError, MediaEngine};
use crate::models::{is_playlist, LinkList, QualityMode};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to enumerate playlist {url}: {source}")]
    Enumeration {
        url: String,
        #[source]
        source: EngineError
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkUnits {
    pub link: String,
    pub playlist: bool,
    pub units: u64
}

/// Number of download units a batch is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlan {
    pub total: u64,
    pub dual_stream: bool,
    pub links: Vec<LinkUnits>
}

/// Sizes a batch before anything is downloaded.
///
/// Each playlist link contributes its available entries, every other link
/// contributes one unit, and dual-stream modes double the sum. Playlists are
/// enumerated one at a time in input order; the first failure aborts the plan.
pub async fn plan<E>(engine: &E, links: &LinkList, mode: QualityMode) -> Result<UnitPlan, PlanError>
where
    E: MediaEngine + ?Sized
{
    let mut breakdown = Vec::with_capacity(links.len());
    let mut sum = 0u64;

    for link in links.iter() {
        let playlist = is_playlist(link);
        let units = if playlist {
            let entries = engine
                .enumerate(link)
                .await
                .map_err(|source| PlanError::Enumeration {
                    url: link.to_string(),
                    source
                })?;
            entries.iter().filter(|entry| entry.available).count() as u64
        } else {
            1
        };

        tracing::debug!(link, playlist, units, "planned link");
        sum += units;
        breakdown.push(LinkUnits {
            link: link.to_string(),
            playlist,
            units
        });
    }

    let dual_stream = mode.is_dual_stream();
    let total = if dual_stream { sum * 2 } else { sum };

    Ok(UnitPlan {
        total,
        dual_stream,
        links: breakdown
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::engine::{EngineOutcome, PlaylistEntry};
    use crate::progress::ProgressEvent;

    #[derive(Default)]
    struct PlaylistEngine {
        playlists: HashMap<String, Vec<bool>>,
        enumerated: Mutex<Vec<String>>
    }

    impl PlaylistEngine {
        fn with_playlist(mut self, url: &str, availability: &[bool]) -> Self {
            self.playlists.insert(url.to_string(), availability.to_vec());
            self
        }
    }

    #[async_trait]
    impl MediaEngine for PlaylistEngine {
        async fn enumerate(&self, url: &str) -> Result<Vec<PlaylistEntry>, EngineError> {
            self.enumerated.lock().unwrap().push(url.to_string());
            let availability = self
                .playlists
                .get(url)
                .ok_or(EngineError::YtDlp(yt_dlp::Error::EmptyPlaylist))?;
            Ok(availability
                .iter()
                .enumerate()
                .map(|(i, &available)| PlaylistEntry {
                    id: format!("entry-{i}"),
                    available
                })
                .collect())
        }

        async fn download(
            &self,
            _links: &[String],
            _format_selector: &str,
            _on_event: &(dyn Fn(ProgressEvent) + Send + Sync)
        ) -> EngineOutcome {
            unreachable!("planning never downloads")
        }
    }

    fn links(items: &[&str]) -> LinkList {
        items.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_plan_counts_available_playlist_entries() {
        let engine = PlaylistEngine::default()
            .with_playlist("https://v/2?list=ABC", &[true, true, false, true]);
        let links = links(&["https://v/1", "https://v/2?list=ABC"]);

        let default = plan(&engine, &links, QualityMode::Default).await.unwrap();
        assert_eq!(default.total, 4);
        assert!(!default.dual_stream);
        assert_eq!(default.links, vec![
            LinkUnits { link: "https://v/1".to_string(), playlist: false, units: 1 },
            LinkUnits { link: "https://v/2?list=ABC".to_string(), playlist: true, units: 3 }
        ]);

        let best = plan(&engine, &links, QualityMode::BestCombined).await.unwrap();
        assert_eq!(best.total, 8);
        assert!(best.dual_stream);
    }

    #[tokio::test]
    async fn test_plan_single_links_skip_enumeration() {
        let engine = PlaylistEngine::default();
        let links = links(&["https://v/1", "https://v/2", "https://v/3"]);

        for mode in [QualityMode::Default, QualityMode::AudioOnly, QualityMode::VideoOnly] {
            assert_eq!(plan(&engine, &links, mode).await.unwrap().total, 3);
        }
        assert!(engine.enumerated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plan_empty_playlist_adds_nothing() {
        let engine = PlaylistEngine::default()
            .with_playlist("https://v/p?list=EMPTY", &[false, false]);
        let links = links(&["https://v/p?list=EMPTY"]);
        let plan = plan(&engine, &links, QualityMode::BestCombined).await.unwrap();
        assert_eq!(plan.total, 0);
    }

    #[tokio::test]
    async fn test_plan_fails_on_enumeration_error() {
        let engine = PlaylistEngine::default()
            .with_playlist("https://v/a?list=OK", &[true]);
        let links = links(&[
            "https://v/a?list=OK",
            "https://v/b?list=BROKEN",
            "https://v/c?list=NEVER"
        ]);

        let err = plan(&engine, &links, QualityMode::Default).await.unwrap_err();
        let PlanError::Enumeration { url, .. } = &err;
        assert_eq!(url, "https://v/b?list=BROKEN");
        assert!(err.to_string().contains("https://v/b?list=BROKEN"));
        assert_eq!(*engine.enumerated.lock().unwrap(), vec![
            "https://v/a?list=OK".to_string(),
            "https://v/b?list=BROKEN".to_string()
        ]);
    }
}
