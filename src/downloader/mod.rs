//! Batched download engine: takes ownership of a finalized image list,
//! drains it in bounded-concurrency batches, and either grows an in-memory
//! archive or issues individual save requests. One active session per tab;
//! cancellation is cooperative and polled at batch boundaries.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::collector::BATCH_WIDTH;
use crate::core::model::{QualifiedImage, SaveRequest, TabId};
use crate::data;
use crate::events::{Event, EventSink};
use crate::net::{Net, Saver};

pub mod archive;
pub mod names;

use archive::ZipBuilder;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Individual-mode settling delay: a save request acknowledges start,
    /// not completion, so the slot is held this long before moving on.
    pub settle: Duration,
    /// Delay between archive emission and the close signal, covering
    /// embedders that hold the blob.
    pub grace: Duration,
    pub record_history: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            grace: Duration::from_secs(10),
            record_history: true,
        }
    }
}

struct SessionHandle {
    id: Uuid,
    token: CancellationToken,
}

/// Drives download sessions. Cheap to clone; clones share the session map.
#[derive(Clone)]
pub struct Engine {
    net: Arc<dyn Net>,
    saver: Arc<dyn Saver>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
    sessions: Arc<Mutex<HashMap<TabId, SessionHandle>>>,
}

impl Engine {
    pub fn new(
        net: Arc<dyn Net>,
        saver: Arc<dyn Saver>,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            net,
            saver,
            sink,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts a download session for the tab, terminating any session the
    /// tab already holds. The session runs in the background and reports
    /// through the event sink.
    pub fn save(&self, tab: TabId, request: SaveRequest) {
        self.sink.emit(Event::Notice {
            message: format!("Saving {} images", request.images.len()),
        });
        self.terminate(tab);

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        self.sessions.lock().unwrap().insert(
            tab,
            SessionHandle {
                id,
                token: token.clone(),
            },
        );
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_session(tab, id, request, token).await;
        });
    }

    /// Cancels the tab's active session: the pending queue is dropped, the
    /// in-flight batch finishes but its results are discarded, and the badge
    /// is reset. The cancellation notice is suppressed when the session was
    /// already cancelled.
    pub fn terminate(&self, tab: TabId) {
        let handle = self.sessions.lock().unwrap().remove(&tab);
        if let Some(handle) = handle {
            if !handle.token.is_cancelled() {
                self.sink.emit(Event::Notice {
                    message: format!(
                        "Image downloading is canceled for tab {tab}. \
                         Do not close the panel if you want to keep downloading"
                    ),
                });
            }
            handle.token.cancel();
            self.sink.emit(Event::Badge {
                tab,
                text: String::new(),
            });
        }
    }

    /// The tab went away: force-discard its session without emitting output.
    pub fn detach(&self, tab: TabId) {
        if let Some(handle) = self.sessions.lock().unwrap().remove(&tab) {
            handle.token.cancel();
        }
    }

    pub fn is_active(&self, tab: TabId) -> bool {
        self.sessions.lock().unwrap().contains_key(&tab)
    }

    async fn run_session(
        &self,
        tab: TabId,
        id: Uuid,
        request: SaveRequest,
        token: CancellationToken,
    ) {
        let SaveRequest {
            images,
            zip,
            filename,
            save_as,
        } = request;
        let total = images.len();
        let mut pending: VecDeque<QualifiedImage> = images.into();
        let archive = zip.then(|| Mutex::new(ZipBuilder::new()));

        loop {
            if token.is_cancelled() {
                return;
            }
            let remaining = pending.len();
            self.sink.emit(Event::Badge {
                tab,
                text: if remaining == 0 {
                    String::new()
                } else {
                    remaining.to_string()
                },
            });
            self.sink.emit(Event::Progress { remaining });

            let group: Vec<QualifiedImage> = (0..BATCH_WIDTH)
                .map_while(|_| pending.pop_front())
                .collect();
            if group.is_empty() {
                break;
            }
            join_all(
                group
                    .into_iter()
                    .map(|job| self.download_one(job, archive.as_ref(), &filename, &token)),
            )
            .await;
        }

        if let Some(archive) = archive {
            match archive.into_inner().unwrap().finish() {
                Ok(bytes) => match self.saver.save_blob(&bytes, &filename, save_as).await {
                    Ok(path) => debug!(path = %path.display(), "archive saved"),
                    Err(e) => warn!(error = %e, "archive save failed"),
                },
                Err(e) => warn!(error = %e, "archive serialization failed"),
            }
            self.record(tab, &filename, total, "zip");
            tokio::time::sleep(self.config.grace).await;
        } else {
            self.record(tab, &filename, total, "files");
        }
        self.sink.emit(Event::Close { tab });

        // only this session's own entry may be removed; the tab may already
        // belong to a replacement session
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.get(&tab).is_some_and(|h| h.id == id) {
            sessions.remove(&tab);
        }
    }

    /// Downloads a single job. Failures are swallowed per job: one bad link
    /// never aborts the batch or the session, and nothing is retried.
    async fn download_one(
        &self,
        job: QualifiedImage,
        archive: Option<&Mutex<ZipBuilder>>,
        template: &str,
        token: &CancellationToken,
    ) {
        let name = job
            .filename
            .clone()
            .unwrap_or_else(|| names::derive(&job.src, &job.r#type));
        match archive {
            Some(archive) => match self.net.fetch_blob(&job.src, job.size).await {
                Ok(bytes) => {
                    // a fetch that outlived cancellation must not land
                    if token.is_cancelled() {
                        return;
                    }
                    if let Err(e) = archive.lock().unwrap().add(&name, &bytes) {
                        warn!(name = name.as_str(), error = %e, "archive insert failed");
                    }
                }
                Err(e) => debug!(src = job.src.as_str(), error = %e, "download dropped"),
            },
            None => {
                let mut rel = PathBuf::from(template);
                rel.pop();
                rel.push(&name);
                if let Err(e) = self.saver.save_url(&job.src, &rel).await {
                    debug!(src = job.src.as_str(), error = %e, "download dropped");
                }
                // a save request acknowledges start, not completion
                tokio::time::sleep(self.config.settle).await;
            }
        }
    }

    fn record(&self, tab: TabId, filename: &str, count: usize, mode: &str) {
        if !self.config.record_history {
            return;
        }
        let record = data::DownloadRecord {
            id: Uuid::new_v4().to_string(),
            tab,
            filename: filename.to_string(),
            count,
            mode: mode.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = data::append_history(record) {
            warn!(error = %e, "history append failed");
        }
    }
}
