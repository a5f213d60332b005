use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, info, warn};

use crate::engine::{day::DayBoundary, streak::StreakEngine};

use super::entities::{CompletionEntity, FocusSessionEntity, ItemEntity};

const ITEMS_FILE: &str = "items.json";
const COMPLETIONS_FILE: &str = "completions.jsonl";
const FOCUS_FILE: &str = "focus.jsonl";

/// Interface for abstracting storage of items, completions and focus sessions.
pub trait TrackerStorage {
    fn items(&self) -> impl Future<Output = Result<Vec<ItemEntity>>> + Send;

    fn item(&self, id: &str) -> impl Future<Output = Result<Option<ItemEntity>>> + Send;

    /// Inserts the item or replaces the one with the same id.
    fn save_item(&self, item: ItemEntity) -> impl Future<Output = Result<()>> + Send;

    /// Returns whether an item was removed. Its completions are dropped from the log along with
    /// it, so a later item reusing the id starts without history.
    fn remove_item(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;

    fn append_completion(&self, entry: CompletionEntity)
    -> impl Future<Output = Result<()>> + Send;

    /// Raw log entries in the order they were written, optionally only those of one item.
    fn completions(
        &self,
        item_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<CompletionEntity>>> + Send;

    fn append_focus_session(
        &self,
        session: FocusSessionEntity,
    ) -> impl Future<Output = Result<()>> + Send;

    fn focus_sessions(&self) -> impl Future<Output = Result<Vec<FocusSessionEntity>>> + Send;

    /// Rewrites the completion log keeping only entries that are still in effect for existing
    /// items. Returns the number of dropped entries.
    fn compact(&self, boundary: DayBoundary) -> impl Future<Output = Result<usize>> + Send;
}

impl<T: Deref> TrackerStorage for T
where
    T::Target: TrackerStorage,
{
    fn items(&self) -> impl Future<Output = Result<Vec<ItemEntity>>> + Send {
        self.deref().items()
    }

    fn item(&self, id: &str) -> impl Future<Output = Result<Option<ItemEntity>>> + Send {
        self.deref().item(id)
    }

    fn save_item(&self, item: ItemEntity) -> impl Future<Output = Result<()>> + Send {
        self.deref().save_item(item)
    }

    fn remove_item(&self, id: &str) -> impl Future<Output = Result<bool>> + Send {
        self.deref().remove_item(id)
    }

    fn append_completion(
        &self,
        entry: CompletionEntity,
    ) -> impl Future<Output = Result<()>> + Send {
        self.deref().append_completion(entry)
    }

    fn completions(
        &self,
        item_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<CompletionEntity>>> + Send {
        self.deref().completions(item_id)
    }

    fn append_focus_session(
        &self,
        session: FocusSessionEntity,
    ) -> impl Future<Output = Result<()>> + Send {
        self.deref().append_focus_session(session)
    }

    fn focus_sessions(&self) -> impl Future<Output = Result<Vec<FocusSessionEntity>>> + Send {
        self.deref().focus_sessions()
    }

    fn compact(&self, boundary: DayBoundary) -> impl Future<Output = Result<usize>> + Send {
        self.deref().compact(boundary)
    }
}

/// The main realization of [TrackerStorage], a directory of JSON files.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    async fn read_lines<T: DeserializeOwned + Send>(&self, path: &Path) -> Result<Vec<T>> {
        async fn extract<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let mut reader = BufReader::new(file);
            let mut values = vec![];
            let result = async {
                let mut line = vec![];
                while reader.read_until(b'\n', &mut line).await? > 0 {
                    values.extend(parse_line(path, &line));
                    line.clear();
                }
                Ok::<_, std::io::Error>(())
            }
            .await;

            reader.into_inner().unlock_async().await?;
            result.map(|_| values)
        }

        match extract(path).await {
            Ok(values) => Ok(values),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
        }
    }

    async fn append_line<T: Serialize + Send>(&self, path: &Path, value: T) -> Result<()> {
        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');

        let mut file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {path:?}"))?;

        file.lock_exclusive()?;
        let result = async {
            file.write_all(&line).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        Ok(result?)
    }

    /// Runs `update` over the stored items while holding an exclusive lock on `items.json` and
    /// writes the result back.
    async fn update_items<R: Send>(
        &self,
        update: impl FnOnce(&mut Vec<ItemEntity>) -> R + Send,
    ) -> Result<R> {
        let path = self.dir.join(ITEMS_FILE);
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {path:?}"))?;

        file.lock_exclusive()?;
        let result = Self::update_items_with_file(&mut file, update).await;
        file.unlock_async().await?;
        result.with_context(|| format!("Failed to update {path:?}"))
    }

    async fn update_items_with_file<R>(
        file: &mut File,
        update: impl FnOnce(&mut Vec<ItemEntity>) -> R,
    ) -> Result<R> {
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        let mut items = parse_items(&content)?;

        let result = update(&mut items);

        let buffer = serde_json::to_vec_pretty(&items)?;
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(result)
    }

    /// Replaces the completion log with what `rewrite` keeps of it, in place and under an
    /// exclusive lock. Appenders hold the same inode, so their writes land after the rewrite.
    /// Returns the number of dropped lines, unparseable ones included.
    async fn rewrite_completions(
        &self,
        rewrite: impl FnOnce(Vec<CompletionEntity>) -> Vec<CompletionEntity> + Send,
    ) -> Result<usize> {
        let path = self.dir.join(COMPLETIONS_FILE);
        let mut file = match File::options()
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).with_context(|| format!("Failed to open {path:?}")),
        };

        file.lock_exclusive()?;
        let result = Self::rewrite_completions_with_file(&mut file, &path, rewrite).await;
        file.unlock_async().await?;
        result.with_context(|| format!("Failed to rewrite {path:?}"))
    }

    async fn rewrite_completions_with_file(
        file: &mut File,
        path: &Path,
        rewrite: impl FnOnce(Vec<CompletionEntity>) -> Vec<CompletionEntity>,
    ) -> Result<usize> {
        let mut content = Vec::new();
        file.read_to_end(&mut content).await?;
        let lines = content
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.trim_ascii().is_empty())
            .collect::<Vec<_>>();
        let before = lines.len();
        let entries = lines
            .into_iter()
            .filter_map(|line| parse_line(path, line))
            .collect();

        let kept = rewrite(entries);

        let mut buffer = Vec::<u8>::new();
        for entry in &kept {
            serde_json::to_writer(&mut buffer, entry)?;
            buffer.push(b'\n');
        }
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(before.saturating_sub(kept.len()))
    }
}

/// A crash in the middle of an append leaves half a line behind, possibly cut inside a
/// multibyte character. Such lines are skipped.
fn parse_line<T: DeserializeOwned>(path: &Path, line: &[u8]) -> Option<T> {
    if line.trim_ascii().is_empty() {
        return None;
    }
    match serde_json::from_slice::<T>(line) {
        Ok(value) => Some(value),
        Err(e) => {
            let line = String::from_utf8_lossy(line);
            warn!("During parsing in path {path:?} found illegal json string {line}: {e}");
            None
        }
    }
}

fn parse_items(content: &str) -> Result<Vec<ItemEntity>> {
    if content.trim().is_empty() {
        return Ok(vec![]);
    }
    Ok(serde_json::from_str(content)?)
}

impl TrackerStorage for FileStorage {
    async fn items(&self) -> Result<Vec<ItemEntity>> {
        let path = self.dir.join(ITEMS_FILE);
        let read = async {
            let mut file = File::open(&path).await?;
            file.lock_shared()?;
            let mut content = String::new();
            let result = file.read_to_string(&mut content).await;
            file.unlock_async().await?;
            result.map(|_| content)
        };
        match read.await {
            Ok(content) => parse_items(&content).with_context(|| format!("Corrupted {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
        }
    }

    async fn item(&self, id: &str) -> Result<Option<ItemEntity>> {
        Ok(self.items().await?.into_iter().find(|item| &*item.id == id))
    }

    async fn save_item(&self, item: ItemEntity) -> Result<()> {
        debug!("Saving item {}", item.id);
        self.update_items(move |items| {
            match items.iter_mut().find(|stored| stored.id == item.id) {
                Some(stored) => *stored = item,
                None => items.push(item),
            }
        })
        .await
    }

    async fn remove_item(&self, id: &str) -> Result<bool> {
        let removed = self
            .update_items(|items| {
                let before = items.len();
                items.retain(|item| &*item.id != id);
                before != items.len()
            })
            .await?;
        if removed {
            let purged = self
                .rewrite_completions(|mut entries| {
                    entries.retain(|entry| &*entry.item_id != id);
                    entries
                })
                .await?;
            debug!("Purged {purged} completions of {id}");
        }
        Ok(removed)
    }

    async fn append_completion(&self, entry: CompletionEntity) -> Result<()> {
        self.append_line(&self.dir.join(COMPLETIONS_FILE), entry).await
    }

    async fn completions(&self, item_id: Option<&str>) -> Result<Vec<CompletionEntity>> {
        let mut entries = self
            .read_lines::<CompletionEntity>(&self.dir.join(COMPLETIONS_FILE))
            .await?;
        if let Some(item_id) = item_id {
            entries.retain(|entry| &*entry.item_id == item_id);
        }
        Ok(entries)
    }

    async fn append_focus_session(&self, session: FocusSessionEntity) -> Result<()> {
        self.append_line(&self.dir.join(FOCUS_FILE), session).await
    }

    async fn focus_sessions(&self) -> Result<Vec<FocusSessionEntity>> {
        self.read_lines(&self.dir.join(FOCUS_FILE)).await
    }

    async fn compact(&self, boundary: DayBoundary) -> Result<usize> {
        let items = self.items().await?;
        let dropped = self
            .rewrite_completions(|entries| {
                StreakEngine::new(boundary)
                    .project(entries.into_iter().map(Into::into))
                    .into_iter()
                    .filter(|event| items.iter().any(|item| item.id == event.item_id))
                    .map(CompletionEntity::from)
                    .collect()
            })
            .await?;
        info!("Compacted {COMPLETIONS_FILE}, dropped {dropped} entries");
        Ok(dropped)
    }
}
