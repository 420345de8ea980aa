//! Mock implementations for all repository and port traits
//!
//! This module provides in-memory mock implementations that can be used
//! for unit testing without requiring a database, a filesystem or a real
//! image codec. Every mock is cheap to clone and shares its state between
//! clones, so tests can keep a handle while the pipeline owns another.

use async_trait::async_trait;
use imagebatch_domain::entities::{
    Batch, BatchItem, BatchStatus, BatchType, Feed, Image, ImageGenerationSpec, ImageMetadata,
    OutputFormat, Post, ResizeRequest, StatSnapshot,
};
use imagebatch_domain::ports::{ImageCodec, ImageLocation, ImageStorage, StatsSink};
use imagebatch_domain::repositories::{
    BatchRepository, FeedRepository, ImageGenerationRepository, ImageRepository, PostRepository,
};
use imagebatch_errors::{PipelineError, PipelineResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::helpers::ConcurrencyProbe;

async fn maybe_sleep(delay: &Arc<Mutex<Option<Duration>>>) {
    let delay = *delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Mock implementation of FeedRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockFeedRepository {
    feeds: Arc<Mutex<Vec<Feed>>>,
    failure: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockFeedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feeds(feeds: Vec<Feed>) -> Self {
        let repo = Self::new();
        *repo.feeds.lock().unwrap() = feeds;
        repo
    }

    pub fn add_feed(&self, feed: Feed) {
        self.feeds.lock().unwrap().push(feed);
    }

    /// Make every partition query fail with the given message
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedRepository for MockFeedRepository {
    async fn get_active_partition(
        &self,
        start_row: i64,
        end_row: i64,
    ) -> PipelineResult<Vec<Feed>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(PipelineError::persistence(message));
        }
        if end_row <= start_row || start_row < 0 {
            return Ok(vec![]);
        }

        let mut active: Vec<Feed> = self
            .feeds
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.active)
            .cloned()
            .collect();
        active.sort_by_key(|f| f.id);

        Ok(active
            .into_iter()
            .skip(start_row as usize)
            .take((end_row - start_row) as usize)
            .collect())
    }
}

/// Mock implementation of PostRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockPostRepository {
    posts: Arc<Mutex<HashMap<i64, Vec<Post>>>>,
    failing_feeds: Arc<Mutex<HashSet<i64>>>,
    failing_updates: Arc<Mutex<HashSet<i64>>>,
    updates: Arc<Mutex<Vec<Post>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    probe: ConcurrencyProbe,
}

impl MockPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        let repo = Self::new();
        for post in posts {
            repo.add_post(post);
        }
        repo
    }

    pub fn add_post(&self, post: Post) {
        self.posts
            .lock()
            .unwrap()
            .entry(post.feed_id)
            .or_default()
            .push(post);
    }

    /// Make the post query for one feed fail
    pub fn fail_feed(&self, feed_id: i64) {
        self.failing_feeds.lock().unwrap().insert(feed_id);
    }

    /// Make the write-back of one post fail
    pub fn fail_update(&self, post_id: i64) {
        self.failing_updates.lock().unwrap().insert(post_id);
    }

    /// Delay every post query, to keep feed tasks in flight
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Probe entered for the duration of every post query
    pub fn probe(&self) -> ConcurrencyProbe {
        self.probe.clone()
    }

    /// Every post passed to `update_one`, in call order
    pub fn updates(&self) -> Vec<Post> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self, post_id: i64) -> usize {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.id == post_id)
            .count()
    }

    pub fn last_update(&self, post_id: i64) -> Option<Post> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.id == post_id)
            .cloned()
    }
}

#[async_trait]
impl PostRepository for MockPostRepository {
    async fn find_by_status(
        &self,
        feed_id: i64,
        _batch_type: BatchType,
    ) -> PipelineResult<Vec<Post>> {
        let _guard = self.probe.enter();
        maybe_sleep(&self.delay).await;

        let fails = self.failing_feeds.lock().unwrap().contains(&feed_id);
        if fails {
            return Err(PipelineError::persistence(format!(
                "post query failed for feed {feed_id}"
            )));
        }

        Ok(self
            .posts
            .lock()
            .unwrap()
            .get(&feed_id)
            .map(|posts| {
                posts
                    .iter()
                    .filter(|p| !p.images_processed)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(&self, post: &Post) -> PipelineResult<()> {
        self.updates.lock().unwrap().push(post.clone());
        if self.failing_updates.lock().unwrap().contains(&post.id) {
            return Err(PipelineError::persistence(format!(
                "post update failed for post {}",
                post.id
            )));
        }

        if let Some(posts) = self.posts.lock().unwrap().get_mut(&post.feed_id) {
            if let Some(stored) = posts.iter_mut().find(|p| p.id == post.id) {
                *stored = post.clone();
            }
        }
        Ok(())
    }
}

/// Mock implementation of ImageRepository for testing
#[derive(Debug, Clone)]
pub struct MockImageRepository {
    images: Arc<Mutex<Vec<Image>>>,
    next_id: Arc<Mutex<i64>>,
    failing_lookups: Arc<Mutex<HashSet<i64>>>,
    fail_create: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
    probe: ConcurrencyProbe,
}

impl MockImageRepository {
    pub fn new() -> Self {
        Self {
            images: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
            failing_lookups: Arc::new(Mutex::new(HashSet::new())),
            fail_create: Arc::new(AtomicBool::new(false)),
            delay: Arc::new(Mutex::new(None)),
            probe: ConcurrencyProbe::new(),
        }
    }

    pub fn with_images(images: Vec<Image>) -> Self {
        let repo = Self::new();
        let max_id = images.iter().map(|i| i.id).max().unwrap_or(0);
        *repo.images.lock().unwrap() = images;
        *repo.next_id.lock().unwrap() = max_id + 1;
        repo
    }

    pub fn add_image(&self, image: Image) {
        self.images.lock().unwrap().push(image);
    }

    /// Make the source lookup for one post fail with a repository error
    pub fn fail_lookup(&self, post_id: i64) {
        self.failing_lookups.lock().unwrap().insert(post_id);
    }

    pub fn fail_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Delay every source lookup, to keep post tasks in flight
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Probe entered for the duration of every source lookup
    pub fn probe(&self) -> ConcurrencyProbe {
        self.probe.clone()
    }

    pub fn renditions_for(&self, post_id: i64) -> Vec<Image> {
        self.images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.post_id == post_id && i.is_rendition())
            .cloned()
            .collect()
    }

    pub fn rendition_count(&self) -> usize {
        self.images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.is_rendition())
            .count()
    }
}

impl Default for MockImageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageRepository for MockImageRepository {
    async fn find_one(&self, post_id: i64, index: i32) -> PipelineResult<Option<Image>> {
        let _guard = self.probe.enter();
        maybe_sleep(&self.delay).await;

        let fails = self.failing_lookups.lock().unwrap().contains(&post_id);
        if fails {
            return Err(PipelineError::persistence(format!(
                "image lookup failed for post {post_id}"
            )));
        }

        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.post_id == post_id && i.index == index)
            .cloned())
    }

    async fn create(&self, image: &Image) -> PipelineResult<Image> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("image insert failed"));
        }

        let mut next_id = self.next_id.lock().unwrap();
        let mut created = image.clone();
        created.id = *next_id;
        *next_id += 1;

        self.images.lock().unwrap().push(created.clone());
        Ok(created)
    }
}

/// Mock implementation of ImageGenerationRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockImageGenerationRepository {
    specs: Arc<Mutex<Vec<ImageGenerationSpec>>>,
    loads: Arc<AtomicUsize>,
    pending_failures: Arc<Mutex<usize>>,
}

impl MockImageGenerationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_specs(specs: Vec<ImageGenerationSpec>) -> Self {
        let repo = Self::new();
        *repo.specs.lock().unwrap() = specs;
        repo
    }

    /// Make the next `count` catalog loads fail
    pub fn fail_next_loads(&self, count: usize) {
        *self.pending_failures.lock().unwrap() = count;
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerationRepository for MockImageGenerationRepository {
    async fn find_active(&self) -> PipelineResult<Vec<ImageGenerationSpec>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        {
            let mut pending = self.pending_failures.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Err(PipelineError::persistence("generation catalog unavailable"));
            }
        }

        let mut active: Vec<ImageGenerationSpec> = self
            .specs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }
}

/// Mock implementation of BatchRepository for testing
#[derive(Debug, Clone)]
pub struct MockBatchRepository {
    batches: Arc<Mutex<HashMap<i64, Batch>>>,
    items: Arc<Mutex<HashMap<i64, BatchItem>>>,
    next_batch_id: Arc<Mutex<i64>>,
    next_item_id: Arc<Mutex<i64>>,
    status_history: Arc<Mutex<Vec<(i64, BatchStatus)>>>,
    item_completions: Arc<Mutex<HashMap<i64, usize>>>,
    task_completions: Arc<AtomicUsize>,
    fail_add_task: Arc<AtomicBool>,
    fail_item_completion: Arc<AtomicBool>,
}

impl MockBatchRepository {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(HashMap::new())),
            items: Arc::new(Mutex::new(HashMap::new())),
            next_batch_id: Arc::new(Mutex::new(1)),
            next_item_id: Arc::new(Mutex::new(1)),
            status_history: Arc::new(Mutex::new(Vec::new())),
            item_completions: Arc::new(Mutex::new(HashMap::new())),
            task_completions: Arc::new(AtomicUsize::new(0)),
            fail_add_task: Arc::new(AtomicBool::new(false)),
            fail_item_completion: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_add_task(&self) {
        self.fail_add_task.store(true, Ordering::SeqCst);
    }

    pub fn fail_item_completion(&self) {
        self.fail_item_completion.store(true, Ordering::SeqCst);
    }

    pub fn batch(&self, id: i64) -> Option<Batch> {
        self.batches.lock().unwrap().get(&id).cloned()
    }

    pub fn items_for(&self, batch_id: i64) -> Vec<BatchItem> {
        let mut items: Vec<BatchItem> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.batch_id == batch_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.feed_id);
        items
    }

    /// Every status persisted for a batch, in write order
    pub fn status_history(&self, batch_id: i64) -> Vec<BatchStatus> {
        self.status_history
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == batch_id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn item_completion_count(&self, item_id: i64) -> usize {
        self.item_completions
            .lock()
            .unwrap()
            .get(&item_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn task_completion_count(&self) -> usize {
        self.task_completions.load(Ordering::SeqCst)
    }

    fn record_status(&self, batch: &Batch) {
        self.status_history
            .lock()
            .unwrap()
            .push((batch.id, batch.status));
    }
}

impl Default for MockBatchRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchRepository for MockBatchRepository {
    async fn add_task(
        &self,
        batch_type: BatchType,
        schedule_id: Option<String>,
        status: BatchStatus,
    ) -> PipelineResult<Batch> {
        if self.fail_add_task.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("batch insert failed"));
        }

        let mut batch = Batch::new(batch_type, schedule_id);
        batch.status = status;
        {
            let mut next_id = self.next_batch_id.lock().unwrap();
            batch.id = *next_id;
            *next_id += 1;
        }

        self.batches.lock().unwrap().insert(batch.id, batch.clone());
        self.record_status(&batch);
        Ok(batch)
    }

    async fn update_status(&self, batch: &Batch) -> PipelineResult<()> {
        let mut batches = self.batches.lock().unwrap();
        let stored = batches
            .get_mut(&batch.id)
            .ok_or(PipelineError::BatchNotFound { id: batch.id })?;
        stored.status = batch.status;
        stored.pending_items = batch.pending_items;
        stored.started_at = batch.started_at;
        drop(batches);

        self.record_status(batch);
        Ok(())
    }

    async fn add_item(&self, batch_id: i64, feed_id: i64) -> PipelineResult<BatchItem> {
        let mut item = BatchItem::new(batch_id, feed_id);
        {
            let mut next_id = self.next_item_id.lock().unwrap();
            item.id = *next_id;
            *next_id += 1;
        }
        self.items.lock().unwrap().insert(item.id, item.clone());
        Ok(item)
    }

    async fn complete_batch_item(&self, item: &BatchItem) -> PipelineResult<i64> {
        *self
            .item_completions
            .lock()
            .unwrap()
            .entry(item.id)
            .or_insert(0) += 1;

        if self.fail_item_completion.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("batch item update failed"));
        }

        self.items.lock().unwrap().insert(item.id, item.clone());

        let mut batches = self.batches.lock().unwrap();
        let batch = batches
            .get_mut(&item.batch_id)
            .ok_or(PipelineError::BatchNotFound { id: item.batch_id })?;
        batch.pending_items -= 1;
        Ok(batch.pending_items)
    }

    async fn complete_task(&self, batch: &Batch) -> PipelineResult<()> {
        self.task_completions.fetch_add(1, Ordering::SeqCst);
        {
            let mut batches = self.batches.lock().unwrap();
            let stored = batches
                .get_mut(&batch.id)
                .ok_or(PipelineError::BatchNotFound { id: batch.id })?;
            // pending_items is only decremented by complete_batch_item
            let pending_items = stored.pending_items;
            *stored = batch.clone();
            stored.pending_items = pending_items;
        }
        self.record_status(batch);
        Ok(())
    }

    async fn get_by_id(&self, batch_id: i64) -> PipelineResult<Option<Batch>> {
        Ok(self.batch(batch_id))
    }

    async fn list_items(&self, batch_id: i64) -> PipelineResult<Vec<BatchItem>> {
        Ok(self.items_for(batch_id))
    }
}

/// In-memory image byte storage
#[derive(Debug, Clone, Default)]
pub struct MockImageStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    writes: Arc<Mutex<Vec<ImageLocation>>>,
}

impl MockImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, location: &ImageLocation, bytes: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(location.relative_path(), bytes);
    }

    /// Store placeholder bytes for a source image
    pub fn put_source(&self, feed_id: i64, image: &Image) {
        let location = ImageLocation::new(
            feed_id,
            image.post_id,
            image.index,
            image.width,
            image.height,
            image.extension.clone(),
        );
        self.put(&location, format!("source-{}", image.post_id).into_bytes());
    }

    pub fn get(&self, location: &ImageLocation) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(&location.relative_path())
            .cloned()
    }

    pub fn writes(&self) -> Vec<ImageLocation> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStorage for MockImageStorage {
    async fn read_image_bytes(&self, location: &ImageLocation) -> PipelineResult<Vec<u8>> {
        self.get(location).ok_or_else(|| {
            PipelineError::storage(format!("file not found: {}", location.relative_path()))
        })
    }

    async fn write_image_bytes(
        &self,
        location: &ImageLocation,
        bytes: &[u8],
    ) -> PipelineResult<()> {
        self.put(location, bytes.to_vec());
        self.writes.lock().unwrap().push(location.clone());
        Ok(())
    }
}

/// Deterministic fake codec
///
/// `resize` encodes the requested dimensions and format as text, and
/// `read_metadata` parses them back, so tests can check what the
/// pipeline asked for without decoding real images.
#[derive(Debug, Clone, Default)]
pub struct MockImageCodec {
    failing_widths: Arc<Mutex<HashSet<u32>>>,
    stalling_widths: Arc<Mutex<HashSet<u32>>>,
    resize_calls: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
    probe: ConcurrencyProbe,
}

impl MockImageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every resize whose target width matches
    pub fn fail_width(&self, width: u32) {
        self.failing_widths.lock().unwrap().insert(width);
    }

    /// Never finish a resize whose target width matches
    pub fn stall_width(&self, width: u32) {
        self.stalling_widths.lock().unwrap().insert(width);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn probe(&self) -> ConcurrencyProbe {
        self.probe.clone()
    }

    pub fn resize_calls(&self) -> usize {
        self.resize_calls.load(Ordering::SeqCst)
    }

    fn extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

#[async_trait]
impl ImageCodec for MockImageCodec {
    async fn resize(&self, bytes: Vec<u8>, request: ResizeRequest) -> PipelineResult<Vec<u8>> {
        let _guard = self.probe.enter();
        self.resize_calls.fetch_add(1, Ordering::SeqCst);
        maybe_sleep(&self.delay).await;

        let stalls = self.stalling_widths.lock().unwrap().contains(&request.width);
        if stalls {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if bytes.is_empty() {
            return Err(PipelineError::codec("empty source image"));
        }
        if self.failing_widths.lock().unwrap().contains(&request.width) {
            return Err(PipelineError::codec(format!(
                "resize to {}x{} failed",
                request.width, request.height
            )));
        }

        Ok(format!(
            "{}x{}.{}",
            request.width,
            request.height,
            Self::extension(request.format)
        )
        .into_bytes())
    }

    async fn read_metadata(&self, bytes: &[u8]) -> PipelineResult<ImageMetadata> {
        let text = String::from_utf8_lossy(bytes);
        let dims = text.split('.').next().unwrap_or_default();
        let (width, height) = dims
            .split_once('x')
            .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
            .ok_or_else(|| PipelineError::codec("unrecognized image data"))?;

        Ok(ImageMetadata {
            width,
            height,
            size: bytes.len() as u64,
        })
    }
}

/// Stats sink recording every flushed snapshot
#[derive(Debug, Clone, Default)]
pub struct MockStatsSink {
    snapshots: Arc<Mutex<Vec<StatSnapshot>>>,
    fail: Arc<AtomicBool>,
}

impl MockStatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_flushes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn snapshots(&self) -> Vec<StatSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn snapshots_named(&self, name: &str) -> Vec<StatSnapshot> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StatsSink for MockStatsSink {
    async fn flush(&self, snapshot: &StatSnapshot) -> PipelineResult<()> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("stats insert failed"));
        }
        Ok(())
    }
}
