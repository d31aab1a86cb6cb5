//! In-memory collaborators.
//!
//! These back the CLI simulator and the test-suite. Each one is a cheap
//! `Clone` handle over shared state so the caller can keep a copy and
//! inspect what the engine did to it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::{ChapterSource, Clock, ShakeSource, TickScheduler, TickToken, Transport};
use crate::error::{CoreError, Result};
use crate::progress::{sanitize_speed, Chapter, ChapterTable};
use crate::timer::fade::clamp_volume;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Transport ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportState {
    pub position: f64,
    pub volume: f64,
    pub playing: bool,
    pub speed: f64,
    /// Every volume the engine has set, in order.
    pub volume_log: Vec<f64>,
}

/// A transport that just remembers what it was told.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Mutex<TransportState>>,
}

impl MemoryTransport {
    pub fn new(position: f64, volume: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TransportState {
                position,
                volume: clamp_volume(volume),
                playing: false,
                speed: 1.0,
                volume_log: Vec::new(),
            })),
        }
    }

    pub fn playing(position: f64) -> Self {
        let transport = Self::new(position, 1.0);
        lock(&transport.inner).playing = true;
        transport
    }

    pub fn state(&self) -> TransportState {
        lock(&self.inner).clone()
    }

    pub fn set_speed(&self, speed: f64) {
        lock(&self.inner).speed = sanitize_speed(speed);
    }

    /// Move the playhead by `wall_secs` of real time if playing. Returns the new position.
    pub fn advance(&self, wall_secs: f64) -> f64 {
        let mut state = lock(&self.inner);
        if state.playing {
            state.position += wall_secs * state.speed;
        }
        state.position
    }
}

impl Transport for MemoryTransport {
    fn play(&mut self) {
        lock(&self.inner).playing = true;
    }

    fn pause(&mut self) {
        lock(&self.inner).playing = false;
    }

    fn seek(&mut self, to_secs: f64) {
        lock(&self.inner).position = to_secs.max(0.0);
    }

    fn volume(&self) -> f64 {
        lock(&self.inner).volume
    }

    fn set_volume(&mut self, volume: f64) {
        let mut state = lock(&self.inner);
        state.volume = clamp_volume(volume);
        let volume = state.volume;
        state.volume_log.push(volume);
    }

    fn current_position(&self) -> f64 {
        lock(&self.inner).position
    }

    fn is_playing(&self) -> bool {
        lock(&self.inner).playing
    }
}

// ── Shake ────────────────────────────────────────────────────────────

/// Records whether the engine is listening for shakes.
#[derive(Debug, Clone, Default)]
pub struct MemoryShakeSource {
    monitoring: Arc<AtomicBool>,
    starts: Arc<AtomicU32>,
}

impl MemoryShakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::Relaxed)
    }
}

impl ShakeSource for MemoryShakeSource {
    fn start_monitoring(&mut self) {
        self.monitoring.store(true, Ordering::Relaxed);
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    fn stop_monitoring(&mut self) {
        self.monitoring.store(false, Ordering::Relaxed);
    }
}

// ── Clock ────────────────────────────────────────────────────────────

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<(DateTime<Utc>, NaiveDateTime)>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, local: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new((now, local))),
        }
    }

    /// A clock whose local time equals its UTC time.
    pub fn at_utc(now: DateTime<Utc>) -> Self {
        Self::new(now, now.naive_utc())
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = lock(&self.inner);
        guard.0 += by;
        guard.1 += by;
    }

    pub fn set_local(&self, local: NaiveDateTime) {
        lock(&self.inner).1 = local;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        lock(&self.inner).0
    }

    fn local_now(&self) -> NaiveDateTime {
        lock(&self.inner).1
    }
}

// ── Ticker ───────────────────────────────────────────────────────────

/// Tick scheduler that only records which loops are live; the test drives ticks by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    inner: Arc<Mutex<TickerLog>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerLog {
    pub active: Vec<TickToken>,
    pub scheduled: u32,
    pub cancelled: u32,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> TickerLog {
        lock(&self.inner).clone()
    }

    pub fn active(&self) -> Option<TickToken> {
        lock(&self.inner).active.last().copied()
    }
}

impl TickScheduler for ManualTicker {
    fn schedule(&mut self, token: TickToken) {
        let mut log = lock(&self.inner);
        log.active.push(token);
        log.scheduled += 1;
    }

    fn cancel(&mut self, token: TickToken) {
        let mut log = lock(&self.inner);
        log.active.retain(|t| *t != token);
        log.cancelled += 1;
    }
}

// ── Catalog ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    /// Length at 1x, seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    books: Vec<Book>,
}

/// Books and their chapter tables, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct BookCatalog {
    books: HashMap<String, (Book, ChapterTable)>,
}

impl BookCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book, validating its chapters.
    pub fn insert(&mut self, book: Book) -> Result<()> {
        let table = ChapterTable::new(book.chapters.clone())?;
        self.books.insert(book.id.clone(), (book, table));
        Ok(())
    }

    /// Parse a TOML catalog (`[[books]]` with nested `[[books.chapters]]`).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut catalog = Self::new();
        for book in file.books {
            catalog.insert(book)?;
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| CoreError::Custom(format!("{}: {e}", path.display())))
    }

    pub fn book(&self, id: &str) -> Option<&Book> {
        self.books.get(id).map(|(book, _)| book)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl ChapterSource for BookCatalog {
    fn current_chapters(&self, book_id: &str) -> ChapterTable {
        self.books
            .get(book_id)
            .map(|(_, table)| table.clone())
            .unwrap_or_default()
    }

    fn duration(&self, book_id: &str) -> Option<f64> {
        let (book, table) = self.books.get(book_id)?;
        // Fall back to the end of the last chapter.
        book.duration
            .or_else(|| table.iter().last().map(|chapter| chapter.end))
    }
}
