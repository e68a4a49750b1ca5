//! Key sequence commands
//!
//! A [`CommandContainer`] maps typed key sequences to callbacks. Starting
//! it locks the keyboard and records presses until an end or cancel key,
//! then runs the command whose sequence matches exactly.

mod parse;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::ConfigError;
use crate::key::Key;
use crate::sync::Job;
use crate::tracker::LockKind;

pub use parse::{parse_sequence, validate};

pub type CommandFn = Arc<dyn Fn() + Send + Sync>;

pub fn default_end_keys() -> HashSet<Key> {
    HashSet::from([Key::Enter, Key::NumpadEnter])
}

pub fn default_cancel_keys() -> HashSet<Key> {
    HashSet::from([Key::Escape])
}

/// How a recording terminates
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub timeout: Option<Duration>,
    pub max_length: Option<usize>,
    pub end_keys: HashSet<Key>,
    pub cancel_keys: HashSet<Key>,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_length: None,
            end_keys: default_end_keys(),
            cancel_keys: default_cancel_keys(),
        }
    }
}

/// Record typed keys while blocking the keyboard.
///
/// Modifier and mouse presses are blocked but not recorded. Backspace
/// removes the last key. The job succeeds on an end key, on
/// reaching `max_length`, or, without end keys, as soon as the input
/// exactly matches a command in `container`. It fails on a cancel key or
/// timeout.
pub async fn record(
    engine: &Engine,
    options: &RecordOptions,
    container: Option<&CommandContainer>,
) -> Result<Job<Vec<Key>>, ConfigError> {
    if options.end_keys.is_empty() && container.is_none() {
        return Err(ConfigError::NoRecordingTerminator);
    }

    let _keyboard = engine.lock_input(LockKind::Keyboard);
    engine.release_virtual_keys();

    let started = Instant::now();
    let mut inputs = Vec::new();
    let mut success = false;

    loop {
        let remaining = match options.timeout {
            Some(timeout) => match timeout.checked_sub(started.elapsed()) {
                Some(remaining) if !remaining.is_zero() => Some(remaining),
                _ => break,
            },
            None => None,
        };

        let Some(key) = engine.wait_any_key_down(remaining, true).await else {
            break;
        };
        if key.is_mouse() || key.is_modifier() {
            continue;
        }

        if options.cancel_keys.contains(&key) {
            break;
        }
        if options.end_keys.contains(&key) {
            success = true;
            break;
        }
        if key == Key::Backspace {
            inputs.pop();
            continue;
        }

        inputs.push(key);
        if options.max_length.is_some_and(|max| inputs.len() >= max) {
            success = true;
            break;
        }
        if options.end_keys.is_empty() && container.is_some_and(|container| container.contains(&inputs)) {
            success = true;
            break;
        }
    }

    debug!(?inputs, success, "recording finished");
    Ok(if success {
        Job::completed(inputs)
    } else {
        Job::failed(Vec::new())
    })
}

pub struct CommandContainer {
    commands: HashMap<Vec<Key>, CommandFn>,
    end_keys: HashSet<Key>,
    cancel_keys: HashSet<Key>,
}

impl Default for CommandContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandContainer {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            end_keys: default_end_keys(),
            cancel_keys: default_cancel_keys(),
        }
    }

    /// Replace the end keys; with none, an exact match ends the recording
    pub fn with_end_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.end_keys = keys.into_iter().collect();
        self
    }

    pub fn with_cancel_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.cancel_keys = keys.into_iter().collect();
        self
    }

    pub fn end_keys(&self) -> &HashSet<Key> {
        &self.end_keys
    }

    pub fn cancel_keys(&self) -> &HashSet<Key> {
        &self.cancel_keys
    }

    /// Bind a command string such as `"hi"` or `"{f 2}x"`
    pub fn define(&mut self, command: &str, f: impl Fn() + Send + Sync + 'static) -> Result<(), ConfigError> {
        let keys = parse_sequence(command)?;
        if self.commands.contains_key(&keys) {
            return Err(ConfigError::DuplicateCommand(command.to_string()));
        }
        self.commands.insert(keys, Arc::new(f));
        Ok(())
    }

    pub fn define_keys(&mut self, keys: Vec<Key>, f: impl Fn() + Send + Sync + 'static) -> Result<(), ConfigError> {
        validate(&keys)?;
        if self.commands.contains_key(&keys) {
            let name = keys.iter().map(Key::to_string).collect::<Vec<_>>().join(" ");
            return Err(ConfigError::DuplicateCommand(name));
        }
        self.commands.insert(keys, Arc::new(f));
        Ok(())
    }

    pub fn contains(&self, keys: &[Key]) -> bool {
        self.commands.contains_key(keys)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Record a sequence and run the matching command.
    ///
    /// Succeeds only if a command ran.
    pub async fn start(&self, engine: &Engine, timeout: Option<Duration>) -> Job<bool> {
        let options = RecordOptions {
            timeout,
            max_length: None,
            end_keys: self.end_keys.clone(),
            cancel_keys: self.cancel_keys.clone(),
        };
        let container = self.end_keys.is_empty().then_some(self);

        let recorded = match record(engine, &options, container).await {
            Ok(job) => job,
            Err(e) => {
                warn!(%e, "command recording rejected");
                return Job::failed(false);
            }
        };
        if !recorded.is_success() {
            return Job::failed(false);
        }

        let keys = recorded.result();
        match self.commands.get(&keys) {
            Some(command) => {
                info!(?keys, "running command");
                command();
                Job::completed(true)
            }
            None => {
                debug!(?keys, "no command matches");
                Job::failed(false)
            }
        }
    }
}

impl fmt::Debug for CommandContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContainer")
            .field("commands", &self.commands.len())
            .field("end_keys", &self.end_keys)
            .field("cancel_keys", &self.cancel_keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::Config;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn tap(engine: &Engine, key: Key) -> bool {
        let blocked = engine.record_input(key, true, false, 0).unwrap();
        settle().await;
        engine.record_input(key, false, false, 0).unwrap();
        settle().await;
        blocked
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_duplicate_definitions() {
        let mut container = CommandContainer::new();
        container.define("hi", || {}).unwrap();
        assert_eq!(
            container.define("HI", || {}),
            Err(ConfigError::DuplicateCommand("HI".to_string()))
        );
        assert!(matches!(
            container.define_keys(vec![Key::H, Key::I], || {}),
            Err(ConfigError::DuplicateCommand(_))
        ));
        assert_eq!(
            container.define_keys(vec![], || {}),
            Err(ConfigError::EmptyCommand)
        );
        assert_eq!(container.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_command_runs_once() {
        let engine = Engine::new(Config::default());
        let (count, hi) = counter();
        let mut container = CommandContainer::new();
        container.define("hi", hi).unwrap();
        let container = Arc::new(container);

        let task = {
            let engine = engine.clone();
            let container = container.clone();
            tokio::spawn(async move { container.start(&engine, None).await })
        };
        settle().await;

        assert!(tap(&engine, Key::H).await);
        tap(&engine, Key::I).await;
        tap(&engine, Key::Enter).await;

        let job = task.await.unwrap();
        assert!(job.is_success());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!engine.is_locked());
        assert!(!engine.record_input(Key::H, true, false, 0).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_runs_nothing() {
        let engine = Engine::new(Config::default());
        let (count, hi) = counter();
        let mut container = CommandContainer::new();
        container.define("hi", hi).unwrap();
        let container = Arc::new(container);

        let task = {
            let engine = engine.clone();
            let container = container.clone();
            tokio::spawn(async move { container.start(&engine, None).await })
        };
        settle().await;

        tap(&engine, Key::H).await;
        tap(&engine, Key::O).await;
        tap(&engine, Key::Escape).await;

        let job = task.await.unwrap();
        assert!(!job.is_success());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_modifiers_are_not_recorded() {
        let engine = Engine::new(Config::default());
        let (count, hi) = counter();
        let mut container = CommandContainer::new();
        container.define("hi", hi).unwrap();
        let container = Arc::new(container);

        let task = {
            let engine = engine.clone();
            let container = container.clone();
            tokio::spawn(async move { container.start(&engine, None).await })
        };
        settle().await;

        assert!(engine.record_input(Key::LShift, true, false, 0).unwrap());
        settle().await;
        tap(&engine, Key::H).await;
        engine.record_input(Key::LShift, false, false, 0).unwrap();
        settle().await;
        tap(&engine, Key::I).await;
        tap(&engine, Key::Enter).await;

        assert!(task.await.unwrap().is_success());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_sequence_fails() {
        let engine = Engine::new(Config::default());
        let mut container = CommandContainer::new();
        container.define("hi", || {}).unwrap();
        let container = Arc::new(container);

        let task = {
            let engine = engine.clone();
            let container = container.clone();
            tokio::spawn(async move { container.start(&engine, None).await })
        };
        settle().await;

        tap(&engine, Key::H).await;
        tap(&engine, Key::Enter).await;

        assert!(!task.await.unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_match_without_end_keys() {
        let engine = Engine::new(Config::default());
        let (count, go) = counter();
        let mut container = CommandContainer::new().with_end_keys([]);
        container.define("go", go).unwrap();
        let container = Arc::new(container);

        let task = {
            let engine = engine.clone();
            let container = container.clone();
            tokio::spawn(async move { container.start(&engine, None).await })
        };
        settle().await;

        tap(&engine, Key::G).await;
        tap(&engine, Key::X).await;
        tap(&engine, Key::Backspace).await;
        tap(&engine, Key::O).await;

        assert!(task.await.unwrap().is_success());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_limits() {
        let engine = Engine::new(Config::default());

        let options = RecordOptions {
            end_keys: HashSet::new(),
            ..RecordOptions::default()
        };
        assert_eq!(
            record(&engine, &options, None).await.err(),
            Some(ConfigError::NoRecordingTerminator)
        );

        let options = RecordOptions {
            timeout: Some(Duration::from_millis(100)),
            ..RecordOptions::default()
        };
        let job = record(&engine, &options, None).await.unwrap();
        assert!(!job.is_success());

        let options = RecordOptions {
            max_length: Some(2),
            ..RecordOptions::default()
        };
        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { record(&engine, &options, None).await })
        };
        settle().await;
        tap(&engine, Key::LButton).await;
        tap(&engine, Key::A).await;
        tap(&engine, Key::B).await;

        let job = task.await.unwrap().unwrap();
        assert!(job.is_success());
        assert_eq!(job.result(), vec![Key::A, Key::B]);
    }
}
