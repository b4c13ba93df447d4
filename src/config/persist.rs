// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use calloop::channel::{Channel, Sender};
use futures_executor::ThreadPool;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{store::ConfigurationStore, xml};

pub const DEFAULT_FILENAME: &str = "monitors.xml";
pub const FILENAME_VAR: &str = "COSMIC_MONITOR_FILENAME";

/// Where configurations are read from and saved to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFiles {
    /// Written on save, read first.
    pub user: Option<PathBuf>,
    /// Read-only fallbacks, the first existing one is used.
    pub system: Vec<PathBuf>,
}

impl ConfigFiles {
    /// Resolves the file name below the XDG config directories.
    pub fn from_env() -> ConfigFiles {
        let name = std::env::var(FILENAME_VAR)
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

        match xdg::BaseDirectories::new() {
            Ok(base) => ConfigFiles {
                user: Some(base.get_config_home().join(&name)),
                system: base
                    .get_config_dirs()
                    .into_iter()
                    .map(|dir| dir.join(&name))
                    .collect(),
            },
            Err(err) => {
                warn!(?err, "Unable to resolve configuration directories");
                ConfigFiles::default()
            }
        }
    }

    /// A single user file inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> ConfigFiles {
        ConfigFiles {
            user: Some(dir.as_ref().join(DEFAULT_FILENAME)),
            system: Vec::new(),
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &PathBuf> {
        self.user.iter().chain(self.system.iter())
    }

    /// Reads the first file that parses. Broken files are logged and skipped,
    /// keeping whatever they contained before the error.
    pub fn load(&self) -> ConfigurationStore {
        let mut store = ConfigurationStore::new();
        for path in self.candidates() {
            debug!("Trying monitor configuration at {}", path.display());
            let contents = match fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(?err, "Failed to read {}", path.display());
                    continue;
                }
            };
            match xml::parse(&contents, &mut store) {
                Ok(()) => {
                    info!(
                        configurations = store.len(),
                        "Using monitor configuration at {}",
                        path.display()
                    );
                    break;
                }
                Err(err) => {
                    warn!(%err, "Failed to parse stored monitor configuration at {}", path.display())
                }
            }
        }
        store
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Save was superseded by a newer one")]
    Cancelled,
    #[error("Failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct SaveCompletion {
    pub id: u64,
    pub result: Result<(), SaveError>,
}

/// Writes serialized configurations in the background, one at a time.
///
/// A new save cancels the one in flight. Completions arrive on the channel
/// returned by [`Saver::new`] and have to be passed to [`Saver::completed`].
pub struct Saver {
    path: PathBuf,
    pool: ThreadPool,
    sender: Sender<SaveCompletion>,
    next_id: u64,
    in_flight: Option<(u64, Arc<AtomicBool>)>,
}

impl Saver {
    pub fn new(path: PathBuf) -> Result<(Saver, Channel<SaveCompletion>)> {
        let pool = ThreadPool::builder()
            .pool_size(1)
            .name_prefix("monitors-save-")
            .create()
            .context("Failed to create save thread")?;
        let (sender, channel) = calloop::channel::channel();
        Ok((
            Saver {
                path,
                pool,
                sender,
                next_id: 0,
                in_flight: None,
            },
            channel,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn save(&mut self, contents: String) -> u64 {
        if let Some((id, cancelled)) = self.in_flight.take() {
            debug!(id, "Cancelling pending save");
            cancelled.store(true, Ordering::SeqCst);
        }

        self.next_id += 1;
        let id = self.next_id;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.in_flight = Some((id, cancelled.clone()));

        let path = self.path.clone();
        let sender = self.sender.clone();
        self.pool.spawn_ok(async move {
            let result = write_file(&path, &contents, &cancelled);
            let _ = sender.send(SaveCompletion { id, result });
        });
        id
    }

    /// Result of the latest save, `None` for superseded ones.
    pub fn completed(&mut self, completion: SaveCompletion) -> Option<Result<(), SaveError>> {
        match &self.in_flight {
            Some((id, _)) if *id == completion.id => {
                self.in_flight = None;
                Some(completion.result)
            }
            _ => None,
        }
    }
}

fn write_file(path: &Path, contents: &str, cancelled: &AtomicBool) -> Result<(), SaveError> {
    let io_err = |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    };
    if cancelled.load(Ordering::SeqCst) {
        return Err(SaveError::Cancelled);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).map_err(io_err)?;

    if cancelled.load(Ordering::SeqCst) {
        let _ = fs::remove_file(&tmp);
        return Err(SaveError::Cancelled);
    }
    fs::rename(&tmp, path).map_err(io_err)
}
