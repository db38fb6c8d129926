//! Fallback across several filesystems.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;
use url::Url;

use crate::path::{check_path, check_pattern};
use crate::uri::uri_path;
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Metadata, Protocol};

/// Tries each member filesystem in turn.
///
/// `open`, `read_file` and `stat` return the first success. When every
/// member fails the error lists all failures, in the order the members were
/// tried. `read_dir` and `glob` merge the results of all members, sorted and
/// without duplicates, and fail only when no member succeeds.
///
/// Members are consulted in the order given unless random order is enabled,
/// in which case every call uses a fresh permutation.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use layerfs::{ChainFs, FileSystem, MemoryFs};
///
/// let primary = MemoryFs::new().with_file("x.txt", "primary");
/// let mirror = MemoryFs::new()
///     .with_file("x.txt", "mirror")
///     .with_file("y.txt", "only here");
/// let fs = ChainFs::new(vec![Arc::new(primary), Arc::new(mirror)]);
///
/// assert_eq!(fs.read_file("x.txt").unwrap(), b"primary");
/// assert_eq!(fs.read_file("y.txt").unwrap(), b"only here");
/// assert!(fs.read_file("z.txt").unwrap_err().is_not_found());
/// ```
pub struct ChainFs {
    filesystems: Vec<FsRef>,
    rng: Option<Mutex<StdRng>>,
}

impl ChainFs {
    /// A chain consulting `filesystems` in order.
    pub fn new(filesystems: Vec<FsRef>) -> Self {
        Self {
            filesystems,
            rng: None,
        }
    }

    /// Consult members in a fresh random order on every call.
    pub fn with_random_order(self) -> Self {
        self.with_rng(StdRng::from_entropy())
    }

    /// Random order from a seeded generator, for reproducible orderings.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(Mutex::new(rng));
        self
    }

    /// The member filesystems, in configuration order.
    pub fn filesystems(&self) -> &[FsRef] {
        &self.filesystems
    }

    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.filesystems.len()).collect();
        if let Some(rng) = &self.rng {
            let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
            order.shuffle(&mut *rng);
        }
        order
    }

    fn members(&self) -> impl Iterator<Item = (usize, &FsRef)> {
        self.order().into_iter().map(|i| (i, &self.filesystems[i]))
    }

    /// First success, else every failure joined.
    fn first<T>(
        &self,
        operation: &'static str,
        path: &str,
        f: impl Fn(&FsRef) -> Result<T, FsError>,
    ) -> Result<T, FsError> {
        let mut errors = Vec::new();
        for (member, fs) in self.members() {
            match f(fs) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(operation, path, member, error = %err, "chain member failed");
                    errors.push(err);
                }
            }
        }
        Err(exhausted(path, errors))
    }

    /// Results of every member that succeeds, in configuration order;
    /// failures joined when none does.
    fn all<T>(
        &self,
        operation: &'static str,
        path: &str,
        f: impl Fn(&FsRef) -> Result<T, FsError>,
    ) -> Result<Vec<T>, FsError> {
        let mut values = Vec::new();
        let mut errors = Vec::new();
        for (member, fs) in self.members() {
            match f(fs) {
                Ok(value) => values.push((member, value)),
                Err(err) => {
                    debug!(operation, path, member, error = %err, "chain member failed");
                    errors.push(err);
                }
            }
        }
        if values.is_empty() {
            return Err(exhausted(path, errors));
        }
        values.sort_by_key(|(member, _)| *member);
        Ok(values.into_iter().map(|(_, value)| value).collect())
    }
}

fn exhausted(path: &str, errors: Vec<FsError>) -> FsError {
    FsError::join(errors)
        .unwrap_or_else(|| FsError::NotFound {
            path: path.to_string(),
        })
        .layer("chain")
}

impl fmt::Debug for ChainFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainFs")
            .field("members", &self.filesystems.len())
            .field("random", &self.rng.is_some())
            .finish()
    }
}

impl FileSystem for ChainFs {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path).map_err(|e| e.layer("chain"))?;
        self.first("open", path, |fs| fs.open(path))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        check_path("read_file", path).map_err(|e| e.layer("chain"))?;
        self.first("read_file", path, |fs| fs.read_file(path))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        check_path("stat", path).map_err(|e| e.layer("chain"))?;
        self.first("stat", path, |fs| fs.stat(path))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        check_path("read_dir", path).map_err(|e| e.layer("chain"))?;
        let mut merged = BTreeMap::new();
        for entries in self.all("read_dir", path, |fs| fs.read_dir(path))? {
            for entry in entries {
                merged.entry(entry.name.clone()).or_insert(entry);
            }
        }
        Ok(merged.into_values().collect())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        check_pattern("glob", pattern).map_err(|e| e.layer("chain"))?;
        let mut names: Vec<String> = self
            .all("glob", pattern, |fs| fs.glob(pattern))?
            .into_iter()
            .flatten()
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        check_path("sub", dir).map_err(|e| e.layer("chain"))?;
        let views = self.all("sub", dir, |fs| crate::sub(Arc::clone(fs), dir))?;
        let chain = ChainFs::new(views);
        let chain = match &self.rng {
            Some(rng) => {
                let seed = rng.lock().unwrap_or_else(PoisonError::into_inner).r#gen();
                chain.with_seed(seed)
            }
            None => chain,
        };
        Ok(Some(Arc::new(chain)))
    }
}

/// Protocol resolving every URI against one shared [`ChainFs`].
///
/// The URI's scheme and authority are ignored; its path, with query and
/// fragment, is returned for the chain.
#[derive(Debug, Clone)]
pub struct ChainProto {
    chain: Arc<ChainFs>,
}

impl ChainProto {
    /// A protocol handing out `chain`.
    pub fn new(chain: ChainFs) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }
}

impl Protocol for ChainProto {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        Ok((self.chain.clone(), uri_path(uri, true)))
    }
}
