//! Command-line interface over the VFS library.

use crate::commit::Commit;
use crate::config::Config;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::crypto::merkle::verify_merkle_proof;
use crate::error::VfsError;
use crate::header::{headers_from_json, Header, PART_SIZE};
use crate::store::{get_json, put_json, SledStore, Storage, HEADERS_KEY};
use crate::vfs::Vfs;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sealfs", version, about = "Signed, content-addressed virtual file system")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Blob store directory (overrides configuration)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Enable log output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialise an empty file system for the configured key
    Init {
        /// File part size in bytes
        #[arg(long)]
        part_size: Option<i64>,
    },
    /// Show the signed root header
    Status,
    /// Build a commit from a source directory and apply it
    Commit { src: PathBuf },
    /// Write headers newer than --since and the body stream to
    /// <out>.headers.json and <out>.body
    Export {
        #[arg(long, default_value_t = 0)]
        since: i64,
        out: PathBuf,
    },
    /// Apply a commit from exported files
    Import {
        headers: PathBuf,
        body: PathBuf,
    },
    /// List a directory
    Ls { path: String },
    /// Write file content to stdout
    Cat { path: String },
    /// Print and check a membership proof for a path
    Prove { path: String },
}

/// Resolved execution context for one CLI invocation.
pub struct RunContext {
    config: Config,
}

impl RunContext {
    pub fn new(cli: &Cli) -> Result<RunContext, VfsError> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(store) = &cli.store {
            config.store_dir = store.clone();
        }
        Ok(RunContext { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn execute(&self, command: &Command) -> Result<String, VfsError> {
        match command {
            Command::Init { part_size } => self.init(*part_size),
            Command::Status => self.status(),
            Command::Commit { src } => self.commit(src),
            Command::Export { since, out } => self.export(*since, out),
            Command::Import { headers, body } => self.import(headers, body),
            Command::Ls { path } => self.ls(path),
            Command::Cat { path } => self.cat(path),
            Command::Prove { path } => self.prove(path),
        }
    }

    fn open_store(&self) -> Result<Arc<SledStore>, VfsError> {
        Ok(Arc::new(SledStore::open(&self.config.store_dir)?))
    }

    /// Publisher key recorded in the persisted root header.
    fn stored_public_key(&self, store: &dyn Storage) -> Result<PublicKey, VfsError> {
        let headers: Option<Vec<Header>> = get_json(store, HEADERS_KEY)?;
        headers
            .and_then(|hh| hh.into_iter().find(|h| h.path() == "/"))
            .and_then(|root| root.public_key())
            .ok_or_else(|| {
                VfsError::Config("file system is not initialised (run `sealfs init`)".to_string())
            })
    }

    fn private_key(&self) -> Result<PrivateKey, VfsError> {
        let seed = self.config.key_seed.as_deref().ok_or_else(|| {
            VfsError::Config("no key seed configured (set SEALFS_KEY_SEED)".to_string())
        })?;
        Ok(PrivateKey::from_seed(seed))
    }

    fn open_vfs(&self) -> Result<(Vfs, Arc<SledStore>), VfsError> {
        let store = self.open_store()?;
        let public_key = self.stored_public_key(store.as_ref())?;
        let vfs = Vfs::open(public_key, store.clone() as Arc<dyn Storage>)?;
        Ok((vfs, store))
    }

    fn init(&self, part_size: Option<i64>) -> Result<String, VfsError> {
        let prv = self.private_key()?;
        let store = self.open_store()?;

        let existing: Option<Vec<Header>> = get_json(store.as_ref(), HEADERS_KEY)?;
        if existing.is_some() {
            return Err(VfsError::Config("store is already initialised".to_string()));
        }

        let mut root = Header::new_root(&prv.public_key());
        if let Some(size) = part_size {
            if size <= 0 {
                return Err(VfsError::Config("part size must be positive".to_string()));
            }
            root.set_int(PART_SIZE, size);
        }
        store.execute(&mut |tx| put_json(tx, HEADERS_KEY, &vec![root.clone()]))?;

        Ok(format!("initialised; public key: {}", prv.public_key()))
    }

    fn status(&self) -> Result<String, VfsError> {
        let (vfs, _) = self.open_vfs()?;
        let root = vfs.root_header();
        Ok(format!(
            "ver {} · volume {} · {} headers\n{}",
            root.ver(),
            root.tree_volume(),
            vfs.headers().len(),
            root
        ))
    }

    fn commit(&self, src: &PathBuf) -> Result<String, VfsError> {
        let prv = self.private_key()?;
        let (vfs, _) = self.open_vfs()?;
        let source = Arc::new(crate::source::DirSource::new(src.clone()));
        let commit = vfs.make_commit(&prv, source, Utc::now())?;

        let ver = commit.ver();
        let count = commit.headers.len();
        vfs.apply_commit(commit)?;
        Ok(format!("committed ver {} ({} headers)", ver, count))
    }

    fn export(&self, since: i64, out: &PathBuf) -> Result<String, VfsError> {
        let (vfs, _) = self.open_vfs()?;
        let mut commit = match vfs.get_commit(since)? {
            Some(commit) => commit,
            None => return Ok(format!("nothing newer than ver {}", since)),
        };

        let headers_path = out.with_extension("headers.json");
        let body_path = out.with_extension("body");
        fs::write(&headers_path, serde_json::to_vec(&commit.headers)?)?;
        let mut body_file = fs::File::create(&body_path)?;
        let written = io::copy(&mut commit.body, &mut body_file)?;

        Ok(format!(
            "exported ver {}: {} headers to {}, {} body bytes to {}",
            commit.ver(),
            commit.headers.len(),
            headers_path.display(),
            written,
            body_path.display()
        ))
    }

    fn import(&self, headers: &PathBuf, body: &PathBuf) -> Result<String, VfsError> {
        let (vfs, _) = self.open_vfs()?;
        let headers: Vec<Header> = headers_from_json(&fs::read(headers)?)?;
        let body = fs::File::open(body)?;

        let commit = Commit {
            headers,
            body: Box::new(body),
        };
        let ver = commit.ver();
        vfs.apply_commit(commit)?;
        Ok(format!("imported commit; now at ver {}", ver))
    }

    fn ls(&self, path: &str) -> Result<String, VfsError> {
        let (vfs, _) = self.open_vfs()?;
        let mut out = String::new();
        for h in vfs.read_dir(path)? {
            let marker = if h.deleted() { " (deleted)" } else { "" };
            out.push_str(&format!(
                "{}\tver {}\t{} B{}\n",
                h.path(),
                h.ver(),
                h.file_size(),
                marker
            ));
        }
        Ok(out.trim_end().to_string())
    }

    fn cat(&self, path: &str) -> Result<String, VfsError> {
        let (vfs, _) = self.open_vfs()?;
        let header = vfs.file_header(path)?;
        if header.is_dir() || header.deleted() {
            return Err(VfsError::NotFound);
        }
        let mut blob = vfs.open_file(path)?;
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        io::copy(
            &mut blob.as_mut().take(header.file_size() as u64),
            &mut lock,
        )?;
        lock.flush()?;
        Ok(String::new())
    }

    fn prove(&self, path: &str) -> Result<String, VfsError> {
        let (vfs, _) = self.open_vfs()?;
        let (hash, witness) = vfs.file_merkle_proof(path)?;
        let root = vfs.root_header();

        let ok = verify_merkle_proof(&hash, root.tree_merkle_root(), &witness);
        Ok(format!(
            "hash: {}\nwitness ({} steps): {}\nverified against ver {}: {}",
            hex::encode(hash),
            witness.len() / 33,
            hex::encode(&witness),
            root.ver(),
            if ok { "OK" } else { "FAILED" }
        ))
    }
}

/// Human-readable error rendering for process exit.
pub fn map_error(err: &VfsError) -> String {
    format!("error: {}", err)
}
