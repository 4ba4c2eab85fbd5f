//! Log sink setup: env_logger writing through a size-rotating file

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

use crate::config::LogConfig;

/// Initialize the process-wide logger. With no path configured, lines go to
/// stderr; `RUST_LOG` overrides the default `info` filter.
pub fn init(config: &LogConfig) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(path) = &config.path {
        let writer =
            RotatingFileWriter::open(path.clone(), config.max_size_bytes, config.backup_count)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(writer)));
    }

    builder.try_init().context("Failed to initialize logger")?;
    Ok(())
}

/// Appends to a file, rotating `log → log.1 → … → log.{backup_count}` when
/// the next write would push the current file past the size limit
pub struct RotatingFileWriter {
    path: PathBuf,
    max_size_bytes: u64,
    backup_count: u32,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    pub fn open(path: PathBuf, max_size_bytes: u64, backup_count: u32) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_size_bytes,
            backup_count,
            file,
            written,
        })
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count == 0 {
            // No backups kept: restart the current file in place
            self.file = File::create(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;

        self.file = File::create(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
