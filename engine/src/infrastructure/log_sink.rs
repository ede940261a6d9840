// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! LogSink adapters for worker stdout/stderr

use crate::constants::LOG_BUFFERED_LINES;
use crate::domain::ports::{LogSink, OutputStream};
use crate::domain::{Result, SupervisorError, WorkerId};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

/// Forwards worker output to `tracing` under the `worker` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write_line(&self, worker: &WorkerId, stream: OutputStream, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        match stream {
            OutputStream::Stdout => info!(target: "worker", worker = %worker, "{}", line),
            OutputStream::Stderr => warn!(target: "worker", worker = %worker, "{}", line),
        }
    }
}

/// One open log file. Writes are queued to a background thread; dropping
/// the guard flushes the queue and closes the file.
#[derive(Debug)]
struct LogFile {
    writer: NonBlocking,
    _guard: WorkerGuard,
}

/// Appends worker output to `<dir>/<name>-<instance>-out.log` and
/// `<dir>/<name>-<instance>-err.log`.
///
/// Disk I/O never happens on the caller's thread: each file has its own
/// writer thread behind a bounded queue, and lines are dropped rather than
/// stalling the output drain when a disk falls behind.
#[derive(Debug)]
pub struct FileLogSink {
    dir: PathBuf,
    files: Mutex<HashMap<(WorkerId, OutputStream), LogFile>>,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            SupervisorError::InvalidConfiguration(format!(
                "cannot create log directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(WorkerId, OutputStream), LogFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flush and close every open file so the next line reopens it. Lets an
    /// external rotator move the files away.
    pub fn reopen(&self) {
        let closing: Vec<LogFile> = self.lock().drain().map(|(_, file)| file).collect();
        drop(closing);
    }

    pub fn path_for(&self, worker: &WorkerId, stream: OutputStream) -> PathBuf {
        let suffix = match stream {
            OutputStream::Stdout => "out",
            OutputStream::Stderr => "err",
        };
        self.dir
            .join(format!("{}-{}-{}.log", worker.name, worker.instance, suffix))
    }

    fn open(&self, worker: &WorkerId, stream: OutputStream) -> std::io::Result<LogFile> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(worker, stream))?;
        let (writer, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(LOG_BUFFERED_LINES)
            .lossy(true)
            .thread_name("worker-log")
            .finish(file);
        Ok(LogFile {
            writer,
            _guard: guard,
        })
    }

    fn append(&self, worker: &WorkerId, stream: OutputStream, line: &[u8]) -> std::io::Result<()> {
        let key = (worker.clone(), stream);
        if !self.lock().contains_key(&key) {
            let file = self.open(worker, stream)?;
            self.lock().entry(key.clone()).or_insert(file);
        }

        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line);
        record.push(b'\n');

        let mut files = self.lock();
        if let Some(file) = files.get_mut(&key) {
            file.writer.write_all(&record)?;
        }
        Ok(())
    }
}

impl LogSink for FileLogSink {
    fn write_line(&self, worker: &WorkerId, stream: OutputStream, line: &[u8]) {
        if let Err(e) = self.append(worker, stream, line) {
            warn!(worker = %worker, %stream, error = %e, "Failed to write worker log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_appends_per_stream() {
        let dir = TempDir::new().unwrap();
        let sink = FileLogSink::new(dir.path().join("logs")).unwrap();
        let worker = WorkerId::new("crawler_gas_price", 1);

        sink.write_line(&worker, OutputStream::Stdout, b"gas=21");
        sink.write_line(&worker, OutputStream::Stdout, b"gas=22");
        sink.write_line(&worker, OutputStream::Stderr, b"rpc timeout");
        sink.reopen();

        let out = fs::read_to_string(dir.path().join("logs/crawler_gas_price-1-out.log")).unwrap();
        let err = fs::read_to_string(dir.path().join("logs/crawler_gas_price-1-err.log")).unwrap();
        assert_eq!(out, "gas=21\ngas=22\n");
        assert_eq!(err, "rpc timeout\n");
    }

    #[test]
    fn test_file_sink_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let worker = WorkerId::new("upload", 0);
        fs::write(dir.path().join("upload-0-out.log"), "previous\n").unwrap();

        let sink = FileLogSink::new(dir.path()).unwrap();
        sink.write_line(&worker, OutputStream::Stdout, b"next");
        sink.reopen();

        let out = fs::read_to_string(sink.path_for(&worker, OutputStream::Stdout)).unwrap();
        assert_eq!(out, "previous\nnext\n");
    }

    #[test]
    fn test_reopen_after_rotation() {
        let dir = TempDir::new().unwrap();
        let sink = FileLogSink::new(dir.path()).unwrap();
        let worker = WorkerId::new("ftx_spot_price", 0);
        let path = sink.path_for(&worker, OutputStream::Stdout);

        sink.write_line(&worker, OutputStream::Stdout, b"before");
        fs::rename(&path, dir.path().join("rotated.log")).unwrap();
        sink.reopen();
        sink.write_line(&worker, OutputStream::Stdout, b"after");
        sink.reopen();

        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("rotated.log")).unwrap(),
            "before\n"
        );
    }

    #[test]
    fn test_workers_write_through_independent_files() {
        let dir = TempDir::new().unwrap();
        let sink = std::sync::Arc::new(FileLogSink::new(dir.path()).unwrap());

        let writers: Vec<_> = (0..4)
            .map(|instance| {
                let sink = std::sync::Arc::clone(&sink);
                std::thread::spawn(move || {
                    let worker = WorkerId::new("cmc_price_crawler", instance);
                    for n in 0..200 {
                        let line = format!("tick {}", n);
                        sink.write_line(&worker, OutputStream::Stdout, line.as_bytes());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        sink.reopen();

        for instance in 0..4 {
            let worker = WorkerId::new("cmc_price_crawler", instance);
            let out = fs::read_to_string(sink.path_for(&worker, OutputStream::Stdout)).unwrap();
            let lines: Vec<&str> = out.lines().collect();
            assert_eq!(lines.len(), 200);
            assert_eq!(lines[0], "tick 0");
            assert_eq!(lines[199], "tick 199");
        }
    }

    #[test]
    fn test_tracing_sink_accepts_invalid_utf8() {
        TracingLogSink.write_line(
            &WorkerId::new("mark_price", 0),
            OutputStream::Stderr,
            &[0xff, 0xfe, b'x'],
        );
    }
}
