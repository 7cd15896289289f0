use std::{
    error::Error,
    io::{self, Write},
    str::FromStr,
};

use async_trait::async_trait;
use env_logger::Builder;
use log::LevelFilter;
use pingora::{
    server::{ListenFds, ShutdownWatch},
    services::Service,
};
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::config;

/// Sink for failures that are swallowed by an admin action but must leave a
/// trace.
pub trait LogService: Send + Sync {
    fn log_for_exception(&self, err: &(dyn Error + 'static), site: &str);
}

/// Writes exceptions through the `log` facade, including the source chain.
#[derive(Default)]
pub struct DefaultLogService;

impl LogService for DefaultLogService {
    fn log_for_exception(&self, err: &(dyn Error + 'static), site: &str) {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        if causes.is_empty() {
            log::error!(site = site; "{}: {}", site, err);
        } else {
            log::error!(site = site; "{}: {} (caused by: {})", site, err, causes.join(": "));
        }
    }
}

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes `env_logger` output into the configured log file. Writing happens
/// on a dedicated pingora service so handlers never block on file I/O.
pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    pub fn init_env_logger(&self) {
        let writer = AsyncWriter {
            sender: self.sender.clone(),
        };
        Builder::from_env(env_logger::Env::default())
            .filter(None, level_filter(self.config.level.as_deref()))
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .init();
    }
}

fn level_filter(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|level| LevelFilter::from_str(level).ok())
        .unwrap_or(LevelFilter::Info)
}

#[async_trait]
impl Service for Logger {
    async fn start_service(&mut self, _fds: Option<ListenFds>, mut shutdown: ShutdownWatch) {
        let log_file_path = &self.config.path;

        if let Some(parent) = std::path::Path::new(log_file_path).parent() {
            if metadata(parent).await.is_err() {
                if let Err(e) = create_dir_all(parent).await {
                    eprintln!("Failed to create log path {}: {}", parent.display(), e);
                    return;
                }
            }
        }

        let file = match OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_file_path, e);
                return;
            }
        };
        let mut file = BufWriter::new(file);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("Shutdown signal received, stopping write log");
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                eprintln!("Failed to write to log file: {}", e);
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        if let Err(e) = file.flush().await {
            eprintln!("Failed to flush log file: {}", e);
        }
    }

    fn name(&self) -> &'static str {
        "log sync"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}
