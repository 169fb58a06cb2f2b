#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use img_compact::{Channel, CompressionLog, Connector, Credential, Reply, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

/// Writes a small gradient JPEG that decodes cleanly.
pub fn write_test_jpeg(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let img: RgbImage = ImageBuffer::from_fn(96, 72, |x, y| {
        Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8])
    });
    img.save_with_format(&path, ImageFormat::Jpeg).unwrap();
    path
}

/// Writes a file whose content is its own name, which is how the scripted
/// service tells uploads apart.
pub fn write_named_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    File::create(&path)
        .unwrap()
        .write_all(name.as_bytes())
        .unwrap();
    path
}

pub fn create_nested_directory_structure(temp_dir: &Path) -> PathBuf {
    let subdir = temp_dir.join("subdir");
    std::fs::create_dir(&subdir).unwrap();
    write_test_jpeg(&subdir, "nested.jpg");
    File::create(subdir.join("nested.txt"))
        .unwrap()
        .write_all(b"nested text")
        .unwrap();
    subdir
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Validate(String),
    Upload { key: String, file: String },
    Download { key: String, file: String },
}

type UploadRule = dyn Fn(&str, &str, usize) -> Option<Reply> + Send + Sync;

/// In-memory stand-in for the compression service.
///
/// Keys listed as invalid fail validation with an account error. Uploads
/// consult the rule first (key, file, attempt number for that key and file)
/// and otherwise succeed; downloads return `min:<file>`.
#[derive(Clone)]
pub struct ScriptedService {
    invalid_keys: Arc<Vec<String>>,
    rule: Arc<UploadRule>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            invalid_keys: Arc::new(Vec::new()),
            rule: Arc::new(|_, _, _| None),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_invalid_keys(mut self, keys: &[&str]) -> Self {
        self.invalid_keys = Arc::new(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&str, &str, usize) -> Option<Reply> + Send + Sync + 'static,
    {
        self.rule = Arc::new(rule);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn validations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Validate(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn uploads_of(&self, file: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload { key, file: f } if f == file => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call.clone());
        calls.iter().filter(|c| **c == call).count()
    }
}

pub fn account_error() -> Reply {
    Reply::Account {
        message: "Your monthly limit has been exceeded".to_string(),
    }
}

pub fn transient_error() -> Reply {
    Reply::Transient {
        status: Some(503),
        message: "Service unavailable".to_string(),
    }
}

pub fn client_error() -> Reply {
    Reply::Client {
        status: 415,
        kind: "Unsupported media type".to_string(),
        message: "File type is not supported".to_string(),
    }
}

pub struct ScriptedChannel {
    key: String,
    service: ScriptedService,
}

impl Connector for ScriptedService {
    type Channel = ScriptedChannel;

    fn open(&self, credential: &Credential) -> Result<ScriptedChannel> {
        Ok(ScriptedChannel {
            key: credential.secret().to_string(),
            service: self.clone(),
        })
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn validate(&self) -> Reply {
        self.service.record(Call::Validate(self.key.clone()));
        if self.service.invalid_keys.contains(&self.key) {
            return Reply::Account {
                message: "Credentials are invalid.".to_string(),
            };
        }
        Reply::Client {
            status: 400,
            kind: "InputMissing".to_string(),
            message: "Input file is empty".to_string(),
        }
    }

    async fn upload(&self, bytes: Vec<u8>) -> Reply {
        let file = String::from_utf8_lossy(&bytes).into_owned();
        // let sibling uploads interleave
        tokio::time::sleep(Duration::from_millis(1)).await;
        let attempt = self.service.record(Call::Upload {
            key: self.key.clone(),
            file: file.clone(),
        });
        if let Some(reply) = (self.service.rule)(&self.key, &file, attempt) {
            return reply;
        }
        Reply::Created {
            locator: format!("mem://{}/{}", self.key, file),
        }
    }

    async fn download(&self, locator: &str) -> Reply {
        let file = locator.rsplit('/').next().unwrap_or_default().to_string();
        self.service.record(Call::Download {
            key: self.key.clone(),
            file: file.clone(),
        });
        Reply::Body(format!("min:{}", file).into_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Start(usize),
    Compressed(PathBuf),
    Error(String),
    Stop,
}

/// Log collaborator that remembers every notification.
#[derive(Default)]
pub struct RecordingLog {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLog {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl CompressionLog for RecordingLog {
    fn start(&self, files: usize, _input_bytes: u64) {
        self.events.lock().unwrap().push(LogEvent::Start(files));
    }

    fn compressed(&self, path: &Path, _input_bytes: u64, _output_bytes: u64) {
        self.events
            .lock()
            .unwrap()
            .push(LogEvent::Compressed(path.to_path_buf()));
    }

    fn error(&self, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(LogEvent::Error(text.to_string()));
    }

    fn stop(&self, _elapsed: Duration, _input_bytes: u64, _output_bytes: u64) {
        self.events.lock().unwrap().push(LogEvent::Stop);
    }
}
