//! Recorded chat streams: one JSON object per line, replayable into a session.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use chatbox_core::actions::AbortReason;
use chatbox_core::actions::ChatInput;
use chatbox_core::actions::StreamEvent;
use chatbox_core::session::ChatSession;
use chatbox_core::session::SubmitError;
use chatbox_core::session::TranscriptStore;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

/// What happened on the stream at one point in the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureEntry {
    Event { event: StreamEvent },
    Complete,
    Fail { message: String },
    Abort,
}

impl CaptureEntry {
    fn ends_stream(&self) -> bool {
        !matches!(self, Self::Event { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureLine {
    pub line: u64,
    pub at_ms: i64,
    pub entry: CaptureEntry,
}

/// Lines read back from a capture file, plus how many were unreadable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub lines: Vec<CaptureLine>,
    pub skipped: usize,
}

pub fn read_capture(path: &Path) -> io::Result<Capture> {
    let mut capture = Capture::default();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(capture),
        Err(err) => return Err(err),
    };
    for (index, text) in BufReader::new(file).lines().enumerate() {
        let text = text?;
        if text.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CaptureLine>(&text) {
            Ok(line) => capture.lines.push(line),
            Err(err) => {
                debug!(line = index + 1, %err, "unreadable capture line");
                capture.skipped += 1;
            }
        }
    }
    capture.lines.sort_by_key(|line| line.line);
    Ok(capture)
}

/// Appends entries to a capture file, continuing its line numbering.
pub struct CaptureWriter {
    path: PathBuf,
    out: BufWriter<File>,
    next_line: u64,
}

impl CaptureWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let next_line = read_capture(path)?
            .lines
            .last()
            .map_or(1, |line| line.line.saturating_add(1));

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let out = BufWriter::new(options.open(path)?);
        Ok(Self {
            path: path.to_path_buf(),
            out,
            next_line,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, entry: CaptureEntry) -> io::Result<u64> {
        let line = CaptureLine {
            line: self.next_line,
            at_ms: chrono::Utc::now().timestamp_millis(),
            entry,
        };
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.next_line = self.next_line.saturating_add(1);
        Ok(line.line)
    }
}

/// Reads one line of `chatbox record` input: a lifecycle marker
/// (`{"type":"fail","message":...}`) or a bare stream event.
pub fn parse_input_line(text: &str) -> serde_json::Result<CaptureEntry> {
    serde_json::from_str::<CaptureEntry>(text).or_else(|_| {
        serde_json::from_str::<StreamEvent>(text).map(|event| CaptureEntry::Event { event })
    })
}

/// Submits `prompt` and plays the recorded stream against it. The first
/// lifecycle marker ends the stream; without one the stream completes.
pub fn replay(prompt: ChatInput, lines: &[CaptureLine]) -> Result<ChatSession, SubmitError> {
    let mut session = ChatSession::new();
    let stream = session.submit(prompt)?.stream_id;

    let mut ended = false;
    for line in lines {
        if ended {
            debug!(line = line.line, "entry after end of stream ignored");
            continue;
        }
        ended = line.entry.ends_stream();
        match &line.entry {
            CaptureEntry::Event { event } => {
                session.dispatch(stream, event.clone());
            }
            CaptureEntry::Complete => {
                session.complete(stream);
            }
            CaptureEntry::Fail { message } => {
                session.fail(stream, message);
            }
            CaptureEntry::Abort => session.abort(AbortReason::Stop),
        }
    }
    if !ended {
        session.complete(stream);
    }
    info!(entries = lines.len(), "capture replayed");
    Ok(session)
}
