//! State-history recorders.
//!
//! A recorder receives every snapshot as it is produced (incremental mode) or
//! a vehicle's whole history when it arrives (bulk mode). The file recorder
//! writes one `<uuid> statehistory.txt` per vehicle.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use uuid::Uuid;

use crate::error::RecordError;
use crate::recording::snapshot::VehicleState;
use crate::simulation::vehicle::VehicleId;

/// Fixed suffix of every state-history file name.
pub const HISTORY_FILE_SUFFIX: &str = " statehistory.txt";

/// When snapshots reach the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Whole history written once the vehicle arrives.
    #[default]
    Bulk,
    /// One line appended per tick while the vehicle is alive.
    Incremental,
}

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct RecorderConfig {
    pub root_output_path: PathBuf,
    pub output_folder: String,
    pub mode: WriteMode,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_output_path: PathBuf::from("output"),
            output_folder: "Test".to_string(),
            mode: WriteMode::Bulk,
        }
    }
}

impl RecorderConfig {
    pub fn full_output_path(&self) -> PathBuf {
        self.root_output_path.join(&self.output_folder)
    }
}

/// Sink for vehicle state snapshots.
pub trait StateRecorder: Send + Sync {
    fn mode(&self) -> WriteMode;

    /// Called with every snapshot as it is produced.
    fn append(&mut self, vehicle: VehicleId, state: &VehicleState) -> Result<(), RecordError>;

    /// Called once with the full history when a vehicle arrives.
    fn flush(&mut self, vehicle: VehicleId, history: &[VehicleState]) -> Result<(), RecordError>;

    /// Called when a vehicle is removed without arriving.
    fn close(&mut self, _vehicle: VehicleId) {}
}

/// Writes one text file per vehicle under the configured output folder.
pub struct FileRecorder {
    directory: PathBuf,
    mode: WriteMode,
    files: HashMap<VehicleId, PathBuf>,
}

impl FileRecorder {
    /// Create the output folder if needed. Failing here is fatal to startup.
    pub fn new(config: &RecorderConfig) -> Result<Self, RecordError> {
        let directory = config.full_output_path();
        fs::create_dir_all(&directory).map_err(|source| RecordError::CreateOutputFolder {
            path: directory.clone(),
            source,
        })?;
        info!("Recording state history to {}", directory.display());
        Ok(Self {
            directory,
            mode: config.mode,
            files: HashMap::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File assigned to a vehicle, allocating a fresh name on first use.
    pub fn path_for(&mut self, vehicle: VehicleId) -> PathBuf {
        let directory = &self.directory;
        self.files
            .entry(vehicle)
            .or_insert_with(|| directory.join(format!("{}{}", Uuid::new_v4(), HISTORY_FILE_SUFFIX)))
            .clone()
    }
}

impl StateRecorder for FileRecorder {
    fn mode(&self) -> WriteMode {
        self.mode
    }

    fn append(&mut self, vehicle: VehicleId, state: &VehicleState) -> Result<(), RecordError> {
        if self.mode != WriteMode::Incremental {
            return Ok(());
        }
        let path = self.path_for(vehicle);
        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", state.to_record_line())
        };
        write(&path).map_err(|source| RecordError::Write { path, source })
    }

    fn flush(&mut self, vehicle: VehicleId, history: &[VehicleState]) -> Result<(), RecordError> {
        if self.mode == WriteMode::Incremental || history.is_empty() {
            self.files.remove(&vehicle);
            return Ok(());
        }
        let path = self.path_for(vehicle);
        self.files.remove(&vehicle);

        let mut contents = String::new();
        for state in history {
            contents.push_str(&state.to_record_line());
            contents.push('\n');
        }
        fs::write(&path, contents).map_err(|source| RecordError::Write { path, source })
    }

    fn close(&mut self, vehicle: VehicleId) {
        self.files.remove(&vehicle);
    }
}

/// Recorded lines per vehicle, shared between a `MemoryRecorder` and whoever
/// inspects it.
pub type RecordLog = Arc<Mutex<HashMap<VehicleId, Vec<String>>>>;

/// Keeps record lines in memory. Used by headless runs without an output
/// folder and by tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryRecorder {
    mode: WriteMode,
    log: RecordLog,
    flushed: Arc<Mutex<Vec<VehicleId>>>,
}

impl MemoryRecorder {
    pub fn new(mode: WriteMode) -> Self {
        Self {
            mode,
            ..default()
        }
    }

    pub fn log(&self) -> RecordLog {
        Arc::clone(&self.log)
    }

    pub fn lines(&self, vehicle: VehicleId) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.get(&vehicle).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Vehicles whose history was flushed, in order.
    pub fn flushed(&self) -> Vec<VehicleId> {
        self.flushed.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl StateRecorder for MemoryRecorder {
    fn mode(&self) -> WriteMode {
        self.mode
    }

    fn append(&mut self, vehicle: VehicleId, state: &VehicleState) -> Result<(), RecordError> {
        if self.mode == WriteMode::Incremental {
            if let Ok(mut log) = self.log.lock() {
                log.entry(vehicle).or_default().push(state.to_record_line());
            }
        }
        Ok(())
    }

    fn flush(&mut self, vehicle: VehicleId, history: &[VehicleState]) -> Result<(), RecordError> {
        if self.mode == WriteMode::Bulk {
            if let Ok(mut log) = self.log.lock() {
                log.insert(vehicle, history.iter().map(VehicleState::to_record_line).collect());
            }
        }
        if let Ok(mut flushed) = self.flushed.lock() {
            flushed.push(vehicle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn state(frame: u64) -> VehicleState {
        VehicleState {
            position: Vec3::new(frame as f32, 0.0, 0.0),
            velocity: Vec3::ZERO,
            screen_centroid: Vec2::ZERO,
            screen_velocity: Vec2::ZERO,
            screen_size: Vec2::ZERO,
            timestamp: Local::now(),
            frame,
        }
    }

    fn config(root: &Path, mode: WriteMode) -> RecorderConfig {
        RecorderConfig {
            root_output_path: root.to_path_buf(),
            output_folder: "run".to_string(),
            mode,
        }
    }

    fn history_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn creates_output_folder() {
        let root = tempfile::tempdir().unwrap();
        let recorder = FileRecorder::new(&config(root.path(), WriteMode::Bulk)).unwrap();
        assert!(recorder.directory().is_dir());
        assert!(recorder.directory().ends_with("run"));
    }

    #[test]
    fn unwritable_root_is_a_startup_error() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        fs::write(&blocker, "").unwrap();
        let result = FileRecorder::new(&config(&blocker, WriteMode::Bulk));
        assert!(matches!(result, Err(RecordError::CreateOutputFolder { .. })));
    }

    #[test]
    fn bulk_mode_writes_whole_history_on_flush() {
        let root = tempfile::tempdir().unwrap();
        let mut recorder = FileRecorder::new(&config(root.path(), WriteMode::Bulk)).unwrap();
        let history = [state(1), state(2), state(3)];

        for s in &history {
            recorder.append(VehicleId(1), s).unwrap();
        }
        assert!(history_files(recorder.directory()).is_empty());

        recorder.flush(VehicleId(1), &history).unwrap();
        let files = history_files(recorder.directory());
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(HISTORY_FILE_SUFFIX));

        let contents = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with(" 3"));
    }

    #[test]
    fn incremental_mode_appends_per_tick() {
        let root = tempfile::tempdir().unwrap();
        let mut recorder = FileRecorder::new(&config(root.path(), WriteMode::Incremental)).unwrap();

        recorder.append(VehicleId(1), &state(1)).unwrap();
        recorder.append(VehicleId(2), &state(1)).unwrap();
        recorder.append(VehicleId(1), &state(2)).unwrap();
        let files = history_files(recorder.directory());
        assert_eq!(files.len(), 2);

        let first = recorder.path_for(VehicleId(1));
        assert_eq!(fs::read_to_string(&first).unwrap().lines().count(), 2);

        recorder.flush(VehicleId(1), &[state(1), state(2)]).unwrap();
        assert_eq!(fs::read_to_string(&first).unwrap().lines().count(), 2);
    }

    #[test]
    fn empty_history_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let mut recorder = FileRecorder::new(&config(root.path(), WriteMode::Bulk)).unwrap();
        recorder.flush(VehicleId(9), &[]).unwrap();
        assert!(history_files(recorder.directory()).is_empty());
    }

    #[test]
    fn memory_recorder_shares_its_log() {
        let recorder = MemoryRecorder::new(WriteMode::Bulk);
        let mut sink: Box<dyn StateRecorder> = Box::new(recorder.clone());
        sink.flush(VehicleId(4), &[state(1), state(2)]).unwrap();
        assert_eq!(recorder.lines(VehicleId(4)).len(), 2);
        assert_eq!(recorder.flushed(), vec![VehicleId(4)]);
    }
}
