//! # Transcode Supervision Module
//!
//! Questo modulo supervisiona il processo esterno di transcodifica, un file
//! alla volta.
//!
//! ## Responsabilità:
//! - Spawn del transcoder esterno con contratto di command-line fisso
//! - Streaming live di stdout/stderr verso il log sink (solo osservazionale)
//! - Interpretazione dell'exit status (zero, non-zero, kill)
//! - Validazione del risultato: l'output deve essere più piccolo dell'input
//! - Commit atomico via rename sibling (mai copy+delete tra filesystem)
//! - Ripristino best-effort dei timestamp dell'originale
//! - Aggiornamento dello store dei file processati
//!
//! ## Macchina a stati per file:
//! `IDLE -> SPAWNED -> { EXITED_OK, EXITED_ERROR, KILLED }`
//!
//! ## Esiti modellati:
//! - `Committed`: originale sostituito, fingerprint registrato
//! - `SkippedLarger`: output più grande, originale tenuto, comunque marcato
//!   processato (già valutato, non va ritentato ad ogni sessione)
//! - `Failed`: originale intatto, temp lasciato per ispezione, nessun
//!   fingerprint (ritentabile in un process lifetime futuro)
//!
//! Il processo esterno gira a priorità di scheduling bassa per non
//! affamare l'uso interattivo della macchina. Un solo transcode può
//! essere attivo alla volta; una seconda chiamata concorrente viene
//! rifiutata, non accodata.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use filetime::FileTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::controller::StopToken;
use crate::error::TranscodeError;
use crate::events::EventSender;
use crate::naming;
use crate::state::ProcessedStore;

/// Niceness applied to the external process on unix
#[cfg(unix)]
const TRANSCODER_NICENESS: libc::c_int = 10;

/// Terminal outcome of one supervised transcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Original replaced by the smaller output
    Committed { saved_bytes: u64 },
    /// Output was not smaller; original kept and marked processed
    SkippedLarger,
    /// Process failed or was killed; original untouched, not marked
    Failed,
}

/// Runs one external transcode at a time
pub struct Supervisor {
    transcoder_bin: PathBuf,
    events: EventSender,
    stop: StopToken,
    active: AtomicBool,
}

impl Supervisor {
    pub fn new(config: &Config, events: EventSender, stop: StopToken) -> Self {
        Self {
            transcoder_bin: config.transcoder_bin.clone(),
            events,
            stop,
            active: AtomicBool::new(false),
        }
    }

    /// Check that the external transcoder can be executed
    pub async fn check_dependencies(&self) -> Result<()> {
        let output = Command::new(&self.transcoder_bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                TranscodeError::MissingDependency(format!(
                    "{} is required for transcoding: {}",
                    self.transcoder_bin.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Transcoder(format!(
                "{} -version exited with {}",
                self.transcoder_bin.display(),
                describe_exit(&output.status)
            ))
            .into());
        }

        Ok(())
    }

    /// Transcode `input` into a temp sibling and commit or discard the result.
    ///
    /// Returns the modeled outcome; the caller owns the failed-file set and
    /// the session aggregate.
    pub async fn process_one(
        &self,
        input: &Path,
        store: &mut ProcessedStore,
    ) -> Result<Outcome> {
        let _guard = ActiveGuard::try_acquire(&self.active).ok_or_else(|| {
            TranscodeError::Busy(format!(
                "refusing to start {} while another transcode is active",
                input.display()
            ))
        })?;

        let temp = naming::work_output_path(input).ok_or_else(|| {
            TranscodeError::Validation(format!(
                "cannot derive a work path for {}",
                input.display()
            ))
        })?;

        self.events.log(input.display().to_string());

        let mut cmd = Command::new(&self.transcoder_bin);
        cmd.arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(["-vcodec", "libx264"])
            .args(["-preset", "slow"])
            .args(["-map_metadata", "0"])
            .args(["-acodec", "aac"])
            .arg("-y")
            .arg(&temp)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                // Priority is best-effort; a denied setpriority must not block the run
                libc::setpriority(libc::PRIO_PROCESS, 0, TRANSCODER_NICENESS);
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| {
            TranscodeError::Transcoder(format!(
                "failed to spawn {}: {}",
                self.transcoder_bin.display(),
                e
            ))
        })?;

        let stdout_task = child.stdout.take().map(|out| self.forward_lines(out));
        let stderr_task = child.stderr.take().map(|err| self.forward_lines(err));

        let mut killed = false;
        let wait_result = tokio::select! {
            status = child.wait() => status,
            _ = self.stop.cancelled() => {
                killed = true;
                self.events.log(format!("stopping transcode of {}", input.display()));
                let _ = child.start_kill();
                child.wait().await
            }
        };
        let status = wait_result.map_err(|e| {
            TranscodeError::Transcoder(format!("failed to wait for transcoder: {}", e))
        })?;

        // Drain remaining diagnostic lines before interpreting the exit. After
        // a kill the pipes may still be held open by orphans of the external
        // process, so abort the readers instead of waiting for EOF.
        for task in [stdout_task, stderr_task].into_iter().flatten() {
            if killed {
                task.abort();
            } else {
                let _ = task.await;
            }
        }

        if !status.success() {
            if killed {
                self.events.log_error(format!(
                    "transcoder for {} terminated by stop request ({})",
                    input.display(),
                    describe_exit(&status)
                ));
            } else {
                self.events
                    .log_error(format!("transcoder exited with {}", describe_exit(&status)));
            }
            // Original untouched; temp stays on disk for inspection
            return Ok(Outcome::Failed);
        }

        let input_meta = tokio::fs::metadata(input).await?;
        let temp_meta = tokio::fs::metadata(&temp).await?;

        if temp_meta.len() >= input_meta.len() {
            self.events.log("Compressed file is larger");
            if let Err(e) = tokio::fs::remove_file(&temp).await {
                self.events
                    .log_warn(format!("Error removing {}: {}", temp.display(), e));
            }
            store.mark_processed(input).await;
            return Ok(Outcome::SkippedLarger);
        }

        // Same-directory rename: atomic on one filesystem, loud failure otherwise
        if let Err(e) = std::fs::rename(&temp, input) {
            self.events
                .log_error(format!("Error moving {}: {}", temp.display(), e));
            return Ok(Outcome::Failed);
        }

        let atime = FileTime::from_last_access_time(&input_meta);
        let mtime = FileTime::from_last_modification_time(&input_meta);
        if let Err(e) = filetime::set_file_times(input, atime, mtime) {
            self.events.log_warn(format!(
                "Error restoring file timestamps for {}: {}",
                input.display(),
                e
            ));
        }

        let saved_bytes = input_meta.len() - temp_meta.len();
        self.events.log(format!(
            "Saved {} Mb",
            (saved_bytes as f64 / (1024.0 * 1024.0)).round()
        ));
        store.mark_processed(input).await;

        Ok(Outcome::Committed { saved_bytes })
    }

    fn forward_lines<R>(&self, reader: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                events.log(line);
            }
            debug!("diagnostic stream closed");
        })
    }
}

/// Exit code, or the terminating signal when there is none
fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return code.to_string();
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }
    "unknown exit".to_string()
}

/// RAII guard enforcing the single-active-transcode contract
struct ActiveGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ActiveGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod guard_tests {
    use super::*;

    #[test]
    fn test_active_guard_rejects_overlap() {
        let flag = AtomicBool::new(false);
        let first = ActiveGuard::try_acquire(&flag);
        assert!(first.is_some());
        assert!(ActiveGuard::try_acquire(&flag).is_none());

        drop(first);
        assert!(ActiveGuard::try_acquire(&flag).is_some());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::events::UiEvent;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Stand-in transcoder honoring the fixed argument contract:
    /// `$5` is the input path, `${15}` the temp output path.
    fn write_stub(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("stub-transcoder.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn stub_config(stub: &Path) -> Config {
        Config {
            transcoder_bin: stub.to_path_buf(),
            ..Default::default()
        }
    }

    fn supervisor(stub: &Path) -> Supervisor {
        Supervisor::new(
            &stub_config(stub),
            EventSender::tracing_only(),
            StopToken::new(),
        )
    }

    async fn store_in(dir: &TempDir) -> ProcessedStore {
        ProcessedStore::load(
            dir.path().join("processed_files.txt"),
            EventSender::tracing_only(),
        )
        .await
    }

    fn write_input(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let input = dir.path().join(name);
        std::fs::write(&input, vec![7u8; len]).unwrap();
        input
    }

    #[tokio::test]
    async fn test_commit_replaces_original_atomically() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", 1000);
        let old_time = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_times(&input, old_time, old_time).unwrap();

        let stub = write_stub(dir.path(), "head -c 100 \"$5\" > \"${15}\"");
        let sup = supervisor(&stub);
        let mut store = store_in(&dir).await;

        let outcome = sup.process_one(&input, &mut store).await.unwrap();

        assert_eq!(outcome, Outcome::Committed { saved_bytes: 900 });
        // Original path now holds the smaller content, temp is gone
        assert_eq!(std::fs::read(&input).unwrap(), vec![7u8; 100]);
        assert!(!naming::work_output_path(&input).unwrap().exists());
        assert!(store.contains(&input));

        // Timestamps restored from the original
        let meta = std::fs::metadata(&input).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta).unix_seconds(),
            1_000_000_000
        );
    }

    #[tokio::test]
    async fn test_larger_output_keeps_original_and_marks_processed() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", 1000);

        let stub = write_stub(dir.path(), "cat \"$5\" \"$5\" > \"${15}\"");
        let sup = supervisor(&stub);
        let mut store = store_in(&dir).await;

        let outcome = sup.process_one(&input, &mut store).await.unwrap();

        assert_eq!(outcome, Outcome::SkippedLarger);
        assert_eq!(std::fs::read(&input).unwrap(), vec![7u8; 1000]);
        assert!(!naming::work_output_path(&input).unwrap().exists());
        // Evaluated once, never retried in later sessions
        assert!(store.contains(&input));
    }

    #[tokio::test]
    async fn test_equal_size_output_counts_as_larger() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", 500);

        let stub = write_stub(dir.path(), "cat \"$5\" > \"${15}\"");
        let sup = supervisor(&stub);
        let mut store = store_in(&dir).await;

        let outcome = sup.process_one(&input, &mut store).await.unwrap();
        assert_eq!(outcome, Outcome::SkippedLarger);
        assert_eq!(std::fs::read(&input).unwrap(), vec![7u8; 500]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_leaves_original_and_temp() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", 1000);

        let stub = write_stub(dir.path(), "head -c 10 \"$5\" > \"${15}\"\nexit 3");
        let sup = supervisor(&stub);
        let mut store = store_in(&dir).await;

        let outcome = sup.process_one(&input, &mut store).await.unwrap();

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(std::fs::read(&input).unwrap(), vec![7u8; 1000]);
        // Partial temp is left for inspection and excluded from later scans
        let temp = naming::work_output_path(&input).unwrap();
        assert!(temp.exists());
        assert!(naming::is_work_file(&temp));
        assert!(!store.contains(&input));
    }

    #[tokio::test]
    async fn test_stop_kills_active_transcode() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", 1000);

        let stub = write_stub(dir.path(), "sleep 30\nhead -c 10 \"$5\" > \"${15}\"");
        let stop = StopToken::new();
        let task_stop = stop.clone();
        let task_input = input.clone();
        let config = stub_config(&stub);
        let state_path = dir.path().join("processed_files.txt");

        let handle = tokio::spawn(async move {
            let sup = Supervisor::new(&config, EventSender::tracing_only(), task_stop);
            let mut store =
                ProcessedStore::load(state_path, EventSender::tracing_only()).await;
            sup.process_one(&task_input, &mut store).await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        stop.request();

        let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("stop must terminate the transcode promptly")
            .unwrap();

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(std::fs::read(&input).unwrap(), vec![7u8; 1000]);
    }

    #[tokio::test]
    async fn test_diagnostic_lines_reach_the_log_sink() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "clip.mp4", 1000);

        let stub = write_stub(
            dir.path(),
            "echo progress-line-1\necho progress-line-2 >&2\nhead -c 100 \"$5\" > \"${15}\"",
        );
        let (events, mut rx) = EventSender::channel();
        let sup = Supervisor::new(&stub_config(&stub), events.clone(), StopToken::new());
        let mut store = store_in(&dir).await;

        sup.process_one(&input, &mut store).await.unwrap();
        drop(events);
        drop(sup);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::LogLine { text } = event {
                seen.push(text);
            }
        }
        assert!(seen.iter().any(|l| l == "progress-line-1"));
        assert!(seen.iter().any(|l| l == "progress-line-2"));
    }

    #[tokio::test]
    async fn test_check_dependencies_missing_binary() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            transcoder_bin: dir.path().join("no-such-transcoder"),
            ..Default::default()
        };
        let sup = Supervisor::new(&config, EventSender::tracing_only(), StopToken::new());
        assert!(sup.check_dependencies().await.is_err());
    }

    #[tokio::test]
    async fn test_check_dependencies_with_working_binary() {
        let dir = TempDir::new().unwrap();
        let stub = write_stub(dir.path(), "exit 0");
        let sup = supervisor(&stub);
        assert!(sup.check_dependencies().await.is_ok());
    }
}
