//! Active container watcher.
//!
//! Polls the active container channel and reports every change of its first line. Files under
//! `/proc` carry no useful mtime, so changes are detected by content.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::Context;

use crate::container::ActiveContainerSource;

pub struct Watcher {
    should_stop: Arc<AtomicBool>,
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }
}

impl Watcher {
    pub fn new(
        source: impl ActiveContainerSource + 'static,
        interval: Duration,
        changed: impl FnMut(&str) + Send + 'static,
    ) -> anyhow::Result<Self> {
        Self::with_start_notification(source, interval, changed, None)
    }

    pub fn with_start_notification(
        source: impl ActiveContainerSource + 'static,
        interval: Duration,
        mut changed: impl FnMut(&str) + Send + 'static,
        started: Option<mpsc::SyncSender<()>>,
    ) -> anyhow::Result<Self> {
        let should_stop = Arc::new(AtomicBool::new(false));

        {
            let should_stop = should_stop.clone();
            thread::Builder::new()
                .name(String::from("Active Container Watcher"))
                .spawn(move || {
                    let mut last = source.read_line().ok().flatten();

                    if let Some(started) = started {
                        let _ = started.send(());
                    }

                    loop {
                        thread::sleep(interval);

                        if should_stop.load(Ordering::SeqCst) {
                            break;
                        }

                        let line = match source.read_line() {
                            Ok(Some(line)) => line,
                            // Empty reads show up while the file is being rewritten.
                            Ok(None) => continue,
                            // Whatever shows up after the channel comes back is reported.
                            Err(_) => {
                                last = None;
                                continue;
                            }
                        };

                        if last.as_ref() == Some(&line) {
                            continue;
                        }

                        trace!("active container changed: {line:?}");
                        changed(&line);
                        last = Some(line);
                    }

                    debug!("exiting active container watcher thread");
                })
                .context("error spawning the watcher thread")?;
        }

        Ok(Self { should_stop })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::PathBuf;
    use std::sync::mpsc::{Receiver, RecvTimeoutError};

    use xshell::{Shell, TempDir};

    use super::*;
    use crate::container::ActiveContainerFile;

    type Result<T = (), E = Box<dyn Error>> = std::result::Result<T, E>;

    struct TestUtil {
        sh: Shell,
        _temp_dir: TempDir,
        path: PathBuf,
        rx: Receiver<String>,
        _watcher: Watcher,
    }

    impl TestUtil {
        fn new(initial: Option<&str>) -> Result<Self> {
            let sh = Shell::new()?;
            let temp_dir = sh.create_temp_dir()?;
            let path = temp_dir.path().join("active");
            if let Some(initial) = initial {
                sh.write_file(&path, initial)?;
            }

            let (tx, rx) = mpsc::channel();
            let (started_tx, started_rx) = mpsc::sync_channel(1);
            let watcher = Watcher::with_start_notification(
                ActiveContainerFile::new(&path),
                Duration::from_millis(10),
                move |line| {
                    let _ = tx.send(line.to_owned());
                },
                Some(started_tx),
            )?;
            started_rx.recv()?;

            Ok(Self {
                sh,
                _temp_dir: temp_dir,
                path,
                rx,
                _watcher: watcher,
            })
        }

        fn write(&self, contents: &str) -> Result {
            self.sh.write_file(&self.path, contents)?;
            Ok(())
        }

        fn assert_changed_to(&self, expected: &str) {
            let actual = self
                .rx
                .recv_timeout(Duration::from_secs(2))
                .expect("watcher should have noticed a change, but it didn't");
            assert_eq!(actual, expected, "watcher reported the wrong line");
        }

        fn assert_unchanged(&self) {
            assert_eq!(
                self.rx.recv_timeout(Duration::from_millis(200)),
                Err(RecvTimeoutError::Timeout),
                "watcher should not have noticed any changes"
            );
        }
    }

    #[test]
    fn initial_contents_are_not_reported() -> Result {
        let test = TestUtil::new(Some("1\n"))?;
        test.assert_unchanged();
        Ok(())
    }

    #[test]
    fn change_file() -> Result {
        let test = TestUtil::new(Some("1\n"))?;
        test.write("2\n")?;
        test.assert_changed_to("2");
        test.write("0\n")?;
        test.assert_changed_to("0");
        Ok(())
    }

    #[test]
    fn overwrite_but_dont_change_file() -> Result {
        let test = TestUtil::new(Some("1\n"))?;
        test.write("1\n")?;
        test.assert_unchanged();
        Ok(())
    }

    #[test]
    fn create_file() -> Result {
        let test = TestUtil::new(None)?;
        test.assert_unchanged();
        test.write("3\n")?;
        test.assert_changed_to("3");
        Ok(())
    }

    #[test]
    fn malformed_contents_are_still_reported() -> Result {
        let test = TestUtil::new(Some("1\n"))?;
        test.write("garbage\n")?;
        test.assert_changed_to("garbage");
        Ok(())
    }

    #[test]
    fn remove_and_recreate_file() -> Result {
        let test = TestUtil::new(Some("1\n"))?;
        test.sh.remove_path(&test.path)?;
        test.assert_unchanged();
        test.write("1\n")?;
        test.assert_changed_to("1");
        Ok(())
    }
}
