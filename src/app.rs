// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tracing::{debug, info, warn};

use crate::config::{ClusterConfig, MonitorOptions};
use crate::slurm::{ClusterSnapshot, NodeDiagnostics, StatusSource};
use crate::ui::drilldown;
use crate::ui::{Dashboard, Palette};

/// Granularity of the interruptible sleep between polls
const SLEEP_CHUNK: Duration = Duration::from_millis(100);

/// The poll loop: fetch, index, render, and optionally repeat.
pub struct Monitor<S, D> {
    cluster: ClusterConfig,
    options: MonitorOptions,
    palette: Palette,
    source: S,
    diagnostics: D,
    shutdown: Arc<AtomicBool>,
    clear_screen: bool,
}

impl<S: StatusSource, D: NodeDiagnostics> Monitor<S, D> {
    /// Fails when the interval or the cluster description is invalid; nothing is fetched.
    pub fn new(
        cluster: ClusterConfig,
        options: MonitorOptions,
        palette: Palette,
        source: S,
        diagnostics: D,
    ) -> Result<Self> {
        options.validate()?;
        cluster.validate()?;
        Ok(Self {
            cluster,
            options,
            palette,
            source,
            diagnostics,
            shutdown: Arc::new(AtomicBool::new(false)),
            clear_screen: false,
        })
    }

    /// Clear the terminal before each dashboard
    pub fn with_screen_clearing(mut self, enabled: bool) -> Self {
        self.clear_screen = enabled;
        self
    }

    /// Stop between cycles once `flag` is set (e.g. from a Ctrl-C handler)
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run one cycle, or cycles until shutdown when monitoring forever.
    ///
    /// A failed fetch aborts a single-shot run; in monitor mode the cycle is skipped.
    pub fn run(&mut self, out: &mut impl Write) -> Result<()> {
        let mut cycle = 0u64;
        loop {
            cycle += 1;
            match self.source.fetch() {
                Ok(dump) => self.render_cycle(&dump, out)?,
                Err(e) if self.options.monitor_forever => {
                    warn!(cycle, error = %e, "failed to fetch job status, skipping this cycle");
                }
                Err(e) => return Err(e).context("failed to fetch job status"),
            }

            if !self.options.monitor_forever || self.shutdown_requested() {
                break;
            }

            debug!(cycle, interval = ?self.options.interval, "sleeping until next poll");
            self.sleep_interruptibly();
            if self.shutdown_requested() {
                info!("shutdown requested, leaving monitor loop");
                break;
            }
        }
        Ok(())
    }

    fn render_cycle(&mut self, dump: &str, out: &mut impl Write) -> Result<()> {
        let snapshot = ClusterSnapshot::from_dump(dump, &self.cluster);
        if snapshot.jobs.is_empty() {
            info!("no running or pending jobs in status dump");
        }

        if self.options.show_dashboard {
            if self.clear_screen {
                queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
            }
            let dashboard = Dashboard::new(
                &self.cluster,
                self.palette,
                self.options.hide_names,
                &self.options.highlight_users,
            );
            out.write_all(dashboard.render(&snapshot).as_bytes())?;
        }

        for node in drilldown::selected_nodes(&snapshot.nodes, &self.options.drill_down_nodes) {
            out.write_all(drilldown::format_node(node)?.as_bytes())?;
            // Diagnostic output is inherited and must land after the entry
            out.flush()?;
            if let Err(e) = self.diagnostics.run(&node.name) {
                warn!(node = %node.name, error = %e, "node diagnostic failed");
            }
        }

        let details = drilldown::render_user_details(&snapshot.jobs, &self.options.full_detail_users)?;
        out.write_all(details.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn sleep_interruptibly(&self) {
        let interval = self.options.interval;
        let mut slept = Duration::ZERO;
        while slept < interval {
            if self.shutdown_requested() {
                break;
            }
            std::thread::sleep(SLEEP_CHUNK.min(interval - slept));
            slept += SLEEP_CHUNK;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slurm::slurm::SourceError;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;
    use std::rc::Rc;

    const DUMP: &str = "\
JobId=501 UserId=alice(1001)
   JobState=RUNNING
   NodeList=hal[01-02]
   TRES=cpu=64,node=2,gres/gpu=2
JobId=502 UserId=bob(1002)
   JobState=RUNNING
   NodeList=hal03
   TRES=cpu=8,node=1
";

    /// Returns `dump` (or an error when `None`) and counts fetches
    struct FakeSource {
        dump: Option<String>,
        fetches: Rc<Cell<usize>>,
        stop_on_fetch: Option<Arc<AtomicBool>>,
    }

    impl FakeSource {
        fn new(dump: Option<&str>) -> Self {
            Self {
                dump: dump.map(String::from),
                fetches: Rc::new(Cell::new(0)),
                stop_on_fetch: None,
            }
        }
    }

    impl StatusSource for FakeSource {
        fn fetch(&mut self) -> Result<String, SourceError> {
            self.fetches.set(self.fetches.get() + 1);
            if let Some(flag) = &self.stop_on_fetch {
                flag.store(true, Ordering::SeqCst);
            }
            self.dump.clone().ok_or(SourceError::EmptyCommand)
        }
    }

    #[derive(Default)]
    struct FakeDiagnostics {
        calls: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl NodeDiagnostics for FakeDiagnostics {
        fn run(&mut self, node: &str) -> Result<()> {
            self.calls.borrow_mut().push(node.to_string());
            if self.fail {
                anyhow::bail!("ssh to {} failed", node);
            }
            Ok(())
        }
    }

    fn options() -> MonitorOptions {
        MonitorOptions {
            show_dashboard: true,
            ..MonitorOptions::with_interval_secs(60).unwrap()
        }
    }

    fn monitor(options: MonitorOptions, source: FakeSource) -> Monitor<FakeSource, FakeDiagnostics> {
        Monitor::new(
            ClusterConfig::default(),
            options,
            Palette::Plain,
            source,
            FakeDiagnostics::default(),
        )
        .unwrap()
    }

    fn run_to_string<S: StatusSource, D: NodeDiagnostics>(m: &mut Monitor<S, D>) -> String {
        let mut out = Vec::new();
        m.run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_short_interval_is_rejected_before_fetching() {
        let source = FakeSource::new(Some(DUMP));
        let fetches = source.fetches.clone();
        let options = MonitorOptions {
            interval: Duration::from_secs(59),
            ..options()
        };
        let result = Monitor::new(
            ClusterConfig::default(),
            options,
            Palette::Plain,
            source,
            FakeDiagnostics::default(),
        );
        assert!(result.is_err());
        assert_eq!(fetches.get(), 0);
    }

    #[test]
    fn test_single_shot_renders_dashboard() {
        let mut m = monitor(options(), FakeSource::new(Some(DUMP)));
        let out = run_to_string(&mut m);
        assert!(out.contains("| hal01 | alice 501, "));
        assert!(out.contains("| hal03 | bob 502, "));
        assert!(out.contains("Legend:"));
        assert_eq!(m.source.fetches.get(), 1);
    }

    #[test]
    fn test_cycles_are_idempotent() {
        let mut m = monitor(options(), FakeSource::new(Some(DUMP)));
        let first = run_to_string(&mut m);
        let second = run_to_string(&mut m);
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_shot_fetch_failure_is_fatal() {
        let mut m = monitor(options(), FakeSource::new(None));
        let mut out = Vec::new();
        let err = m.run(&mut out).unwrap_err();
        assert!(format!("{err:#}").contains("failed to fetch job status"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_monitor_mode_skips_failed_cycle() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut source = FakeSource::new(None);
        source.stop_on_fetch = Some(flag.clone());
        let options = MonitorOptions {
            monitor_forever: true,
            ..options()
        };
        let mut m = monitor(options, source).with_shutdown_flag(flag);
        let out = run_to_string(&mut m);
        assert!(out.is_empty());
        assert_eq!(m.source.fetches.get(), 1);
    }

    #[test]
    fn test_monitor_mode_stops_on_shutdown() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut source = FakeSource::new(Some(DUMP));
        source.stop_on_fetch = Some(flag.clone());
        let options = MonitorOptions {
            monitor_forever: true,
            ..options()
        };
        let mut m = monitor(options, source).with_shutdown_flag(flag);
        let out = run_to_string(&mut m);
        assert!(out.contains("| hal01 |"));
        assert_eq!(m.source.fetches.get(), 1);
    }

    #[test]
    fn test_screen_clearing_precedes_dashboard() {
        let mut m = monitor(options(), FakeSource::new(Some(DUMP))).with_screen_clearing(true);
        let out = run_to_string(&mut m);
        assert!(out.starts_with("\x1b[2J"));

        let mut m = monitor(options(), FakeSource::new(Some(DUMP)));
        assert!(run_to_string(&mut m).starts_with("|---"));
    }

    #[test]
    fn test_drill_downs_without_dashboard() {
        let options = MonitorOptions {
            show_dashboard: false,
            drill_down_nodes: ["hal03", "hal01"].iter().map(|s| s.to_string()).collect(),
            full_detail_users: BTreeSet::from(["bob".to_string()]),
            ..options()
        };
        let mut m = monitor(options, FakeSource::new(Some(DUMP)));
        m.diagnostics.fail = true;
        let calls = m.diagnostics.calls.clone();

        let out = run_to_string(&mut m);
        assert!(!out.contains("Legend:"));
        // Node entries in table order, then the user's jobs
        let hal01 = out.find("hal01\n{").unwrap();
        let hal03 = out.find("hal03\n{").unwrap();
        let job = out.find("502\n{").unwrap();
        assert!(hal01 < hal03 && hal03 < job);
        assert!(!out.contains("501\n{"));
        // Failing diagnostics are logged, not fatal
        assert_eq!(*calls.borrow(), vec!["hal01", "hal03"]);
    }
}
