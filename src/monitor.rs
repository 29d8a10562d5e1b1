//! Input monitor: turns periodic level reports into press/release edges.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{MiniKbError, Result};
use crate::packet::InputReport;
use crate::session::InputReader;
use crate::transport::UsbHandle;
use crate::usb_hid;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(20);
pub const BACKOFF_INITIAL: Duration = Duration::from_millis(100);
pub const BACKOFF_MAX: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Press {
        endpoint: u8,
        keycode: u8,
        key_name: Option<&'static str>,
        modifiers: u8,
        modifier_label: String,
    },
    Release {
        endpoint: u8,
        keycode: u8,
        key_name: Option<&'static str>,
    },
    Error {
        message: String,
    },
}

/// How previously pressed keys are remembered across endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateScope {
    /// One set per endpoint: a report on one endpoint never releases keys
    /// seen on another.
    #[default]
    PerEndpoint,
    /// A single set updated by whichever endpoint reported last. Reports
    /// from two endpoints can then release each other's keys.
    Shared,
}

#[derive(Debug, Default)]
pub struct KeyTracker {
    scope: StateScope,
    shared: BTreeSet<u8>,
    per_endpoint: HashMap<u8, BTreeSet<u8>>,
}

impl KeyTracker {
    pub fn new(scope: StateScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn pressed(&self, endpoint: u8) -> BTreeSet<u8> {
        match self.scope {
            StateScope::Shared => self.shared.clone(),
            StateScope::PerEndpoint => self
                .per_endpoint
                .get(&endpoint)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Diffs `report` against the stored set and replaces it.
    pub fn process(&mut self, endpoint: u8, report: &InputReport) -> Vec<MonitorEvent> {
        let current = report.pressed_keys();
        let previous = match self.scope {
            StateScope::Shared => &mut self.shared,
            StateScope::PerEndpoint => self.per_endpoint.entry(endpoint).or_default(),
        };

        let modifiers = report.modifiers();
        let mut events: Vec<MonitorEvent> = current
            .difference(previous)
            .map(|&keycode| MonitorEvent::Press {
                endpoint,
                keycode,
                key_name: usb_hid::key_name(keycode),
                modifiers,
                modifier_label: usb_hid::modifier_string(modifiers),
            })
            .collect();
        events.extend(
            previous
                .difference(&current)
                .map(|&keycode| MonitorEvent::Release {
                    endpoint,
                    keycode,
                    key_name: usb_hid::key_name(keycode),
                }),
        );

        *previous = current;
        events
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub poll_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub scope: StateScope,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            backoff_initial: BACKOFF_INITIAL,
            backoff_max: BACKOFF_MAX,
            scope: StateScope::default(),
        }
    }
}

/// Background polling task. `stop` (or drop) blocks until the thread has
/// left the loop and no longer touches the device handle.
pub struct InputMonitor {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl InputMonitor {
    pub fn start<H, F>(
        reader: InputReader<H>,
        options: MonitorOptions,
        on_event: F,
    ) -> Result<Self>
    where
        H: UsbHandle,
        F: FnMut(MonitorEvent) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("minikb-monitor".into())
            .spawn(move || run(reader, options, thread_stop, on_event))
            .map_err(MiniKbError::MonitorSpawn)?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("monitor thread panicked");
            }
        }
    }
}

impl Drop for InputMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<H, F>(
    reader: InputReader<H>,
    options: MonitorOptions,
    stop: Arc<AtomicBool>,
    mut on_event: F,
) where
    H: UsbHandle,
    F: FnMut(MonitorEvent),
{
    info!(
        endpoints = ?reader.endpoints().iter().map(|e| e.address).collect::<Vec<_>>(),
        "input monitor started"
    );
    let mut tracker = KeyTracker::new(options.scope);
    let mut backoff = options.backoff_initial;

    while !stop.load(Ordering::Acquire) {
        let cycle = reader.read(options.poll_timeout);

        // Reports of a cycle are processed before any of its errors.
        for (endpoint, raw) in cycle.reports {
            let Ok(report) = InputReport::decode(&raw) else {
                continue;
            };
            for event in tracker.process(endpoint, &report) {
                debug!(?event, "input event");
                on_event(event);
            }
        }

        if cycle.errors.is_empty() {
            backoff = options.backoff_initial;
            continue;
        }
        for (endpoint, e) in cycle.errors {
            let message = format!("endpoint 0x{:02x}: {}", endpoint, MiniKbError::Transport(e));
            warn!("input read failed on {}", message);
            on_event(MonitorEvent::Error { message });
        }
        sleep_unless_stopped(backoff, options.poll_timeout, &stop);
        backoff = (backoff * 2).min(options.backoff_max);
    }
    info!("input monitor stopped");
}

fn sleep_unless_stopped(total: Duration, slice: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    let slice = slice.max(Duration::from_millis(1));
    while !stop.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(slice.min(deadline - now));
    }
}
