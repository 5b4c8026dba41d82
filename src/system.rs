//! System monitoring and control ports.
//!
//! ## Dual-target design
//!
//! On ESP-IDF the adapter wraps heap/task queries and `esp_restart`; on the
//! host a simulation backend returns fixed figures and records reset
//! requests for assertions.

use log::warn;

/// Heap statistics, task count and reset, as used by the status and reset
/// commands.
pub trait SystemControl {
    fn heap_free(&self) -> u32;
    fn heap_min_free(&self) -> u32;
    fn task_count(&self) -> u32;

    /// Request a device reset after `delay_ms` (the hold-off lets the reset
    /// response leave the radio first).
    fn schedule_reset(&mut self, delay_ms: u32);
}

/// Momentary user switch, read by the switch-status command.
pub trait SwitchInput {
    fn is_pressed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

/// Host backend with canned figures and a recorded reset request.
pub struct SimSystem {
    pub heap_free: u32,
    pub heap_min_free: u32,
    pub task_count: u32,
    pub reset_requested_after_ms: Option<u32>,
}

impl Default for SimSystem {
    fn default() -> Self {
        Self {
            heap_free: 180_000,
            heap_min_free: 150_000,
            task_count: 6,
            reset_requested_after_ms: None,
        }
    }
}

impl SimSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SystemControl for SimSystem {
    fn heap_free(&self) -> u32 {
        self.heap_free
    }

    fn heap_min_free(&self) -> u32 {
        self.heap_min_free
    }

    fn task_count(&self) -> u32 {
        self.task_count
    }

    fn schedule_reset(&mut self, delay_ms: u32) {
        warn!("reset requested (sim), hold-off {delay_ms} ms");
        self.reset_requested_after_ms = Some(delay_ms);
    }
}

/// Fixed-state switch for host runs and tests.
#[derive(Default)]
pub struct SimSwitch {
    pub pressed: bool,
}

impl SwitchInput for SimSwitch {
    fn is_pressed(&self) -> bool {
        self.pressed
    }
}

// ---------------------------------------------------------------------------
// ESP-IDF adapter
// ---------------------------------------------------------------------------

/// Target backend over ESP-IDF system services.
#[cfg(target_os = "espidf")]
pub struct EspSystem;

#[cfg(target_os = "espidf")]
impl SystemControl for EspSystem {
    fn heap_free(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    fn heap_min_free(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() }
    }

    fn task_count(&self) -> u32 {
        unsafe { esp_idf_svc::sys::uxTaskGetNumberOfTasks() as u32 }
    }

    fn schedule_reset(&mut self, delay_ms: u32) {
        log::info!("restarting in {delay_ms} ms");
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(delay_ms as u64));
            unsafe { esp_idf_svc::sys::esp_restart() };
        });
    }
}
