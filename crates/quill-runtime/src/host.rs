//! Host functions behind the `quill.intrinsic` imports.

use quill_types::abi::{HOST_EXIT, HOST_FAIL, HOST_MESSAGE, HOST_MODULE, HOST_RANDOM_INT, MEMORY_EXPORT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wasmi::{Caller, Linker};

/// Per-context host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Fuel available to one load/invoke cycle; `None` runs unmetered.
    pub fuel: Option<u64>,
    /// Seed of the `RandomInt` generator.
    pub seed: u64,
    /// Also print `Message` output to stdout.
    pub echo: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fuel: None,
            seed: 0x5eed_0f_0a11,
            echo: false,
        }
    }
}

/// State the host functions read and write.
#[derive(Debug)]
pub struct HostState {
    pub messages: Vec<String>,
    pub exit_code: Option<i32>,
    /// Message passed to `fail`, if the program failed.
    pub failure: Option<String>,
    echo: bool,
    rng: XorShift64,
}

impl HostState {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            messages: Vec::new(),
            exit_code: None,
            failure: None,
            echo: config.echo,
            rng: XorShift64::new(config.seed),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Linking
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    // message(ptr: i32)
    linker.func_wrap(
        HOST_MODULE,
        HOST_MESSAGE,
        |mut caller: Caller<'_, HostState>, ptr: i32| -> Result<(), wasmi::Error> {
            let text = read_string(&caller, ptr)?;
            debug!(message = %text, "program message");
            if caller.data().echo {
                println!("{text}");
            }
            caller.data_mut().messages.push(text);
            Ok(())
        },
    )?;

    // random_int(max: i64) -> i64, uniform in [0, max)
    linker.func_wrap(
        HOST_MODULE,
        HOST_RANDOM_INT,
        |mut caller: Caller<'_, HostState>, max: i64| -> Result<i64, wasmi::Error> {
            if max <= 0 {
                return Err(wasmi::Error::new(format!(
                    "RandomInt expects a positive bound, got {max}"
                )));
            }
            let bound = max.unsigned_abs();
            let value = caller.data_mut().rng.next() % bound;
            Ok(value as i64)
        },
    )?;

    // fail(ptr: i32): always traps
    linker.func_wrap(
        HOST_MODULE,
        HOST_FAIL,
        |mut caller: Caller<'_, HostState>, ptr: i32| -> Result<(), wasmi::Error> {
            let text = read_string(&caller, ptr)?;
            info!(message = %text, "program failed");
            caller.data_mut().failure = Some(text.clone());
            Err(wasmi::Error::new(text))
        },
    )?;

    // exit(code: i32)
    linker.func_wrap(
        HOST_MODULE,
        HOST_EXIT,
        |mut caller: Caller<'_, HostState>, code: i32| {
            debug!(code, "program exit code recorded");
            caller.data_mut().exit_code = Some(code);
        },
    )?;

    Ok(())
}

/// Read a `[len: u32][bytes]` string at `ptr` from the exported memory.
fn read_string(caller: &Caller<'_, HostState>, ptr: i32) -> Result<String, wasmi::Error> {
    let memory = caller
        .get_export(MEMORY_EXPORT)
        .and_then(|export| export.into_memory())
        .ok_or_else(|| wasmi::Error::new("module exports no memory"))?;
    let data = memory.data(caller);
    let start = usize::try_from(ptr).map_err(|_| wasmi::Error::new("negative string pointer"))?;
    let header = data
        .get(start..start.saturating_add(4))
        .ok_or_else(|| wasmi::Error::new(format!("string pointer {ptr} out of bounds")))?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let bytes = data
        .get(start + 4..(start + 4).saturating_add(len))
        .ok_or_else(|| wasmi::Error::new(format!("string at {ptr} overruns memory")))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

// ══════════════════════════════════════════════════════════════════════════════
// RandomInt generator
// ══════════════════════════════════════════════════════════════════════════════

/// xorshift64: deterministic for a given seed, never zero.
#[derive(Debug, Clone)]
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed })
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xorshift_is_deterministic_and_nonzero() {
        let mut a = XorShift64::new(42);
        let mut b = XorShift64::new(42);
        let first: Vec<u64> = (0..4).map(|_| a.next()).collect();
        let second: Vec<u64> = (0..4).map(|_| b.next()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|&x| x != 0));
        assert_ne!(XorShift64::new(0).next(), 0);
    }

    #[test]
    fn host_state_starts_empty() {
        let state = HostState::new(&HostConfig::default());
        assert!(state.messages.is_empty());
        assert_eq!(state.exit_code, None);
        assert_eq!(state.failure, None);
    }
}
