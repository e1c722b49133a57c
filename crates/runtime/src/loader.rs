//! Dynamic symbol resolution (spec.md §4.5 step 3, §4.6). Wraps
//! `libloading` so the rest of the crate never touches raw `dlopen`/`dlsym`.
//!
//! A freshly opened process image (`Library::this()`, backed by
//! `dlopen(NULL, ...)` on the platforms Brisk targets) already exposes every
//! symbol the process linked against at startup — libc, libm if linked, and
//! whatever else the host binary pulled in — which is why most headers need
//! nothing further. `@import "raylib.h"` and similar need an explicit extra
//! library, so `Loader` keeps a small stack of opened libraries and probes
//! them in the order they were added, most-recently-added first.

use libloading::Library;
use std::collections::HashMap;
use tracing::{debug, warn};

pub struct Loader {
    /// Opened libraries, most-recently-opened last. `libs[0]` is always the
    /// process image itself.
    libs: Vec<Library>,
    cache: HashMap<String, usize>,
}

impl Loader {
    pub fn new() -> Result<Self, String> {
        let this = unsafe { Library::this() };
        Ok(Loader {
            libs: vec![this],
            cache: HashMap::new(),
        })
    }

    /// Open an additional shared library by path/soname and add it to the
    /// probe list. Used for `math.h` (`libm`) and hardcoded candidates for
    /// libraries like raylib (spec.md §4.5).
    pub fn load_library(&mut self, name: &str) -> Result<(), String> {
        match unsafe { Library::new(name) } {
            Ok(lib) => {
                debug!(name, "opened additional shared library");
                self.libs.push(lib);
                Ok(())
            }
            Err(e) => {
                warn!(name, error = %e, "failed to open shared library");
                Err(format!("could not open '{name}': {e}"))
            }
        }
    }

    /// Try a list of candidate sonames/paths, succeeding on the first that
    /// opens. Used when a library might live under several names across
    /// distributions (spec.md §4.5's raylib special case).
    pub fn load_first_available(&mut self, candidates: &[&str]) -> Result<(), String> {
        let mut last_err = String::new();
        for candidate in candidates {
            match self.load_library(candidate) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = e,
            }
        }
        Err(format!(
            "none of the candidate libraries could be opened; last error: {last_err}"
        ))
    }

    /// Resolve `symbol`'s address, searching the most recently opened
    /// library first, then falling back to the process image.
    pub fn resolve(&mut self, symbol: &str) -> Result<usize, String> {
        if let Some(addr) = self.cache.get(symbol) {
            return Ok(*addr);
        }
        for lib in self.libs.iter().rev() {
            let found: Result<libloading::Symbol<'_, unsafe extern "C" fn()>, _> =
                unsafe { lib.get(symbol.as_bytes()) };
            if let Ok(sym) = found {
                let addr = *sym as usize;
                self.cache.insert(symbol.to_string(), addr);
                return Ok(addr);
            }
        }
        Err(format!("undefined symbol '{symbol}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_libc_symbol_from_the_process_image() {
        let mut loader = Loader::new().expect("process image always opens");
        let addr = loader.resolve("strlen");
        assert!(addr.is_ok(), "strlen should already be linked into the test binary");
    }

    #[test]
    fn unknown_symbol_is_a_clean_error() {
        let mut loader = Loader::new().unwrap();
        let err = loader.resolve("definitely_not_a_real_symbol_xyz").unwrap_err();
        assert!(err.contains("undefined symbol"));
    }

    #[test]
    fn resolve_caches_repeat_lookups() {
        let mut loader = Loader::new().unwrap();
        let first = loader.resolve("strlen").unwrap();
        let second = loader.resolve("strlen").unwrap();
        assert_eq!(first, second);
    }
}
