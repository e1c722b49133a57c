//! `@import` resolution (spec.md §4.5): `.brisk` source modules execute
//! into the current global scope; C headers are parsed, their functions
//! resolved against a dynamically loaded library, and wrapped as callable
//! `CFunction` values.

use crate::parser::Parser;
use brisk_core::{CFunctionDescriptor, CType, Environment, Value};
use brisk_runtime::header_parser::{self, MacroValue};
use brisk_runtime::Loader;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// Header-substring -> library-name rule, the mechanism behind spec.md
/// §4.5's math.h/raylib special cases and SPEC_FULL.md §14's
/// `[[headers.library_hints]]` config extension.
#[derive(Clone)]
pub struct LibraryHint {
    pub header_contains: &'static str,
    pub candidates: &'static [&'static str],
}

const BUILTIN_HINTS: &[LibraryHint] = &[
    LibraryHint {
        header_contains: "math.h",
        candidates: &["libm.so.6", "libm.so", "libm.dylib"],
    },
    LibraryHint {
        header_contains: "raylib",
        candidates: &["libraylib.so", "libraylib.so.4", "libraylib.dylib", "raylib.dll"],
    },
];

/// A hardcoded fallback list of common one/two-argument `double`-returning
/// `math.h` functions (spec.md §4.5): many are declared via macros in
/// glibc's `math.h`, so the header parser alone may miss them.
const MATH_H_FALLBACKS: &[(&str, usize)] = &[
    ("sin", 1),
    ("cos", 1),
    ("tan", 1),
    ("asin", 1),
    ("acos", 1),
    ("atan", 1),
    ("exp", 1),
    ("log", 1),
    ("log2", 1),
    ("log10", 1),
    ("sqrt", 1),
    ("cbrt", 1),
    ("ceil", 1),
    ("floor", 1),
    ("fabs", 1),
    ("atan2", 2),
    ("pow", 2),
    ("fmod", 2),
    ("hypot", 2),
];

const DEFAULT_INCLUDE_DIRS: &[&str] = &[
    "/usr/include",
    "/usr/local/include",
    "/usr/include/x86_64-linux-gnu",
];

pub struct Importer {
    loader: Loader,
    include_dirs: Vec<String>,
    extra_hints: Vec<(String, String)>,
    /// `.brisk` modules already executed, so re-importing the same path
    /// (directly or transitively) is a no-op rather than re-running
    /// top-level side effects.
    loaded_modules: HashSet<PathBuf>,
    /// Headers already resolved, so repeated `@import "math.h"` doesn't
    /// re-open libm or re-walk the include path.
    loaded_headers: HashSet<String>,
}

impl Importer {
    pub fn new() -> Self {
        Importer {
            loader: Loader::new().expect("process image always opens"),
            include_dirs: DEFAULT_INCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            extra_hints: Vec::new(),
            loaded_modules: HashSet::new(),
            loaded_headers: HashSet::new(),
        }
    }

    /// Applies a `brisk.toml` configuration's `[headers]` section
    /// (SPEC_FULL.md §14), extending rather than replacing the built-in
    /// defaults.
    pub fn configure(&mut self, include_dirs: Vec<String>, extra_hints: Vec<(String, String)>) {
        if !include_dirs.is_empty() {
            self.include_dirs = include_dirs;
        }
        self.extra_hints = extra_hints;
    }

    pub fn import(&mut self, path: &str, global: &Rc<RefCell<Environment>>) -> Result<(), String> {
        if path.ends_with(".brisk") {
            self.import_module(path, global)
        } else {
            self.import_header(path, global)
        }
    }

    /// spec.md §4.5 step 1: resolve `./<path>` if absolute/relative, else
    /// `./<path>` then `lib/<path>`; parse and execute into the global
    /// environment so top-level definitions leak in.
    fn import_module(&mut self, path: &str, global: &Rc<RefCell<Environment>>) -> Result<(), String> {
        let candidates: Vec<PathBuf> = if path.starts_with('/') || path.starts_with('.') {
            vec![PathBuf::from(path)]
        } else {
            vec![PathBuf::from(format!("./{path}")), PathBuf::from(format!("lib/{path}"))]
        };

        let resolved = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| format!("module '{path}' not found (tried {candidates:?})"))?;

        let canonical = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
        if self.loaded_modules.contains(&canonical) {
            debug!(path, "module already imported, skipping re-execution");
            return Ok(());
        }

        let source = fs::read_to_string(resolved)
            .map_err(|e| format!("could not read module '{}': {e}", resolved.display()))?;
        let program = Parser::new(&source)
            .map_err(|e| format!("parse error in '{}': {e}", resolved.display()))?
            .parse_program()
            .map_err(|errs| {
                let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
                format!("parse error in '{}': {}", resolved.display(), msgs.join("; "))
            })?;

        self.loaded_modules.insert(canonical);

        // Executed with a throwaway interpreter whose global *is* the
        // importing program's global, so all top-level definitions land
        // there directly (spec.md §4.5 step 1: "execute ... in the current
        // global environment").
        let mut sub = crate::evaluator::Interpreter::with_global(Rc::clone(global));
        sub.run(&program).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// spec.md §4.5 steps 2-6: probe include dirs, parse the header, resolve
    /// a library, wrap each declaration as a global binding.
    fn import_header(&mut self, header: &str, global: &Rc<RefCell<Environment>>) -> Result<(), String> {
        if self.loaded_headers.contains(header) {
            debug!(header, "header already imported, skipping re-resolution");
            return Ok(());
        }

        let source = self.read_header(header);

        let parsed = match &source {
            Some(src) => header_parser::parse_header(src),
            None => {
                warn!(header, "header not found on any include path; relying on hardcoded fallbacks only");
                header_parser::ParsedHeader::default()
            }
        };

        self.load_hinted_libraries(header);

        for decl in &parsed.functions {
            self.define_function(global, &decl.name, decl.return_type, decl.params.clone(), decl.variadic);
        }

        if header.contains("math.h") {
            for (name, arity) in MATH_H_FALLBACKS {
                if parsed.functions.iter().any(|f| &f.name == name) {
                    continue;
                }
                let params = vec![CType::Double; *arity];
                self.define_function(global, name, CType::Double, params, false);
            }
        }

        for (name, value) in &parsed.enumerators {
            self.define_const(global, name, Value::Int(*value));
        }

        for (name, value) in &parsed.macros {
            let v = match value {
                MacroValue::Int(n) => Value::Int(*n),
                MacroValue::Float(f) => Value::Float(*f),
                MacroValue::Str(s) => Value::str(s),
            };
            self.define_const(global, name, v);
        }

        self.loaded_headers.insert(header.to_string());
        Ok(())
    }

    fn read_header(&self, header: &str) -> Option<String> {
        for dir in &self.include_dirs {
            let candidate = Path::new(dir).join(header);
            if let Ok(src) = fs::read_to_string(&candidate) {
                debug!(path = %candidate.display(), "resolved header");
                return Some(src);
            }
        }
        None
    }

    /// spec.md §4.5 step 3's math.h/raylib special cases, extended by any
    /// `brisk.toml` `library_hints` (SPEC_FULL.md §14).
    fn load_hinted_libraries(&mut self, header: &str) {
        for hint in BUILTIN_HINTS {
            if header.contains(hint.header_contains) {
                if self.loader.load_first_available(hint.candidates).is_err() {
                    warn!(header, library = hint.header_contains, "no matching library could be opened");
                }
            }
        }
        for (substr, lib) in self.extra_hints.clone() {
            if header.contains(substr.as_str()) {
                let candidates = [lib.as_str()];
                if self.loader.load_first_available(&candidates).is_err() {
                    warn!(header, library = %lib, "configured library hint could not be opened");
                }
            }
        }
    }

    fn define_function(
        &mut self,
        global: &Rc<RefCell<Environment>>,
        name: &str,
        return_type: CType,
        params: Vec<CType>,
        variadic: bool,
    ) {
        let address = match self.loader.resolve(name) {
            Ok(addr) => addr,
            Err(_) => {
                debug!(name, "symbol not found, skipping binding");
                return;
            }
        };
        let descriptor = CFunctionDescriptor::new(name.to_string(), return_type, params, variadic, address);
        self.define_const(global, name, Value::cfunction(descriptor));
    }

    /// Defines `name` as const, shadowing any prior binding of the same
    /// name in global (spec.md §4.5 step 4: "shadowing any prior
    /// same-named binding"). Forces `is_const = true` even when shadowing a
    /// non-const builtin, so the shadowed name is not left reassignable.
    fn define_const(&self, global: &Rc<RefCell<Environment>>, name: &str, value: Value) {
        global.borrow_mut().force_define(name, value, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn imports_a_brisk_module_into_global() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().join("util.brisk");
        let mut f = fs::File::create(&module_path).unwrap();
        writeln!(f, "answer := 42").unwrap();

        let global = Environment::new_global();
        let mut importer = Importer::new();
        importer
            .import(module_path.to_str().unwrap(), &global)
            .unwrap();
        assert_eq!(global.borrow().get("answer").unwrap(), Value::Int(42));
    }

    #[test]
    fn missing_module_is_a_clean_error() {
        let global = Environment::new_global();
        let mut importer = Importer::new();
        let err = importer.import("./definitely_missing.brisk", &global).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn header_import_shadows_a_prior_binding_as_const() {
        let global = Environment::new_global();
        global
            .borrow_mut()
            .define("sqrt", Value::Int(0), false)
            .unwrap();
        let mut importer = Importer::new();
        importer.include_dirs.clear();
        importer.import("math.h", &global).unwrap();
        assert!(global.borrow().is_const("sqrt"));
        assert!(global.borrow_mut().set("sqrt", Value::Int(1)).is_err());
    }

    #[test]
    fn header_import_resolves_math_h_fallbacks_even_without_a_header_file() {
        let global = Environment::new_global();
        let mut importer = Importer::new();
        // No include dirs will contain this fake name; the fallback list
        // still wires up libm symbols directly.
        importer
            .include_dirs
            .clear();
        importer.import("math.h", &global).unwrap();
        let sqrt_fn = global.borrow().get("sqrt");
        assert!(sqrt_fn.is_some());
    }
}
