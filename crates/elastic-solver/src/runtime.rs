//! Numeric runtime context: process group handle and options database.
//!
//! A [`Runtime`] is constructed once by the hosting program and borrowed by
//! every problem that needs it. Finalization happens on drop, or earlier
//! through [`Runtime::finalize`], which may be called any number of times.
//!
//! Options follow the usual command-line convention: a key starts with `-`
//! and is optionally followed by a value.
//!
//! ```text
//! prog -snes_rtol 1e-10 -snes_use_objective -snes_linesearch_type basic
//! ```

use crate::error::{Result, SolverError};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Handle identifying the group of cooperating processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Communicator {
    rank: usize,
    size: usize,
}

impl Communicator {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

/// Options database populated from command-line style arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeOptions {
    entries: BTreeMap<String, Option<String>>,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `args` and merge them in. `args[0]` is the program name.
    pub fn add_options<S: AsRef<str>>(&mut self, args: &[S]) {
        let Some((program, rest)) = args.split_first() else {
            return;
        };
        assert!(
            !is_key(program.as_ref()),
            "first argument must be the program name, got option {}",
            program.as_ref()
        );

        let mut tokens = rest.iter().map(AsRef::as_ref).peekable();
        while let Some(token) = tokens.next() {
            if !is_key(token) {
                tracing::warn!(token, "ignoring stray runtime argument");
                continue;
            }
            let value = match tokens.peek() {
                Some(next) if !is_key(next) => tokens.next().map(str::to_string),
                _ => None,
            };
            self.entries.insert(token.to_string(), value);
        }
    }

    /// Replace the whole database with `args`.
    pub fn set_options<S: AsRef<str>>(&mut self, args: &[S]) {
        self.clear();
        self.add_options(args);
    }

    pub fn insert(&mut self, key: &str, value: Option<&str>) {
        self.entries
            .insert(normalize(key), value.map(str::to_string));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value of `key`; `Some(None)` for a flag given without a value.
    pub fn raw(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(&normalize(key)).map(|v| v.as_deref())
    }

    /// Typed lookup. A flag without a value is an error for non-boolean types.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(key) {
            None => Ok(None),
            Some(None) => Err(SolverError::Options {
                key: normalize(key),
                message: "missing value".into(),
            }),
            Some(Some(text)) => text.parse().map(Some).map_err(|e: T::Err| SolverError::Options {
                key: normalize(key),
                message: format!("cannot parse {text:?}: {e}"),
            }),
        }
    }

    /// Boolean lookup; a bare flag reads as `true`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.raw(key) {
            None => Ok(None),
            Some(None) => Ok(Some(true)),
            Some(Some(text)) => match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(SolverError::Options {
                    key: normalize(key),
                    message: format!("expected a boolean, got {text:?}"),
                }),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

fn is_key(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token.parse::<f64>().is_err()
}

fn normalize(key: &str) -> String {
    if key.starts_with('-') {
        key.to_string()
    } else {
        format!("-{key}")
    }
}

/// Explicit numeric runtime context with scoped cleanup.
#[derive(Debug)]
pub struct Runtime {
    help: String,
    options: RuntimeOptions,
    initialized: bool,
}

impl Runtime {
    /// Bring the runtime up with command-line style `args`.
    pub fn initialize<S: AsRef<str>>(help: &str, args: &[S]) -> Self {
        let mut options = RuntimeOptions::new();
        options.add_options(args);
        tracing::debug!(options = options.len(), "runtime initialized");
        Self {
            help: help.to_string(),
            options,
            initialized: true,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bring a finalized runtime back up with an empty options database.
    /// Does nothing while still initialized.
    pub fn reinitialize(&mut self) {
        if !self.initialized {
            self.options.clear();
            self.initialized = true;
            tracing::debug!("runtime reinitialized");
        }
    }

    /// Release the runtime. Safe to call repeatedly.
    pub fn finalize(&mut self) {
        if self.initialized {
            self.initialized = false;
            tracing::debug!("runtime finalized");
        }
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn add_options<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        self.ensure_initialized()?;
        self.options.add_options(args);
        Ok(())
    }

    pub fn set_options<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        self.ensure_initialized()?;
        self.options.set_options(args);
        Ok(())
    }

    /// Handle for all cooperating processes. This build runs a single process.
    pub fn comm_world(&self) -> Communicator {
        Communicator { rank: 0, size: 1 }
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SolverError::State("runtime has been finalized".into()))
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_values_and_flags() {
        let mut options = RuntimeOptions::new();
        options.add_options(&[
            "prog",
            "-snes_rtol",
            "1e-10",
            "-snes_use_objective",
            "-shift",
            "-0.5",
            "-snes_linesearch_type",
            "basic",
        ]);
        assert_eq!(options.len(), 4);
        assert_eq!(options.get::<f64>("-snes_rtol").unwrap(), Some(1e-10));
        assert_eq!(options.get::<f64>("shift").unwrap(), Some(-0.5));
        assert_eq!(options.get_bool("-snes_use_objective").unwrap(), Some(true));
        assert_eq!(options.raw("-snes_linesearch_type"), Some(Some("basic")));
        assert_eq!(options.get::<usize>("-snes_max_it").unwrap(), None);
    }

    #[test]
    fn bad_values_are_errors() {
        let mut options = RuntimeOptions::new();
        options.add_options(&["prog", "-snes_max_it", "many", "-tao_gatol"]);
        assert!(matches!(
            options.get::<usize>("-snes_max_it"),
            Err(SolverError::Options { .. })
        ));
        assert!(options.get::<f64>("-tao_gatol").is_err());
        assert!(options.get_bool("-snes_max_it").is_err());
    }

    #[test]
    fn set_options_replaces() {
        let mut options = RuntimeOptions::new();
        options.add_options(&["prog", "-a", "1"]);
        options.add_options(&["prog", "-b", "2"]);
        assert_eq!(options.len(), 2);
        options.set_options(&["prog", "-c"]);
        assert_eq!(options.len(), 1);
        assert!(options.contains("-c"));
        assert!(!options.contains("-a"));
    }

    #[test]
    #[should_panic(expected = "first argument must be the program name")]
    fn option_as_program_name_panics() {
        RuntimeOptions::new().add_options(&["-snes_rtol", "1e-8"]);
    }

    #[test]
    fn lifecycle() {
        let mut runtime = Runtime::initialize("test", &["prog", "-x", "1"]);
        assert!(runtime.is_initialized());
        assert_eq!(runtime.comm_world().size(), 1);
        assert!(runtime.comm_world().is_root());

        // reinitialize is a no-op while running
        runtime.reinitialize();
        assert!(runtime.options().contains("-x"));

        runtime.finalize();
        runtime.finalize();
        assert!(!runtime.is_initialized());
        assert!(runtime.add_options(&["prog", "-y"]).is_err());

        runtime.reinitialize();
        assert!(runtime.is_initialized());
        assert!(runtime.options().is_empty());
        runtime.set_options(&["prog", "-y", "2"]).unwrap();
        assert_eq!(runtime.options().get::<i32>("-y").unwrap(), Some(2));
    }
}
