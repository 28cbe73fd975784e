//! Handler contract and handler bindings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{Options, Series, Value};
use crate::paths;

/// Arguments of one handler invocation.
pub struct HandlerCall<'a> {
    pub entry: &'a str,
    pub data: &'a Series,
    pub options: &'a Options,
    pub root: &'a Path,
}

impl<'a> HandlerCall<'a> {
    /// Output location for this entry with the given extension.
    pub fn artifact_path(&self, ext: &str) -> PathBuf {
        paths::artifact_path(self.root, self.entry, ext)
    }

    /// Most recent step and its value.
    pub fn last(&self) -> anyhow::Result<(u64, &'a Value)> {
        self.data
            .iter()
            .next_back()
            .map(|(step, value)| (*step, value))
            .ok_or_else(|| anyhow::anyhow!("entry {} has no data", self.entry))
    }

    pub fn option(&self, key: &str) -> Option<&'a Value> {
        self.options.get(key)
    }

    pub fn option_str(&self, key: &str) -> Option<&'a str> {
        match self.options.get(key) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A side effect run on an entry's data by a worker.
///
/// Errors and panics are caught by the worker pool and reported, never
/// propagated to the code that logged the data.
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()>;
}

/// Wraps a closure as a [`Handler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&HandlerCall<'_>) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&HandlerCall<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        (self.f)(call)
    }
}

/// A handler plus the keyword options bound to it at declaration.
#[derive(Clone)]
pub struct HandlerBinding {
    handler: Arc<dyn Handler>,
    options: Options,
}

impl HandlerBinding {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Bind a handler that is shared with other bindings.
    pub fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            options: Options::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn invoke(&self, entry: &str, data: &Series, root: &Path) -> anyhow::Result<()> {
        self.handler.handle(&HandlerCall {
            entry,
            data,
            options: &self.options,
            root,
        })
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("handler", &self.handler.name())
            .field("options", &self.options)
            .finish()
    }
}

impl<H: Handler + 'static> From<H> for HandlerBinding {
    fn from(handler: H) -> Self {
        HandlerBinding::new(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_passes_options() {
        let binding = HandlerBinding::new(FnHandler::new("check", |call| {
            anyhow::ensure!(call.option_str("output") == Some("stderr"));
            let (step, value) = call.last()?;
            anyhow::ensure!(step == 3 && *value == Value::Int(7));
            Ok(())
        }))
        .with_option("output", "stderr");

        let mut data = Series::new();
        data.insert(1, Value::Int(1));
        data.insert(3, Value::Int(7));
        binding.invoke("Loss", &data, Path::new(".")).unwrap();
        assert_eq!(binding.name(), "check");
    }

    #[test]
    fn test_last_on_empty_series_is_an_error() {
        let data = Series::new();
        let options = Options::new();
        let call = HandlerCall {
            entry: "Empty",
            data: &data,
            options: &options,
            root: Path::new("."),
        };
        assert!(call.last().is_err());
    }
}
