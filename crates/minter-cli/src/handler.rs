use std::{error::Error, fmt};

use eyre::EyreHandler;
use itertools::Itertools;

/// Error reporting for the `minter` binary.
pub struct Handler {
    debug_handler: Option<Box<dyn EyreHandler>>,
}

impl Handler {
    pub fn new(debug_handler: Option<Box<dyn EyreHandler>>) -> Self {
        Self { debug_handler }
    }
}

impl EyreHandler for Handler {
    fn display(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Display;
        dedup_chain(error).into_iter().format("; ").fmt(f)
    }

    fn debug(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(debug_handler) = &self.debug_handler {
            return debug_handler.debug(error, f);
        }
        if f.alternate() {
            return fmt::Debug::fmt(error, f);
        }

        let errors = dedup_chain(error);
        let Some((error, sources)) = errors.split_first() else { return Ok(()) };
        write!(f, "{error}")?;
        if !sources.is_empty() {
            write!(f, "\n\nContext:")?;
            for source in sources {
                write!(f, "\n- {source}")?;
            }
        }
        Ok(())
    }

    fn track_caller(&mut self, location: &'static std::panic::Location<'static>) {
        if let Some(debug_handler) = &mut self.debug_handler {
            debug_handler.track_caller(location);
        }
    }
}

/// Messages of `error` and its sources, dropping a source already quoted by its parent.
fn dedup_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut causes = std::iter::successors(Some(error), |&e| e.source())
        .map(|cause| cause.to_string().trim().to_string())
        .collect::<Vec<_>>();
    causes.dedup_by(|b, a| a.contains(b.as_str()));
    causes
}

/// Installs the [`eyre`] and panic hooks.
///
/// Errors are reported on one line unless `MINTER_DEBUG` is set, which switches to the
/// `color_eyre` report with span traces and backtraces.
pub fn install() {
    let (panic_hook, debug_hook) = color_eyre::config::HookBuilder::default()
        .panic_section("This is a bug. Please report it with the output above.")
        .into_hooks();
    panic_hook.install();
    let debug_hook = debug_hook.into_eyre_hook();
    let debug = std::env::var_os("MINTER_DEBUG").is_some();
    if let Err(e) =
        eyre::set_hook(Box::new(move |e| Box::new(Handler::new(debug.then(|| debug_hook(e))))))
    {
        debug!("failed to install eyre error hook: {e}");
    }
}
