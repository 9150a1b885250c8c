//! Logging integration for Forge views.
//!
//! [`setup_logging`] installs a [`tracing`] subscriber configured from
//! [`ViewSettings`]. [`render_span`] and [`include_span`] tag every event
//! emitted while a template renders with the template name, so nested
//! includes show up as nested spans.

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::settings::ViewSettings;

/// Filter used when `log_level` is not a valid filter directive.
const FALLBACK_FILTER: &str = "info";

/// Builds the event filter for `log_level`.
///
/// Accepts a bare level (`"debug"`) or full directives
/// (`"warn,forge_view=trace"`).
pub fn view_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Installs the global tracing subscriber.
///
/// With `settings.debug` set, events are printed in a human-readable form
/// with source locations; otherwise they are emitted as JSON lines. If a
/// subscriber is already installed this does nothing.
pub fn setup_logging(settings: &ViewSettings) {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(view_filter(&settings.log_level))
        .with_target(true);

    let installed = if settings.debug {
        builder
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
    } else {
        builder.json().try_init()
    };

    if installed.is_ok() {
        tracing::debug!(
            view_root = %settings.view_root.display(),
            debug_mode = ?settings.debug_mode,
            "view logging initialized"
        );
    }
}

/// Creates the span for a top-level template render.
///
/// # Examples
///
/// ```
/// use forge_core::logging::render_span;
///
/// let span = render_span("home.index");
/// let _guard = span.enter();
/// tracing::debug!("compiling");
/// ```
pub fn render_span(template: &str) -> tracing::Span {
    tracing::debug_span!("render", template = template)
}

/// Creates the span for a partial or component rendered from another
/// template. `depth` is 1 for includes in a top-level template.
pub fn include_span(template: &str, depth: usize) -> tracing::Span {
    tracing::trace_span!("include", template = template, depth = depth)
}
