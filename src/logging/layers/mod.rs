use tracing::Subscriber;
use tracing_subscriber::layer::Layer;

pub mod console;
pub mod file;

/// Boxed layer type that can wrap any concrete subscriber layer.
pub type BoxLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Build a formatting layer in the requested output format.
pub(crate) fn fmt_layer<S>(
    writer: tracing_subscriber::fmt::writer::BoxMakeWriter,
    format: crate::logging::config::LogFormat,
) -> BoxLayer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);
    match format {
        crate::logging::config::LogFormat::Text => Box::new(layer),
        crate::logging::config::LogFormat::Json => Box::new(layer.json()),
    }
}
