//! Script engine construction.

use rhai::Engine;

use crate::config::EngineConfig;

/// Build an engine with the configured limits.
///
/// Script `print`/`debug` output is routed through tracing.
pub fn build_engine(config: &EngineConfig) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);

    engine.on_print(|text| tracing::info!(target: "minirest::script", "{}", text));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(
            target: "minirest::script",
            source = source.unwrap_or("<module>"),
            position = %pos,
            "{}",
            text
        );
    });

    engine
}
