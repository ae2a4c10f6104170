/// Development helper: install a tracing subscriber when `RUST_LOG` is set.
///
/// Examples and tests call `subdrain::dev_tracing::init_tracing()` to see the
/// `[SUB]` lifecycle and per-frame logs. No-op when `RUST_LOG` is unset or a
/// global subscriber already exists.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
