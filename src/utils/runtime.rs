use anyhow::Result;

/// The daemon runs as a single logical thread of control, so a current-thread runtime is enough.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
