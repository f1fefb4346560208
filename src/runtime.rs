//! Process-level helpers shared by the binaries

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Task result as reported by [`supervise`]: a summary line or an error
pub type TaskOutcome = Result<String, String>;

/// Logs go to stderr so the terminal dashboard can own stdout.
///
/// Default filter is `info`, overridable with `RUST_LOG`. Safe to call more
/// than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Cancel `cancel` on the first CTRL+C.
pub fn install_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("⚠️  Received CTRL+C, shutting down...");
                cancel.cancel();
            }
            Err(err) => {
                log::error!("❌ Failed to listen for CTRL+C: {}", err);
            }
        }
    });
}

/// Wait on every task; the first one to exit, for any reason, cancels the
/// rest. Returns the names of the tasks that failed.
pub async fn supervise(
    mut tasks: JoinSet<(&'static str, TaskOutcome)>,
    cancel: &CancellationToken,
) -> Vec<&'static str> {
    let mut failed = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(summary))) => log::info!("✅ {} finished: {}", name, summary),
            Ok((name, Err(e))) => {
                log::error!("❌ {} failed: {}", name, e);
                failed.push(name);
            }
            Err(e) => {
                log::error!("❌ Task ended abnormally: {}", e);
                failed.push("task");
            }
        }
        if !cancel.is_cancelled() {
            log::info!("⚠️  A pipeline task exited, stopping the others...");
            cancel.cancel();
        }
    }

    failed
}
